//! Speaker output via cpal, with symphonia decoding of the voice service's
//! encoded audio.

use super::{AudioClip, AudioSink};
use crate::error::{Result, WidgetError};
use async_trait::async_trait;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info};

/// Decoded mono PCM.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode an encoded clip (mp3, aac, m4a, wav) to mono f32 samples.
pub fn decode_clip(clip: &AudioClip) -> Result<DecodedAudio> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let source = Cursor::new(clip.bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    if !clip.content_type.is_empty() {
        hint.mime_type(&clip.content_type);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| WidgetError::Playback(format!("failed to probe audio: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| WidgetError::Playback("no default audio track".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| WidgetError::Playback("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| WidgetError::Playback(format!("failed to create decoder: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(WidgetError::Playback(format!("audio read error: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(WidgetError::Playback(format!("audio decode error: {e}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        let frames = decoded.frames();
        let required = frames.saturating_mul(channels);
        if sample_buf.as_ref().is_none_or(|b| b.capacity() < required) {
            sample_buf = Some(SampleBuffer::<f32>::new(frames as u64, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        if channels <= 1 {
            samples.extend_from_slice(buf.samples());
        } else {
            for frame in buf.samples().chunks_exact(channels) {
                samples.push(frame.iter().sum::<f32>() / channels as f32);
            }
        }
    }

    if samples.is_empty() {
        return Err(WidgetError::Playback("decoded audio is empty".into()));
    }
    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
    finished: bool,
}

/// [`AudioSink`] writing to the default output device.
pub struct CpalAudioSink {
    device: Mutex<cpal::Device>,
    stop_requested: Arc<AtomicBool>,
}

impl CpalAudioSink {
    /// Open the default output device.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| WidgetError::Unsupported("no default output device".into()))?;
        let device_name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());
        info!("using output device: {device_name}");
        Ok(Self {
            device: Mutex::new(device),
            stop_requested: Arc::new(AtomicBool::new(false)),
        })
    }
}

fn play_blocking(device: &cpal::Device, audio: DecodedAudio, stop: &AtomicBool) -> Result<()> {
    let stream_config = StreamConfig {
        channels: 1,
        sample_rate: audio.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let buffer = Arc::new(Mutex::new(PlaybackBuffer {
        samples: audio.samples,
        position: 0,
        finished: false,
    }));
    let buffer_clone = Arc::clone(&buffer);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut buf = match buffer_clone.lock() {
                    Ok(b) => b,
                    Err(_) => return,
                };
                for sample in data.iter_mut() {
                    if buf.position < buf.samples.len() {
                        *sample = buf.samples[buf.position];
                        buf.position += 1;
                    } else {
                        *sample = 0.0;
                        buf.finished = true;
                    }
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
            },
            None,
        )
        .map_err(|e| WidgetError::Playback(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| WidgetError::Playback(format!("failed to start output stream: {e}")))?;

    loop {
        std::thread::sleep(Duration::from_millis(10));
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let buf = buffer
            .lock()
            .map_err(|e| WidgetError::Playback(format!("playback buffer lock poisoned: {e}")))?;
        if buf.finished {
            break;
        }
    }

    drop(stream);
    Ok(())
}

#[async_trait]
impl AudioSink for CpalAudioSink {
    async fn play(&self, clip: &AudioClip) -> Result<()> {
        let audio = decode_clip(clip)?;
        self.stop_requested.store(false, Ordering::SeqCst);
        let device = self
            .device
            .lock()
            .map_err(|e| WidgetError::Playback(format!("output device lock poisoned: {e}")))?
            .clone();
        let stop = Arc::clone(&self.stop_requested);
        tokio::task::spawn_blocking(move || play_blocking(&device, audio, &stop))
            .await
            .map_err(|e| WidgetError::Playback(format!("playback task failed: {e}")))?
    }

    fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }
}
