//! Session identity, turns, and the rolling context buffer.

pub mod buffer;
pub mod identity;
pub mod types;

pub use buffer::RollingBuffer;
pub use identity::{
    FileStorage, KeyValueStorage, MemoryStorage, SESSION_STORAGE_KEY, SessionIdentityStore,
};
pub use types::{Role, Transcript, Turn};
