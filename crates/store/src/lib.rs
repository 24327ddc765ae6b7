//! Persistence boundary for personas, conversations, messages and memories.
//!
//! The orchestration runtime only talks to [`Store`]. [`MemoryStore`] is the
//! bundled implementation: everything lives in memory and is snapshotted to a
//! JSON file.

mod memory;
mod traits;

pub use memory::MemoryStore;
pub use traits::Store;
