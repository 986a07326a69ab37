//! In-process graph storage

pub mod memory;

pub use memory::{MemoryGraphStore, NodeKey};
