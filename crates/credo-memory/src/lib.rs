#![doc = include_str!("../README.md")]

mod queue;
mod store;

pub use queue::MemoryQueue;
pub use store::MemoryStore;
