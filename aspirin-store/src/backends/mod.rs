//! Baseline store implementations
//!
//! - `memory`: message payloads keyed by mail identifier
//! - `queue`: delivery queue entries keyed by mail identifier
//!
//! Both keep everything in process memory with no bound; alternative backends
//! are plugged in through the configuration's backend registry.

pub mod memory;
pub mod queue;

pub use memory::MemoryMailStore;
pub use queue::MemoryQueueStore;
