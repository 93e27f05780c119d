pub mod backends;
pub mod r#trait;
pub mod types;

pub use backends::{MemoryMailStore, MemoryQueueStore};
pub use r#trait::{MailStore, QueueStore};
pub use types::{Payload, QueueEntry, QueueStatus};
