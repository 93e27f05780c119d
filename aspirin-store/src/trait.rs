use crate::types::{Payload, QueueEntry};

/// Storage for message payloads, keyed by mail identifier.
///
/// Identifiers are opaque, caller-supplied strings; implementations never
/// generate them. Every implementation must behave like
/// [`MemoryMailStore`](crate::MemoryMailStore):
/// - `set` overwrites any payload already stored under the identifier
/// - `remove` of an unknown identifier is a no-op
/// - `list_ids` is a snapshot taken at call time with no ordering guarantee
///
/// Implementations are shared between delivery threads, so every method takes
/// `&self` and the store is responsible for its own interior locking.
pub trait MailStore: Send + Sync + std::fmt::Debug {
    /// Called once after the store is constructed by the backend resolver.
    fn init(&self) {}

    /// Fetch the payload stored under `mail_id`.
    fn get(&self, mail_id: &str) -> Option<Payload>;

    /// Store `payload` under `mail_id`, replacing whatever was there.
    fn set(&self, mail_id: &str, payload: Payload);

    /// Forget `mail_id`.
    fn remove(&self, mail_id: &str);

    /// All identifiers currently held.
    fn list_ids(&self) -> Vec<String>;
}

/// Storage for delivery queue entries, keyed by mail identifier.
///
/// Same identifier semantics as [`MailStore`]. What the entries mean is up to
/// the delivery scheduler; the store only keeps them.
pub trait QueueStore: Send + Sync + std::fmt::Debug {
    /// Called once after the store is constructed by the backend resolver.
    fn init(&self) {}

    fn get(&self, mail_id: &str) -> Option<QueueEntry>;

    fn set(&self, mail_id: &str, entry: QueueEntry);

    fn remove(&self, mail_id: &str);

    fn list_ids(&self) -> Vec<String>;
}
