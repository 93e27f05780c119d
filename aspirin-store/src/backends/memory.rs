use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use aspirin_common::backend;

use crate::{r#trait::MailStore, types::Payload};

/// In-memory mail store, the baseline every other backend is measured against
///
/// Payloads live in a `HashMap` behind an `RwLock`. Nothing is persisted and
/// nothing is evicted: a long queue of large messages grows the process
/// without limit. Bounded or persistent storage belongs in an alternative
/// backend registered with the configuration.
///
/// # Performance
/// - get: O(1) lookup + `Arc` clone of the payload
/// - set/remove: O(1)
/// - `list_ids`: O(n), clones every key
///
/// # Concurrency
/// Clones share the same map. A poisoned lock is recovered rather than
/// propagated: the map is never left half-updated by any of these methods.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailStore {
    messages: Arc<RwLock<HashMap<String, Payload>>>,
}

impl MemoryMailStore {
    /// Create a new, empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MailStore for MemoryMailStore {
    fn get(&self, mail_id: &str) -> Option<Payload> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(mail_id)
            .cloned()
    }

    fn set(&self, mail_id: &str, payload: Payload) {
        let previous = self
            .messages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(mail_id.to_string(), payload);

        if previous.is_some() {
            backend!(mail_id, "Replaced stored message");
        }
    }

    fn remove(&self, mail_id: &str) {
        self.messages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(mail_id);
    }

    fn list_ids(&self) -> Vec<String> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
