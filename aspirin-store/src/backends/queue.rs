use std::{sync::Arc, time::SystemTime};

use dashmap::DashMap;

use crate::{
    r#trait::QueueStore,
    types::{QueueEntry, QueueStatus},
};

/// In-memory delivery queue store
///
/// Entries are held in a `DashMap` so delivery threads can update different
/// mails without contending on a single lock. Like [`MemoryMailStore`], it is
/// unbounded and forgets everything on restart.
///
/// [`MemoryMailStore`]: crate::MemoryMailStore
#[derive(Debug, Clone, Default)]
pub struct MemoryQueueStore {
    entries: Arc<DashMap<String, QueueEntry>>,
}

impl MemoryQueueStore {
    /// Create a new empty queue store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the status of a queued mail, if present
    pub fn update_status(&self, mail_id: &str, status: QueueStatus) {
        if let Some(mut entry) = self.entries.get_mut(mail_id) {
            entry.value_mut().status = status;
        }
    }

    /// Count one more attempt and schedule the next one
    pub fn record_attempt(&self, mail_id: &str, next_attempt_at: Option<SystemTime>) {
        if let Some(mut entry) = self.entries.get_mut(mail_id) {
            let entry = entry.value_mut();
            entry.attempts = entry.attempts.saturating_add(1);
            entry.next_attempt_at = next_attempt_at;
        }
    }

    /// Every entry that may be attempted at `now`
    pub fn due(&self, now: SystemTime) -> Vec<QueueEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.value().is_due(now))
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl QueueStore for MemoryQueueStore {
    fn get(&self, mail_id: &str) -> Option<QueueEntry> {
        self.entries
            .get(mail_id)
            .map(|entry| entry.value().clone())
    }

    fn set(&self, mail_id: &str, entry: QueueEntry) {
        self.entries.insert(mail_id.to_string(), entry);
    }

    fn remove(&self, mail_id: &str) {
        self.entries.remove(mail_id);
    }

    fn list_ids(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_attempts_are_counted_and_rescheduled() {
        let store = MemoryQueueStore::new();
        store.set("m1", QueueEntry::new("m1", vec!["a@b.com".to_string()]));

        let later = SystemTime::now() + Duration::from_secs(300);
        store.record_attempt("m1", Some(later));

        let entry = store.get("m1").unwrap();
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.next_attempt_at, Some(later));
    }

    #[test]
    fn test_due_skips_scheduled_and_finished_entries() {
        let store = MemoryQueueStore::new();
        let now = SystemTime::now();

        store.set("ready", QueueEntry::new("ready", Vec::new()));
        store.set(
            "later",
            QueueEntry {
                next_attempt_at: Some(now + Duration::from_secs(60)),
                ..QueueEntry::new("later", Vec::new())
            },
        );
        store.set("done", QueueEntry::new("done", Vec::new()));
        store.update_status("done", QueueStatus::Sent);

        let due: Vec<_> = store.due(now).into_iter().map(|e| e.mail_id).collect();
        assert_eq!(due, vec!["ready".to_string()]);
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let store = MemoryQueueStore::new();
        store.update_status("ghost", QueueStatus::Failed);
        store.record_attempt("ghost", None);
        store.remove("ghost");

        assert!(store.is_empty());
    }
}
