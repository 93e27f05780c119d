use std::{sync::Arc, time::SystemTime};

use serde::{Deserialize, Serialize};

/// Raw message payload. Stores treat it as an opaque blob.
pub type Payload = Arc<[u8]>;

/// Where a queued mail currently stands in its delivery lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QueueStatus {
    /// Waiting for its next attempt
    #[default]
    Queued,
    /// Handed to a delivery thread
    InProgress,
    /// Delivered to every recipient
    Sent,
    /// Gave up (attempts exhausted or expired)
    Failed,
}

/// A mail waiting in (or finished with) the delivery queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub mail_id: String,
    pub recipients: Vec<String>,
    pub status: QueueStatus,
    /// Delivery attempts made so far
    pub attempts: u32,
    /// Earliest time the next attempt may start (`None` = immediately)
    pub next_attempt_at: Option<SystemTime>,
    /// Time after which the mail is abandoned (`None` = never)
    pub expires_at: Option<SystemTime>,
}

impl QueueEntry {
    /// A fresh entry that is due immediately and never expires
    #[must_use]
    pub fn new(mail_id: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            mail_id: mail_id.into(),
            recipients,
            status: QueueStatus::Queued,
            attempts: 0,
            next_attempt_at: None,
            expires_at: None,
        }
    }

    /// Whether the entry may be attempted at `now`
    #[must_use]
    pub fn is_due(&self, now: SystemTime) -> bool {
        self.status == QueueStatus::Queued && self.next_attempt_at.is_none_or(|at| at <= now)
    }

    /// Whether the entry has passed its expiry at `now`
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}
