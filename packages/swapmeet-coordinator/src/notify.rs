//! Per-recipient notification log.

use std::collections::HashMap;
use std::sync::RwLock;

use swapmeet_types::{Notification, NotificationKind};
use tracing::debug;

use crate::store::now_ms;

/// Side-channel output: one bounded queue of notifications per recipient.
pub struct Notifier {
    inner: RwLock<HashMap<String, Vec<Notification>>>,
    cap: usize,
}

impl Notifier {
    pub fn new(cap: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            cap,
        }
    }

    /// Record that `actor` did something to `offer_id` that `recipient`
    /// should hear about.
    pub fn notify(&self, recipient: &str, kind: NotificationKind, offer_id: u64, actor: &str) {
        debug!(recipient, ?kind, offer_id, actor, "Notification");
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let queue = inner.entry(recipient.to_string()).or_default();
        queue.push(Notification {
            kind,
            offer_id,
            actor: actor.to_string(),
            created_at: now_ms(),
        });
        if queue.len() > self.cap {
            let overflow = queue.len() - self.cap;
            queue.drain(..overflow);
        }
    }

    /// Notifications for `recipient`, newest first.
    pub fn for_user(&self, recipient: &str) -> Vec<Notification> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut out = inner.get(recipient).cloned().unwrap_or_default();
        out.reverse();
        out
    }
}
