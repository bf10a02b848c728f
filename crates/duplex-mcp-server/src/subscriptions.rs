//! Per-session resource subscriptions.
//!
//! Subscribe and unsubscribe are idempotent and accept URIs the server has
//! never heard of; the set only decides who gets
//! `notifications/resources/updated` fan-out. A session's set dies with the
//! session.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// `session-id → set<uri>`.
#[derive(Default)]
pub struct SubscriptionManager {
    subscriptions: Mutex<HashMap<String, HashSet<String>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, HashSet<String>>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns false when the subscription already existed.
    pub fn subscribe(&self, session_id: &str, uri: &str) -> bool {
        self.lock()
            .entry(session_id.to_string())
            .or_default()
            .insert(uri.to_string())
    }

    /// Returns false when there was nothing to remove.
    pub fn unsubscribe(&self, session_id: &str, uri: &str) -> bool {
        self.lock()
            .get_mut(session_id)
            .map(|set| set.remove(uri))
            .unwrap_or(false)
    }

    pub fn is_subscribed(&self, session_id: &str, uri: &str) -> bool {
        self.lock()
            .get(session_id)
            .map(|set| set.contains(uri))
            .unwrap_or(false)
    }

    /// Sessions subscribed to a literal URI.
    pub fn subscribers(&self, uri: &str) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, uris)| uris.contains(uri))
            .map(|(session, _)| session.clone())
            .collect()
    }

    /// Drop a closed session's set.
    pub fn remove_session(&self, session_id: &str) {
        self.lock().remove(session_id);
    }
}
