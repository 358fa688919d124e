//! Last-broadcast lookup used to scope `/stats`

use dashmap::DashMap;

/// Remembers the most recent broadcast id per user
pub trait BroadcastStore: Send + Sync {
    /// Most recent broadcast id sent by `user_id`
    fn last_broadcast(&self, user_id: &str) -> Option<String>;

    /// Replace the user's most recent broadcast id
    fn record_broadcast(&self, user_id: &str, broadcast_id: String);

    /// Drop the user's broadcast id, e.g. when Roman did not return one
    fn forget_broadcast(&self, user_id: &str);
}

/// Process-lifetime store; entries are never evicted
#[derive(Debug, Default)]
pub struct InMemoryBroadcastStore {
    last: DashMap<String, String>,
}

impl InMemoryBroadcastStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BroadcastStore for InMemoryBroadcastStore {
    fn last_broadcast(&self, user_id: &str) -> Option<String> {
        self.last.get(user_id).map(|id| id.value().clone())
    }

    fn record_broadcast(&self, user_id: &str, broadcast_id: String) {
        self.last.insert(user_id.to_string(), broadcast_id);
    }

    fn forget_broadcast(&self, user_id: &str) {
        self.last.remove(user_id);
    }
}
