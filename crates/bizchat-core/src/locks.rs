use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type SessionKey = (String, String);

/// One async mutex per (chatbot, session), so turns on the same conversation
/// run one at a time while different conversations proceed in parallel.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<SessionKey, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a session. The lock is released when the
    /// returned guard is dropped.
    pub async fn acquire(&self, chatbot_id: &str, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            // Entries nobody holds or waits on only have the map's reference.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry((chatbot_id.to_string(), session_id.to_string()))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of tracked sessions.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
