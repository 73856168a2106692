use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use lesson_core::model::UserId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per user, created on first use.
///
/// Holding a user's guard serializes their load/apply/save cycles; other
/// users are not blocked.
#[derive(Debug, Clone, Default)]
pub(crate) struct UserLocks {
    inner: Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>,
}

impl UserLocks {
    pub(crate) async fn lock(&self, user_id: &UserId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(user_id.clone()).or_default())
        };
        slot.lock_owned().await
    }
}
