use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

/// Hands out one async mutex per group id.
///
/// Every Group/Vote/Cycle mutation runs inside its group's guard, so cap
/// checks, tally updates and cycle rollovers are serialized per group.
/// Reads go straight to the latest committed rows.
#[derive(Clone, Default)]
pub struct GroupLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl GroupLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_group(&self, group_id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(group_id.to_string()).or_default().clone()
    }
}
