use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

/// Live processes keyed by build id, each reachable through its abort channel.
#[derive(Clone, Default)]
pub struct ActiveProcesses {
    inner: Arc<Mutex<HashMap<String, mpsc::Sender<String>>>>,
}

impl ActiveProcesses {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, mpsc::Sender<String>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Tracks `build_id` until the returned guard is dropped.
    pub fn register(&self, build_id: &str, abort_tx: mpsc::Sender<String>) -> Registration {
        self.lock().insert(build_id.to_string(), abort_tx);
        Registration {
            build_id: build_id.to_string(),
            active: self.clone(),
        }
    }

    /// Sends `reason` to every tracked process; returns how many were signalled.
    pub fn abort_all(&self, reason: &str) -> usize {
        let g = self.lock();
        let mut signalled = 0;
        for (build_id, tx) in g.iter() {
            match tx.try_send(reason.to_string()) {
                Ok(()) => signalled += 1,
                Err(e) => tracing::debug!(build_id = %build_id, error = %e, "abort not delivered"),
            }
        }
        signalled
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Registration {
    build_id: String,
    active: ActiveProcesses,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.active.lock().remove(&self.build_id);
    }
}
