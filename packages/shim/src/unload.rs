//! Callbacks applet code wants run before the frame is torn down.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

type UnloadFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type UnloadCallback = Arc<dyn Fn() -> UnloadFuture + Send + Sync>;

/// Handle for revoking a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnloadId(u64);

impl std::fmt::Display for UnloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Before-unload callbacks, keyed by a monotonically increasing id.
#[derive(Default)]
pub struct BeforeUnloadRegistry {
    next_id: AtomicU64,
    callbacks: Mutex<BTreeMap<UnloadId, UnloadCallback>>,
}

impl BeforeUnloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register<F, Fut>(&self, callback: F) -> UnloadId
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = UnloadId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let callback: UnloadCallback = Arc::new(move || -> UnloadFuture { Box::pin(callback()) });
        self.callbacks.lock().await.insert(id, callback);
        id
    }

    /// Returns false if the id was not registered.
    pub async fn unregister(&self, id: UnloadId) -> bool {
        self.callbacks.lock().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.callbacks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.callbacks.lock().await.is_empty()
    }

    /// Run every registered callback, one after another, and return once
    /// all of them have finished. Callbacks may register or unregister
    /// others while running; those changes apply to the next teardown.
    pub async fn run_all(&self) -> usize {
        let callbacks: Vec<(UnloadId, UnloadCallback)> = self
            .callbacks
            .lock()
            .await
            .iter()
            .map(|(id, callback)| (*id, callback.clone()))
            .collect();

        for (id, callback) in &callbacks {
            debug!(callback = %id, "running before-unload callback");
            callback().await;
        }
        callbacks.len()
    }
}
