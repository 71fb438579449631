use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::SessionStore;

/// Owner of the background sweep started by [`SessionStore::spawn_gc`].
///
/// Dropping the handle also stops the sweep.
pub struct GcHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl GcHandle {
    /// Stop the sweep and wait for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::error!("Session GC task failed: {}", e);
        }
    }
}

impl SessionStore {
    /// Sweep idle sessions every `max_lifetime` until the returned handle is
    /// shut down or dropped. Must be called inside a tokio runtime.
    pub fn spawn_gc(&self, max_lifetime: Duration) -> GcHandle {
        let store = self.clone();
        let (tx, mut rx) = oneshot::channel::<()>();
        let period = max_lifetime.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    _ = ticker.tick() => {
                        store.run_gc(max_lifetime);
                    }
                }
            }
            tracing::debug!("Session GC stopped");
        });

        tracing::info!("Session GC running every {:?}", period);
        GcHandle {
            shutdown: Some(tx),
            task,
        }
    }
}
