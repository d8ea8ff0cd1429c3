//! Keeping a resolver's cache current from store change events.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::Resolver;
use crate::cache::Cache;
use crate::store::WatchEvent;
use crate::Error;

/// Running cache refresher started by [`Resolver::start_watching`].
///
/// Dropping the handle stops the task, as does [`WatchHandle::stop`]. The
/// task also ends on its own once the store closes the event stream or the
/// resolver that started it is dropped.
#[derive(Debug)]
pub struct WatchHandle {
    prefix: String,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Namespace prefix the task subscribed to.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether the task has exited, for any reason.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the task and waits for it to exit.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = (&mut self.task).await;
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

/// Applies one change event. Returns whether the cache was touched.
///
/// Only keys the cache already holds are refreshed, so events for values
/// this process never read cannot grow the cache.
pub(crate) fn refresh(cache: &dyn Cache, event: &WatchEvent) -> bool {
    cache.set_if_present(&event.key, &event.value)
}

impl Resolver {
    /// Subscribes to changes under this namespace and to its schema's field
    /// list, and refreshes whatever of those the cache holds.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start_watching(&self) -> Result<WatchHandle, Error> {
        let prefix = self.layout().namespace_prefix(&self.namespace);
        let mut values = self.store.watch(&prefix).await?;
        let mut schema = self.store.watch(&self.fields_key()).await?;
        let cache = Arc::downgrade(&self.cache);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task_prefix = prefix.clone();
        let task = tokio::spawn(async move {
            info!(prefix = %task_prefix, "watching namespace");
            loop {
                let event = tokio::select! {
                    _ = &mut stop_rx => {
                        debug!(prefix = %task_prefix, "watch stopped");
                        break;
                    }
                    event = values.recv() => event,
                    event = schema.recv() => event,
                };
                let Some(event) = event else {
                    info!(prefix = %task_prefix, "store closed watch stream");
                    break;
                };
                let Some(cache) = cache.upgrade() else {
                    debug!(prefix = %task_prefix, "resolver dropped, ending watch");
                    break;
                };
                if refresh(cache.as_ref(), &event) {
                    debug!(key = %event.key, "cache entry refreshed");
                }
            }
        });

        Ok(WatchHandle {
            prefix,
            stop: Some(stop_tx),
            task,
        })
    }
}
