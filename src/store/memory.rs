use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

use super::{Store, StoreError, WatchEvent, DEFAULT_WATCH_CAPACITY};

/// One watcher. Writes enqueue on `queue` without waiting; a forwarder task
/// moves events into the watcher's bounded channel, so a watcher that stops
/// reading stalls only its own forwarder.
#[derive(Debug)]
struct Subscription {
    prefix: String,
    queue: mpsc::UnboundedSender<WatchEvent>,
    out: mpsc::Sender<WatchEvent>,
}

impl Subscription {
    fn is_closed(&self) -> bool {
        self.out.is_closed()
    }
}

async fn forward(mut queue: mpsc::UnboundedReceiver<WatchEvent>, out: mpsc::Sender<WatchEvent>) {
    loop {
        tokio::select! {
            _ = out.closed() => return,
            event = queue.recv() => {
                let Some(event) = event else { return };
                if out.send(event).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// In-process [`Store`] backed by an ordered map.
///
/// Serves single-process deployments and tests. It records how often each
/// key was read and can be told to reject writes to specific keys.
///
/// Each watcher gets events in write order. Events a watcher has not yet
/// taken are buffered per watcher without bound.
#[derive(Debug)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, String>>,
    reads: Mutex<HashMap<String, usize>>,
    rejected: RwLock<HashSet<String>>,
    // Taken before `data` on every write so enqueue order matches write order.
    subscriptions: Mutex<Vec<Subscription>>,
    watch_capacity: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with the default watch channel capacity.
    pub fn new() -> Self {
        Self::with_watch_capacity(DEFAULT_WATCH_CAPACITY)
    }

    /// Creates an empty store whose watch channels hold at most `capacity` events.
    pub fn with_watch_capacity(capacity: usize) -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            reads: Mutex::new(HashMap::new()),
            rejected: RwLock::new(HashSet::new()),
            subscriptions: Mutex::new(Vec::new()),
            watch_capacity: capacity.max(1),
        }
    }

    /// Creates a store pre-populated with `entries`. No events are emitted.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        store
            .data
            .write()
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        store
    }

    /// Number of [`Store::get`] calls made for `key` so far.
    pub fn reads(&self, key: &str) -> usize {
        self.reads.lock().get(key).copied().unwrap_or(0)
    }

    /// Number of [`Store::get`] calls made for any key so far.
    pub fn total_reads(&self) -> usize {
        self.reads.lock().values().sum()
    }

    /// Makes every later [`Store::put`] to `key` fail with [`StoreError::WriteRejected`].
    pub fn reject_writes_to(&self, key: impl Into<String>) {
        self.rejected.write().insert(key.into());
    }

    /// Number of live subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        let mut subs = self.subscriptions.lock();
        subs.retain(|s| !s.is_closed());
        subs.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        *self.reads.lock().entry(key.to_string()).or_insert(0) += 1;
        Ok(self.data.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.rejected.read().contains(key) {
            return Err(StoreError::WriteRejected {
                key: key.to_string(),
            });
        }

        let mut subs = self.subscriptions.lock();
        self.data.write().insert(key.to_string(), value.to_string());

        let before = subs.len();
        subs.retain(|s| !s.is_closed());
        if subs.len() != before {
            debug!(remaining = subs.len(), "pruned closed watch subscriptions");
        }
        for sub in subs.iter().filter(|s| key.starts_with(&s.prefix)) {
            // Fails only once the forwarder has exited; pruned on the next write.
            let _ = sub.queue.send(WatchEvent::new(key, value));
        }
        Ok(())
    }

    async fn get_prefix(&self, prefix: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let data = self.data.read();
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn watch(&self, prefix: &str) -> Result<mpsc::Receiver<WatchEvent>, StoreError> {
        let (queue, pending) = mpsc::unbounded_channel();
        let (out, rx) = mpsc::channel(self.watch_capacity);
        tokio::spawn(forward(pending, out.clone()));
        self.subscriptions.lock().push(Subscription {
            prefix: prefix.to_string(),
            queue,
            out,
        });
        Ok(rx)
    }
}
