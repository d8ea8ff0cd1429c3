use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::streams::StreamMaxlen;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    Store, StoreError, WatchEvent, DEFAULT_CHANGE_STREAM, DEFAULT_STREAM_MAXLEN,
    DEFAULT_WATCH_CAPACITY,
};

const XREAD_BLOCK_MS: usize = 1000;
const XREAD_BATCH: usize = 64;

/// [`Store`] over Redis strings.
///
/// Redis has no prefix watch of its own, so each put also appends a
/// `{key, value}` record to a change stream in the same atomic pipeline.
/// Watchers tail that stream and keep the records under their prefix.
/// The stream is trimmed to roughly `stream_maxlen` records on every write,
/// so a watcher that falls further behind than that misses changes.
pub struct RedisStore {
    client: Arc<redis::Client>,
    connection_manager: redis::aio::ConnectionManager,
    stream: String,
    stream_maxlen: usize,
    watch_capacity: usize,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("stream", &self.stream)
            .field("stream_maxlen", &self.stream_maxlen)
            .field("watch_capacity", &self.watch_capacity)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connects with the default change stream and limits.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        Self::connect_with(
            url,
            DEFAULT_CHANGE_STREAM,
            DEFAULT_STREAM_MAXLEN,
            DEFAULT_WATCH_CAPACITY,
        )
        .await
    }

    pub async fn connect_with(
        url: &str,
        stream: &str,
        stream_maxlen: usize,
        watch_capacity: usize,
    ) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError::Connection {
            backend: "redis",
            reason: e.to_string(),
        })?;
        let connection_manager =
            client
                .get_connection_manager()
                .await
                .map_err(|e| StoreError::Connection {
                    backend: "redis",
                    reason: e.to_string(),
                })?;

        info!(stream, stream_maxlen, "connected to redis store");
        Ok(Self {
            client: Arc::new(client),
            connection_manager,
            stream: stream.to_string(),
            stream_maxlen: stream_maxlen.max(1),
            watch_capacity: watch_capacity.max(1),
        })
    }
}

/// Escapes glob metacharacters so `prefix` matches literally in `KEYS`.
fn glob_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('*');
    pattern
}

/// SET plus a trimmed XADD of the same change, applied as one transaction.
fn write_pipeline(key: &str, value: &str, stream: &str, maxlen: usize) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .set(key, value)
        .ignore()
        .xadd_maxlen(
            stream,
            StreamMaxlen::Approx(maxlen),
            "*",
            &[("key", key), ("value", value)],
        )
        .ignore();
    pipe
}

fn field_string(map: &std::collections::HashMap<String, redis::Value>, name: &str) -> Option<String> {
    map.get(name)
        .and_then(|v| redis::from_redis_value::<String>(v.clone()).ok())
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection_manager.clone();
        Ok(conn.get(key).await?)
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.connection_manager.clone();
        let _: () = write_pipeline(key, value, &self.stream, self.stream_maxlen)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_prefix(&self, prefix: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let mut conn = self.connection_manager.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(glob_prefix(prefix))
            .query_async(&mut conn)
            .await?;
        if keys.is_empty() {
            return Ok(BTreeMap::new());
        }

        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        // Keys deleted between KEYS and MGET come back as nil.
        Ok(keys
            .into_iter()
            .zip(values)
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect())
    }

    async fn watch(&self, prefix: &str) -> Result<mpsc::Receiver<WatchEvent>, StoreError> {
        let (tx, rx) = mpsc::channel(self.watch_capacity);
        let mut conn = self
            .client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connection {
                backend: "redis",
                reason: e.to_string(),
            })?;
        let stream = self.stream.clone();
        let prefix = prefix.to_string();

        // Tail from the newest entry at subscription time. "$" would be
        // re-evaluated on every XREAD and skip writes between reads.
        let newest: redis::streams::StreamRangeReply =
            conn.xrevrange_count(&stream, "+", "-", 1).await?;
        let mut last_id = newest
            .ids
            .first()
            .map(|entry| entry.id.clone())
            .unwrap_or_else(|| "0-0".to_string());

        tokio::spawn(async move {
            debug!(%prefix, %stream, %last_id, "tailing redis change stream");

            loop {
                if tx.is_closed() {
                    debug!(%prefix, "watch receiver dropped");
                    return;
                }

                let opts = redis::streams::StreamReadOptions::default()
                    .block(XREAD_BLOCK_MS)
                    .count(XREAD_BATCH);
                let result: Result<Option<redis::streams::StreamReadReply>, redis::RedisError> =
                    conn.xread_options(&[&stream], &[&last_id], &opts).await;

                match result {
                    Ok(Some(reply)) => {
                        for stream_key in reply.keys {
                            for record in stream_key.ids {
                                let key = field_string(&record.map, "key");
                                let value = field_string(&record.map, "value");
                                last_id = record.id;
                                let (Some(key), Some(value)) = (key, value) else {
                                    warn!(id = %last_id, "malformed change record");
                                    continue;
                                };
                                if !key.starts_with(&prefix) {
                                    continue;
                                }
                                if tx.send(WatchEvent { key, value }).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, %prefix, "change stream read failed, retrying");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(rx)
    }
}
