use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("{backend} request failed: {reason}")]
    Backend { backend: &'static str, reason: String },

    #[error("{backend} connection failed: {reason}")]
    Connection { backend: &'static str, reason: String },

    #[error("write to '{key}' rejected")]
    WriteRejected { key: String },
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Backend {
            backend: "redis",
            reason: e.to_string(),
        }
    }
}
