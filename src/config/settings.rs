use serde::{Deserialize, Serialize};

use super::SettingsBuilder;
use crate::keys::{KeyLayout, DEFAULT_ROOT};
use crate::store::{DEFAULT_CHANGE_STREAM, DEFAULT_STREAM_MAXLEN, DEFAULT_WATCH_CAPACITY};

/// Client settings. Every key is optional.
///
/// ```toml
/// root = "/remiges/rigel"
///
/// [store]
/// backend = "redis"
/// url = "redis://127.0.0.1:6379"
/// stream = "schemakv:changes"
/// stream_maxlen = 10000
///
/// [watch]
/// capacity = 100
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub root: String,
    pub store: StoreSettings,
    pub watch: WatchSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            store: StoreSettings::default(),
            watch: WatchSettings::default(),
        }
    }
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Key layout rooted at [`Settings::root`].
    pub fn layout(&self) -> KeyLayout {
        KeyLayout::new(&self.root)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    Redis,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Redis => "redis",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: Backend,
    pub url: Option<String>,
    /// Change stream name, used by the redis backend only.
    pub stream: String,
    /// Approximate length the change stream is trimmed to. Redis backend only.
    pub stream_maxlen: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            url: None,
            stream: DEFAULT_CHANGE_STREAM.to_string(),
            stream_maxlen: DEFAULT_STREAM_MAXLEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Capacity of each watcher's event channel.
    pub capacity: usize,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_WATCH_CAPACITY,
        }
    }
}
