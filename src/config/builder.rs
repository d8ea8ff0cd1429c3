use std::path::Path;

use super::env::EnvSource;
use super::file::FileSource;
use super::source::{merge_at_path, SettingsSource};
use super::{ConfigError, Settings};

/// Layered loader for [`Settings`].
///
/// Sources are merged in registration order, later ones overriding earlier
/// ones. Nested tables merge recursively; other values are replaced. Keys
/// no source sets keep their defaults.
///
/// ```no_run
/// use schemakv::Settings;
///
/// // defaults -> file -> SCHEMAKV__STORE__URL etc.
/// let settings = Settings::builder()
///     .with_file("schemakv.toml", false)
///     .with_env("SCHEMAKV", "__")
///     .build()?;
/// # Ok::<(), schemakv::ConfigError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct SettingsBuilder {
    sources: Vec<Box<dyn SettingsSource>>,
}

impl SettingsBuilder {
    /// Adds a TOML file. A missing file fails the build only if `required`.
    pub fn with_file(self, path: impl AsRef<Path>, required: bool) -> Self {
        self.with_source(FileSource::new(path, required))
    }

    /// Adds environment variables named `<prefix><separator><path...>`.
    ///
    /// Path segments are lowercased, so with prefix `SCHEMAKV` and separator
    /// `__`, `SCHEMAKV__WATCH__CAPACITY=16` sets `watch.capacity`.
    pub fn with_env(self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.with_source(EnvSource::new(prefix, separator))
    }

    pub fn with_source(mut self, source: impl SettingsSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn build(self) -> Result<Settings, ConfigError> {
        let mut merged = toml::Table::new();
        for source in &self.sources {
            for entry in source.entries()? {
                merge_at_path(&mut merged, &entry.path, entry.value);
            }
        }

        toml::Value::Table(merged)
            .try_into()
            .map_err(ConfigError::DeserializeError)
    }
}
