//! TOML settings file source.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::source::{SettingsEntry, SettingsSource};
use super::ConfigError;

/// One TOML file, contributed as a whole-table layer at the root.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    required: bool,
}

impl FileSource {
    /// An absent file is an error when `required` and an empty layer otherwise.
    pub fn new(path: impl AsRef<Path>, required: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<Option<toml::Table>, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound && !self.required => {
                debug!(path = %self.path.display(), "optional settings file absent");
                return Ok(None);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::FileNotFound(self.path.clone()));
            }
            Err(source) => {
                return Err(ConfigError::ReadError {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        toml::from_str(&text)
            .map(Some)
            .map_err(|source| ConfigError::ParseError {
                path: self.path.clone(),
                source,
            })
    }
}

impl SettingsSource for FileSource {
    fn entries(&self) -> Result<Vec<SettingsEntry>, ConfigError> {
        Ok(self
            .read_table()?
            .map(SettingsEntry::root)
            .into_iter()
            .collect())
    }
}
