//! Loading client settings from files and the environment.

mod builder;
mod env;
mod error;
mod file;
mod settings;
mod source;

pub use builder::SettingsBuilder;
pub use env::EnvSource;
pub use error::ConfigError;
pub use file::FileSource;
pub use settings::{Backend, Settings, StoreSettings, WatchSettings};
pub use source::{merge_at_path, SettingsEntry, SettingsSource};
