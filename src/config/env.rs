use toml::Value;

use super::source::{SettingsEntry, SettingsSource};
use super::ConfigError;

/// Maps `<PREFIX><SEP>A<SEP>B=v` environment variables to `a.b = v`.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    separator: String,
}

impl EnvSource {
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        assert!(!separator.is_empty(), "separator must not be empty");
        Self {
            prefix: prefix.into(),
            separator,
        }
    }

    fn entries_from<I>(&self, vars: I) -> Vec<SettingsEntry>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let prefix_with_sep = format!("{}{}", self.prefix, self.separator);
        vars.into_iter()
            .filter_map(|(key, value)| {
                let path_str = key.strip_prefix(&prefix_with_sep)?;
                if path_str.is_empty() {
                    return None;
                }
                let path = path_str
                    .split(&self.separator)
                    .map(|s| s.to_lowercase())
                    .collect();
                Some(SettingsEntry::at_path(path, coerce_value(&value)))
            })
            .collect()
    }
}

impl SettingsSource for EnvSource {
    fn entries(&self) -> Result<Vec<SettingsEntry>, ConfigError> {
        Ok(self.entries_from(std::env::vars()))
    }
}

/// Picks the most specific TOML type for an environment string: bool,
/// integer, float, then string.
fn coerce_value(s: &str) -> Value {
    if s.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }

    if looks_like_integer(s) {
        if let Ok(i) = s.parse::<i64>() {
            return Value::Integer(i);
        }
    }

    if s.contains('.') {
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
    }

    Value::String(s.to_string())
}

fn looks_like_integer(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
