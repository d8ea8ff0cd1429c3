//! Canonical storage key layout.
//!
//! Every key is `<root>/<app>/<module>/<version>/...` joined with `/`:
//!
//! ```text
//! <root>/<app>/<module>/<version>/fields
//! <root>/<app>/<module>/<version>/description
//! <root>/<app>/<module>/<version>/config/<config>/<field>
//! ```
//!
//! Names are inserted verbatim. Keeping the separator out of app, module,
//! config and field names is the caller's job; nothing here escapes or
//! rejects them.

use std::fmt;
use std::sync::Arc;

/// Segment separator of every key.
pub const SEPARATOR: char = '/';

/// Root used when none is configured.
pub const DEFAULT_ROOT: &str = "/remiges/rigel";

pub const FIELDS_SEGMENT: &str = "fields";
pub const DESCRIPTION_SEGMENT: &str = "description";
pub const CONFIG_SEGMENT: &str = "config";

/// The four-part address of one set of configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Namespace {
    pub app: String,
    pub module: String,
    pub version: u32,
    pub config: String,
}

impl Namespace {
    pub fn new(
        app: impl Into<String>,
        module: impl Into<String>,
        version: u32,
        config: impl Into<String>,
    ) -> Self {
        Self {
            app: app.into(),
            module: module.into(),
            version,
            config: config.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.app, self.module, self.version, self.config
        )
    }
}

/// Builds storage keys under a fixed root. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    root: Arc<str>,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl KeyLayout {
    /// A trailing separator on `root` is dropped.
    pub fn new(root: impl AsRef<str>) -> Self {
        let root = root.as_ref().trim_end_matches(SEPARATOR);
        Self { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// `<root>/<app>`
    pub fn app_path(&self, app: &str) -> String {
        format!("{}/{app}", self.root)
    }

    /// `<root>/<app>/<module>`, the parent of every schema version of a module.
    pub fn module_path(&self, app: &str, module: &str) -> String {
        format!("{}/{app}/{module}", self.root)
    }

    /// Directory of one schema version. Holds the field list, the schema
    /// description and the `config` subtree.
    pub fn schema_base_path(&self, app: &str, module: &str, version: u32) -> String {
        format!("{}/{app}/{module}/{version}", self.root)
    }

    /// Key holding the schema's field list as a JSON array.
    pub fn schema_fields_path(&self, app: &str, module: &str, version: u32) -> String {
        format!(
            "{}/{FIELDS_SEGMENT}",
            self.schema_base_path(app, module, version)
        )
    }

    pub fn schema_description_path(&self, app: &str, module: &str, version: u32) -> String {
        format!(
            "{}/{DESCRIPTION_SEGMENT}",
            self.schema_base_path(app, module, version)
        )
    }

    /// Parent of every named config of one schema version.
    pub fn config_root_path(&self, app: &str, module: &str, version: u32) -> String {
        format!(
            "{}/{CONFIG_SEGMENT}",
            self.schema_base_path(app, module, version)
        )
    }

    /// Directory of one named config. Not a key by itself.
    pub fn config_namespace_path(
        &self,
        app: &str,
        module: &str,
        version: u32,
        config: &str,
    ) -> String {
        format!("{}/{config}", self.config_root_path(app, module, version))
    }

    /// Key of a single config value.
    pub fn config_field_path(
        &self,
        app: &str,
        module: &str,
        version: u32,
        config: &str,
        field: &str,
    ) -> String {
        format!(
            "{}/{field}",
            self.config_namespace_path(app, module, version, config)
        )
    }

    /// The named config's description sits beside its values as a `description` entry.
    pub fn config_description_path(
        &self,
        app: &str,
        module: &str,
        version: u32,
        config: &str,
    ) -> String {
        self.config_field_path(app, module, version, config, DESCRIPTION_SEGMENT)
    }

    /// [`KeyLayout::config_field_path`] for a [`Namespace`].
    pub fn field_key(&self, ns: &Namespace, field: &str) -> String {
        self.config_field_path(&ns.app, &ns.module, ns.version, &ns.config, field)
    }

    /// Prefix covering every value key of `ns` and nothing of a sibling config.
    pub fn namespace_prefix(&self, ns: &Namespace) -> String {
        let mut prefix = self.config_namespace_path(&ns.app, &ns.module, ns.version, &ns.config);
        prefix.push(SEPARATOR);
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_paths() {
        let layout = KeyLayout::new("/r");
        assert_eq!(layout.schema_fields_path("svc", "web", 1), "/r/svc/web/1/fields");
        assert_eq!(
            layout.schema_description_path("svc", "web", 12),
            "/r/svc/web/12/description"
        );
    }

    #[test]
    fn test_config_paths() {
        let layout = KeyLayout::new("/r");
        assert_eq!(
            layout.config_namespace_path("svc", "web", 3, "prod"),
            "/r/svc/web/3/config/prod"
        );
        assert_eq!(
            layout.config_field_path("svc", "web", 3, "prod", "port"),
            "/r/svc/web/3/config/prod/port"
        );
        assert_eq!(
            layout.config_description_path("svc", "web", 3, "prod"),
            "/r/svc/web/3/config/prod/description"
        );
    }

    #[test]
    fn test_default_root() {
        let layout = KeyLayout::default();
        assert_eq!(
            layout.schema_fields_path("a", "m", 1),
            "/remiges/rigel/a/m/1/fields"
        );
    }

    #[test]
    fn test_trailing_separator_on_root_is_dropped() {
        assert_eq!(KeyLayout::new("/r/").root(), "/r");
    }

    #[test]
    fn test_namespace_prefix_excludes_sibling_configs() {
        let layout = KeyLayout::new("/r");
        let prod = Namespace::new("svc", "web", 1, "prod");
        let prefix = layout.namespace_prefix(&prod);
        assert!(layout.field_key(&prod, "port").starts_with(&prefix));

        let prod2 = Namespace::new("svc", "web", 1, "prod2");
        assert!(!layout.field_key(&prod2, "port").starts_with(&prefix));
    }

    #[test]
    fn test_version_has_no_leading_zeros() {
        let layout = KeyLayout::new("/r");
        assert_eq!(layout.schema_base_path("a", "m", 7), "/r/a/m/7");
        assert_eq!(layout.schema_base_path("a", "m", 0), "/r/a/m/0");
    }
}
