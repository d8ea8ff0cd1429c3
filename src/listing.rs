//! Enumerating stored schemas and named configs from a [`KeyTree`].
//!
//! The tree only supplies structure. Descriptions are point reads against
//! the store, so a listing reflects descriptions as of the read even when
//! the tree itself is an older snapshot.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::keys::{KeyLayout, CONFIG_SEGMENT};
use crate::store::Store;
use crate::tree::{KeyTree, Node};
use crate::Error;

/// One stored schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaSummary {
    pub app: String,
    pub module: String,
    pub version: u32,
    pub description: String,
}

/// One named config of a schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSummary {
    pub app: String,
    pub module: String,
    pub version: u32,
    pub config: String,
    pub description: String,
}

struct VersionNode<'a> {
    app: &'a str,
    module: &'a str,
    version: u32,
    node: &'a Node,
}

/// Every app → module → version below the root, skipping version segments
/// that are not decimal integers.
fn versions<'a>(tree: &'a KeyTree, layout: &KeyLayout) -> Vec<VersionNode<'a>> {
    let Some(root) = tree.node(layout.root()) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for app in root.children.values() {
        for module in app.children.values() {
            for version in module.children.values() {
                match version.name.parse::<u32>() {
                    Ok(number) => out.push(VersionNode {
                        app: &app.name,
                        module: &module.name,
                        version: number,
                        node: version,
                    }),
                    Err(_) => warn!(path = %version.full_path, "skipping non-numeric version"),
                }
            }
        }
    }
    out
}

async fn description(store: &dyn Store, key: &str) -> Result<String, Error> {
    Ok(store.get(key).await?.unwrap_or_default())
}

/// One summary per `<app>/<module>/<version>` in `tree`, with the stored
/// schema description.
pub async fn list_schemas(
    tree: &KeyTree,
    store: &dyn Store,
    layout: &KeyLayout,
) -> Result<Vec<SchemaSummary>, Error> {
    let mut schemas = Vec::new();
    for v in versions(tree, layout) {
        let key = layout.schema_description_path(v.app, v.module, v.version);
        schemas.push(SchemaSummary {
            app: v.app.to_string(),
            module: v.module.to_string(),
            version: v.version,
            description: description(store, &key).await?,
        });
    }
    Ok(schemas)
}

/// One summary per named config under every schema version in `tree`.
pub async fn list_configs(
    tree: &KeyTree,
    store: &dyn Store,
    layout: &KeyLayout,
) -> Result<Vec<ConfigSummary>, Error> {
    let mut configs = Vec::new();
    for v in versions(tree, layout) {
        let Some(config_root) = v.node.get(CONFIG_SEGMENT) else {
            continue;
        };
        for config in config_root.children.values() {
            let key = layout.config_description_path(v.app, v.module, v.version, &config.name);
            configs.push(ConfigSummary {
                app: v.app.to_string(),
                module: v.module.to_string(),
                version: v.version,
                config: config.name.clone(),
                description: description(store, &key).await?,
            });
        }
    }
    Ok(configs)
}

/// Listing front end holding the latest [`KeyTree`] snapshot.
///
/// [`Catalog::refresh`] builds a complete new tree from a fresh store dump
/// and swaps it in; callers holding an earlier [`Catalog::tree`] keep
/// reading the snapshot they got.
#[derive(Debug)]
pub struct Catalog {
    store: Arc<dyn Store>,
    layout: KeyLayout,
    tree: ArcSwap<KeyTree>,
}

impl Catalog {
    /// Creates an empty catalog. Call [`Catalog::refresh`] before listing.
    pub fn new(store: Arc<dyn Store>, layout: KeyLayout) -> Self {
        Self {
            store,
            layout,
            tree: ArcSwap::from_pointee(KeyTree::default()),
        }
    }

    /// Rebuilds the tree from everything under the layout root and publishes it.
    /// Readers holding the previous tree keep it.
    pub async fn refresh(&self) -> Result<Arc<KeyTree>, Error> {
        let dump = self.store.get_prefix(self.layout.root()).await?;
        let entries = dump.len();
        let tree = Arc::new(KeyTree::build(dump));
        self.tree.store(tree.clone());
        debug!(entries, "key tree rebuilt");
        Ok(tree)
    }

    /// Most recently published tree. Empty until the first [`Catalog::refresh`].
    pub fn tree(&self) -> Arc<KeyTree> {
        self.tree.load_full()
    }

    pub async fn list_schemas(&self) -> Result<Vec<SchemaSummary>, Error> {
        list_schemas(&self.tree(), self.store.as_ref(), &self.layout).await
    }

    pub async fn list_configs(&self) -> Result<Vec<ConfigSummary>, Error> {
        list_configs(&self.tree(), self.store.as_ref(), &self.layout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError, WatchEvent};
    use std::collections::BTreeMap;
    use tokio::sync::mpsc;

    fn seeded() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_entries([
            ("/r/svc/web/1/fields", "[]"),
            ("/r/svc/web/1/description", "web v1"),
            ("/r/svc/web/1/config/prod/port", "80"),
            ("/r/svc/web/1/config/prod/description", "production"),
            ("/r/svc/web/1/config/dev/port", "8080"),
            ("/r/svc/web/2/fields", "[]"),
            ("/r/svc/web/latest/fields", "[]"),
            ("/r/svc/api/3/fields", "[]"),
            ("/r/svc/api/3/description", "api v3"),
        ]))
    }

    #[tokio::test]
    async fn test_list_schemas() {
        let store = seeded();
        let catalog = Catalog::new(store, KeyLayout::new("/r"));
        catalog.refresh().await.unwrap();

        let schemas = catalog.list_schemas().await.unwrap();
        let summary: Vec<_> = schemas
            .iter()
            .map(|s| (s.module.as_str(), s.version, s.description.as_str()))
            .collect();
        assert_eq!(
            summary,
            [("api", 3, "api v3"), ("web", 1, "web v1"), ("web", 2, "")]
        );
        assert!(schemas.iter().all(|s| s.app == "svc"));
    }

    #[tokio::test]
    async fn test_list_configs() {
        let store = seeded();
        let catalog = Catalog::new(store, KeyLayout::new("/r"));
        catalog.refresh().await.unwrap();

        let configs = catalog.list_configs().await.unwrap();
        assert_eq!(
            configs,
            vec![
                ConfigSummary {
                    app: "svc".into(),
                    module: "web".into(),
                    version: 1,
                    config: "dev".into(),
                    description: "".into(),
                },
                ConfigSummary {
                    app: "svc".into(),
                    module: "web".into(),
                    version: 1,
                    config: "prod".into(),
                    description: "production".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_store_lists_nothing() {
        let catalog = Catalog::new(Arc::new(MemoryStore::new()), KeyLayout::new("/r"));
        catalog.refresh().await.unwrap();
        assert!(catalog.list_schemas().await.unwrap().is_empty());
        assert!(catalog.list_configs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_descriptions_are_read_live() {
        let store = seeded();
        let tree = KeyTree::build(store.get_prefix("/r").await.unwrap());
        store.put("/r/svc/web/2/description", "web v2").await.unwrap();

        let schemas = list_schemas(&tree, store.as_ref(), &KeyLayout::new("/r"))
            .await
            .unwrap();
        assert_eq!(schemas[2].description, "web v2");
    }

    #[tokio::test]
    async fn test_refresh_leaves_held_snapshot_alone() {
        let store = seeded();
        let catalog = Catalog::new(store.clone(), KeyLayout::new("/r"));
        let before = catalog.refresh().await.unwrap();

        store.put("/r/svc/jobs/1/fields", "[]").await.unwrap();
        let after = catalog.refresh().await.unwrap();

        assert!(before.node("/r/svc/jobs").is_none());
        assert!(after.node("/r/svc/jobs/1").is_some());
        assert!(Arc::ptr_eq(&after, &catalog.tree()));
    }

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait::async_trait]
    impl Store for Unreachable {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Connection {
                backend: "test",
                reason: "unreachable".into(),
            })
        }

        async fn put(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get_prefix(&self, _prefix: &str) -> Result<BTreeMap<String, String>, StoreError> {
            Ok(BTreeMap::new())
        }

        async fn watch(&self, _prefix: &str) -> Result<mpsc::Receiver<WatchEvent>, StoreError> {
            Ok(mpsc::channel(1).1)
        }
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let tree = KeyTree::build([("/r/svc/web/1/fields", "[]")]);
        let result = list_schemas(&tree, &Unreachable, &KeyLayout::new("/r")).await;
        assert!(matches!(result, Err(Error::Store(StoreError::Connection { .. }))));
    }
}
