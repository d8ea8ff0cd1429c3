//! Entry point tying a store handle and a key layout together.

use std::sync::Arc;

use tracing::info;

use crate::config::{Backend, Settings};
use crate::keys::{KeyLayout, Namespace};
use crate::listing::Catalog;
use crate::resolver::Resolver;
use crate::schema::SchemaRepository;
use crate::store::{MemoryStore, Store};
use crate::Error;

/// Shared handle for one store and layout. Cheap to clone.
///
/// ## Example
///
/// ```no_run
/// use std::sync::Arc;
/// use schemakv::{Client, MemoryStore};
///
/// # async fn demo() -> Result<(), schemakv::Error> {
/// let client = Client::builder()
///     .with_store(Arc::new(MemoryStore::new()))
///     .build()?;
///
/// let web = client.resolver("svc", "web", 1, "prod");
/// let port = web.get_int("port").await?;
/// # let _ = port;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    store: Arc<dyn Store>,
    schemas: SchemaRepository,
    catalog: Arc<Catalog>,
}

impl Client {
    /// Creates a new builder. A store must be attached before building.
    pub fn builder() -> ClientBuilder<()> {
        ClientBuilder {
            store: None,
            layout: KeyLayout::default(),
        }
    }

    /// Opens the backend named by `settings` and builds a client over it.
    pub async fn connect(settings: &Settings) -> Result<Self, Error> {
        let store: Arc<dyn Store> = match settings.store.backend {
            Backend::Memory => Arc::new(MemoryStore::with_watch_capacity(settings.watch.capacity)),
            Backend::Redis => connect_redis(settings).await?,
        };
        info!(
            backend = settings.store.backend.as_str(),
            root = %settings.root,
            "store opened"
        );
        Client::builder()
            .with_store(store)
            .with_layout(settings.layout())
            .build()
    }

    /// Resolver for one namespace, with a fresh cache of its own.
    pub fn resolver(
        &self,
        app: impl Into<String>,
        module: impl Into<String>,
        version: u32,
        config: impl Into<String>,
    ) -> Resolver {
        Resolver::new(
            self.store.clone(),
            self.layout().clone(),
            Namespace::new(app, module, version, config),
        )
    }

    /// Schema registry for this client's store and layout.
    pub fn schemas(&self) -> &SchemaRepository {
        &self.schemas
    }

    /// Listing catalog shared by every clone of this client.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The backing store, for writes that bypass schema validation.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn layout(&self) -> &KeyLayout {
        self.schemas.layout()
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(settings: &Settings) -> Result<Arc<dyn Store>, Error> {
    use crate::config::ConfigError;
    use crate::store::RedisStore;

    let url = settings
        .store
        .url
        .as_deref()
        .ok_or(ConfigError::MissingUrl("redis"))?;
    let store = RedisStore::connect_with(
        url,
        &settings.store.stream,
        settings.store.stream_maxlen,
        settings.watch.capacity,
    )
    .await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_settings: &Settings) -> Result<Arc<dyn Store>, Error> {
    Err(crate::config::ConfigError::UnsupportedBackend("redis").into())
}

/// Builder for [`Client`].
///
/// Starts as `ClientBuilder<()>` and becomes `ClientBuilder<Arc<dyn Store>>`
/// once [`with_store`](ClientBuilder::with_store) is called.
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct ClientBuilder<S> {
    store: Option<S>,
    layout: KeyLayout,
}

impl<S> ClientBuilder<S> {
    /// Sets the key root. Defaults to [`crate::keys::DEFAULT_ROOT`].
    pub fn with_layout(mut self, layout: KeyLayout) -> Self {
        self.layout = layout;
        self
    }
}

impl ClientBuilder<()> {
    pub fn with_store(self, store: Arc<dyn Store>) -> ClientBuilder<Arc<dyn Store>> {
        ClientBuilder {
            store: Some(store),
            layout: self.layout,
        }
    }

    /// Fails with [`Error::MissingStore`]: no store was attached.
    pub fn build(self) -> Result<Client, Error> {
        Err(Error::MissingStore)
    }
}

impl ClientBuilder<Arc<dyn Store>> {
    pub fn build(self) -> Result<Client, Error> {
        let store = self.store.ok_or(Error::MissingStore)?;
        Ok(Client {
            schemas: SchemaRepository::new(store.clone(), self.layout.clone()),
            catalog: Arc::new(Catalog::new(store.clone(), self.layout)),
            store,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldType, Schema};

    #[test]
    fn test_build_without_store_fails() {
        assert!(matches!(Client::builder().build(), Err(Error::MissingStore)));
    }

    #[test]
    fn test_builder_defaults_layout() {
        let client = Client::builder()
            .with_store(Arc::new(MemoryStore::new()))
            .build()
            .unwrap();
        assert_eq!(client.layout().root(), "/remiges/rigel");
    }

    #[tokio::test]
    async fn test_resolver_shares_store() {
        let store = Arc::new(MemoryStore::new());
        let client = Client::builder()
            .with_layout(KeyLayout::new("/r"))
            .with_store(store.clone())
            .build()
            .unwrap();
        client
            .schemas()
            .put_schema("svc", "web", 1, &Schema::new(vec![Field::new("port", FieldType::Int)], ""))
            .await
            .unwrap();

        client.resolver("svc", "web", 1, "prod").set("port", "80").await.unwrap();
        assert_eq!(
            store.get("/r/svc/web/1/config/prod/port").await.unwrap().as_deref(),
            Some("80")
        );

        client.catalog().refresh().await.unwrap();
        assert_eq!(client.catalog().list_configs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_connect_memory_backend() {
        let settings = Settings {
            root: "/apps".into(),
            ..Settings::default()
        };
        let client = Client::connect(&settings).await.unwrap();
        assert_eq!(client.layout().root(), "/apps");
        assert!(client.store().get("/apps/x").await.unwrap().is_none());
    }

    #[cfg(feature = "redis")]
    #[tokio::test]
    async fn test_connect_redis_requires_url() {
        let mut settings = Settings::default();
        settings.store.backend = Backend::Redis;
        assert!(matches!(
            Client::connect(&settings).await,
            Err(Error::Config(crate::config::ConfigError::MissingUrl("redis")))
        ));
    }
}
