//! Namespace-scoped reads and writes of configuration values.

mod load;
mod watch;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cache::{Cache, MemoryCache};
use crate::keys::{KeyLayout, Namespace, DESCRIPTION_SEGMENT};
use crate::schema::{self, Field, FieldType, Schema, SchemaRepository, TypedValue};
use crate::store::Store;
use crate::Error;

use load::{LoadError, RecordDeserializer};
pub use watch::WatchHandle;

/// Resolves field values of one [`Namespace`].
///
/// A resolver is immutable: the `with_*` methods return a new resolver for
/// a different namespace that shares the store handle and starts with an
/// empty cache of its own. Reads go through the cache; writes go to the
/// store first and reach the cache only once the store accepted them.
///
/// ```no_run
/// # async fn demo(client: schemakv::Client) -> Result<(), schemakv::Error> {
/// let web = client.resolver("svc", "web", 1, "prod");
/// web.set("port", "8080").await?;
/// let port = web.get_int("port").await?;
///
/// let staging = web.with_config("staging");
/// # let _ = (port, staging);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Resolver {
    store: Arc<dyn Store>,
    schemas: SchemaRepository,
    cache: Arc<dyn Cache>,
    namespace: Namespace,
}

impl Resolver {
    pub fn new(store: Arc<dyn Store>, layout: KeyLayout, namespace: Namespace) -> Self {
        Self {
            schemas: SchemaRepository::new(store.clone(), layout),
            store,
            cache: Arc::new(MemoryCache::new()),
            namespace,
        }
    }

    /// Replaces the cache. The cache must not be shared with another resolver.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn layout(&self) -> &KeyLayout {
        self.schemas.layout()
    }

    /// Values and the schema field list this resolver has read, keyed by
    /// storage key. The `with_*` derivations start with an empty one.
    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    /// A resolver for `namespace` over the same store and layout.
    pub fn with_namespace(&self, namespace: Namespace) -> Self {
        Self::new(self.store.clone(), self.layout().clone(), namespace)
    }

    pub fn with_app(&self, app: impl Into<String>) -> Self {
        self.with_namespace(Namespace {
            app: app.into(),
            ..self.namespace.clone()
        })
    }

    pub fn with_module(&self, module: impl Into<String>) -> Self {
        self.with_namespace(Namespace {
            module: module.into(),
            ..self.namespace.clone()
        })
    }

    pub fn with_version(&self, version: u32) -> Self {
        self.with_namespace(Namespace {
            version,
            ..self.namespace.clone()
        })
    }

    pub fn with_config(&self, config: impl Into<String>) -> Self {
        self.with_namespace(Namespace {
            config: config.into(),
            ..self.namespace.clone()
        })
    }

    fn field_key(&self, field: &str) -> String {
        self.layout().field_key(&self.namespace, field)
    }

    fn fields_key(&self) -> String {
        let ns = &self.namespace;
        self.layout().schema_fields_path(&ns.app, &ns.module, ns.version)
    }

    /// Field list of the namespace's schema, read through the cache.
    ///
    /// The raw payload is cached under its own storage key, so the watch
    /// task keeps it current the same way it does values.
    async fn fields(&self) -> Result<Vec<Field>, Error> {
        let key = self.fields_key();
        if let Some(raw) = self.cache.get(&key) {
            return schema::decode_fields(key, &raw);
        }

        let raw = self.schemas.read_fields(&key).await?;
        let fields = schema::decode_fields(key.clone(), &raw)?;
        debug!(%key, "schema cached from store");
        self.cache.set(&key, &raw);
        Ok(fields)
    }

    async fn field(&self, name: &str) -> Result<Field, Error> {
        schema::find_field(self.fields().await?, name)
    }

    /// The schema this namespace's values are typed by.
    pub async fn schema(&self) -> Result<Schema, Error> {
        let ns = &self.namespace;
        self.schemas.get_schema(&ns.app, &ns.module, ns.version).await
    }

    /// Whether the schema declares `field`. Says nothing about a stored value.
    pub async fn key_exists(&self, field: &str) -> Result<bool, Error> {
        Ok(self.fields().await?.iter().any(|f| f.name == field))
    }

    /// Cached value of `field`, reading through to the store on a miss.
    async fn resolve(&self, field: &Field) -> Result<String, Error> {
        let key = self.field_key(&field.name);
        if let Some(value) = self.cache.get(&key) {
            debug!(%key, "cache hit");
            return Ok(value);
        }

        let Some(value) = self.store.get(&key).await? else {
            // A schema field that was never written reports like an unknown one.
            return Err(Error::field_not_found(&field.name));
        };
        debug!(%key, "cache filled from store");
        self.cache.set(&key, &value);
        Ok(value)
    }

    /// Raw stored value of `field`.
    pub async fn get(&self, field: &str) -> Result<String, Error> {
        let field = self.field(field).await?;
        self.resolve(&field).await
    }

    /// Value of `field` converted to its declared type.
    pub async fn get_typed(&self, field: &str) -> Result<TypedValue, Error> {
        let field = self.field(field).await?;
        let raw = self.resolve(&field).await?;
        schema::coerce(&raw, field.kind)
    }

    /// Same as [`Resolver::get`]; every stored value is already a string.
    pub async fn get_string(&self, field: &str) -> Result<String, Error> {
        self.get(field).await
    }

    /// The raw value parsed as `i64`, whatever type the schema declares.
    pub async fn get_int(&self, field: &str) -> Result<i64, Error> {
        let raw = self.get(field).await?;
        raw.parse().map_err(|_| Error::TypeConversion {
            value: raw,
            expected: FieldType::Int,
        })
    }

    /// The raw value parsed as a finite `f64`.
    pub async fn get_float(&self, field: &str) -> Result<f64, Error> {
        let raw = self.get(field).await?;
        match raw.parse::<f64>() {
            Ok(x) if x.is_finite() => Ok(x),
            _ => Err(Error::TypeConversion {
                value: raw,
                expected: FieldType::Float,
            }),
        }
    }

    pub async fn get_bool(&self, field: &str) -> Result<bool, Error> {
        let raw = self.get(field).await?;
        schema::parse_bool(&raw).ok_or(Error::TypeConversion {
            value: raw,
            expected: FieldType::Bool,
        })
    }

    /// Validates `value` against the field's schema entry and stores it.
    pub async fn set(&self, field: &str, value: &str) -> Result<(), Error> {
        let field = self.field(field).await?;
        schema::check(value, &field)?;

        let key = self.field_key(&field.name);
        self.store.put(&key, value).await?;
        self.cache.set(&key, value);
        debug!(%key, "value written");
        Ok(())
    }

    /// Resolves every schema field and decodes the result into `T`.
    ///
    /// `T` has to deserialize as a struct or a map. Nothing is returned
    /// unless every field resolves and converts.
    pub async fn load_config<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let mut record = serde_json::Map::new();
        for field in self.fields().await? {
            let raw = self.resolve(&field).await?;
            let value = schema::coerce(&raw, field.kind)?;
            record.insert(field.name, value.into());
        }

        T::deserialize(RecordDeserializer::new(record)).map_err(|e| match e {
            LoadError::NotARecord => Error::InvalidTarget {
                found: std::any::type_name::<T>().to_string(),
            },
            LoadError::Decode(msg) => Error::Load(msg),
        })
    }

    /// Every value stored under this namespace, keyed by field name.
    ///
    /// This reads the store directly and does not consult the schema, so it
    /// also reports values of fields the current schema no longer declares.
    pub async fn values(&self) -> Result<BTreeMap<String, String>, Error> {
        let prefix = self.layout().namespace_prefix(&self.namespace);
        let dump = self.store.get_prefix(&prefix).await?;
        Ok(dump
            .into_iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(&prefix)?;
                (name != DESCRIPTION_SEGMENT).then(|| (name.to_string(), value))
            })
            .collect())
    }

    /// Description of the named config, `""` when none was stored.
    pub async fn description(&self) -> Result<String, Error> {
        let ns = &self.namespace;
        let key = self
            .layout()
            .config_description_path(&ns.app, &ns.module, ns.version, &ns.config);
        Ok(self.store.get(&key).await?.unwrap_or_default())
    }

    pub async fn set_description(&self, description: &str) -> Result<(), Error> {
        let ns = &self.namespace;
        let key = self
            .layout()
            .config_description_path(&ns.app, &ns.module, ns.version, &ns.config);
        self.store.put(&key, description).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Constraints;
    use crate::store::MemoryStore;
    use serde::Deserialize;

    fn layout() -> KeyLayout {
        KeyLayout::new("/r")
    }

    async fn seeded() -> (Arc<MemoryStore>, Resolver) {
        let store = Arc::new(MemoryStore::new());
        let schema = Schema::new(
            vec![
                Field::new("host", FieldType::String)
                    .with_constraints(Constraints::range(1.0, 64.0)),
                Field::new("port", FieldType::Int)
                    .with_constraints(Constraints::range(1.0, 65535.0)),
                Field::new("ratio", FieldType::Float),
                Field::new("tls", FieldType::Bool),
            ],
            "web server",
        );
        SchemaRepository::new(store.clone(), layout())
            .put_schema("svc", "web", 1, &schema)
            .await
            .unwrap();
        let resolver = Resolver::new(store.clone(), layout(), Namespace::new("svc", "web", 1, "prod"));
        (store, resolver)
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let (_store, r) = seeded().await;
        r.set("host", "example.com").await.unwrap();
        assert_eq!(r.get("host").await.unwrap(), "example.com");
    }

    #[tokio::test]
    async fn test_unknown_field_fails_both_ways() {
        let (_store, r) = seeded().await;
        assert!(matches!(r.get("nope").await, Err(Error::FieldNotFound { .. })));
        assert!(matches!(r.set("nope", "1").await, Err(Error::FieldNotFound { .. })));
        assert!(!r.key_exists("nope").await.unwrap());
        assert!(r.key_exists("port").await.unwrap());
    }

    #[tokio::test]
    async fn test_declared_but_unset_field_is_field_not_found() {
        let (_store, r) = seeded().await;
        assert!(matches!(r.get("port").await, Err(Error::FieldNotFound { field }) if field == "port"));
    }

    #[tokio::test]
    async fn test_missing_schema_propagates_not_found() {
        let store = Arc::new(MemoryStore::new());
        let r = Resolver::new(store, layout(), Namespace::new("svc", "web", 9, "prod"));
        assert!(matches!(r.key_exists("port").await, Err(Error::NotFound { .. })));
        assert!(matches!(r.get("port").await, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_second_get_is_served_from_cache() {
        let (store, r) = seeded().await;
        let key = "/r/svc/web/1/config/prod/host";
        store.put(key, "a.example").await.unwrap();

        assert_eq!(r.get("host").await.unwrap(), "a.example");
        let reads_after_first = store.total_reads();
        assert_eq!(r.get("host").await.unwrap(), "a.example");

        assert_eq!(store.total_reads(), reads_after_first);
        assert_eq!(store.reads(key), 1);
        assert_eq!(store.reads("/r/svc/web/1/fields"), 1);
    }

    #[tokio::test]
    async fn test_schema_is_cached_per_resolver() {
        let (store, r) = seeded().await;
        assert!(r.key_exists("port").await.unwrap());

        let replacement = Schema::new(vec![Field::new("other", FieldType::Bool)], "");
        SchemaRepository::new(store.clone(), layout())
            .put_schema("svc", "web", 1, &replacement)
            .await
            .unwrap();

        assert!(r.key_exists("port").await.unwrap());
        let fresh = r.with_config("prod");
        assert!(!fresh.key_exists("port").await.unwrap());
        assert!(fresh.key_exists("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_schema_is_not_cached() {
        let store = Arc::new(MemoryStore::with_entries([("/r/svc/web/1/fields", "{oops")]));
        let r = Resolver::new(store.clone(), layout(), Namespace::new("svc", "web", 1, "prod"));
        assert!(matches!(r.get("port").await, Err(Error::Decode { .. })));
        assert_eq!(r.cache().get("/r/svc/web/1/fields"), None);
    }

    #[tokio::test]
    async fn test_set_is_write_through() {
        let (store, r) = seeded().await;
        r.set("port", "8080").await.unwrap();
        assert_eq!(
            store.get("/r/svc/web/1/config/prod/port").await.unwrap().as_deref(),
            Some("8080")
        );
        assert_eq!(r.get("port").await.unwrap(), "8080");
        assert_eq!(store.reads("/r/svc/web/1/config/prod/port"), 1);
    }

    #[tokio::test]
    async fn test_failed_store_write_leaves_cache_alone() {
        let (store, r) = seeded().await;
        let key = "/r/svc/web/1/config/prod/port";
        r.set("port", "80").await.unwrap();
        store.reject_writes_to(key);

        assert!(matches!(r.set("port", "81").await, Err(Error::Store(_))));
        assert_eq!(r.cache().get(key).as_deref(), Some("80"));
    }

    #[tokio::test]
    async fn test_set_rejects_invalid_values_before_writing() {
        let (store, r) = seeded().await;
        assert!(matches!(
            r.set("port", "99999").await,
            Err(Error::ConstraintViolation { .. })
        ));
        assert!(matches!(
            r.set("port", "abc").await,
            Err(Error::TypeConversion { .. })
        ));
        assert!(matches!(
            r.set("host", "").await,
            Err(Error::ConstraintViolation { .. })
        ));
        assert!(store.get_prefix("/r/svc/web/1/config/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_typed_getters() {
        let (store, r) = seeded().await;
        store.put("/r/svc/web/1/config/prod/port", "8080").await.unwrap();
        store.put("/r/svc/web/1/config/prod/ratio", "0.25").await.unwrap();
        store.put("/r/svc/web/1/config/prod/tls", "true").await.unwrap();

        assert_eq!(r.get_typed("port").await.unwrap(), TypedValue::Int(8080));
        assert_eq!(r.get_int("port").await.unwrap(), 8080);
        assert_eq!(r.get_float("ratio").await.unwrap(), 0.25);
        assert!(r.get_bool("tls").await.unwrap());
    }

    #[tokio::test]
    async fn test_bad_stored_data_is_type_conversion() {
        let (store, r) = seeded().await;
        store.put("/r/svc/web/1/config/prod/port", "eighty").await.unwrap();
        assert!(matches!(
            r.get_typed("port").await,
            Err(Error::TypeConversion { expected: FieldType::Int, .. })
        ));
        assert!(matches!(r.get_int("port").await, Err(Error::TypeConversion { .. })));
        assert_eq!(r.get("port").await.unwrap(), "eighty");
    }

    #[tokio::test]
    async fn test_non_finite_float_is_type_conversion_everywhere() {
        let (store, r) = seeded().await;
        assert!(matches!(
            r.set("ratio", "inf").await,
            Err(Error::TypeConversion { expected: FieldType::Float, .. })
        ));
        assert_eq!(store.get("/r/svc/web/1/config/prod/ratio").await.unwrap(), None);

        fill(&r).await;
        store.put("/r/svc/web/1/config/prod/ratio", "NaN").await.unwrap();
        let r = r.with_config("prod");
        assert!(matches!(
            r.get_typed("ratio").await,
            Err(Error::TypeConversion { expected: FieldType::Float, .. })
        ));
        assert!(matches!(r.get_float("ratio").await, Err(Error::TypeConversion { .. })));
        let loaded: Result<Web, _> = r.load_config().await;
        assert!(matches!(
            loaded,
            Err(Error::TypeConversion { expected: FieldType::Float, .. })
        ));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Web {
        host: String,
        port: u16,
        ratio: f64,
        tls: bool,
    }

    async fn fill(r: &Resolver) {
        r.set("host", "example.com").await.unwrap();
        r.set("port", "443").await.unwrap();
        r.set("ratio", "1.5").await.unwrap();
        r.set("tls", "1").await.unwrap();
    }

    #[tokio::test]
    async fn test_load_config_into_struct() {
        let (_store, r) = seeded().await;
        fill(&r).await;
        let web: Web = r.load_config().await.unwrap();
        assert_eq!(
            web,
            Web {
                host: "example.com".into(),
                port: 443,
                ratio: 1.5,
                tls: true,
            }
        );
    }

    #[tokio::test]
    async fn test_load_config_is_all_or_nothing() {
        let (_store, r) = seeded().await;
        r.set("host", "example.com").await.unwrap();
        r.set("port", "443").await.unwrap();
        let result: Result<Web, _> = r.load_config().await;
        assert!(matches!(result, Err(Error::FieldNotFound { .. })));
    }

    #[tokio::test]
    async fn test_load_config_rejects_non_record_target() {
        let (_store, r) = seeded().await;
        fill(&r).await;
        let result: Result<String, _> = r.load_config().await;
        assert!(matches!(result, Err(Error::InvalidTarget { .. })));
        let result: Result<Vec<u8>, _> = r.load_config().await;
        assert!(matches!(result, Err(Error::InvalidTarget { .. })));
    }

    #[tokio::test]
    async fn test_load_config_shape_mismatch() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Narrow {
            port: u8,
        }
        let (_store, r) = seeded().await;
        fill(&r).await;
        let result: Result<Narrow, _> = r.load_config().await;
        assert!(matches!(result, Err(Error::Load(_))));
    }

    #[tokio::test]
    async fn test_with_config_is_a_separate_namespace() {
        let (_store, prod) = seeded().await;
        prod.set("port", "80").await.unwrap();

        let staging = prod.with_config("staging");
        assert_eq!(staging.namespace().config, "staging");
        assert_eq!(prod.namespace().config, "prod");
        assert!(matches!(staging.get("port").await, Err(Error::FieldNotFound { .. })));
        staging.set("port", "8080").await.unwrap();
        assert_eq!(prod.get("port").await.unwrap(), "80");
        assert_eq!(staging.get("port").await.unwrap(), "8080");
    }

    #[tokio::test]
    async fn test_with_version_reads_other_schema() {
        let (_store, r) = seeded().await;
        let v2 = r.with_version(2);
        assert!(matches!(v2.get("port").await, Err(Error::NotFound { .. })));
        assert_eq!(r.with_app("other").namespace().app, "other");
        assert_eq!(r.with_module("api").namespace().module, "api");
    }

    #[tokio::test]
    async fn test_values_and_description() {
        let (_store, r) = seeded().await;
        r.set("port", "80").await.unwrap();
        r.set("tls", "false").await.unwrap();
        r.set_description("production").await.unwrap();

        let values = r.values().await.unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values["port"], "80");
        assert_eq!(values["tls"], "false");
        assert_eq!(r.description().await.unwrap(), "production");
        assert_eq!(r.with_config("other").description().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_schema_accessor() {
        let (_store, r) = seeded().await;
        let schema = r.schema().await.unwrap();
        assert_eq!(schema.description, "web server");
        assert_eq!(schema.fields.len(), 4);
    }
}
