use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::{Field, Schema};
use crate::keys::KeyLayout;
use crate::store::Store;
use crate::Error;

/// Reads and writes schemas under the [`KeyLayout`].
///
/// A schema occupies two keys, `fields` (a JSON field list) and
/// `description`. They are written one after the other with no
/// transaction: if the description write fails the new field list is
/// already in place, and the error returned is that write's error.
#[derive(Debug, Clone)]
pub struct SchemaRepository {
    store: Arc<dyn Store>,
    layout: KeyLayout,
}

impl SchemaRepository {
    /// Creates a repository over `store` with keys built by `layout`.
    pub fn new(store: Arc<dyn Store>, layout: KeyLayout) -> Self {
        Self { store, layout }
    }

    /// Layout used to build every schema key.
    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    /// Field list of a schema. `NotFound` when nothing is stored, `Decode`
    /// when the stored payload is not a field list.
    pub async fn get_fields(
        &self,
        app: &str,
        module: &str,
        version: u32,
    ) -> Result<Vec<Field>, Error> {
        let key = self.layout.schema_fields_path(app, module, version);
        let raw = self.read_fields(&key).await?;
        decode_fields(key, &raw)
    }

    /// Raw stored field list at `key`.
    pub(crate) async fn read_fields(&self, key: &str) -> Result<String, Error> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| Error::NotFound {
                key: key.to_string(),
            })
    }

    /// Looks up a single field of the schema.
    pub async fn get_field(
        &self,
        app: &str,
        module: &str,
        version: u32,
        name: &str,
    ) -> Result<Field, Error> {
        find_field(self.get_fields(app, module, version).await?, name)
    }

    /// Fields plus description. A schema without a description record reads as `""`.
    pub async fn get_schema(&self, app: &str, module: &str, version: u32) -> Result<Schema, Error> {
        let fields = self.get_fields(app, module, version).await?;
        let description = self
            .store
            .get(&self.layout.schema_description_path(app, module, version))
            .await?
            .unwrap_or_default();
        Ok(Schema {
            fields,
            description,
        })
    }

    /// Stores `schema`, replacing whatever is at the same address.
    pub async fn put_schema(
        &self,
        app: &str,
        module: &str,
        version: u32,
        schema: &Schema,
    ) -> Result<(), Error> {
        let mut seen = HashSet::new();
        if let Some(dup) = schema.fields.iter().find(|f| !seen.insert(f.name.as_str())) {
            return Err(Error::DuplicateField {
                field: dup.name.clone(),
            });
        }

        let fields = serde_json::to_string(&schema.fields).map_err(Error::Encode)?;
        self.store
            .put(&self.layout.schema_fields_path(app, module, version), &fields)
            .await?;
        self.store
            .put(
                &self.layout.schema_description_path(app, module, version),
                &schema.description,
            )
            .await?;

        debug!(app, module, version, fields = schema.fields.len(), "stored schema");
        Ok(())
    }
}

pub(crate) fn decode_fields(key: String, raw: &str) -> Result<Vec<Field>, Error> {
    serde_json::from_str(raw).map_err(|source| Error::Decode { key, source })
}

pub(crate) fn find_field(fields: Vec<Field>, name: &str) -> Result<Field, Error> {
    fields
        .into_iter()
        .find(|f| f.name == name)
        .ok_or_else(|| Error::field_not_found(name))
}
