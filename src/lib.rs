//! Schema-typed configuration values over a watchable key-value store.
//!
//! Applications register a versioned [`Schema`] per app and module, then
//! read and write values through a [`Resolver`] scoped to one named config.
//! Values are validated against the schema on write, converted to the
//! declared type on read and cached in process. A watch task keeps the
//! cache current when other writers change the store.

pub mod cache;
pub mod client;
pub mod config;
mod error;
pub mod keys;
pub mod listing;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod tree;

pub use cache::{Cache, MemoryCache};
pub use client::{Client, ClientBuilder};
pub use config::{ConfigError, Settings};
pub use error::Error;
pub use keys::{KeyLayout, Namespace};
pub use listing::{Catalog, ConfigSummary, SchemaSummary};
pub use resolver::{Resolver, WatchHandle};
pub use schema::{Constraints, Field, FieldType, Schema, SchemaRepository, TypedValue};
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use store::{MemoryStore, Store, StoreError, WatchEvent};
pub use tree::KeyTree;
