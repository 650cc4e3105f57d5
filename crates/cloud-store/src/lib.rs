//! Cloud Store - Object-store backends and the integrity-checked provider
//!
//! The [`ObjectStoreBackend`] trait is the contract any vendor client must
//! satisfy: list/head/get/put/copy/delete plus bucket lifecycle, with a
//! three-way outcome classification (success, not-found, error). Retry
//! policy belongs entirely to the backend.
//!
//! [`ObjectProvider`] wraps a backend with the engine-facing semantics:
//! listing pagination with prefix stripping, partial-download detection,
//! zero-size upload rejection, and the one-time startup bucket check.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cloud_core::CloudConfig;
//! use cloud_store::{InMemoryStore, ObjectProvider};
//!
//! # async fn example() -> cloud_core::Result<()> {
//! let backend = Arc::new(InMemoryStore::new());
//! let provider = ObjectProvider::new(backend, CloudConfig::with_dest_bucket("engine-files"));
//! provider.sanitize().await?;
//! let names = provider.list_objects("engine-files", "data/").await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod instrumented;
mod memory;
mod provider;

#[cfg(feature = "s3")]
mod s3;

pub use backend::{ListPage, ObjectInfo, ObjectStoreBackend};
pub use instrumented::InstrumentedStore;
pub use memory::InMemoryStore;
pub use provider::ObjectProvider;

#[cfg(feature = "s3")]
pub use s3::{S3Options, S3Store};
