//! Cloud Core - Foundation for the cloud file layer
//!
//! Provides the error taxonomy, configuration types, instrumentation
//! hooks, and tracing setup shared by the object-store and cloud-file
//! crates.

pub mod config;
pub mod error;
pub mod instrument;
pub mod telemetry;

pub use config::{BucketOptions, CloudConfig};
pub use error::{Error, Result};
pub use instrument::{OpGuard, OpKind, RequestHook};
