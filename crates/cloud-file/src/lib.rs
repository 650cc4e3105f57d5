//! Cloud file handles
//!
//! File-shaped views over objects managed by a
//! [`cloud_store::ObjectProvider`]: sequential/positional reads over a
//! remote object, and local write buffers that reach the cloud with the
//! durability the file class demands. Manifest files upload on every
//! sync behind a temp-file/rename protocol so a crash never exposes a
//! manifest the cloud does not know about; data files upload once when
//! they are closed.

mod readable;
mod writable;

pub use readable::CloudReadableFile;
pub use writable::{CloudWritableFile, FileKind};
