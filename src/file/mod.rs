//! Blob I/O primitives and the filesystem abstraction.
//!
//! This module hosts the byte-level collaborators of the metadata layer:
//!
//! - [`io`] - endian-aware safe reads from byte slices
//! - [`parser`] - positional blob reader with the ECMA-335 compressed encodings
//! - [`writer`] - the symmetric blob writer
//! - [`service`] - the [`service::FileService`] abstraction used by assembly probing

pub mod io;
pub mod parser;
pub mod service;
pub mod writer;

pub use parser::Parser;
pub use service::{FileService, MemoryFileService, PhysicalFileService};
pub use writer::BlobWriter;
