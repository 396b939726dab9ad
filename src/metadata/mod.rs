//! ECMA-335 metadata model, signatures and cross-assembly resolution.
//!
//! The metadata layer is organized leaves-first:
//!
//! - [`token`] - metadata tokens and table identifiers
//! - [`identity`] - assembly names, versions and strong names
//! - [`model`] - the entity model: definitions, references, forwarders
//! - [`signatures`] - blob signature parsing, encoding and operations
//! - [`comparer`] - structural equality and hashing with configurable strictness
//! - [`compat`] - type compatibility and assignability (ECMA-335 §I.8.7)
//! - [`runtime`] - target runtime identities and the runtime prober
//! - [`context`] - the runtime context bounding resolution
//! - [`resolver`] - the reference-to-definition lookup algorithms
//! - [`reader`] - the module-reader collaborator contract
//! - [`probing`] - assembly resolvers for both runtime families and bundles
//! - [`importer`] - re-rooting foreign descriptors into a module's scopes

pub mod comparer;
pub mod compat;
pub mod context;
pub mod identity;
pub mod importer;
pub mod model;
pub mod probing;
pub mod reader;
pub mod resolver;
pub mod runtime;
pub mod signatures;
pub mod token;
