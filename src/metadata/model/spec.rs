//! Type specifications: blob-backed type expressions as table entities.
//!
//! A `TypeSpec` row wraps a type signature so composite types (generic instances,
//! arrays, pointers) can appear wherever a `TypeDefOrRef` coded index is expected.
//! The embedded signature is immutable, which keeps the cached identity hash valid
//! for the lifetime of the specification.

use std::sync::{Arc, OnceLock};

use crate::metadata::signatures::TypeSignature;

/// Reference to a `TypeSpecification`
pub type TypeSpecRc = Arc<TypeSpecification>;

/// A `TypeSpec` entity wrapping an immutable type signature.
#[derive(Debug)]
pub struct TypeSpecification {
    signature: TypeSignature,
    /// Identity hash over the signature, computed on first use
    hash: OnceLock<u64>,
}

impl TypeSpecification {
    /// Wrap a signature in a specification
    #[must_use]
    pub fn new(signature: TypeSignature) -> Self {
        TypeSpecification {
            signature,
            hash: OnceLock::new(),
        }
    }

    /// The embedded type signature
    #[must_use]
    pub fn signature(&self) -> &TypeSignature {
        &self.signature
    }

    /// Memoized identity hash; `compute` runs at most once per specification.
    pub(crate) fn identity_hash(&self, compute: impl FnOnce(&TypeSignature) -> u64) -> u64 {
        *self.hash.get_or_init(|| compute(&self.signature))
    }
}
