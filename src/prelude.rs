//! # dotresolve Prelude
//!
//! This module provides a convenient prelude for the most commonly used types
//! from the dotresolve library. Import this module to get quick access to the
//! essential types for metadata modelling and cross-assembly resolution.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotresolve operations
pub use crate::Error;

/// The result type used throughout dotresolve
pub use crate::Result;

/// The status taxonomy for resolution queries
pub use crate::{ResolutionError, ResolutionResult};

// ================================================================================================
// Identity
// ================================================================================================

/// Assembly identity and its components
pub use crate::metadata::identity::{AssemblyFlags, AssemblyIdentity, AssemblyVersion, StrongName};

// ================================================================================================
// Entity Model
// ================================================================================================

/// Definition-side entities
pub use crate::metadata::model::{
    AssemblyRc, CilAssembly, CilField, CilMethod, CilModule, CilType, CilTypeRc, ModuleRc,
};

/// Reference-side entities and descriptors
pub use crate::metadata::model::{
    AssemblyReference, ExportedType, ExportedTypeImpl, MemberReference, MemberRefParent,
    MemberSignature, ResolutionScope, ResolvedMember, TypeDefOrRef, TypeDescriptor, TypeReference,
};

// ================================================================================================
// Signatures
// ================================================================================================

/// The signature tree and the common signature kinds
pub use crate::metadata::signatures::{
    GenericContext, SignatureField, SignatureMethod, TypeSignature,
};

// ================================================================================================
// Resolution
// ================================================================================================

/// The runtime context bounding resolution
pub use crate::metadata::context::RuntimeContext;

/// Structural comparison
pub use crate::metadata::comparer::{ComparerFlags, SignatureComparer};

/// Target runtime identities and probing
pub use crate::metadata::runtime::{RuntimeFamily, RuntimeProber, TargetRuntime};

/// The module-reader collaborator contract
pub use crate::metadata::reader::{AssemblySource, ModuleReader, ModuleReadParameters};

/// Assembly resolvers
pub use crate::metadata::probing::AssemblyResolver;

/// The importer
pub use crate::metadata::importer::ReferenceImporter;
