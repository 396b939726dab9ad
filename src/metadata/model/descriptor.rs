//! The closed descriptor sums over the type entity kinds.
//!
//! ECMA-335 fixes the set of entities that can denote a type, so the core models
//! them as two closed sums instead of an open hierarchy:
//!
//! - [`TypeDefOrRef`] - what a `TypeDefOrRef` coded index can select (plus the
//!   invalid placeholder substituted by tolerant blob parsing), and
//! - [`TypeDescriptor`] - everything the resolver accepts as a query, adding
//!   standalone signatures and exported types.

use std::fmt;

use crate::metadata::{
    model::{CilTypeRc, ExportedTypeRc, InvalidTypeRef, ResolutionScope, TypeRefRc, TypeSpecRc},
    signatures::TypeSignature,
};

/// A type entity usable where a `TypeDefOrRef` coded index is expected.
#[derive(Debug, Clone)]
pub enum TypeDefOrRef {
    /// A type definition
    Definition(CilTypeRc),
    /// A type reference
    Reference(TypeRefRc),
    /// A type specification
    Specification(TypeSpecRc),
    /// The placeholder substituted for unresolvable coded indices
    Invalid(InvalidTypeRef),
}

impl TypeDefOrRef {
    /// The entity's simple name; specifications delegate to their signature and
    /// placeholders print their sentinel
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            TypeDefOrRef::Definition(definition) => definition.name.clone(),
            TypeDefOrRef::Reference(reference) => reference.name.clone(),
            TypeDefOrRef::Specification(specification) => specification.signature().to_string(),
            TypeDefOrRef::Invalid(invalid) => invalid.name(),
        }
    }

    /// The entity's namespace, when it has one
    #[must_use]
    pub fn namespace(&self) -> Option<String> {
        match self {
            TypeDefOrRef::Definition(definition) => definition.namespace.clone(),
            TypeDefOrRef::Reference(reference) => reference.namespace.clone(),
            TypeDefOrRef::Specification(_) | TypeDefOrRef::Invalid(_) => None,
        }
    }

    /// Returns true when the namespace and name match byte-exactly.
    ///
    /// Specifications and placeholders never match a real type name.
    #[must_use]
    pub fn is_type_of(&self, namespace: Option<&str>, name: &str) -> bool {
        match self {
            TypeDefOrRef::Definition(definition) => definition.is_type_of(namespace, name),
            TypeDefOrRef::Reference(reference) => reference.is_type_of(namespace, name),
            TypeDefOrRef::Specification(_) | TypeDefOrRef::Invalid(_) => false,
        }
    }

    /// The full display name
    #[must_use]
    pub fn full_name(&self) -> String {
        match self {
            TypeDefOrRef::Definition(definition) => definition.full_name(),
            TypeDefOrRef::Reference(reference) => reference.full_name(),
            TypeDefOrRef::Specification(specification) => specification.signature().to_string(),
            TypeDefOrRef::Invalid(invalid) => invalid.name(),
        }
    }

    /// The reference's resolution scope, for reference entities
    #[must_use]
    pub fn scope(&self) -> Option<&ResolutionScope> {
        match self {
            TypeDefOrRef::Reference(reference) => reference.scope.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDefOrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

impl From<CilTypeRc> for TypeDefOrRef {
    fn from(definition: CilTypeRc) -> Self {
        TypeDefOrRef::Definition(definition)
    }
}

impl From<TypeRefRc> for TypeDefOrRef {
    fn from(reference: TypeRefRc) -> Self {
        TypeDefOrRef::Reference(reference)
    }
}

impl From<TypeSpecRc> for TypeDefOrRef {
    fn from(specification: TypeSpecRc) -> Self {
        TypeDefOrRef::Specification(specification)
    }
}

/// Everything the metadata resolver accepts as a type query.
#[derive(Debug, Clone)]
pub enum TypeDescriptor {
    /// A type definition (resolves to itself within its own module)
    Definition(CilTypeRc),
    /// A type reference
    Reference(TypeRefRc),
    /// A type specification
    Specification(TypeSpecRc),
    /// A standalone type signature
    Signature(TypeSignature),
    /// An exported type (forwarder)
    Exported(ExportedTypeRc),
}

impl TypeDescriptor {
    /// The descriptor's simple name, when one exists
    #[must_use]
    pub fn name(&self) -> Option<String> {
        match self {
            TypeDescriptor::Definition(definition) => Some(definition.name.clone()),
            TypeDescriptor::Reference(reference) => Some(reference.name.clone()),
            TypeDescriptor::Exported(exported) => Some(exported.name.clone()),
            TypeDescriptor::Specification(_) | TypeDescriptor::Signature(_) => None,
        }
    }

    /// The descriptor's namespace, when one exists
    #[must_use]
    pub fn namespace(&self) -> Option<String> {
        match self {
            TypeDescriptor::Definition(definition) => definition.namespace.clone(),
            TypeDescriptor::Reference(reference) => reference.namespace.clone(),
            TypeDescriptor::Exported(exported) => exported.namespace.clone(),
            TypeDescriptor::Specification(_) | TypeDescriptor::Signature(_) => None,
        }
    }

    /// Display name for diagnostics
    #[must_use]
    pub fn full_name(&self) -> String {
        match self {
            TypeDescriptor::Definition(definition) => definition.full_name(),
            TypeDescriptor::Reference(reference) => reference.full_name(),
            TypeDescriptor::Specification(specification) => specification.signature().to_string(),
            TypeDescriptor::Signature(signature) => signature.to_string(),
            TypeDescriptor::Exported(exported) => exported.full_name(),
        }
    }
}

impl From<TypeDefOrRef> for TypeDescriptor {
    fn from(entity: TypeDefOrRef) -> Self {
        match entity {
            TypeDefOrRef::Definition(definition) => TypeDescriptor::Definition(definition),
            TypeDefOrRef::Reference(reference) => TypeDescriptor::Reference(reference),
            TypeDefOrRef::Specification(specification) => {
                TypeDescriptor::Specification(specification)
            }
            TypeDefOrRef::Invalid(invalid) => {
                TypeDescriptor::Signature(TypeSignature::Invalid(invalid))
            }
        }
    }
}

impl From<TypeSignature> for TypeDescriptor {
    fn from(signature: TypeSignature) -> Self {
        TypeDescriptor::Signature(signature)
    }
}
