//! The metadata entity model: definitions, references, forwarders and descriptors.
//!
//! Entities come in two families:
//!
//! - **Definitions** own their contents and belong to exactly one module:
//!   [`CilAssembly`], [`CilModule`], [`CilType`] and its members.
//! - **References** name definitions that live elsewhere and are resolved through
//!   a runtime context: [`AssemblyReference`], [`ModuleReference`],
//!   [`TypeReference`], [`MemberReference`], plus [`ExportedType`] forwarders and
//!   [`TypeSpecification`] blob wrappers.
//!
//! The closed sums [`TypeDefOrRef`] and [`TypeDescriptor`] cover the fixed set of
//! entity kinds ECMA-335 allows in type positions, so consumers dispatch with
//! exhaustive matches instead of downcasts.

mod assembly;
mod descriptor;
mod exports;
mod invalid;
mod module;
mod references;
mod spec;
mod types;

pub use assembly::{AssemblyRc, CilAssembly, CustomAttribute, CustomAttributeCtor};
pub use descriptor::{TypeDefOrRef, TypeDescriptor};
pub use exports::{ExportedType, ExportedTypeImpl, ExportedTypeRc};
pub use invalid::{InvalidSignatureReason, InvalidTypeRef};
pub use module::{CilModule, ModuleRc};
pub use references::{
    AssemblyReference, AssemblyRefRc, FileReference, FileRefRc, MemberReference, MemberRefParent,
    MemberRefRc, MemberSignature, ModuleReference, ModuleRefRc, ResolutionScope, TypeReference,
    TypeRefRc,
};
pub use spec::{TypeSpecRc, TypeSpecification};
pub use types::{
    CilEvent, CilField, CilMethod, CilProperty, CilType, CilTypeRc, EventRc, FieldAttributes,
    FieldRc, GenericParam, GenericParamAttributes, GenericParamRc, MethodAttributes, MethodRc,
    PropertyRc, TypeAttributes, Variance,
};

/// A member resolution result: the concrete definition a member reference names.
#[derive(Debug, Clone)]
pub enum ResolvedMember {
    /// A field definition
    Field(FieldRc),
    /// A method definition
    Method(MethodRc),
}

impl ResolvedMember {
    /// The member's name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ResolvedMember::Field(field) => &field.name,
            ResolvedMember::Method(method) => &method.name,
        }
    }
}
