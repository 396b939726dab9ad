//! Structural equality and hashing for signatures and type entities.
//!
//! The [`SignatureComparer`] decides semantic equality across the
//! reference/definition divide: a `TypeRef` to `System.Object` equals the
//! `TypeDef` it resolves to, custom modifiers and pinned wrappers are stripped
//! before comparison, and assembly version tolerance is controlled by
//! [`ComparerFlags`]. A comparer optionally carries a runtime context; when it
//! does, references are resolved first so exported-type forwarding becomes
//! transparent to equality.
//!
//! Hashing is compatible with equality: values that compare equal hash equal.
//! The hash deliberately omits resolution scopes, since forwarding can move a
//! type between assemblies without changing its identity.

use std::{
    hash::{Hash, Hasher},
    sync::Weak,
};

use bitflags::bitflags;
use rustc_hash::FxHasher;

use crate::metadata::{
    context::RuntimeContext,
    identity::AssemblyIdentity,
    model::{
        CilTypeRc, MemberSignature, ResolutionScope, TypeDefOrRef, TypeDescriptor,
        TypeSpecification,
    },
    signatures::{
        SignatureField, SignatureMethod, SignatureProperty, TypeSignature,
    },
};

bitflags! {
    /// Strictness flags for assembly-version comparison.
    ///
    /// The flags are additive; when a stricter and a more lenient flag are both
    /// set, the stricter one wins ([`ComparerFlags::EXACT_VERSION`] dominates
    /// [`ComparerFlags::ALLOW_NEWER_VERSIONS`]). With no flags set, versions
    /// must match exactly.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ComparerFlags: u32 {
        /// Ignore version fields entirely
        const VERSION_AGNOSTIC = 0x0001;
        /// Accept candidates whose version is greater or equal
        const ALLOW_NEWER_VERSIONS = 0x0002;
        /// Require all four version fields to match
        const EXACT_VERSION = 0x0004;
    }
}

/// The outermost-first name chain and declaring assembly of a type entity.
///
/// Both references and definitions project onto these coordinates, which is what
/// makes cross-kind equality possible.
struct TypeCoordinates {
    assembly: Option<AssemblyIdentity>,
    /// `(namespace, name)` pairs from the outermost type inward
    names: Vec<(Option<String>, String)>,
}

/// Structural comparer for types, signatures and members.
#[derive(Debug, Clone, Default)]
pub struct SignatureComparer {
    flags: ComparerFlags,
    context: Option<Weak<RuntimeContext>>,
}

impl SignatureComparer {
    /// A context-free comparer: comparisons are structural as-written
    #[must_use]
    pub fn new(flags: ComparerFlags) -> Self {
        SignatureComparer {
            flags,
            context: None,
        }
    }

    /// A comparer bound to a runtime context; exported-type forwarding is
    /// resolved before comparing
    #[must_use]
    pub fn with_context(flags: ComparerFlags, context: Weak<RuntimeContext>) -> Self {
        SignatureComparer {
            flags,
            context: Some(context),
        }
    }

    /// The configured strictness flags
    #[must_use]
    pub fn flags(&self) -> ComparerFlags {
        self.flags
    }

    /// Compare assembly identities under the configured version strictness.
    ///
    /// `reference` is the identity as written at the use site, `candidate` the
    /// identity offered as a match.
    #[must_use]
    pub fn matches_identity(
        &self,
        reference: &AssemblyIdentity,
        candidate: &AssemblyIdentity,
    ) -> bool {
        if !reference.eq_version_agnostic(candidate) {
            return false;
        }

        if self.flags.contains(ComparerFlags::EXACT_VERSION) {
            return reference.version == candidate.version;
        }
        if self.flags.contains(ComparerFlags::VERSION_AGNOSTIC) {
            return true;
        }
        if self.flags.contains(ComparerFlags::ALLOW_NEWER_VERSIONS) {
            return candidate.version >= reference.version;
        }

        reference.version == candidate.version
    }

    /// Compare two type entities by `(scope, namespace, name)` after exported
    /// type redirection.
    #[must_use]
    pub fn eq_type_def_or_ref(&self, a: &TypeDefOrRef, b: &TypeDefOrRef) -> bool {
        match (a, b) {
            (TypeDefOrRef::Invalid(left), TypeDefOrRef::Invalid(right)) => left == right,
            (TypeDefOrRef::Invalid(_), _) | (_, TypeDefOrRef::Invalid(_)) => false,
            (TypeDefOrRef::Specification(left), TypeDefOrRef::Specification(right)) => {
                self.eq_type_sig(left.signature(), right.signature())
            }
            (TypeDefOrRef::Specification(spec), other)
            | (other, TypeDefOrRef::Specification(spec)) => {
                // A spec equals a def/ref only when it wraps exactly that entity
                match spec.signature().strip_modifiers().underlying_type_def_or_ref() {
                    Some(inner) if !matches!(spec.signature().strip_modifiers(), TypeSignature::GenericInst(_)) => {
                        self.eq_type_def_or_ref(inner, other)
                    }
                    _ => false,
                }
            }
            (left, right) => match (self.coordinates_of(left), self.coordinates_of(right)) {
                (Some(left), Some(right)) => self.eq_coordinates(&left, &right),
                _ => false,
            },
        }
    }

    fn eq_coordinates(&self, a: &TypeCoordinates, b: &TypeCoordinates) -> bool {
        if a.names != b.names {
            return false;
        }

        match (&a.assembly, &b.assembly) {
            (Some(left), Some(right)) => self.matches_identity(left, right),
            (None, None) => true,
            _ => false,
        }
    }

    /// Project an entity onto its name chain and declaring assembly; resolves
    /// references through the bound context first so forwarders collapse onto
    /// their targets.
    fn coordinates_of(&self, entity: &TypeDefOrRef) -> Option<TypeCoordinates> {
        if let TypeDefOrRef::Reference(_) = entity {
            if let Some(definition) = self.try_resolve(entity) {
                return Self::definition_coordinates(&definition);
            }
        }

        match entity {
            TypeDefOrRef::Definition(definition) => Self::definition_coordinates(definition),
            TypeDefOrRef::Reference(reference) => {
                let mut names = vec![(reference.namespace.clone(), reference.name.clone())];
                let mut scope = reference.scope.clone();

                loop {
                    match scope {
                        Some(ResolutionScope::Type(parent)) => {
                            names.push((parent.namespace.clone(), parent.name.clone()));
                            scope = parent.scope.clone();
                        }
                        Some(ResolutionScope::Assembly(assembly_ref)) => {
                            names.reverse();
                            return Some(TypeCoordinates {
                                assembly: Some(assembly_ref.identity.clone()),
                                names,
                            });
                        }
                        Some(ResolutionScope::CurrentModule(module)) => {
                            let assembly = module
                                .upgrade()
                                .and_then(|module| module.assembly())
                                .map(|assembly| assembly.identity.clone());
                            names.reverse();
                            return Some(TypeCoordinates { assembly, names });
                        }
                        Some(ResolutionScope::Module(_)) => {
                            // Sibling module: same assembly as the reference's own module
                            let assembly = reference
                                .module()
                                .and_then(|module| module.assembly())
                                .map(|assembly| assembly.identity.clone());
                            names.reverse();
                            return Some(TypeCoordinates { assembly, names });
                        }
                        None => return None,
                    }
                }
            }
            TypeDefOrRef::Specification(_) | TypeDefOrRef::Invalid(_) => None,
        }
    }

    fn definition_coordinates(definition: &CilTypeRc) -> Option<TypeCoordinates> {
        let mut names = Vec::new();
        let mut current = definition.clone();
        loop {
            names.push((current.namespace.clone(), current.name.clone()));
            match current.declaring_type() {
                Some(declaring) => current = declaring,
                None => break,
            }
        }
        names.reverse();

        let assembly = current
            .module()
            .and_then(|module| module.assembly())
            .map(|assembly| assembly.identity.clone());

        Some(TypeCoordinates { assembly, names })
    }

    /// Resolve a reference through the bound context, if any; failures fall
    /// back to as-written comparison.
    fn try_resolve(&self, entity: &TypeDefOrRef) -> Option<CilTypeRc> {
        let context = self.context.as_ref()?.upgrade()?;
        let origin = match entity {
            TypeDefOrRef::Definition(definition) => definition.module(),
            TypeDefOrRef::Reference(reference) => reference.module(),
            _ => None,
        };

        context
            .resolve_type(&TypeDescriptor::from(entity.clone()), origin.as_ref())
            .ok()
    }

    /// Compare two type signatures; custom modifiers and pinned wrappers are
    /// stripped on both sides first.
    #[must_use]
    pub fn eq_type_sig(&self, a: &TypeSignature, b: &TypeSignature) -> bool {
        let a = a.strip_modifiers();
        let b = b.strip_modifiers();

        match (a, b) {
            (TypeSignature::Class(left), TypeSignature::Class(right))
            | (TypeSignature::ValueType(left), TypeSignature::ValueType(right)) => {
                self.eq_type_def_or_ref(left, right)
            }
            (TypeSignature::Pointer(left), TypeSignature::Pointer(right))
            | (TypeSignature::ByRef(left), TypeSignature::ByRef(right))
            | (TypeSignature::Boxed(left), TypeSignature::Boxed(right))
            | (TypeSignature::SzArray(left), TypeSignature::SzArray(right)) => {
                self.eq_type_sig(left, right)
            }
            (TypeSignature::Array(left), TypeSignature::Array(right)) => {
                if left.rank != right.rank {
                    return false;
                }
                if !self.eq_type_sig(&left.element, &right.element) {
                    return false;
                }

                // Missing sizes are zeros, missing lower bounds are zeros
                let rank = left.rank as usize;
                (0..rank).all(|dimension| {
                    let size_a = left.dimensions.get(dimension).and_then(|d| d.size);
                    let size_b = right.dimensions.get(dimension).and_then(|d| d.size);
                    let lo_a = left.dimensions.get(dimension).and_then(|d| d.lower_bound);
                    let lo_b = right.dimensions.get(dimension).and_then(|d| d.lower_bound);
                    size_a.unwrap_or(0) == size_b.unwrap_or(0)
                        && lo_a.unwrap_or(0) == lo_b.unwrap_or(0)
                })
            }
            (TypeSignature::FnPtr(left), TypeSignature::FnPtr(right)) => {
                self.eq_method_sig(left, right)
            }
            (TypeSignature::GenericInst(left), TypeSignature::GenericInst(right)) => {
                left.is_value_type == right.is_value_type
                    && self.eq_type_def_or_ref(&left.generic_type, &right.generic_type)
                    && left.type_args.len() == right.type_args.len()
                    && left
                        .type_args
                        .iter()
                        .zip(&right.type_args)
                        .all(|(left, right)| self.eq_type_sig(left, right))
            }
            (TypeSignature::GenericParam(left), TypeSignature::GenericParam(right)) => {
                left == right
            }
            (TypeSignature::Invalid(left), TypeSignature::Invalid(right)) => left == right,
            // A corlib element signature equals a class/value wrapper naming
            // the same corlib type
            (primitive, TypeSignature::Class(entity))
            | (primitive, TypeSignature::ValueType(entity))
            | (TypeSignature::Class(entity), primitive)
            | (TypeSignature::ValueType(entity), primitive) => match primitive.corlib_name() {
                Some(name) => entity.is_type_of(Some("System"), name),
                None => false,
            },
            (left, right) => {
                // Primitive and marker variants compare by element byte
                std::mem::discriminant(left) == std::mem::discriminant(right)
                    && left.element_type() == right.element_type()
            }
        }
    }

    /// Compare method signatures: calling convention, `this` flags, generic
    /// arity, return type and parameters must all match.
    #[must_use]
    pub fn eq_method_sig(&self, a: &SignatureMethod, b: &SignatureMethod) -> bool {
        a.calling_convention == b.calling_convention
            && a.has_this == b.has_this
            && a.explicit_this == b.explicit_this
            && a.generic_param_count == b.generic_param_count
            && a.sentinel_index == b.sentinel_index
            && a.params.len() == b.params.len()
            && self.eq_type_sig(&a.return_type, &b.return_type)
            && a.params
                .iter()
                .zip(&b.params)
                .all(|(left, right)| self.eq_type_sig(left, right))
    }

    /// Compare field signatures
    #[must_use]
    pub fn eq_field_sig(&self, a: &SignatureField, b: &SignatureField) -> bool {
        self.eq_type_sig(&a.field_type, &b.field_type)
    }

    /// Compare property signatures
    #[must_use]
    pub fn eq_property_sig(&self, a: &SignatureProperty, b: &SignatureProperty) -> bool {
        a.has_this == b.has_this
            && a.params.len() == b.params.len()
            && self.eq_type_sig(&a.property_type, &b.property_type)
            && a.params
                .iter()
                .zip(&b.params)
                .all(|(left, right)| self.eq_type_sig(left, right))
    }

    /// Compare member signatures; the kind (field vs method) must match
    #[must_use]
    pub fn eq_member_sig(&self, a: &MemberSignature, b: &MemberSignature) -> bool {
        match (a, b) {
            (MemberSignature::Field(left), MemberSignature::Field(right)) => {
                self.eq_field_sig(left, right)
            }
            (MemberSignature::Method(left), MemberSignature::Method(right)) => {
                self.eq_method_sig(left, right)
            }
            _ => false,
        }
    }

    /// Hash a type signature compatibly with [`SignatureComparer::eq_type_sig`]
    #[must_use]
    pub fn hash_type_sig(&self, signature: &TypeSignature) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash_type_sig_into(signature, &mut hasher);
        hasher.finish()
    }

    fn hash_type_sig_into<H: Hasher>(&self, signature: &TypeSignature, hasher: &mut H) {
        let signature = signature.strip_modifiers();
        match signature {
            // Class/value wrappers and corlib element signatures hash by name
            // alone, since they compare equal across those shapes
            TypeSignature::Class(entity) | TypeSignature::ValueType(entity) => {
                self.hash_type_def_or_ref_into(entity, hasher);
            }
            TypeSignature::Pointer(inner)
            | TypeSignature::ByRef(inner)
            | TypeSignature::Boxed(inner)
            | TypeSignature::SzArray(inner) => {
                signature.element_type().hash(hasher);
                self.hash_type_sig_into(inner, hasher);
            }
            TypeSignature::Array(array) => {
                signature.element_type().hash(hasher);
                array.rank.hash(hasher);
                self.hash_type_sig_into(&array.element, hasher);
                for dimension in 0..array.rank as usize {
                    let size = array.dimensions.get(dimension).and_then(|d| d.size);
                    let lower = array.dimensions.get(dimension).and_then(|d| d.lower_bound);
                    size.unwrap_or(0).hash(hasher);
                    lower.unwrap_or(0).hash(hasher);
                }
            }
            TypeSignature::FnPtr(method) => {
                signature.element_type().hash(hasher);
                self.hash_method_sig_into(method, hasher);
            }
            TypeSignature::GenericInst(instance) => {
                signature.element_type().hash(hasher);
                instance.is_value_type.hash(hasher);
                self.hash_type_def_or_ref_into(&instance.generic_type, hasher);
                instance.type_args.len().hash(hasher);
                for arg in &instance.type_args {
                    self.hash_type_sig_into(arg, hasher);
                }
            }
            TypeSignature::GenericParam(param) => {
                signature.element_type().hash(hasher);
                param.index.hash(hasher);
            }
            TypeSignature::Invalid(placeholder) => {
                signature.element_type().hash(hasher);
                placeholder.hash(hasher);
            }
            primitive => match primitive.corlib_name() {
                Some(name) => {
                    Some("System").hash(hasher);
                    name.hash(hasher);
                }
                None => primitive.element_type().hash(hasher),
            },
        }
    }

    fn hash_type_def_or_ref_into<H: Hasher>(&self, entity: &TypeDefOrRef, hasher: &mut H) {
        // Scope and assembly are omitted: forwarding moves types between
        // assemblies without changing their identity
        match entity {
            TypeDefOrRef::Specification(specification) => {
                self.hash_type_sig_into(specification.signature(), hasher);
            }
            TypeDefOrRef::Invalid(placeholder) => placeholder.hash(hasher),
            entity => {
                entity.namespace().hash(hasher);
                entity.name().hash(hasher);
            }
        }
    }

    /// Hash a method signature compatibly with [`SignatureComparer::eq_method_sig`]
    #[must_use]
    pub fn hash_method_sig(&self, signature: &SignatureMethod) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash_method_sig_into(signature, &mut hasher);
        hasher.finish()
    }

    fn hash_method_sig_into<H: Hasher>(&self, signature: &SignatureMethod, hasher: &mut H) {
        signature.calling_convention.to_header().hash(hasher);
        signature.has_this.hash(hasher);
        signature.explicit_this.hash(hasher);
        signature.generic_param_count.hash(hasher);
        signature.params.len().hash(hasher);
        self.hash_type_sig_into(&signature.return_type, hasher);
        for param in &signature.params {
            self.hash_type_sig_into(param, hasher);
        }
    }

    /// Hash a type specification through its memoized identity hash
    #[must_use]
    pub fn hash_type_spec(&self, specification: &TypeSpecification) -> u64 {
        specification.identity_hash(|signature| self.hash_type_sig(signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        identity::AssemblyVersion,
        model::{AssemblyReference, TypeReference},
        signatures::SignatureGenericInst,
    };
    use std::sync::Arc;

    fn corlib_ref() -> Arc<AssemblyReference> {
        Arc::new(AssemblyReference::new(AssemblyIdentity::new(
            "mscorlib",
            AssemblyVersion::new(4, 0, 0, 0),
        )))
    }

    fn object_ref(assembly: &Arc<AssemblyReference>) -> TypeDefOrRef {
        TypeDefOrRef::Reference(Arc::new(TypeReference::new(
            None,
            Some(ResolutionScope::Assembly(assembly.clone())),
            Some("System".to_string()),
            "Object",
        )))
    }

    #[test]
    fn test_identity_flag_semantics() {
        let reference = AssemblyIdentity::new("Foo", AssemblyVersion::new(1, 0, 0, 0));
        let newer = AssemblyIdentity::new("Foo", AssemblyVersion::new(2, 0, 0, 0));

        let default = SignatureComparer::default();
        assert!(!default.matches_identity(&reference, &newer));

        let agnostic = SignatureComparer::new(ComparerFlags::VERSION_AGNOSTIC);
        assert!(agnostic.matches_identity(&reference, &newer));

        let newer_ok = SignatureComparer::new(ComparerFlags::ALLOW_NEWER_VERSIONS);
        assert!(newer_ok.matches_identity(&reference, &newer));
        assert!(!newer_ok.matches_identity(&newer, &reference));

        // Stricter flag dominates when both are set
        let conflicting = SignatureComparer::new(
            ComparerFlags::ALLOW_NEWER_VERSIONS | ComparerFlags::EXACT_VERSION,
        );
        assert!(!conflicting.matches_identity(&reference, &newer));
        assert!(conflicting.matches_identity(&reference, &reference.clone()));
    }

    #[test]
    fn test_references_equal_by_coordinates() {
        let comparer = SignatureComparer::default();
        let corlib = corlib_ref();
        let other_corlib = corlib_ref();

        // Distinct Arc instances with equal identities still compare equal
        assert!(comparer.eq_type_def_or_ref(&object_ref(&corlib), &object_ref(&other_corlib)));

        let string_ref = TypeDefOrRef::Reference(Arc::new(TypeReference::new(
            None,
            Some(ResolutionScope::Assembly(corlib.clone())),
            Some("System".to_string()),
            "String",
        )));
        assert!(!comparer.eq_type_def_or_ref(&object_ref(&corlib), &string_ref));
    }

    #[test]
    fn test_modifiers_stripped_before_comparison() {
        use crate::metadata::model::{InvalidSignatureReason, InvalidTypeRef};
        use crate::metadata::signatures::SignatureModifier;

        let comparer = SignatureComparer::default();
        let plain = TypeSignature::I4;
        let modified = TypeSignature::Modifier(SignatureModifier {
            required: true,
            modifier_type: TypeDefOrRef::Invalid(InvalidTypeRef::get(
                InvalidSignatureReason::InvalidCodedIndex,
            )),
            inner: Box::new(TypeSignature::I4),
        });

        assert!(comparer.eq_type_sig(&plain, &modified));
        assert_eq!(
            comparer.hash_type_sig(&plain),
            comparer.hash_type_sig(&modified)
        );
    }

    #[test]
    fn test_array_missing_bounds_are_zeros() {
        use crate::metadata::signatures::{ArrayDimension, SignatureArray};

        let comparer = SignatureComparer::default();
        let explicit = TypeSignature::Array(SignatureArray {
            element: Box::new(TypeSignature::I4),
            rank: 2,
            dimensions: vec![
                ArrayDimension {
                    size: Some(0),
                    lower_bound: Some(0),
                },
                ArrayDimension {
                    size: Some(0),
                    lower_bound: Some(0),
                },
            ],
        });
        let implicit = TypeSignature::Array(SignatureArray {
            element: Box::new(TypeSignature::I4),
            rank: 2,
            dimensions: Vec::new(),
        });

        assert!(comparer.eq_type_sig(&explicit, &implicit));
        assert_eq!(
            comparer.hash_type_sig(&explicit),
            comparer.hash_type_sig(&implicit)
        );

        let nonzero = TypeSignature::Array(SignatureArray {
            element: Box::new(TypeSignature::I4),
            rank: 2,
            dimensions: vec![ArrayDimension {
                size: Some(3),
                lower_bound: None,
            }],
        });
        assert!(!comparer.eq_type_sig(&explicit, &nonzero));
    }

    #[test]
    fn test_generic_instances_pairwise() {
        let comparer = SignatureComparer::default();
        let corlib = corlib_ref();

        let list = |arg: TypeSignature| {
            TypeSignature::GenericInst(SignatureGenericInst {
                is_value_type: false,
                generic_type: TypeDefOrRef::Reference(Arc::new(TypeReference::new(
                    None,
                    Some(ResolutionScope::Assembly(corlib.clone())),
                    Some("System.Collections.Generic".to_string()),
                    "List`1",
                ))),
                type_args: vec![arg],
            })
        };

        assert!(comparer.eq_type_sig(&list(TypeSignature::I4), &list(TypeSignature::I4)));
        assert!(!comparer.eq_type_sig(&list(TypeSignature::I4), &list(TypeSignature::I8)));
        assert_eq!(
            comparer.hash_type_sig(&list(TypeSignature::I4)),
            comparer.hash_type_sig(&list(TypeSignature::I4))
        );
    }

    #[test]
    fn test_method_signature_equality() {
        let comparer = SignatureComparer::default();
        let a = SignatureMethod::instance_method(
            TypeSignature::Void,
            vec![TypeSignature::I4, TypeSignature::String],
        );
        let b = SignatureMethod::instance_method(
            TypeSignature::Void,
            vec![TypeSignature::I4, TypeSignature::String],
        );
        let static_b = SignatureMethod::static_method(
            TypeSignature::Void,
            vec![TypeSignature::I4, TypeSignature::String],
        );

        assert!(comparer.eq_method_sig(&a, &b));
        assert!(!comparer.eq_method_sig(&a, &static_b));
        assert_eq!(comparer.hash_method_sig(&a), comparer.hash_method_sig(&b));
    }
}
