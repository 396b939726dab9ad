//! Type compatibility and assignability, ECMA-335 §I.8.7.
//!
//! These operations answer the verifier's questions: what a type reduces to on
//! the evaluation stack, what its direct base class and interfaces are, and
//! whether a value of one type can stand where another is expected. Everything
//! runs against a [`CompatContext`] (runtime context plus origin module);
//! resolution failures inside any operation yield a conservative `false` rather
//! than an error, and unknown variance is treated as non-variant.

use crate::metadata::{
    context::RuntimeContext,
    model::{CilTypeRc, ModuleRc, TypeDefOrRef, TypeDescriptor, Variance},
    signatures::{GenericContext, TypeSignature},
};

/// Bound on base-class/interface chain walks; inheritance this deep only occurs
/// in adversarial metadata
const MAX_HIERARCHY_DEPTH: usize = 64;

/// The resolution environment compatibility checks run against.
#[derive(Clone, Copy)]
pub struct CompatContext<'a> {
    /// The runtime context resolving class and value types
    pub context: &'a RuntimeContext,
    /// The module whose perspective the checks take, for corlib lookups
    pub origin: Option<&'a ModuleRc>,
}

impl<'a> CompatContext<'a> {
    /// Create a compatibility context
    #[must_use]
    pub fn new(context: &'a RuntimeContext, origin: Option<&'a ModuleRc>) -> Self {
        CompatContext { context, origin }
    }

    /// Resolve an entity, conservatively returning `None` on failure
    fn resolve(&self, entity: &TypeDefOrRef) -> Option<CilTypeRc> {
        self.context
            .resolve_type(&TypeDescriptor::from(entity.clone()), self.origin)
            .ok()
    }
}

impl TypeSignature {
    /// The reduced type: enums collapse to their underlying integral, and
    /// signed/unsigned integers of equal width collapse pairwise.
    #[must_use]
    pub fn reduced_type(&self, cc: &CompatContext<'_>) -> TypeSignature {
        let stripped = self.strip_modifiers();
        match stripped {
            TypeSignature::U1 => TypeSignature::I1,
            TypeSignature::U2 => TypeSignature::I2,
            TypeSignature::U4 => TypeSignature::I4,
            TypeSignature::U8 => TypeSignature::I8,
            TypeSignature::U => TypeSignature::I,
            TypeSignature::ValueType(entity) => match cc
                .resolve(entity)
                .and_then(|definition| definition.enum_underlying_type())
            {
                Some(underlying) => underlying.reduced_type(cc),
                None => stripped.clone(),
            },
            other => other.clone(),
        }
    }

    /// The verification type: the reduced type with `bool` and `char` collapsed
    /// to their integral widths, applied through managed references.
    #[must_use]
    pub fn verification_type(&self, cc: &CompatContext<'_>) -> TypeSignature {
        let reduced = self.reduced_type(cc);
        match reduced {
            TypeSignature::Boolean => TypeSignature::I1,
            TypeSignature::Char => TypeSignature::I2,
            TypeSignature::ByRef(inner) => {
                TypeSignature::ByRef(Box::new(inner.verification_type(cc)))
            }
            other => other,
        }
    }

    /// The intermediate type: the evaluation-stack projection of the
    /// verification type.
    #[must_use]
    pub fn intermediate_type(&self, cc: &CompatContext<'_>) -> TypeSignature {
        let verification = self.verification_type(cc);
        match verification {
            TypeSignature::I1 | TypeSignature::I2 | TypeSignature::I4 => TypeSignature::I4,
            TypeSignature::R4 | TypeSignature::R8 => TypeSignature::R8,
            other => other,
        }
    }

    /// The direct base class: `System.Object` for interfaces, the declared base
    /// otherwise, with generic substitution for instances.
    #[must_use]
    pub fn direct_base_class(&self, cc: &CompatContext<'_>) -> Option<TypeSignature> {
        let stripped = self.strip_modifiers();
        match stripped {
            TypeSignature::Object => None,
            TypeSignature::Class(entity) | TypeSignature::ValueType(entity) => {
                let definition = cc.resolve(entity)?;
                base_of_definition(&definition, &GenericContext::empty())
            }
            TypeSignature::GenericInst(instance) => {
                let definition = cc.resolve(&instance.generic_type)?;
                let generic_context = GenericContext::from_type_signature(stripped);
                base_of_definition(&definition, &generic_context)
            }
            TypeSignature::SzArray(_) | TypeSignature::Array(_) => {
                let origin = cc.origin?;
                Some(TypeSignature::Class(TypeDefOrRef::Reference(
                    origin.corlib_type("System", "Array"),
                )))
            }
            other => {
                // Remaining corlib types resolve through the origin's factory
                other.corlib_name()?;
                let definition = cc
                    .context
                    .resolve_type(&TypeDescriptor::Signature(other.clone()), cc.origin)
                    .ok()?;
                base_of_definition(&definition, &GenericContext::empty())
            }
        }
    }

    /// The directly implemented interfaces, with generic substitution for
    /// instances; resolution failure yields the empty list.
    #[must_use]
    pub fn directly_implemented_interfaces(&self, cc: &CompatContext<'_>) -> Vec<TypeSignature> {
        let stripped = self.strip_modifiers();

        let (definition, generic_context) = match stripped {
            TypeSignature::Class(entity) | TypeSignature::ValueType(entity) => {
                match cc.resolve(entity) {
                    Some(definition) => (definition, GenericContext::empty()),
                    None => return Vec::new(),
                }
            }
            TypeSignature::GenericInst(instance) => match cc.resolve(&instance.generic_type) {
                Some(definition) => (definition, GenericContext::from_type_signature(stripped)),
                None => return Vec::new(),
            },
            other => {
                if other.corlib_name().is_none() {
                    return Vec::new();
                }
                match cc
                    .context
                    .resolve_type(&TypeDescriptor::Signature(other.clone()), cc.origin)
                {
                    Ok(definition) => (definition, GenericContext::empty()),
                    Err(_) => return Vec::new(),
                }
            }
        };

        definition
            .interfaces()
            .map(|interface| entity_to_signature(interface, &generic_context))
            .collect()
    }

    /// Direct compatibility: comparer equality, widened by reference-type
    /// convergence on `System.Object` and per-parameter variance on generic
    /// instances.
    #[must_use]
    pub fn is_directly_compatible_with(
        &self,
        other: &TypeSignature,
        cc: &CompatContext<'_>,
    ) -> bool {
        let this = self.strip_modifiers();
        let other = other.strip_modifiers();

        if cc.context.comparer().eq_type_sig(this, other) {
            return true;
        }

        // Every reference type is compatible with System.Object
        if matches!(other, TypeSignature::Object) && is_reference_type(this) {
            return true;
        }

        if let (TypeSignature::GenericInst(left), TypeSignature::GenericInst(right)) =
            (this, other)
        {
            if !cc
                .context
                .comparer()
                .eq_type_def_or_ref(&left.generic_type, &right.generic_type)
                || left.type_args.len() != right.type_args.len()
            {
                return false;
            }

            let open_type = cc.resolve(&left.generic_type);
            return left
                .type_args
                .iter()
                .zip(&right.type_args)
                .enumerate()
                .all(|(index, (left_arg, right_arg))| {
                    let variance = open_type
                        .as_ref()
                        .and_then(|definition| definition.generic_param(index as u32))
                        .map_or(Variance::NonVariant, |param| param.variance());

                    match variance {
                        Variance::NonVariant => {
                            cc.context.comparer().eq_type_sig(left_arg, right_arg)
                        }
                        Variance::Covariant => left_arg.is_compatible_with(right_arg, cc),
                        Variance::Contravariant => right_arg.is_compatible_with(left_arg, cc),
                    }
                });
        }

        false
    }

    /// Transitive compatibility: walks up the base-class chain and through each
    /// implemented interface; true when any level is directly compatible.
    #[must_use]
    pub fn is_compatible_with(&self, other: &TypeSignature, cc: &CompatContext<'_>) -> bool {
        self.compatible_inner(other, cc, 0)
    }

    fn compatible_inner(
        &self,
        other: &TypeSignature,
        cc: &CompatContext<'_>,
        depth: usize,
    ) -> bool {
        if depth > MAX_HIERARCHY_DEPTH {
            return false;
        }

        if self.is_directly_compatible_with(other, cc) {
            return true;
        }

        for interface in self.directly_implemented_interfaces(cc) {
            if interface.compatible_inner(other, cc, depth + 1) {
                return true;
            }
        }

        match self.direct_base_class(cc) {
            Some(base) => base.compatible_inner(other, cc, depth + 1),
            None => false,
        }
    }

    /// Assignability: intermediate types match, native-int and 32-bit integers
    /// interchange, or compatibility holds.
    #[must_use]
    pub fn is_assignable_to(&self, other: &TypeSignature, cc: &CompatContext<'_>) -> bool {
        let this_intermediate = self.intermediate_type(cc);
        let other_intermediate = other.intermediate_type(cc);

        if cc
            .context
            .comparer()
            .eq_type_sig(&this_intermediate, &other_intermediate)
        {
            return true;
        }

        if matches!(
            (&this_intermediate, &other_intermediate),
            (TypeSignature::I, TypeSignature::I4) | (TypeSignature::I4, TypeSignature::I)
        ) {
            return true;
        }

        self.is_compatible_with(other, cc)
    }
}

/// The declared base of a definition as a signature, substituted through the
/// instance's generic context; interfaces report `System.Object`.
fn base_of_definition(
    definition: &CilTypeRc,
    generic_context: &GenericContext,
) -> Option<TypeSignature> {
    if definition.is_interface() {
        return Some(TypeSignature::Object);
    }

    definition
        .base_type()
        .map(|base| entity_to_signature(base, generic_context))
}

/// Lift a `TypeDefOrRef` into a signature, substituting generic parameters
/// inside specifications.
fn entity_to_signature(entity: &TypeDefOrRef, generic_context: &GenericContext) -> TypeSignature {
    match entity {
        TypeDefOrRef::Specification(specification) => specification
            .signature()
            .substitute(generic_context)
            .into_owned(),
        other => TypeSignature::Class(other.clone()),
    }
}

/// Reference types converge on `System.Object`
fn is_reference_type(signature: &TypeSignature) -> bool {
    match signature {
        TypeSignature::String
        | TypeSignature::Object
        | TypeSignature::Class(_)
        | TypeSignature::SzArray(_)
        | TypeSignature::Array(_) => true,
        TypeSignature::GenericInst(instance) => !instance.is_value_type,
        _ => false,
    }
}
