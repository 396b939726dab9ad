//! Structural operations over type signatures.
//!
//! Three operations every signature consumer needs:
//!
//! - [`TypeSignature::strip_modifiers`] - peel outer custom-modifier and pinned
//!   wrappers, the canonical step before any comparison,
//! - [`TypeSignature::substitute`] - replace generic parameter references from a
//!   [`GenericContext`], returning the original when nothing was substituted, and
//! - [`GenericContext::from_type_signature`] - extract the substitution context a
//!   generic instance provides to its members.

use std::{borrow::Cow, sync::Arc};

use crate::metadata::signatures::{
    GenericParamSignature, SignatureArray, SignatureGenericInst, SignatureMethod,
    SignatureModifier, TypeSignature,
};

/// The generic arguments in scope at some use site.
///
/// Type arguments come from the enclosing generic instance, method arguments from
/// a method specification. Either side may be absent; substitution leaves
/// unresolvable parameters untouched.
#[derive(Debug, Clone, Default)]
pub struct GenericContext {
    /// Arguments for `!n` references
    pub type_args: Option<Arc<[TypeSignature]>>,
    /// Arguments for `!!n` references
    pub method_args: Option<Arc<[TypeSignature]>>,
}

impl GenericContext {
    /// A context with no arguments; substitution under it is the identity
    #[must_use]
    pub fn empty() -> Self {
        GenericContext::default()
    }

    /// Returns true when neither argument list is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.type_args.is_none() && self.method_args.is_none()
    }

    /// Build a context from a type signature; generic instances contribute
    /// their arguments, everything else yields the empty context.
    #[must_use]
    pub fn from_type_signature(signature: &TypeSignature) -> Self {
        match signature.strip_modifiers() {
            TypeSignature::GenericInst(instance) => GenericContext {
                type_args: Some(Arc::from(instance.type_args.clone().into_boxed_slice())),
                method_args: None,
            },
            _ => GenericContext::empty(),
        }
    }

    /// Attach method arguments (from a method specification)
    #[must_use]
    pub fn with_method_args(mut self, args: Vec<TypeSignature>) -> Self {
        self.method_args = Some(Arc::from(args.into_boxed_slice()));
        self
    }

    /// The argument bound to a generic parameter reference, when in scope
    #[must_use]
    pub fn resolve(&self, param: &GenericParamSignature) -> Option<&TypeSignature> {
        let args = if param.from_method {
            self.method_args.as_ref()?
        } else {
            self.type_args.as_ref()?
        };
        args.get(param.index as usize)
    }
}

impl TypeSignature {
    /// Strip outer custom-modifier and pinned wrappers.
    ///
    /// Modifier and pinned wrappers do not participate in default equality; this
    /// is the canonical projection both comparison sides apply first.
    #[must_use]
    pub fn strip_modifiers(&self) -> &TypeSignature {
        let mut current = self;
        loop {
            match current {
                TypeSignature::Modifier(modifier) => current = &modifier.inner,
                TypeSignature::Pinned(inner) => current = inner,
                _ => return current,
            }
        }
    }

    /// Substitute generic parameter references from `context`.
    ///
    /// Returns [`Cow::Borrowed`] of the original signature when no substitution
    /// occurred anywhere in the tree, so callers can detect (and avoid
    /// re-allocating) the identity case.
    #[must_use]
    pub fn substitute<'a>(&'a self, context: &GenericContext) -> Cow<'a, TypeSignature> {
        match self.substitute_opt(context) {
            Some(substituted) => Cow::Owned(substituted),
            None => Cow::Borrowed(self),
        }
    }

    /// Inner substitution; `None` means "unchanged".
    fn substitute_opt(&self, context: &GenericContext) -> Option<TypeSignature> {
        match self {
            TypeSignature::GenericParam(param) => context.resolve(param).cloned(),
            TypeSignature::Pointer(inner) => inner
                .substitute_opt(context)
                .map(|substituted| TypeSignature::Pointer(Box::new(substituted))),
            TypeSignature::ByRef(inner) => inner
                .substitute_opt(context)
                .map(|substituted| TypeSignature::ByRef(Box::new(substituted))),
            TypeSignature::Pinned(inner) => inner
                .substitute_opt(context)
                .map(|substituted| TypeSignature::Pinned(Box::new(substituted))),
            TypeSignature::Boxed(inner) => inner
                .substitute_opt(context)
                .map(|substituted| TypeSignature::Boxed(Box::new(substituted))),
            TypeSignature::SzArray(element) => element
                .substitute_opt(context)
                .map(|substituted| TypeSignature::SzArray(Box::new(substituted))),
            TypeSignature::Array(array) => {
                array
                    .element
                    .substitute_opt(context)
                    .map(|substituted| TypeSignature::Array(SignatureArray {
                        element: Box::new(substituted),
                        rank: array.rank,
                        dimensions: array.dimensions.clone(),
                    }))
            }
            TypeSignature::Modifier(modifier) => {
                modifier
                    .inner
                    .substitute_opt(context)
                    .map(|substituted| TypeSignature::Modifier(SignatureModifier {
                        required: modifier.required,
                        modifier_type: modifier.modifier_type.clone(),
                        inner: Box::new(substituted),
                    }))
            }
            TypeSignature::GenericInst(instance) => {
                let mut changed = false;
                let mut substituted_args = Vec::with_capacity(instance.type_args.len());
                for arg in &instance.type_args {
                    match arg.substitute_opt(context) {
                        Some(substituted) => {
                            changed = true;
                            substituted_args.push(substituted);
                        }
                        None => substituted_args.push(arg.clone()),
                    }
                }

                if !changed {
                    return None;
                }

                Some(TypeSignature::GenericInst(SignatureGenericInst {
                    is_value_type: instance.is_value_type,
                    generic_type: instance.generic_type.clone(),
                    type_args: substituted_args,
                }))
            }
            TypeSignature::FnPtr(method) => method
                .substitute_opt(context)
                .map(|substituted| TypeSignature::FnPtr(Box::new(substituted))),
            _ => None,
        }
    }
}

impl SignatureMethod {
    /// Substitute generic parameters in the return and parameter types;
    /// `None` means "unchanged".
    pub(crate) fn substitute_opt(&self, context: &GenericContext) -> Option<SignatureMethod> {
        let return_substituted = self.return_type.substitute_opt(context);

        let mut changed = return_substituted.is_some();
        let mut params = Vec::with_capacity(self.params.len());
        for param in &self.params {
            match param.substitute_opt(context) {
                Some(substituted) => {
                    changed = true;
                    params.push(substituted);
                }
                None => params.push(param.clone()),
            }
        }

        if !changed {
            return None;
        }

        Some(SignatureMethod {
            has_this: self.has_this,
            explicit_this: self.explicit_this,
            calling_convention: self.calling_convention,
            generic_param_count: self.generic_param_count,
            return_type: Box::new(
                return_substituted.unwrap_or_else(|| (*self.return_type).clone()),
            ),
            params,
            sentinel_index: self.sentinel_index,
        })
    }

    /// Substitute generic parameters, returning the original when unchanged
    #[must_use]
    pub fn substitute<'a>(&'a self, context: &GenericContext) -> Cow<'a, SignatureMethod> {
        match self.substitute_opt(context) {
            Some(substituted) => Cow::Owned(substituted),
            None => Cow::Borrowed(self),
        }
    }
}
