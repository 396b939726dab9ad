//! Exhaustive visitors over the type-signature tree.
//!
//! The visitor is the sanctioned walker for consumers that need exhaustive case
//! analysis without matching the enum themselves (and re-auditing every match when
//! a variant is added). Two shapes are provided: the stateless
//! [`TypeSignatureVisitor`] and the stateful [`TypeSignatureVisitorWith`], which
//! threads a caller-supplied state value through each callback.

use crate::metadata::{
    model::InvalidTypeRef,
    signatures::{
        GenericParamSignature, SignatureArray, SignatureGenericInst, SignatureMethod,
        SignatureModifier, TypeSignature,
    },
};

/// Stateless visitor: one callback per variant group.
pub trait TypeSignatureVisitor<R> {
    /// A corlib element type (`void` through `System.TypedReference`)
    fn visit_corlib_type(&mut self, signature: &TypeSignature) -> R;
    /// A class or value type wrapper; `is_value_type` distinguishes the two
    fn visit_class_or_value(
        &mut self,
        is_value_type: bool,
        entity: &crate::metadata::model::TypeDefOrRef,
    ) -> R;
    /// An unmanaged pointer
    fn visit_pointer(&mut self, inner: &TypeSignature) -> R;
    /// A managed reference
    fn visit_by_ref(&mut self, inner: &TypeSignature) -> R;
    /// A pinned local type
    fn visit_pinned(&mut self, inner: &TypeSignature) -> R;
    /// A boxed value
    fn visit_boxed(&mut self, inner: &TypeSignature) -> R;
    /// A single-dimension zero-based array
    fn visit_sz_array(&mut self, element: &TypeSignature) -> R;
    /// A general array
    fn visit_array(&mut self, array: &SignatureArray) -> R;
    /// A function pointer
    fn visit_fn_ptr(&mut self, method: &SignatureMethod) -> R;
    /// A custom modifier wrapper
    fn visit_modifier(&mut self, modifier: &SignatureModifier) -> R;
    /// A generic instantiation
    fn visit_generic_instance(&mut self, instance: &SignatureGenericInst) -> R;
    /// A generic parameter reference
    fn visit_generic_param(&mut self, param: &GenericParamSignature) -> R;
    /// The vararg sentinel
    fn visit_sentinel(&mut self) -> R;
    /// An invalid placeholder
    fn visit_invalid(&mut self, placeholder: &InvalidTypeRef) -> R;
}

/// Stateful visitor: identical shape with a state value per call.
pub trait TypeSignatureVisitorWith<S, R> {
    /// A corlib element type
    fn visit_corlib_type(&mut self, signature: &TypeSignature, state: S) -> R;
    /// A class or value type wrapper
    fn visit_class_or_value(
        &mut self,
        is_value_type: bool,
        entity: &crate::metadata::model::TypeDefOrRef,
        state: S,
    ) -> R;
    /// An unmanaged pointer
    fn visit_pointer(&mut self, inner: &TypeSignature, state: S) -> R;
    /// A managed reference
    fn visit_by_ref(&mut self, inner: &TypeSignature, state: S) -> R;
    /// A pinned local type
    fn visit_pinned(&mut self, inner: &TypeSignature, state: S) -> R;
    /// A boxed value
    fn visit_boxed(&mut self, inner: &TypeSignature, state: S) -> R;
    /// A single-dimension zero-based array
    fn visit_sz_array(&mut self, element: &TypeSignature, state: S) -> R;
    /// A general array
    fn visit_array(&mut self, array: &SignatureArray, state: S) -> R;
    /// A function pointer
    fn visit_fn_ptr(&mut self, method: &SignatureMethod, state: S) -> R;
    /// A custom modifier wrapper
    fn visit_modifier(&mut self, modifier: &SignatureModifier, state: S) -> R;
    /// A generic instantiation
    fn visit_generic_instance(&mut self, instance: &SignatureGenericInst, state: S) -> R;
    /// A generic parameter reference
    fn visit_generic_param(&mut self, param: &GenericParamSignature, state: S) -> R;
    /// The vararg sentinel
    fn visit_sentinel(&mut self, state: S) -> R;
    /// An invalid placeholder
    fn visit_invalid(&mut self, placeholder: &InvalidTypeRef, state: S) -> R;
}

impl TypeSignature {
    /// Dispatch this signature to the matching visitor callback
    pub fn accept<R, V: TypeSignatureVisitor<R> + ?Sized>(&self, visitor: &mut V) -> R {
        match self {
            TypeSignature::Class(entity) => visitor.visit_class_or_value(false, entity),
            TypeSignature::ValueType(entity) => visitor.visit_class_or_value(true, entity),
            TypeSignature::Pointer(inner) => visitor.visit_pointer(inner),
            TypeSignature::ByRef(inner) => visitor.visit_by_ref(inner),
            TypeSignature::Pinned(inner) => visitor.visit_pinned(inner),
            TypeSignature::Boxed(inner) => visitor.visit_boxed(inner),
            TypeSignature::SzArray(element) => visitor.visit_sz_array(element),
            TypeSignature::Array(array) => visitor.visit_array(array),
            TypeSignature::FnPtr(method) => visitor.visit_fn_ptr(method),
            TypeSignature::Modifier(modifier) => visitor.visit_modifier(modifier),
            TypeSignature::GenericInst(instance) => visitor.visit_generic_instance(instance),
            TypeSignature::GenericParam(param) => visitor.visit_generic_param(param),
            TypeSignature::Sentinel => visitor.visit_sentinel(),
            TypeSignature::Invalid(placeholder) => visitor.visit_invalid(placeholder),
            corlib => visitor.visit_corlib_type(corlib),
        }
    }

    /// Dispatch with a caller-supplied state value
    pub fn accept_with<S, R, V: TypeSignatureVisitorWith<S, R> + ?Sized>(
        &self,
        visitor: &mut V,
        state: S,
    ) -> R {
        match self {
            TypeSignature::Class(entity) => visitor.visit_class_or_value(false, entity, state),
            TypeSignature::ValueType(entity) => visitor.visit_class_or_value(true, entity, state),
            TypeSignature::Pointer(inner) => visitor.visit_pointer(inner, state),
            TypeSignature::ByRef(inner) => visitor.visit_by_ref(inner, state),
            TypeSignature::Pinned(inner) => visitor.visit_pinned(inner, state),
            TypeSignature::Boxed(inner) => visitor.visit_boxed(inner, state),
            TypeSignature::SzArray(element) => visitor.visit_sz_array(element, state),
            TypeSignature::Array(array) => visitor.visit_array(array, state),
            TypeSignature::FnPtr(method) => visitor.visit_fn_ptr(method, state),
            TypeSignature::Modifier(modifier) => visitor.visit_modifier(modifier, state),
            TypeSignature::GenericInst(instance) => {
                visitor.visit_generic_instance(instance, state)
            }
            TypeSignature::GenericParam(param) => visitor.visit_generic_param(param, state),
            TypeSignature::Sentinel => visitor.visit_sentinel(state),
            TypeSignature::Invalid(placeholder) => visitor.visit_invalid(placeholder, state),
            corlib => visitor.visit_corlib_type(corlib, state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts tree nodes by walking recursively through the visitor.
    struct NodeCounter;

    impl TypeSignatureVisitor<usize> for NodeCounter {
        fn visit_corlib_type(&mut self, _signature: &TypeSignature) -> usize {
            1
        }
        fn visit_class_or_value(
            &mut self,
            _is_value_type: bool,
            _entity: &crate::metadata::model::TypeDefOrRef,
        ) -> usize {
            1
        }
        fn visit_pointer(&mut self, inner: &TypeSignature) -> usize {
            1 + inner.accept(self)
        }
        fn visit_by_ref(&mut self, inner: &TypeSignature) -> usize {
            1 + inner.accept(self)
        }
        fn visit_pinned(&mut self, inner: &TypeSignature) -> usize {
            1 + inner.accept(self)
        }
        fn visit_boxed(&mut self, inner: &TypeSignature) -> usize {
            1 + inner.accept(self)
        }
        fn visit_sz_array(&mut self, element: &TypeSignature) -> usize {
            1 + element.accept(self)
        }
        fn visit_array(&mut self, array: &SignatureArray) -> usize {
            1 + array.element.accept(self)
        }
        fn visit_fn_ptr(&mut self, method: &SignatureMethod) -> usize {
            let mut count = 1 + method.return_type.accept(self);
            for param in &method.params {
                count += param.accept(self);
            }
            count
        }
        fn visit_modifier(&mut self, modifier: &SignatureModifier) -> usize {
            1 + modifier.inner.accept(self)
        }
        fn visit_generic_instance(&mut self, instance: &SignatureGenericInst) -> usize {
            let mut count = 1;
            for arg in &instance.type_args {
                count += arg.accept(self);
            }
            count
        }
        fn visit_generic_param(&mut self, _param: &GenericParamSignature) -> usize {
            1
        }
        fn visit_sentinel(&mut self) -> usize {
            1
        }
        fn visit_invalid(&mut self, _placeholder: &InvalidTypeRef) -> usize {
            1
        }
    }

    #[test]
    fn test_visitor_walks_nested_tree() {
        // int32[][]* -> pointer, szarray, szarray, i4
        let signature = TypeSignature::Pointer(Box::new(TypeSignature::SzArray(Box::new(
            TypeSignature::SzArray(Box::new(TypeSignature::I4)),
        ))));
        assert_eq!(signature.accept(&mut NodeCounter), 4);
    }

    struct DepthTagger;

    impl TypeSignatureVisitorWith<usize, usize> for DepthTagger {
        fn visit_corlib_type(&mut self, _signature: &TypeSignature, state: usize) -> usize {
            state
        }
        fn visit_class_or_value(
            &mut self,
            _is_value_type: bool,
            _entity: &crate::metadata::model::TypeDefOrRef,
            state: usize,
        ) -> usize {
            state
        }
        fn visit_pointer(&mut self, inner: &TypeSignature, state: usize) -> usize {
            inner.accept_with(self, state + 1)
        }
        fn visit_by_ref(&mut self, inner: &TypeSignature, state: usize) -> usize {
            inner.accept_with(self, state + 1)
        }
        fn visit_pinned(&mut self, inner: &TypeSignature, state: usize) -> usize {
            inner.accept_with(self, state + 1)
        }
        fn visit_boxed(&mut self, inner: &TypeSignature, state: usize) -> usize {
            inner.accept_with(self, state + 1)
        }
        fn visit_sz_array(&mut self, element: &TypeSignature, state: usize) -> usize {
            element.accept_with(self, state + 1)
        }
        fn visit_array(&mut self, array: &SignatureArray, state: usize) -> usize {
            array.element.accept_with(self, state + 1)
        }
        fn visit_fn_ptr(&mut self, _method: &SignatureMethod, state: usize) -> usize {
            state
        }
        fn visit_modifier(&mut self, modifier: &SignatureModifier, state: usize) -> usize {
            modifier.inner.accept_with(self, state + 1)
        }
        fn visit_generic_instance(
            &mut self,
            _instance: &SignatureGenericInst,
            state: usize,
        ) -> usize {
            state
        }
        fn visit_generic_param(&mut self, _param: &GenericParamSignature, state: usize) -> usize {
            state
        }
        fn visit_sentinel(&mut self, state: usize) -> usize {
            state
        }
        fn visit_invalid(&mut self, _placeholder: &InvalidTypeRef, state: usize) -> usize {
            state
        }
    }

    #[test]
    fn test_stateful_visitor_threads_state() {
        let signature = TypeSignature::ByRef(Box::new(TypeSignature::SzArray(Box::new(
            TypeSignature::String,
        ))));
        assert_eq!(signature.accept_with(&mut DepthTagger, 0), 2);
    }
}
