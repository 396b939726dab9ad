//! Signature-to-blob encoding.
//!
//! The writers here are the symmetric inverse of [`crate::metadata::signatures::SignatureParser`].
//! Coded indices are obtained from an injected [`TypeDefOrRefIndexProvider`], so a
//! signature can serialize against any table layout without the blob layer knowing
//! about a particular metadata buffer.

use crate::{
    error::malformed_error,
    file::writer::BlobWriter,
    metadata::{
        model::TypeDefOrRef,
        signatures::{
            SignatureErrorListener, SignatureField, SignatureLocalVariables, SignatureMethod,
            SignatureMethodSpec, SignatureProperty, TypeSignature, ELEMENT_TYPE, SIGNATURE_HEADER,
        },
        token::Token,
    },
    Result,
};

/// Supplies the coded index for any `TypeDefOrRef` entity during serialization.
///
/// Implementations typically assign row ids from a metadata buffer under
/// construction; tests hand out sequential indices.
pub trait TypeDefOrRefIndexProvider {
    /// The token to encode for `entity`
    ///
    /// # Errors
    /// Returns an error when the entity cannot be represented in the target
    /// table layout (e.g. an invalid placeholder).
    fn token_for(&self, entity: &TypeDefOrRef) -> Result<Token>;
}

/// Context carried through one blob write.
pub struct BlobSerializationContext<'a> {
    /// The output writer
    pub writer: &'a mut BlobWriter,
    /// The injected coded-index provider
    pub provider: &'a dyn TypeDefOrRefIndexProvider,
    /// The injected diagnostic sink
    pub listener: &'a dyn SignatureErrorListener,
}

impl<'a> BlobSerializationContext<'a> {
    /// Create a context from its collaborators
    #[must_use]
    pub fn new(
        writer: &'a mut BlobWriter,
        provider: &'a dyn TypeDefOrRefIndexProvider,
        listener: &'a dyn SignatureErrorListener,
    ) -> Self {
        BlobSerializationContext {
            writer,
            provider,
            listener,
        }
    }

    fn write_type_def_or_ref(&mut self, entity: &TypeDefOrRef) -> Result<()> {
        let token = self.provider.token_for(entity)?;
        self.writer.write_compressed_token(token)
    }
}

/// Encode a type signature into the context's writer.
///
/// # Errors
/// Returns an error for invalid placeholders (reported to the listener first)
/// and for values the compressed encodings cannot represent.
pub fn write_type_signature(
    signature: &TypeSignature,
    context: &mut BlobSerializationContext<'_>,
) -> Result<()> {
    match signature {
        TypeSignature::Class(entity) => {
            context.writer.write_u8(ELEMENT_TYPE::CLASS);
            context.write_type_def_or_ref(entity)
        }
        TypeSignature::ValueType(entity) => {
            context.writer.write_u8(ELEMENT_TYPE::VALUETYPE);
            context.write_type_def_or_ref(entity)
        }
        TypeSignature::Pointer(inner) => {
            context.writer.write_u8(ELEMENT_TYPE::PTR);
            write_type_signature(inner, context)
        }
        TypeSignature::ByRef(inner) => {
            context.writer.write_u8(ELEMENT_TYPE::BYREF);
            write_type_signature(inner, context)
        }
        TypeSignature::Pinned(inner) => {
            context.writer.write_u8(ELEMENT_TYPE::PINNED);
            write_type_signature(inner, context)
        }
        TypeSignature::Boxed(inner) => {
            context.writer.write_u8(ELEMENT_TYPE::BOXED);
            write_type_signature(inner, context)
        }
        TypeSignature::SzArray(element) => {
            context.writer.write_u8(ELEMENT_TYPE::SZARRAY);
            write_type_signature(element, context)
        }
        TypeSignature::Array(array) => {
            context.writer.write_u8(ELEMENT_TYPE::ARRAY);
            write_type_signature(&array.element, context)?;
            context.writer.write_compressed_uint(array.rank)?;

            let sizes: Vec<u32> = array
                .dimensions
                .iter()
                .filter_map(|dimension| dimension.size)
                .collect();
            context.writer.write_compressed_uint(sizes.len() as u32)?;
            for size in sizes {
                context.writer.write_compressed_uint(size)?;
            }

            let lower_bounds: Vec<i32> = array
                .dimensions
                .iter()
                .filter_map(|dimension| dimension.lower_bound)
                .collect();
            context
                .writer
                .write_compressed_uint(lower_bounds.len() as u32)?;
            for lower_bound in lower_bounds {
                context.writer.write_compressed_int(lower_bound)?;
            }
            Ok(())
        }
        TypeSignature::FnPtr(method) => {
            context.writer.write_u8(ELEMENT_TYPE::FNPTR);
            write_method_signature(method, context)
        }
        TypeSignature::Modifier(modifier) => {
            context.writer.write_u8(if modifier.required {
                ELEMENT_TYPE::CMOD_REQD
            } else {
                ELEMENT_TYPE::CMOD_OPT
            });
            context.write_type_def_or_ref(&modifier.modifier_type)?;
            write_type_signature(&modifier.inner, context)
        }
        TypeSignature::GenericInst(inst) => {
            context.writer.write_u8(ELEMENT_TYPE::GENERICINST);
            context.writer.write_u8(if inst.is_value_type {
                ELEMENT_TYPE::VALUETYPE
            } else {
                ELEMENT_TYPE::CLASS
            });
            context.write_type_def_or_ref(&inst.generic_type)?;
            context
                .writer
                .write_compressed_uint(inst.type_args.len() as u32)?;
            for arg in &inst.type_args {
                write_type_signature(arg, context)?;
            }
            Ok(())
        }
        TypeSignature::GenericParam(param) => {
            context.writer.write_u8(if param.from_method {
                ELEMENT_TYPE::MVAR
            } else {
                ELEMENT_TYPE::VAR
            });
            context.writer.write_compressed_uint(param.index)
        }
        TypeSignature::Sentinel => {
            context.writer.write_u8(ELEMENT_TYPE::SENTINEL);
            Ok(())
        }
        TypeSignature::Invalid(placeholder) => {
            let error = malformed_error!(
                "Invalid type placeholder cannot be serialized - {}",
                placeholder.name()
            );
            context.listener.report(&error);
            Err(error)
        }
        primitive => {
            context.writer.write_u8(primitive.element_type());
            Ok(())
        }
    }
}

/// Encode a method signature: header, counts, return type, parameters.
///
/// The vararg sentinel recorded in `sentinel_index` is re-emitted at its
/// original position.
///
/// # Errors
/// Propagates type-encoding failures.
pub fn write_method_signature(
    signature: &SignatureMethod,
    context: &mut BlobSerializationContext<'_>,
) -> Result<()> {
    let mut header = signature.calling_convention.to_header();
    if signature.has_this {
        header |= SIGNATURE_HEADER::HAS_THIS;
    }
    if signature.explicit_this {
        header |= SIGNATURE_HEADER::EXPLICIT_THIS;
    }
    if signature.is_generic() {
        header |= SIGNATURE_HEADER::GENERIC;
    }
    context.writer.write_u8(header);

    if signature.is_generic() {
        context
            .writer
            .write_compressed_uint(signature.generic_param_count)?;
    }

    context
        .writer
        .write_compressed_uint(signature.params.len() as u32)?;
    write_type_signature(&signature.return_type, context)?;

    for (index, param) in signature.params.iter().enumerate() {
        if signature.sentinel_index == Some(index) {
            context.writer.write_u8(ELEMENT_TYPE::SENTINEL);
        }
        write_type_signature(param, context)?;
    }

    Ok(())
}

/// Encode a field signature: `FIELD` header plus the field type.
///
/// # Errors
/// Propagates type-encoding failures.
pub fn write_field_signature(
    signature: &SignatureField,
    context: &mut BlobSerializationContext<'_>,
) -> Result<()> {
    context.writer.write_u8(SIGNATURE_HEADER::FIELD);
    write_type_signature(&signature.field_type, context)
}

/// Encode a property signature: header, parameter count, type, parameters.
///
/// # Errors
/// Propagates type-encoding failures.
pub fn write_property_signature(
    signature: &SignatureProperty,
    context: &mut BlobSerializationContext<'_>,
) -> Result<()> {
    let mut header = SIGNATURE_HEADER::PROPERTY;
    if signature.has_this {
        header |= SIGNATURE_HEADER::HAS_THIS;
    }
    context.writer.write_u8(header);

    context
        .writer
        .write_compressed_uint(signature.params.len() as u32)?;
    write_type_signature(&signature.property_type, context)?;
    for param in &signature.params {
        write_type_signature(param, context)?;
    }

    Ok(())
}

/// Encode a local variable signature: `LOCAL_SIG` header, count, slot types.
///
/// # Errors
/// Propagates type-encoding failures.
pub fn write_local_var_signature(
    signature: &SignatureLocalVariables,
    context: &mut BlobSerializationContext<'_>,
) -> Result<()> {
    context.writer.write_u8(SIGNATURE_HEADER::LOCAL_SIG);
    context
        .writer
        .write_compressed_uint(signature.locals.len() as u32)?;
    for local in &signature.locals {
        write_type_signature(local, context)?;
    }
    Ok(())
}

/// Encode a method specification signature: `GENERIC_INST` header, count, arguments.
///
/// # Errors
/// Propagates type-encoding failures.
pub fn write_method_spec_signature(
    signature: &SignatureMethodSpec,
    context: &mut BlobSerializationContext<'_>,
) -> Result<()> {
    context.writer.write_u8(SIGNATURE_HEADER::GENERIC_INST);
    context
        .writer
        .write_compressed_uint(signature.type_args.len() as u32)?;
    for arg in &signature.type_args {
        write_type_signature(arg, context)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{signatures::IgnoreErrors, token::TableId};

    struct RejectingProvider;

    impl TypeDefOrRefIndexProvider for RejectingProvider {
        fn token_for(&self, _entity: &TypeDefOrRef) -> Result<Token> {
            Ok(Token::from_parts(TableId::TYPE_REF, 1))
        }
    }

    #[test]
    fn test_primitive_encodes_to_single_byte() {
        let mut writer = BlobWriter::new();
        let listener = IgnoreErrors;
        let mut context = BlobSerializationContext::new(&mut writer, &RejectingProvider, &listener);

        write_type_signature(&TypeSignature::I4, &mut context).unwrap();
        assert_eq!(writer.as_slice(), &[ELEMENT_TYPE::I4]);
    }

    #[test]
    fn test_method_header_flags() {
        let mut signature =
            SignatureMethod::instance_method(TypeSignature::Void, vec![TypeSignature::String]);
        signature.generic_param_count = 1;

        let mut writer = BlobWriter::new();
        let listener = IgnoreErrors;
        let mut context = BlobSerializationContext::new(&mut writer, &RejectingProvider, &listener);
        write_method_signature(&signature, &mut context).unwrap();

        let bytes = writer.as_slice();
        assert_eq!(
            bytes[0],
            SIGNATURE_HEADER::HAS_THIS | SIGNATURE_HEADER::GENERIC
        );
        // generic arity, param count, return type, param
        assert_eq!(
            &bytes[1..],
            &[0x01, 0x01, ELEMENT_TYPE::VOID, ELEMENT_TYPE::STRING]
        );
    }

    #[test]
    fn test_invalid_placeholder_fails_to_serialize() {
        use crate::metadata::model::{InvalidSignatureReason, InvalidTypeRef};

        let signature =
            TypeSignature::Invalid(InvalidTypeRef::get(InvalidSignatureReason::InvalidCodedIndex));
        let mut writer = BlobWriter::new();
        let listener = IgnoreErrors;
        let mut context = BlobSerializationContext::new(&mut writer, &RejectingProvider, &listener);

        assert!(write_type_signature(&signature, &mut context).is_err());
    }
}
