//! The custom-attribute field-or-prop type grammar, ECMA-335 §II.23.3.
//!
//! Custom attribute values encode element types with a grammar of their own:
//! primitives appear as plain element bytes, `0x50` is `System.Type`, `0x51` a
//! boxed object, `0x1D` an szarray of a nested field-or-prop type, and `0x55` an
//! enum named by a serialized type name. The reader resolves enum names through
//! [`TypeNameParser`], producing ordinary [`TypeSignature`] values.

use std::sync::Arc;

use crate::{
    error::malformed_error,
    file::{parser::Parser, writer::BlobWriter},
    metadata::{
        identity::AssemblyIdentity,
        model::{
            AssemblyReference, InvalidSignatureReason, ModuleRc, ResolutionScope, TypeDefOrRef,
            TypeReference, TypeRefRc,
        },
        signatures::{BlobReaderContext, TypeSignature, ELEMENT_TYPE},
    },
    Result,
};

/// Parses serialized type names (`Ns.Name, Assembly, Version=...`) into type
/// references rooted in a module's scopes.
pub struct TypeNameParser;

impl TypeNameParser {
    /// Parse a serialized type name into a reference.
    ///
    /// Assembly-qualified names scope to an assembly reference built from the
    /// qualifier; unqualified names scope to `module` itself. Nested types use
    /// the `Outer+Inner` convention.
    ///
    /// # Errors
    /// Returns an error for empty names or malformed assembly qualifiers.
    pub fn parse(module: &ModuleRc, serialized: &str) -> Result<TypeRefRc> {
        let (type_part, assembly_part) = match serialized.split_once(',') {
            Some((type_part, rest)) => (type_part.trim(), Some(rest.trim())),
            None => (serialized.trim(), None),
        };

        if type_part.is_empty() {
            return Err(malformed_error!("Empty serialized type name"));
        }

        let root_scope = match assembly_part {
            Some(qualifier) => {
                let identity = AssemblyIdentity::parse(qualifier)?;
                ResolutionScope::Assembly(Arc::new(AssemblyReference::new(identity)))
            }
            None => module.scope(),
        };

        let mut segments = type_part.split('+');
        let first = segments
            .next()
            .ok_or_else(|| malformed_error!("Empty serialized type name"))?;

        let (namespace, name) = match first.rsplit_once('.') {
            Some((namespace, name)) => (Some(namespace.to_string()), name),
            None => (None, first),
        };

        let mut current = Arc::new(TypeReference::new(
            Some(module),
            Some(root_scope),
            namespace,
            name,
        ));

        for nested in segments {
            current = Arc::new(TypeReference::new(
                Some(module),
                Some(ResolutionScope::Type(current)),
                None,
                nested,
            ));
        }

        Ok(current)
    }

    /// Format a reference back into a serialized type name, including the
    /// assembly qualifier when the root scope is an assembly reference.
    #[must_use]
    pub fn format(reference: &TypeReference) -> String {
        let mut root: &TypeReference = reference;
        let mut chain: Vec<&TypeReference> = vec![reference];
        while let Some(ResolutionScope::Type(parent)) = &root.scope {
            chain.push(parent.as_ref());
            root = parent.as_ref();
        }

        let mut result = String::new();
        for (position, segment) in chain.iter().rev().enumerate() {
            if position > 0 {
                result.push('+');
            } else if let Some(namespace) = &segment.namespace {
                if !namespace.is_empty() {
                    result.push_str(namespace);
                    result.push('.');
                }
            }
            result.push_str(&segment.name);
        }

        if let Some(ResolutionScope::Assembly(assembly_ref)) = &root.scope {
            result.push_str(", ");
            result.push_str(&assembly_ref.identity.display_name());
        }

        result
    }
}

/// Read one field-or-prop type from a custom-attribute blob.
///
/// # Errors
/// Returns an error on blob truncation; grammar violations substitute invalid
/// placeholders after reporting to the context's listener.
pub fn read_field_or_prop_type(
    parser: &mut Parser<'_>,
    context: &BlobReaderContext<'_>,
) -> Result<TypeSignature> {
    let element = parser.read_le::<u8>()?;
    match element {
        ELEMENT_TYPE::BOOLEAN => Ok(TypeSignature::Boolean),
        ELEMENT_TYPE::CHAR => Ok(TypeSignature::Char),
        ELEMENT_TYPE::I1 => Ok(TypeSignature::I1),
        ELEMENT_TYPE::U1 => Ok(TypeSignature::U1),
        ELEMENT_TYPE::I2 => Ok(TypeSignature::I2),
        ELEMENT_TYPE::U2 => Ok(TypeSignature::U2),
        ELEMENT_TYPE::I4 => Ok(TypeSignature::I4),
        ELEMENT_TYPE::U4 => Ok(TypeSignature::U4),
        ELEMENT_TYPE::I8 => Ok(TypeSignature::I8),
        ELEMENT_TYPE::U8 => Ok(TypeSignature::U8),
        ELEMENT_TYPE::R4 => Ok(TypeSignature::R4),
        ELEMENT_TYPE::R8 => Ok(TypeSignature::R8),
        ELEMENT_TYPE::STRING => Ok(TypeSignature::String),
        ELEMENT_TYPE::SZARRAY => Ok(TypeSignature::SzArray(Box::new(read_field_or_prop_type(
            parser, context,
        )?))),
        ELEMENT_TYPE::BOXED => Ok(TypeSignature::Boxed(Box::new(TypeSignature::Object))),
        ELEMENT_TYPE::TYPE => match context.module {
            Some(module) => Ok(TypeSignature::Class(TypeDefOrRef::Reference(
                module.corlib_type("System", "Type"),
            ))),
            None => Ok(TypeSignature::Invalid(context.invalid(
                InvalidSignatureReason::InvalidCodedIndex,
                malformed_error!("System.Type argument requires a module context"),
            ))),
        },
        ELEMENT_TYPE::ENUM => {
            let Some(name) = parser.read_ser_string()? else {
                return Ok(TypeSignature::Invalid(context.invalid(
                    InvalidSignatureReason::InvalidCodedIndex,
                    malformed_error!("Enum argument with null type name"),
                )));
            };

            let Some(module) = context.module else {
                return Ok(TypeSignature::Invalid(context.invalid(
                    InvalidSignatureReason::InvalidCodedIndex,
                    malformed_error!("Enum argument requires a module context - {}", name),
                )));
            };

            match TypeNameParser::parse(module, &name) {
                Ok(reference) => Ok(TypeSignature::ValueType(TypeDefOrRef::Reference(reference))),
                Err(error) => Ok(TypeSignature::Invalid(
                    context.invalid(InvalidSignatureReason::InvalidCodedIndex, error),
                )),
            }
        }
        _ => Ok(TypeSignature::Invalid(context.invalid(
            InvalidSignatureReason::UnknownElementType,
            malformed_error!("Unsupported field-or-prop element type - {}", element),
        ))),
    }
}

/// Write one field-or-prop type into a custom-attribute blob.
///
/// Value-type references encode as enums (`0x55` plus serialized name), which is
/// the only value-type shape the grammar allows.
///
/// # Errors
/// Returns an error for signatures the grammar cannot express.
pub fn write_field_or_prop_type(
    signature: &TypeSignature,
    writer: &mut BlobWriter,
) -> Result<()> {
    match signature.strip_modifiers() {
        TypeSignature::Boolean
        | TypeSignature::Char
        | TypeSignature::I1
        | TypeSignature::U1
        | TypeSignature::I2
        | TypeSignature::U2
        | TypeSignature::I4
        | TypeSignature::U4
        | TypeSignature::I8
        | TypeSignature::U8
        | TypeSignature::R4
        | TypeSignature::R8
        | TypeSignature::String => {
            writer.write_u8(signature.element_type());
            Ok(())
        }
        TypeSignature::SzArray(element) => {
            writer.write_u8(ELEMENT_TYPE::SZARRAY);
            write_field_or_prop_type(element, writer)
        }
        TypeSignature::Boxed(_) | TypeSignature::Object => {
            writer.write_u8(ELEMENT_TYPE::BOXED);
            Ok(())
        }
        TypeSignature::Class(TypeDefOrRef::Reference(reference))
            if reference.is_type_of(Some("System"), "Type") =>
        {
            writer.write_u8(ELEMENT_TYPE::TYPE);
            Ok(())
        }
        TypeSignature::ValueType(TypeDefOrRef::Reference(reference)) => {
            writer.write_u8(ELEMENT_TYPE::ENUM);
            writer.write_ser_string(Some(&TypeNameParser::format(reference)))
        }
        other => Err(malformed_error!(
            "Type cannot be expressed in the field-or-prop grammar - {}",
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{model::CilModule, signatures::IgnoreErrors};

    struct NoResolver;

    impl crate::metadata::signatures::TypeSignatureResolver for NoResolver {
        fn resolve_token(&self, _token: crate::metadata::token::Token) -> Option<TypeDefOrRef> {
            None
        }
    }

    #[test]
    fn test_type_name_parser_qualified() {
        let module = CilModule::new("app.dll");
        let reference = TypeNameParser::parse(
            &module,
            "System.IO.FileAccess, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
        )
        .unwrap();

        assert!(reference.is_type_of(Some("System.IO"), "FileAccess"));
        match &reference.scope {
            Some(ResolutionScope::Assembly(assembly_ref)) => {
                assert_eq!(assembly_ref.identity.name, "mscorlib");
            }
            other => panic!("Expected assembly scope, got {:?}", other),
        }
    }

    #[test]
    fn test_type_name_parser_nested_unqualified() {
        let module = CilModule::new("app.dll");
        let reference = TypeNameParser::parse(&module, "App.Outer+Inner").unwrap();

        assert_eq!(reference.name, "Inner");
        assert!(matches!(
            reference.scope,
            Some(ResolutionScope::Type(ref parent)) if parent.is_type_of(Some("App"), "Outer")
        ));
        assert_eq!(TypeNameParser::format(&reference), "App.Outer+Inner");
    }

    #[test]
    fn test_enum_round_trip() {
        let module = CilModule::new("app.dll");
        let reference = TypeNameParser::parse(
            &module,
            "App.Color, Palette, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null",
        )
        .unwrap();
        let signature = TypeSignature::ValueType(TypeDefOrRef::Reference(reference));

        let mut writer = BlobWriter::new();
        write_field_or_prop_type(&signature, &mut writer).unwrap();

        let listener = IgnoreErrors;
        let context = BlobReaderContext::new(Some(&module), &NoResolver, &listener);
        let mut parser = Parser::new(writer.as_slice());
        let parsed = read_field_or_prop_type(&mut parser, &context).unwrap();

        match parsed {
            TypeSignature::ValueType(TypeDefOrRef::Reference(parsed_ref)) => {
                assert!(parsed_ref.is_type_of(Some("App"), "Color"));
            }
            other => panic!("Expected enum value type, got {:?}", other),
        }
    }

    #[test]
    fn test_primitive_and_array_round_trip() {
        let module = CilModule::new("app.dll");
        let signature = TypeSignature::SzArray(Box::new(TypeSignature::I4));

        let mut writer = BlobWriter::new();
        write_field_or_prop_type(&signature, &mut writer).unwrap();
        assert_eq!(writer.as_slice(), &[ELEMENT_TYPE::SZARRAY, ELEMENT_TYPE::I4]);

        let listener = IgnoreErrors;
        let context = BlobReaderContext::new(Some(&module), &NoResolver, &listener);
        let mut parser = Parser::new(writer.as_slice());
        let parsed = read_field_or_prop_type(&mut parser, &context).unwrap();
        assert!(matches!(
            parsed,
            TypeSignature::SzArray(element) if matches!(*element, TypeSignature::I4)
        ));
    }
}
