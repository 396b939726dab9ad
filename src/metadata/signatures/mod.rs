//! Blob signature parsing, encoding and structural operations.
//!
//! This module implements the signature grammars of ECMA-335 §II.23.2: type
//! expressions, method/field/property/local-variable/method-spec signatures and
//! the custom-attribute field-or-prop grammar. Parsing and serialization are
//! decoupled from metadata tables through injected collaborators:
//!
//! - a [`TypeSignatureResolver`] turns decoded coded indices into entities,
//! - a [`TypeDefOrRefIndexProvider`] assigns coded indices during writing, and
//! - a [`SignatureErrorListener`] receives non-fatal diagnostics while parsing
//!   substitutes interned invalid placeholders and carries on.
//!
//! # Example
//!
//! ```rust,ignore
//! use dotresolve::metadata::signatures::{BlobReaderContext, SignatureParser};
//!
//! let context = BlobReaderContext::new(Some(&module), &resolver, &listener);
//! let mut parser = SignatureParser::new(blob, &context);
//! let signature = parser.parse_method_signature()?;
//! # Ok::<(), dotresolve::Error>(())
//! ```

mod attributes;
mod encoders;
mod ops;
mod parser;
mod types;
mod visitor;

pub use attributes::{read_field_or_prop_type, write_field_or_prop_type, TypeNameParser};
pub use encoders::{
    write_field_signature, write_local_var_signature, write_method_signature,
    write_method_spec_signature, write_property_signature, write_type_signature,
    BlobSerializationContext, TypeDefOrRefIndexProvider,
};
pub use ops::GenericContext;
pub use parser::{
    BlobReaderContext, CollectErrors, IgnoreErrors, SignatureErrorListener, SignatureParser,
    TypeSignatureResolver,
};
pub use types::{
    ArrayDimension, CallingConvention, GenericParamSignature, SignatureArray, SignatureField,
    SignatureGenericInst, SignatureLocalVariables, SignatureMethod, SignatureMethodSpec,
    SignatureModifier, SignatureProperty, TypeSignature, ELEMENT_TYPE, SIGNATURE_HEADER,
};
pub use visitor::{TypeSignatureVisitor, TypeSignatureVisitorWith};
