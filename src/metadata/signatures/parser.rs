//! Blob-to-signature parsing.
//!
//! [`SignatureParser`] decodes the signature grammars of ECMA-335 §II.23.2 from a
//! positional blob reader. Table lookups are decoupled from parsing: coded indices
//! and runtime handles go through the [`TypeSignatureResolver`] injected via the
//! [`BlobReaderContext`], and non-fatal problems are reported to the context's
//! error listener while an invalid placeholder keeps the parse going.

use std::sync::Mutex;

use crate::{
    error::malformed_error,
    file::parser::Parser,
    metadata::{
        model::{InvalidSignatureReason, InvalidTypeRef, ModuleRc, TypeDefOrRef},
        signatures::{
            ArrayDimension, CallingConvention, GenericParamSignature, SignatureArray,
            SignatureField, SignatureGenericInst, SignatureLocalVariables, SignatureMethod,
            SignatureMethodSpec, SignatureModifier, SignatureProperty, TypeSignature, ELEMENT_TYPE,
            SIGNATURE_HEADER,
        },
        token::Token,
    },
    Error::RecursionLimit,
    Result,
};

/// Maximum recursion depth for signature parsing
const MAX_RECURSION_DEPTH: usize = 50;

/// Receives non-fatal diagnostics from blob parsing and serialization.
///
/// Implementations must not panic; the parse continues after every report with an
/// invalid placeholder substituted at the offending position.
pub trait SignatureErrorListener {
    /// Report one diagnostic
    fn report(&self, error: &crate::Error);
}

/// Listener that drops all diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreErrors;

impl SignatureErrorListener for IgnoreErrors {
    fn report(&self, _error: &crate::Error) {}
}

/// Listener that collects diagnostic messages, mainly for tests and tooling.
#[derive(Debug, Default)]
pub struct CollectErrors {
    messages: Mutex<Vec<String>>,
}

impl CollectErrors {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        CollectErrors::default()
    }

    /// Drain the collected messages
    #[must_use]
    pub fn take(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(mut messages) => std::mem::take(&mut *messages),
            Err(_) => Vec::new(),
        }
    }
}

impl SignatureErrorListener for CollectErrors {
    fn report(&self, error: &crate::Error) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(error.to_string());
        }
    }
}

/// Turns decoded `TypeDefOrRef` coded indices and runtime-internal handles into
/// concrete entities.
///
/// The caller injects one per blob context; parsing carries no table knowledge of
/// its own.
pub trait TypeSignatureResolver {
    /// Resolve a decoded coded-index token to an entity; `None` reports an
    /// invalid coded index
    fn resolve_token(&self, token: Token) -> Option<TypeDefOrRef>;

    /// Resolve a runtime-internal type handle (`ELEMENT_TYPE::INTERNAL`);
    /// the default knows none
    fn resolve_runtime_address(&self, _address: u64) -> Option<TypeDefOrRef> {
        None
    }
}

/// Context carried through one blob read.
pub struct BlobReaderContext<'a> {
    /// The module the blob belongs to, for the corlib factory and type-name parsing
    pub module: Option<&'a ModuleRc>,
    /// The injected coded-index resolver
    pub resolver: &'a dyn TypeSignatureResolver,
    /// The injected diagnostic sink
    pub listener: &'a dyn SignatureErrorListener,
}

impl<'a> BlobReaderContext<'a> {
    /// Create a context from its collaborators
    #[must_use]
    pub fn new(
        module: Option<&'a ModuleRc>,
        resolver: &'a dyn TypeSignatureResolver,
        listener: &'a dyn SignatureErrorListener,
    ) -> Self {
        BlobReaderContext {
            module,
            resolver,
            listener,
        }
    }

    /// Report a diagnostic and produce the matching placeholder
    pub(crate) fn invalid(
        &self,
        reason: InvalidSignatureReason,
        error: crate::Error,
    ) -> InvalidTypeRef {
        self.listener.report(&error);
        InvalidTypeRef::get(reason)
    }
}

/// Signature parser over one blob.
///
/// Do not reuse a parser instance across multiple signatures; each blob gets a
/// fresh one positioned at its start.
pub struct SignatureParser<'a> {
    parser: Parser<'a>,
    context: &'a BlobReaderContext<'a>,
    depth: usize,
}

impl<'a> SignatureParser<'a> {
    /// Create a parser over `data` with the given blob context
    #[must_use]
    pub fn new(data: &'a [u8], context: &'a BlobReaderContext<'a>) -> Self {
        SignatureParser {
            parser: Parser::new(data),
            context,
            depth: 0,
        }
    }

    /// Resolve a compressed coded index through the injected resolver,
    /// substituting a placeholder on failure.
    fn read_type_def_or_ref(&mut self, allow_spec: bool) -> Result<TypeDefOrRef> {
        let token = self.parser.read_compressed_token()?;

        let Some(entity) = self.context.resolver.resolve_token(token) else {
            return Ok(TypeDefOrRef::Invalid(self.context.invalid(
                InvalidSignatureReason::InvalidCodedIndex,
                malformed_error!("Coded index does not resolve - {}", token),
            )));
        };

        if !allow_spec && matches!(entity, TypeDefOrRef::Specification(_)) {
            return Ok(TypeDefOrRef::Invalid(self.context.invalid(
                InvalidSignatureReason::IllegalTypeSpec,
                malformed_error!("Coded index selects a TypeSpec where not allowed - {}", token),
            )));
        }

        Ok(entity)
    }

    /// Parse a single type from the signature blob
    pub fn parse_type(&mut self) -> Result<TypeSignature> {
        self.depth += 1;
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let result = self.parse_type_inner();
        self.depth -= 1;
        result
    }

    fn parse_type_inner(&mut self) -> Result<TypeSignature> {
        let current_byte = self.parser.read_le::<u8>()?;
        match current_byte {
            ELEMENT_TYPE::VOID => Ok(TypeSignature::Void),
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
            ELEMENT_TYPE::OBJECT => Ok(TypeSignature::Object),
            ELEMENT_TYPE::I => Ok(TypeSignature::I),
            ELEMENT_TYPE::U => Ok(TypeSignature::U),
            ELEMENT_TYPE::TYPEDBYREF => Ok(TypeSignature::TypedByRef),
            ELEMENT_TYPE::CLASS => Ok(TypeSignature::Class(self.read_type_def_or_ref(true)?)),
            ELEMENT_TYPE::VALUETYPE => {
                Ok(TypeSignature::ValueType(self.read_type_def_or_ref(true)?))
            }
            ELEMENT_TYPE::PTR => Ok(TypeSignature::Pointer(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::BYREF => Ok(TypeSignature::ByRef(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::PINNED => Ok(TypeSignature::Pinned(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::BOXED => Ok(TypeSignature::Boxed(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::SZARRAY => Ok(TypeSignature::SzArray(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::VAR => Ok(TypeSignature::GenericParam(GenericParamSignature {
                index: self.parser.read_compressed_uint()?,
                from_method: false,
            })),
            ELEMENT_TYPE::MVAR => Ok(TypeSignature::GenericParam(GenericParamSignature {
                index: self.parser.read_compressed_uint()?,
                from_method: true,
            })),
            ELEMENT_TYPE::CMOD_REQD | ELEMENT_TYPE::CMOD_OPT => {
                let modifier_type = self.read_type_def_or_ref(false)?;
                Ok(TypeSignature::Modifier(SignatureModifier {
                    required: current_byte == ELEMENT_TYPE::CMOD_REQD,
                    modifier_type,
                    inner: Box::new(self.parse_type()?),
                }))
            }
            ELEMENT_TYPE::ARRAY => self.parse_array(),
            ELEMENT_TYPE::GENERICINST => self.parse_generic_inst(),
            ELEMENT_TYPE::FNPTR => Ok(TypeSignature::FnPtr(Box::new(
                self.parse_method_signature()?,
            ))),
            ELEMENT_TYPE::SENTINEL => Ok(TypeSignature::Sentinel),
            ELEMENT_TYPE::INTERNAL => {
                let address = self.parser.read_le::<u64>()?;
                match self.context.resolver.resolve_runtime_address(address) {
                    Some(entity) => Ok(TypeSignature::Class(entity)),
                    None => Ok(TypeSignature::Invalid(self.context.invalid(
                        InvalidSignatureReason::UnresolvedRuntimeHandle,
                        malformed_error!("Runtime type handle does not resolve - 0x{:x}", address),
                    ))),
                }
            }
            _ => Ok(TypeSignature::Invalid(self.context.invalid(
                InvalidSignatureReason::UnknownElementType,
                malformed_error!("Unsupported ELEMENT_TYPE - {}", current_byte),
            ))),
        }
    }

    /// Parse a general array shape: element type, rank, sizes, lower bounds
    fn parse_array(&mut self) -> Result<TypeSignature> {
        let element = self.parse_type()?;
        let rank = self.parser.read_compressed_uint()?;

        let num_sizes = self.parser.read_compressed_uint()?;
        let mut dimensions: Vec<ArrayDimension> = Vec::with_capacity(num_sizes as usize);
        for _ in 0..num_sizes {
            dimensions.push(ArrayDimension {
                size: Some(self.parser.read_compressed_uint()?),
                lower_bound: None,
            });
        }

        let num_lo_bounds = self.parser.read_compressed_uint()?;
        for i in 0..num_lo_bounds {
            let lower_bound = self.parser.read_compressed_int()?;
            if let Some(dimension) = dimensions.get_mut(i as usize) {
                dimension.lower_bound = Some(lower_bound);
            } else {
                dimensions.push(ArrayDimension {
                    size: None,
                    lower_bound: Some(lower_bound),
                });
            }
        }

        if rank == 0 {
            return Ok(TypeSignature::Invalid(self.context.invalid(
                InvalidSignatureReason::InvalidArrayRank,
                malformed_error!("Array signature declares rank 0"),
            )));
        }

        if num_sizes > rank || num_lo_bounds > rank {
            return Ok(TypeSignature::Invalid(self.context.invalid(
                InvalidSignatureReason::InconsistentArrayBounds,
                malformed_error!(
                    "Array bounds exceed rank - rank {} sizes {} bounds {}",
                    rank,
                    num_sizes,
                    num_lo_bounds
                ),
            )));
        }

        Ok(TypeSignature::Array(SignatureArray {
            element: Box::new(element),
            rank,
            dimensions,
        }))
    }

    /// Parse a generic instantiation: class/value tag, open type, argument list
    fn parse_generic_inst(&mut self) -> Result<TypeSignature> {
        let kind_byte = self.parser.read_le::<u8>()?;
        if kind_byte != ELEMENT_TYPE::CLASS && kind_byte != ELEMENT_TYPE::VALUETYPE {
            return Err(malformed_error!(
                "GENERICINST - Next byte is not TYPE_CLASS or TYPE_VALUE - {}",
                kind_byte
            ));
        }

        let generic_type = self.read_type_def_or_ref(true)?;
        let arg_count = self.parser.read_compressed_uint()?;

        let mut type_args = Vec::with_capacity(arg_count as usize);
        for _ in 0..arg_count {
            type_args.push(self.parse_type()?);
        }

        Ok(TypeSignature::GenericInst(SignatureGenericInst {
            is_value_type: kind_byte == ELEMENT_TYPE::VALUETYPE,
            generic_type,
            type_args,
        }))
    }

    /// Parse a method signature - `MethodDefSig`, `MethodRefSig`, `StandAloneMethodSig`
    pub fn parse_method_signature(&mut self) -> Result<SignatureMethod> {
        let header = self.parser.read_le::<u8>()?;

        let Some(calling_convention) = CallingConvention::from_header(header) else {
            return Err(malformed_error!("Invalid calling convention - 0x{:02x}", header));
        };

        let generic_param_count = if header & SIGNATURE_HEADER::GENERIC != 0 {
            self.parser.read_compressed_uint()?
        } else {
            0
        };

        let param_count = self.parser.read_compressed_uint()?;
        let return_type = self.parse_type()?;

        let mut params = Vec::with_capacity(param_count as usize);
        let mut sentinel_index = None;
        while (params.len() as u32) < param_count {
            if self.parser.has_more_data() && self.parser.peek_byte()? == ELEMENT_TYPE::SENTINEL {
                self.parser.advance()?;
                sentinel_index = Some(params.len());
                continue;
            }
            params.push(self.parse_type()?);
        }

        Ok(SignatureMethod {
            has_this: header & SIGNATURE_HEADER::HAS_THIS != 0,
            explicit_this: header & SIGNATURE_HEADER::EXPLICIT_THIS != 0,
            calling_convention,
            generic_param_count,
            return_type: Box::new(return_type),
            params,
            sentinel_index,
        })
    }

    /// Parse a field signature, expecting the `FIELD` header byte
    pub fn parse_field_signature(&mut self) -> Result<SignatureField> {
        let header = self.parser.read_le::<u8>()?;
        if header != SIGNATURE_HEADER::FIELD {
            return Err(malformed_error!("Invalid field signature header - 0x{:02x}", header));
        }

        Ok(SignatureField {
            field_type: self.parse_type()?,
        })
    }

    /// Parse a property signature, expecting the `PROPERTY` header byte
    pub fn parse_property_signature(&mut self) -> Result<SignatureProperty> {
        let header = self.parser.read_le::<u8>()?;
        if header & SIGNATURE_HEADER::PROPERTY == 0 {
            return Err(malformed_error!(
                "Invalid property signature header - 0x{:02x}",
                header
            ));
        }

        let param_count = self.parser.read_compressed_uint()?;
        let property_type = self.parse_type()?;

        let mut params = Vec::with_capacity(param_count as usize);
        for _ in 0..param_count {
            params.push(self.parse_type()?);
        }

        Ok(SignatureProperty {
            has_this: header & SIGNATURE_HEADER::HAS_THIS != 0,
            property_type,
            params,
        })
    }

    /// Parse a local variable signature, expecting the `LOCAL_SIG` header byte
    pub fn parse_local_var_signature(&mut self) -> Result<SignatureLocalVariables> {
        let header = self.parser.read_le::<u8>()?;
        if header != SIGNATURE_HEADER::LOCAL_SIG {
            return Err(malformed_error!(
                "Invalid local variable signature header - 0x{:02x}",
                header
            ));
        }

        let count = self.parser.read_compressed_uint()?;
        let mut locals = Vec::with_capacity(count as usize);
        for _ in 0..count {
            locals.push(self.parse_type()?);
        }

        Ok(SignatureLocalVariables { locals })
    }

    /// Parse a method specification signature, expecting the `GENERIC_INST` header byte
    pub fn parse_method_spec_signature(&mut self) -> Result<SignatureMethodSpec> {
        let header = self.parser.read_le::<u8>()?;
        if header != SIGNATURE_HEADER::GENERIC_INST {
            return Err(malformed_error!(
                "Invalid method spec signature header - 0x{:02x}",
                header
            ));
        }

        let count = self.parser.read_compressed_uint()?;
        let mut type_args = Vec::with_capacity(count as usize);
        for _ in 0..count {
            type_args.push(self.parse_type()?);
        }

        Ok(SignatureMethodSpec { type_args })
    }

    /// Parse a type specification signature (a bare type expression)
    pub fn parse_type_spec_signature(&mut self) -> Result<TypeSignature> {
        self.parse_type()
    }
}
