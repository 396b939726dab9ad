//! Semantic representation of blob-encoded type expressions.
//!
//! [`TypeSignature`] is the tagged tree built by ECMA-335 §II.23.2.12: primitive
//! element types, class/value-type wrappers around resolved [`TypeDefOrRef`]
//! handles, pointers, arrays, function pointers, custom modifiers, generic
//! instantiations and parameters. Method, field, property, local-variable and
//! method-spec signatures compose over the same tree.

use std::fmt;

use crate::metadata::model::{InvalidTypeRef, TypeDefOrRef};

/// Element type constants, ECMA-335 §II.23.1.16.
#[allow(non_camel_case_types)]
pub struct ELEMENT_TYPE;

#[allow(missing_docs)]
impl ELEMENT_TYPE {
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0A;
    pub const U8: u8 = 0x0B;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const PTR: u8 = 0x0F;
    pub const BYREF: u8 = 0x10;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    pub const ARRAY: u8 = 0x14;
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const FNPTR: u8 = 0x1B;
    pub const OBJECT: u8 = 0x1C;
    pub const SZARRAY: u8 = 0x1D;
    pub const MVAR: u8 = 0x1E;
    pub const CMOD_REQD: u8 = 0x1F;
    pub const CMOD_OPT: u8 = 0x20;
    pub const INTERNAL: u8 = 0x21;
    pub const MODIFIER: u8 = 0x40;
    pub const SENTINEL: u8 = 0x41;
    pub const PINNED: u8 = 0x45;
    pub const TYPE: u8 = 0x50;
    pub const BOXED: u8 = 0x51;
    pub const FIELD: u8 = 0x53;
    pub const PROPERTY: u8 = 0x54;
    pub const ENUM: u8 = 0x55;
}

/// Signature header constants, ECMA-335 §II.23.2.
#[allow(non_camel_case_types)]
pub struct SIGNATURE_HEADER;

#[allow(missing_docs)]
impl SIGNATURE_HEADER {
    pub const DEFAULT: u8 = 0x00;
    pub const C: u8 = 0x01;
    pub const STDCALL: u8 = 0x02;
    pub const THISCALL: u8 = 0x03;
    pub const FASTCALL: u8 = 0x04;
    pub const VARARG: u8 = 0x05;
    pub const FIELD: u8 = 0x06;
    pub const LOCAL_SIG: u8 = 0x07;
    pub const PROPERTY: u8 = 0x08;
    pub const GENERIC_INST: u8 = 0x0A;
    pub const GENERIC: u8 = 0x10;
    pub const HAS_THIS: u8 = 0x20;
    pub const EXPLICIT_THIS: u8 = 0x40;
    pub const CALL_CONV_MASK: u8 = 0x0F;
}

/// Calling convention of a method signature, from the header's low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallingConvention {
    /// Managed default
    #[default]
    Default,
    /// Managed vararg
    VarArg,
    /// Unmanaged `cdecl`
    C,
    /// Unmanaged `stdcall`
    StdCall,
    /// Unmanaged `thiscall`
    ThisCall,
    /// Unmanaged `fastcall`
    FastCall,
}

impl CallingConvention {
    /// Decode the low nibble of a signature header
    #[must_use]
    pub fn from_header(header: u8) -> Option<Self> {
        match header & SIGNATURE_HEADER::CALL_CONV_MASK {
            SIGNATURE_HEADER::DEFAULT => Some(CallingConvention::Default),
            SIGNATURE_HEADER::C => Some(CallingConvention::C),
            SIGNATURE_HEADER::STDCALL => Some(CallingConvention::StdCall),
            SIGNATURE_HEADER::THISCALL => Some(CallingConvention::ThisCall),
            SIGNATURE_HEADER::FASTCALL => Some(CallingConvention::FastCall),
            SIGNATURE_HEADER::VARARG => Some(CallingConvention::VarArg),
            _ => None,
        }
    }

    /// Encode into the low nibble of a signature header
    #[must_use]
    pub fn to_header(self) -> u8 {
        match self {
            CallingConvention::Default => SIGNATURE_HEADER::DEFAULT,
            CallingConvention::C => SIGNATURE_HEADER::C,
            CallingConvention::StdCall => SIGNATURE_HEADER::STDCALL,
            CallingConvention::ThisCall => SIGNATURE_HEADER::THISCALL,
            CallingConvention::FastCall => SIGNATURE_HEADER::FASTCALL,
            CallingConvention::VarArg => SIGNATURE_HEADER::VARARG,
        }
    }
}

/// One dimension of a general array: optional size and optional lower bound.
#[derive(Debug, Clone, Default)]
pub struct ArrayDimension {
    /// Declared element count, when present
    pub size: Option<u32>,
    /// Declared lower bound, when present
    pub lower_bound: Option<i32>,
}

/// A general (multi-dimensional) array signature.
#[derive(Debug, Clone)]
pub struct SignatureArray {
    /// The element type
    pub element: Box<TypeSignature>,
    /// Number of dimensions; zero is invalid
    pub rank: u32,
    /// Per-dimension bounds; may cover fewer dimensions than `rank`
    pub dimensions: Vec<ArrayDimension>,
}

/// A custom modifier wrapper: `modreq`/`modopt` around an inner type.
#[derive(Debug, Clone)]
pub struct SignatureModifier {
    /// True for `modreq`, false for `modopt`
    pub required: bool,
    /// The modifier type (`TypeDef` or `TypeRef`)
    pub modifier_type: TypeDefOrRef,
    /// The modified type
    pub inner: Box<TypeSignature>,
}

/// A generic instantiation: an open type applied to type arguments.
#[derive(Debug, Clone)]
pub struct SignatureGenericInst {
    /// True when the open type is a value type
    pub is_value_type: bool,
    /// The open generic type
    pub generic_type: TypeDefOrRef,
    /// The type arguments, one per generic parameter
    pub type_args: Vec<TypeSignature>,
}

/// A reference to a generic parameter by ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericParamSignature {
    /// Zero-based parameter ordinal
    pub index: u32,
    /// True for method parameters (`!!n`), false for type parameters (`!n`)
    pub from_method: bool,
}

/// A parsed type expression.
#[derive(Debug, Clone)]
pub enum TypeSignature {
    /// `void`
    Void,
    /// `bool`
    Boolean,
    /// `char`
    Char,
    /// signed 8-bit integer
    I1,
    /// unsigned 8-bit integer
    U1,
    /// signed 16-bit integer
    I2,
    /// unsigned 16-bit integer
    U2,
    /// signed 32-bit integer
    I4,
    /// unsigned 32-bit integer
    U4,
    /// signed 64-bit integer
    I8,
    /// unsigned 64-bit integer
    U8,
    /// 32-bit floating point
    R4,
    /// 64-bit floating point
    R8,
    /// `System.String`
    String,
    /// `System.Object`
    Object,
    /// native-sized signed integer
    I,
    /// native-sized unsigned integer
    U,
    /// `System.TypedReference`
    TypedByRef,
    /// A reference class type
    Class(TypeDefOrRef),
    /// A value type
    ValueType(TypeDefOrRef),
    /// An unmanaged pointer
    Pointer(Box<TypeSignature>),
    /// A managed reference
    ByRef(Box<TypeSignature>),
    /// A pinned local type
    Pinned(Box<TypeSignature>),
    /// A boxed value, custom-attribute grammar only
    Boxed(Box<TypeSignature>),
    /// A single-dimension zero-based array
    SzArray(Box<TypeSignature>),
    /// A general array with explicit bounds
    Array(SignatureArray),
    /// A function pointer wrapping a method signature
    FnPtr(Box<SignatureMethod>),
    /// A custom-modifier wrapper
    Modifier(SignatureModifier),
    /// A generic instantiation
    GenericInst(SignatureGenericInst),
    /// A generic parameter reference
    GenericParam(GenericParamSignature),
    /// The vararg boundary marker
    Sentinel,
    /// The placeholder substituted for unresolvable blob content
    Invalid(InvalidTypeRef),
}

impl TypeSignature {
    /// The element type byte this variant encodes to.
    ///
    /// Composite variants return their leading byte; [`TypeSignature::Invalid`]
    /// has no encoding and returns [`ELEMENT_TYPE::END`].
    #[must_use]
    pub fn element_type(&self) -> u8 {
        match self {
            TypeSignature::Void => ELEMENT_TYPE::VOID,
            TypeSignature::Boolean => ELEMENT_TYPE::BOOLEAN,
            TypeSignature::Char => ELEMENT_TYPE::CHAR,
            TypeSignature::I1 => ELEMENT_TYPE::I1,
            TypeSignature::U1 => ELEMENT_TYPE::U1,
            TypeSignature::I2 => ELEMENT_TYPE::I2,
            TypeSignature::U2 => ELEMENT_TYPE::U2,
            TypeSignature::I4 => ELEMENT_TYPE::I4,
            TypeSignature::U4 => ELEMENT_TYPE::U4,
            TypeSignature::I8 => ELEMENT_TYPE::I8,
            TypeSignature::U8 => ELEMENT_TYPE::U8,
            TypeSignature::R4 => ELEMENT_TYPE::R4,
            TypeSignature::R8 => ELEMENT_TYPE::R8,
            TypeSignature::String => ELEMENT_TYPE::STRING,
            TypeSignature::Object => ELEMENT_TYPE::OBJECT,
            TypeSignature::I => ELEMENT_TYPE::I,
            TypeSignature::U => ELEMENT_TYPE::U,
            TypeSignature::TypedByRef => ELEMENT_TYPE::TYPEDBYREF,
            TypeSignature::Class(_) => ELEMENT_TYPE::CLASS,
            TypeSignature::ValueType(_) => ELEMENT_TYPE::VALUETYPE,
            TypeSignature::Pointer(_) => ELEMENT_TYPE::PTR,
            TypeSignature::ByRef(_) => ELEMENT_TYPE::BYREF,
            TypeSignature::Pinned(_) => ELEMENT_TYPE::PINNED,
            TypeSignature::Boxed(_) => ELEMENT_TYPE::BOXED,
            TypeSignature::SzArray(_) => ELEMENT_TYPE::SZARRAY,
            TypeSignature::Array(_) => ELEMENT_TYPE::ARRAY,
            TypeSignature::FnPtr(_) => ELEMENT_TYPE::FNPTR,
            TypeSignature::Modifier(modifier) => {
                if modifier.required {
                    ELEMENT_TYPE::CMOD_REQD
                } else {
                    ELEMENT_TYPE::CMOD_OPT
                }
            }
            TypeSignature::GenericInst(_) => ELEMENT_TYPE::GENERICINST,
            TypeSignature::GenericParam(param) => {
                if param.from_method {
                    ELEMENT_TYPE::MVAR
                } else {
                    ELEMENT_TYPE::VAR
                }
            }
            TypeSignature::Sentinel => ELEMENT_TYPE::SENTINEL,
            TypeSignature::Invalid(_) => ELEMENT_TYPE::END,
        }
    }

    /// The corlib type name of a primitive variant, e.g. `Int32` for `I4`
    #[must_use]
    pub fn corlib_name(&self) -> Option<&'static str> {
        match self {
            TypeSignature::Void => Some("Void"),
            TypeSignature::Boolean => Some("Boolean"),
            TypeSignature::Char => Some("Char"),
            TypeSignature::I1 => Some("SByte"),
            TypeSignature::U1 => Some("Byte"),
            TypeSignature::I2 => Some("Int16"),
            TypeSignature::U2 => Some("UInt16"),
            TypeSignature::I4 => Some("Int32"),
            TypeSignature::U4 => Some("UInt32"),
            TypeSignature::I8 => Some("Int64"),
            TypeSignature::U8 => Some("UInt64"),
            TypeSignature::R4 => Some("Single"),
            TypeSignature::R8 => Some("Double"),
            TypeSignature::String => Some("String"),
            TypeSignature::Object => Some("Object"),
            TypeSignature::I => Some("IntPtr"),
            TypeSignature::U => Some("UIntPtr"),
            TypeSignature::TypedByRef => Some("TypedReference"),
            _ => None,
        }
    }

    /// The `TypeDefOrRef` underlying this signature, when one exists.
    ///
    /// Class/value-type wrappers and generic instances carry one; modifiers,
    /// pinned and boxed wrappers delegate inward. Primitives, arrays, pointers
    /// and generic parameters have none.
    #[must_use]
    pub fn underlying_type_def_or_ref(&self) -> Option<&TypeDefOrRef> {
        match self {
            TypeSignature::Class(entity) | TypeSignature::ValueType(entity) => Some(entity),
            TypeSignature::GenericInst(inst) => Some(&inst.generic_type),
            TypeSignature::Modifier(modifier) => modifier.inner.underlying_type_def_or_ref(),
            TypeSignature::Pinned(inner) | TypeSignature::Boxed(inner) => {
                inner.underlying_type_def_or_ref()
            }
            _ => None,
        }
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSignature::Void => f.write_str("System.Void"),
            TypeSignature::TypedByRef => f.write_str("System.TypedReference"),
            TypeSignature::Class(entity) | TypeSignature::ValueType(entity) => {
                f.write_str(&entity.full_name())
            }
            TypeSignature::Pointer(inner) => write!(f, "{}*", inner),
            TypeSignature::ByRef(inner) => write!(f, "{}&", inner),
            TypeSignature::Pinned(inner) => write!(f, "{} pinned", inner),
            TypeSignature::Boxed(inner) => write!(f, "{} boxed", inner),
            TypeSignature::SzArray(element) => write!(f, "{}[]", element),
            TypeSignature::Array(array) => {
                let rank = array.rank.max(1) as usize;
                write!(f, "{}[{}]", array.element, ",".repeat(rank - 1))
            }
            TypeSignature::FnPtr(method) => {
                write!(f, "method {} *(", method.return_type)?;
                for (index, param) in method.params.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                f.write_str(")")
            }
            TypeSignature::Modifier(modifier) => {
                let keyword = if modifier.required { "modreq" } else { "modopt" };
                write!(f, "{} {}({})", modifier.inner, keyword, modifier.modifier_type)
            }
            TypeSignature::GenericInst(inst) => {
                write!(f, "{}<", inst.generic_type)?;
                for (index, arg) in inst.type_args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(">")
            }
            TypeSignature::GenericParam(param) => {
                if param.from_method {
                    write!(f, "!!{}", param.index)
                } else {
                    write!(f, "!{}", param.index)
                }
            }
            TypeSignature::Sentinel => f.write_str("..."),
            TypeSignature::Invalid(invalid) => f.write_str(&invalid.name()),
            primitive => match primitive.corlib_name() {
                Some(name) => write!(f, "System.{}", name),
                None => f.write_str("<unknown>"),
            },
        }
    }
}

/// A method signature, §II.23.2.1-3.
#[derive(Debug, Clone)]
pub struct SignatureMethod {
    /// `instance` flag: a `this` pointer precedes the parameters
    pub has_this: bool,
    /// `explicit` flag: the `this` parameter appears in the parameter list
    pub explicit_this: bool,
    /// Calling convention from the header's low nibble
    pub calling_convention: CallingConvention,
    /// Number of generic parameters; zero for non-generic methods
    pub generic_param_count: u32,
    /// The return type
    pub return_type: Box<TypeSignature>,
    /// Parameter types in order
    pub params: Vec<TypeSignature>,
    /// Index into `params` where the vararg sentinel was found
    pub sentinel_index: Option<usize>,
}

impl SignatureMethod {
    /// A managed instance method signature
    #[must_use]
    pub fn instance_method(return_type: TypeSignature, params: Vec<TypeSignature>) -> Self {
        SignatureMethod {
            has_this: true,
            explicit_this: false,
            calling_convention: CallingConvention::Default,
            generic_param_count: 0,
            return_type: Box::new(return_type),
            params,
            sentinel_index: None,
        }
    }

    /// A managed static method signature
    #[must_use]
    pub fn static_method(return_type: TypeSignature, params: Vec<TypeSignature>) -> Self {
        SignatureMethod {
            has_this: false,
            explicit_this: false,
            calling_convention: CallingConvention::Default,
            generic_param_count: 0,
            return_type: Box::new(return_type),
            params,
            sentinel_index: None,
        }
    }

    /// Returns true for vararg signatures
    #[must_use]
    pub fn is_vararg(&self) -> bool {
        self.calling_convention == CallingConvention::VarArg
    }

    /// Returns true for generic method signatures
    #[must_use]
    pub fn is_generic(&self) -> bool {
        self.generic_param_count > 0
    }
}

/// A field signature, §II.23.2.4.
#[derive(Debug, Clone)]
pub struct SignatureField {
    /// The field's type
    pub field_type: TypeSignature,
}

impl SignatureField {
    /// Wrap a type in a field signature
    #[must_use]
    pub fn new(field_type: TypeSignature) -> Self {
        SignatureField { field_type }
    }
}

/// A property signature, §II.23.2.5.
#[derive(Debug, Clone)]
pub struct SignatureProperty {
    /// Whether the accessors take a `this` pointer
    pub has_this: bool,
    /// The property's type
    pub property_type: TypeSignature,
    /// Indexer parameter types
    pub params: Vec<TypeSignature>,
}

impl SignatureProperty {
    /// An instance property without indexer parameters
    #[must_use]
    pub fn instance(property_type: TypeSignature) -> Self {
        SignatureProperty {
            has_this: true,
            property_type,
            params: Vec::new(),
        }
    }
}

/// A local variable signature, §II.23.2.6.
#[derive(Debug, Clone, Default)]
pub struct SignatureLocalVariables {
    /// Local slot types; pinned and by-ref wrappers appear inline
    pub locals: Vec<TypeSignature>,
}

/// A method specification signature (generic method instantiation), §II.23.2.15.
#[derive(Debug, Clone, Default)]
pub struct SignatureMethodSpec {
    /// The generic argument types
    pub type_args: Vec<TypeSignature>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type_round_trip_markers() {
        assert_eq!(TypeSignature::I4.element_type(), ELEMENT_TYPE::I4);
        assert_eq!(
            TypeSignature::SzArray(Box::new(TypeSignature::I4)).element_type(),
            ELEMENT_TYPE::SZARRAY
        );
        assert_eq!(
            TypeSignature::GenericParam(GenericParamSignature {
                index: 0,
                from_method: true
            })
            .element_type(),
            ELEMENT_TYPE::MVAR
        );
    }

    #[test]
    fn test_calling_convention_header_round_trip() {
        for convention in [
            CallingConvention::Default,
            CallingConvention::VarArg,
            CallingConvention::C,
            CallingConvention::StdCall,
            CallingConvention::ThisCall,
            CallingConvention::FastCall,
        ] {
            assert_eq!(
                CallingConvention::from_header(convention.to_header()),
                Some(convention)
            );
        }
        assert_eq!(CallingConvention::from_header(0x06), None);
    }

    #[test]
    fn test_display_shapes() {
        assert_eq!(TypeSignature::I4.to_string(), "System.Int32");
        assert_eq!(
            TypeSignature::SzArray(Box::new(TypeSignature::String)).to_string(),
            "System.String[]"
        );
        assert_eq!(
            TypeSignature::Array(SignatureArray {
                element: Box::new(TypeSignature::I4),
                rank: 2,
                dimensions: Vec::new(),
            })
            .to_string(),
            "System.Int32[,]"
        );
        assert_eq!(
            TypeSignature::GenericParam(GenericParamSignature {
                index: 1,
                from_method: false
            })
            .to_string(),
            "!1"
        );
    }
}
