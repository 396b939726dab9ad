//! Type definitions and their members.
//!
//! [`CilType`] is the definition-side representation of a metadata type: visibility
//! and layout flags, the base type, declared fields/methods/properties/events, nested
//! types, implemented interfaces and generic parameters. Definitions are owned by
//! exactly one module (transitively one assembly); back-pointers are weak so the
//! assembly graph stays acyclic for the allocator even when references cycle.

use std::sync::{Arc, OnceLock, Weak};

use bitflags::bitflags;

use crate::{
    metadata::{
        model::{CilModule, ModuleRc, TypeDefOrRef},
        signatures::{SignatureField, SignatureMethod, SignatureProperty, TypeSignature},
        token::Token,
    },
    Result,
};

/// Reference to a `CilType`
pub type CilTypeRc = Arc<CilType>;
/// Reference to a `CilField`
pub type FieldRc = Arc<CilField>;
/// Reference to a `CilMethod`
pub type MethodRc = Arc<CilMethod>;
/// Reference to a `CilProperty`
pub type PropertyRc = Arc<CilProperty>;
/// Reference to a `CilEvent`
pub type EventRc = Arc<CilEvent>;
/// Reference to a `GenericParam`
pub type GenericParamRc = Arc<GenericParam>;

bitflags! {
    /// Type attribute flag word, ECMA-335 §II.23.1.15 (subset the core inspects).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TypeAttributes: u32 {
        /// Type is visible outside its assembly
        const PUBLIC = 0x0000_0001;
        /// Nested type with public visibility
        const NESTED_PUBLIC = 0x0000_0002;
        /// Fields are laid out sequentially
        const SEQUENTIAL_LAYOUT = 0x0000_0008;
        /// Field layout is supplied explicitly
        const EXPLICIT_LAYOUT = 0x0000_0010;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Type cannot be instantiated
        const ABSTRACT = 0x0000_0080;
        /// Type cannot be extended
        const SEALED = 0x0000_0100;
        /// Name is special, e.g. `<Module>`
        const SPECIAL_NAME = 0x0000_0400;
        /// Type is imported from COM
        const IMPORT = 0x0000_1000;
        /// Type is serializable
        const SERIALIZABLE = 0x0000_2000;
        /// Static initialization runs lazily
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

bitflags! {
    /// Field attribute flag word, ECMA-335 §II.23.1.5 (subset the core inspects).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FieldAttributes: u16 {
        /// Field is per-type rather than per-instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written after init
        const INIT_ONLY = 0x0020;
        /// Field value is a compile-time constant
        const LITERAL = 0x0040;
        /// Name is special
        const SPECIAL_NAME = 0x0200;
    }
}

bitflags! {
    /// Method attribute flag word, ECMA-335 §II.23.1.10 (subset the core inspects).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MethodAttributes: u16 {
        /// Method is per-type rather than per-instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name and signature
        const HIDE_BY_SIG = 0x0080;
        /// Method has no body in this type
        const ABSTRACT = 0x0400;
        /// Name is special, e.g. `.ctor`
        const SPECIAL_NAME = 0x0800;
    }
}

bitflags! {
    /// Generic parameter attribute flag word, ECMA-335 §II.23.1.7.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GenericParamAttributes: u16 {
        /// Parameter is covariant (`out`)
        const COVARIANT = 0x0001;
        /// Parameter is contravariant (`in`)
        const CONTRAVARIANT = 0x0002;
        /// Argument must be a reference type
        const REFERENCE_TYPE_CONSTRAINT = 0x0004;
        /// Argument must be a non-nullable value type
        const NOT_NULLABLE_VALUE_TYPE_CONSTRAINT = 0x0008;
        /// Argument must have a default constructor
        const DEFAULT_CONSTRUCTOR_CONSTRAINT = 0x0010;
    }
}

/// Variance of a generic parameter, as read from its attribute word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    /// Argument positions must match exactly
    NonVariant,
    /// Compatible arguments may widen (`out`)
    Covariant,
    /// Compatible arguments may narrow (`in`)
    Contravariant,
}

/// A generic parameter declared by a type or method.
#[derive(Debug)]
pub struct GenericParam {
    /// Zero-based ordinal within the declaring entity's parameter list
    pub index: u32,
    /// Parameter name, e.g. `T`
    pub name: String,
    /// Attribute word carrying variance and constraint bits
    pub flags: GenericParamAttributes,
}

impl GenericParam {
    /// Create a non-variant, unconstrained parameter
    #[must_use]
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        GenericParam {
            index,
            name: name.into(),
            flags: GenericParamAttributes::empty(),
        }
    }

    /// Create a parameter with explicit attribute bits
    #[must_use]
    pub fn with_flags(index: u32, name: impl Into<String>, flags: GenericParamAttributes) -> Self {
        GenericParam {
            index,
            name: name.into(),
            flags,
        }
    }

    /// The variance encoded in the attribute word; unknown bit patterns are
    /// treated as non-variant.
    #[must_use]
    pub fn variance(&self) -> Variance {
        if self.flags.contains(GenericParamAttributes::COVARIANT) {
            Variance::Covariant
        } else if self.flags.contains(GenericParamAttributes::CONTRAVARIANT) {
            Variance::Contravariant
        } else {
            Variance::NonVariant
        }
    }
}

/// A field declared by a type.
#[derive(Debug)]
pub struct CilField {
    /// Field name
    pub name: String,
    /// Attribute word
    pub flags: FieldAttributes,
    /// The field's blob signature
    pub signature: SignatureField,
}

impl CilField {
    /// Create an instance field
    #[must_use]
    pub fn new(name: impl Into<String>, signature: SignatureField) -> Self {
        CilField {
            name: name.into(),
            flags: FieldAttributes::empty(),
            signature,
        }
    }

    /// Create a field with explicit attribute bits
    #[must_use]
    pub fn with_flags(
        name: impl Into<String>,
        flags: FieldAttributes,
        signature: SignatureField,
    ) -> Self {
        CilField {
            name: name.into(),
            flags,
            signature,
        }
    }

    /// Returns true for static fields
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldAttributes::STATIC)
    }
}

/// A method declared by a type.
#[derive(Debug)]
pub struct CilMethod {
    /// Method name
    pub name: String,
    /// Attribute word
    pub flags: MethodAttributes,
    /// The method's blob signature
    pub signature: SignatureMethod,
    /// Declaring type, set when the method is added to one
    declaring_type: OnceLock<Weak<CilType>>,
    /// Generic parameters declared by this method
    generic_params: boxcar::Vec<GenericParamRc>,
}

impl CilMethod {
    /// Create a method from a name and signature
    #[must_use]
    pub fn new(name: impl Into<String>, signature: SignatureMethod) -> Self {
        CilMethod {
            name: name.into(),
            flags: MethodAttributes::empty(),
            signature,
            declaring_type: OnceLock::new(),
            generic_params: boxcar::Vec::new(),
        }
    }

    /// Create a method with explicit attribute bits
    #[must_use]
    pub fn with_flags(
        name: impl Into<String>,
        flags: MethodAttributes,
        signature: SignatureMethod,
    ) -> Self {
        CilMethod {
            name: name.into(),
            flags,
            signature,
            declaring_type: OnceLock::new(),
            generic_params: boxcar::Vec::new(),
        }
    }

    /// The type this method was added to, if any
    #[must_use]
    pub fn declaring_type(&self) -> Option<CilTypeRc> {
        self.declaring_type.get().and_then(Weak::upgrade)
    }

    pub(crate) fn set_declaring_type(&self, declaring: Weak<CilType>) {
        let _ = self.declaring_type.set(declaring);
    }

    /// Declare a generic parameter on this method
    pub fn add_generic_param(&self, param: GenericParam) {
        self.generic_params.push(Arc::new(param));
    }

    /// Generic parameters declared by this method, in addition order
    pub fn generic_params(&self) -> impl Iterator<Item = &GenericParamRc> {
        self.generic_params.iter().map(|(_, param)| param)
    }
}

/// A property declared by a type.
#[derive(Debug)]
pub struct CilProperty {
    /// Property name
    pub name: String,
    /// The property's blob signature
    pub signature: SignatureProperty,
}

impl CilProperty {
    /// Create a property from a name and signature
    #[must_use]
    pub fn new(name: impl Into<String>, signature: SignatureProperty) -> Self {
        CilProperty {
            name: name.into(),
            signature,
        }
    }
}

/// An event declared by a type.
#[derive(Debug)]
pub struct CilEvent {
    /// Event name
    pub name: String,
    /// The delegate type of the event
    pub event_type: TypeDefOrRef,
}

impl CilEvent {
    /// Create an event from a name and delegate type
    #[must_use]
    pub fn new(name: impl Into<String>, event_type: TypeDefOrRef) -> Self {
        CilEvent {
            name: name.into(),
            event_type,
        }
    }
}

/// A type definition.
///
/// Names are fixed at construction; lazily discovered relationships (base type,
/// owning module, declaring type) fill in through [`OnceLock`] so first-reader
/// computes and later readers observe a consistent value. Construction returns
/// an [`Arc`] because the definition keeps a weak handle to itself for wiring
/// member and nested-type back-pointers.
#[derive(Debug)]
pub struct CilType {
    /// Metadata token of the definition row
    pub token: Token,
    /// Namespace; `None` for the global namespace
    pub namespace: Option<String>,
    /// Type name
    pub name: String,
    /// Attribute word
    pub flags: TypeAttributes,
    /// Weak handle to this definition's own `Arc`
    self_weak: Weak<CilType>,
    /// Base type (`extends`), absent for `System.Object` and interfaces
    base: OnceLock<TypeDefOrRef>,
    /// Owning module
    module: OnceLock<Weak<CilModule>>,
    /// Declaring type for nested types
    declaring_type: OnceLock<Weak<CilType>>,
    /// Declared fields
    fields: boxcar::Vec<FieldRc>,
    /// Declared methods
    methods: boxcar::Vec<MethodRc>,
    /// Declared properties
    properties: boxcar::Vec<PropertyRc>,
    /// Declared events
    events: boxcar::Vec<EventRc>,
    /// Directly implemented interfaces
    interfaces: boxcar::Vec<TypeDefOrRef>,
    /// Nested type definitions
    nested_types: boxcar::Vec<CilTypeRc>,
    /// Declared generic parameters
    generic_params: boxcar::Vec<GenericParamRc>,
}

impl CilType {
    /// Create a type definition
    ///
    /// ## Arguments
    /// * `token`     - The definition row token
    /// * `namespace` - Namespace, `None` for the global namespace
    /// * `name`      - Type name
    /// * `flags`     - Attribute word
    #[must_use]
    pub fn new(
        token: Token,
        namespace: Option<String>,
        name: impl Into<String>,
        flags: TypeAttributes,
    ) -> CilTypeRc {
        let name = name.into();
        Arc::new_cyclic(|self_weak| CilType {
            token,
            namespace,
            name,
            flags,
            self_weak: self_weak.clone(),
            base: OnceLock::new(),
            module: OnceLock::new(),
            declaring_type: OnceLock::new(),
            fields: boxcar::Vec::new(),
            methods: boxcar::Vec::new(),
            properties: boxcar::Vec::new(),
            events: boxcar::Vec::new(),
            interfaces: boxcar::Vec::new(),
            nested_types: boxcar::Vec::new(),
            generic_params: boxcar::Vec::new(),
        })
    }

    /// Returns true when the namespace and name match byte-exactly.
    ///
    /// `None` and the empty namespace are distinct on purpose; metadata rows
    /// store them differently and resolution must not conflate them.
    #[must_use]
    pub fn is_type_of(&self, namespace: Option<&str>, name: &str) -> bool {
        self.namespace.as_deref() == namespace && self.name == name
    }

    /// The full display name: `Namespace.Name`, or `Declaring+Nested` for nested types
    #[must_use]
    pub fn full_name(&self) -> String {
        if let Some(declaring) = self.declaring_type() {
            return format!("{}+{}", declaring.full_name(), self.name);
        }

        match &self.namespace {
            Some(namespace) if !namespace.is_empty() => format!("{}.{}", namespace, self.name),
            _ => self.name.clone(),
        }
    }

    /// The base type, if one was declared
    #[must_use]
    pub fn base_type(&self) -> Option<&TypeDefOrRef> {
        self.base.get()
    }

    /// Declare the base type; the first write wins
    ///
    /// # Errors
    /// Returns an error when a base type is already set
    pub fn set_base_type(&self, base: TypeDefOrRef) -> Result<()> {
        self.base
            .set(base)
            .map_err(|_| crate::error::malformed_error!("Base type already set - {}", self.name))
    }

    /// The module owning this definition
    #[must_use]
    pub fn module(&self) -> Option<ModuleRc> {
        if let Some(weak) = self.module.get() {
            return weak.upgrade();
        }
        self.declaring_type().and_then(|declaring| declaring.module())
    }

    pub(crate) fn set_module(&self, module: Weak<CilModule>) {
        let _ = self.module.set(module);
    }

    /// The declaring type for nested definitions
    #[must_use]
    pub fn declaring_type(&self) -> Option<CilTypeRc> {
        self.declaring_type.get().and_then(Weak::upgrade)
    }

    /// Returns true when the `INTERFACE` semantic bit is set
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeAttributes::INTERFACE)
    }

    /// Returns true when the base type is `System.Enum`
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.base_type()
            .is_some_and(|base| base.is_type_of(Some("System"), "Enum"))
    }

    /// Returns true for value types (base `System.ValueType` or `System.Enum`)
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.base_type().is_some_and(|base| {
            base.is_type_of(Some("System"), "ValueType") || base.is_type_of(Some("System"), "Enum")
        })
    }

    /// For enum definitions, the underlying integral type taken from the first
    /// instance field
    #[must_use]
    pub fn enum_underlying_type(&self) -> Option<TypeSignature> {
        if !self.is_enum() {
            return None;
        }

        self.fields()
            .find(|field| !field.is_static())
            .map(|field| field.signature.field_type.clone())
    }

    /// Declare a field
    pub fn add_field(&self, field: CilField) -> FieldRc {
        let field = Arc::new(field);
        self.fields.push(field.clone());
        field
    }

    /// Declare a method, wiring its declaring-type back-pointer
    pub fn add_method(&self, method: CilMethod) -> MethodRc {
        let method = Arc::new(method);
        method.set_declaring_type(self.self_weak.clone());
        self.methods.push(method.clone());
        method
    }

    /// Declare a property
    pub fn add_property(&self, property: CilProperty) -> PropertyRc {
        let property = Arc::new(property);
        self.properties.push(property.clone());
        property
    }

    /// Declare an event
    pub fn add_event(&self, event: CilEvent) -> EventRc {
        let event = Arc::new(event);
        self.events.push(event.clone());
        event
    }

    /// Declare a directly implemented interface
    pub fn add_interface(&self, interface: TypeDefOrRef) {
        self.interfaces.push(interface);
    }

    /// Declare a nested type, wiring its declaring-type back-pointer
    pub fn add_nested_type(&self, nested: &CilTypeRc) {
        let _ = nested.declaring_type.set(self.self_weak.clone());
        self.nested_types.push(nested.clone());
    }

    /// Declare a generic parameter
    pub fn add_generic_param(&self, param: GenericParam) -> GenericParamRc {
        let param = Arc::new(param);
        self.generic_params.push(param.clone());
        param
    }

    /// Declared fields in addition order
    pub fn fields(&self) -> impl Iterator<Item = &FieldRc> {
        self.fields.iter().map(|(_, field)| field)
    }

    /// Declared methods in addition order
    pub fn methods(&self) -> impl Iterator<Item = &MethodRc> {
        self.methods.iter().map(|(_, method)| method)
    }

    /// Declared properties in addition order
    pub fn properties(&self) -> impl Iterator<Item = &PropertyRc> {
        self.properties.iter().map(|(_, property)| property)
    }

    /// Declared events in addition order
    pub fn events(&self) -> impl Iterator<Item = &EventRc> {
        self.events.iter().map(|(_, event)| event)
    }

    /// Directly implemented interfaces in addition order
    pub fn interfaces(&self) -> impl Iterator<Item = &TypeDefOrRef> {
        self.interfaces.iter().map(|(_, interface)| interface)
    }

    /// Nested types in addition order
    pub fn nested_types(&self) -> impl Iterator<Item = &CilTypeRc> {
        self.nested_types.iter().map(|(_, nested)| nested)
    }

    /// Find a nested type by name
    #[must_use]
    pub fn find_nested_type(&self, name: &str) -> Option<CilTypeRc> {
        self.nested_types()
            .find(|nested| nested.name == name)
            .cloned()
    }

    /// Declared generic parameters in addition order
    pub fn generic_params(&self) -> impl Iterator<Item = &GenericParamRc> {
        self.generic_params.iter().map(|(_, param)| param)
    }

    /// The generic parameter with the given ordinal
    #[must_use]
    pub fn generic_param(&self, index: u32) -> Option<GenericParamRc> {
        self.generic_params()
            .find(|param| param.index == index)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::TableId;

    fn plain_type(namespace: Option<&str>, name: &str) -> CilTypeRc {
        CilType::new(
            Token::from_parts(TableId::TYPE_DEF, 1),
            namespace.map(String::from),
            name,
            TypeAttributes::PUBLIC,
        )
    }

    #[test]
    fn test_is_type_of_is_byte_exact() {
        let ty = plain_type(Some("System"), "Object");
        assert!(ty.is_type_of(Some("System"), "Object"));
        assert!(!ty.is_type_of(Some("system"), "Object"));
        assert!(!ty.is_type_of(None, "Object"));
    }

    #[test]
    fn test_full_name_nested() {
        let outer = plain_type(Some("App"), "Outer");
        let inner = plain_type(None, "Inner");
        outer.add_nested_type(&inner);

        assert_eq!(inner.full_name(), "App.Outer+Inner");
        assert_eq!(inner.declaring_type().unwrap().name, "Outer");
        assert_eq!(outer.find_nested_type("Inner").unwrap().name, "Inner");
    }

    #[test]
    fn test_set_base_type_once() {
        let ty = plain_type(Some("App"), "Child");
        let base = TypeDefOrRef::Definition(plain_type(Some("System"), "Object"));
        ty.set_base_type(base.clone()).unwrap();
        assert!(ty.set_base_type(base).is_err());
    }

    #[test]
    fn test_variance_from_flags() {
        let invariant = GenericParam::new(0, "T");
        let covariant = GenericParam::with_flags(0, "T", GenericParamAttributes::COVARIANT);
        let contravariant = GenericParam::with_flags(0, "T", GenericParamAttributes::CONTRAVARIANT);

        assert_eq!(invariant.variance(), Variance::NonVariant);
        assert_eq!(covariant.variance(), Variance::Covariant);
        assert_eq!(contravariant.variance(), Variance::Contravariant);
    }

    #[test]
    fn test_method_declaring_type() {
        let ty = plain_type(Some("App"), "Service");
        let method = ty.add_method(CilMethod::new(
            "Run",
            SignatureMethod::instance_method(TypeSignature::Void, Vec::new()),
        ));
        assert_eq!(method.declaring_type().unwrap().name, "Service");
    }

    #[test]
    fn test_enum_underlying_type() {
        let color = plain_type(Some("App"), "Color");
        let corlib_enum = plain_type(Some("System"), "Enum");
        color
            .set_base_type(TypeDefOrRef::Definition(corlib_enum))
            .unwrap();
        color.add_field(CilField::with_flags(
            "value__",
            FieldAttributes::SPECIAL_NAME,
            SignatureField::new(TypeSignature::I4),
        ));

        assert!(color.is_enum());
        assert!(color.is_value_type());
        assert!(matches!(
            color.enum_underlying_type(),
            Some(TypeSignature::I4)
        ));
    }
}
