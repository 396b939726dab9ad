//! Importing foreign descriptors into a module's own scopes.
//!
//! A reference is only meaningful relative to the module that declares it; using
//! a descriptor from one module inside another requires re-rooting its scope
//! chain. The [`ReferenceImporter`] does that: assembly references are copied by
//! identity, type references walk their scope chain (promoting another module's
//! module-scope to an assembly reference of that module's assembly), signatures
//! recurse, and corlib primitives are rebuilt through the *target* module's
//! corlib factory regardless of which corlib the source referenced.
//!
//! Importer outputs are not cached; every call constructs fresh references,
//! except when the source already lives in the target module, in which case the
//! instance is returned unchanged.

use std::sync::Arc;

use crate::{
    metadata::{
        identity::AssemblyIdentity,
        model::{
            AssemblyReference, AssemblyRefRc, CilTypeRc, MemberSignature, ModuleRc,
            ResolutionScope, TypeDefOrRef, TypeReference, TypeRefRc, TypeSpecification,
        },
        signatures::{
            SignatureArray, SignatureField, SignatureGenericInst, SignatureMethod,
            SignatureModifier, SignatureProperty, TypeSignature,
        },
    },
    Error, Result,
};

/// Imports descriptors into one target module.
pub struct ReferenceImporter {
    module: ModuleRc,
}

impl ReferenceImporter {
    /// Create an importer targeting `module`
    #[must_use]
    pub fn new(module: ModuleRc) -> Self {
        ReferenceImporter { module }
    }

    /// The module imports are rooted in
    #[must_use]
    pub fn target_module(&self) -> &ModuleRc {
        &self.module
    }

    /// Import an assembly identity as an assembly reference
    #[must_use]
    pub fn import_assembly(&self, identity: &AssemblyIdentity) -> AssemblyRefRc {
        Arc::new(AssemblyReference::new(identity.clone()))
    }

    /// Import a resolution scope, re-rooting it in the target module.
    ///
    /// Another module's own module-scope promotes to an assembly reference of
    /// that module's assembly.
    ///
    /// # Errors
    /// Returns [`Error::ImportInvalid`] when the source scope is detached from
    /// any assembly.
    pub fn import_scope(&self, scope: &ResolutionScope) -> Result<ResolutionScope> {
        match scope {
            ResolutionScope::Assembly(assembly_ref) => Ok(ResolutionScope::Assembly(
                self.import_assembly(&assembly_ref.identity),
            )),
            ResolutionScope::CurrentModule(weak) => {
                let Some(source_module) = weak.upgrade() else {
                    return Err(Error::ImportInvalid(
                        "module scope target is gone".to_string(),
                    ));
                };

                if Arc::ptr_eq(&source_module, &self.module) {
                    return Ok(self.module.scope());
                }

                match source_module.assembly() {
                    Some(assembly) => Ok(ResolutionScope::Assembly(
                        self.import_assembly(&assembly.identity),
                    )),
                    None => Err(Error::ImportInvalid(format!(
                        "module {} belongs to no assembly",
                        source_module.name
                    ))),
                }
            }
            ResolutionScope::Module(module_ref) => {
                Ok(ResolutionScope::Module(module_ref.clone()))
            }
            ResolutionScope::Type(parent) => {
                Ok(ResolutionScope::Type(self.import_type_reference(parent)?))
            }
        }
    }

    /// Import a type reference.
    ///
    /// References already rooted in the target module are returned unchanged
    /// (same instance); corlib primitive references are rebuilt through the
    /// target's corlib factory.
    ///
    /// # Errors
    /// Returns [`Error::ImportInvalid`] for detached scopes.
    pub fn import_type_reference(&self, reference: &TypeRefRc) -> Result<TypeRefRc> {
        if let Some(module) = reference.module() {
            if Arc::ptr_eq(&module, &self.module) {
                return Ok(reference.clone());
            }
        }

        // Corlib primitives retarget at the importing module's own corlib
        if let Some(name) = corlib_primitive_name(reference) {
            return Ok(self.module.corlib_type("System", name));
        }

        let scope = match &reference.scope {
            Some(scope) => Some(self.import_scope(scope)?),
            None => None,
        };

        Ok(Arc::new(TypeReference::new(
            Some(&self.module),
            scope,
            reference.namespace.clone(),
            reference.name.clone(),
        )))
    }

    /// Import a type definition as a reference rooted in the target module.
    ///
    /// Definitions declared by the target module itself are returned as-is.
    ///
    /// # Errors
    /// Returns [`Error::ImportInvalid`] when the definition is detached.
    pub fn import_type_definition(&self, definition: &CilTypeRc) -> Result<TypeDefOrRef> {
        if let Some(module) = definition.module() {
            if Arc::ptr_eq(&module, &self.module) {
                return Ok(TypeDefOrRef::Definition(definition.clone()));
            }
        }

        let Some(assembly) = definition.module().and_then(|module| module.assembly()) else {
            return Err(Error::ImportInvalid(format!(
                "definition {} belongs to no assembly",
                definition.full_name()
            )));
        };

        // Outermost type scopes to the assembly; nested types scope to their
        // imported declaring reference
        let mut chain = Vec::new();
        let mut current = definition.clone();
        loop {
            chain.push(current.clone());
            match current.declaring_type() {
                Some(declaring) => current = declaring,
                None => break,
            }
        }

        let mut scope = ResolutionScope::Assembly(self.import_assembly(&assembly.identity));
        let mut imported: Option<TypeRefRc> = None;
        while let Some(definition) = chain.pop() {
            let reference = Arc::new(TypeReference::new(
                Some(&self.module),
                Some(scope),
                definition.namespace.clone(),
                definition.name.clone(),
            ));
            scope = ResolutionScope::Type(reference.clone());
            imported = Some(reference);
        }

        // The chain is never empty, so an imported reference always exists
        imported.map(TypeDefOrRef::Reference).ok_or_else(|| {
            Error::ImportInvalid(format!("definition {} has no name chain", definition.full_name()))
        })
    }

    /// Import any type entity.
    ///
    /// # Errors
    /// Returns [`Error::ImportInvalid`] for invalid placeholders, which are
    /// non-importable by design.
    pub fn import_type(&self, entity: &TypeDefOrRef) -> Result<TypeDefOrRef> {
        match entity {
            TypeDefOrRef::Definition(definition) => self.import_type_definition(definition),
            TypeDefOrRef::Reference(reference) => Ok(TypeDefOrRef::Reference(
                self.import_type_reference(reference)?,
            )),
            TypeDefOrRef::Specification(specification) => {
                Ok(TypeDefOrRef::Specification(Arc::new(TypeSpecification::new(
                    self.import_type_signature(specification.signature())?,
                ))))
            }
            TypeDefOrRef::Invalid(placeholder) => Err(Error::ImportInvalid(placeholder.name())),
        }
    }

    /// Import a type signature recursively.
    ///
    /// # Errors
    /// Returns [`Error::ImportInvalid`] when the tree contains an invalid
    /// placeholder.
    pub fn import_type_signature(&self, signature: &TypeSignature) -> Result<TypeSignature> {
        match signature {
            TypeSignature::Class(entity) => Ok(TypeSignature::Class(self.import_type(entity)?)),
            TypeSignature::ValueType(entity) => {
                Ok(TypeSignature::ValueType(self.import_type(entity)?))
            }
            TypeSignature::Pointer(inner) => Ok(TypeSignature::Pointer(Box::new(
                self.import_type_signature(inner)?,
            ))),
            TypeSignature::ByRef(inner) => Ok(TypeSignature::ByRef(Box::new(
                self.import_type_signature(inner)?,
            ))),
            TypeSignature::Pinned(inner) => Ok(TypeSignature::Pinned(Box::new(
                self.import_type_signature(inner)?,
            ))),
            TypeSignature::Boxed(inner) => Ok(TypeSignature::Boxed(Box::new(
                self.import_type_signature(inner)?,
            ))),
            TypeSignature::SzArray(element) => Ok(TypeSignature::SzArray(Box::new(
                self.import_type_signature(element)?,
            ))),
            TypeSignature::Array(array) => Ok(TypeSignature::Array(SignatureArray {
                element: Box::new(self.import_type_signature(&array.element)?),
                rank: array.rank,
                dimensions: array.dimensions.clone(),
            })),
            TypeSignature::FnPtr(method) => Ok(TypeSignature::FnPtr(Box::new(
                self.import_method_signature(method)?,
            ))),
            TypeSignature::Modifier(modifier) => Ok(TypeSignature::Modifier(SignatureModifier {
                required: modifier.required,
                modifier_type: self.import_type(&modifier.modifier_type)?,
                inner: Box::new(self.import_type_signature(&modifier.inner)?),
            })),
            TypeSignature::GenericInst(instance) => {
                let mut type_args = Vec::with_capacity(instance.type_args.len());
                for arg in &instance.type_args {
                    type_args.push(self.import_type_signature(arg)?);
                }
                Ok(TypeSignature::GenericInst(SignatureGenericInst {
                    is_value_type: instance.is_value_type,
                    generic_type: self.import_type(&instance.generic_type)?,
                    type_args,
                }))
            }
            TypeSignature::Invalid(placeholder) => Err(Error::ImportInvalid(placeholder.name())),
            leaf => Ok(leaf.clone()),
        }
    }

    /// Import a method signature by recursion over its types.
    ///
    /// # Errors
    /// Propagates type-import failures.
    pub fn import_method_signature(&self, signature: &SignatureMethod) -> Result<SignatureMethod> {
        let mut params = Vec::with_capacity(signature.params.len());
        for param in &signature.params {
            params.push(self.import_type_signature(param)?);
        }

        Ok(SignatureMethod {
            has_this: signature.has_this,
            explicit_this: signature.explicit_this,
            calling_convention: signature.calling_convention,
            generic_param_count: signature.generic_param_count,
            return_type: Box::new(self.import_type_signature(&signature.return_type)?),
            params,
            sentinel_index: signature.sentinel_index,
        })
    }

    /// Import a field signature.
    ///
    /// # Errors
    /// Propagates type-import failures.
    pub fn import_field_signature(&self, signature: &SignatureField) -> Result<SignatureField> {
        Ok(SignatureField {
            field_type: self.import_type_signature(&signature.field_type)?,
        })
    }

    /// Import a property signature.
    ///
    /// # Errors
    /// Propagates type-import failures.
    pub fn import_property_signature(
        &self,
        signature: &SignatureProperty,
    ) -> Result<SignatureProperty> {
        let mut params = Vec::with_capacity(signature.params.len());
        for param in &signature.params {
            params.push(self.import_type_signature(param)?);
        }

        Ok(SignatureProperty {
            has_this: signature.has_this,
            property_type: self.import_type_signature(&signature.property_type)?,
            params,
        })
    }

    /// Import a member signature, preserving its field/method kind.
    ///
    /// # Errors
    /// Propagates type-import failures.
    pub fn import_member_signature(&self, signature: &MemberSignature) -> Result<MemberSignature> {
        match signature {
            MemberSignature::Field(field) => {
                Ok(MemberSignature::Field(self.import_field_signature(field)?))
            }
            MemberSignature::Method(method) => {
                Ok(MemberSignature::Method(self.import_method_signature(method)?))
            }
        }
    }
}

/// The `System` type name of a corlib primitive reference, when the reference
/// denotes one and is scoped to a known corlib.
fn corlib_primitive_name(reference: &TypeRefRc) -> Option<&'static str> {
    use crate::metadata::runtime::TargetRuntime;

    let Some(ResolutionScope::Assembly(assembly_ref)) = &reference.scope else {
        return None;
    };
    if !TargetRuntime::is_known_corlib(&assembly_ref.identity.name) {
        return None;
    }
    if reference.namespace.as_deref() != Some("System") {
        return None;
    }

    const PRIMITIVES: &[&str] = &[
        "Void",
        "Boolean",
        "Char",
        "SByte",
        "Byte",
        "Int16",
        "UInt16",
        "Int32",
        "UInt32",
        "Int64",
        "UInt64",
        "Single",
        "Double",
        "String",
        "Object",
        "IntPtr",
        "UIntPtr",
        "TypedReference",
    ];

    PRIMITIVES
        .iter()
        .find(|name| **name == reference.name)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        identity::{AssemblyVersion, StrongName},
        model::{CilAssembly, CilType, TypeAttributes},
        token::{TableId, Token},
    };

    fn assembly_with_module(name: &str, module: &str) -> ModuleRc {
        let assembly = CilAssembly::with_manifest_module(
            AssemblyIdentity::new(name, AssemblyVersion::new(1, 0, 0, 0)),
            module,
        );
        let module = assembly.manifest_module().unwrap();
        // Leak the assembly Arc so the module's weak back-pointer stays valid
        // for the lifetime of the test; the helper only returns the module.
        std::mem::forget(assembly);
        module
    }

    fn importer_into(name: &str) -> (ReferenceImporter, ModuleRc) {
        let module = assembly_with_module(name, &format!("{name}.dll"));
        (ReferenceImporter::new(module.clone()), module)
    }

    #[test]
    fn test_same_module_reference_is_unchanged() {
        let (importer, module) = importer_into("Target");
        let reference = Arc::new(TypeReference::new(
            Some(&module),
            Some(module.scope()),
            Some("Target".to_string()),
            "Widget",
        ));

        let imported = importer.import_type_reference(&reference).unwrap();
        assert!(Arc::ptr_eq(&imported, &reference));
    }

    #[test]
    fn test_module_scope_promotes_to_assembly_reference() {
        let (importer, _) = importer_into("Target");
        let source_module = assembly_with_module("Source", "Source.dll");
        let reference = Arc::new(TypeReference::new(
            Some(&source_module),
            Some(source_module.scope()),
            Some("Source".to_string()),
            "Helper",
        ));

        let imported = importer.import_type_reference(&reference).unwrap();
        assert!(!Arc::ptr_eq(&imported, &reference));
        match &imported.scope {
            Some(ResolutionScope::Assembly(assembly_ref)) => {
                assert_eq!(assembly_ref.identity.name, "Source");
            }
            other => panic!("Expected promoted assembly scope, got {:?}", other),
        }
    }

    #[test]
    fn test_corlib_primitive_substitutes_target_factory() {
        let (importer, target) = importer_into("Target");

        // A reference to System.Int32 scoped at an old corlib
        let old_corlib = Arc::new(AssemblyReference::new(
            AssemblyIdentity::new("mscorlib", AssemblyVersion::new(2, 0, 0, 0))
                .with_strong_name(StrongName::from_token_str("b77a5c561934e089").unwrap()),
        ));
        let source_module = assembly_with_module("Source", "Source.dll");
        let reference = Arc::new(TypeReference::new(
            Some(&source_module),
            Some(ResolutionScope::Assembly(old_corlib)),
            Some("System".to_string()),
            "Int32",
        ));

        let imported = importer.import_type_reference(&reference).unwrap();
        assert!(Arc::ptr_eq(&imported, &target.corlib_type("System", "Int32")));
    }

    #[test]
    fn test_import_definition_builds_nested_chain() {
        let (importer, _) = importer_into("Target");
        let source_module = assembly_with_module("Source", "Source.dll");
        let outer = CilType::new(
            Token::from_parts(TableId::TYPE_DEF, 1),
            Some("Source".to_string()),
            "Outer",
            TypeAttributes::PUBLIC,
        );
        let inner = CilType::new(
            Token::from_parts(TableId::TYPE_DEF, 2),
            None,
            "Inner",
            TypeAttributes::NESTED_PUBLIC,
        );
        source_module.add_type(&outer);
        outer.add_nested_type(&inner);

        let imported = importer.import_type_definition(&inner).unwrap();
        match imported {
            TypeDefOrRef::Reference(reference) => {
                assert_eq!(reference.name, "Inner");
                match &reference.scope {
                    Some(ResolutionScope::Type(parent)) => {
                        assert!(parent.is_type_of(Some("Source"), "Outer"));
                        assert!(matches!(
                            parent.scope,
                            Some(ResolutionScope::Assembly(ref assembly_ref))
                                if assembly_ref.identity.name == "Source"
                        ));
                    }
                    other => panic!("Expected nested scope, got {:?}", other),
                }
            }
            other => panic!("Expected reference, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_placeholder_is_not_importable() {
        use crate::metadata::model::{InvalidSignatureReason, InvalidTypeRef};

        let (importer, _) = importer_into("Target");
        let placeholder =
            TypeDefOrRef::Invalid(InvalidTypeRef::get(InvalidSignatureReason::InvalidCodedIndex));
        assert!(matches!(
            importer.import_type(&placeholder),
            Err(Error::ImportInvalid(_))
        ));
    }

    #[test]
    fn test_importer_does_not_cache_foreign_imports() {
        let (importer, _) = importer_into("Target");
        let source_module = assembly_with_module("Source", "Source.dll");
        let reference = Arc::new(TypeReference::new(
            Some(&source_module),
            Some(source_module.scope()),
            Some("Source".to_string()),
            "Helper",
        ));

        let first = importer.import_type_reference(&reference).unwrap();
        let second = importer.import_type_reference(&reference).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
