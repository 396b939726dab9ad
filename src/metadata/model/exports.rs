//! Exported types: declared forwarders to other assemblies and modules.
//!
//! An `ExportedType` row redirects a `(namespace, name)` pair to another location:
//! an external assembly (type forwarding), a file of the declaring assembly, or a
//! nested exported type. Resolution follows these redirections transparently, with
//! cycle protection over the implementation chain.

use std::{
    fmt,
    sync::{Arc, OnceLock, Weak},
};

use crate::metadata::model::{AssemblyRefRc, CilModule, FileRefRc, ModuleRc};

/// Reference to an `ExportedType`
pub type ExportedTypeRc = Arc<ExportedType>;

/// Where an exported type's definition actually lives.
#[derive(Debug, Clone)]
pub enum ExportedTypeImpl {
    /// The definition lives in another assembly (a type forwarder)
    Assembly(AssemblyRefRc),
    /// The definition lives in another file of the declaring assembly
    File(FileRefRc),
    /// The definition is nested inside another exported type
    Exported(ExportedTypeRc),
}

impl ExportedTypeImpl {
    /// Stable identity of the implementation target, used by the cycle-detection stack
    #[must_use]
    pub(crate) fn key(&self) -> usize {
        match self {
            ExportedTypeImpl::Assembly(assembly_ref) => Arc::as_ptr(assembly_ref) as usize,
            ExportedTypeImpl::File(file_ref) => Arc::as_ptr(file_ref) as usize,
            ExportedTypeImpl::Exported(exported) => Arc::as_ptr(exported) as usize,
        }
    }
}

/// A declared forwarder from the declaring assembly to another location.
#[derive(Debug)]
pub struct ExportedType {
    /// Module declaring the forwarder
    module: OnceLock<Weak<CilModule>>,
    /// Namespace; `None` for the global namespace
    pub namespace: Option<String>,
    /// Type name
    pub name: String,
    /// Where the definition lives
    pub implementation: ExportedTypeImpl,
}

impl ExportedType {
    /// Create an exported type
    #[must_use]
    pub fn new(
        namespace: Option<String>,
        name: impl Into<String>,
        implementation: ExportedTypeImpl,
    ) -> Self {
        ExportedType {
            module: OnceLock::new(),
            namespace,
            name: name.into(),
            implementation,
        }
    }

    /// The module declaring this forwarder
    #[must_use]
    pub fn module(&self) -> Option<ModuleRc> {
        self.module.get().and_then(Weak::upgrade)
    }

    pub(crate) fn set_module(&self, module: Weak<CilModule>) {
        let _ = self.module.set(module);
    }

    /// Returns true when the namespace and name match byte-exactly
    #[must_use]
    pub fn is_type_of(&self, namespace: Option<&str>, name: &str) -> bool {
        self.namespace.as_deref() == namespace && self.name == name
    }

    /// The full display name
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(namespace) if !namespace.is_empty() => format!("{}.{}", namespace, self.name),
            _ => self.name.clone(),
        }
    }
}

impl fmt::Display for ExportedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        identity::{AssemblyIdentity, AssemblyVersion},
        model::AssemblyReference,
    };

    #[test]
    fn test_forwarder_shape() {
        let target = Arc::new(AssemblyReference::new(AssemblyIdentity::new(
            "Actual",
            AssemblyVersion::new(1, 0, 0, 0),
        )));
        let forwarder = ExportedType::new(
            Some("Lib".to_string()),
            "SomeType",
            ExportedTypeImpl::Assembly(target),
        );

        assert!(forwarder.is_type_of(Some("Lib"), "SomeType"));
        assert_eq!(forwarder.full_name(), "Lib.SomeType");
        assert!(forwarder.module().is_none());
    }

    #[test]
    fn test_nested_forwarder_keys() {
        let target = Arc::new(AssemblyReference::new(AssemblyIdentity::new(
            "Actual",
            AssemblyVersion::new(1, 0, 0, 0),
        )));
        let outer = Arc::new(ExportedType::new(
            Some("Lib".to_string()),
            "Outer",
            ExportedTypeImpl::Assembly(target),
        ));
        let nested = ExportedType::new(None, "Inner", ExportedTypeImpl::Exported(outer.clone()));

        assert_eq!(
            nested.implementation.key(),
            ExportedTypeImpl::Exported(outer).key()
        );
    }
}
