//! Assembly definitions: versioned, identity-bearing units of managed code.
//!
//! A [`CilAssembly`] groups one or more modules under one [`AssemblyIdentity`].
//! An assembly belongs to at most one runtime context; the back-pointer is set
//! exactly once when the context adopts the assembly, and contexts reject
//! assemblies that already carry one.

use std::sync::{Arc, OnceLock, Weak};

use crate::{
    metadata::{
        context::RuntimeContext,
        identity::AssemblyIdentity,
        model::{MemberRefRc, MethodRc, ModuleRc},
    },
    Error, Result,
};

/// Reference to a `CilAssembly`
pub type AssemblyRc = Arc<CilAssembly>;

/// The constructor of a custom attribute.
#[derive(Debug, Clone)]
pub enum CustomAttributeCtor {
    /// A member reference into another assembly
    MemberRef(MemberRefRc),
    /// A method definition in the current assembly
    MethodDef(MethodRc),
}

/// A custom attribute row owned by the assembly definition.
///
/// The core keeps attribute values as raw blobs; only the prober interprets them
/// (and only for `TargetFrameworkAttribute`).
#[derive(Debug, Clone)]
pub struct CustomAttribute {
    /// The attribute constructor
    pub constructor: CustomAttributeCtor,
    /// The raw value blob including the 2-byte prologue
    pub blob: Vec<u8>,
}

impl CustomAttribute {
    /// Create a custom attribute from its constructor and raw value blob
    #[must_use]
    pub fn new(constructor: CustomAttributeCtor, blob: Vec<u8>) -> Self {
        CustomAttribute { constructor, blob }
    }
}

/// An assembly definition.
#[derive(Debug)]
pub struct CilAssembly {
    /// The assembly's identity
    pub identity: AssemblyIdentity,
    /// Weak handle to this assembly's own `Arc`
    self_weak: Weak<CilAssembly>,
    /// Modules of this assembly; the first is the manifest module
    modules: boxcar::Vec<ModuleRc>,
    /// The runtime context this assembly was added to
    context: OnceLock<Weak<RuntimeContext>>,
    /// Custom attributes owned by the assembly definition row
    custom_attributes: boxcar::Vec<CustomAttribute>,
}

impl CilAssembly {
    /// Create an assembly definition
    #[must_use]
    pub fn new(identity: AssemblyIdentity) -> AssemblyRc {
        Arc::new_cyclic(|self_weak| CilAssembly {
            identity,
            self_weak: self_weak.clone(),
            modules: boxcar::Vec::new(),
            context: OnceLock::new(),
            custom_attributes: boxcar::Vec::new(),
        })
    }

    /// Create an assembly with a single manifest module of the given name
    #[must_use]
    pub fn with_manifest_module(identity: AssemblyIdentity, module_name: &str) -> AssemblyRc {
        let assembly = CilAssembly::new(identity);
        let module = crate::metadata::model::CilModule::new(module_name);
        assembly.add_module(&module);
        assembly
    }

    /// Add a module, wiring its assembly back-pointer
    pub fn add_module(&self, module: &ModuleRc) {
        module.set_assembly(self.self_weak.clone());
        self.modules.push(module.clone());
    }

    /// The manifest module (the first module added)
    #[must_use]
    pub fn manifest_module(&self) -> Option<ModuleRc> {
        self.modules.get(0).cloned()
    }

    /// Modules in addition order
    pub fn modules(&self) -> impl Iterator<Item = &ModuleRc> {
        self.modules.iter().map(|(_, module)| module)
    }

    /// Find a module by file name
    #[must_use]
    pub fn find_module(&self, name: &str) -> Option<ModuleRc> {
        self.modules().find(|module| module.name == name).cloned()
    }

    /// The runtime context this assembly belongs to, if any
    #[must_use]
    pub fn context(&self) -> Option<Arc<RuntimeContext>> {
        self.context.get().and_then(Weak::upgrade)
    }

    /// Returns true when the assembly was adopted by a context
    #[must_use]
    pub fn has_context(&self) -> bool {
        self.context.get().is_some()
    }

    /// Attach the assembly to a runtime context; a definition enters a context
    /// exactly once.
    ///
    /// # Errors
    /// Returns [`Error::AssemblyHasContext`] when a context is already attached.
    pub(crate) fn set_context(&self, context: Weak<RuntimeContext>) -> Result<()> {
        self.context
            .set(context)
            .map_err(|_| Error::AssemblyHasContext(self.identity.name.clone()))
    }

    /// Attach a custom attribute to the assembly definition row
    pub fn add_custom_attribute(&self, attribute: CustomAttribute) {
        self.custom_attributes.push(attribute);
    }

    /// Custom attributes in addition order
    pub fn custom_attributes(&self) -> impl Iterator<Item = &CustomAttribute> {
        self.custom_attributes.iter().map(|(_, attribute)| attribute)
    }
}
