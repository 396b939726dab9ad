//! Module definitions: single metadata containers with their own tables.
//!
//! A [`CilModule`] owns its top-level types, exported types and the reference
//! tables (assembly refs, module refs, file entries). It also hosts the corlib
//! type factory: memoized references to the module's core-library types, used by
//! the importer to retarget primitives at the module's own corlib regardless of
//! where a signature came from.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, OnceLock, Weak},
};

use dashmap::DashMap;

use crate::metadata::{
    model::{
        AssemblyRc, AssemblyReference, AssemblyRefRc, CilAssembly, CilTypeRc, ExportedTypeRc,
        FileRefRc, ModuleRefRc, ResolutionScope, TypeReference, TypeRefRc,
    },
    runtime::TargetRuntime,
};

/// Reference to a `CilModule`
pub type ModuleRc = Arc<CilModule>;

/// A single metadata container.
///
/// Construction returns an [`Arc`] because the module keeps a weak handle to
/// itself for wiring type back-pointers and module-rooted scopes.
#[derive(Debug)]
pub struct CilModule {
    /// Module file name, e.g. `App.exe` or `Helpers.netmodule`
    pub name: String,
    /// Weak handle to this module's own `Arc`
    self_weak: Weak<CilModule>,
    /// Path the module was read from, when it came from disk
    file_path: OnceLock<PathBuf>,
    /// Owning assembly
    assembly: OnceLock<Weak<CilAssembly>>,
    /// Top-level type definitions
    types: boxcar::Vec<CilTypeRc>,
    /// Declared forwarders
    exported_types: boxcar::Vec<ExportedTypeRc>,
    /// Referenced assemblies
    assembly_refs: boxcar::Vec<AssemblyRefRc>,
    /// Referenced sibling modules
    module_refs: boxcar::Vec<ModuleRefRc>,
    /// File entries of the declaring assembly
    file_refs: boxcar::Vec<FileRefRc>,
    /// Memoized corlib assembly reference
    corlib_ref: OnceLock<AssemblyRefRc>,
    /// Memoized corlib type references, keyed by `(namespace, name)`
    corlib_types: DashMap<(String, String), TypeRefRc>,
}

impl CilModule {
    /// Create an empty module
    #[must_use]
    pub fn new(name: impl Into<String>) -> ModuleRc {
        let name = name.into();
        Arc::new_cyclic(|self_weak| CilModule {
            name,
            self_weak: self_weak.clone(),
            file_path: OnceLock::new(),
            assembly: OnceLock::new(),
            types: boxcar::Vec::new(),
            exported_types: boxcar::Vec::new(),
            assembly_refs: boxcar::Vec::new(),
            module_refs: boxcar::Vec::new(),
            file_refs: boxcar::Vec::new(),
            corlib_ref: OnceLock::new(),
            corlib_types: DashMap::new(),
        })
    }

    /// Record the path the module was read from; the first write wins
    pub fn set_file_path(&self, path: impl Into<PathBuf>) {
        let _ = self.file_path.set(path.into());
    }

    /// The path the module was read from, when it came from disk
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.get().map(PathBuf::as_path)
    }

    /// The assembly owning this module
    #[must_use]
    pub fn assembly(&self) -> Option<AssemblyRc> {
        self.assembly.get().and_then(Weak::upgrade)
    }

    pub(crate) fn set_assembly(&self, assembly: Weak<CilAssembly>) {
        let _ = self.assembly.set(assembly);
    }

    /// A resolution scope rooted in this module
    #[must_use]
    pub fn scope(&self) -> ResolutionScope {
        ResolutionScope::CurrentModule(self.self_weak.clone())
    }

    pub(crate) fn self_weak(&self) -> Weak<CilModule> {
        self.self_weak.clone()
    }

    /// Add a top-level type definition, wiring its module back-pointer
    pub fn add_type(&self, definition: &CilTypeRc) {
        definition.set_module(self.self_weak.clone());
        self.types.push(definition.clone());
    }

    /// Add an exported type, wiring its module back-pointer
    pub fn add_exported_type(&self, exported: &ExportedTypeRc) {
        exported.set_module(self.self_weak.clone());
        self.exported_types.push(exported.clone());
    }

    /// Add an assembly reference
    pub fn add_assembly_ref(&self, reference: &AssemblyRefRc) {
        self.assembly_refs.push(reference.clone());
    }

    /// Add a module reference
    pub fn add_module_ref(&self, reference: &ModuleRefRc) {
        self.module_refs.push(reference.clone());
    }

    /// Add a file entry
    pub fn add_file_ref(&self, reference: &FileRefRc) {
        self.file_refs.push(reference.clone());
    }

    /// Top-level types in addition order
    pub fn top_level_types(&self) -> impl Iterator<Item = &CilTypeRc> {
        self.types.iter().map(|(_, definition)| definition)
    }

    /// Exported types in addition order
    pub fn exported_types(&self) -> impl Iterator<Item = &ExportedTypeRc> {
        self.exported_types.iter().map(|(_, exported)| exported)
    }

    /// Assembly references in addition order
    pub fn assembly_refs(&self) -> impl Iterator<Item = &AssemblyRefRc> {
        self.assembly_refs.iter().map(|(_, reference)| reference)
    }

    /// Module references in addition order
    pub fn module_refs(&self) -> impl Iterator<Item = &ModuleRefRc> {
        self.module_refs.iter().map(|(_, reference)| reference)
    }

    /// File entries in addition order
    pub fn file_refs(&self) -> impl Iterator<Item = &FileRefRc> {
        self.file_refs.iter().map(|(_, reference)| reference)
    }

    /// Find a top-level type by byte-exact `(namespace, name)`
    #[must_use]
    pub fn find_type(&self, namespace: Option<&str>, name: &str) -> Option<CilTypeRc> {
        self.top_level_types()
            .find(|definition| definition.is_type_of(namespace, name))
            .cloned()
    }

    /// Find an exported type by byte-exact `(namespace, name)`
    #[must_use]
    pub fn find_exported_type(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<ExportedTypeRc> {
        self.exported_types()
            .find(|exported| exported.is_type_of(namespace, name))
            .cloned()
    }

    /// The module's corlib assembly reference.
    ///
    /// Picks the first assembly reference naming a known corlib; modules without
    /// one (corlib itself, synthetic modules) fall back to the runtime context's
    /// corlib descriptor, or to the net-framework 4.0 corlib when detached.
    #[must_use]
    pub fn corlib_reference(&self) -> AssemblyRefRc {
        self.corlib_ref
            .get_or_init(|| {
                if let Some(reference) = self
                    .assembly_refs()
                    .find(|reference| TargetRuntime::is_known_corlib(&reference.identity.name))
                {
                    return reference.clone();
                }

                let identity = self
                    .assembly()
                    .and_then(|assembly| assembly.context())
                    .map_or_else(
                        || TargetRuntime::fallback().corlib_identity(),
                        |context| context.corlib_identity().clone(),
                    );
                Arc::new(AssemblyReference::new(identity))
            })
            .clone()
    }

    /// A memoized reference to a corlib type, scoped to this module's corlib.
    ///
    /// This is the corlib type factory consulted by the importer: repeated calls
    /// with the same coordinates return the identical instance.
    #[must_use]
    pub fn corlib_type(&self, namespace: &str, name: &str) -> TypeRefRc {
        let key = (namespace.to_string(), name.to_string());
        if let Some(hit) = self.corlib_types.get(&key) {
            return hit.clone();
        }

        let reference = Arc::new(TypeReference::from_weak_module(
            self.self_weak.clone(),
            Some(ResolutionScope::Assembly(self.corlib_reference())),
            Some(namespace.to_string()),
            name,
        ));

        self.corlib_types.entry(key).or_insert(reference).clone()
    }
}
