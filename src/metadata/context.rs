//! The runtime context: the analysis-time analogue of a process's loader state.
//!
//! A [`RuntimeContext`] bounds resolution: it knows the target runtime and its
//! corlib, owns the assembly resolver, carries a context-bound signature comparer,
//! and keeps the loaded-assembly table and the type cache coherent. Every
//! reference-to-definition query goes through the context, and a successful
//! resolution always yields the single canonical instance for its identity within
//! this context.
//!
//! # Concurrency
//!
//! One mutex guards the loaded-assembly table *and* the cache-then-probe sequence
//! of assembly resolution, so parallel resolutions of one identity cannot produce
//! two instances. The type cache is a concurrent map with first-writer-wins
//! inserts; redundant computation is acceptable, divergent results are not.

use std::sync::{Arc, Mutex, Weak};

use dashmap::DashMap;

use crate::{
    file::service::{FileService, PhysicalFileService},
    metadata::{
        comparer::{ComparerFlags, SignatureComparer},
        identity::AssemblyIdentity,
        model::{
            AssemblyRc, CilTypeRc, MemberReference, ModuleRc, ResolvedMember, TypeDescriptor,
        },
        probing::{AssemblyResolver, CoreAssemblyResolver, FrameworkAssemblyResolver},
        reader::{AssemblySource, ModuleReader, ModuleReadParameters},
        resolver,
        runtime::{RuntimeFamily, TargetRuntime},
    },
    Error, ResolutionError, ResolutionResult, Result,
};

/// Cache key for resolved type references: the root scope's identity plus the
/// scope-qualified name chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct TypeCacheKey {
    /// Stable identity of the root resolution scope
    pub scope: String,
    /// `(namespace, name)` pairs from the outermost reference inward
    pub names: Vec<(Option<String>, String)>,
}

/// Process-wide-style container bounding assembly and type resolution.
pub struct RuntimeContext {
    /// Weak handle to this context's own `Arc`
    self_weak: Weak<RuntimeContext>,
    /// The runtime this context resolves against
    target_runtime: TargetRuntime,
    /// The expected implementation corlib for the target runtime
    corlib: AssemblyIdentity,
    /// The context-bound comparer (exported-type forwarding participates)
    comparer: SignatureComparer,
    /// The module reader used for dependency loads
    reader: Arc<dyn ModuleReader>,
    /// The file service probing runs against
    file_service: Arc<dyn FileService>,
    /// The assembly resolver consulted on table misses
    resolver: Box<dyn AssemblyResolver>,
    /// Loaded assemblies, unique under the version-agnostic comparer
    assemblies: Mutex<Vec<AssemblyRc>>,
    /// Resolved type references, first-writer-wins
    type_cache: DashMap<TypeCacheKey, CilTypeRc>,
}

impl RuntimeContext {
    /// Create a context with the default resolver for the target's family:
    /// GAC probing for .NET Framework, shared-framework probing otherwise.
    #[must_use]
    pub fn new(
        target_runtime: TargetRuntime,
        reader: Arc<dyn ModuleReader>,
        file_service: Arc<dyn FileService>,
    ) -> Arc<Self> {
        let resolver: Box<dyn AssemblyResolver> = match target_runtime.family {
            RuntimeFamily::NetFramework => Box::new(FrameworkAssemblyResolver::from_environment(
                reader.clone(),
                file_service.clone(),
            )),
            RuntimeFamily::NetStandard | RuntimeFamily::NetCoreApp => {
                Box::new(CoreAssemblyResolver::from_environment(
                    reader.clone(),
                    file_service.clone(),
                    target_runtime,
                ))
            }
        };

        Self::with_resolver(target_runtime, reader, file_service, resolver)
    }

    /// Create a context with the default resolver and the physical filesystem.
    #[must_use]
    pub fn for_runtime(target_runtime: TargetRuntime, reader: Arc<dyn ModuleReader>) -> Arc<Self> {
        Self::new(target_runtime, reader, Arc::new(PhysicalFileService))
    }

    /// Create a context with an explicit assembly resolver.
    #[must_use]
    pub fn with_resolver(
        target_runtime: TargetRuntime,
        reader: Arc<dyn ModuleReader>,
        file_service: Arc<dyn FileService>,
        resolver: Box<dyn AssemblyResolver>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_weak| RuntimeContext {
            self_weak: self_weak.clone(),
            target_runtime,
            corlib: target_runtime.corlib_identity(),
            comparer: SignatureComparer::with_context(ComparerFlags::empty(), self_weak.clone()),
            reader,
            file_service,
            resolver,
            assemblies: Mutex::new(Vec::new()),
            type_cache: DashMap::new(),
        })
    }

    /// The runtime this context resolves against
    #[must_use]
    pub fn target_runtime(&self) -> TargetRuntime {
        self.target_runtime
    }

    /// The expected implementation corlib identity for this runtime
    #[must_use]
    pub fn corlib_identity(&self) -> &AssemblyIdentity {
        &self.corlib
    }

    /// The context-bound signature comparer
    #[must_use]
    pub fn comparer(&self) -> &SignatureComparer {
        &self.comparer
    }

    /// The module reader used for dependency loads
    #[must_use]
    pub fn reader(&self) -> &Arc<dyn ModuleReader> {
        &self.reader
    }

    /// The file service probing runs against
    #[must_use]
    pub fn file_service(&self) -> &Arc<dyn FileService> {
        &self.file_service
    }

    /// Default read parameters for dependency loads within this context
    #[must_use]
    pub fn read_parameters(&self) -> ModuleReadParameters {
        ModuleReadParameters {
            create_runtime_context: false,
            runtime_context: self.self_weak.upgrade(),
            file_service: self.file_service.clone(),
        }
    }

    /// Register an assembly with this context.
    ///
    /// # Errors
    /// Returns [`Error::AssemblyHasContext`] when the assembly already belongs
    /// to a context, [`Error::DuplicateAssembly`] when an equivalent identity
    /// (version-agnostic) is already registered; first wins, second fails.
    pub fn add_assembly(&self, assembly: &AssemblyRc) -> Result<()> {
        let mut table = self.assemblies.lock().map_err(|_| Error::LockError)?;

        if assembly.has_context() {
            return Err(Error::AssemblyHasContext(assembly.identity.name.clone()));
        }
        if table
            .iter()
            .any(|existing| existing.identity.eq_version_agnostic(&assembly.identity))
        {
            return Err(Error::DuplicateAssembly(assembly.identity.display_name()));
        }

        assembly.set_context(self.self_weak.clone())?;
        table.push(assembly.clone());
        Ok(())
    }

    /// Register an assembly unless an equivalent identity already exists, in
    /// which case the previously cached instance is returned and `assembly`
    /// is discarded.
    ///
    /// # Errors
    /// Returns [`Error::LockError`] when the table mutex is poisoned, or
    /// [`Error::AssemblyHasContext`] when `assembly` already has a context.
    pub fn get_or_add_assembly(&self, assembly: AssemblyRc) -> Result<AssemblyRc> {
        let mut table = self.assemblies.lock().map_err(|_| Error::LockError)?;

        if let Some(existing) = table
            .iter()
            .find(|existing| existing.identity.eq_version_agnostic(&assembly.identity))
        {
            return Ok(existing.clone());
        }

        assembly.set_context(self.self_weak.clone())?;
        table.push(assembly.clone());
        Ok(assembly)
    }

    /// Read an assembly through the module reader with this context's default
    /// parameters, then register it via get-or-add semantics.
    ///
    /// # Errors
    /// Propagates reader failures and registration errors.
    pub fn load_assembly(&self, source: &AssemblySource) -> Result<AssemblyRc> {
        let params = self.read_parameters();
        let assembly = self.reader.read_assembly(source, &params)?;
        self.get_or_add_assembly(assembly)
    }

    /// Snapshot of the loaded assemblies, taken under the table lock
    #[must_use]
    pub fn loaded_assemblies(&self) -> Vec<AssemblyRc> {
        match self.assemblies.lock() {
            Ok(table) => table.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Resolve an assembly identity to a loaded definition.
    ///
    /// Consults the loaded-assembly table first (version-agnostic), then
    /// delegates to the assembly resolver; the probe runs under the table lock
    /// so one identity never yields two instances.
    ///
    /// # Errors
    /// Propagates the resolver's status on failure.
    pub fn resolve_assembly(
        &self,
        reference: &AssemblyIdentity,
        origin: Option<&ModuleRc>,
    ) -> ResolutionResult<AssemblyRc> {
        let mut table = self.assemblies.lock().map_err(|_| {
            ResolutionError::AssemblyBadImage("loaded-assembly table lock poisoned".to_string())
        })?;

        if let Some(existing) = table
            .iter()
            .find(|existing| existing.identity.eq_version_agnostic(reference))
        {
            return Ok(existing.clone());
        }

        let resolved = self.resolver.resolve(reference, origin)?;
        resolved
            .set_context(self.self_weak.clone())
            .map_err(|error| ResolutionError::AssemblyBadImage(error.to_string()))?;
        table.push(resolved.clone());
        Ok(resolved)
    }

    /// Resolve a type descriptor to its canonical definition within this
    /// context.
    ///
    /// Resolved references are cached; a cache hit is verified against the
    /// descriptor's current `(namespace, name)` and evicted on mismatch.
    ///
    /// # Errors
    /// Returns the resolution status on failure (see [`ResolutionError`]).
    pub fn resolve_type(
        &self,
        descriptor: &TypeDescriptor,
        origin: Option<&ModuleRc>,
    ) -> ResolutionResult<CilTypeRc> {
        resolver::resolve_type(self, descriptor, origin)
    }

    /// Resolve a member reference to a field or method definition.
    ///
    /// # Errors
    /// Returns [`ResolutionError::MemberNotFound`] when the declaring type
    /// exists but holds no matching member, or the declaring type's own
    /// resolution status.
    pub fn resolve_member(
        &self,
        reference: &MemberReference,
        origin: Option<&ModuleRc>,
    ) -> ResolutionResult<ResolvedMember> {
        resolver::resolve_member(self, reference, origin)
    }

    pub(crate) fn cache_lookup(&self, key: &TypeCacheKey) -> Option<CilTypeRc> {
        self.type_cache.get(key).map(|entry| entry.value().clone())
    }

    pub(crate) fn cache_insert(&self, key: TypeCacheKey, definition: CilTypeRc) -> CilTypeRc {
        // First writer wins; a racing insert keeps the earlier instance
        self.type_cache
            .entry(key)
            .or_insert(definition)
            .value()
            .clone()
    }

    pub(crate) fn cache_evict(&self, key: &TypeCacheKey) {
        self.type_cache.remove(key);
    }

    #[cfg(test)]
    pub(crate) fn cache_seed(&self, key: TypeCacheKey, definition: CilTypeRc) {
        self.type_cache.insert(key, definition);
    }
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("target_runtime", &self.target_runtime)
            .field("corlib", &self.corlib.display_name())
            .field("loaded_assemblies", &self.loaded_assemblies().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        file::service::MemoryFileService,
        metadata::{
            identity::AssemblyVersion,
            model::{
                AssemblyReference, CilAssembly, CilType, TypeAttributes, TypeReference,
            },
            token::{TableId, Token},
        },
    };

    struct NoReader;

    impl ModuleReader for NoReader {
        fn read_assembly(
            &self,
            source: &AssemblySource,
            _params: &ModuleReadParameters,
        ) -> crate::Result<AssemblyRc> {
            Err(crate::error::malformed_error!(
                "no reader in this test - {}",
                source.display_name()
            ))
        }
    }

    struct NoResolver;

    impl AssemblyResolver for NoResolver {
        fn resolve(
            &self,
            reference: &AssemblyIdentity,
            _origin: Option<&ModuleRc>,
        ) -> crate::ResolutionResult<AssemblyRc> {
            Err(ResolutionError::AssemblyNotFound(reference.display_name()))
        }
    }

    fn empty_context() -> Arc<RuntimeContext> {
        RuntimeContext::with_resolver(
            TargetRuntime::net_framework(4, 0),
            Arc::new(NoReader),
            Arc::new(MemoryFileService::new()),
            Box::new(NoResolver),
        )
    }

    fn assembly(name: &str, major: u16) -> AssemblyRc {
        CilAssembly::with_manifest_module(
            AssemblyIdentity::new(name, AssemblyVersion::new(major, 0, 0, 0)),
            &format!("{name}.dll"),
        )
    }

    #[test]
    fn test_add_assembly_sets_back_pointer() {
        let context = empty_context();
        let foo = assembly("Foo", 1);
        context.add_assembly(&foo).unwrap();

        assert!(foo.has_context());
        assert!(Arc::ptr_eq(&foo.context().unwrap(), &context));
        assert_eq!(context.loaded_assemblies().len(), 1);
    }

    #[test]
    fn test_add_assembly_rejects_version_agnostic_duplicate() {
        let context = empty_context();
        context.add_assembly(&assembly("Foo", 1)).unwrap();

        // First wins, second fails, even at another version
        let duplicate = assembly("Foo", 2);
        assert!(matches!(
            context.add_assembly(&duplicate),
            Err(Error::DuplicateAssembly(_))
        ));
        assert_eq!(context.loaded_assemblies().len(), 1);
    }

    #[test]
    fn test_add_assembly_rejects_prior_context() {
        let first = empty_context();
        let second = empty_context();
        let foo = assembly("Foo", 1);

        first.add_assembly(&foo).unwrap();
        assert!(matches!(
            second.add_assembly(&foo),
            Err(Error::AssemblyHasContext(_))
        ));
    }

    #[test]
    fn test_get_or_add_returns_cached_instance() {
        let context = empty_context();
        let original = assembly("Foo", 1);
        context.add_assembly(&original).unwrap();

        let newer = assembly("Foo", 2);
        let returned = context.get_or_add_assembly(newer.clone()).unwrap();

        assert!(Arc::ptr_eq(&returned, &original));
        assert!(!newer.has_context());
        assert_eq!(context.loaded_assemblies().len(), 1);
    }

    #[test]
    fn test_resolve_assembly_is_version_agnostic() {
        let context = empty_context();
        let foo = assembly("Foo", 1);
        context.add_assembly(&foo).unwrap();

        let reference = AssemblyIdentity::new("Foo", AssemblyVersion::new(2, 0, 0, 0));
        let resolved = context.resolve_assembly(&reference, None).unwrap();
        assert!(Arc::ptr_eq(&resolved, &foo));
    }

    #[test]
    fn test_stale_cache_entry_is_evicted_and_requeried() {
        let context = empty_context();
        let lib = assembly("Lib", 1);
        let module = lib.manifest_module().unwrap();
        let widget = CilType::new(
            Token::from_parts(TableId::TYPE_DEF, 1),
            Some("Lib".to_string()),
            "Widget",
            TypeAttributes::PUBLIC,
        );
        module.add_type(&widget);
        context.add_assembly(&lib).unwrap();

        let scope_ref = Arc::new(AssemblyReference::new(lib.identity.clone()));
        let reference = Arc::new(TypeReference::new(
            Some(&module),
            Some(crate::metadata::model::ResolutionScope::Assembly(scope_ref)),
            Some("Lib".to_string()),
            "Widget",
        ));

        // Seed the cache with a definition whose names no longer match the key
        let imposter = CilType::new(
            Token::from_parts(TableId::TYPE_DEF, 9),
            Some("Lib".to_string()),
            "Renamed",
            TypeAttributes::PUBLIC,
        );
        let key = TypeCacheKey {
            scope: format!(
                "asm:{}|{}|{:016x}",
                lib.identity.name,
                "",
                lib.identity.public_key_token().unwrap_or(0)
            ),
            names: vec![(Some("Lib".to_string()), "Widget".to_string())],
        };
        context.cache_seed(key.clone(), imposter);

        let resolved = context
            .resolve_type(&TypeDescriptor::Reference(reference), Some(&module))
            .unwrap();
        assert!(Arc::ptr_eq(&resolved, &widget));

        // The evicted slot now holds the real definition
        let cached = context.cache_lookup(&key).unwrap();
        assert!(Arc::ptr_eq(&cached, &widget));
    }
}
