//! Shared fixtures for the integration tests: a mock module reader handing out
//! pre-built synthetic assemblies, and builders for the corlib shapes the
//! resolution scenarios need.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use dotresolve::{
    metadata::{
        identity::{AssemblyIdentity, AssemblyVersion, StrongName},
        model::{
            AssemblyRc, AssemblyReference, AssemblyRefRc, CilAssembly, CilType, ModuleRc,
            ResolutionScope, TypeAttributes, TypeDefOrRef, TypeReference, TypeRefRc,
        },
        reader::{AssemblySource, ModuleReader, ModuleReadParameters},
        token::{TableId, Token},
    },
    Result,
};

/// Mock reader: maps file paths and embedded-byte names to pre-built
/// assemblies, standing in for the PE reader collaborator.
#[derive(Default)]
pub struct MockReader {
    by_path: Mutex<HashMap<PathBuf, AssemblyRc>>,
    by_name: Mutex<HashMap<String, AssemblyRc>>,
}

impl MockReader {
    pub fn new() -> Self {
        MockReader::default()
    }

    /// Register the assembly returned for a path read
    pub fn register_path(&self, path: impl Into<PathBuf>, assembly: AssemblyRc) {
        self.by_path.lock().unwrap().insert(path.into(), assembly);
    }

    /// Register the assembly returned for a byte-source read with this name
    pub fn register_bytes(&self, name: impl Into<String>, assembly: AssemblyRc) {
        self.by_name.lock().unwrap().insert(name.into(), assembly);
    }
}

impl ModuleReader for MockReader {
    fn read_assembly(
        &self,
        source: &AssemblySource,
        _params: &ModuleReadParameters,
    ) -> Result<AssemblyRc> {
        let found = match source {
            AssemblySource::Path(path) => self.by_path.lock().unwrap().get(path).cloned(),
            AssemblySource::Bytes { name, .. } => self.by_name.lock().unwrap().get(name).cloned(),
        };

        found.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("not a readable image: {}", source.display_name()),
            )
            .into()
        })
    }
}

/// The mscorlib identity used by the framework-era scenarios
pub fn mscorlib_identity() -> AssemblyIdentity {
    AssemblyIdentity::new("mscorlib", AssemblyVersion::new(4, 0, 0, 0))
        .with_strong_name(StrongName::from_token_str("b77a5c561934e089").unwrap())
}

/// The System.Private.CoreLib identity used by the core-era scenarios
pub fn corelib_identity() -> AssemblyIdentity {
    AssemblyIdentity::new("System.Private.CoreLib", AssemblyVersion::new(4, 0, 0, 0))
        .with_strong_name(StrongName::from_token_str("7cec85d7bea7798e").unwrap())
}

/// A plain public type definition
pub fn public_type(rid: u32, namespace: Option<&str>, name: &str) -> Arc<CilType> {
    CilType::new(
        Token::from_parts(TableId::TYPE_DEF, rid),
        namespace.map(String::from),
        name,
        TypeAttributes::PUBLIC,
    )
}

/// Build a corlib-shaped assembly: `System.Object`, `System.String`,
/// `System.ValueType`, `System.Enum` and `System.Int32`, wired with their
/// base types.
pub fn corlib_assembly(identity: AssemblyIdentity) -> AssemblyRc {
    let module_name = format!("{}.dll", identity.name);
    let assembly = CilAssembly::with_manifest_module(identity, &module_name);
    let module = assembly.manifest_module().unwrap();

    let object = public_type(1, Some("System"), "Object");
    let string = public_type(2, Some("System"), "String");
    let value_type = public_type(3, Some("System"), "ValueType");
    let enum_type = public_type(4, Some("System"), "Enum");
    let int32 = public_type(5, Some("System"), "Int32");
    let array = public_type(6, Some("System"), "Array");

    string
        .set_base_type(TypeDefOrRef::Definition(object.clone()))
        .unwrap();
    value_type
        .set_base_type(TypeDefOrRef::Definition(object.clone()))
        .unwrap();
    enum_type
        .set_base_type(TypeDefOrRef::Definition(value_type.clone()))
        .unwrap();
    int32
        .set_base_type(TypeDefOrRef::Definition(value_type.clone()))
        .unwrap();
    array
        .set_base_type(TypeDefOrRef::Definition(object.clone()))
        .unwrap();

    for definition in [&object, &string, &value_type, &enum_type, &int32, &array] {
        module.add_type(definition);
    }

    assembly
}

/// An application assembly with one module carrying an assembly reference to
/// `corlib`; returns the assembly, its module and the corlib reference.
pub fn app_assembly(name: &str, corlib: &AssemblyIdentity) -> (AssemblyRc, ModuleRc, AssemblyRefRc) {
    let assembly = CilAssembly::with_manifest_module(
        AssemblyIdentity::new(name, AssemblyVersion::new(1, 0, 0, 0)),
        &format!("{name}.exe"),
    );
    let module = assembly.manifest_module().unwrap();

    let corlib_ref = Arc::new(AssemblyReference::new(corlib.clone()));
    module.add_assembly_ref(&corlib_ref);

    (assembly, module, corlib_ref)
}

/// A type reference living in `module`, scoped at an assembly reference
pub fn type_ref(
    module: &ModuleRc,
    scope: &AssemblyRefRc,
    namespace: &str,
    name: &str,
) -> TypeRefRc {
    Arc::new(TypeReference::new(
        Some(module),
        Some(ResolutionScope::Assembly(scope.clone())),
        Some(namespace.to_string()),
        name,
    ))
}

/// Mark a path as existing for probing purposes; the mock reader supplies the
/// parsed result, so content is irrelevant.
pub fn touch(files: &dotresolve::file::MemoryFileService, path: impl AsRef<Path>) {
    files.insert(path.as_ref().to_path_buf(), Vec::<u8>::new());
}
