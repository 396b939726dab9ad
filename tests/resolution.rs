//! Cross-assembly resolution scenarios: corlib round-trips under both runtime
//! families, forwarded members, forwarder cycles and the single-instance
//! guarantees of the runtime context.

mod common;

use std::sync::Arc;

use common::{
    app_assembly, corelib_identity, corlib_assembly, mscorlib_identity, public_type, touch,
    type_ref, MockReader,
};
use dotresolve::{
    file::MemoryFileService,
    metadata::{
        context::RuntimeContext,
        identity::{AssemblyIdentity, AssemblyVersion},
        model::{
            AssemblyReference, CilAssembly, CilMethod, ExportedType, ExportedTypeImpl,
            MemberReference, MemberRefParent, MemberSignature, MethodAttributes, ResolvedMember,
            TypeDefOrRef, TypeDescriptor,
        },
        probing::{CoreAssemblyResolver, FrameworkAssemblyResolver, ProbingPaths},
        runtime::TargetRuntime,
        signatures::{SignatureMethod, TypeSignature},
    },
    ResolutionError,
};

/// System.Object resolves through the framework resolver's install directory,
/// and a second resolution returns the identical instance.
#[test]
fn system_object_round_trip_under_framework_40() {
    let files = Arc::new(MemoryFileService::new());
    let reader = Arc::new(MockReader::new());

    touch(&files, "/framework/v4.0.30319/mscorlib.dll");
    reader.register_path(
        "/framework/v4.0.30319/mscorlib.dll",
        corlib_assembly(mscorlib_identity()),
    );

    let resolver = FrameworkAssemblyResolver::new(
        reader.clone(),
        files.clone(),
        ProbingPaths::default(),
        Vec::new(),
        Some("/framework/v4.0.30319".into()),
    );
    let context = RuntimeContext::with_resolver(
        TargetRuntime::net_framework(4, 0),
        reader,
        files,
        Box::new(resolver),
    );

    let (app, module, corlib_ref) = app_assembly("App", &mscorlib_identity());
    context.add_assembly(&app).unwrap();

    let reference = type_ref(&module, &corlib_ref, "System", "Object");
    let descriptor = TypeDescriptor::Reference(reference);

    let resolved = context.resolve_type(&descriptor, Some(&module)).unwrap();
    assert!(resolved.is_type_of(Some("System"), "Object"));
    assert_eq!(
        resolved.module().unwrap().assembly().unwrap().identity.name,
        "mscorlib"
    );

    // Determinism and instance identity across repeated queries
    let again = context.resolve_type(&descriptor, Some(&module)).unwrap();
    assert!(Arc::ptr_eq(&resolved, &again));
}

/// The same logical reference under .NET Core 3.1 resolves through the shared
/// framework; the mscorlib facade forwards System.Object to
/// System.Private.CoreLib.
#[test]
fn system_object_under_core_31_resolves_to_corelib() {
    let files = Arc::new(MemoryFileService::new());
    let reader = Arc::new(MockReader::new());

    let shared = "/dotnet/shared/Microsoft.NETCore.App/3.1.0";

    // The facade declares no types of its own; it forwards to the corelib
    let facade = CilAssembly::with_manifest_module(mscorlib_identity(), "mscorlib.dll");
    let facade_module = facade.manifest_module().unwrap();
    let corelib_ref = Arc::new(AssemblyReference::new(corelib_identity()));
    facade_module.add_assembly_ref(&corelib_ref);
    facade_module.add_exported_type(&Arc::new(ExportedType::new(
        Some("System".to_string()),
        "Object",
        ExportedTypeImpl::Assembly(corelib_ref),
    )));

    touch(&files, format!("{shared}/mscorlib.dll"));
    touch(&files, format!("{shared}/System.Private.CoreLib.dll"));
    reader.register_path(format!("{shared}/mscorlib.dll"), facade);
    reader.register_path(
        format!("{shared}/System.Private.CoreLib.dll"),
        corlib_assembly(corelib_identity()),
    );

    let resolver = CoreAssemblyResolver::new(
        reader.clone(),
        files.clone(),
        ProbingPaths::default(),
        Some("/dotnet".into()),
        None,
        AssemblyVersion::new(3, 1, 0, 0),
    );
    let context = RuntimeContext::with_resolver(
        TargetRuntime::net_core(3, 1),
        reader,
        files,
        Box::new(resolver),
    );

    let (app, module, corlib_ref) = app_assembly("App", &mscorlib_identity());
    context.add_assembly(&app).unwrap();

    let reference = type_ref(&module, &corlib_ref, "System", "Object");
    let resolved = context
        .resolve_type(&TypeDescriptor::Reference(reference), Some(&module))
        .unwrap();

    assert!(resolved.is_type_of(Some("System"), "Object"));
    assert_eq!(
        resolved.module().unwrap().assembly().unwrap().identity.name,
        "System.Private.CoreLib"
    );
}

/// A member reference through a forwarding assembly resolves to the definition
/// in the assembly the forwarder points at.
#[test]
fn forwarded_member_resolves_in_actual_assembly() {
    let files = Arc::new(MemoryFileService::new());
    let reader = Arc::new(MockReader::new());

    let context = RuntimeContext::new(TargetRuntime::net_framework(4, 0), reader, files);

    // Actual: defines Lib.SomeType with a static method
    let actual = CilAssembly::with_manifest_module(
        AssemblyIdentity::new("Actual", AssemblyVersion::new(1, 0, 0, 0)),
        "Actual.dll",
    );
    let actual_module = actual.manifest_module().unwrap();
    let some_type = public_type(1, Some("Lib"), "SomeType");
    let static_method = some_type.add_method(CilMethod::with_flags(
        "StaticMethod",
        MethodAttributes::STATIC,
        SignatureMethod::static_method(TypeSignature::Void, vec![TypeSignature::I4]),
    ));
    actual_module.add_type(&some_type);

    // Forwarder: exports Lib.SomeType into Actual
    let forwarder = CilAssembly::with_manifest_module(
        AssemblyIdentity::new("Forwarder", AssemblyVersion::new(1, 0, 0, 0)),
        "Forwarder.dll",
    );
    let forwarder_module = forwarder.manifest_module().unwrap();
    let actual_ref = Arc::new(AssemblyReference::new(actual.identity.clone()));
    forwarder_module.add_assembly_ref(&actual_ref);
    forwarder_module.add_exported_type(&Arc::new(ExportedType::new(
        Some("Lib".to_string()),
        "SomeType",
        ExportedTypeImpl::Assembly(actual_ref),
    )));

    // Main: references Forwarder.SomeType::StaticMethod
    let (main, main_module, _) = app_assembly("Main", &mscorlib_identity());
    let forwarder_ref = Arc::new(AssemblyReference::new(forwarder.identity.clone()));
    main_module.add_assembly_ref(&forwarder_ref);

    context.add_assembly(&main).unwrap();
    context.add_assembly(&forwarder).unwrap();
    context.add_assembly(&actual).unwrap();

    let parent = type_ref(&main_module, &forwarder_ref, "Lib", "SomeType");
    let member_ref = MemberReference::new(
        Some(&main_module),
        MemberRefParent::Type(TypeDefOrRef::Reference(parent)),
        "StaticMethod",
        MemberSignature::Method(SignatureMethod::static_method(
            TypeSignature::Void,
            vec![TypeSignature::I4],
        )),
    );

    let resolved = context.resolve_member(&member_ref, Some(&main_module)).unwrap();
    match resolved {
        ResolvedMember::Method(method) => {
            assert!(Arc::ptr_eq(&method, &static_method));
            let declaring_assembly = method
                .declaring_type()
                .unwrap()
                .module()
                .unwrap()
                .assembly()
                .unwrap();
            assert_eq!(declaring_assembly.identity.name, "Actual");
        }
        other => panic!("Expected a method, got {:?}", other),
    }
}

/// Mutually forwarding exported types terminate with
/// `CircularResolutionScope` instead of recursing forever.
#[test]
fn malicious_exported_type_cycle_is_detected() {
    let files = Arc::new(MemoryFileService::new());
    let reader = Arc::new(MockReader::new());
    let context = RuntimeContext::new(TargetRuntime::net_framework(4, 0), reader, files);

    let names = ["CycleA", "CycleB", "CycleC"];
    let assemblies: Vec<_> = names
        .iter()
        .map(|name| {
            CilAssembly::with_manifest_module(
                AssemblyIdentity::new(*name, AssemblyVersion::new(1, 0, 0, 0)),
                &format!("{name}.dll"),
            )
        })
        .collect();

    // Each assembly forwards (Evil, Loop) to the next one, cyclically
    for (index, assembly) in assemblies.iter().enumerate() {
        let next = &assemblies[(index + 1) % assemblies.len()];
        let module = assembly.manifest_module().unwrap();
        let next_ref = Arc::new(AssemblyReference::new(next.identity.clone()));
        module.add_assembly_ref(&next_ref);
        module.add_exported_type(&Arc::new(ExportedType::new(
            Some("Evil".to_string()),
            "Loop",
            ExportedTypeImpl::Assembly(next_ref),
        )));
    }

    for assembly in &assemblies {
        context.add_assembly(assembly).unwrap();
    }

    let (app, app_module, _) = app_assembly("App", &mscorlib_identity());
    context.add_assembly(&app).unwrap();
    let cycle_a_ref = Arc::new(AssemblyReference::new(assemblies[0].identity.clone()));
    app_module.add_assembly_ref(&cycle_a_ref);

    let reference = type_ref(&app_module, &cycle_a_ref, "Evil", "Loop");
    let result = context.resolve_type(&TypeDescriptor::Reference(reference), Some(&app_module));

    assert!(matches!(
        result,
        Err(ResolutionError::CircularResolutionScope(_))
    ));
}

/// One context holds at most one assembly per version-agnostic identity;
/// resolving another version returns the cached instance.
#[test]
fn version_agnostic_single_instance() {
    let files = Arc::new(MemoryFileService::new());
    let reader = Arc::new(MockReader::new());
    let context = RuntimeContext::new(TargetRuntime::net_framework(4, 0), reader, files);

    let foo = CilAssembly::with_manifest_module(
        AssemblyIdentity::new("Foo", AssemblyVersion::new(1, 0, 0, 0)),
        "Foo.dll",
    );
    context.add_assembly(&foo).unwrap();

    let newer = AssemblyIdentity::new("Foo", AssemblyVersion::new(2, 0, 0, 0));
    let resolved = context.resolve_assembly(&newer, None).unwrap();

    assert!(Arc::ptr_eq(&resolved, &foo));
    assert_eq!(context.loaded_assemblies().len(), 1);
}

/// A reference whose scope chain dead-ends is an invalid reference; immutable
/// references cannot form a pointer-level scope cycle, so the cycle stack is
/// exercised through the exported-type test above.
#[test]
fn incomplete_scope_chain_is_invalid_reference() {
    use dotresolve::metadata::model::{ResolutionScope, TypeReference};

    let files = Arc::new(MemoryFileService::new());
    let reader = Arc::new(MockReader::new());
    let context = RuntimeContext::new(TargetRuntime::net_framework(4, 0), reader, files);

    let (app, app_module, _) = app_assembly("App", &mscorlib_identity());
    context.add_assembly(&app).unwrap();

    // The nested chain roots in a reference with no scope at all
    let outer = Arc::new(TypeReference::new(
        Some(&app_module),
        None,
        Some("Evil".to_string()),
        "Outer",
    ));
    let inner = Arc::new(TypeReference::new(
        Some(&app_module),
        Some(ResolutionScope::Type(outer)),
        None,
        "Inner",
    ));
    let looped = Arc::new(TypeReference::new(
        Some(&app_module),
        Some(ResolutionScope::Type(inner.clone())),
        None,
        "Loop",
    ));

    let result = context.resolve_type(&TypeDescriptor::Reference(looped), Some(&app_module));
    assert!(matches!(result, Err(ResolutionError::InvalidReference(_))));
}
