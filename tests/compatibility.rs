//! Type compatibility against a runtime context: generic variance, reference
//! convergence on `System.Object`, and substitution identity.

mod common;

use std::{borrow::Cow, sync::Arc};

use common::{app_assembly, corlib_assembly, mscorlib_identity, type_ref, MockReader};
use dotresolve::{
    file::MemoryFileService,
    metadata::{
        compat::CompatContext,
        context::RuntimeContext,
        model::{GenericParam, GenericParamAttributes, ModuleRc, TypeDefOrRef},
        runtime::TargetRuntime,
        signatures::{GenericContext, SignatureGenericInst, TypeSignature},
    },
};

/// A context holding a corlib that defines `System.Action`1` with a
/// contravariant parameter, plus an app module referencing it.
fn variance_fixture() -> (Arc<RuntimeContext>, ModuleRc, TypeDefOrRef) {
    let files = Arc::new(MemoryFileService::new());
    let reader = Arc::new(MockReader::new());
    let context = RuntimeContext::new(TargetRuntime::net_framework(4, 0), reader, files);

    let corlib = corlib_assembly(mscorlib_identity());
    let corlib_module = corlib.manifest_module().unwrap();
    let action = common::public_type(7, Some("System"), "Action`1");
    action.add_generic_param(GenericParam::with_flags(
        0,
        "T",
        GenericParamAttributes::CONTRAVARIANT,
    ));
    corlib_module.add_type(&action);
    context.add_assembly(&corlib).unwrap();

    let (app, app_module, corlib_ref) = app_assembly("App", &mscorlib_identity());
    context.add_assembly(&app).unwrap();

    let action_ref = type_ref(&app_module, &corlib_ref, "System", "Action`1");
    (context, app_module, TypeDefOrRef::Reference(action_ref))
}

fn action_of(open_type: &TypeDefOrRef, arg: TypeSignature) -> TypeSignature {
    TypeSignature::GenericInst(SignatureGenericInst {
        is_value_type: false,
        generic_type: open_type.clone(),
        type_args: vec![arg],
    })
}

/// `Action<T>` is contravariant in `T`: an `Action<object>` can stand where an
/// `Action<string>` is expected, never the other way around.
#[test]
fn contravariant_delegate_compatibility() {
    let (context, module, action) = variance_fixture();
    let cc = CompatContext::new(&context, Some(&module));

    let action_of_object = action_of(&action, TypeSignature::Object);
    let action_of_string = action_of(&action, TypeSignature::String);

    assert!(action_of_object.is_compatible_with(&action_of_string, &cc));
    assert!(!action_of_string.is_compatible_with(&action_of_object, &cc));
}

/// Without variance flags, generic arguments must match exactly.
#[test]
fn invariant_arguments_require_equality() {
    let files = Arc::new(MemoryFileService::new());
    let reader = Arc::new(MockReader::new());
    let context = RuntimeContext::new(TargetRuntime::net_framework(4, 0), reader, files);

    let corlib = corlib_assembly(mscorlib_identity());
    let corlib_module = corlib.manifest_module().unwrap();
    let list = common::public_type(7, Some("System.Collections.Generic"), "List`1");
    list.add_generic_param(GenericParam::new(0, "T"));
    corlib_module.add_type(&list);
    context.add_assembly(&corlib).unwrap();

    let (app, app_module, corlib_ref) = app_assembly("App", &mscorlib_identity());
    context.add_assembly(&app).unwrap();
    let list_ref = TypeDefOrRef::Reference(type_ref(
        &app_module,
        &corlib_ref,
        "System.Collections.Generic",
        "List`1",
    ));

    let cc = CompatContext::new(&context, Some(&app_module));
    let list_of_string = action_of(&list_ref, TypeSignature::String);
    let list_of_object = action_of(&list_ref, TypeSignature::Object);

    assert!(list_of_string.is_compatible_with(&list_of_string.clone(), &cc));
    assert!(!list_of_string.is_compatible_with(&list_of_object, &cc));
    assert!(!list_of_object.is_compatible_with(&list_of_string, &cc));
}

/// Substituting with an empty generic context returns the identical instance,
/// not a re-allocated tree.
#[test]
fn substitution_under_empty_context_is_identity() {
    let (_, _, action) = variance_fixture();
    let instance = action_of(&action, TypeSignature::String);

    let substituted = instance.substitute(&GenericContext::empty());
    assert!(matches!(substituted, Cow::Borrowed(_)));

    let context = GenericContext::from_type_signature(&instance);
    let open_arg = TypeSignature::GenericParam(
        dotresolve::metadata::signatures::GenericParamSignature {
            index: 0,
            from_method: false,
        },
    );
    match open_arg.substitute(&context) {
        Cow::Owned(TypeSignature::String) => {}
        other => panic!("Expected substitution to String, got {:?}", other),
    }
}

/// String is compatible with Object through the base-class walk against a
/// loaded corlib.
#[test]
fn string_compatible_with_object_through_hierarchy() {
    let (context, module, _) = variance_fixture();
    let cc = CompatContext::new(&context, Some(&module));

    assert!(TypeSignature::String.is_compatible_with(&TypeSignature::Object, &cc));
    assert!(!TypeSignature::Object.is_compatible_with(&TypeSignature::String, &cc));
}
