//! Reference-to-definition resolution algorithms.
//!
//! These functions implement the runtime's lookup rules over the entity model:
//! type references walk their resolution-scope chain, exported types follow
//! their implementation chain, and member references scan the resolved declaring
//! type. Both walks carry a per-query stack of visited targets so circular
//! scope graphs terminate with
//! [`ResolutionError::CircularResolutionScope`] instead of overflowing.

use std::sync::Arc;

use crate::{
    metadata::{
        context::{RuntimeContext, TypeCacheKey},
        model::{
            AssemblyRc, CilModule, CilTypeRc, ExportedTypeRc, MemberReference, MemberRefParent,
            MemberSignature, ModuleRc, ResolutionScope, ResolvedMember, TypeDescriptor, TypeRefRc,
        },
        signatures::TypeSignature,
    },
    ResolutionError, ResolutionResult,
};

/// Resolve any type descriptor to its canonical definition.
pub(crate) fn resolve_type(
    context: &RuntimeContext,
    descriptor: &TypeDescriptor,
    origin: Option<&ModuleRc>,
) -> ResolutionResult<CilTypeRc> {
    match descriptor {
        TypeDescriptor::Definition(definition) => {
            // A definition declared by the origin module is already canonical
            if let (Some(origin), Some(module)) = (origin, definition.module()) {
                if Arc::ptr_eq(origin, &module) {
                    return Ok(definition.clone());
                }
            }
            resolve_foreign_definition(context, definition, origin)
        }
        TypeDescriptor::Reference(reference) => {
            resolve_type_reference(context, reference, origin)
        }
        TypeDescriptor::Specification(specification) => resolve_type(
            context,
            &TypeDescriptor::Signature(specification.signature().clone()),
            origin,
        ),
        TypeDescriptor::Signature(signature) => {
            resolve_type_signature(context, signature, origin)
        }
        TypeDescriptor::Exported(exported) => {
            let mut stack = Vec::new();
            resolve_exported_type(context, exported, origin, &mut stack)
        }
    }
}

/// A definition from another module (or another context) re-resolves as a
/// reference so the result is canonical for *this* context.
fn resolve_foreign_definition(
    context: &RuntimeContext,
    definition: &CilTypeRc,
    origin: Option<&ModuleRc>,
) -> ResolutionResult<CilTypeRc> {
    let Some(module) = definition.module() else {
        return Err(ResolutionError::InvalidReference(format!(
            "definition {} has no declaring module",
            definition.full_name()
        )));
    };
    let Some(assembly) = module.assembly() else {
        return Err(ResolutionError::InvalidReference(format!(
            "definition {} has no declaring assembly",
            definition.full_name()
        )));
    };

    let declaring = context.resolve_assembly(&assembly.identity, origin)?;
    let mut stack = Vec::new();

    // Re-run the name lookup against the canonical assembly, walking down the
    // declaring-type chain for nested definitions
    let mut chain = vec![definition.clone()];
    let mut current = definition.clone();
    while let Some(parent) = current.declaring_type() {
        chain.push(parent.clone());
        current = parent;
    }

    let outermost = chain.pop().unwrap_or_else(|| definition.clone());
    let mut resolved = search_assembly(
        context,
        &declaring,
        outermost.namespace.as_deref(),
        &outermost.name,
        origin,
        &mut stack,
    )?;

    while let Some(next) = chain.pop() {
        resolved = resolved.find_nested_type(&next.name).ok_or_else(|| {
            ResolutionError::TypeNotFound(next.full_name())
        })?;
    }

    Ok(resolved)
}

/// Resolve a standalone type signature by extracting its underlying
/// type-def-or-ref; primitives go through the origin module's corlib factory.
fn resolve_type_signature(
    context: &RuntimeContext,
    signature: &TypeSignature,
    origin: Option<&ModuleRc>,
) -> ResolutionResult<CilTypeRc> {
    let stripped = signature.strip_modifiers();

    if let Some(entity) = stripped.underlying_type_def_or_ref() {
        return resolve_type(context, &TypeDescriptor::from(entity.clone()), origin);
    }

    if let Some(corlib_name) = stripped.corlib_name() {
        let Some(origin) = origin else {
            return Err(ResolutionError::InvalidReference(format!(
                "corlib type {} requires an origin module",
                stripped
            )));
        };
        let reference = origin.corlib_type("System", corlib_name);
        return resolve_type_reference(context, &reference, Some(origin));
    }

    Err(ResolutionError::InvalidReference(format!(
        "signature {} has no underlying type",
        stripped
    )))
}

/// Resolve a type reference through its scope chain, consulting the type cache.
pub(crate) fn resolve_type_reference(
    context: &RuntimeContext,
    reference: &TypeRefRc,
    origin: Option<&ModuleRc>,
) -> ResolutionResult<CilTypeRc> {
    let key = cache_key(reference);

    if let Some(key) = &key {
        if let Some(cached) = context.cache_lookup(key) {
            // Lazy invalidation: evict when the cached definition no longer
            // carries the reference's names
            if cached.is_type_of(reference.namespace.as_deref(), &reference.name) {
                return Ok(cached);
            }
            context.cache_evict(key);
        }
    }

    let mut stack = Vec::new();
    let resolved = resolve_type_reference_inner(context, reference, origin, &mut stack)?;

    match key {
        Some(key) => Ok(context.cache_insert(key, resolved)),
        None => Ok(resolved),
    }
}

/// Build the cache key: the root scope's stable identity plus the
/// outermost-first name chain. References with unresolvable scopes are not
/// cached.
fn cache_key(reference: &TypeRefRc) -> Option<TypeCacheKey> {
    let mut names = vec![(reference.namespace.clone(), reference.name.clone())];
    let mut current = reference.clone();

    let scope = loop {
        let parent = match &current.scope {
            Some(ResolutionScope::Type(parent)) => {
                names.push((parent.namespace.clone(), parent.name.clone()));
                parent.clone()
            }
            Some(ResolutionScope::Assembly(assembly_ref)) => {
                let identity = &assembly_ref.identity;
                break format!(
                    "asm:{}|{}|{:016x}",
                    identity.name,
                    identity.culture.as_deref().unwrap_or(""),
                    identity.public_key_token().unwrap_or(0)
                );
            }
            Some(ResolutionScope::CurrentModule(module)) => {
                break format!("mod:{:p}", module.as_ptr());
            }
            Some(ResolutionScope::Module(module_ref)) => {
                break format!("modref:{:p}", Arc::as_ptr(module_ref));
            }
            None => return None,
        };
        current = parent;
    };

    names.reverse();
    Some(TypeCacheKey { scope, names })
}

fn resolve_type_reference_inner(
    context: &RuntimeContext,
    reference: &TypeRefRc,
    origin: Option<&ModuleRc>,
    stack: &mut Vec<usize>,
) -> ResolutionResult<CilTypeRc> {
    if reference.name.is_empty() {
        return Err(ResolutionError::InvalidReference(
            "type reference has no name".to_string(),
        ));
    }
    let Some(scope) = &reference.scope else {
        return Err(ResolutionError::InvalidReference(format!(
            "type reference {} has no resolution scope",
            reference.full_name()
        )));
    };

    let key = scope.key();
    if stack.contains(&key) {
        return Err(ResolutionError::CircularResolutionScope(
            reference.full_name(),
        ));
    }
    stack.push(key);

    let result = match scope {
        ResolutionScope::Assembly(assembly_ref) => {
            let context_module = reference.module();
            let context_assembly = context_module.as_ref().and_then(|module| module.assembly());

            if let (Some(module), Some(assembly)) = (&context_module, &context_assembly) {
                if assembly.identity.eq_default(&assembly_ref.identity) {
                    // Self-reference: the scope names the reference's own assembly
                    search_module(
                        context,
                        module,
                        reference.namespace.as_deref(),
                        &reference.name,
                        origin,
                        stack,
                    )
                } else {
                    resolve_through_assembly(context, reference, assembly_ref, origin, stack)
                }
            } else {
                resolve_through_assembly(context, reference, assembly_ref, origin, stack)
            }
        }
        ResolutionScope::CurrentModule(module) => {
            let module = module.upgrade().or_else(|| reference.module());
            match module {
                Some(module) => search_module(
                    context,
                    &module,
                    reference.namespace.as_deref(),
                    &reference.name,
                    origin,
                    stack,
                ),
                None => Err(ResolutionError::InvalidReference(format!(
                    "module scope of {} is gone",
                    reference.full_name()
                ))),
            }
        }
        ResolutionScope::Module(module_ref) => {
            let sibling = reference
                .module()
                .and_then(|module| module.assembly())
                .and_then(|assembly| assembly.find_module(&module_ref.name));
            match sibling {
                Some(module) => search_module(
                    context,
                    &module,
                    reference.namespace.as_deref(),
                    &reference.name,
                    origin,
                    stack,
                ),
                None => Err(ResolutionError::ModuleNotFound(module_ref.name.clone())),
            }
        }
        ResolutionScope::Type(parent) => {
            let declaring = resolve_type_reference_inner(context, parent, origin, stack)?;
            declaring
                .find_nested_type(&reference.name)
                .ok_or_else(|| ResolutionError::TypeNotFound(reference.full_name()))
        }
    };

    stack.pop();
    result
}

/// Assembly-reference scope resolution: prefer the origin module's own assembly
/// when the identity matches, otherwise go through the context's assembly table.
fn resolve_through_assembly(
    context: &RuntimeContext,
    reference: &TypeRefRc,
    assembly_ref: &crate::metadata::model::AssemblyRefRc,
    origin: Option<&ModuleRc>,
    stack: &mut Vec<usize>,
) -> ResolutionResult<CilTypeRc> {
    if let Some(origin_module) = origin {
        if let Some(origin_assembly) = origin_module.assembly() {
            if origin_assembly.identity.eq_default(&assembly_ref.identity) {
                return search_module(
                    context,
                    origin_module,
                    reference.namespace.as_deref(),
                    &reference.name,
                    origin,
                    stack,
                );
            }
        }
    }

    let assembly = context.resolve_assembly(&assembly_ref.identity, origin)?;
    search_assembly(
        context,
        &assembly,
        reference.namespace.as_deref(),
        &reference.name,
        origin,
        stack,
    )
}

/// Search an assembly's modules (manifest first) for a type.
fn search_assembly(
    context: &RuntimeContext,
    assembly: &AssemblyRc,
    namespace: Option<&str>,
    name: &str,
    origin: Option<&ModuleRc>,
    stack: &mut Vec<usize>,
) -> ResolutionResult<CilTypeRc> {
    let mut last = ResolutionError::TypeNotFound(full_name(namespace, name));

    for module in assembly.modules() {
        match search_module(context, module, namespace, name, origin, stack) {
            Ok(definition) => return Ok(definition),
            Err(ResolutionError::TypeNotFound(_)) => {}
            Err(error) => last = error,
        }
    }

    Err(last)
}

/// Search one module: top-level definitions first, then exported types (which
/// is how forwarders are followed).
fn search_module(
    context: &RuntimeContext,
    module: &ModuleRc,
    namespace: Option<&str>,
    name: &str,
    origin: Option<&ModuleRc>,
    stack: &mut Vec<usize>,
) -> ResolutionResult<CilTypeRc> {
    if let Some(definition) = module.find_type(namespace, name) {
        return Ok(definition);
    }

    if let Some(exported) = module.find_exported_type(namespace, name) {
        return resolve_exported_type(context, &exported, origin, stack);
    }

    Err(ResolutionError::TypeNotFound(full_name(namespace, name)))
}

/// Resolve an exported type through its implementation chain, with cycle
/// protection over the visited forwarders.
pub(crate) fn resolve_exported_type(
    context: &RuntimeContext,
    exported: &ExportedTypeRc,
    origin: Option<&ModuleRc>,
    stack: &mut Vec<usize>,
) -> ResolutionResult<CilTypeRc> {
    use crate::metadata::model::ExportedTypeImpl;

    let key = Arc::as_ptr(exported) as usize;
    if stack.contains(&key) {
        return Err(ResolutionError::CircularResolutionScope(
            exported.full_name(),
        ));
    }
    stack.push(key);

    let result = match &exported.implementation {
        ExportedTypeImpl::Assembly(assembly_ref) => {
            match context.resolve_assembly(&assembly_ref.identity, origin) {
                Ok(assembly) => search_assembly(
                    context,
                    &assembly,
                    exported.namespace.as_deref(),
                    &exported.name,
                    origin,
                    stack,
                ),
                Err(error) => Err(error),
            }
        }
        ExportedTypeImpl::File(file_ref) => {
            let declaring_assembly = exported.module().and_then(|module| module.assembly());
            match declaring_assembly {
                Some(assembly) => match assembly.find_module(&file_ref.name) {
                    Some(module) => search_module(
                        context,
                        &module,
                        exported.namespace.as_deref(),
                        &exported.name,
                        origin,
                        stack,
                    ),
                    None => Err(ResolutionError::ModuleNotFound(file_ref.name.clone())),
                },
                None => Err(ResolutionError::InvalidReference(format!(
                    "exported type {} has no declaring assembly",
                    exported.full_name()
                ))),
            }
        }
        ExportedTypeImpl::Exported(parent) => {
            match resolve_exported_type(context, parent, origin, stack) {
                Ok(declaring) => declaring
                    .find_nested_type(&exported.name)
                    .ok_or_else(|| ResolutionError::TypeNotFound(exported.full_name())),
                Err(error) => Err(error),
            }
        }
    };

    stack.pop();
    result
}

/// Resolve a member reference: resolve the declaring type, then scan its
/// members for an exact name plus comparer-equal signature.
pub(crate) fn resolve_member(
    context: &RuntimeContext,
    reference: &MemberReference,
    origin: Option<&ModuleRc>,
) -> ResolutionResult<ResolvedMember> {
    let declaring = resolve_member_parent(context, reference, origin)?;

    match &reference.signature {
        MemberSignature::Field(signature) => declaring
            .fields()
            .find(|field| {
                field.name == reference.name
                    && context.comparer().eq_field_sig(&field.signature, signature)
            })
            .map(|field| ResolvedMember::Field(field.clone()))
            .ok_or_else(|| member_not_found(&declaring, &reference.name)),
        MemberSignature::Method(signature) => declaring
            .methods()
            .find(|method| {
                method.name == reference.name
                    && context
                        .comparer()
                        .eq_method_sig(&method.signature, signature)
            })
            .map(|method| ResolvedMember::Method(method.clone()))
            .ok_or_else(|| member_not_found(&declaring, &reference.name)),
    }
}

fn resolve_member_parent(
    context: &RuntimeContext,
    reference: &MemberReference,
    origin: Option<&ModuleRc>,
) -> ResolutionResult<CilTypeRc> {
    match &reference.parent {
        MemberRefParent::Type(entity) => {
            resolve_type(context, &TypeDescriptor::from(entity.clone()), origin)
        }
        MemberRefParent::Method(method) => method.declaring_type().ok_or_else(|| {
            ResolutionError::InvalidReference(format!(
                "vararg parent method {} has no declaring type",
                method.name
            ))
        }),
        MemberRefParent::Module(module_ref) => {
            let module = reference
                .module()
                .and_then(|module| module.assembly())
                .and_then(|assembly| assembly.find_module(&module_ref.name));
            match module {
                Some(module) => module
                    .find_type(None, global_module_type_name())
                    .ok_or_else(|| {
                        ResolutionError::TypeNotFound(global_module_type_name().to_string())
                    }),
                None => Err(ResolutionError::ModuleNotFound(module_ref.name.clone())),
            }
        }
    }
}

/// The synthetic type holding module-scoped (global) members
fn global_module_type_name() -> &'static str {
    "<Module>"
}

fn member_not_found(declaring: &CilTypeRc, member: &str) -> ResolutionError {
    ResolutionError::MemberNotFound(format!("{}::{}", declaring.full_name(), member))
}

fn full_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(namespace) if !namespace.is_empty() => format!("{}.{}", namespace, name),
        _ => name.to_string(),
    }
}

/// Resolve a module reference to the sibling module it names.
///
/// Exposed for callers that work with multi-module assemblies directly.
pub fn resolve_module(
    origin: &ModuleRc,
    module_name: &str,
) -> ResolutionResult<Arc<CilModule>> {
    origin
        .assembly()
        .and_then(|assembly| assembly.find_module(module_name))
        .ok_or_else(|| ResolutionError::ModuleNotFound(module_name.to_string()))
}
