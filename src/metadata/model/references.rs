//! Reference-side entities: assembly, module, type and member references.
//!
//! References name definitions that live elsewhere. Every type reference roots in a
//! resolution scope (an assembly reference, the current module, a sibling module, or
//! the nested-type parent reference); member references root in a parent that selects
//! the declaring type or module. References are cheap to construct and immutable in
//! their key fields - resolution caches key off those fields.

use std::{
    fmt,
    sync::{Arc, Weak},
};

use crate::metadata::{
    identity::AssemblyIdentity,
    model::{CilModule, MethodRc, ModuleRc, TypeDefOrRef},
    signatures::{SignatureField, SignatureMethod},
};

/// Reference to an `AssemblyReference`
pub type AssemblyRefRc = Arc<AssemblyReference>;
/// Reference to a `ModuleReference`
pub type ModuleRefRc = Arc<ModuleReference>;
/// Reference to a `FileReference`
pub type FileRefRc = Arc<FileReference>;
/// Reference to a `TypeReference`
pub type TypeRefRc = Arc<TypeReference>;
/// Reference to a `MemberReference`
pub type MemberRefRc = Arc<MemberReference>;

/// A reference to an external assembly by identity.
#[derive(Debug)]
pub struct AssemblyReference {
    /// The referenced assembly's identity
    pub identity: AssemblyIdentity,
}

impl AssemblyReference {
    /// Create a reference from an identity
    #[must_use]
    pub fn new(identity: AssemblyIdentity) -> Self {
        AssemblyReference { identity }
    }
}

impl fmt::Display for AssemblyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity.display_name())
    }
}

/// A reference to a sibling module of the same assembly by file name.
#[derive(Debug)]
pub struct ModuleReference {
    /// The referenced module's file name, e.g. `Helpers.netmodule`
    pub name: String,
}

impl ModuleReference {
    /// Create a reference from a module file name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        ModuleReference { name: name.into() }
    }
}

/// A `File` table entry: a file that is part of the declaring assembly.
#[derive(Debug)]
pub struct FileReference {
    /// File name relative to the assembly's location
    pub name: String,
    /// True when the file carries metadata (a module rather than a resource)
    pub contains_metadata: bool,
}

impl FileReference {
    /// Create a metadata-bearing file entry
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        FileReference {
            name: name.into(),
            contains_metadata: true,
        }
    }

    /// The file name without its extension, used by bundle matching
    #[must_use]
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(dot) => &self.name[..dot],
            None => &self.name,
        }
    }
}

/// The root of a type reference: where resolution starts looking.
#[derive(Debug, Clone)]
pub enum ResolutionScope {
    /// An external assembly
    Assembly(AssemblyRefRc),
    /// The module the reference itself lives in
    CurrentModule(Weak<CilModule>),
    /// A sibling module of the same assembly
    Module(ModuleRefRc),
    /// The declaring type of a nested-type reference
    Type(TypeRefRc),
}

impl ResolutionScope {
    /// Scope rooted in the given module
    #[must_use]
    pub fn current_module(module: &ModuleRc) -> Self {
        ResolutionScope::CurrentModule(Arc::downgrade(module))
    }

    /// Stable identity of the scope target, used by the cycle-detection stack
    #[must_use]
    pub(crate) fn key(&self) -> usize {
        match self {
            ResolutionScope::Assembly(assembly_ref) => Arc::as_ptr(assembly_ref) as usize,
            ResolutionScope::CurrentModule(module) => module.as_ptr() as usize,
            ResolutionScope::Module(module_ref) => Arc::as_ptr(module_ref) as usize,
            ResolutionScope::Type(type_ref) => Arc::as_ptr(type_ref) as usize,
        }
    }
}

impl fmt::Display for ResolutionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionScope::Assembly(assembly_ref) => write!(f, "[{}]", assembly_ref.identity.name),
            ResolutionScope::CurrentModule(module) => match module.upgrade() {
                Some(module) => write!(f, "[module {}]", module.name),
                None => f.write_str("[module <dropped>]"),
            },
            ResolutionScope::Module(module_ref) => write!(f, "[module {}]", module_ref.name),
            ResolutionScope::Type(type_ref) => write!(f, "[nested in {}]", type_ref.full_name()),
        }
    }
}

/// A reference to a type by `(scope, namespace, name)`.
#[derive(Debug)]
pub struct TypeReference {
    /// Module this reference belongs to (its context module)
    module: Option<Weak<CilModule>>,
    /// Where resolution starts; `None` makes the reference invalid
    pub scope: Option<ResolutionScope>,
    /// Namespace; `None` for the global namespace and for nested references
    pub namespace: Option<String>,
    /// Type name
    pub name: String,
}

impl TypeReference {
    /// Create a type reference
    ///
    /// ## Arguments
    /// * `module`    - The context module the reference lives in, if attached
    /// * `scope`     - The resolution scope; `None` yields an invalid reference
    /// * `namespace` - Namespace, `None` for the global namespace
    /// * `name`      - Type name
    #[must_use]
    pub fn new(
        module: Option<&ModuleRc>,
        scope: Option<ResolutionScope>,
        namespace: Option<String>,
        name: impl Into<String>,
    ) -> Self {
        TypeReference {
            module: module.map(Arc::downgrade),
            scope,
            namespace,
            name: name.into(),
        }
    }

    /// Create a type reference from an already-downgraded module handle
    #[must_use]
    pub(crate) fn from_weak_module(
        module: Weak<CilModule>,
        scope: Option<ResolutionScope>,
        namespace: Option<String>,
        name: impl Into<String>,
    ) -> Self {
        TypeReference {
            module: Some(module),
            scope,
            namespace,
            name: name.into(),
        }
    }

    /// The context module this reference lives in
    #[must_use]
    pub fn module(&self) -> Option<ModuleRc> {
        self.module.as_ref().and_then(Weak::upgrade)
    }

    /// Returns true when the namespace and name match byte-exactly
    #[must_use]
    pub fn is_type_of(&self, namespace: Option<&str>, name: &str) -> bool {
        self.namespace.as_deref() == namespace && self.name == name
    }

    /// The full display name including the nested-parent chain
    #[must_use]
    pub fn full_name(&self) -> String {
        if let Some(ResolutionScope::Type(parent)) = &self.scope {
            return format!("{}+{}", parent.full_name(), self.name);
        }

        match &self.namespace {
            Some(namespace) if !namespace.is_empty() => format!("{}.{}", namespace, self.name),
            _ => self.name.clone(),
        }
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// The parent of a member reference: what declares the referenced member.
#[derive(Debug, Clone)]
pub enum MemberRefParent {
    /// A type (definition, reference or specification)
    Type(TypeDefOrRef),
    /// A method definition; used by vararg call sites referencing their own def
    Method(MethodRc),
    /// A sibling module, for module-scoped (global) members
    Module(ModuleRefRc),
}

/// The signature of a referenced member; the variant disambiguates field from
/// method references.
#[derive(Debug, Clone)]
pub enum MemberSignature {
    /// A field signature
    Field(SignatureField),
    /// A method signature
    Method(SignatureMethod),
}

/// A reference to a member by `(parent, name, signature)`.
#[derive(Debug)]
pub struct MemberReference {
    /// Module this reference belongs to
    module: Option<Weak<CilModule>>,
    /// What declares the member
    pub parent: MemberRefParent,
    /// Member name
    pub name: String,
    /// Member signature; its kind selects field vs method lookup
    pub signature: MemberSignature,
}

impl MemberReference {
    /// Create a member reference
    #[must_use]
    pub fn new(
        module: Option<&ModuleRc>,
        parent: MemberRefParent,
        name: impl Into<String>,
        signature: MemberSignature,
    ) -> Self {
        MemberReference {
            module: module.map(Arc::downgrade),
            parent,
            name: name.into(),
            signature,
        }
    }

    /// The context module this reference lives in
    #[must_use]
    pub fn module(&self) -> Option<ModuleRc> {
        self.module.as_ref().and_then(Weak::upgrade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::identity::AssemblyVersion;

    #[test]
    fn test_file_reference_stem() {
        assert_eq!(FileReference::new("Helpers.netmodule").stem(), "Helpers");
        assert_eq!(FileReference::new("NoExtension").stem(), "NoExtension");
        assert_eq!(FileReference::new("a.b.dll").stem(), "a.b");
    }

    #[test]
    fn test_type_reference_full_name_nested() {
        let corlib = Arc::new(AssemblyReference::new(AssemblyIdentity::new(
            "mscorlib",
            AssemblyVersion::new(4, 0, 0, 0),
        )));
        let parent = Arc::new(TypeReference::new(
            None,
            Some(ResolutionScope::Assembly(corlib)),
            Some("System".to_string()),
            "Environment",
        ));
        let nested = TypeReference::new(
            None,
            Some(ResolutionScope::Type(parent)),
            None,
            "SpecialFolder",
        );
        assert_eq!(nested.full_name(), "System.Environment+SpecialFolder");
    }

    #[test]
    fn test_scope_keys_distinguish_targets() {
        let identity = AssemblyIdentity::new("A", AssemblyVersion::default());
        let first = Arc::new(AssemblyReference::new(identity.clone()));
        let second = Arc::new(AssemblyReference::new(identity));

        let scope_a = ResolutionScope::Assembly(first.clone());
        let scope_a2 = ResolutionScope::Assembly(first);
        let scope_b = ResolutionScope::Assembly(second);

        assert_eq!(scope_a.key(), scope_a2.key());
        assert_ne!(scope_a.key(), scope_b.key());
    }
}
