//! The module-reader collaborator contract.
//!
//! PE image parsing is not the core's job; it only defines what it needs from the
//! layer that does it. A [`ModuleReader`] turns a file path or raw bytes into a
//! fully wired [`crate::metadata::model::CilAssembly`]. The
//! [`ModuleReadParameters`] carry the load-path contract: resolvers read
//! dependencies with `create_runtime_context: false` so loaded assemblies attach
//! to the *caller's* context instead of spawning disconnected ones.

use std::{path::PathBuf, sync::Arc};

use crate::{
    file::service::FileService,
    metadata::{context::RuntimeContext, model::AssemblyRc},
    Result,
};

/// Where an assembly image comes from.
#[derive(Debug, Clone)]
pub enum AssemblySource {
    /// A file on the (possibly virtual) filesystem
    Path(PathBuf),
    /// An in-memory image, e.g. a bundle-embedded file
    Bytes {
        /// Display name for diagnostics, typically the embedded file name
        name: String,
        /// The raw image bytes
        data: Arc<[u8]>,
    },
}

impl AssemblySource {
    /// Display name for diagnostics
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            AssemblySource::Path(path) => path.display().to_string(),
            AssemblySource::Bytes { name, .. } => name.clone(),
        }
    }
}

/// Parameters carried through an assembly read.
#[derive(Clone)]
pub struct ModuleReadParameters {
    /// When true, the reader probes the target runtime and creates a fresh
    /// runtime context for the result; when false, the result stays detached
    /// and the caller attaches it
    pub create_runtime_context: bool,
    /// The context the read runs for, when one exists; its default parameters
    /// flow into dependency reads so the whole graph shares one context
    pub runtime_context: Option<Arc<RuntimeContext>>,
    /// The file service the reader opens paths through
    pub file_service: Arc<dyn FileService>,
}

impl ModuleReadParameters {
    /// Parameters for a standalone read: a fresh context is created for the
    /// result
    #[must_use]
    pub fn standalone(file_service: Arc<dyn FileService>) -> Self {
        ModuleReadParameters {
            create_runtime_context: true,
            runtime_context: None,
            file_service,
        }
    }

    /// Parameters for a dependency read on behalf of `context`; the result is
    /// attached by the caller, never by the reader
    #[must_use]
    pub fn for_context(context: &Arc<RuntimeContext>) -> Self {
        ModuleReadParameters {
            create_runtime_context: false,
            runtime_context: Some(context.clone()),
            file_service: context.file_service().clone(),
        }
    }
}

/// Reads assemblies from files or bytes.
///
/// Implementations parse the PE + CLI metadata layout and build the entity
/// model; the core and its tests also use synthetic readers that hand out
/// pre-built assemblies.
pub trait ModuleReader: Send + Sync {
    /// Read an assembly from `source`.
    ///
    /// Implementations must honor `params.create_runtime_context`: when false,
    /// the returned assembly carries no context and the caller attaches it.
    ///
    /// # Errors
    /// Returns an error when the source cannot be opened or parsed.
    fn read_assembly(
        &self,
        source: &AssemblySource,
        params: &ModuleReadParameters,
    ) -> Result<AssemblyRc>;
}
