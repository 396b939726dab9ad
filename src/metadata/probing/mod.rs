//! Assembly resolvers: find the file (or embedded bytes) for an assembly identity.
//!
//! All resolvers share the same contract: probing is a pure function of the
//! configured paths and the injected [`crate::file::service::FileService`], and
//! every read goes through the module reader with `create_runtime_context: false`
//! so the *caller* (the runtime context) attaches the result.
//!
//! - [`DirectoryProbingResolver`] - ordered directory search with culture
//!   subdirectories and `.dll`/`.exe` candidates
//! - [`FrameworkAssemblyResolver`] - Global Assembly Cache layout plus the
//!   runtime install directory (.NET Framework family)
//! - [`CoreAssemblyResolver`] - shared-framework directories driven by a
//!   [`RuntimeConfig`] (.NET Core / .NET 5+ family)
//! - [`BundleAssemblyResolver`] - single-file bundle file table with a core
//!   resolver fallback

mod bundle;
mod core;
mod directory;
mod framework;

pub use bundle::{BundleAssemblyResolver, BundleFile};
pub use core::{CoreAssemblyResolver, RuntimeConfig, RuntimeFramework};
pub use directory::{DirectoryProbingResolver, ProbingPaths};
pub use framework::FrameworkAssemblyResolver;

use crate::{
    metadata::{identity::AssemblyIdentity, model::{AssemblyRc, ModuleRc}},
    ResolutionResult,
};

/// Finds the assembly definition for an identity.
///
/// Implementations probe files, caches or embedded tables; they never attach
/// results to a runtime context themselves.
pub trait AssemblyResolver: Send + Sync {
    /// Resolve `reference` to an assembly definition.
    ///
    /// `origin` is the module whose resolution triggered the probe; its
    /// location participates in directory search order.
    ///
    /// # Errors
    /// Returns [`crate::ResolutionError::AssemblyNotFound`] when no candidate
    /// exists, or [`crate::ResolutionError::AssemblyBadImage`] when a candidate
    /// was found but could not be parsed.
    fn resolve(
        &self,
        reference: &AssemblyIdentity,
        origin: Option<&ModuleRc>,
    ) -> ResolutionResult<AssemblyRc>;
}
