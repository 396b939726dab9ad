//! Runtime-library resolver for the .NET Core / .NET 5+ family.
//!
//! Probes the shared-framework directories under the dotnet root. The framework
//! list and additional probing paths come from a [`RuntimeConfig`] when one is
//! present (the parsed equivalent of `{app}.runtimeconfig.json`, supplied by an
//! external collaborator); without one, a fallback runtime version drives the
//! default `Microsoft.NETCore.App` probe. Frameworks are ordered so the
//! principal app framework probes before the core framework.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    file::service::FileService,
    metadata::{
        identity::{AssemblyIdentity, AssemblyVersion},
        model::{AssemblyRc, ModuleRc},
        probing::{AssemblyResolver, DirectoryProbingResolver, ProbingPaths},
        reader::ModuleReader,
        runtime::TargetRuntime,
    },
    ResolutionError, ResolutionResult,
};

/// The shared framework implementing the core library itself
const CORE_FRAMEWORK: &str = "Microsoft.NETCore.App";

/// One shared-framework dependency of an application.
#[derive(Debug, Clone)]
pub struct RuntimeFramework {
    /// Framework name, e.g. `Microsoft.NETCore.App` or `Microsoft.WindowsDesktop.App`
    pub name: String,
    /// Requested framework version, e.g. `3.1.0`
    pub version: String,
}

/// The runtime configuration of an application, as parsed by an external
/// collaborator from `{app}.runtimeconfig.json`.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Shared frameworks the application depends on
    pub frameworks: Vec<RuntimeFramework>,
    /// Additional probing paths declared by the configuration
    pub probing_paths: Vec<PathBuf>,
}

/// Shared-framework probing for .NET Core / .NET 5+ targets.
pub struct CoreAssemblyResolver {
    directory: DirectoryProbingResolver,
    /// Resolved framework directories, app framework first
    runtime_directories: Vec<PathBuf>,
}

impl CoreAssemblyResolver {
    /// Create a resolver from a dotnet root and an optional runtime
    /// configuration; without one, `fallback_version` selects the
    /// `Microsoft.NETCore.App` directory.
    #[must_use]
    pub fn new(
        reader: Arc<dyn ModuleReader>,
        file_service: Arc<dyn FileService>,
        mut paths: ProbingPaths,
        dotnet_root: Option<PathBuf>,
        config: Option<&RuntimeConfig>,
        fallback_version: AssemblyVersion,
    ) -> Self {
        let mut runtime_directories = Vec::new();

        if let Some(root) = &dotnet_root {
            let shared = root.join("shared");
            match config {
                Some(config) => {
                    // App frameworks before the core framework
                    let mut frameworks: Vec<&RuntimeFramework> = config
                        .frameworks
                        .iter()
                        .filter(|framework| framework.name != CORE_FRAMEWORK)
                        .collect();
                    frameworks.extend(
                        config
                            .frameworks
                            .iter()
                            .filter(|framework| framework.name == CORE_FRAMEWORK),
                    );

                    for framework in frameworks {
                        let requested = framework
                            .version
                            .parse::<AssemblyVersion>()
                            .unwrap_or(fallback_version);
                        if let Some(directory) = Self::pick_version_directory(
                            file_service.as_ref(),
                            &shared.join(&framework.name),
                            requested,
                        ) {
                            runtime_directories.push(directory);
                        }
                    }
                }
                None => {
                    if let Some(directory) = Self::pick_version_directory(
                        file_service.as_ref(),
                        &shared.join(CORE_FRAMEWORK),
                        fallback_version,
                    ) {
                        runtime_directories.push(directory);
                    }
                }
            }
        }

        if let Some(config) = config {
            paths
                .search_directories
                .extend(config.probing_paths.iter().cloned());
        }

        CoreAssemblyResolver {
            directory: DirectoryProbingResolver::new(reader, file_service, paths),
            runtime_directories,
        }
    }

    /// Discover the dotnet root from the environment (`DOTNET_ROOT`, then the
    /// conventional install locations).
    #[must_use]
    pub fn from_environment(
        reader: Arc<dyn ModuleReader>,
        file_service: Arc<dyn FileService>,
        target: TargetRuntime,
    ) -> Self {
        let dotnet_root = std::env::var_os("DOTNET_ROOT")
            .map(PathBuf::from)
            .or_else(|| {
                ["/usr/share/dotnet", "/usr/local/share/dotnet"]
                    .iter()
                    .map(PathBuf::from)
                    .find(|candidate| !file_service.read_dir(candidate).is_empty())
            });

        Self::new(
            reader,
            file_service,
            ProbingPaths::default(),
            dotnet_root,
            None,
            target.version,
        )
    }

    /// The resolved framework directories, app framework first
    #[must_use]
    pub fn runtime_directories(&self) -> &[PathBuf] {
        &self.runtime_directories
    }

    pub(crate) fn directory(&self) -> &DirectoryProbingResolver {
        &self.directory
    }

    /// Pick the installed version directory for a framework: an exact match
    /// when present, otherwise the highest installed version sharing the
    /// requested major, otherwise the highest installed version.
    fn pick_version_directory(
        file_service: &dyn FileService,
        framework_root: &Path,
        requested: AssemblyVersion,
    ) -> Option<PathBuf> {
        let mut installed: Vec<(AssemblyVersion, PathBuf)> = file_service
            .read_dir(framework_root)
            .into_iter()
            .filter_map(|path| {
                let version = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(|name| name.parse::<AssemblyVersion>().ok())?;
                Some((version, path))
            })
            .collect();

        if installed.is_empty() {
            return None;
        }
        installed.sort_by_key(|(version, _)| *version);

        if let Some((_, path)) = installed
            .iter()
            .find(|(version, _)| *version == requested)
        {
            return Some(path.clone());
        }

        installed
            .iter()
            .rev()
            .find(|(version, _)| version.major == requested.major)
            .or_else(|| installed.last())
            .map(|(_, path)| path.clone())
    }
}

impl AssemblyResolver for CoreAssemblyResolver {
    fn resolve(
        &self,
        reference: &AssemblyIdentity,
        origin: Option<&ModuleRc>,
    ) -> ResolutionResult<AssemblyRc> {
        for runtime_directory in &self.runtime_directories {
            if let Some(path) = self.directory.probe_directory(runtime_directory, reference) {
                return self.directory.read_candidate(&path);
            }
        }

        if let Some(path) = self.directory.probe(reference, origin) {
            return self.directory.read_candidate(&path);
        }

        Err(ResolutionError::AssemblyNotFound(reference.display_name()))
    }
}
