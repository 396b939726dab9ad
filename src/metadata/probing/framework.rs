//! Runtime-library resolver for the .NET Framework family.
//!
//! Probes the Global Assembly Cache layout (architecture-specific and MSIL
//! roots, `v4.0_{version}__{token}` version-prefixed subdirectories) and the
//! runtime install directory. `mscorlib` short-circuits to the install
//! directory, and GAC probing is restricted to references carrying a public-key
//! token.

use std::{
    path::PathBuf,
    sync::Arc,
};

use crate::{
    file::service::FileService,
    metadata::{
        identity::AssemblyIdentity,
        model::{AssemblyRc, ModuleRc},
        probing::{AssemblyResolver, DirectoryProbingResolver, ProbingPaths},
        reader::ModuleReader,
    },
    ResolutionError, ResolutionResult,
};

/// GAC + install-directory probing for .NET Framework targets.
pub struct FrameworkAssemblyResolver {
    directory: DirectoryProbingResolver,
    /// GAC roots, e.g. `GAC_64`, `GAC_32`, `GAC_MSIL` under the assembly root
    gac_roots: Vec<PathBuf>,
    /// The runtime install directory holding `mscorlib.dll`
    install_directory: Option<PathBuf>,
}

impl FrameworkAssemblyResolver {
    /// Create a resolver with explicit GAC roots and install directory
    #[must_use]
    pub fn new(
        reader: Arc<dyn ModuleReader>,
        file_service: Arc<dyn FileService>,
        paths: ProbingPaths,
        gac_roots: Vec<PathBuf>,
        install_directory: Option<PathBuf>,
    ) -> Self {
        FrameworkAssemblyResolver {
            directory: DirectoryProbingResolver::new(reader, file_service, paths),
            gac_roots,
            install_directory,
        }
    }

    /// Discover GAC roots and the install directory from the environment.
    ///
    /// Path discovery is a pure function of the environment at construction
    /// time; on non-Windows hosts the discovered lists are simply empty and
    /// only directory probing remains active.
    #[must_use]
    pub fn from_environment(
        reader: Arc<dyn ModuleReader>,
        file_service: Arc<dyn FileService>,
    ) -> Self {
        let windir = std::env::var_os("windir").map(PathBuf::from);

        let mut gac_roots = Vec::new();
        let mut install_directory = None;

        if let Some(windir) = windir {
            let assembly_root = windir.join("Microsoft.NET").join("assembly");
            for root in ["GAC_64", "GAC_32", "GAC_MSIL"] {
                gac_roots.push(assembly_root.join(root));
            }

            let framework_root = windir.join("Microsoft.NET").join("Framework64");
            for version in file_service.read_dir(&framework_root) {
                if version
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("v4."))
                {
                    install_directory = Some(version);
                }
            }
        }

        FrameworkAssemblyResolver {
            directory: DirectoryProbingResolver::new(reader, file_service, ProbingPaths::default()),
            gac_roots,
            install_directory,
        }
    }

    /// The GAC subdirectory name for a reference:
    /// `v4.0_{version}__{token:016x}`
    fn gac_directory_name(reference: &AssemblyIdentity) -> Option<String> {
        let token = reference.public_key_token()?;
        Some(format!("v4.0_{}__{:016x}", reference.version, token))
    }

    /// Probe the GAC roots for a strong-named reference
    fn probe_gac(&self, reference: &AssemblyIdentity) -> Option<PathBuf> {
        let version_directory = Self::gac_directory_name(reference)?;
        let file_name = format!("{}.dll", reference.name);

        for root in &self.gac_roots {
            let candidate = root
                .join(&reference.name)
                .join(&version_directory)
                .join(&file_name);
            if self.directory.file_service().exists(&candidate) {
                return Some(candidate);
            }
        }

        None
    }

    /// Probe the install directory for a runtime library
    fn probe_install_directory(&self, reference: &AssemblyIdentity) -> Option<PathBuf> {
        let install = self.install_directory.as_ref()?;
        let candidate = install.join(format!("{}.dll", reference.name));
        self.directory
            .file_service()
            .exists(&candidate)
            .then_some(candidate)
    }
}

impl AssemblyResolver for FrameworkAssemblyResolver {
    fn resolve(
        &self,
        reference: &AssemblyIdentity,
        origin: Option<&ModuleRc>,
    ) -> ResolutionResult<AssemblyRc> {
        // The corlib is never GAC'd; it ships in the install directory
        if reference.name == "mscorlib" {
            if let Some(path) = self.probe_install_directory(reference) {
                return self.directory.read_candidate(&path);
            }
        }

        if reference.public_key_token().is_some() {
            if let Some(path) = self.probe_gac(reference) {
                return self.directory.read_candidate(&path);
            }
        }

        if let Some(path) = self.probe_install_directory(reference) {
            return self.directory.read_candidate(&path);
        }

        if let Some(path) = self.directory.probe(reference, origin) {
            return self.directory.read_candidate(&path);
        }

        Err(ResolutionError::AssemblyNotFound(reference.display_name()))
    }
}
