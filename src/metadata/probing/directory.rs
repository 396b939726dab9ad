//! Directory-probing base resolver.
//!
//! Probes an ordered list of directories for `{name}.dll` then `{name}.exe`,
//! trying culture-specific subdirectories first when the reference carries a
//! culture. The search list is: the origin module's directory (when known), the
//! configured base directory, then any additional search directories.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    file::service::FileService,
    metadata::{
        identity::AssemblyIdentity,
        model::{AssemblyRc, ModuleRc},
        probing::AssemblyResolver,
        reader::{AssemblySource, ModuleReader, ModuleReadParameters},
    },
    ResolutionError, ResolutionResult,
};

/// The configurable part of the directory search order.
#[derive(Debug, Clone, Default)]
pub struct ProbingPaths {
    /// The working directory probed after the origin module's own directory
    pub base_directory: Option<PathBuf>,
    /// Additional search directories, probed in order
    pub search_directories: Vec<PathBuf>,
}

impl ProbingPaths {
    /// Paths with only a base directory
    #[must_use]
    pub fn with_base(base_directory: impl Into<PathBuf>) -> Self {
        ProbingPaths {
            base_directory: Some(base_directory.into()),
            search_directories: Vec::new(),
        }
    }

    /// Append a search directory
    #[must_use]
    pub fn with_search_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.search_directories.push(directory.into());
        self
    }
}

/// Ordered directory probing over a [`FileService`].
pub struct DirectoryProbingResolver {
    reader: Arc<dyn ModuleReader>,
    file_service: Arc<dyn FileService>,
    paths: ProbingPaths,
}

impl DirectoryProbingResolver {
    /// Create a resolver over the given paths
    #[must_use]
    pub fn new(
        reader: Arc<dyn ModuleReader>,
        file_service: Arc<dyn FileService>,
        paths: ProbingPaths,
    ) -> Self {
        DirectoryProbingResolver {
            reader,
            file_service,
            paths,
        }
    }

    /// The configured probing paths
    #[must_use]
    pub fn paths(&self) -> &ProbingPaths {
        &self.paths
    }

    pub(crate) fn file_service(&self) -> &Arc<dyn FileService> {
        &self.file_service
    }

    pub(crate) fn reader(&self) -> &Arc<dyn ModuleReader> {
        &self.reader
    }

    /// The full ordered directory list for one probe
    fn search_order(&self, origin: Option<&ModuleRc>) -> Vec<PathBuf> {
        let mut directories = Vec::new();

        if let Some(origin_dir) = origin
            .and_then(|module| module.file_path())
            .and_then(Path::parent)
        {
            directories.push(origin_dir.to_path_buf());
        }
        if let Some(base) = &self.paths.base_directory {
            directories.push(base.clone());
        }
        directories.extend(self.paths.search_directories.iter().cloned());

        directories
    }

    /// Candidate file names for an identity: `{name}.dll` then `{name}.exe`
    fn candidate_names(reference: &AssemblyIdentity) -> [String; 2] {
        [
            format!("{}.dll", reference.name),
            format!("{}.exe", reference.name),
        ]
    }

    /// Probe one directory, culture subdirectory first
    pub(crate) fn probe_directory(
        &self,
        directory: &Path,
        reference: &AssemblyIdentity,
    ) -> Option<PathBuf> {
        if let Some(culture) = &reference.culture {
            let culture_dir = directory.join(culture);
            for name in Self::candidate_names(reference) {
                let candidate = culture_dir.join(&name);
                if self.file_service.exists(&candidate) {
                    return Some(candidate);
                }
            }
        }

        for name in Self::candidate_names(reference) {
            let candidate = directory.join(&name);
            if self.file_service.exists(&candidate) {
                return Some(candidate);
            }
        }

        None
    }

    /// Probe the whole search order for a candidate path
    #[must_use]
    pub fn probe(&self, reference: &AssemblyIdentity, origin: Option<&ModuleRc>) -> Option<PathBuf> {
        self.search_order(origin)
            .iter()
            .find_map(|directory| self.probe_directory(directory, reference))
    }

    /// Read a candidate file as a detached assembly; parse failures become
    /// [`ResolutionError::AssemblyBadImage`].
    pub(crate) fn read_candidate(&self, path: &Path) -> ResolutionResult<AssemblyRc> {
        let params = ModuleReadParameters {
            create_runtime_context: false,
            runtime_context: None,
            file_service: self.file_service.clone(),
        };

        self.reader
            .read_assembly(&AssemblySource::Path(path.to_path_buf()), &params)
            .map_err(|error| {
                ResolutionError::AssemblyBadImage(format!("{}: {}", path.display(), error))
            })
    }
}

impl AssemblyResolver for DirectoryProbingResolver {
    fn resolve(
        &self,
        reference: &AssemblyIdentity,
        origin: Option<&ModuleRc>,
    ) -> ResolutionResult<AssemblyRc> {
        match self.probe(reference, origin) {
            Some(path) => self.read_candidate(&path),
            None => Err(ResolutionError::AssemblyNotFound(
                reference.display_name(),
            )),
        }
    }
}
