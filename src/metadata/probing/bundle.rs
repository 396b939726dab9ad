//! Assembly resolver for single-file bundles.
//!
//! A single-file host embeds its dependencies in a file table; bundle parsing
//! itself is an external collaborator's job, so the resolver receives the table
//! as plain [`BundleFile`] entries. Matching is by file name without extension.
//! Dependencies that are not embedded (framework assemblies trimmed from the
//! bundle) fall back to the core-family resolver.

use std::sync::Arc;

use crate::{
    metadata::{
        identity::AssemblyIdentity,
        model::{AssemblyRc, ModuleRc},
        probing::{AssemblyResolver, CoreAssemblyResolver},
        reader::{AssemblySource, ModuleReadParameters},
    },
    ResolutionError, ResolutionResult,
};

/// One file embedded in a single-file bundle.
#[derive(Debug, Clone)]
pub struct BundleFile {
    /// Path of the file inside the bundle, e.g. `MyApp.dll`
    pub relative_path: String,
    /// The embedded bytes
    pub data: Arc<[u8]>,
}

impl BundleFile {
    /// Create an embedded file entry
    #[must_use]
    pub fn new(relative_path: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        BundleFile {
            relative_path: relative_path.into(),
            data: data.into(),
        }
    }

    /// The file name without directories and extension
    #[must_use]
    pub fn stem(&self) -> &str {
        let name = self
            .relative_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.relative_path);
        match name.rfind('.') {
            Some(dot) => &name[..dot],
            None => name,
        }
    }
}

/// Embedded-file-table resolver with a core-resolver fallback.
pub struct BundleAssemblyResolver {
    files: Vec<BundleFile>,
    fallback: CoreAssemblyResolver,
}

impl BundleAssemblyResolver {
    /// Create a resolver over a bundle's file table
    #[must_use]
    pub fn new(files: Vec<BundleFile>, fallback: CoreAssemblyResolver) -> Self {
        BundleAssemblyResolver { files, fallback }
    }

    /// The embedded file matching an identity, by extension-less file name
    fn find_embedded(&self, reference: &AssemblyIdentity) -> Option<&BundleFile> {
        self.files.iter().find(|file| file.stem() == reference.name)
    }
}

impl AssemblyResolver for BundleAssemblyResolver {
    fn resolve(
        &self,
        reference: &AssemblyIdentity,
        origin: Option<&ModuleRc>,
    ) -> ResolutionResult<AssemblyRc> {
        if let Some(embedded) = self.find_embedded(reference) {
            let params = ModuleReadParameters {
                create_runtime_context: false,
                runtime_context: None,
                file_service: self.fallback.directory().file_service().clone(),
            };

            return self
                .fallback
                .directory()
                .reader()
                .read_assembly(
                    &AssemblySource::Bytes {
                        name: embedded.relative_path.clone(),
                        data: embedded.data.clone(),
                    },
                    &params,
                )
                .map_err(|error| {
                    ResolutionError::AssemblyBadImage(format!(
                        "{}: {}",
                        embedded.relative_path, error
                    ))
                });
        }

        self.fallback.resolve(reference, origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_file_stem() {
        assert_eq!(BundleFile::new("MyApp.dll", Vec::<u8>::new()).stem(), "MyApp");
        assert_eq!(
            BundleFile::new("lib/netcoreapp3.1/Dep.dll", Vec::<u8>::new()).stem(),
            "Dep"
        );
        assert_eq!(BundleFile::new("NoExt", Vec::<u8>::new()).stem(), "NoExt");
    }
}
