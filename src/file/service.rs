//! Filesystem abstraction for assembly probing and reading.
//!
//! Assembly resolvers never touch `std::fs` directly; they consult a [`FileService`]
//! so callers can supply memory-backed, embedded or otherwise virtual sources. The
//! crate ships two implementations: [`PhysicalFileService`] over the real filesystem
//! and [`MemoryFileService`] for hermetic tests.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;

use crate::Result;

/// Opens files by path and returns their bytes.
///
/// Implementations must be shareable across resolver threads; resolution holds the
/// runtime-context lock while probing, so implementations should avoid blocking on
/// anything but the read itself.
pub trait FileService: Send + Sync {
    /// Returns true when a file exists at `path`
    fn exists(&self, path: &Path) -> bool;

    /// Read the full contents of the file at `path`
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] when the file cannot be opened or read
    fn read(&self, path: &Path) -> Result<Arc<[u8]>>;

    /// List the entries of the directory at `path`; missing or unreadable
    /// directories yield an empty list
    fn read_dir(&self, path: &Path) -> Vec<PathBuf>;
}

/// [`FileService`] over the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhysicalFileService;

impl FileService for PhysicalFileService {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> Result<Arc<[u8]>> {
        let bytes = fs::read(path)?;
        Ok(Arc::from(bytes.into_boxed_slice()))
    }

    fn read_dir(&self, path: &Path) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(path) else {
            return Vec::new();
        };

        entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .collect()
    }
}

/// In-memory [`FileService`] keyed by exact path.
///
/// Tests register byte images under arbitrary paths and point resolvers at them
/// without touching the disk.
#[derive(Debug, Default)]
pub struct MemoryFileService {
    files: DashMap<PathBuf, Arc<[u8]>>,
}

impl MemoryFileService {
    /// Create an empty in-memory file service
    #[must_use]
    pub fn new() -> Self {
        MemoryFileService::default()
    }

    /// Register `data` under `path`, replacing any previous content
    pub fn insert(&self, path: impl Into<PathBuf>, data: impl Into<Arc<[u8]>>) {
        self.files.insert(path.into(), data.into());
    }
}

impl FileService for MemoryFileService {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn read(&self, path: &Path) -> Result<Arc<[u8]>> {
        match self.files.get(path) {
            Some(entry) => Ok(entry.value().clone()),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
            .into()),
        }
    }

    fn read_dir(&self, path: &Path) -> Vec<PathBuf> {
        // Directories exist implicitly: every registered file contributes its
        // ancestor chain, and listing yields the immediate children only
        let mut entries: Vec<PathBuf> = Vec::new();
        for entry in self.files.iter() {
            let Ok(rest) = entry.key().strip_prefix(path) else {
                continue;
            };
            let Some(first) = rest.components().next() else {
                continue;
            };
            let child = path.join(first);
            if !entries.contains(&child) {
                entries.push(child);
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_service_round_trip() {
        let service = MemoryFileService::new();
        service.insert("/probe/Foo.dll", vec![1u8, 2, 3]);

        assert!(service.exists(Path::new("/probe/Foo.dll")));
        assert!(!service.exists(Path::new("/probe/Bar.dll")));
        assert_eq!(&*service.read(Path::new("/probe/Foo.dll")).unwrap(), &[1, 2, 3]);
        assert!(service.read(Path::new("/probe/Bar.dll")).is_err());
    }

    #[test]
    fn test_memory_service_read_dir() {
        let service = MemoryFileService::new();
        service.insert("/gac/Foo/Foo.dll", Vec::<u8>::new());
        service.insert("/gac/Bar/Bar.dll", Vec::<u8>::new());

        let entries = service.read_dir(Path::new("/gac/Foo"));
        assert_eq!(entries, vec![PathBuf::from("/gac/Foo/Foo.dll")]);
    }

    #[test]
    fn test_memory_service_read_dir_lists_implicit_directories() {
        let service = MemoryFileService::new();
        service.insert("/dotnet/shared/App/3.1.0/App.dll", Vec::<u8>::new());
        service.insert("/dotnet/shared/App/6.0.5/App.dll", Vec::<u8>::new());

        let mut entries = service.read_dir(Path::new("/dotnet/shared/App"));
        entries.sort();
        assert_eq!(
            entries,
            vec![
                PathBuf::from("/dotnet/shared/App/3.1.0"),
                PathBuf::from("/dotnet/shared/App/6.0.5"),
            ]
        );
    }
}
