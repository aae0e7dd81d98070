//! Sources of raw class images.
//!
//! A [`ClassPath`] maps a qualified class name to the bytes of its image. The
//! [`crate::pool::TypePool`] and the reference [`crate::runtime::Vm`] both consult an
//! ordered list of sources and take the first hit.

use std::{
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use dashmap::DashMap;

use crate::{classfile::ClassDef, Result};

/// File extension of class images in a [`DirClassPath`]
pub const CLASS_FILE_EXTENSION: &str = "tpc";

/// A source of class images, looked up by qualified (dotted) name.
pub trait ClassPath: Send + Sync + fmt::Debug {
    /// Returns the image of `name`, or `None` if this source does not provide it.
    ///
    /// # Errors
    /// Returns an error if the source exists but cannot be read.
    fn find(&self, name: &str) -> Result<Option<Vec<u8>>>;
}

/// Class images held in memory
#[derive(Debug, Default)]
pub struct MemoryClassPath {
    images: DashMap<String, Vec<u8>>,
}

impl MemoryClassPath {
    /// Creates an empty source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the image of `name`
    pub fn add(&self, name: impl Into<String>, image: Vec<u8>) {
        self.images.insert(name.into(), image);
    }

    /// Encodes `class` and adds it under its own name.
    ///
    /// # Errors
    /// Returns an error if the class cannot be encoded.
    pub fn add_class(&self, class: &ClassDef) -> Result<()> {
        self.add(class.name.clone(), class.to_bytes()?);
        Ok(())
    }

    /// Number of images held
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Returns `true` if no image is held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl ClassPath for MemoryClassPath {
    fn find(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.images.get(name).map(|image| image.value().clone()))
    }
}

/// Class images stored as files below a root directory.
///
/// `pkg.sub.Counter` is read from `<root>/pkg/sub/Counter.tpc`.
#[derive(Debug, Clone)]
pub struct DirClassPath {
    root: PathBuf,
}

impl DirClassPath {
    /// Creates a source rooted at `root`; the directory does not need to exist yet
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirClassPath { root: root.into() }
    }

    /// The root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path at which the image of `name` is expected
    #[must_use]
    pub fn path_of(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(name.split('.'));
        path.set_extension(CLASS_FILE_EXTENSION);
        path
    }

    /// Encodes `class` and writes it to its expected path, creating directories as needed.
    ///
    /// # Errors
    /// Returns an error if the class cannot be encoded or the file cannot be written.
    pub fn store(&self, class: &ClassDef) -> Result<PathBuf> {
        let path = self.path_of(&class.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, class.to_bytes()?)?;
        Ok(path)
    }
}

impl ClassPath for DirClassPath {
    fn find(&self, name: &str) -> Result<Option<Vec<u8>>> {
        if name
            .split('.')
            .any(|segment| segment.is_empty() || segment.contains(['/', '\\']))
        {
            return Ok(None);
        }

        match std::fs::read(self.path_of(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::factories::counter_class;

    #[test]
    fn memory_lookup() {
        let source = MemoryClassPath::new();
        assert!(source.is_empty());

        source.add_class(&counter_class()).unwrap();
        assert_eq!(source.len(), 1);
        assert!(source.find("pkg.Counter").unwrap().is_some());
        assert!(source.find("pkg.Missing").unwrap().is_none());
    }

    #[test]
    fn directory_layout() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirClassPath::new(dir.path());

        let path = source.store(&counter_class()).unwrap();
        assert_eq!(path, dir.path().join("pkg").join("Counter.tpc"));

        let bytes = source.find("pkg.Counter").unwrap().unwrap();
        assert_eq!(ClassDef::from_bytes(&bytes).unwrap(), counter_class());
        assert!(source.find("pkg.Other").unwrap().is_none());
        assert!(source.find("..pkg").unwrap().is_none());
    }
}
