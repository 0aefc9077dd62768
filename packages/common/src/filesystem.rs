use crate::error::CommonError;
use crate::result::CommonResult;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// File system abstraction for reading pattern sources and resolving
/// relative file references (images, paths)
pub trait FileSystem {
    /// Check if a file exists
    fn exists(&self, path: &Path) -> bool;

    /// Canonicalize a path (resolve symlinks, make absolute)
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, std::io::Error>;

    fn read_to_string(&self, path: &Path) -> CommonResult<String>;

    /// Resolves `reference` against `base_dir`. Absolute references are
    /// returned unchanged.
    fn resolve(&self, base_dir: Option<&Path>, reference: &Path) -> PathBuf {
        if reference.is_absolute() {
            return reference.to_path_buf();
        }
        match base_dir {
            Some(dir) => normalize(&dir.join(reference)),
            None => normalize(reference),
        }
    }
}

/// Removes `.` and folds `..` without touching the disk.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Real file system implementation
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, std::io::Error> {
        std::fs::canonicalize(path)
    }

    fn read_to_string(&self, path: &Path) -> CommonResult<String> {
        std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CommonError::NotFound(path.to_path_buf()),
            _ => CommonError::Io(e),
        })
    }
}

/// Mock file system for testing
#[derive(Debug, Default)]
pub struct MockFileSystem {
    pub files: HashMap<PathBuf, String>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, std::io::Error> {
        // For mock, just return the path as-is
        Ok(path.to_path_buf())
    }

    fn read_to_string(&self, path: &Path) -> CommonResult<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| CommonError::NotFound(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_read() {
        let mut fs = MockFileSystem::new();
        fs.add_file("/p/button.stencil", "<pattern/>");
        assert!(fs.exists(Path::new("/p/button.stencil")));
        assert_eq!(
            fs.read_to_string(Path::new("/p/button.stencil")).unwrap(),
            "<pattern/>"
        );
        assert!(matches!(
            fs.read_to_string(Path::new("/p/missing.stencil")),
            Err(CommonError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve() {
        let fs = MockFileSystem::new();
        assert_eq!(
            fs.resolve(Some(Path::new("/p/icons")), Path::new("../img/./a.png")),
            PathBuf::from("/p/img/a.png")
        );
        assert_eq!(
            fs.resolve(Some(Path::new("/p")), Path::new("/abs/a.png")),
            PathBuf::from("/abs/a.png")
        );
        assert_eq!(
            fs.resolve(None, Path::new("../a.png")),
            PathBuf::from("../a.png")
        );
    }
}
