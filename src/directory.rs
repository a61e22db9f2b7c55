//! Idempotent output directory management.
//!
//! Many workers create sibling concept directories under the same category
//! concurrently, so creation is create-if-absent: a directory that already
//! exists (or that another worker created a moment earlier) is success.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument};

/// Genuine filesystem failures while preparing or inspecting a task directory.
#[derive(Debug, Error)]
pub enum FilesystemError {
    /// Creating the directory (or one of its parents) failed.
    #[error("failed to create directory {path}: {source}")]
    Create {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Something other than a directory already occupies the path.
    #[error("{path} exists but is not a directory")]
    NotADirectory {
        /// The occupied path.
        path: PathBuf,
    },

    /// Reading the directory's metadata or entries failed.
    #[error("failed to inspect {path}: {source}")]
    Inspect {
        /// The directory being inspected.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Creates and inspects task output directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryManager;

impl DirectoryManager {
    /// Creates a manager.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Ensures `path` and all of its parents exist, returning the absolute path.
    ///
    /// Calling this repeatedly, or from several tasks at once for the same or
    /// overlapping paths, always succeeds once the directory exists.
    ///
    /// # Errors
    ///
    /// Returns [`FilesystemError::NotADirectory`] when a file occupies the path,
    /// and [`FilesystemError::Create`] for other IO failures (permissions,
    /// disk full).
    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    pub async fn ensure(&self, path: &Path) -> Result<PathBuf, FilesystemError> {
        if let Err(source) = tokio::fs::create_dir_all(path).await {
            match tokio::fs::metadata(path).await {
                // Lost a race with another creator; the directory is there.
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    return Err(FilesystemError::NotADirectory {
                        path: path.to_path_buf(),
                    });
                }
                Err(_) => {
                    return Err(FilesystemError::Create {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
        }

        debug!("directory ready");
        absolute(path)
    }

    /// Returns true when `path` is a directory holding at least one visible file.
    ///
    /// A missing directory is simply not populated. Hidden entries (leading `.`)
    /// and subdirectories do not count.
    ///
    /// # Errors
    ///
    /// Returns [`FilesystemError::NotADirectory`] when a file occupies the path
    /// and [`FilesystemError::Inspect`] when the directory cannot be read.
    pub async fn is_populated(&self, path: &Path) -> Result<bool, FilesystemError> {
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(source) => {
                return Err(match tokio::fs::metadata(path).await {
                    Ok(meta) if !meta.is_dir() => FilesystemError::NotADirectory {
                        path: path.to_path_buf(),
                    },
                    _ => FilesystemError::Inspect {
                        path: path.to_path_buf(),
                        source,
                    },
                });
            }
        };

        let inspect_error = |source| FilesystemError::Inspect {
            path: path.to_path_buf(),
            source,
        };
        while let Some(entry) = entries.next_entry().await.map_err(inspect_error)? {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            if entry.file_type().await.map_err(inspect_error)?.is_file() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn absolute(path: &Path) -> Result<PathBuf, FilesystemError> {
    std::path::absolute(path).map_err(|source| FilesystemError::Inspect {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_ensure_creates_nested_path_and_returns_absolute() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("cat").join("concept");

        let resolved = DirectoryManager::new().ensure(&target).await.unwrap();

        assert!(resolved.is_absolute());
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn test_ensure_twice_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("C").join("c1");
        let manager = DirectoryManager::new();

        let first = manager.ensure(&target).await.unwrap();
        let second = manager.ensure(&target).await.unwrap();

        assert_eq!(first, second);
        let entries: Vec<_> = std::fs::read_dir(temp.path().join("C"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1, "path must exist exactly once");
    }

    #[tokio::test]
    async fn test_ensure_tolerates_concurrent_overlapping_creation() {
        let temp = TempDir::new().unwrap();
        let root = Arc::new(temp.path().to_path_buf());
        let mut handles = Vec::new();

        for i in 0..32 {
            let root = Arc::clone(&root);
            handles.push(tokio::spawn(async move {
                let path = root.join("shared").join(format!("concept_{}", i % 4));
                DirectoryManager::new().ensure(&path).await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(std::fs::read_dir(root.join("shared")).unwrap().count(), 4);
    }

    #[tokio::test]
    async fn test_ensure_reports_file_in_the_way() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("C");
        std::fs::write(&blocker, b"not a dir").unwrap();

        let error = DirectoryManager::new()
            .ensure(&blocker.join("c1"))
            .await
            .unwrap_err();

        assert!(
            matches!(
                error,
                FilesystemError::Create { .. } | FilesystemError::NotADirectory { .. }
            ),
            "unexpected error: {error:?}"
        );
    }

    #[tokio::test]
    async fn test_is_populated_missing_and_empty_are_false() {
        let temp = TempDir::new().unwrap();
        let manager = DirectoryManager::new();

        assert!(!manager.is_populated(&temp.path().join("missing")).await.unwrap());

        let empty = temp.path().join("empty");
        std::fs::create_dir(&empty).unwrap();
        assert!(!manager.is_populated(&empty).await.unwrap());
    }

    #[tokio::test]
    async fn test_is_populated_ignores_hidden_files_and_subdirs() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("concept");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join(".DS_Store"), b"x").unwrap();
        let manager = DirectoryManager::new();

        assert!(!manager.is_populated(&dir).await.unwrap());

        std::fs::write(dir.join("concept_1.jpg"), b"jpeg").unwrap();
        assert!(manager.is_populated(&dir).await.unwrap());
    }
}
