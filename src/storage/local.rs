//! Local filesystem storage backend

use crate::storage::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

/// [`Storage`] on the local filesystem
///
/// Every write goes to its own `.<name>.XXXXXX.part` file next to the
/// destination and is then moved into place without replacing an existing
/// file, so concurrent writers of the same destination never share a
/// temporary file and exactly one of them wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> StorageResult<()> {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return Err(StorageError::InvalidPath(path.to_path_buf()));
        };

        let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: parent.clone(),
                source,
            })?;

        let destination = path.to_path_buf();
        let bytes = bytes.to_vec();
        let written = bytes.len();

        tokio::task::spawn_blocking(move || persist_new(&parent, &name, &destination, &bytes))
            .await
            .map_err(|e| StorageError::Write {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            })??;

        tracing::trace!("Wrote {} bytes to {}", written, path.display());
        Ok(())
    }
}

/// Writes `bytes` to a fresh temporary file in `parent` and links it to `destination`
///
/// The temporary file is removed on every failure path when it is dropped.
fn persist_new(parent: &Path, name: &str, destination: &Path, bytes: &[u8]) -> StorageResult<()> {
    let write_error = |source| StorageError::Write {
        path: destination.to_path_buf(),
        source,
    };

    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", name))
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(write_error)?;
    temp.write_all(bytes).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;

    match temp.persist_noclobber(destination) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(StorageError::AlreadyExists(destination.to_path_buf()))
        }
        Err(e) => Err(StorageError::Rename {
            from: e.file.path().to_path_buf(),
            source: e.error,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftovers(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".part"))
            .collect()
    }

    #[tokio::test]
    async fn test_write_atomic_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("video").join("clip.mp4");
        let storage = LocalStorage::new();

        assert!(!storage.exists(&path).await);
        storage.write_atomic(&path, b"bytes").await.unwrap();

        assert!(storage.exists(&path).await);
        assert!(leftovers(&dir.path().join("video")).is_empty());
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn test_existing_file_is_never_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("A.png");
        let storage = LocalStorage::new();

        storage.write_atomic(&path, b"old").await.unwrap();
        let second = storage.write_atomic(&path, b"new").await;

        assert!(matches!(second, Err(StorageError::AlreadyExists(_))));
        assert_eq!(std::fs::read(&path).unwrap(), b"old");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writers_of_one_destination() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("X.jpg");

        let writers: Vec<_> = (0..8u8)
            .map(|i| {
                let path = path.clone();
                tokio::spawn(async move {
                    LocalStorage::new()
                        .write_atomic(&path, &vec![i; 4096])
                        .await
                })
            })
            .collect();

        let mut written = 0;
        for writer in writers {
            match writer.await.unwrap() {
                Ok(()) => written += 1,
                Err(StorageError::AlreadyExists(_)) => {}
                Err(e) => panic!("unexpected storage error: {}", e),
            }
        }

        assert_eq!(written, 1);
        let content = std::fs::read(&path).unwrap();
        assert_eq!(content.len(), 4096);
        assert!(content.iter().all(|b| *b == content[0]));
        assert!(leftovers(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_part_file_does_not_count_as_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("A.png");
        std::fs::write(dir.path().join(".A.png.abc123.part"), b"partial").unwrap();

        assert!(!LocalStorage::new().exists(&path).await);
    }

    #[tokio::test]
    async fn test_directory_is_not_a_file() {
        let dir = TempDir::new().unwrap();
        assert!(!LocalStorage::new().exists(dir.path()).await);
    }

    #[tokio::test]
    async fn test_write_under_a_file_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let result = LocalStorage::new()
            .write_atomic(&blocker.join("A.png"), b"bytes")
            .await;
        assert!(matches!(result, Err(StorageError::CreateDir { .. })));
    }
}
