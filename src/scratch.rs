//! Scratch file lifecycle
//!
//! A [`ScratchFile`] lives for exactly one processing call. It is removed when
//! released or, on early returns, when the guard is dropped.

use crate::Result;
use chrono::Utc;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    released: bool,
}

impl ScratchFile {
    /// Create an empty `{unix_seconds}_{basename}` file inside `dir`.
    ///
    /// When another call already holds that name, a counter is inserted
    /// (`{unix_seconds}_{n}_{basename}`) until a free name is found.
    pub async fn acquire(dir: &Path, name_hint: &str) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let timestamp = Utc::now().timestamp();
        let mut attempt = 0;
        loop {
            let path = dir.join(scratch_name(timestamp, attempt, name_hint));
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => {
                    tracing::debug!("Created scratch file {}", path.display());
                    return Ok(Self {
                        path,
                        released: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now. Failures are logged, never returned.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed scratch file {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove scratch file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        self.remove();
    }
}

const MAX_NAME_ATTEMPTS: u32 = 1000;

fn scratch_name(timestamp: i64, attempt: u32, name_hint: &str) -> String {
    let base = name_hint
        .rsplit(['/', '\\'])
        .next()
        .filter(|b| !b.is_empty() && *b != "." && *b != "..")
        .unwrap_or("asset");
    if attempt == 0 {
        format!("{}_{}", timestamp, base)
    } else {
        format!("{}_{}_{}", timestamp, attempt, base)
    }
}

/// Replace `destination` with `data` in one rename.
pub async fn write_atomic(destination: &Path, data: &[u8]) -> Result<()> {
    let destination = destination.to_path_buf();
    let data = data.to_vec();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = NamedTempFile::new_in(&parent)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&destination).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| std::io::Error::other(format!("Atomic write task join error: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scratch_name_uses_basename() {
        assert_eq!(scratch_name(1700000000, 0, "photo.png"), "1700000000_photo.png");
        assert_eq!(
            scratch_name(42, 0, "https://cdn.example.com/a/b/photo.jpg"),
            "42_photo.jpg"
        );
        assert_eq!(scratch_name(42, 0, "dir/"), "42_asset");
        assert_eq!(scratch_name(42, 0, ".."), "42_asset");
        assert_eq!(scratch_name(42, 3, "a/photo.jpg"), "42_3_photo.jpg");
    }

    #[tokio::test]
    async fn test_acquire_same_basename_twice_gets_distinct_files() {
        let dir = TempDir::new().unwrap();

        let first = ScratchFile::acquire(dir.path(), "a/photo.jpg").await.unwrap();
        let second = ScratchFile::acquire(dir.path(), "b/photo.jpg").await.unwrap();

        assert_ne!(first.path(), second.path());
        assert!(first.path().exists());
        assert!(second.path().exists());
        assert!(second
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_photo.jpg"));

        first.release();
        assert!(second.path().exists());
        second.release();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_acquire_creates_and_release_removes() {
        let dir = TempDir::new().unwrap();

        let scratch = ScratchFile::acquire(dir.path(), "photo.png").await.unwrap();
        let path = scratch.path().to_path_buf();

        assert!(path.exists());
        assert!(path.starts_with(dir.path()));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_photo.png"));

        scratch.release();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_on_early_return() {
        let dir = TempDir::new().unwrap();

        async fn failing_step(dir: &Path) -> Result<PathBuf> {
            let scratch = ScratchFile::acquire(dir, "photo.jpg").await?;
            std::fs::write(scratch.path(), b"partial")?;
            let path = scratch.path().to_path_buf();
            Err(crate::Error::Storage(format!("upload of {} failed", path.display())))
        }

        assert!(failing_step(dir.path()).await.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_acquire_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("typo3temp");

        let scratch = ScratchFile::acquire(&nested, "a.png").await.unwrap();
        assert!(nested.is_dir());
        assert!(scratch.path().exists());
    }

    #[tokio::test]
    async fn test_release_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        let scratch = ScratchFile::acquire(dir.path(), "a.png").await.unwrap();
        std::fs::remove_file(scratch.path()).unwrap();

        scratch.release();
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("image.png");
        std::fs::write(&file, b"old content that is longer").unwrap();

        write_atomic(&file, b"new").await.unwrap();

        assert_eq!(std::fs::read(&file).unwrap(), b"new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
