//! Prefix lock
//!
//! Provides exclusive locking to prevent two installs writing into one prefix.

use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".formula.lock";

/// Acquire an exclusive lock on `prefix`, creating the prefix if needed.
/// Returns a guard that releases the lock when dropped.
pub fn acquire_prefix_lock(prefix: &Path) -> std::io::Result<PrefixLock> {
    std::fs::create_dir_all(prefix)?;
    let lock_path = prefix.join(LOCK_FILE);
    let lock_file = File::create(&lock_path)?;

    if lock_file.try_lock_exclusive().is_err() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::WouldBlock,
            format!(
                "prefix '{}' is locked by another install; if this is incorrect, delete '{}'",
                prefix.display(),
                lock_path.display()
            ),
        ));
    }

    Ok(PrefixLock {
        file: lock_file,
        path: lock_path,
    })
}

/// RAII guard for the prefix lock - unlocks and removes the lock file when dropped
#[derive(Debug)]
pub struct PrefixLock {
    file: File,
    path: PathBuf,
}

impl Drop for PrefixLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_acquired_and_released() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("pkg");

        {
            let _lock = acquire_prefix_lock(&prefix).unwrap();
            assert!(prefix.join(LOCK_FILE).exists());
        }

        assert!(!prefix.join(LOCK_FILE).exists());
    }

    #[test]
    fn test_concurrent_lock_blocked() {
        let dir = TempDir::new().unwrap();

        let _lock1 = acquire_prefix_lock(dir.path()).unwrap();
        let lock2 = acquire_prefix_lock(dir.path());
        assert!(lock2.is_err());
        assert!(lock2.unwrap_err().to_string().contains("locked by another install"));
    }
}
