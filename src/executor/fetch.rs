//! Dependency archive download and integrity verification.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::ProgressBar;

use crate::core::hash::{self, HashAlgorithm};
use crate::core::output::{self, ProgressGuard};

use super::error::ExecuteError;

/// Extract filename from a URL.
pub fn url_filename(url: &str) -> String {
    let name = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("");
    if name.is_empty() || name.contains(':') {
        "download".to_string()
    } else {
        name.to_string()
    }
}

/// Download `url` into `dest_dir`, returning the local path.
///
/// The body is streamed into a temporary `.part` file in `dest_dir`, which is
/// renamed into place only after the transfer completed. A failed transfer
/// removes it.
pub fn fetch_dependency_archive(
    url: &str,
    dest_dir: &Path,
    timeout: Duration,
) -> Result<PathBuf, ExecuteError> {
    std::fs::create_dir_all(dest_dir)?;
    let filename = url_filename(url);
    let dest = dest_dir.join(&filename);

    let response = ureq::get(url)
        .timeout(timeout)
        .call()
        .map_err(|e| match e {
            ureq::Error::Status(status, _) => ExecuteError::HttpStatus {
                url: url.to_string(),
                status,
            },
            ureq::Error::Transport(t) => ExecuteError::Network {
                url: url.to_string(),
                message: t.to_string(),
            },
        })?;

    let guard = ProgressGuard::new(output::spinner(&format!("downloading {}", filename)));
    if let Some(len) = response
        .header("content-length")
        .and_then(|s| s.parse().ok())
    {
        output::upgrade_to_bytes(guard.bar(), len);
    }

    let mut reader = response.into_reader();
    let total_bytes = stream_to_file(&mut reader, url, &dest, guard.bar())?;
    drop(guard);

    output::detail(&format!("downloaded {} ({} bytes)", filename, total_bytes));
    Ok(dest)
}

/// Copy `reader` into `dest` through a sibling temp file. Returns the byte count.
fn stream_to_file(
    reader: &mut impl Read,
    url: &str,
    dest: &Path,
    bar: &ProgressBar,
) -> Result<u64, ExecuteError> {
    let dir = dest.parent().unwrap_or(Path::new("."));
    let prefix = format!(
        "{}.",
        dest.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
    );
    let mut part = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".part")
        .tempfile_in(dir)?;

    let mut buffer = [0u8; 8192];
    let mut total_bytes = 0u64;
    loop {
        let n = reader.read(&mut buffer).map_err(|e| ExecuteError::Network {
            url: url.to_string(),
            message: format!("read error: {}", e),
        })?;
        if n == 0 {
            break;
        }
        part.write_all(&buffer[..n])?;
        total_bytes += n as u64;
        bar.set_position(total_bytes);
    }
    part.as_file().sync_all()?;
    part.persist(dest).map_err(|e| e.error)?;
    Ok(total_bytes)
}

/// Compare a file's sha256 against `expected` (case-insensitive).
pub fn verify_sha256(path: &Path, expected: &str) -> Result<(), ExecuteError> {
    let actual = hash::file_digest(path, HashAlgorithm::Sha256)?;
    let expected = expected.to_lowercase();
    if actual != expected {
        return Err(ExecuteError::Integrity {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    output::detail(&format!("sha256 ok for {}", path.display()));
    Ok(())
}
