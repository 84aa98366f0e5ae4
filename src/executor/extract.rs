//! Native archive extraction (no external tools needed).
//!
//! Entries that would land outside the destination (absolute paths, `..`,
//! writes through symlinks, links pointing out of the tree) are rejected.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use crate::core::output::{self, ProgressGuard};

use super::error::ExecuteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    TarBz2,
    TarZst,
    Tar,
    Zip,
}

impl ArchiveFormat {
    /// Detect archive format from filename extension
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
            Some(Self::TarZst)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Unpack `archive` into `dest` (recreated empty).
///
/// Returns the archive's single top-level directory when it has exactly one,
/// otherwise `dest` itself.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<PathBuf, ExecuteError> {
    let format = ArchiveFormat::detect(archive)
        .ok_or_else(|| ExecuteError::UnsupportedFormat(archive.to_path_buf()))?;

    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    std::fs::create_dir_all(dest)?;

    let filename = archive
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive".to_string());

    {
        let _guard = ProgressGuard::new(output::spinner(&format!("extracting {}", filename)));
        unpack(archive, dest, format).map_err(|message| ExecuteError::Archive {
            path: archive.to_path_buf(),
            message,
        })?;
    }

    let root = single_top_level_dir(dest)?.unwrap_or_else(|| dest.to_path_buf());
    output::detail(&format!("extracted {} to {}", filename, root.display()));
    Ok(root)
}

fn unpack(archive: &Path, dest: &Path, format: ArchiveFormat) -> Result<(), String> {
    let file =
        File::open(archive).map_err(|e| format!("cannot open {}: {}", archive.display(), e))?;
    let reader = BufReader::new(file);

    match format {
        ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(reader), dest),
        ArchiveFormat::TarXz => extract_tar(xz2::read::XzDecoder::new(reader), dest),
        ArchiveFormat::TarBz2 => extract_tar(bzip2::read::BzDecoder::new(reader), dest),
        ArchiveFormat::TarZst => {
            let decoder = zstd::stream::read::Decoder::new(reader)
                .map_err(|e| format!("zstd init error: {}", e))?;
            extract_tar(decoder, dest)
        }
        ArchiveFormat::Tar => extract_tar(reader, dest),
        ArchiveFormat::Zip => extract_zip(reader.into_inner(), dest),
    }
}

fn single_top_level_dir(dest: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = std::fs::read_dir(dest)?.collect::<Result<Vec<_>, _>>()?;
    if entries.len() != 1 {
        return Ok(None);
    }
    let entry = entries.remove(0);
    if entry.file_type()?.is_dir() {
        Ok(Some(entry.path()))
    } else {
        Ok(None)
    }
}

/// Lexically normalize a path (no filesystem access).
fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut has_root = false;

    for c in path.components() {
        match c {
            Component::Prefix(p) => {
                out.clear();
                out.push(p.as_os_str());
                has_root = true;
            }
            Component::RootDir => {
                out.push(Component::RootDir.as_os_str());
                has_root = true;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = out
                    .components()
                    .next_back()
                    .is_some_and(|last| matches!(last, Component::Normal(_)));
                if popped {
                    out.pop();
                } else if !has_root {
                    out.push("..");
                }
            }
            Component::Normal(seg) => out.push(seg),
        }
    }

    out
}

fn ensure_no_symlink_components(dest: &Path, full_path: &Path) -> Result<(), String> {
    let rel = full_path
        .strip_prefix(dest)
        .map_err(|_| format!("path outside destination: {}", full_path.display()))?;

    let mut cur = dest.to_path_buf();
    for comp in rel.components() {
        cur.push(comp);
        if let Ok(md) = std::fs::symlink_metadata(&cur)
            && md.file_type().is_symlink()
        {
            return Err(format!("symlink in path component: {}", cur.display()));
        }
    }

    Ok(())
}

fn ensure_link_target_within_dest(
    dest: &Path,
    base: &Path,
    link_name: &Path,
) -> Result<(), String> {
    if link_name.is_absolute()
        || link_name
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
    {
        return Err(format!(
            "unsafe link target (absolute): {}",
            link_name.display()
        ));
    }

    let candidate = normalize_lexical(&base.join(link_name));
    if candidate.strip_prefix(normalize_lexical(dest)).is_err() {
        return Err(format!(
            "unsafe link target (escapes destination): {}",
            link_name.display()
        ));
    }

    Ok(())
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<(), String> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);

    for entry in archive
        .entries()
        .map_err(|e| format!("tar read error: {}", e))?
    {
        let mut entry = entry.map_err(|e| format!("tar entry error: {}", e))?;
        let path = entry
            .path()
            .map_err(|e| format!("tar path error: {}", e))?
            .into_owned();

        if path.is_absolute() || path.components().any(|c| c == Component::ParentDir) {
            return Err(format!("unsafe path: {}", path.display()));
        }
        if path.as_os_str().is_empty() || path == Path::new(".") {
            continue;
        }

        let full_path = dest.join(&path);
        ensure_no_symlink_components(dest, &full_path)?;

        let entry_type = entry.header().entry_type();
        if entry_type == tar::EntryType::Symlink || entry_type == tar::EntryType::Link {
            let link_name = entry
                .link_name()
                .map_err(|e| format!("tar link_name error: {}", e))?
                .ok_or_else(|| format!("link without target: {}", path.display()))?;
            // Symlinks resolve from their parent; hard links from the archive root.
            let base = if entry_type == tar::EntryType::Symlink {
                full_path.parent().unwrap_or(dest).to_path_buf()
            } else {
                dest.to_path_buf()
            };
            ensure_link_target_within_dest(dest, &base, &link_name)?;
        }

        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create directory {}: {}", parent.display(), e))?;
        }

        entry
            .unpack(&full_path)
            .map_err(|e| format!("unpack error for {}: {}", path.display(), e))?;
    }

    Ok(())
}

fn extract_zip(file: File, dest: &Path) -> Result<(), String> {
    let mut archive = zip::ZipArchive::new(file).map_err(|e| format!("zip read error: {}", e))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| format!("zip entry error: {}", e))?;

        let outpath = match file.enclosed_name() {
            Some(path) => dest.join(path),
            None => return Err(format!("unsafe path: {}", file.name())),
        };

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(|e| format!("cannot create directory {}: {}", outpath.display(), e))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create directory {}: {}", parent.display(), e))?;
        }
        let mut outfile = File::create(&outpath)
            .map_err(|e| format!("cannot create {}: {}", outpath.display(), e))?;
        std::io::copy(&mut file, &mut outfile)
            .map_err(|e| format!("write error for {}: {}", outpath.display(), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))
                    .map_err(|e| format!("chmod failed for {}: {}", outpath.display(), e))?;
            }
        }
    }

    Ok(())
}
