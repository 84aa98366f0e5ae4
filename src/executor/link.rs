//! Symlink creation from the installed tree into the public `bin` directory.

use std::path::{Component, Path, PathBuf};

use crate::core::output;

use super::error::ExecuteError;

/// Relative path from `from_dir` to `to`. Both must be relative to the same root.
fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from_dir
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let to_comps: Vec<Component> = to
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let common = from
        .iter()
        .zip(to_comps.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for comp in &to_comps[common..] {
        out.push(comp.as_os_str());
    }
    out
}

/// Link `<prefix>/<link>` to `<prefix>/<target>` using a relative link value
/// (e.g. `bin/foolscrate -> ../env/bin/foolscrate`).
///
/// The target must exist. An existing link with the same value is accepted.
pub fn create_symlink(prefix: &Path, target: &Path, link: &Path) -> Result<PathBuf, ExecuteError> {
    let target_abs = prefix.join(target);
    let link_abs = prefix.join(link);
    let fail = |reason: String| ExecuteError::Filesystem {
        link: link_abs.clone(),
        target: target_abs.clone(),
        reason,
    };

    if !target_abs.exists() {
        return Err(fail("target does not exist".to_string()));
    }

    let link_dir = link.parent().unwrap_or(Path::new(""));
    let value = relative_path(link_dir, target);

    if let Ok(md) = std::fs::symlink_metadata(&link_abs) {
        if md.file_type().is_symlink()
            && std::fs::read_link(&link_abs).is_ok_and(|existing| existing == value)
        {
            output::detail(&format!("{} already linked", link_abs.display()));
            return Ok(link_abs);
        }
        return Err(fail("link path already exists".to_string()));
    }

    std::fs::create_dir_all(prefix.join(link_dir)).map_err(|e| fail(e.to_string()))?;
    symlink(&value, &link_abs).map_err(|e| fail(e.to_string()))?;

    output::detail(&format!("ln -s {} {}", value.display(), link_abs.display()));
    Ok(link_abs)
}

#[cfg(unix)]
fn symlink(value: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(value, link)
}

#[cfg(not(unix))]
fn symlink(_value: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlinks not supported on this platform",
    ))
}
