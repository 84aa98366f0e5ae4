//! Shared fixtures for install tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};

/// A gzipped tarball shaped like a Python sdist: one top-level directory
/// holding `virtualenv.py`.
pub fn virtualenv_tarball() -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let body = b"print('virtualenv 15.0.3')\n";

    let mut header = tar::Header::new_gnu();
    header.set_size(body.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "virtualenv-15.0.3/virtualenv.py", &body[..])
        .unwrap();

    builder.into_inner().unwrap().finish().unwrap()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Source tree whose `install.sh` plays the role of `make install`:
/// it builds an "env" under the prefix from the unpacked resource.
pub fn write_source_tree(root: &Path, exit_code: i32) -> PathBuf {
    let src = root.join("foolscrate-src");
    std::fs::create_dir_all(&src).unwrap();
    let script = format!(
        r#"set -e
resource="$1"
env="$2"
mkdir -p "$env/bin"
cp "$resource/virtualenv.py" "$env/"
printf '#!/bin/sh\necho foolscrate\n' > "$env/bin/foolscrate"
chmod +x "$env/bin/foolscrate"
printf '#!/bin/sh\nexit 0\n' > "$env/bin/run_all_tests"
chmod +x "$env/bin/run_all_tests"
exit {}
"#,
        exit_code
    );
    std::fs::write(src.join("install.sh"), script).unwrap();
    src
}

/// Formula installing the tree from [`write_source_tree`] with one resource.
pub fn formula_toml(source: &Path, resource_url: &str, sha256: Option<&str>) -> String {
    let checksum = sha256
        .map(|s| format!("sha256 = \"{}\"\n", s))
        .unwrap_or_default();
    format!(
        r#"
name = "foolscrate"
version = "1.2"
desc = "Cross-platform git clone manager"

[source]
path = "{source}"

[[resource]]
name = "virtualenv"
url = "{resource_url}"
{checksum}
[build]
tool = "sh"
args = ["install.sh", "{{resource.virtualenv}}", "{{prefix}}/env"]

[[link]]
target = "env/bin/foolscrate"
link = "bin/foolscrate"

[test]
command = "{{prefix}}/env/bin/run_all_tests"
"#,
        source = source.display(),
    )
}

/// Relative paths and entry kinds under `root`, sorted.
pub fn layout(root: &Path) -> Vec<(PathBuf, &'static str)> {
    let mut entries: Vec<_> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap())
        .map(|e| {
            let kind = if e.path_is_symlink() {
                "link"
            } else if e.file_type().is_dir() {
                "dir"
            } else {
                "file"
            };
            (e.path().strip_prefix(root).unwrap().to_path_buf(), kind)
        })
        .collect();
    entries.sort();
    entries
}
