//! Formula definition - the declarative package metadata a run is driven by.
//!
//! A formula is a TOML document:
//!
//! ```toml
//! name = "foolscrate"
//! version = "1.2"
//! depends_on = ["python3"]
//!
//! [source]
//! url = "https://github.com/alanfranz/foolscrate.git"
//! revision = "c9ed0803a3b71df3caff7b10da19c45fb27df114"
//!
//! [[resource]]
//! name = "virtualenv"
//! url = "https://example.org/virtualenv-15.0.3.tar.gz"
//!
//! [build]
//! interpreter = "python3"
//! tool = "make"
//! args = ["install", "VIRTUALENV={resource.virtualenv}/virtualenv.py -p {interpreter}", "PREFIX={prefix}/env"]
//!
//! [[link]]
//! target = "env/bin/foolscrate"
//! link = "bin/foolscrate"
//!
//! [test]
//! command = "{prefix}/env/bin/run_all_tests"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormulaError {
    #[error("cannot read formula {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid formula syntax: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid source: {0}")]
    InvalidSource(String),
    #[error("invalid package name '{0}': must be a single path component")]
    InvalidName(String),
    #[error("duplicate resource name: {0}")]
    DuplicateResource(String),
    #[error("invalid sha256 for resource '{name}': {value}")]
    InvalidChecksum { name: String, value: String },
    #[error("unsafe link path (absolute or contains ..): {0}")]
    UnsafeLink(String),
    #[error("formula has no head source")]
    NoHead,
}

/// Immutable package metadata plus the declarative install procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Formula {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    /// Runtime dependency names (informational; resolved by the host package manager)
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub source: Source,
    /// Development head, used by `install --head`
    #[serde(default)]
    pub head: Option<Source>,
    #[serde(default, rename = "resource")]
    pub resources: Vec<Resource>,
    pub build: BuildSpec,
    #[serde(default, rename = "link")]
    pub links: Vec<LinkSpec>,
    #[serde(default)]
    pub test: Option<TestSpec>,
}

/// Where the primary source comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SourceToml", into = "SourceToml")]
pub enum Source {
    Git { url: String, reference: GitRef },
    Local { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRef {
    /// Pinned commit hash
    Revision(String),
    Branch(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceToml {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
}

impl TryFrom<SourceToml> for Source {
    type Error = FormulaError;

    fn try_from(raw: SourceToml) -> Result<Self, Self::Error> {
        match (raw.url, raw.revision, raw.branch, raw.path) {
            (Some(url), Some(rev), None, None) => Ok(Source::Git {
                url,
                reference: GitRef::Revision(rev),
            }),
            (Some(url), None, Some(branch), None) => Ok(Source::Git {
                url,
                reference: GitRef::Branch(branch),
            }),
            (None, None, None, Some(path)) => Ok(Source::Local { path }),
            (Some(_), None, None, None) => Err(FormulaError::InvalidSource(
                "git source needs a revision or a branch".to_string(),
            )),
            _ => Err(FormulaError::InvalidSource(
                "expected url + (revision | branch), or path".to_string(),
            )),
        }
    }
}

impl From<Source> for SourceToml {
    fn from(source: Source) -> Self {
        match source {
            Source::Git { url, reference } => {
                let (revision, branch) = match reference {
                    GitRef::Revision(r) => (Some(r), None),
                    GitRef::Branch(b) => (None, Some(b)),
                };
                SourceToml {
                    url: Some(url),
                    revision,
                    branch,
                    path: None,
                }
            }
            Source::Local { path } => SourceToml {
                path: Some(path),
                ..Default::default()
            },
        }
    }
}

impl Source {
    /// Short human description, e.g. "https://x/y.git @ c9ed080".
    pub fn describe(&self) -> String {
        match self {
            Source::Git {
                url,
                reference: GitRef::Revision(rev),
            } => format!("{} @ {}", url, rev.chars().take(7).collect::<String>()),
            Source::Git {
                url,
                reference: GitRef::Branch(branch),
            } => format!("{} ({})", url, branch),
            Source::Local { path } => path.display().to_string(),
        }
    }
}

/// A pinned dependency archive fetched and unpacked before the build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resource {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSpec {
    /// Interpreter name looked up under `<host_prefix>/bin`
    #[serde(default)]
    pub interpreter: Option<String>,
    pub tool: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// A symlink created inside the prefix. Both paths are relative to the prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkSpec {
    pub target: PathBuf,
    pub link: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl std::str::FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let formula: Formula = toml::from_str(s)?;
        formula.validate()?;
        Ok(formula)
    }
}

impl Formula {
    /// Load a formula file. Local source paths are resolved against the
    /// directory containing the file.
    pub fn load(path: &Path) -> Result<Self, FormulaError> {
        let content = std::fs::read_to_string(path).map_err(|source| FormulaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut formula: Formula = content.parse()?;

        let base = path.parent().unwrap_or(Path::new("."));
        formula.source = formula.source.rebase(base);
        formula.head = formula.head.map(|h| h.rebase(base));
        Ok(formula)
    }

    /// Switch to the head source. The version becomes "HEAD".
    pub fn into_head(mut self) -> Result<Self, FormulaError> {
        let head = self.head.take().ok_or(FormulaError::NoHead)?;
        self.source = head;
        self.version = "HEAD".to_string();
        Ok(self)
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    fn validate(&self) -> Result<(), FormulaError> {
        if self.name.trim().is_empty() {
            return Err(FormulaError::MissingField("name"));
        }
        if self.version.trim().is_empty() {
            return Err(FormulaError::MissingField("version"));
        }
        let mut comps = Path::new(&self.name).components();
        if !matches!(
            (comps.next(), comps.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(FormulaError::InvalidName(self.name.clone()));
        }
        if self.build.tool.trim().is_empty() {
            return Err(FormulaError::MissingField("build.tool"));
        }

        let mut seen = HashSet::new();
        for resource in &self.resources {
            if !seen.insert(resource.name.as_str()) {
                return Err(FormulaError::DuplicateResource(resource.name.clone()));
            }
            if let Some(sum) = &resource.sha256
                && (sum.len() != 64 || !sum.chars().all(|c| c.is_ascii_hexdigit()))
            {
                return Err(FormulaError::InvalidChecksum {
                    name: resource.name.clone(),
                    value: sum.clone(),
                });
            }
        }

        for link in &self.links {
            for p in [&link.target, &link.link] {
                if !is_safe_relative(p) {
                    return Err(FormulaError::UnsafeLink(p.display().to_string()));
                }
            }
        }

        Ok(())
    }
}

impl Source {
    fn rebase(self, base: &Path) -> Self {
        match self {
            Source::Local { path } if path.is_relative() => Source::Local {
                path: base.join(path),
            },
            other => other,
        }
    }
}

/// Relative, non-empty, and free of `..`.
pub(crate) fn is_safe_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOOLSCRATE: &str = r#"
name = "foolscrate"
version = "1.2"
depends_on = ["python3"]

[source]
url = "https://github.com/alanfranz/foolscrate.git"
revision = "c9ed0803a3b71df3caff7b10da19c45fb27df114"

[head]
url = "https://github.com/alanfranz/foolscrate.git"
branch = "v1dev"

[[resource]]
name = "virtualenv"
url = "https://example.org/virtualenv-15.0.3.tar.gz"

[build]
interpreter = "python3"
tool = "make"
args = ["install", "VIRTUALENV={resource.virtualenv}/virtualenv.py -p {interpreter}", "PREFIX={prefix}/env"]

[[link]]
target = "env/bin/foolscrate"
link = "bin/foolscrate"

[test]
command = "{prefix}/env/bin/run_all_tests"
"#;

    fn with(extra: &str) -> String {
        format!(
            "name = \"x\"\nversion = \"1\"\n[source]\npath = \"src\"\n[build]\ntool = \"make\"\n{}",
            extra
        )
    }

    #[test]
    fn test_parse_full_formula() {
        let f: Formula = FOOLSCRATE.parse().unwrap();
        assert_eq!(f.name, "foolscrate");
        assert_eq!(f.version, "1.2");
        assert_eq!(f.depends_on, vec!["python3"]);
        assert_eq!(
            f.source,
            Source::Git {
                url: "https://github.com/alanfranz/foolscrate.git".into(),
                reference: GitRef::Revision("c9ed0803a3b71df3caff7b10da19c45fb27df114".into()),
            }
        );
        assert_eq!(f.build.args.len(), 3);
        assert_eq!(f.links[0].link, PathBuf::from("bin/foolscrate"));
        assert!(f.resource("virtualenv").is_some());
        assert!(f.test.is_some());
    }

    #[test]
    fn test_into_head_switches_source_and_version() {
        let f: Formula = FOOLSCRATE.parse().unwrap();
        let head = f.into_head().unwrap();
        assert_eq!(head.version, "HEAD");
        assert!(matches!(
            head.source,
            Source::Git { reference: GitRef::Branch(ref b), .. } if b == "v1dev"
        ));
    }

    #[test]
    fn test_into_head_without_head_fails() {
        let f: Formula = with("").parse().unwrap();
        assert!(matches!(f.into_head(), Err(FormulaError::NoHead)));
    }

    #[test]
    fn test_source_requires_reference() {
        let err = "name = \"x\"\nversion = \"1\"\n[source]\nurl = \"https://a/b.git\"\n[build]\ntool = \"make\"\n"
            .parse::<Formula>()
            .unwrap_err();
        assert!(err.to_string().contains("revision or a branch"));
    }

    #[test]
    fn test_source_rejects_revision_and_branch() {
        let err = "name = \"x\"\nversion = \"1\"\n[source]\nurl = \"u\"\nrevision = \"a\"\nbranch = \"b\"\n[build]\ntool = \"make\"\n"
            .parse::<Formula>()
            .unwrap_err();
        assert!(err.to_string().contains("expected url"));
    }

    #[test]
    fn test_empty_version_rejected() {
        let err = "name = \"x\"\nversion = \"\"\n[source]\npath = \"s\"\n[build]\ntool = \"make\"\n"
            .parse::<Formula>()
            .unwrap_err();
        assert!(matches!(err, FormulaError::MissingField("version")));
    }

    #[test]
    fn test_name_with_separator_rejected() {
        let err = "name = \"../evil\"\nversion = \"1\"\n[source]\npath = \"s\"\n[build]\ntool = \"make\"\n"
            .parse::<Formula>()
            .unwrap_err();
        assert!(matches!(err, FormulaError::InvalidName(_)));
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let src = with(
            "[[resource]]\nname = \"a\"\nurl = \"u1\"\n[[resource]]\nname = \"a\"\nurl = \"u2\"\n",
        );
        assert!(matches!(
            src.parse::<Formula>(),
            Err(FormulaError::DuplicateResource(_))
        ));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let src = with("[[resource]]\nname = \"a\"\nurl = \"u\"\nsha256 = \"nothex\"\n");
        assert!(matches!(
            src.parse::<Formula>(),
            Err(FormulaError::InvalidChecksum { .. })
        ));
    }

    #[test]
    fn test_escaping_link_rejected() {
        let src = with("[[link]]\ntarget = \"env/bin/x\"\nlink = \"../outside\"\n");
        assert!(matches!(
            src.parse::<Formula>(),
            Err(FormulaError::UnsafeLink(_))
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let src = with("bogus = 1\n");
        assert!(matches!(src.parse::<Formula>(), Err(FormulaError::Parse(_))));
    }

    #[test]
    fn test_load_rebases_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.toml");
        std::fs::write(&file, with("")).unwrap();

        let f = Formula::load(&file).unwrap();
        assert_eq!(
            f.source,
            Source::Local {
                path: dir.path().join("src")
            }
        );
    }

    #[test]
    fn test_describe_short_revision() {
        let f: Formula = FOOLSCRATE.parse().unwrap();
        assert_eq!(
            f.source.describe(),
            "https://github.com/alanfranz/foolscrate.git @ c9ed080"
        );
    }
}
