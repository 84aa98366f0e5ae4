//! Placeholder expansion for build arguments, environment values, and the test command.
//!
//! Each argument is expanded on its own; the result is never re-split or
//! handed to a shell. `{{` and `}}` produce literal braces.
//!
//! Known placeholders: `{prefix}`, `{work_dir}`, `{source_dir}`,
//! `{interpreter}`, `{jobs}`, `{name}`, `{version}`, `{resource.<name>}`.

use std::collections::BTreeMap;

use super::error::ExecuteError;

/// Keys available to build arguments and environment values. `resource.<name>`
/// is accepted on top of these.
pub const BUILD_KEYS: &[&str] = &[
    "prefix",
    "work_dir",
    "source_dir",
    "interpreter",
    "jobs",
    "name",
    "version",
];

/// Keys available to the self-test, which runs without a checkout or resources.
pub const TEST_KEYS: &[&str] = &["prefix", "work_dir", "interpreter", "jobs", "name", "version"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece<'a> {
    Text(&'a str),
    Var(&'a str),
}

fn parse(input: &str) -> Result<Vec<Piece<'_>>, ExecuteError> {
    let mut pieces = Vec::new();
    let mut rest = input;

    while let Some(pos) = rest.find(['{', '}']) {
        if pos > 0 {
            pieces.push(Piece::Text(&rest[..pos]));
        }
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("{{") {
            pieces.push(Piece::Text("{"));
            rest = after;
        } else if let Some(after) = tail.strip_prefix("}}") {
            pieces.push(Piece::Text("}"));
            rest = after;
        } else if tail.starts_with('}') {
            return Err(ExecuteError::UnterminatedPlaceholder(input.to_string()));
        } else {
            let end = tail
                .find('}')
                .ok_or_else(|| ExecuteError::UnterminatedPlaceholder(input.to_string()))?;
            pieces.push(Piece::Var(&tail[1..end]));
            rest = &tail[end + 1..];
        }
    }
    if !rest.is_empty() {
        pieces.push(Piece::Text(rest));
    }
    Ok(pieces)
}

/// Check that every placeholder in `input` is one of `keys` or names one of `resources`.
pub fn check(input: &str, keys: &[&str], resources: &[&str]) -> Result<(), ExecuteError> {
    for piece in parse(input)? {
        if let Piece::Var(name) = piece {
            let known = match name.strip_prefix("resource.") {
                Some(res) => resources.contains(&res),
                None => keys.contains(&name),
            };
            if !known {
                return Err(ExecuteError::UnknownPlaceholder(name.to_string()));
            }
        }
    }
    Ok(())
}

/// Whether `input` contains the placeholder `{key}`.
pub fn uses(input: &str, key: &str) -> Result<bool, ExecuteError> {
    Ok(parse(input)?
        .iter()
        .any(|piece| matches!(piece, Piece::Var(name) if *name == key)))
}

/// Values placeholders resolve to.
#[derive(Debug, Clone, Default)]
pub struct Vars {
    values: BTreeMap<String, String>,
}

impl Vars {
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn expand(&self, input: &str) -> Result<String, ExecuteError> {
        let mut out = String::with_capacity(input.len());
        for piece in parse(input)? {
            match piece {
                Piece::Text(t) => out.push_str(t),
                Piece::Var(name) => match self.values.get(name) {
                    Some(value) => out.push_str(value),
                    None if name == "interpreter" => return Err(ExecuteError::NoInterpreter),
                    None => return Err(ExecuteError::UnknownPlaceholder(name.to_string())),
                },
            }
        }
        Ok(out)
    }

    pub fn expand_all(&self, inputs: &[String]) -> Result<Vec<String>, ExecuteError> {
        inputs.iter().map(|s| self.expand(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Vars {
        let mut v = Vars::default();
        v.set("prefix", "/opt/pkg");
        v.set("interpreter", "/usr/local/bin/python3");
        v.set("resource.virtualenv", "/tmp/w/resources/virtualenv/virtualenv-15.0.3");
        v
    }

    #[test]
    fn test_expand_keeps_argument_whole() {
        let out = vars()
            .expand("VIRTUALENV={resource.virtualenv}/virtualenv.py -p {interpreter}")
            .unwrap();
        assert_eq!(
            out,
            "VIRTUALENV=/tmp/w/resources/virtualenv/virtualenv-15.0.3/virtualenv.py -p /usr/local/bin/python3"
        );
    }

    #[test]
    fn test_expand_prefix() {
        assert_eq!(vars().expand("PREFIX={prefix}/env").unwrap(), "PREFIX=/opt/pkg/env");
    }

    #[test]
    fn test_escaped_braces() {
        assert_eq!(vars().expand("a{{b}}c").unwrap(), "a{b}c");
    }

    #[test]
    fn test_path_with_spaces_and_quotes_is_literal() {
        let mut v = Vars::default();
        v.set("prefix", "/opt/my pkg/it's");
        assert_eq!(v.expand("{prefix}/env").unwrap(), "/opt/my pkg/it's/env");
    }

    #[test]
    fn test_unknown_placeholder() {
        assert!(matches!(
            vars().expand("{nope}"),
            Err(ExecuteError::UnknownPlaceholder(n)) if n == "nope"
        ));
    }

    #[test]
    fn test_missing_interpreter() {
        let v = Vars::default();
        assert!(matches!(v.expand("{interpreter}"), Err(ExecuteError::NoInterpreter)));
    }

    #[test]
    fn test_unterminated() {
        assert!(matches!(
            vars().expand("{prefix"),
            Err(ExecuteError::UnterminatedPlaceholder(_))
        ));
        assert!(matches!(
            vars().expand("prefix}"),
            Err(ExecuteError::UnterminatedPlaceholder(_))
        ));
    }

    #[test]
    fn test_check_against_resources() {
        let resources = ["virtualenv"];
        assert!(check("{resource.virtualenv}/x {jobs}", BUILD_KEYS, &resources).is_ok());
        assert!(check("{resource.other}", BUILD_KEYS, &resources).is_err());
        assert!(check("{bogus}", BUILD_KEYS, &resources).is_err());
    }

    #[test]
    fn test_test_keys_exclude_checkout_and_resources() {
        assert!(check("{prefix}/env/bin/run_all_tests", TEST_KEYS, &[]).is_ok());
        assert!(matches!(
            check("{source_dir}", TEST_KEYS, &[]),
            Err(ExecuteError::UnknownPlaceholder(n)) if n == "source_dir"
        ));
        assert!(check("{resource.virtualenv}", TEST_KEYS, &[]).is_err());
    }

    #[test]
    fn test_uses() {
        assert!(uses("-p {interpreter}", "interpreter").unwrap());
        assert!(!uses("-p {{interpreter}}", "interpreter").unwrap());
        assert!(!uses("{prefix}", "interpreter").unwrap());
    }
}
