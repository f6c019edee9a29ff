//! Ignore patterns for watched trees.
//!
//! A pattern wrapped in slashes (`/\.tmp$/`) is a regular expression matched
//! anywhere in the root-relative path. Anything else is a glob:
//!
//! - without a `/`, it is matched against every path component, so `*.log`
//!   or `node_modules` apply at any depth;
//! - with a `/`, it is anchored at the watch root and matched against each
//!   leading run of components, so `dist/**` and `src/generated` ignore
//!   everything below them.

use std::path::{Component, Path};

use regex::Regex;

use crate::error::{Error, Result};

/// Version-control metadata directories that are never watched.
pub const DEFAULT_IGNORES: &[&str] = &[".git", ".hg", ".svn"];

#[derive(Debug, Clone)]
enum Matcher {
    Component(Regex),
    Anchored(Regex),
    Raw(Regex),
}

#[derive(Debug, Clone)]
pub struct IgnoreSet {
    patterns: Vec<String>,
    matchers: Vec<Matcher>,
}

impl IgnoreSet {
    /// Compiles `patterns` together with [`DEFAULT_IGNORES`].
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self {
            patterns: Vec::new(),
            matchers: Vec::new(),
        };
        for pattern in DEFAULT_IGNORES {
            set.push(pattern)?;
        }
        for pattern in patterns {
            set.push(pattern.as_ref())?;
        }
        Ok(set)
    }

    fn push(&mut self, pattern: &str) -> Result<()> {
        let pattern = pattern.trim();
        if pattern.is_empty() || self.patterns.iter().any(|p| p == pattern) {
            return Ok(());
        }
        self.matchers.push(compile(pattern)?);
        self.patterns.push(pattern.to_string());
        Ok(())
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns `true` if `path` (absolute, or relative to `root`) is ignored.
    pub fn is_ignored(&self, path: &Path, root: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let components: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if components.is_empty() {
            return false;
        }
        let joined = components.join("/");

        self.matchers.iter().any(|matcher| match matcher {
            Matcher::Component(re) => components.iter().any(|c| re.is_match(c)),
            Matcher::Anchored(re) => (1..=components.len())
                .any(|end| re.is_match(&components[..end].join("/"))),
            Matcher::Raw(re) => re.is_match(&joined),
        })
    }
}

fn compile(pattern: &str) -> Result<Matcher> {
    let invalid = |e: regex::Error| Error::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    };

    if pattern.len() > 2 && pattern.starts_with('/') && pattern.ends_with('/') {
        let re = Regex::new(&pattern[1..pattern.len() - 1]).map_err(invalid)?;
        return Ok(Matcher::Raw(re));
    }

    let glob = pattern.trim_start_matches("./").trim_end_matches('/');
    let glob = glob.strip_prefix('/').unwrap_or(glob);
    if glob.is_empty() {
        return Err(Error::InvalidPattern {
            pattern: pattern.to_string(),
            message: "pattern matches nothing".to_string(),
        });
    }

    let re = Regex::new(&glob_to_regex(glob)).map_err(invalid)?;
    if glob.contains('/') {
        Ok(Matcher::Anchored(re))
    } else {
        Ok(Matcher::Component(re))
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}
