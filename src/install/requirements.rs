//! Dependency manifest parsing
//!
//! One requirement per line, either `name` or `name==version`. Blank lines
//! and `#` comments are ignored; a trailing ` # note` is stripped.

use std::fmt;
use std::fs;
use std::path::Path;

use super::{InstallerError, ManifestError};

/// A single declared dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub version: Option<String>,
}

impl Requirement {
    pub fn new(name: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            name: name.into(),
            version: version.map(String::from),
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.version.is_some()
    }

    /// Argument handed to the package installer (`name==version` or `name`)
    pub fn install_spec(&self) -> String {
        self.to_string()
    }

    fn parse_line(text: &str, line: usize) -> Result<Self, ManifestError> {
        let (name, version) = match text.split_once("==") {
            Some((name, version)) => {
                let version = version.trim();
                if version.is_empty() {
                    return Err(ManifestError::EmptyVersion { line });
                }
                (name.trim(), Some(version))
            }
            None => (text, None),
        };

        if name.is_empty() {
            return Err(ManifestError::EmptyName { line });
        }

        let unsupported = |s: &str| s.contains(['<', '>', '=', '!', '~', ';', ' ', ',']);
        if unsupported(name) || version.is_some_and(unsupported) {
            return Err(ManifestError::UnsupportedSpecifier {
                line,
                text: text.to_string(),
            });
        }

        Ok(Self::new(name, version))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}=={}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}

/// Ordered list of requirements, in manifest order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySpec {
    entries: Vec<Requirement>,
}

/// Cut a trailing comment: `#` at line start or after any whitespace
fn strip_comment(line: &str) -> &str {
    let mut prev_blank = true;
    for (pos, ch) in line.char_indices() {
        if ch == '#' && prev_blank {
            return &line[..pos];
        }
        prev_blank = ch.is_whitespace();
    }
    line
}

impl DependencySpec {
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let mut entries = Vec::new();
        for (index, raw) in content.lines().enumerate() {
            let text = strip_comment(raw).trim();

            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            entries.push(Requirement::parse_line(text, index + 1)?);
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, InstallerError> {
        let content = fs::read_to_string(path).map_err(|e| {
            InstallerError::io(format!("Failed to read manifest {}", path.display()), e)
        })?;
        Ok(Self::parse(&content)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Requirement> for DependencySpec {
    fn from_iter<I: IntoIterator<Item = Requirement>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
