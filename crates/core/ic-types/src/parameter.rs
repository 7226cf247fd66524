//! Parameter store keys and entries.

use ic_error::{IcError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A slash-delimited hierarchical parameter key.
///
/// Always absolute (leading `/`) and never empty. A trailing slash is
/// stripped on construction so `/a/b/` and `/a/b` name the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParameterPath(String);

impl ParameterPath {
    /// Create a path, validating that it is absolute and non-empty.
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();

        if !path.starts_with('/') {
            return Err(IcError::Validation(format!(
                "parameter path must be absolute: '{path}'"
            )));
        }

        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(IcError::Validation(
                "parameter path must name at least one segment".to_string(),
            ));
        }

        if trimmed.split('/').skip(1).any(str::is_empty) {
            return Err(IcError::Validation(format!(
                "parameter path contains an empty segment: '{path}'"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Append a child segment.
    ///
    /// Fails if the segment is empty or contains a `/`.
    pub fn join(&self, segment: &str) -> Result<Self> {
        if segment.is_empty() || segment.contains('/') {
            return Err(IcError::Validation(format!(
                "invalid path segment '{segment}' under '{}'",
                self.0
            )));
        }
        Ok(Self(format!("{}/{}", self.0, segment)))
    }

    /// The final segment of the path (e.g. `us-east-1` for `.../regions/us-east-1`).
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Number of segments in the path.
    pub fn depth(&self) -> usize {
        self.0.split('/').skip(1).count()
    }

    /// Whether `self` lies strictly below `prefix`.
    pub fn is_descendant_of(&self, prefix: &ParameterPath) -> bool {
        self.0.len() > prefix.0.len()
            && self.0.starts_with(&prefix.0)
            && self.0.as_bytes()[prefix.0.len()] == b'/'
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParameterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ParameterPath {
    type Error = IcError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ParameterPath> for String {
    fn from(path: ParameterPath) -> Self {
        path.0
    }
}

impl AsRef<str> for ParameterPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single fetched parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterEntry {
    /// Full path of the parameter
    pub path: ParameterPath,

    /// Raw string value
    pub value: String,
}

impl ParameterEntry {
    pub fn new(path: ParameterPath, value: impl Into<String>) -> Self {
        Self {
            path,
            value: value.into(),
        }
    }

    /// The code this entry names.
    ///
    /// Listing entries under `/regions` or `/services` carry the code as their
    /// value; an empty value falls back to the last path segment.
    pub fn code(&self) -> &str {
        let value = self.value.trim();
        if value.is_empty() {
            self.path.last_segment()
        } else {
            value
        }
    }
}
