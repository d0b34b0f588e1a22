//! Reviewer identity, which doubles as the store's file stem.

use std::fmt;

use crate::StoreError;
use crate::store::META_STEM_SUFFIX;

/// A validated reviewer name.
///
/// Names are trimmed and must be usable as a single path component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReviewerId(String);

impl ReviewerId {
    pub fn parse(name: &str) -> Result<Self, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidArgument("reviewer name is required".into()));
        }
        if name.starts_with('.')
            || name.ends_with(META_STEM_SUFFIX)
            || name.contains(['/', '\\'])
            || name.chars().any(char::is_control)
        {
            return Err(StoreError::InvalidArgument(format!(
                "reviewer name '{}' is not a valid file name",
                name.escape_debug()
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReviewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}
