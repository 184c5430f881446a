use crate::error::{ManifestError, Result};
use std::fmt;

/// Non-empty release version, used verbatim in URLs and the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseVersion(String);

impl ReleaseVersion {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ReleaseVersion {
    type Error = ManifestError;

    fn try_from(value: &str) -> Result<Self> {
        Self::try_from(value.to_owned())
    }
}

impl TryFrom<String> for ReleaseVersion {
    type Error = ManifestError;

    fn try_from(value: String) -> Result<Self> {
        if value.trim().is_empty() {
            return Err(ManifestError::EmptyVersion);
        }
        Ok(Self(value))
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
