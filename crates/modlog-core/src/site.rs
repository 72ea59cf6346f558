//! Site handles

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModlogError;

/// Identifier of the site (tenant) whose log an operation addresses
///
/// Passed explicitly to every storage call; there is no ambient
/// "current site".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(String);

impl SiteId {
    /// Create a site handle, rejecting empty names
    pub fn new(name: impl Into<String>) -> Result<Self, ModlogError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModlogError::invalid_argument("site id is empty"));
        }
        Ok(Self(name))
    }

    /// The site name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_id() {
        let site = SiteId::new("plone").unwrap();
        assert_eq!(site.as_str(), "plone");
        assert_eq!(site.to_string(), "plone");
        assert!(SiteId::new("  ").is_err());
    }
}
