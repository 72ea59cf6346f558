//! Record filters for limit queries

use std::collections::BTreeMap;

use crate::record::ChangeRecord;

/// Field name matched by prefix instead of equality
pub const PATH_FIELD: &str = "path";

/// Conjunction of field criteria
///
/// The `path` criterion matches by string prefix so a folder path selects
/// everything beneath it; every other criterion must equal the record's
/// field exactly. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    criteria: BTreeMap<String, String>,
}

impl RecordFilter {
    /// Create an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Match records whose path starts with `prefix`
    pub fn path_prefix(self, prefix: impl Into<String>) -> Self {
        self.field(PATH_FIELD, prefix)
    }

    /// Match records logged by `user`
    pub fn user(self, user: impl Into<String>) -> Self {
        self.field("user", user)
    }

    /// Match records about the entity `uid`
    pub fn uid(self, uid: impl Into<String>) -> Self {
        self.field("uid", uid)
    }

    /// Add a criterion on any field, including extra metadata keys
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.criteria.insert(name.into(), value.into());
        self
    }

    /// Whether the filter has no criteria
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Iterate over the criteria
    pub fn criteria(&self) -> impl Iterator<Item = (&str, &str)> {
        self.criteria.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Test a record against every criterion
    pub fn matches(&self, record: &ChangeRecord) -> bool {
        self.criteria.iter().all(|(name, expected)| {
            if name == PATH_FIELD {
                record.path.starts_with(expected.as_str())
            } else {
                record
                    .field(name)
                    .is_some_and(|actual| actual == expected.as_str())
            }
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RecordFilter {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::new(), |filter, (k, v)| filter.field(k, v))
    }
}
