//! Change records and their keys

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Supplemental metadata attached to a change record
pub type Extra = BTreeMap<String, String>;

/// Opaque, randomly generated key of a record within one category
///
/// Keys carry no ordering meaning; the LIFO order of a category is kept
/// separately by its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(i32);

impl RecordKey {
    /// Wrap a raw key value
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw key value
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i32>().map(Self)
    }
}

impl From<i32> for RecordKey {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

impl From<RecordKey> for i32 {
    fn from(key: RecordKey) -> Self {
        key.0
    }
}

/// One logged change event against a content entity
///
/// Records are immutable once written; the only mutation a store performs
/// is deleting them during pruning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Stable identifier of the changed entity
    pub uid: String,
    /// Location of the entity at the time of the event
    pub path: String,
    /// Acting principal
    pub user: String,
    /// When the event was logged
    pub timestamp: DateTime<Utc>,
    /// Optional supplemental metadata
    pub extra: Option<Extra>,
}

impl ChangeRecord {
    /// Create a new record without extra metadata
    pub fn new(
        uid: impl Into<String>,
        path: impl Into<String>,
        user: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            uid: uid.into(),
            path: path.into(),
            user: user.into(),
            timestamp,
            extra: None,
        }
    }

    /// Attach extra metadata; an empty mapping is stored as `None`
    pub fn with_extra(mut self, extra: Extra) -> Self {
        self.extra = if extra.is_empty() { None } else { Some(extra) };
        self
    }

    /// Look up a field by name, as used by record filters
    ///
    /// `uid`, `path`, `user` and `timestamp` (RFC 3339) name the fixed
    /// fields; any other name is looked up in the extra metadata.
    pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "uid" => Some(Cow::Borrowed(&self.uid)),
            "path" => Some(Cow::Borrowed(&self.path)),
            "user" => Some(Cow::Borrowed(&self.user)),
            "timestamp" => Some(Cow::Owned(
                self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            )),
            other => self
                .extra
                .as_ref()
                .and_then(|extra| extra.get(other))
                .map(|value| Cow::Borrowed(value.as_str())),
        }
    }
}
