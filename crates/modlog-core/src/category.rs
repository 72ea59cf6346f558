//! Actions and the categories they are logged under
//!
//! Every logged action lands in exactly one category. The four fixed
//! categories are always available; custom categories exist only for
//! names a log explicitly allows.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModlogError;

/// Kind of change being logged, named as a present-tense verb
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Add,
    Delete,
    Modify,
    /// Moves and renames
    Move,
    /// Extension action, logged under a category of the same name
    Custom(String),
}

impl Action {
    /// Parse an action name
    ///
    /// Accepts both the verb (`modify`) and noun (`modifications`) forms of
    /// the fixed actions. Anything else becomes [`Action::Custom`].
    pub fn parse(name: &str) -> Self {
        match name {
            "add" | "additions" => Self::Add,
            "delete" | "deletions" => Self::Delete,
            "modify" | "modifications" => Self::Modify,
            "move" | "moves" => Self::Move,
            other => Self::Custom(other.to_string()),
        }
    }

    /// The category this action is logged under
    pub fn category(&self) -> Category {
        match self {
            Self::Add => Category::Additions,
            Self::Delete => Category::Deletions,
            Self::Modify => Category::Modifications,
            Self::Move => Category::Moves,
            Self::Custom(name) => Category::Custom(name.clone()),
        }
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

/// Storage identifier of one audit bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Category {
    Additions,
    Deletions,
    Modifications,
    Moves,
    Custom(String),
}

impl Category {
    /// The four categories every log supports
    pub const FIXED: [Category; 4] = [
        Category::Additions,
        Category::Deletions,
        Category::Modifications,
        Category::Moves,
    ];

    /// Resolve a category from its noun or verb form
    ///
    /// Custom names are validated but not checked against any allowlist;
    /// that is the job of the owning log.
    pub fn from_name(name: &str) -> Result<Self, ModlogError> {
        let category = Action::parse(name).category();
        if let Category::Custom(custom) = &category {
            validate_custom_name(custom)?;
        }
        Ok(category)
    }

    /// Canonical storage name
    pub fn as_str(&self) -> &str {
        match self {
            Self::Additions => "additions",
            Self::Deletions => "deletions",
            Self::Modifications => "modifications",
            Self::Moves => "moves",
            Self::Custom(name) => name,
        }
    }

    /// Whether this is one of the four fixed categories
    pub fn is_fixed(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl TryFrom<String> for Category {
    type Error = ModlogError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::from_name(&name)
    }
}

/// Custom category names end up in storage identifiers, so keep them plain
fn validate_custom_name(name: &str) -> Result<(), ModlogError> {
    if name.is_empty() {
        return Err(ModlogError::invalid_argument("category name is empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ModlogError::invalid_argument(format!(
            "category name '{name}' may only contain ASCII letters, digits, '_' and '-'"
        )));
    }
    Ok(())
}
