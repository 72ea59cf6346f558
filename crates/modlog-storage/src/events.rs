//! Content lifecycle notifications
//!
//! Hosts that emit lifecycle events can forward them to
//! [`ModificationLog::notify`] instead of picking the action themselves.

use modlog_core::{Action, Content, Extra, ModlogError, RecordKey};
use tracing::trace;

use crate::modlog::ModificationLog;

/// Extra field holding the previous location of a moved entity
pub const OLD_PATH_FIELD: &str = "old_path";
/// Extra field holding the new location of a moved entity
pub const NEW_PATH_FIELD: &str = "new_path";

/// A change in a content entity's life
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Entity created and placed in a container
    Added,
    /// Entity edited in place
    Modified,
    /// Entity removed from its container
    Removed,
    /// Entity moved or renamed
    ///
    /// A missing side means the event is really a creation or removal
    /// reported through the move channel.
    Moved {
        old_path: Option<String>,
        new_path: Option<String>,
    },
}

impl LifecycleEvent {
    /// Create a move event between two known locations
    pub fn moved(old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self::Moved {
            old_path: Some(old_path.into()),
            new_path: Some(new_path.into()),
        }
    }
}

impl ModificationLog {
    /// Record a lifecycle event, attributed to the resolved actor
    ///
    /// Returns `Ok(None)` for events that are not logged: removal of the
    /// site root, and moves missing either side (those are additions or
    /// removals and arrive as their own events).
    pub fn notify<C: Content + ?Sized>(
        &self,
        content: &C,
        event: &LifecycleEvent,
    ) -> Result<Option<RecordKey>, ModlogError> {
        let (action, extra) = match event {
            LifecycleEvent::Added => (Action::Add, None),
            LifecycleEvent::Modified => (Action::Modify, None),
            LifecycleEvent::Removed if content.is_site_root() => {
                trace!("Ignoring removal of the site root");
                return Ok(None);
            }
            LifecycleEvent::Removed => (Action::Delete, None),
            LifecycleEvent::Moved {
                old_path: Some(old_path),
                new_path: Some(new_path),
            } => {
                let mut extra = Extra::new();
                extra.insert(OLD_PATH_FIELD.to_string(), old_path.clone());
                extra.insert(NEW_PATH_FIELD.to_string(), new_path.clone());
                (Action::Move, Some(extra))
            }
            LifecycleEvent::Moved { .. } => {
                trace!("Ignoring one-sided move");
                return Ok(None);
            }
        };

        self.log(action, content, None, extra).map(Some)
    }
}
