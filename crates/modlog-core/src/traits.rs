//! Host-facing traits for modlog
//!
//! These traits are the seams through which a hosting application feeds
//! the log:
//!
//! - [`Content`]: resolves an entity to a stable UID and path
//! - [`ActorResolver`]: supplies the acting user when none is given
//! - [`Clock`]: time abstraction for testability

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// A content entity whose changes can be logged
pub trait Content {
    /// Stable unique identifier, or `None` if the entity has none yet
    fn uid(&self) -> Option<String>;

    /// Hierarchical location, or `None` if the entity is not placed yet
    fn path(&self) -> Option<String>;

    /// Whether the entity is the site root itself
    fn is_site_root(&self) -> bool {
        false
    }
}

/// Plain entity reference for hosts that already know UID and path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    pub uid: String,
    pub path: String,
    pub site_root: bool,
}

impl ContentRef {
    /// Create a new content reference
    pub fn new(uid: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            path: path.into(),
            site_root: false,
        }
    }

    /// Mark as the site root
    pub fn as_site_root(mut self) -> Self {
        self.site_root = true;
        self
    }
}

impl Content for ContentRef {
    fn uid(&self) -> Option<String> {
        Some(self.uid.clone()).filter(|uid| !uid.is_empty())
    }

    fn path(&self) -> Option<String> {
        Some(self.path.clone()).filter(|path| !path.is_empty())
    }

    fn is_site_root(&self) -> bool {
        self.site_root
    }
}

/// Supplies the currently authenticated user
pub trait ActorResolver: Send + Sync {
    /// Identifier of the acting user, or `None` if nobody is authenticated
    fn current_actor(&self) -> Option<String>;
}

/// Resolver that always reports the same user
#[derive(Debug, Clone)]
pub struct FixedActor(pub String);

impl FixedActor {
    pub fn new(user: impl Into<String>) -> Self {
        Self(user.into())
    }
}

impl ActorResolver for FixedActor {
    fn current_actor(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Resolver for contexts without an authenticated user
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActor;

impl ActorResolver for NoActor {
    fn current_actor(&self) -> Option<String> {
        None
    }
}

/// Time abstraction for testability
pub trait Clock: Send + Sync {
    /// Get the current UTC datetime
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    /// Move forward (or backward, for negative durations)
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
