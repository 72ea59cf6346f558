//! # Modlog Core
//!
//! Core types, traits, and errors for the modlog audit trail.
//!
//! This crate holds everything a host application and a storage backend
//! need to agree on, without committing to any storage:
//!
//! ## Key Traits
//!
//! - [`Content`]: Resolves a content entity to its UID and path
//! - [`ActorResolver`]: Supplies the acting user when none is passed
//! - [`Clock`]: Time abstraction for testability
//!
//! ## Key Types
//!
//! - [`ChangeRecord`]: One logged change event
//! - [`RecordKey`]: Opaque per-category record key
//! - [`Action`] / [`Category`]: What happened and where it is filed
//! - [`SiteId`]: Explicit tenant handle
//! - [`RecordFilter`]: Prefix/equality filter used by limit queries

pub mod category;
pub mod error;
pub mod filter;
pub mod record;
pub mod site;
pub mod traits;

// Re-export main types
pub use category::*;
pub use error::*;
pub use filter::*;
pub use record::*;
pub use site::*;
pub use traits::*;
