//! Keyroute Core - Strongly-typed identifiers and limits for keyroute.
//!
//! This crate holds the small vocabulary shared by the routing layer: the
//! names of collections and partition key ranges, the bounds of the
//! partition key space, and the explicit limits every component honors.
//!
//! # Design Principles (TigerStyle)
//!
//! - **Strongly-typed IDs**: A `CollectionId` can't be passed where a
//!   `PartitionKeyRangeId` is expected
//! - **Explicit limits**: Every per-call and per-cache resource is bounded
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod limits;
mod types;

pub use error::{Error, Result};
pub use limits::Limits;
pub use types::{CollectionId, PartitionKeyRangeId};

/// Bounds of the partition key space.
///
/// Partition key ranges are compared as plain strings. The first partition of
/// every collection starts at [`KEY_SPACE_MIN`]; the last one has an empty
/// `max_exclusive` and owns every key from its start upwards.
pub mod key_space {
    /// Smallest key of the partition key space (inclusive).
    pub const KEY_SPACE_MIN: &str = "";
}
