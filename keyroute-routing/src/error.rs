//! Routing error types.
//!
//! `RoutingError` is what callers of the resolver see. `CacheError` belongs to
//! the routing map cache and its source, and passes through the resolver
//! unchanged.

use keyroute_core::CollectionId;
use thiserror::Error;

use crate::range::Range;

/// Result type for resolver operations.
pub type RoutingResult<T> = Result<T, RoutingError>;

/// Result type for routing map cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors returned by range resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// The caller's ranges are malformed, unsorted, overlapping, or too many.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Why the input was rejected.
        reason: String,
    },

    /// The routing map broke its contract for a non-empty query range.
    ///
    /// Either no partition overlapped the range or the returned partitions
    /// stop short of the range's upper bound. Not recoverable by retrying
    /// against the same routing map snapshot.
    #[error("routing inconsistency in {collection} for range {range}: {reason}")]
    RoutingInconsistency {
        /// The collection being resolved.
        collection: CollectionId,
        /// The range whose resolution failed.
        range: Range,
        /// What was violated.
        reason: &'static str,
    },

    /// The routing map could not be obtained.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl RoutingError {
    /// Creates an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Returns true for errors caused by the caller's input.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Returns true for routing map contract violations.
    #[must_use]
    pub const fn is_routing_inconsistency(&self) -> bool {
        matches!(self, Self::RoutingInconsistency { .. })
    }
}

impl From<keyroute_core::Error> for RoutingError {
    fn from(err: keyroute_core::Error) -> Self {
        Self::invalid_input(err.to_string())
    }
}

/// Errors from the routing map cache and its partition key range source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The collection does not exist.
    #[error("collection not found: {collection}")]
    NotFound {
        /// The collection that was not found.
        collection: CollectionId,
    },

    /// Reading partition key ranges from the service failed.
    #[error("transport error reading {collection}: {message}")]
    Transport {
        /// The collection being read.
        collection: CollectionId,
        /// Error message.
        message: String,
    },

    /// The partition key ranges do not form a valid routing map.
    #[error("invalid routing map for {collection}: {reason}")]
    InvalidRoutingMap {
        /// The collection whose ranges were rejected.
        collection: CollectionId,
        /// Why the ranges were rejected.
        reason: String,
    },
}
