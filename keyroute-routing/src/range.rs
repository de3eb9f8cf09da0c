//! Query ranges over the partition key space.
//!
//! A `Range` is an interval of string keys with explicit endpoint
//! inclusivity. Every comparison reduces to lexicographic comparison of the
//! endpoints plus the inclusivity flags.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RoutingError, RoutingResult};
use crate::partition_key_range::PartitionKeyRange;

/// An immutable interval over the partition key space.
///
/// Invariant: `min <= max`. A range whose bounds are equal is empty unless
/// both ends are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawRange")]
pub struct Range {
    min: String,
    max: String,
    is_min_inclusive: bool,
    is_max_inclusive: bool,
}

impl Range {
    /// Creates a new range.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::InvalidInput` if `min > max`.
    pub fn new(
        min: impl Into<String>,
        max: impl Into<String>,
        is_min_inclusive: bool,
        is_max_inclusive: bool,
    ) -> RoutingResult<Self> {
        let min = min.into();
        let max = max.into();
        if min > max {
            return Err(RoutingError::invalid_input(format!(
                "range min {min:?} is greater than max {max:?}"
            )));
        }
        Ok(Self {
            min,
            max,
            is_min_inclusive,
            is_max_inclusive,
        })
    }

    /// Creates a range holding exactly one key.
    #[must_use]
    pub fn point(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            min: key.clone(),
            max: key,
            is_min_inclusive: true,
            is_max_inclusive: true,
        }
    }

    /// Returns the lower bound.
    #[must_use]
    pub fn min(&self) -> &str {
        &self.min
    }

    /// Returns the upper bound.
    #[must_use]
    pub fn max(&self) -> &str {
        &self.max
    }

    /// Returns true if the lower bound belongs to the range.
    #[must_use]
    pub const fn is_min_inclusive(&self) -> bool {
        self.is_min_inclusive
    }

    /// Returns true if the upper bound belongs to the range.
    #[must_use]
    pub const fn is_max_inclusive(&self) -> bool {
        self.is_max_inclusive
    }

    /// Returns true if no key lies in the range.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min == self.max && !(self.is_min_inclusive && self.is_max_inclusive)
    }

    /// Returns true if `key` lies in the range.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let above_min = if self.is_min_inclusive {
            key >= self.min.as_str()
        } else {
            key > self.min.as_str()
        };
        let below_max = if self.is_max_inclusive {
            key <= self.max.as_str()
        } else {
            key < self.max.as_str()
        };
        above_min && below_max
    }

    /// Returns true if this range lies entirely before `other`.
    ///
    /// Ranges that meet at a key included by both share that key, so they
    /// overlap and neither precedes the other.
    #[must_use]
    pub fn precedes(&self, other: &Self) -> bool {
        match self.max.as_str().cmp(other.min.as_str()) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Equal => !(self.is_max_inclusive && other.is_min_inclusive),
            std::cmp::Ordering::Greater => false,
        }
    }

    /// Returns the part of this range not covered by `covered`.
    ///
    /// `covered` must be a partition known to cover the start of this range.
    /// The remainder starts at the later of the partition's upper boundary and
    /// this range's own lower bound. A lower bound moved up to the partition
    /// boundary is exclusive.
    #[must_use]
    pub fn subtract_covered(&self, covered: &PartitionKeyRange) -> Self {
        if covered.is_unbounded() || covered.max_exclusive() > self.max.as_str() {
            return Self {
                min: self.max.clone(),
                max: self.max.clone(),
                is_min_inclusive: false,
                is_max_inclusive: false,
            };
        }

        let left = std::cmp::max(covered.max_exclusive(), self.min.as_str());
        let is_min_inclusive = if left == self.min {
            self.is_min_inclusive
        } else {
            false
        };
        Self {
            min: left.to_owned(),
            max: self.max.clone(),
            is_min_inclusive,
            is_max_inclusive: self.is_max_inclusive,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.is_min_inclusive { '[' } else { '(' };
        let close = if self.is_max_inclusive { ']' } else { ')' };
        write!(f, "{open}{},{}{close}", self.min, self.max)
    }
}

/// Wire shape of a range before validation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRange {
    min: String,
    max: String,
    is_min_inclusive: bool,
    is_max_inclusive: bool,
}

impl TryFrom<RawRange> for Range {
    type Error = RoutingError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Self::new(raw.min, raw.max, raw.is_min_inclusive, raw.is_max_inclusive)
    }
}
