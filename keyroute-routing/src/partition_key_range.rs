//! Partition key ranges - the physical partitions of a collection.
//!
//! Each partition owns the keys in `[min_inclusive, max_exclusive)`. The last
//! partition of a collection may leave `max_exclusive` empty, meaning it runs
//! to the end of the key space.

use keyroute_core::{PartitionKeyRangeId, Result};
use serde::{Deserialize, Serialize};

use crate::range::Range;

/// Descriptor of one physical partition and its key-space boundary.
///
/// The shape is validated once at construction (or deserialization), so the
/// resolver and routing map can rely on `min_inclusive < max_exclusive`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawPartitionKeyRange")]
pub struct PartitionKeyRange {
    id: PartitionKeyRangeId,
    min_inclusive: String,
    max_exclusive: String,
}

impl PartitionKeyRange {
    /// Creates a new partition key range.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if the id is empty or the boundary is
    /// empty or inverted.
    pub fn new(
        id: PartitionKeyRangeId,
        min_inclusive: impl Into<String>,
        max_exclusive: impl Into<String>,
    ) -> Result<Self> {
        let min_inclusive = min_inclusive.into();
        let max_exclusive = max_exclusive.into();

        if id.is_empty() {
            return Err(keyroute_core::Error::InvalidArgument {
                name: "id",
                reason: "must not be empty",
            });
        }
        if !max_exclusive.is_empty() && min_inclusive >= max_exclusive {
            return Err(keyroute_core::Error::InvalidArgument {
                name: "max_exclusive",
                reason: "must be greater than min_inclusive",
            });
        }

        Ok(Self {
            id,
            min_inclusive,
            max_exclusive,
        })
    }

    /// Returns the partition identifier.
    #[must_use]
    pub const fn id(&self) -> &PartitionKeyRangeId {
        &self.id
    }

    /// Returns the first key owned by this partition.
    #[must_use]
    pub fn min_inclusive(&self) -> &str {
        &self.min_inclusive
    }

    /// Returns the upper boundary. Empty when the partition is unbounded.
    #[must_use]
    pub fn max_exclusive(&self) -> &str {
        &self.max_exclusive
    }

    /// Returns true if this partition runs to the end of the key space.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.max_exclusive.is_empty()
    }

    /// Returns true if `key` belongs to this partition.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        key >= self.min_inclusive.as_str() && self.below_upper(key)
    }

    /// Returns true if this partition shares at least one key with `range`.
    ///
    /// The range's lower inclusivity is not consulted: the partition's upper
    /// boundary is exclusive, so a range starting at that boundary never
    /// overlaps whether or not its lower bound is inclusive.
    #[must_use]
    pub fn overlaps(&self, range: &Range) -> bool {
        let starts_below_upper = self.below_upper(range.min());
        let ends_above_lower = match self.min_inclusive.as_str().cmp(range.max()) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Equal => range.is_max_inclusive(),
            std::cmp::Ordering::Greater => false,
        };
        starts_below_upper && ends_above_lower
    }

    /// Returns true if this partition's upper boundary covers `range.max()`.
    ///
    /// An inclusive range max equal to the exclusive boundary is not covered.
    #[must_use]
    pub fn covers_upper(&self, range: &Range) -> bool {
        if self.is_unbounded() {
            return true;
        }
        match range.max().cmp(self.max_exclusive.as_str()) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Equal => !range.is_max_inclusive(),
            std::cmp::Ordering::Greater => false,
        }
    }

    fn below_upper(&self, key: &str) -> bool {
        self.is_unbounded() || key < self.max_exclusive.as_str()
    }
}

/// Wire shape of a partition key range before validation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPartitionKeyRange {
    id: PartitionKeyRangeId,
    min_inclusive: String,
    max_exclusive: String,
}

impl TryFrom<RawPartitionKeyRange> for PartitionKeyRange {
    type Error = keyroute_core::Error;

    fn try_from(raw: RawPartitionKeyRange) -> Result<Self> {
        Self::new(raw.id, raw.min_inclusive, raw.max_exclusive)
    }
}
