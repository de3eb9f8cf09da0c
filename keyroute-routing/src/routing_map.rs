//! Routing map - the partition layout of one collection.
//!
//! A routing map is an immutable snapshot of which partition key range owns
//! which part of the key space. The resolver only needs the overlap query;
//! `CollectionRoutingMap` is the in-memory implementation built from the
//! partition key ranges the service reports.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;

use keyroute_core::key_space::KEY_SPACE_MIN;
use keyroute_core::{CollectionId, Limits};

use crate::error::{CacheError, CacheResult};
use crate::partition_key_range::PartitionKeyRange;
use crate::range::Range;

/// Overlap queries against an immutable partition layout.
///
/// Implementations must return the partitions intersecting `range` sorted by
/// boundary start. For a non-empty range the result is non-empty and the
/// union of the returned boundaries covers the range.
pub trait RoutingMap: Send + Sync {
    /// Returns the partitions whose boundaries intersect `range`.
    fn overlapping_ranges(&self, range: &Range) -> Vec<PartitionKeyRange>;
}

/// Validated partition layout of a single collection.
///
/// Partitions are keyed by their `min_inclusive` in a `BTreeMap`, so the
/// partition owning a key is the entry with the largest start <= key.
#[derive(Debug, Clone)]
pub struct CollectionRoutingMap {
    /// The collection this layout belongs to.
    collection: CollectionId,
    /// Map from partition start to partition.
    ranges: BTreeMap<String, PartitionKeyRange>,
}

impl CollectionRoutingMap {
    /// Builds a routing map with default limits.
    ///
    /// # Errors
    ///
    /// See [`CollectionRoutingMap::try_with_limits`].
    pub fn try_new(
        collection: CollectionId,
        ranges: Vec<PartitionKeyRange>,
    ) -> CacheResult<Self> {
        Self::try_with_limits(collection, ranges, &Limits::default())
    }

    /// Builds a routing map, checking that the ranges tile the key space.
    ///
    /// Input order does not matter.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidRoutingMap` if the ranges are empty, exceed
    /// `max_partitions_per_collection`, repeat an id, leave a gap or overlap,
    /// or do not span from the start to the end of the key space. The last
    /// partition must have an empty (unbounded) `max_exclusive`.
    pub fn try_with_limits(
        collection: CollectionId,
        mut ranges: Vec<PartitionKeyRange>,
        limits: &Limits,
    ) -> CacheResult<Self> {
        let invalid = |reason: String| CacheError::InvalidRoutingMap {
            collection: collection.clone(),
            reason,
        };

        if ranges.is_empty() {
            return Err(invalid("no partition key ranges".to_owned()));
        }
        let max = usize::try_from(limits.max_partitions_per_collection).unwrap_or(usize::MAX);
        if ranges.len() > max {
            return Err(invalid(format!(
                "too many partition key ranges: {} (max {max})",
                ranges.len()
            )));
        }

        ranges.sort_by(|a, b| a.min_inclusive().cmp(b.min_inclusive()));

        let mut ids = HashSet::with_capacity(ranges.len());
        let mut expected_min = KEY_SPACE_MIN;
        for (i, range) in ranges.iter().enumerate() {
            if !ids.insert(range.id()) {
                return Err(invalid(format!("duplicate partition key range id {}", range.id())));
            }
            if range.min_inclusive() != expected_min {
                return Err(invalid(format!(
                    "partition key range {} starts at {:?}, expected {expected_min:?}",
                    range.id(),
                    range.min_inclusive()
                )));
            }
            let is_last = i + 1 == ranges.len();
            if range.is_unbounded() && !is_last {
                return Err(invalid(format!(
                    "unbounded partition key range {} is not the last one",
                    range.id()
                )));
            }
            expected_min = range.max_exclusive();
        }

        // Every key sorts below an unbounded end, so no caller range can fall
        // past the last partition.
        let last = &ranges[ranges.len() - 1];
        if !last.is_unbounded() {
            return Err(invalid(format!(
                "last partition key range {} ends at {:?}, expected an unbounded end",
                last.id(),
                last.max_exclusive()
            )));
        }

        let ranges = ranges
            .into_iter()
            .map(|r| (r.min_inclusive().to_owned(), r))
            .collect();
        Ok(Self { collection, ranges })
    }

    /// Returns the collection this layout belongs to.
    #[must_use]
    pub const fn collection(&self) -> &CollectionId {
        &self.collection
    }

    /// Returns the number of partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Always false: a validated routing map has at least one partition.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Returns the partition owning `key`.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&PartitionKeyRange> {
        self.ranges
            .range::<str, _>((Bound::Unbounded, Bound::Included(key)))
            .next_back()
            .map(|(_, range)| range)
            .filter(|range| range.contains(key))
    }

    /// Returns an iterator over all partitions in key order.
    pub fn iter(&self) -> impl Iterator<Item = &PartitionKeyRange> + '_ {
        self.ranges.values()
    }
}

impl RoutingMap for CollectionRoutingMap {
    fn overlapping_ranges(&self, range: &Range) -> Vec<PartitionKeyRange> {
        // Start from the partition owning range.min and walk forward until a
        // partition starts past range.max.
        let start = self
            .ranges
            .range::<str, _>((Bound::Unbounded, Bound::Included(range.min())))
            .next_back()
            .map_or(KEY_SPACE_MIN, |(start, _)| start.as_str());

        self.ranges
            .range::<str, _>((Bound::Included(start), Bound::Unbounded))
            .map(|(_, partition)| partition)
            .take_while(|partition| match partition.min_inclusive().cmp(range.max()) {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Equal => range.is_max_inclusive(),
                std::cmp::Ordering::Greater => false,
            })
            .filter(|partition| partition.overlaps(range))
            .cloned()
            .collect()
    }
}
