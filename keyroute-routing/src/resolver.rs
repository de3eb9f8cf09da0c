//! Range resolver - maps sorted query ranges to the partitions serving them.
//!
//! The resolver fetches a collection's routing map once per call and walks
//! the caller's ranges in order. Before querying the map for a range it drops
//! the prefix already covered by the last partition found, and after each
//! query it skips every following range that the same partition covers. The
//! number of overlap queries is therefore bounded by the number of distinct
//! partitions touched rather than by the number of ranges.

use keyroute_core::{CollectionId, Limits};
use tracing::{debug, warn};

use crate::cache::RoutingMapProvider;
use crate::error::{RoutingError, RoutingResult};
use crate::partition_key_range::PartitionKeyRange;
use crate::range::Range;
use crate::routing_map::RoutingMap;

/// Configuration for the range resolver.
///
/// Built through [`ResolverConfig::from_limits`] so the limits are always
/// validated.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverConfig {
    /// Limits checked against each call's input.
    limits: Limits,
}

impl ResolverConfig {
    /// Creates a configuration from system limits.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if any limit is zero.
    pub fn from_limits(limits: Limits) -> keyroute_core::Result<Self> {
        limits.validate()?;
        Ok(Self { limits })
    }

    /// Creates a configuration for tests with a small per-call range limit.
    #[must_use]
    pub fn for_testing() -> Self {
        let mut limits = Limits::default();
        limits.max_ranges_per_call = 64;
        Self { limits }
    }

    /// Returns the limits checked against each call's input.
    #[must_use]
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }
}

/// Resolves sorted, non-overlapping ranges to partition key ranges.
///
/// The resolver holds no mutable state; concurrent calls are independent.
#[derive(Debug)]
pub struct RangeResolver<P> {
    /// Configuration.
    config: ResolverConfig,
    /// Source of routing map snapshots.
    provider: P,
}

impl<P: RoutingMapProvider> RangeResolver<P> {
    /// Creates a new resolver over `provider`.
    #[must_use]
    pub const fn new(config: ResolverConfig, provider: P) -> Self {
        Self { config, provider }
    }

    /// Creates a resolver with default configuration.
    #[must_use]
    pub fn with_provider(provider: P) -> Self {
        Self::new(ResolverConfig::default(), provider)
    }

    /// Returns the routing map provider.
    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns the partitions that together cover `sorted_ranges`, in key order.
    ///
    /// Empty ranges are skipped. An empty input returns an empty result
    /// without touching the provider.
    ///
    /// # Errors
    ///
    /// - `RoutingError::InvalidInput` if the ranges are not sorted and
    ///   pairwise non-overlapping, or exceed `max_ranges_per_call`. Checked
    ///   before the routing map is fetched.
    /// - `RoutingError::Cache` with the provider's error, unchanged.
    /// - `RoutingError::RoutingInconsistency` if the routing map returns no
    ///   partition for a non-empty range or stops short of a range's max.
    pub async fn resolve(
        &self,
        collection: &CollectionId,
        sorted_ranges: &[Range],
    ) -> RoutingResult<Vec<PartitionKeyRange>> {
        self.validate(sorted_ranges)?;

        if sorted_ranges.is_empty() {
            return Ok(Vec::new());
        }

        let routing_map = self.provider.routing_map(collection).await?;
        resolve_with_map(collection, routing_map.as_ref(), sorted_ranges)
    }

    /// Returns the partitions covering a single range.
    ///
    /// # Errors
    ///
    /// See [`RangeResolver::resolve`].
    pub async fn resolve_one(
        &self,
        collection: &CollectionId,
        range: &Range,
    ) -> RoutingResult<Vec<PartitionKeyRange>> {
        self.resolve(collection, std::slice::from_ref(range)).await
    }

    fn validate(&self, sorted_ranges: &[Range]) -> RoutingResult<()> {
        self.config.limits.check_ranges_per_call(sorted_ranges.len())?;

        if let Some(i) = sorted_ranges
            .windows(2)
            .position(|pair| !pair[0].precedes(&pair[1]))
        {
            return Err(RoutingError::invalid_input(format!(
                "ranges are not sorted and non-overlapping: {} at index {i} does not precede {}",
                sorted_ranges[i],
                sorted_ranges[i + 1]
            )));
        }
        Ok(())
    }
}

/// Runs the resolution loop against one routing map snapshot.
fn resolve_with_map(
    collection: &CollectionId,
    routing_map: &dyn RoutingMap,
    sorted_ranges: &[Range],
) -> RoutingResult<Vec<PartitionKeyRange>> {
    let mut resolved: Vec<PartitionKeyRange> = Vec::new();
    let mut queries: u32 = 0;
    let mut index = 0;

    while index < sorted_ranges.len() {
        let current = &sorted_ranges[index];
        if current.is_empty() {
            index += 1;
            continue;
        }

        let query_range = match resolved.last() {
            Some(last) => current.subtract_covered(last),
            None => current.clone(),
        };

        let overlapping = routing_map.overlapping_ranges(&query_range);
        queries += 1;

        let Some(last_known) = overlapping.last().cloned() else {
            warn!(
                collection = %collection,
                range = %query_range,
                "Routing map returned no overlapping partition key ranges"
            );
            return Err(RoutingError::RoutingInconsistency {
                collection: collection.clone(),
                range: query_range,
                reason: "no overlapping partition key ranges",
            });
        };

        if !last_known.covers_upper(current) {
            warn!(
                collection = %collection,
                range = %current,
                last_partition = %last_known.id(),
                "Overlapping partition key ranges stop short of range max"
            );
            return Err(RoutingError::RoutingInconsistency {
                collection: collection.clone(),
                range: current.clone(),
                reason: "overlapping partition key ranges do not cover the range max",
            });
        }

        resolved.extend(overlapping);

        // Later ranges ending inside the last partition are already covered.
        index += 1;
        while index < sorted_ranges.len() && last_known.covers_upper(&sorted_ranges[index]) {
            index += 1;
        }
    }

    debug!(
        collection = %collection,
        ranges = sorted_ranges.len(),
        queries,
        partitions = resolved.len(),
        "Resolved partition key ranges"
    );
    Ok(resolved)
}
