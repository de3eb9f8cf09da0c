//! System limits and configuration bounds.
//!
//! Following TigerStyle: put limits on everything.
//! Every per-call input and every cache has an explicit maximum size.

/// System-wide limits for keyroute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of query ranges accepted by a single resolve call.
    pub max_ranges_per_call: u32,
    /// Maximum number of partition key ranges in one collection's routing map.
    pub max_partitions_per_collection: u32,
    /// Maximum number of collections whose routing maps are cached at once.
    pub max_cached_collections: u32,
    /// Time-to-live of a cached routing map in microseconds.
    pub routing_map_ttl_us: u64,
}

impl Limits {
    /// Creates limits with safe defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            // 100k point reads per call covers the largest batched lookups.
            max_ranges_per_call: 100_000,
            max_partitions_per_collection: 65_536,
            max_cached_collections: 10_000,
            // 5 minutes.
            routing_map_ttl_us: 5 * 60 * 1_000_000,
        }
    }

    /// Validates that all limits are internally consistent.
    ///
    /// # Errors
    /// Returns an error if any limit is zero.
    pub const fn validate(&self) -> crate::Result<()> {
        if self.max_ranges_per_call == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_ranges_per_call",
                reason: "must be positive",
            });
        }

        if self.max_partitions_per_collection == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_partitions_per_collection",
                reason: "must be positive",
            });
        }

        if self.max_cached_collections == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_cached_collections",
                reason: "must be positive",
            });
        }

        Ok(())
    }

    /// Checks a per-call range count against `max_ranges_per_call`.
    ///
    /// # Errors
    /// Returns `Error::LimitExceeded` if `count` is over the limit.
    pub fn check_ranges_per_call(&self, count: usize) -> crate::Result<()> {
        let actual = u64::try_from(count).unwrap_or(u64::MAX);
        let max = u64::from(self.max_ranges_per_call);
        if actual > max {
            return Err(crate::Error::LimitExceeded {
                limit: "ranges_per_call",
                max,
                actual,
            });
        }
        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}
