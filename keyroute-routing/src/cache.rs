//! Routing map cache - resolves collections to their current routing map.
//!
//! Reading a collection's partition key ranges is a round trip to the
//! service, so validated routing maps are cached per collection with a TTL.
//! Concurrent misses for the same collection share a single fetch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use keyroute_core::{CollectionId, Limits};
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::CacheResult;
use crate::partition_key_range::PartitionKeyRange;
use crate::routing_map::{CollectionRoutingMap, RoutingMap};

// -----------------------------------------------------------------------------
// Traits
// -----------------------------------------------------------------------------

/// Resolves a collection to a routing map snapshot.
///
/// This is the only asynchronous dependency of the range resolver.
#[async_trait]
pub trait RoutingMapProvider: Send + Sync {
    /// Returns the current routing map of `collection`.
    ///
    /// # Errors
    ///
    /// Returns an error if the routing map cannot be fetched or built.
    async fn routing_map(&self, collection: &CollectionId) -> CacheResult<Arc<dyn RoutingMap>>;
}

/// Reads the partition key ranges of a collection from the data service.
///
/// # Implementors
///
/// - The transport-backed client in production
/// - Test implementations returning canned ranges
#[async_trait]
pub trait PartitionKeyRangeSource: Send + Sync {
    /// Lists every partition key range of `collection`, in any order.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NotFound` if the collection does not exist, or
    /// `CacheError::Transport` if the read fails.
    async fn read_partition_key_ranges(
        &self,
        collection: &CollectionId,
    ) -> CacheResult<Vec<PartitionKeyRange>>;
}

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

/// Configuration for the routing map cache.
#[derive(Debug, Clone, Copy)]
pub struct RoutingMapCacheConfig {
    /// How long a fetched routing map is served before it is refetched.
    pub ttl: Duration,
    /// Maximum number of cached collections.
    pub max_collections: usize,
    /// Limits applied when building routing maps.
    pub limits: Limits,
}

impl RoutingMapCacheConfig {
    /// Creates a configuration from system limits.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if any limit is zero.
    pub fn from_limits(limits: Limits) -> keyroute_core::Result<Self> {
        limits.validate()?;
        Ok(Self::from_valid_limits(limits))
    }

    fn from_valid_limits(limits: Limits) -> Self {
        Self {
            ttl: Duration::from_micros(limits.routing_map_ttl_us),
            max_collections: usize::try_from(limits.max_cached_collections).unwrap_or(usize::MAX),
            limits,
        }
    }

    /// Creates a small configuration for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            ttl: Duration::from_secs(1),
            max_collections: 4,
            limits: Limits::default(),
        }
    }
}

impl Default for RoutingMapCacheConfig {
    fn default() -> Self {
        Self::from_valid_limits(Limits::default())
    }
}

// -----------------------------------------------------------------------------
// RoutingMapCache
// -----------------------------------------------------------------------------

/// A fetched routing map and when it was fetched.
#[derive(Debug)]
struct CachedMap {
    map: Arc<CollectionRoutingMap>,
    fetched_at: Instant,
}

/// One collection's cache slot. The cell is empty while the first fetch is
/// in flight or after a failed fetch.
#[derive(Debug, Default)]
struct CacheSlot {
    cell: OnceCell<CachedMap>,
}

impl CacheSlot {
    fn fetched_at(&self) -> Option<Instant> {
        self.cell.get().map(|cached| cached.fetched_at)
    }
}

/// Caching [`RoutingMapProvider`] backed by a [`PartitionKeyRangeSource`].
///
/// The source is injected at construction; there is no global cache.
#[derive(Debug)]
pub struct RoutingMapCache<S> {
    /// Where partition key ranges are read from.
    source: S,
    /// Configuration.
    config: RoutingMapCacheConfig,
    /// Slots by collection. Never held across an await.
    slots: Mutex<HashMap<CollectionId, Arc<CacheSlot>>>,
}

impl<S: PartitionKeyRangeSource> RoutingMapCache<S> {
    /// Creates a new cache reading from `source`.
    #[must_use]
    pub fn new(source: S, config: RoutingMapCacheConfig) -> Self {
        Self {
            source,
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a new cache with default configuration.
    #[must_use]
    pub fn with_defaults(source: S) -> Self {
        Self::new(source, RoutingMapCacheConfig::default())
    }

    /// Returns the routing map of `collection`, fetching it if needed.
    ///
    /// # Errors
    ///
    /// Returns the source's error unchanged, or `CacheError::InvalidRoutingMap`
    /// if the fetched ranges do not tile the key space. Failures are not
    /// cached.
    ///
    /// # Panics
    ///
    /// Panics if the slot lock is poisoned.
    pub async fn get(&self, collection: &CollectionId) -> CacheResult<Arc<CollectionRoutingMap>> {
        let slot = self.slot(collection);
        let cached = slot
            .cell
            .get_or_try_init(|| self.fetch(collection))
            .await?;
        Ok(Arc::clone(&cached.map))
    }

    /// Drops the cached routing map of `collection`.
    ///
    /// Returns true if an entry was removed. Call this when a request fails
    /// because the partition layout changed.
    ///
    /// # Panics
    ///
    /// Panics if the slot lock is poisoned.
    pub fn invalidate(&self, collection: &CollectionId) -> bool {
        let removed = self.lock_slots().remove(collection).is_some();
        if removed {
            debug!(collection = %collection, "Routing map invalidated");
        }
        removed
    }

    /// Drops every cached routing map.
    ///
    /// # Panics
    ///
    /// Panics if the slot lock is poisoned.
    pub fn clear(&self) {
        self.lock_slots().clear();
    }

    /// Returns the number of cached collections.
    ///
    /// # Panics
    ///
    /// Panics if the slot lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    /// Returns true if nothing is cached.
    ///
    /// # Panics
    ///
    /// Panics if the slot lock is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_slots().is_empty()
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &RoutingMapCacheConfig {
        &self.config
    }

    /// Returns the slot for `collection`, replacing it if its map expired.
    fn slot(&self, collection: &CollectionId) -> Arc<CacheSlot> {
        let now = Instant::now();
        let mut slots = self.lock_slots();

        if let Some(slot) = slots.get(collection) {
            match slot.fetched_at() {
                Some(fetched_at) if now.duration_since(fetched_at) > self.config.ttl => {
                    debug!(collection = %collection, "Routing map expired");
                }
                Some(_) => {
                    debug!(collection = %collection, "Routing map cache hit");
                    return Arc::clone(slot);
                }
                // Fetch in flight or previously failed; join or retry it.
                None => return Arc::clone(slot),
            }
        } else if slots.len() >= self.config.max_collections {
            Self::evict_oldest(&mut slots);
        }

        debug!(collection = %collection, "Routing map cache miss");
        let slot = Arc::new(CacheSlot::default());
        slots.insert(collection.clone(), Arc::clone(&slot));
        slot
    }

    /// Reads and validates the routing map of `collection`.
    async fn fetch(&self, collection: &CollectionId) -> CacheResult<CachedMap> {
        let ranges = match self.source.read_partition_key_ranges(collection).await {
            Ok(ranges) => ranges,
            Err(e) => {
                warn!(collection = %collection, error = %e, "Failed to read partition key ranges");
                return Err(e);
            }
        };

        let map = CollectionRoutingMap::try_with_limits(
            collection.clone(),
            ranges,
            &self.config.limits,
        )
        .inspect_err(|e| {
            warn!(collection = %collection, error = %e, "Rejected routing map");
        })?;

        info!(
            collection = %collection,
            partitions = map.len(),
            "Routing map cached"
        );
        Ok(CachedMap {
            map: Arc::new(map),
            fetched_at: Instant::now(),
        })
    }

    /// Evicts the entry fetched longest ago. In-flight slots go last.
    fn evict_oldest(slots: &mut HashMap<CollectionId, Arc<CacheSlot>>) {
        let oldest = slots
            .iter()
            .min_by_key(|(_, slot)| {
                let fetched_at = slot.fetched_at();
                (fetched_at.is_none(), fetched_at)
            })
            .map(|(collection, _)| collection.clone());

        if let Some(collection) = oldest {
            debug!(collection = %collection, "Evicting routing map");
            slots.remove(&collection);
        }
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<CollectionId, Arc<CacheSlot>>> {
        self.slots.lock().expect("routing map cache lock poisoned")
    }
}

#[async_trait]
impl<S: PartitionKeyRangeSource> RoutingMapProvider for RoutingMapCache<S> {
    async fn routing_map(&self, collection: &CollectionId) -> CacheResult<Arc<dyn RoutingMap>> {
        let map: Arc<dyn RoutingMap> = self.get(collection).await?;
        Ok(map)
    }
}

#[async_trait]
impl<P: RoutingMapProvider + ?Sized> RoutingMapProvider for Arc<P> {
    async fn routing_map(&self, collection: &CollectionId) -> CacheResult<Arc<dyn RoutingMap>> {
        (**self).routing_map(collection).await
    }
}
