//! Keyroute Routing - Partition range resolution for partitioned collections.
//!
//! This crate answers one question for the client: given a collection and a
//! sorted list of key ranges, which physical partitions must be contacted?
//!
//! # Design (`TigerStyle`)
//!
//! - **One fetch per call**: The routing map is fetched once and treated as
//!   an immutable snapshot for the rest of the call
//! - **Bounded lookups**: Overlap queries scale with partitions touched, not
//!   with ranges supplied
//! - **Typed failures**: Broken routing map contracts surface as
//!   `RoutingError::RoutingInconsistency`, never as panics
//! - **Injected dependencies**: The cache and its source are passed in; there
//!   is no global state
//!
//! # Example
//!
//! ```ignore
//! use keyroute_routing::{RangeResolver, Range, RoutingMapCache};
//!
//! let cache = RoutingMapCache::with_defaults(source);
//! let resolver = RangeResolver::with_provider(cache);
//!
//! let ranges = [Range::point("A"), Range::new("C", "K", true, false)?];
//! let partitions = resolver.resolve(&collection, &ranges).await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod cache;
mod error;
mod partition_key_range;
mod range;
mod resolver;
mod routing_map;

pub use cache::{
    PartitionKeyRangeSource, RoutingMapCache, RoutingMapCacheConfig, RoutingMapProvider,
};
pub use error::{CacheError, CacheResult, RoutingError, RoutingResult};
pub use partition_key_range::PartitionKeyRange;
pub use range::Range;
pub use resolver::{RangeResolver, ResolverConfig};
pub use routing_map::{CollectionRoutingMap, RoutingMap};
