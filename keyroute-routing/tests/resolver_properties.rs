//! Resolver properties against call-counting and fault-injecting routing maps.
//!
//! Naming: `test_resolve_<property>` for contract properties,
//! `test_scenario_<name>` for the fixed layouts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keyroute_core::{CollectionId, PartitionKeyRangeId};
use keyroute_routing::{
    CacheError, CacheResult, CollectionRoutingMap, PartitionKeyRange, PartitionKeyRangeSource,
    Range, RangeResolver, ResolverConfig, RoutingError, RoutingMap, RoutingMapCache,
    RoutingMapCacheConfig, RoutingMapProvider,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ============================================================================
// Fakes
// ============================================================================

/// How a fake routing map misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    /// Answer every query correctly.
    None,
    /// Return no partitions at all.
    EmptyOverlap,
    /// Drop the last partition of every answer.
    TruncateLast,
}

/// Routing map wrapper that counts overlap queries and can inject faults.
struct CountingRoutingMap {
    inner: CollectionRoutingMap,
    queries: AtomicUsize,
    queried: Mutex<Vec<Range>>,
    fault: Fault,
}

impl RoutingMap for CountingRoutingMap {
    fn overlapping_ranges(&self, range: &Range) -> Vec<PartitionKeyRange> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.queried.lock().unwrap().push(range.clone());

        let mut result = self.inner.overlapping_ranges(range);
        match self.fault {
            Fault::None => {}
            Fault::EmptyOverlap => result.clear(),
            Fault::TruncateLast => {
                if result.len() > 1 {
                    result.pop();
                }
            }
        }
        result
    }
}

/// Provider serving one counting map and counting fetches.
struct CountingProvider {
    map: Arc<CountingRoutingMap>,
    fetches: AtomicUsize,
}

impl CountingProvider {
    fn new(bounds: &[(&str, &str)], fault: Fault) -> Self {
        let inner = CollectionRoutingMap::try_new(collection(), layout(bounds)).unwrap();
        Self {
            map: Arc::new(CountingRoutingMap {
                inner,
                queries: AtomicUsize::new(0),
                queried: Mutex::new(Vec::new()),
                fault,
            }),
            fetches: AtomicUsize::new(0),
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn queries(&self) -> usize {
        self.map.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoutingMapProvider for CountingProvider {
    async fn routing_map(&self, _: &CollectionId) -> CacheResult<Arc<dyn RoutingMap>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let map: Arc<dyn RoutingMap> = self.map.clone();
        Ok(map)
    }
}

/// Source that always fails with a transport error.
struct UnreachableSource;

#[async_trait]
impl PartitionKeyRangeSource for UnreachableSource {
    async fn read_partition_key_ranges(
        &self,
        collection: &CollectionId,
    ) -> CacheResult<Vec<PartitionKeyRange>> {
        Err(CacheError::Transport {
            collection: collection.clone(),
            message: "503 service unavailable".to_owned(),
        })
    }
}

/// Source serving a fixed layout for any collection.
struct StaticSource(Vec<PartitionKeyRange>);

#[async_trait]
impl PartitionKeyRangeSource for StaticSource {
    async fn read_partition_key_ranges(
        &self,
        _: &CollectionId,
    ) -> CacheResult<Vec<PartitionKeyRange>> {
        Ok(self.0.clone())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// P0 = ["", "B"), P1 = ["B", "M"), P2 = ["M", end).
const THREE_PARTITIONS: &[(&str, &str)] = &[("", "B"), ("B", "M"), ("M", "")];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn collection() -> CollectionId {
    CollectionId::new("dbs/db/colls/orders")
}

fn layout(bounds: &[(&str, &str)]) -> Vec<PartitionKeyRange> {
    bounds
        .iter()
        .enumerate()
        .map(|(i, (min, max))| {
            PartitionKeyRange::new(PartitionKeyRangeId::new(format!("P{i}")), *min, *max)
                .unwrap()
        })
        .collect()
}

fn range(min: &str, max: &str, min_incl: bool, max_incl: bool) -> Range {
    Range::new(min, max, min_incl, max_incl).unwrap()
}

fn ids(ranges: &[PartitionKeyRange]) -> Vec<&str> {
    ranges.iter().map(|r| r.id().as_str()).collect()
}

fn resolver(bounds: &[(&str, &str)], fault: Fault) -> RangeResolver<CountingProvider> {
    init_tracing();
    RangeResolver::new(
        ResolverConfig::default(),
        CountingProvider::new(bounds, fault),
    )
}

/// Returns true if some returned partition owns `key`.
fn is_covered(key: &str, partitions: &[PartitionKeyRange]) -> bool {
    partitions.iter().any(|p| p.contains(key))
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_scenario_point_then_range_in_next_partition() {
    let resolver = resolver(THREE_PARTITIONS, Fault::None);
    let ranges = [range("A", "A", true, true), range("C", "K", true, false)];

    let result = resolver.resolve(&collection(), &ranges).await.unwrap();

    assert_eq!(ids(&result), vec!["P0", "P1"]);
    assert_eq!(resolver.provider().fetches(), 1);
    assert_eq!(resolver.provider().queries(), 2);
}

#[tokio::test]
async fn test_scenario_shared_inclusive_endpoint_is_invalid() {
    let resolver = resolver(THREE_PARTITIONS, Fault::None);
    let ranges = [range("A", "M", true, true), range("M", "Z", true, false)];

    let err = resolver.resolve(&collection(), &ranges).await.unwrap_err();

    assert!(matches!(err, RoutingError::InvalidInput { .. }));
    assert_eq!(resolver.provider().fetches(), 0);
    assert_eq!(resolver.provider().queries(), 0);
}

#[tokio::test]
async fn test_scenario_empty_range_is_skipped() {
    let resolver = resolver(THREE_PARTITIONS, Fault::None);
    let ranges = [
        range("A", "A", true, true),
        range("F", "F", false, false),
        range("N", "P", true, false),
    ];

    let result = resolver.resolve(&collection(), &ranges).await.unwrap();

    assert_eq!(ids(&result), vec!["P0", "P2"]);
    assert_eq!(resolver.provider().queries(), 2);
    let queried = resolver.provider().map.queried.lock().unwrap().clone();
    assert!(queried.iter().all(|r| !r.is_empty()));
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn test_resolve_empty_input_makes_no_calls() {
    let resolver = resolver(THREE_PARTITIONS, Fault::None);

    let result = resolver.resolve(&collection(), &[]).await.unwrap();

    assert!(result.is_empty());
    assert_eq!(resolver.provider().fetches(), 0);
    assert_eq!(resolver.provider().queries(), 0);
}

#[tokio::test]
async fn test_resolve_overlapping_input_is_rejected() {
    let resolver = resolver(THREE_PARTITIONS, Fault::None);
    let cases = [
        vec![range("A", "D", true, false), range("C", "K", true, false)],
        vec![range("C", "K", true, false), range("A", "B", true, false)],
        vec![Range::point("K"), Range::point("K")],
        vec![
            Range::point("A"),
            Range::point("C"),
            range("B", "Z", true, false),
        ],
    ];

    for ranges in cases {
        let err = resolver.resolve(&collection(), &ranges).await.unwrap_err();
        assert!(err.is_invalid_input(), "expected InvalidInput for {ranges:?}");
    }
    assert_eq!(resolver.provider().fetches(), 0);
}

#[tokio::test]
async fn test_resolve_adjacent_exclusive_ranges_are_valid() {
    let resolver = resolver(THREE_PARTITIONS, Fault::None);
    let ranges = [range("A", "M", true, false), range("M", "Z", true, false)];

    let result = resolver.resolve(&collection(), &ranges).await.unwrap();

    assert_eq!(ids(&result), vec!["P0", "P1", "P2"]);
}

#[tokio::test]
async fn test_resolve_clustered_points_query_once() {
    let resolver = resolver(THREE_PARTITIONS, Fault::None);
    let ranges: Vec<Range> = ["C", "D", "E", "F", "G", "H"]
        .iter()
        .map(|k| Range::point(*k))
        .collect();

    let result = resolver.resolve(&collection(), &ranges).await.unwrap();

    assert_eq!(ids(&result), vec!["P1"]);
    assert_eq!(resolver.provider().queries(), 1);
}

#[tokio::test]
async fn test_resolve_queries_bounded_by_partitions_touched() {
    // 26 single-letter partitions: ["", "B"), ["B", "C"), ..., ["Z", end).
    let letters: Vec<String> = (b'B'..=b'Z').map(|c| (c as char).to_string()).collect();
    let mut bounds: Vec<(&str, &str)> = Vec::new();
    let mut min = "";
    for letter in &letters {
        bounds.push((min, letter.as_str()));
        min = letter.as_str();
    }
    bounds.push((min, ""));

    let resolver = resolver(&bounds, Fault::None);
    // Ten point reads in each of three partitions.
    let keys: Vec<String> = ["D", "K", "R"]
        .iter()
        .flat_map(|p| (0..10).map(move |i| format!("{p}{i}")))
        .collect();
    let ranges: Vec<Range> = keys.iter().map(|k| Range::point(k.as_str())).collect();

    let result = resolver.resolve(&collection(), &ranges).await.unwrap();

    assert_eq!(ids(&result), vec!["P3", "P10", "P17"]);
    assert_eq!(resolver.provider().queries(), 3);
}

#[tokio::test]
async fn test_resolve_range_starting_inside_last_partition_is_trimmed() {
    let resolver = resolver(THREE_PARTITIONS, Fault::None);
    let ranges = [range("0", "1", true, false), range("A", "K", true, false)];

    let result = resolver.resolve(&collection(), &ranges).await.unwrap();

    assert_eq!(ids(&result), vec!["P0", "P1"]);
    let queried = resolver.provider().map.queried.lock().unwrap().clone();
    assert_eq!(queried.len(), 2);
    assert_eq!(queried[1], range("B", "K", false, false));
}

#[tokio::test]
async fn test_resolve_is_deterministic() {
    let resolver = resolver(THREE_PARTITIONS, Fault::None);
    let ranges = [
        Range::point("0"),
        range("A", "C", false, true),
        range("L", "N", true, false),
        Range::point("X"),
    ];

    let first = resolver.resolve(&collection(), &ranges).await.unwrap();
    let second = resolver.resolve(&collection(), &ranges).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(ids(&first), vec!["P0", "P1", "P2"]);
}

#[tokio::test]
async fn test_resolve_output_has_no_repeats() {
    let resolver = resolver(THREE_PARTITIONS, Fault::None);
    let ranges = [
        range("A", "B", true, true),
        range("C", "M", true, true),
        range("N", "O", true, false),
    ];

    let result = resolver.resolve(&collection(), &ranges).await.unwrap();

    assert_eq!(ids(&result), vec!["P0", "P1", "P2"]);
}

#[tokio::test]
async fn test_resolve_randomized_coverage() {
    let alphabet: Vec<char> = "0123456789ABCDEF".chars().collect();
    let bounds: &[(&str, &str)] = &[
        ("", "1"),
        ("1", "3F"),
        ("3F", "7"),
        ("7", "7A"),
        ("7A", "C"),
        ("C", ""),
    ];
    let resolver = resolver(bounds, Fault::None);

    for seed in 0..200_u64 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        // Random sorted keys, paired up into non-overlapping ranges.
        let count = rng.gen_range(1..12) * 2;
        let mut keys: Vec<String> = (0..count)
            .map(|_| {
                let len = rng.gen_range(1..4);
                (0..len)
                    .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                    .collect()
            })
            .collect();
        keys.sort();
        keys.dedup();

        let mut ranges = Vec::new();
        for pair in keys.chunks_exact(2) {
            let r = range(&pair[0], &pair[1], rng.gen_bool(0.5), rng.gen_bool(0.5));
            if ranges.last().map_or(true, |prev: &Range| prev.precedes(&r)) {
                ranges.push(r);
            }
        }

        let result = resolver.resolve(&collection(), &ranges).await.unwrap();

        for r in &ranges {
            for key in [r.min(), r.max()] {
                if r.contains(key) {
                    assert!(
                        is_covered(key, &result),
                        "seed {seed}: key {key:?} of {r} not covered by {:?}",
                        ids(&result)
                    );
                }
            }
            // A key strictly inside the range.
            let inner = format!("{}0", r.min());
            if r.contains(&inner) {
                assert!(is_covered(&inner, &result), "seed {seed}: {inner:?} of {r}");
            }
        }

        let starts: Vec<&str> = result.iter().map(PartitionKeyRange::min_inclusive).collect();
        assert!(
            starts.windows(2).all(|w| w[0] < w[1]),
            "seed {seed}: output not in key order"
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_resolve_concurrent_calls_are_independent() {
    let resolver = Arc::new(resolver(THREE_PARTITIONS, Fault::None));

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..16 {
        let resolver = Arc::clone(&resolver);
        tasks.spawn(async move {
            let ranges = if i % 2 == 0 {
                vec![Range::point("A"), range("C", "K", true, false)]
            } else {
                vec![range("N", "Z", true, true)]
            };
            let result = resolver.resolve(&collection(), &ranges).await.unwrap();
            (i, ids(&result).join(","))
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (i, got) = joined.unwrap();
        let expected = if i % 2 == 0 { "P0,P1" } else { "P2" };
        assert_eq!(got, expected);
    }
    assert_eq!(resolver.provider().fetches(), 16);
}

// ============================================================================
// Fault injection
// ============================================================================

#[tokio::test]
async fn test_resolve_empty_overlap_is_routing_inconsistency() {
    let resolver = resolver(THREE_PARTITIONS, Fault::EmptyOverlap);

    let err = resolver
        .resolve(&collection(), &[range("C", "K", true, false)])
        .await
        .unwrap_err();

    match err {
        RoutingError::RoutingInconsistency {
            collection: c,
            range: r,
            ..
        } => {
            assert_eq!(c, collection());
            assert_eq!(r, range("C", "K", true, false));
        }
        other => panic!("expected RoutingInconsistency, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resolve_short_coverage_is_routing_inconsistency() {
    let resolver = resolver(THREE_PARTITIONS, Fault::TruncateLast);

    let err = resolver
        .resolve(&collection(), &[range("A", "N", true, false)])
        .await
        .unwrap_err();

    assert!(err.is_routing_inconsistency(), "got {err:?}");
}

#[tokio::test]
async fn test_resolve_inconsistency_returns_no_partial_result() {
    let resolver = resolver(THREE_PARTITIONS, Fault::TruncateLast);
    // The first range resolves fine on its own; the second spans two partitions.
    let ranges = [Range::point("A"), range("C", "N", true, false)];

    let result = resolver.resolve(&collection(), &ranges).await;

    assert!(matches!(
        result,
        Err(RoutingError::RoutingInconsistency { .. })
    ));
}

// ============================================================================
// Through the cache
// ============================================================================

#[tokio::test]
async fn test_resolve_through_cache() {
    init_tracing();
    let cache = Arc::new(RoutingMapCache::new(
        StaticSource(layout(THREE_PARTITIONS)),
        RoutingMapCacheConfig::for_testing(),
    ));
    let resolver = RangeResolver::with_provider(Arc::clone(&cache));

    let ranges = [Range::point("A"), range("C", "K", true, false)];
    let result = resolver.resolve(&collection(), &ranges).await.unwrap();
    assert_eq!(ids(&result), vec!["P0", "P1"]);

    assert_eq!(cache.len(), 1);
    assert!(cache.invalidate(&collection()));
}

#[tokio::test]
async fn test_resolve_keys_past_ff_reach_last_partition() {
    let resolver = resolver(&[("", "7F"), ("7F", "")], Fault::None);

    for r in [
        Range::point("a"),
        range("80", "FF", true, true),
        Range::point("FFA"),
    ] {
        let result = resolver.resolve_one(&collection(), &r).await.unwrap();
        assert_eq!(ids(&result), vec!["P1"], "range {r}");
    }

    let ranges = [
        range("80", "FF", true, true),
        Range::point("FFA"),
        Range::point("a"),
    ];
    let result = resolver.resolve(&collection(), &ranges).await.unwrap();
    assert_eq!(ids(&result), vec!["P1"]);
    assert_eq!(resolver.provider().queries(), 4);
}

#[tokio::test]
async fn test_resolve_layout_ending_at_ff_is_rejected_by_cache() {
    init_tracing();
    let resolver = RangeResolver::with_provider(RoutingMapCache::new(
        StaticSource(layout(&[("", "7F"), ("7F", "FF")])),
        RoutingMapCacheConfig::for_testing(),
    ));

    let err = resolver
        .resolve(&collection(), &[Range::point("a")])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RoutingError::Cache(CacheError::InvalidRoutingMap { .. })
    ));
}

#[tokio::test]
async fn test_resolve_passes_cache_errors_through() {
    init_tracing();
    let resolver = RangeResolver::with_provider(RoutingMapCache::with_defaults(UnreachableSource));

    let err = resolver
        .resolve(&collection(), &[Range::point("A")])
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RoutingError::Cache(CacheError::Transport {
            collection: collection(),
            message: "503 service unavailable".to_owned(),
        })
    );
}
