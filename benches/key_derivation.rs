//! # Key Derivation Benchmarks
//!
//! Every cached read derives its key before the store is touched, and every write derives an
//! invalidation pattern, so both sit on the request hot path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qarmenu_api::caching::{CacheStore, InMemoryCache, KeyGenerator, ResponseCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn benchmark_key_for_request(c: &mut Criterion) {
    let keys = KeyGenerator::new("cache:", "restaurant_id");
    let mut group = c.benchmark_group("key_for_request");

    let queries = [
        ("selector_only", "restaurant_id=7".to_string()),
        ("unsorted", "lang=en&restaurant_id=7&page=2&sort=name".to_string()),
        (
            "many_params",
            (0..32)
                .map(|i| format!("p{}=v{}", 31 - i, i))
                .chain(std::iter::once("restaurant_id=7".to_string()))
                .collect::<Vec<_>>()
                .join("&"),
        ),
    ];

    for (name, query) in &queries {
        group.throughput(Throughput::Bytes(query.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), query, |b, query| {
            b.iter(|| keys.key_for_request(black_box("/api/menu/public"), Some(black_box(query))))
        });
    }

    group.finish();
}

fn benchmark_patterns(c: &mut Criterion) {
    let keys = KeyGenerator::new("cache:", "restaurant_id");
    let mut group = c.benchmark_group("invalidation_patterns");

    group.bench_function("selector_pattern", |b| {
        b.iter(|| keys.selector_pattern(black_box("/api/categories/public"), black_box("7")))
    });
    group.bench_function("prefix_pattern", |b| {
        b.iter(|| keys.prefix_pattern(black_box("/api/restaurants/by-slug/")))
    });

    group.finish();
}

fn benchmark_memory_lookup(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = Arc::new(InMemoryCache::new());
    let cache = ResponseCache::new(
        store.clone(),
        KeyGenerator::new("cache:", "restaurant_id"),
        1024 * 1024,
    );
    let key = cache
        .keys()
        .key_for_request("/api/menu/public", Some("restaurant_id=7"));

    rt.block_on(async {
        store
            .set(key.as_str(), br#"[{"id":1,"name":"Tea"}]"#, Duration::from_secs(60))
            .await
            .unwrap();
    });

    c.bench_function("memory_store_get", |b| {
        b.iter(|| rt.block_on(async { black_box(store.get(key.as_str()).await.unwrap()) }))
    });
}

criterion_group!(
    benches,
    benchmark_key_for_request,
    benchmark_patterns,
    benchmark_memory_lookup
);
criterion_main!(benches);
