//! Integration tests rendering collectors through a Prometheus registry.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{bucket_lines, numbered_bucket, render, scrape, MemoryEngine};
use prometheus::Registry;
use prombolt::{
    BoltCollector, BucketStats, CollectorBuilder, DatabaseStats, FixedBuckets, MetricKind,
    Observation, PromboltError, TxStats,
};

fn numbered_stats() -> DatabaseStats {
    DatabaseStats {
        free_page_n: 1,
        pending_page_n: 2,
        free_alloc: 3,
        freelist_inuse: 4,
        tx_n: 5,
        open_tx_n: 6,
        tx_stats: TxStats {
            page_count: 7,
            page_alloc: 8,
            cursor_count: 9,
            node_count: 10,
            node_deref: 11,
            rebalance: 12,
            rebalance_time: Duration::from_secs(13),
            split: 14,
            spill: 15,
            spill_time: Duration::from_secs(16),
            write: 17,
            write_time: Duration::from_secs(18),
        },
    }
}

fn assert_contains(got: &str, expected: &str) {
    assert!(
        got.contains(expected),
        "output did not contain expected metric: {:?}\n{}",
        expected,
        got
    );
}

#[test]
fn test_database_stats_exposition() {
    let engine = Arc::new(MemoryEngine::new(numbered_stats(), vec![]));
    let got = scrape(BoltCollector::new("test.db", engine));

    for line in [
        r#"bolt_db_freelist_free_pages{database="test.db"} 1"#,
        r#"bolt_db_freelist_pending_pages{database="test.db"} 2"#,
        r#"bolt_db_freelist_free_page_allocated_bytes{database="test.db"} 3"#,
        r#"bolt_db_freelist_in_use_bytes{database="test.db"} 4"#,
        r#"bolt_db_read_tx_total{database="test.db"} 5"#,
        r#"bolt_db_open_read_tx{database="test.db"} 6"#,
        r#"bolt_tx_pages_allocated_total{database="test.db"} 7"#,
        r#"bolt_tx_pages_allocated_bytes_total{database="test.db"} 8"#,
        r#"bolt_tx_cursors_total{database="test.db"} 9"#,
        r#"bolt_tx_nodes_allocated_total{database="test.db"} 10"#,
        r#"bolt_tx_nodes_dereferenced_total{database="test.db"} 11"#,
        r#"bolt_tx_node_rebalances_total{database="test.db"} 12"#,
        r#"bolt_tx_node_rebalance_seconds_total{database="test.db"} 13"#,
        r#"bolt_tx_nodes_split_total{database="test.db"} 14"#,
        r#"bolt_tx_nodes_spilled_total{database="test.db"} 15"#,
        r#"bolt_tx_nodes_spilled_seconds_total{database="test.db"} 16"#,
        r#"bolt_tx_writes_total{database="test.db"} 17"#,
        r#"bolt_tx_write_seconds_total{database="test.db"} 18"#,
    ] {
        assert_contains(&got, line);
    }
}

#[test]
fn test_metric_types_in_exposition() {
    let engine = Arc::new(MemoryEngine::new(
        numbered_stats(),
        vec![("foo", numbered_bucket())],
    ));
    let got = scrape(BoltCollector::new("test.db", engine));

    assert_contains(&got, "# TYPE bolt_db_freelist_free_pages gauge");
    assert_contains(&got, "# TYPE bolt_db_open_read_tx gauge");
    assert_contains(&got, "# TYPE bolt_db_read_tx_total counter");
    assert_contains(&got, "# TYPE bolt_tx_write_seconds_total counter");
    assert_contains(&got, "# TYPE bolt_bucket_depth gauge");
}

#[test]
fn test_single_bucket_exposition() {
    let engine = Arc::new(MemoryEngine::new(
        DatabaseStats::default(),
        vec![("foo", numbered_bucket())],
    ));
    let got = scrape(BoltCollector::new("test.db", engine));

    for line in bucket_lines("foo", "test.db") {
        assert_contains(&got, &line);
    }
    assert_contains(
        &got,
        r#"bolt_bucket_logical_branch_pages{bucket="foo",database="test.db"} 1"#,
    );
}

#[test]
fn test_multiple_buckets_exposition() {
    let engine = Arc::new(MemoryEngine::new(
        DatabaseStats::default(),
        vec![("foo", numbered_bucket()), ("bar", numbered_bucket())],
    ));
    let got = scrape(BoltCollector::new("test.db", engine));

    for bucket in ["foo", "bar"] {
        for line in bucket_lines(bucket, "test.db") {
            assert_contains(&got, &line);
        }
    }
    assert_eq!(got.matches("bolt_bucket_keys{").count(), 2);
}

#[test]
fn test_fixed_buckets_strategy() {
    let collector = BoltCollector::with_strategy(
        "test.db",
        Arc::new(MemoryEngine::default()),
        FixedBuckets::new([("foo", numbered_bucket())]),
    );
    let got = scrape(collector);
    for line in bucket_lines("foo", "test.db") {
        assert_contains(&got, &line);
    }
}

#[test]
fn test_failed_scan_keeps_visited_buckets() {
    let engine = Arc::new(MemoryEngine::new(
        numbered_stats(),
        vec![
            ("a", numbered_bucket()),
            ("b", numbered_bucket()),
            ("c", numbered_bucket()),
        ],
    ));
    engine.fail_after(2);
    let collector = BoltCollector::new("test.db", engine);

    let obs = collector.collect();
    assert_eq!(obs.len(), 18 + 2 * 13 + 1);
    assert_eq!(obs.iter().filter(|o| o.is_invalid()).count(), 1);
    assert!(obs.last().unwrap().is_invalid());
    assert!(obs
        .iter()
        .filter_map(Observation::as_sample)
        .all(|s| s.label("bucket") != Some("c")));

    let got = scrape(collector);
    for bucket in ["a", "b"] {
        for line in bucket_lines(bucket, "test.db") {
            assert_contains(&got, &line);
        }
    }
    assert!(!got.contains(r#"bucket="c""#));
    assert_contains(
        &got,
        r#"bolt_scrape_error{database="test.db",error="engine error: invalid page type: 0: 4",metric="bolt_bucket_buckets"} 1"#,
    );
    assert_contains(&got, r#"bolt_db_freelist_free_pages{database="test.db"} 1"#);
}

#[test]
fn test_collect_is_idempotent() {
    let engine = Arc::new(MemoryEngine::new(
        numbered_stats(),
        vec![("foo", numbered_bucket()), ("bar", BucketStats::default())],
    ));
    let collector = BoltCollector::new("test.db", engine.clone());

    let first = collector.collect();
    let second = collector.collect();
    assert_eq!(first, second);
    assert_eq!(engine.views.load(Ordering::SeqCst), 2);
}

#[test]
fn test_fresh_snapshot_each_scrape() {
    let engine = Arc::new(MemoryEngine::new(DatabaseStats::default(), vec![]));
    let registry = Registry::new();
    registry
        .register(Box::new(BoltCollector::new("test.db", engine.clone())))
        .unwrap();

    assert_contains(&render(&registry), r#"bolt_db_read_tx_total{database="test.db"} 0"#);

    engine.set_stats(DatabaseStats {
        tx_n: 42,
        ..Default::default()
    });
    assert_contains(&render(&registry), r#"bolt_db_read_tx_total{database="test.db"} 42"#);
}

#[test]
fn test_observation_kinds_match_catalog() {
    let engine = Arc::new(MemoryEngine::new(
        numbered_stats(),
        vec![("foo", numbered_bucket())],
    ));
    let collector = BoltCollector::new("test.db", engine);

    let counters: Vec<&str> = collector
        .describe()
        .into_iter()
        .filter(|d| d.kind() == MetricKind::Counter)
        .map(|d| d.fq_name())
        .collect();
    assert_eq!(counters.len(), 13);
    assert!(counters.iter().all(|n| n.ends_with("_total")));
}

#[test]
fn test_register_multiple_databases() {
    let registry = Registry::new();
    let a = Arc::new(MemoryEngine::new(numbered_stats(), vec![("foo", numbered_bucket())]));
    let b = Arc::new(MemoryEngine::new(numbered_stats(), vec![("foo", numbered_bucket())]));

    registry
        .register(Box::new(BoltCollector::new("db_A", a)))
        .unwrap();
    registry
        .register(Box::new(BoltCollector::new("db_B", b)))
        .unwrap();

    let got = render(&registry);
    assert_contains(&got, r#"bolt_bucket_keys{bucket="foo",database="db_A"} 5"#);
    assert_contains(&got, r#"bolt_bucket_keys{bucket="foo",database="db_B"} 5"#);
}

#[test]
fn test_register_same_database_twice_fails() {
    let registry = Registry::new();
    let engine = Arc::new(MemoryEngine::default());

    CollectorBuilder::new()
        .database("dup.db")
        .prometheus_registry(registry.clone())
        .build(engine.clone())
        .unwrap();

    let err = CollectorBuilder::new()
        .database("dup.db")
        .prometheus_registry(registry)
        .build(engine)
        .unwrap_err();
    assert!(matches!(err, PromboltError::Registration(_)));
}

#[test]
fn test_builder_registers_collector() {
    let registry = Registry::new();
    let engine = Arc::new(MemoryEngine::new(numbered_stats(), vec![]));

    let collector = CollectorBuilder::new()
        .database("built.db")
        .prometheus_registry(registry.clone())
        .build(engine)
        .unwrap();
    assert_eq!(collector.database(), "built.db");
    assert_contains(
        &render(&registry),
        r#"bolt_tx_writes_total{database="built.db"} 17"#,
    );
}

#[test]
fn test_concurrent_scrapes() {
    let names: Vec<String> = (0..16).map(|i| format!("bucket{:02}", i)).collect();
    let engine = Arc::new(MemoryEngine::new(
        numbered_stats(),
        names.iter().map(|n| (n.as_str(), numbered_bucket())).collect(),
    ));
    let collector = BoltCollector::new("test.db", engine.clone());
    let expected = collector.collect().len();
    assert_eq!(expected, 18 + 16 * 13);

    engine.set_slow();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let collector = collector.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    let obs = collector.collect();
                    assert_eq!(obs.len(), expected);
                    assert!(obs.iter().all(|o| !o.is_invalid()));
                }
            })
        })
        .collect();

    for h in handles {
        h.join().expect("scrape thread panicked");
    }
    assert!(
        !engine.overlapped.load(Ordering::SeqCst),
        "a scrape started while another was still reading the engine"
    );
    assert_eq!(engine.views.load(Ordering::SeqCst), 1 + 8 * 10);
}

#[test]
fn test_invalid_utf8_bucket_names_render_as_distinct_series() {
    let engine = Arc::new(MemoryEngine::new(DatabaseStats::default(), vec![]));
    engine.push_bucket(vec![b'b', 0xff], numbered_bucket());
    engine.push_bucket(vec![b'b', 0xfe], numbered_bucket());
    let got = scrape(BoltCollector::new("test.db", engine));

    assert_eq!(got.matches("bolt_bucket_keys{").count(), 2);
    assert_contains(&got, r#"bolt_bucket_keys{bucket="b\\xff",database="test.db"} 5"#);
    assert_contains(&got, r#"bolt_bucket_keys{bucket="b\\xfe",database="test.db"} 5"#);
}
