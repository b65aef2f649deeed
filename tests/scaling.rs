//! Scaling tests with a few thousand records.
//!
//! Every operation re-reads the whole file, so these check that the cost
//! stays reasonable and that nothing is lost at size:
//! - Population through the append path
//! - Reopen and full listing
//! - Search across the whole file
//! - Rewrites triggered by update and delete

use flatstore::{RecordPatch, Schema, Store, StoreConfig};
use std::time::Instant;
use tempfile::TempDir;

const RECORD_COUNT: usize = 2_000;

fn test_config(dir: &TempDir, file: &str) -> StoreConfig {
    StoreConfig::new(
        dir.path().join(file),
        Schema::new(["code", "name", "salary"]).unwrap(),
    )
}

/// Timing helper
struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    fn report(&self) {
        println!("  {} took {:.2}ms", self.name, self.elapsed_ms());
    }

    fn report_with_count(&self, count: usize) {
        let ms = self.elapsed_ms();
        let per_item = if count > 0 { ms / count as f64 } else { 0.0 };
        println!(
            "  {} took {:.2}ms ({} items, {:.4}ms/item)",
            self.name, ms, count, per_item
        );
    }
}

fn populate(store: &Store) {
    for i in 0..RECORD_COUNT {
        let name = format!("Employee {i}");
        let salary = (1000 + i).to_string();
        assert!(store
            .add(&format!("E{i:05}"), [("name", name), ("salary", salary)])
            .unwrap());
    }
}

fn run_scaling(file: &str) {
    let dir = TempDir::new().unwrap();
    let store = Store::create(test_config(&dir, file)).unwrap();

    let timer = Timer::new("Add records");
    populate(&store);
    timer.report_with_count(RECORD_COUNT);

    let stats = store.stats().unwrap();
    println!(
        "  Store stats: {} records, {} bytes",
        stats.record_count, stats.size_bytes
    );
    assert_eq!(stats.record_count, RECORD_COUNT as u64);

    drop(store);

    let timer = Timer::new("Reopen and list");
    let store = Store::open(test_config(&dir, file)).unwrap();
    let all = store.list_all().unwrap();
    timer.report();
    assert_eq!(all.len(), RECORD_COUNT);
    assert_eq!(all[0].key, "E00000");
    assert_eq!(all[RECORD_COUNT - 1].key, format!("E{:05}", RECORD_COUNT - 1));

    // "employee 1" hits 1, 10-19, 100-199 and 1000-1999.
    let timer = Timer::new("Search");
    let hits = store.search("employee 1").unwrap();
    timer.report_with_count(hits.len());
    assert_eq!(hits.len(), 1 + 10 + 100 + 1000);

    let timer = Timer::new("Update 100 records");
    for i in (0..RECORD_COUNT).step_by(RECORD_COUNT / 100) {
        let patch = RecordPatch::new().set("salary", "0");
        assert!(store.update(&format!("E{i:05}"), &patch).unwrap());
    }
    timer.report_with_count(100);

    let timer = Timer::new("Delete 100 records");
    for i in (1..RECORD_COUNT).step_by(RECORD_COUNT / 100) {
        assert!(store.delete(&format!("E{i:05}")).unwrap());
    }
    timer.report_with_count(100);

    let remaining = store.list_all().unwrap();
    assert_eq!(remaining.len(), RECORD_COUNT - 100);
    let zeroed = remaining
        .iter()
        .filter(|r| r.field("salary") == Some("0"))
        .count();
    assert_eq!(zeroed, 100);
}

#[test]
fn test_scaling_delimited() {
    println!("\n=== Delimited text ===");
    run_scaling("staff.csv");
}

#[test]
fn test_scaling_document() {
    println!("\n=== JSON document ===");
    run_scaling("staff.json");
}
