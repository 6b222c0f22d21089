//! Integration tests for the catalog file, pricing and baseline import.
//!
//! These tests work on copies of the fixture files so every run starts from
//! the same on-disk state.

use price_sync::baseline::{self, StatisticsClient};
use price_sync::catalog::parse_timestamp;
use price_sync::{CatalogStore, PricingEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn copy_fixture(name: &str, dir: &Path) -> PathBuf {
    let target = dir.join(name);
    std::fs::copy(fixtures_path().join(name), &target).unwrap();
    target
}

// ==================== Catalog Loading Tests ====================

mod load_catalog {
    use super::*;

    #[test]
    fn loads_fixture_catalog() {
        let store = CatalogStore::load(fixtures_path().join("items.json"));

        assert_eq!(store.len(), 3);
        let milk = store.get("012345678905").unwrap();
        assert_eq!(milk.item_name, "Whole Milk 1 gal");
        assert_eq!(milk.meter, 3);
        assert_eq!(milk.history.len(), 4);
        assert_eq!(milk.last_purchased, parse_timestamp("2026-02-01 09:15:00"));
    }

    #[test]
    fn fills_missing_fields_and_raises_low_demand() {
        let store = CatalogStore::load(fixtures_path().join("items.json"));

        let bread = store.get("041220576463").unwrap();
        assert_eq!(bread.meter, 0);
        assert!(bread.history.is_empty());
        assert!(bread.last_updated.is_none());
        assert_eq!(bread.demand_price, bread.base_price);
    }

    #[test]
    fn lookup_returns_name_and_price() {
        let store = CatalogStore::load(fixtures_path().join("items.json"));

        assert_eq!(
            store.lookup("036000291452"),
            Some(("Large Eggs 12ct".to_string(), 6.23))
        );
        assert_eq!(store.lookup("999"), None);
    }
}

// ==================== Pricing On Disk Tests ====================

mod pricing_on_disk {
    use super::*;

    #[test]
    fn purchase_completes_meter_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = copy_fixture("items.json", dir.path());
        let engine = PricingEngine::new(Arc::new(CatalogStore::load(&path)));
        let now = parse_timestamp("2026-02-02 10:00:00").unwrap();

        let report = engine.process_at(&["012345678905", "012345678905"], now);
        assert_eq!(report.steps, 1);

        let milk = CatalogStore::load(&path).get("012345678905").unwrap();
        assert_eq!(milk.meter, 0);
        assert_eq!(milk.current_price, 4.35);
        assert_eq!(milk.history.last(), Some(&4.35));
        assert_eq!(milk.last_updated, Some(now));
    }

    #[test]
    fn decay_sweep_lowers_unsold_item() {
        let dir = TempDir::new().unwrap();
        let path = copy_fixture("items.json", dir.path());
        let engine = PricingEngine::new(Arc::new(CatalogStore::load(&path)));

        let cutoff = parse_timestamp("2026-02-02 09:15:00").unwrap();
        let now = parse_timestamp("2026-02-02 09:15:01").unwrap();
        let report = engine.decay_at(cutoff, now);
        assert_eq!(report.lowered, 1);
        assert_eq!(report.never_purchased, 2);

        let milk = CatalogStore::load(&path).get("012345678905").unwrap();
        assert_eq!(milk.demand_price, 4.12);
        assert_eq!(milk.current_price, 4.12);
        assert_eq!(milk.history.last(), Some(&4.12));
    }

    #[test]
    fn snapshot_since_lists_only_updated_items() {
        let store = CatalogStore::load(fixtures_path().join("items.json"));

        let since = parse_timestamp("2026-02-01 00:00:00").unwrap();
        let delta = store.snapshot_since(since);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta.get("012345678905"), Some(&4.32));
        assert_eq!(store.snapshot_all().len(), 3);
    }
}

// ==================== Baseline Import Tests ====================

mod baseline_import {
    use super::*;

    #[test]
    fn parses_seed_fixture() {
        let entries = baseline::load_baseline_file(&fixtures_path().join("baseline.json")).unwrap();

        assert_eq!(entries.len(), 4);
        assert_eq!(
            baseline::series_ids(&entries),
            vec!["APU0000708111".to_string(), "APU0000717311".to_string()]
        );
    }

    #[tokio::test]
    async fn imports_only_new_priced_items() {
        let dir = TempDir::new().unwrap();
        let path = copy_fixture("items.json", dir.path());
        let store = CatalogStore::load(&path);
        let client = StatisticsClient::new();

        let inserted = baseline::import(&store, &fixtures_path().join("baseline.json"), false, &client)
            .await
            .unwrap();

        // Eggs already exist, the mystery item has no price
        assert_eq!(inserted, 2);
        assert_eq!(store.len(), 5);
        assert_eq!(store.get("036000291452").unwrap().base_price, 6.23);

        let coffee = CatalogStore::load(&path).get("070038000563").unwrap();
        assert_eq!(coffee.base_price, 7.21);
        assert_eq!(coffee.current_price, 7.21);
        assert!(!store.contains("000000000000"));
    }
}
