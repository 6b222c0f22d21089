//! Mutex-guarded catalog store with whole-file JSON persistence
//!
//! The store is the only gateway to the item map. Every operation takes the
//! lock for a bounded read-modify-write and never holds it across file I/O.

use super::record::ItemRecord;
use crate::error::CatalogError;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Barcode to price mapping, the unit of delta sync
pub type PriceMap = BTreeMap<String, f64>;

/// Outcome of merging a peer's prices into the local catalog
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MergeReport {
    /// Prices raised to the remote value
    pub updated: usize,
    /// Remote value was equal or lower, local price kept
    pub unchanged: usize,
    /// Barcodes not present in the local catalog
    pub unknown: Vec<String>,
    /// Entries rejected because the price was not a finite number
    pub invalid: usize,
}

/// Durable map of barcode to item record
pub struct CatalogStore {
    path: Option<PathBuf>,
    items: Mutex<BTreeMap<String, ItemRecord>>,
    persist: Mutex<()>,
}

impl CatalogStore {
    /// Load the catalog snapshot at `path`, or start empty if it is missing or unreadable
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = read_snapshot(&path);
        Self {
            path: Some(path),
            items: Mutex::new(items),
            persist: Mutex::new(()),
        }
    }

    /// Create a store that is never written to disk
    pub fn in_memory(records: impl IntoIterator<Item = (String, ItemRecord)>) -> Self {
        Self {
            path: None,
            items: Mutex::new(records.into_iter().collect()),
            persist: Mutex::new(()),
        }
    }

    /// Location of the snapshot file, if the store is file-backed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn items(&self) -> MutexGuard<'_, BTreeMap<String, ItemRecord>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the full catalog to disk
    ///
    /// The snapshot goes to a sibling temp file first and is renamed over the
    /// target, so a failed write leaves the previous file intact.
    pub fn save(&self) -> Result<(), CatalogError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        // Serializes writers so an older snapshot never lands after a newer one
        let _writer = self.persist.lock().unwrap_or_else(PoisonError::into_inner);

        let (content, count) = {
            let items = self.items();
            (serde_json::to_string_pretty(&*items)?, items.len())
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = temp_path(path);
        if let Err(e) = std::fs::write(&tmp, content) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        log::debug!("Saved catalog with {} items to {}", count, path.display());
        Ok(())
    }

    /// Save and downgrade failure to a warning; memory stays authoritative
    pub fn persist(&self) {
        if let Err(e) = self.save() {
            log::warn!(
                "Failed to save catalog, keeping in-memory state until next save: {}",
                e
            );
        }
    }

    /// Number of items in the catalog
    pub fn len(&self) -> usize {
        self.items().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Check whether a barcode is part of the catalog
    pub fn contains(&self, barcode: &str) -> bool {
        self.items().contains_key(barcode)
    }

    /// Clone a single record
    pub fn get(&self, barcode: &str) -> Option<ItemRecord> {
        self.items().get(barcode).cloned()
    }

    /// Look up the display name and current price of an item
    pub fn lookup(&self, barcode: &str) -> Option<(String, f64)> {
        let items = self.items();
        match items.get(barcode) {
            Some(item) => Some((item.item_name.clone(), item.current_price)),
            None => {
                log::info!("Item with barcode {} not found", barcode);
                None
            }
        }
    }

    /// Clone of every record, for display
    pub fn all_records(&self) -> BTreeMap<String, ItemRecord> {
        self.items().clone()
    }

    /// Prices of items whose `last_updated` is at or after `since`
    pub fn snapshot_since(&self, since: NaiveDateTime) -> PriceMap {
        self.items()
            .iter()
            .filter(|(_, item)| item.last_updated.is_some_and(|ts| ts >= since))
            .map(|(barcode, item)| (barcode.clone(), item.current_price))
            .collect()
    }

    /// Prices of every item
    pub fn snapshot_all(&self) -> PriceMap {
        self.items()
            .iter()
            .map(|(barcode, item)| (barcode.clone(), item.current_price))
            .collect()
    }

    /// Merge a peer's prices with max-wins: a local price is only ever raised
    ///
    /// Applying the same or a smaller value is a no-op, so duplicated or
    /// reordered messages converge to the same result.
    pub fn merge_remote(&self, updates: &PriceMap) -> MergeReport {
        let mut report = MergeReport::default();
        {
            let mut items = self.items();
            for (barcode, &remote) in updates {
                if !remote.is_finite() {
                    log::warn!("Ignoring non-finite price for {} from peer", barcode);
                    report.invalid += 1;
                    continue;
                }
                match items.get_mut(barcode) {
                    Some(item) if remote > item.current_price => {
                        log::debug!(
                            "Raising {} from {:.2} to {:.2} (peer)",
                            barcode,
                            item.current_price,
                            remote
                        );
                        item.current_price = remote;
                        report.updated += 1;
                    }
                    Some(_) => report.unchanged += 1,
                    None => {
                        log::warn!("Item {} from peer is not in local catalog", barcode);
                        report.unknown.push(barcode.clone());
                    }
                }
            }
        }

        if report.updated > 0 {
            log::info!("Updated {} prices from sync", report.updated);
            self.persist();
        } else {
            log::info!("No prices updated from sync");
        }
        report
    }

    /// Operator reset of every record to its base price, then persist
    pub fn reset(&self) {
        let count = {
            let mut items = self.items();
            items.values_mut().for_each(ItemRecord::reset);
            items.len()
        };
        log::info!("Reset {} items to base price", count);
        self.persist();
    }

    /// Add records that are not yet in the catalog; existing ones are left untouched
    ///
    /// Returns the number of records inserted.
    pub fn import_baseline(&self, records: impl IntoIterator<Item = (String, ItemRecord)>) -> usize {
        let mut items = self.items();
        let mut inserted = 0;
        for (barcode, record) in records {
            if items.contains_key(&barcode) {
                log::debug!("Baseline item {} already in catalog, keeping it", barcode);
                continue;
            }
            items.insert(barcode, record);
            inserted += 1;
        }
        inserted
    }

    /// Run a read-modify-write against the map under a single lock acquisition
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut BTreeMap<String, ItemRecord>) -> R) -> R {
        let mut items = self.items();
        f(&mut items)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn read_snapshot(path: &Path) -> BTreeMap<String, ItemRecord> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!(
                "Catalog file {} not found, starting with empty catalog",
                path.display()
            );
            return BTreeMap::new();
        }
        Err(e) => {
            log::warn!(
                "Failed to read catalog file {}, starting with empty catalog: {}",
                path.display(),
                e
            );
            return BTreeMap::new();
        }
    };

    match serde_json::from_str::<BTreeMap<String, ItemRecord>>(&content) {
        Ok(mut items) => {
            for (barcode, item) in items.iter_mut() {
                if item.normalize() {
                    log::warn!("Record {} had demand below base or meter out of range, repaired", barcode);
                }
            }
            log::info!("Loaded {} items from {}", items.len(), path.display());
            items
        }
        Err(e) => {
            log::warn!(
                "Failed to parse catalog file {}, starting with empty catalog: {}",
                path.display(),
                e
            );
            BTreeMap::new()
        }
    }
}
