//! Scan session: collects scanned barcodes into a transaction

use crate::pricing::{PricingEngine, ProcessReport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// How many scans the recent list keeps
pub const RECENT_LIMIT: usize = 20;

/// Most recently scanned barcodes, newest last
#[derive(Debug, Default)]
pub struct RecentScans {
    scans: Mutex<VecDeque<String>>,
}

impl RecentScans {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, barcode: &str) {
        let mut scans = self.scans.lock().unwrap_or_else(PoisonError::into_inner);
        scans.push_back(barcode.to_string());
        while scans.len() > RECENT_LIMIT {
            scans.pop_front();
        }
    }

    /// Up to `n` latest scans, newest first
    pub fn latest(&self, n: usize) -> Vec<String> {
        let scans = self.scans.lock().unwrap_or_else(PoisonError::into_inner);
        scans.iter().rev().take(n).cloned().collect()
    }

    pub fn clear(&self) {
        self.scans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// One checkout in progress
pub struct ScanSession {
    engine: PricingEngine,
    transaction: Vec<String>,
    recent: Arc<RecentScans>,
}

impl ScanSession {
    pub fn new(engine: PricingEngine, recent: Arc<RecentScans>) -> Self {
        Self {
            engine,
            transaction: Vec::new(),
            recent,
        }
    }

    /// Add a scanned barcode; returns the item name and price when known
    ///
    /// Unknown barcodes still show up in the recent list but are kept out of
    /// the transaction.
    pub fn scan(&mut self, barcode: &str) -> Option<(String, f64)> {
        let barcode = barcode.trim();
        if barcode.is_empty() {
            return None;
        }
        self.recent.record(barcode);

        let found = self.engine.store().lookup(barcode);
        match &found {
            Some((name, price)) => {
                log::info!("Scanned {} ({}) at {:.2}", name, barcode, price);
                self.transaction.push(barcode.to_string());
            }
            None => log::warn!("Scanned barcode {} is unknown, not added", barcode),
        }
        found
    }

    /// Barcodes in the open transaction
    pub fn pending(&self) -> &[String] {
        &self.transaction
    }

    /// Close the transaction and price it
    pub fn finish(&mut self) -> Option<ProcessReport> {
        if self.transaction.is_empty() {
            log::info!("No items in transaction");
            return None;
        }
        let batch = std::mem::take(&mut self.transaction);
        log::info!("Finishing transaction with {} item(s)", batch.len());
        Some(self.engine.process(&batch))
    }

    /// Drop the open transaction without pricing it
    pub fn cancel(&mut self) {
        if !self.transaction.is_empty() {
            log::info!("Cancelled transaction with {} item(s)", self.transaction.len());
            self.transaction.clear();
        }
    }
}
