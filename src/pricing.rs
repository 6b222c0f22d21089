//! Demand-meter pricing and decay
//!
//! Purchases fill a per-item meter; every full meter (5 units) raises the
//! demand price by 1%. Items left unsold past a cutoff decay their demand
//! price by 10% per sweep, never below the base price. The current price is
//! the weighted blend of base and demand price.

use crate::catalog::{local_now, CatalogStore, ItemRecord};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Units per demand step
pub const METER_STEP: u32 = 5;

/// Demand price multiplier applied per full meter
pub const DEMAND_STEP_FACTOR: f64 = 1.01;

/// Demand price multiplier applied per decay sweep
pub const DECAY_FACTOR: f64 = 0.9;

/// Result of processing one purchase batch
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProcessReport {
    /// Purchased quantity per known barcode
    pub purchased: BTreeMap<String, u32>,
    /// Total demand steps applied across the batch
    pub steps: u32,
    /// Barcodes not present in the catalog
    pub unknown: Vec<String>,
}

/// Result of one decay sweep
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DecayReport {
    /// Items whose price went down
    pub lowered: usize,
    /// Items whose demand price went down without a visible price change
    pub demand_only: usize,
    /// Items already at their floor, left unchanged
    pub floored: usize,
    /// Items purchased at or after the cutoff
    pub recent: usize,
    /// Items already repriced after the cutoff, skipped
    pub already_decayed: usize,
    /// Items never purchased, skipped
    pub never_purchased: usize,
}

/// What a decay step did to a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayOutcome {
    Lowered,
    /// Demand price went down but the rounded price did not move
    DemandOnly,
    Unchanged,
}

/// Count purchased units per barcode; order within the batch is irrelevant
pub fn tally<I, S>(barcodes: I) -> BTreeMap<String, u32>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts = BTreeMap::new();
    for barcode in barcodes {
        *counts.entry(barcode.as_ref().to_string()).or_insert(0) += 1;
    }
    counts
}

/// Apply `quantity` purchased units to a record, returning the number of demand steps
pub fn apply_purchase(record: &mut ItemRecord, quantity: u32, now: NaiveDateTime) -> u32 {
    record.seed_history();
    // A meter outside [0, METER_STEP) only comes from a hand-edited snapshot
    record.meter = (record.meter % METER_STEP).saturating_add(quantity);

    let mut steps = 0;
    while record.meter >= METER_STEP {
        record.meter -= METER_STEP;
        record.demand_price *= DEMAND_STEP_FACTOR;
        record.recompute_price();
        record.push_history(record.current_price);
        record.last_updated = Some(now);
        steps += 1;
    }

    record.last_purchased = Some(now);
    steps
}

/// Decay a record's demand price one step toward its base price
///
/// The demand price always moves. When the rounded price stays the same,
/// `current_price`, `last_updated` and history are left alone so the record
/// does not show up in the next sync delta.
pub fn apply_decay(record: &mut ItemRecord, now: NaiveDateTime) -> DecayOutcome {
    let demand = (record.demand_price * DECAY_FACTOR).max(record.base_price);
    if demand == record.demand_price {
        return DecayOutcome::Unchanged;
    }

    record.seed_history();
    record.demand_price = demand;
    let price = record.weighted_price();
    if !price_changed(record.current_price, price) {
        return DecayOutcome::DemandOnly;
    }

    record.current_price = price;
    record.last_updated = Some(now);
    if record
        .last_recorded()
        .map_or(true, |last| price_changed(last, price))
    {
        record.push_history(price);
    }
    DecayOutcome::Lowered
}

fn price_changed(a: f64, b: f64) -> bool {
    (a - b).abs() > 1e-9
}

/// Drives purchase and decay triggers against a shared catalog
#[derive(Clone)]
pub struct PricingEngine {
    store: Arc<CatalogStore>,
}

impl PricingEngine {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }

    /// The catalog this engine mutates
    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    /// Process a purchase batch stamped with the current time
    pub fn process<S: AsRef<str>>(&self, barcodes: &[S]) -> ProcessReport {
        self.process_at(barcodes, local_now())
    }

    /// Process a purchase batch stamped with `now`
    ///
    /// The catalog is persisted once after the whole batch.
    pub fn process_at<S: AsRef<str>>(&self, barcodes: &[S], now: NaiveDateTime) -> ProcessReport {
        let mut report = ProcessReport::default();
        if barcodes.is_empty() {
            log::info!("No items to process");
            return report;
        }

        let counts = tally(barcodes);
        self.store.update(|items| {
            for (barcode, quantity) in counts {
                match items.get_mut(&barcode) {
                    Some(record) => {
                        let steps = apply_purchase(record, quantity, now);
                        if steps > 0 {
                            log::info!(
                                "{}: {} unit(s), {} demand step(s), price now {:.2}",
                                barcode,
                                quantity,
                                steps,
                                record.current_price
                            );
                        } else {
                            log::debug!(
                                "{}: {} unit(s), meter at {}/{}",
                                barcode,
                                quantity,
                                record.meter,
                                METER_STEP
                            );
                        }
                        report.steps += steps;
                        report.purchased.insert(barcode, quantity);
                    }
                    None => {
                        log::warn!("Item with barcode {} not in catalog, ignoring", barcode);
                        report.unknown.push(barcode);
                    }
                }
            }
        });

        if !report.purchased.is_empty() {
            self.store.persist();
        }
        report
    }

    /// Decay items not purchased since `cutoff`, stamped with the current time
    pub fn decay(&self, cutoff: NaiveDateTime) -> DecayReport {
        self.decay_at(cutoff, local_now())
    }

    /// Decay items not purchased since `cutoff`, stamped with `now`
    ///
    /// An item is lowered at most once per cutoff: a record whose
    /// `last_updated` is already past the cutoff is skipped, which keeps
    /// repeated sweeps with the same cutoff idempotent.
    pub fn decay_at(&self, cutoff: NaiveDateTime, now: NaiveDateTime) -> DecayReport {
        let mut report = DecayReport::default();
        self.store.update(|items| {
            for (barcode, record) in items.iter_mut() {
                match (record.last_purchased, record.last_updated) {
                    (None, _) => {
                        log::debug!("{} never purchased, nothing to decay", barcode);
                        report.never_purchased += 1;
                    }
                    (Some(purchased), _) if purchased >= cutoff => report.recent += 1,
                    // Lowered once for this cutoff already
                    (_, Some(updated)) if updated > cutoff => report.already_decayed += 1,
                    _ => match apply_decay(record, now) {
                        DecayOutcome::Lowered => {
                            log::debug!("{} decayed to {:.2}", barcode, record.current_price);
                            report.lowered += 1;
                        }
                        DecayOutcome::DemandOnly => report.demand_only += 1,
                        DecayOutcome::Unchanged => report.floored += 1,
                    },
                }
            }
        });

        if report.never_purchased > 0 {
            log::warn!(
                "Skipped {} item(s) without a purchase record during decay",
                report.never_purchased
            );
        }
        log::info!(
            "Decay sweep: {} lowered, {} at floor, {} recently purchased",
            report.lowered,
            report.floored,
            report.recent
        );

        if report.lowered > 0 || report.demand_only > 0 {
            self.store.persist();
        }
        report
    }
}

#[cfg(test)]
#[path = "pricing_tests.rs"]
mod tests;
