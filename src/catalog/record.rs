//! Item record model and the persisted timestamp format

use crate::pricing::METER_STEP;
use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

/// Weight of the base price in the current price
pub const W_BASE: f64 = 0.30;

/// Weight of the demand price in the current price
pub const W_DEMAND: f64 = 0.70;

/// Maximum number of entries kept in an item's price history
pub const HISTORY_LIMIT: usize = 256;

/// Timestamp format used in the catalog file (local time, second precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Round a price to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Current local time truncated to whole seconds
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).ok()
}

/// A single catalog entry, keyed by barcode in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub item_name: String,
    pub base_price: f64,
    pub demand_price: f64,
    pub current_price: f64,
    #[serde(default)]
    pub meter: u32,
    #[serde(default)]
    pub history: Vec<f64>,
    #[serde(default, with = "timestamp_format")]
    pub last_purchased: Option<NaiveDateTime>,
    #[serde(default, with = "timestamp_format")]
    pub last_updated: Option<NaiveDateTime>,
}

impl ItemRecord {
    /// Create a fresh record anchored at `base_price`
    pub fn new(item_name: impl Into<String>, base_price: f64) -> Self {
        Self {
            item_name: item_name.into(),
            base_price,
            demand_price: base_price,
            current_price: round2(base_price),
            meter: 0,
            history: Vec::new(),
            last_purchased: None,
            last_updated: None,
        }
    }

    /// Weighted price from base and demand components, rounded to cents
    pub fn weighted_price(&self) -> f64 {
        self.price_with_demand(self.demand_price)
    }

    /// Weighted price this record would have at the given demand price
    pub fn price_with_demand(&self, demand_price: f64) -> f64 {
        round2(W_BASE * self.base_price + W_DEMAND * demand_price)
    }

    /// Recompute `current_price` from the weighted formula
    pub fn recompute_price(&mut self) {
        self.current_price = self.weighted_price();
    }

    /// Seed an empty history with the rounded base price
    pub fn seed_history(&mut self) {
        if self.history.is_empty() {
            self.history.push(round2(self.base_price));
        }
    }

    /// Append a price to the history, dropping the oldest entries past the limit
    pub fn push_history(&mut self, price: f64) {
        self.history.push(price);
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }

    /// Last recorded history value
    pub fn last_recorded(&self) -> Option<f64> {
        self.history.last().copied()
    }

    /// Operator reset: back to the base price with an empty meter and history
    pub fn reset(&mut self) {
        self.meter = 0;
        self.history.clear();
        self.demand_price = self.base_price;
        self.current_price = round2(self.base_price);
    }

    /// Restore `demand_price >= base_price` and `meter < METER_STEP` for
    /// records read from disk. Returns true if the record had to be corrected.
    pub(crate) fn normalize(&mut self) -> bool {
        let mut repaired = false;
        if self.demand_price < self.base_price || !self.demand_price.is_finite() {
            self.demand_price = self.base_price;
            self.recompute_price();
            repaired = true;
        }
        if self.meter >= METER_STEP {
            self.meter %= METER_STEP;
            repaired = true;
        }
        repaired
    }
}

/// Serde adapter for optional `YYYY-MM-DD HH:MM:SS` timestamps
mod timestamp_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}
