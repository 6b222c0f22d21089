//! Read-only dashboard view over the catalog

use crate::catalog::{round2, ItemRecord};
use serde::Serialize;
use std::collections::BTreeMap;

/// Rows shown in each dashboard section
pub const DISPLAY_ITEMS: usize = 5;

/// Direction of the current price relative to the base price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn of(current: f64, base: f64) -> Self {
        if current > base {
            Trend::Up
        } else if current < base {
            Trend::Down
        } else {
            Trend::Flat
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Trend::Up => "🔼",
            Trend::Down => "🔽",
            Trend::Flat => "➖",
        }
    }
}

/// Percent change of `current` over `base`, rounded to cents of a percent
pub fn change_percent(current: f64, base: f64) -> f64 {
    if base == 0.0 {
        return 0.0;
    }
    round2((current - base) / base * 100.0)
}

/// A recently scanned barcode as the dashboard shows it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentItem {
    pub barcode: String,
    /// `None` when the barcode is not in the catalog
    pub item_name: Option<String>,
    pub current_price: Option<f64>,
    pub trend: Option<Trend>,
    pub change_percent: Option<f64>,
}

impl RecentItem {
    fn known(barcode: &str, record: &ItemRecord) -> Self {
        Self {
            barcode: barcode.to_string(),
            item_name: Some(record.item_name.clone()),
            current_price: Some(record.current_price),
            trend: Some(Trend::of(record.current_price, record.base_price)),
            change_percent: Some(change_percent(record.current_price, record.base_price)),
        }
    }

    fn unknown(barcode: &str) -> Self {
        Self {
            barcode: barcode.to_string(),
            item_name: None,
            current_price: None,
            trend: None,
            change_percent: None,
        }
    }

    /// One-line label, e.g. `Apples 🔼 +0.7%`
    pub fn label(&self) -> String {
        match (&self.item_name, self.trend, self.change_percent) {
            (Some(name), Some(trend), Some(change)) => {
                format!("{} {} {:+}%", name, trend.symbol(), change)
            }
            _ => format!("{} - Unknown", self.barcode),
        }
    }
}

/// A top-selling item with its price history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopItem {
    pub barcode: String,
    pub item_name: String,
    pub meter: u32,
    pub history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub recent: Vec<RecentItem>,
    pub top: Vec<TopItem>,
}

/// Build the view from a catalog snapshot and the latest scans (newest first)
///
/// Top items are ordered by meter, highest first; ties keep barcode order.
pub fn build_view(records: &BTreeMap<String, ItemRecord>, recent: &[String]) -> DashboardView {
    let recent = recent
        .iter()
        .take(DISPLAY_ITEMS)
        .map(|barcode| match records.get(barcode) {
            Some(record) => RecentItem::known(barcode, record),
            None => RecentItem::unknown(barcode),
        })
        .collect();

    let mut ranked: Vec<(&String, &ItemRecord)> = records.iter().collect();
    ranked.sort_by(|a, b| b.1.meter.cmp(&a.1.meter));
    let top = ranked
        .into_iter()
        .take(DISPLAY_ITEMS)
        .map(|(barcode, record)| TopItem {
            barcode: barcode.clone(),
            item_name: record.item_name.clone(),
            meter: record.meter,
            history: record.history.clone(),
        })
        .collect();

    DashboardView { recent, top }
}
