//! Price Sync - demand-driven shop pricing with peer reconciliation
//!
//! Keeps a per-store catalog whose prices rise with local purchases, decay
//! back toward a baseline when items go unsold, and are reconciled with one
//! peer store over a point-to-point TCP link (highest price wins).

pub mod baseline;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod pricing;
pub mod scan;
pub mod sync;
pub mod web;

pub use catalog::{CatalogStore, ItemRecord, MergeReport, PriceMap};
pub use config::NodeConfig;
pub use error::{Error, Result};
pub use pricing::{DecayReport, PricingEngine, ProcessReport};
pub use scan::{RecentScans, ScanSession};
pub use sync::{PushOutcome, Role, SyncAgent, SyncConfig};
