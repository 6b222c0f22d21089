//! Item catalog: record model and the shared, file-backed store

mod record;
mod store;

pub use record::{
    local_now, parse_timestamp, round2, ItemRecord, HISTORY_LIMIT, TIMESTAMP_FORMAT, W_BASE,
    W_DEMAND,
};
pub use store::{CatalogStore, MergeReport, PriceMap};
