//! Baseline price import
//!
//! Seeds `base_price` and `demand_price` of catalog records from a local
//! seed file, optionally refreshed from the public price-statistics API.

use crate::catalog::{round2, CatalogStore, ItemRecord};
use crate::error::BaselineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Public statistics API time-series endpoint
pub const STATISTICS_API_URL: &str = "https://api.bls.gov/publicAPI/v2/timeseries/data/";

/// Maximum number of series the API accepts in one request
const SERIES_PER_REQUEST: usize = 50;

const START_YEAR: i32 = 2015;
const END_YEAR: i32 = 2025;

/// One line of the baseline seed file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub barcode: String,
    pub item_name: String,
    /// Fallback price when no series value is available
    #[serde(default)]
    pub base_price: Option<f64>,
    /// Statistics series whose latest value becomes the base price
    #[serde(default)]
    pub series_id: Option<String>,
}

/// Read the seed file, a JSON array of [`BaselineEntry`]
pub fn load_baseline_file(path: &Path) -> Result<Vec<BaselineEntry>, BaselineError> {
    let content = std::fs::read_to_string(path)?;
    let entries: Vec<BaselineEntry> = serde_json::from_str(&content)?;
    log::info!(
        "Loaded {} baseline entries from {}",
        entries.len(),
        path.display()
    );
    Ok(entries)
}

/// Turn seed entries into fresh catalog records
///
/// A fetched series value wins over the seed file's `base_price`. Entries
/// with neither are skipped.
pub fn into_records(
    entries: Vec<BaselineEntry>,
    fetched: &HashMap<String, f64>,
) -> Vec<(String, ItemRecord)> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let fetched_price = entry
                .series_id
                .as_ref()
                .and_then(|series| fetched.get(series))
                .copied();
            match fetched_price.or(entry.base_price) {
                Some(price) if price.is_finite() && price >= 0.0 => {
                    let record = ItemRecord::new(entry.item_name, round2(price));
                    Some((entry.barcode, record))
                }
                Some(price) => {
                    log::warn!("Invalid base price {} for {}, skipping", price, entry.barcode);
                    None
                }
                None => {
                    log::warn!("No base price for {}, skipping", entry.barcode);
                    None
                }
            }
        })
        .collect()
}

#[derive(Serialize)]
struct SeriesRequest<'a> {
    seriesid: &'a [String],
    startyear: String,
    endyear: String,
}

#[derive(Deserialize)]
struct SeriesResponse {
    status: String,
    #[serde(default)]
    message: Vec<String>,
    #[serde(rename = "Results")]
    results: Option<SeriesResults>,
}

#[derive(Deserialize)]
struct SeriesResults {
    #[serde(default)]
    series: Vec<Series>,
}

#[derive(Deserialize)]
struct Series {
    #[serde(rename = "seriesID")]
    series_id: String,
    #[serde(default)]
    data: Vec<SeriesPoint>,
}

#[derive(Deserialize)]
struct SeriesPoint {
    value: String,
}

/// Extract the latest value of every series from an API response body
///
/// The API lists data points newest first; series without a parsable value
/// are left out.
pub fn parse_latest_values(body: &str) -> Result<HashMap<String, f64>, BaselineError> {
    let response: SeriesResponse = serde_json::from_str(body)?;
    if response.status != "REQUEST_SUCCEEDED" {
        let detail = if response.message.is_empty() {
            response.status
        } else {
            response.message.join("; ")
        };
        return Err(BaselineError::ApiStatus(detail));
    }

    let mut values = HashMap::new();
    for series in response.results.map(|r| r.series).unwrap_or_default() {
        let Some(point) = series.data.first() else {
            log::warn!("Series {} returned no data", series.series_id);
            continue;
        };
        match point.value.trim().parse::<f64>() {
            Ok(value) => {
                values.insert(series.series_id, value);
            }
            Err(_) => log::warn!(
                "Series {} returned unparsable value {:?}",
                series.series_id,
                point.value
            ),
        }
    }
    Ok(values)
}

/// Client for the statistics API
pub struct StatisticsClient {
    client: reqwest::Client,
    url: String,
}

impl Default for StatisticsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsClient {
    pub fn new() -> Self {
        Self::with_url(STATISTICS_API_URL)
    }

    /// Client against a different endpoint
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Fetch the latest value for each series id
    pub async fn fetch_latest(
        &self,
        series_ids: &[String],
    ) -> Result<HashMap<String, f64>, BaselineError> {
        let mut values = HashMap::new();
        for chunk in series_ids.chunks(SERIES_PER_REQUEST) {
            log::info!("Fetching {} series from statistics API...", chunk.len());

            let request = SeriesRequest {
                seriesid: chunk,
                startyear: START_YEAR.to_string(),
                endyear: END_YEAR.to_string(),
            };
            let response = self
                .client
                .post(&self.url)
                .header("User-Agent", "price_sync/1.0")
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(BaselineError::HttpStatus(response.status()));
            }

            let body = response.text().await?;
            values.extend(parse_latest_values(&body)?);
        }

        log::info!("Fetched {} series values", values.len());
        Ok(values)
    }
}

/// Import the seed file into the catalog, persisting when records were added
///
/// With `fetch` set, series values are refreshed from the statistics API
/// first; a failed fetch falls back to the prices in the seed file.
pub async fn import(
    store: &CatalogStore,
    path: &Path,
    fetch: bool,
    client: &StatisticsClient,
) -> Result<usize, BaselineError> {
    let entries = load_baseline_file(path)?;

    let ids = series_ids(&entries);
    let fetched = if fetch && !ids.is_empty() {
        match client.fetch_latest(&ids).await {
            Ok(values) => values,
            Err(e) => {
                log::warn!("Failed to fetch baseline prices, using seed file prices: {}", e);
                HashMap::new()
            }
        }
    } else {
        HashMap::new()
    };

    let inserted = store.import_baseline(into_records(entries, &fetched));
    if inserted > 0 {
        log::info!("Imported {} new items from baseline", inserted);
        store.persist();
    }
    Ok(inserted)
}

/// Series ids referenced by the seed entries, deduplicated in order
pub fn series_ids(entries: &[BaselineEntry]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in entries.iter().filter_map(|e| e.series_id.as_ref()) {
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    ids
}
