//! Sync message codec
//!
//! One message is one JSON object on a single line:
//! `{"<barcode>": {"current_price": <number>}, ...}`. No envelope, no
//! sequence numbers; the max-wins merge makes loss and duplication safe.

use crate::catalog::PriceMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize)]
struct OutgoingPrice {
    current_price: f64,
}

#[derive(Deserialize)]
struct IncomingPrice {
    #[serde(default)]
    current_price: Option<f64>,
}

/// Encode prices as a single-line JSON object
pub fn encode(prices: &PriceMap) -> serde_json::Result<String> {
    let message: BTreeMap<&str, OutgoingPrice> = prices
        .iter()
        .map(|(barcode, &current_price)| (barcode.as_str(), OutgoingPrice { current_price }))
        .collect();
    serde_json::to_string(&message)
}

/// Decode a received message; entries without a price are dropped
pub fn decode(payload: &str) -> serde_json::Result<PriceMap> {
    let message: BTreeMap<String, IncomingPrice> = serde_json::from_str(payload)?;
    Ok(message
        .into_iter()
        .filter_map(|(barcode, entry)| match entry.current_price {
            Some(price) => Some((barcode, price)),
            None => {
                log::debug!("Sync entry for {} has no current_price, dropped", barcode);
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_matches_wire_layout() {
        let prices: PriceMap = [("A".to_string(), 10.07)].into();
        assert_eq!(encode(&prices).unwrap(), r#"{"A":{"current_price":10.07}}"#);
    }

    #[test]
    fn encoded_message_is_single_line() {
        let prices: PriceMap = [("A".to_string(), 1.0), ("B".to_string(), 2.5)].into();
        assert!(!encode(&prices).unwrap().contains('\n'));
    }

    #[test]
    fn decode_reads_peer_message() {
        let prices = decode(r#"{"A": {"current_price": 10.07}, "B": {"current_price": 3}}"#).unwrap();
        assert_eq!(prices.get("A"), Some(&10.07));
        assert_eq!(prices.get("B"), Some(&3.0));
    }

    #[test]
    fn decode_drops_entries_without_price() {
        let prices = decode(r#"{"A": {}, "B": {"current_price": null}, "C": {"current_price": 1.5, "meter": 2}}"#)
            .unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices.get("C"), Some(&1.5));
    }

    #[test]
    fn decode_rejects_malformed_payloads() {
        assert!(decode("not json").is_err());
        assert!(decode(r#"["A", 1.0]"#).is_err());
        assert!(decode(r#"{"A": {"current_price": "cheap"}}"#).is_err());
    }
}
