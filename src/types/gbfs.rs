//! Defines the data structures of the GBFS real-time feeds: the common envelope,
//! the discovery document, system information, station information and station status.
//!
//! Only the fields this crate reasons about are typed. Everything else a feed publishes
//! is kept in an `extra` map so nothing is lost when records are inspected or re-serialized.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

// --- Envelope ---

/// The wrapper every GBFS document shares.
///
/// `last_updated` and `ttl` are staleness hints from the publisher. They are reported,
/// never enforced.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FeedEnvelope<T> {
    /// POSIX timestamp (seconds) of the last time the publisher updated the data.
    pub last_updated: i64,
    /// Number of seconds before the data is expected to change again.
    pub ttl: i64,
    /// GBFS version of the document, absent on older feeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// The feed-specific payload.
    pub data: T,
}

// --- Discovery ---

/// Payload of the discovery document (`gbfs.json`): language code to feed list.
pub type Discovery = HashMap<String, LanguageFeeds>;

/// All feeds published for one language.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LanguageFeeds {
    pub feeds: Vec<FeedLink>,
}

/// A single named feed and where to fetch it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FeedLink {
    /// Feed name, e.g. `station_status`.
    pub name: String,
    pub url: String,
}

impl LanguageFeeds {
    /// Feed name to URL. Later duplicates of a name win.
    pub fn url_map(&self) -> HashMap<String, String> {
        self.feeds
            .iter()
            .map(|feed| (feed.name.clone(), feed.url.clone()))
            .collect()
    }
}

// --- System information ---

/// Payload of the `system_information` feed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SystemInformationData {
    pub system_id: String,
    pub language: String,
    pub name: String,
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// --- Stations ---

/// Payload shape shared by `station_information` and `station_status`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StationList<R> {
    pub stations: Vec<R>,
}

/// Static description of one dock station, from the `station_information` feed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StationInformationRecord {
    /// Real-time identifier of the station. Historical trip records do not carry it
    /// reliably, so joins go through [`Self::name`].
    pub station_id: String,
    /// Public station name, e.g. `"W 21 St & 6 Ave"`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Number of docks, if published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Current availability at one station, from the `station_status` feed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StationStatusRecord {
    pub station_id: String,
    pub num_bikes_available: u32,
    pub num_docks_available: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_ebikes_available: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_bikes_disabled: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_docks_disabled: Option<u32>,
    #[serde(
        default,
        deserialize_with = "flexible_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_installed: Option<bool>,
    #[serde(
        default,
        deserialize_with = "flexible_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_renting: Option<bool>,
    #[serde(
        default,
        deserialize_with = "flexible_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_returning: Option<bool>,
    /// POSIX timestamp (seconds) of the station's last report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reported: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// GBFS 1.x publishes flags as `0`/`1`, 2.x as booleans. Accept both.
fn flexible_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        None => None,
        Some(Flag::Bool(b)) => Some(b),
        Some(Flag::Int(i)) => Some(i != 0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_discovery_url_map() -> Result<(), Box<dyn std::error::Error>> {
        let doc = json!({
            "last_updated": 1700000000,
            "ttl": 5,
            "version": "2.3",
            "data": {
                "en": {"feeds": [
                    {"name": "station_status", "url": "https://gbfs.test/en/station_status.json"},
                    {"name": "station_information", "url": "https://gbfs.test/en/station_information.json"}
                ]}
            }
        });
        let envelope: FeedEnvelope<Discovery> = serde_json::from_value(doc)?;
        assert_eq!(envelope.ttl, 5);
        let urls = envelope.data["en"].url_map();
        assert_eq!(
            urls.get("station_status").map(String::as_str),
            Some("https://gbfs.test/en/station_status.json")
        );
        Ok(())
    }

    #[test]
    fn test_status_flags_accept_ints_and_bools() -> Result<(), Box<dyn std::error::Error>> {
        let v1: StationStatusRecord = serde_json::from_value(json!({
            "station_id": "72",
            "num_bikes_available": 3,
            "num_docks_available": 40,
            "is_installed": 1,
            "is_renting": 0,
            "legacy_id": "72"
        }))?;
        assert_eq!(v1.is_installed, Some(true));
        assert_eq!(v1.is_renting, Some(false));
        assert_eq!(v1.is_returning, None);
        assert_eq!(v1.extra.get("legacy_id"), Some(&json!("72")));

        let v2: StationStatusRecord = serde_json::from_value(json!({
            "station_id": "72",
            "num_bikes_available": 3,
            "num_docks_available": 40,
            "is_installed": true
        }))?;
        assert_eq!(v2.is_installed, Some(true));
        Ok(())
    }

    #[test]
    fn test_station_information_keeps_unknown_fields() -> Result<(), Box<dyn std::error::Error>> {
        let record: StationInformationRecord = serde_json::from_value(json!({
            "station_id": "66db237e",
            "name": "W 21 St & 6 Ave",
            "lat": 40.74173969,
            "lon": -73.99415556,
            "capacity": 55,
            "rental_methods": ["KEY", "CREDITCARD"]
        }))?;
        assert_eq!(record.capacity, Some(55));
        assert!(record.extra.contains_key("rental_methods"));
        Ok(())
    }
}
