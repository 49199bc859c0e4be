//! Console list-view JSON.
//!
//! Every field in a record is wrapped in an object such as
//! `{"value": "Up", ...}`; only `value` is used.

use crate::error::FetchError;
use crate::registry::{normalize_code, Device};
use serde::Deserialize;

/// Monitoring status the console reports for reachable devices.
const STATUS_UP: &str = "Up";

/// One device entry from the console folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleRecord {
    pub folder: String,
    pub device_type: String,
    /// Routing code; empty for entries that are not managed routers
    pub controller_id: String,
    pub icmp_address: String,
    pub monitoring_status: String,
}

impl ConsoleRecord {
    pub fn is_up(&self) -> bool {
        self.monitoring_status == STATUS_UP
    }

    /// Registry candidate for this record. Curated fields start empty and
    /// are filled in from the registry during reconciliation.
    pub fn to_device(&self) -> Device {
        Device {
            code: normalize_code(&self.controller_id),
            name: String::new(),
            gateway: String::new(),
            wan_ip: self.icmp_address.clone(),
            area: self.folder.clone(),
            service_provider: String::new(),
            auto_update: true,
            is_up: self.is_up(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListView {
    #[serde(default)]
    records: Vec<RawRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRecord {
    ap_folder_id: Option<Wrapped>,
    #[serde(rename = "type")]
    device_type: Option<Wrapped>,
    controller_id: Option<Wrapped>,
    icmp_address: Option<Wrapped>,
    monitoring_status: Option<Wrapped>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Wrapped {
    value: serde_json::Value,
}

fn unwrap_value(field: Option<Wrapped>) -> String {
    match field.map(|f| f.value) {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Decode a list-view body, dropping entries with an empty routing code.
pub fn parse_device_list(body: &str) -> Result<Vec<ConsoleRecord>, FetchError> {
    let view: ListView = serde_json::from_str(body).map_err(|e| FetchError::Decode {
        stage: "device list",
        target: "console".to_string(),
        reason: e.to_string(),
    })?;

    let total = view.records.len();
    let records: Vec<ConsoleRecord> = view
        .records
        .into_iter()
        .map(|raw| ConsoleRecord {
            folder: unwrap_value(raw.ap_folder_id),
            device_type: unwrap_value(raw.device_type),
            controller_id: unwrap_value(raw.controller_id),
            icmp_address: unwrap_value(raw.icmp_address),
            monitoring_status: unwrap_value(raw.monitoring_status),
        })
        .filter(|record| !record.controller_id.is_empty())
        .collect();

    if records.len() < total {
        tracing::debug!(
            "Skipped {} console entries without a routing code",
            total - records.len()
        );
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_VIEW: &str = r#"{
        "records": [
            {
                "ap_folder_id": {"ap_folder_id": 32, "value": "Top > East"},
                "type": {"value": "Aruba RAP-3WN"},
                "controller_id": {"value": "531"},
                "icmp_address": {"value": "10.1.1.1"},
                "monitoring_status": {"value": "Up"}
            },
            {
                "ap_folder_id": {"value": "Top > East"},
                "type": {"value": "Aruba AP-105"},
                "controller_id": {"value": ""},
                "icmp_address": {"value": "10.1.1.2"},
                "monitoring_status": {"value": "Up"}
            },
            {
                "ap_folder_id": {"value": "Top > West"},
                "type": {"value": "Aruba RAP-3WN"},
                "controller_id": {"value": "b07"},
                "icmp_address": {"value": "10.2.0.1"},
                "monitoring_status": {"value": "Down"}
            },
            {
                "type": {"value": "Switch"},
                "controller_id": null
            }
        ]
    }"#;

    #[test]
    fn test_empty_routing_codes_are_skipped() {
        let records = parse_device_list(LIST_VIEW).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].controller_id, "531");
        assert_eq!(records[0].device_type, "Aruba RAP-3WN");
        assert_eq!(records[1].controller_id, "b07");
    }

    #[test]
    fn test_records_map_to_devices() {
        let records = parse_device_list(LIST_VIEW).unwrap();

        let up = records[0].to_device();
        assert_eq!(up.code, "531");
        assert_eq!(up.wan_ip, "10.1.1.1");
        assert_eq!(up.area, "Top > East");
        assert!(up.is_up);
        assert!(up.auto_update);

        let down = records[1].to_device();
        assert_eq!(down.code, "B07");
        assert!(!down.is_up);
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        let err = parse_device_list("<html>login</html>").unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn test_missing_records_is_empty_list() {
        assert!(parse_device_list("{}").unwrap().is_empty());
    }
}
