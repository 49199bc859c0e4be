//! Router registry and reconciliation.
//!
//! The registry holds one row per router plus one client table per router.
//! Discovery fills in what the console knows (WAN address, status, folder);
//! operators curate the rest (display name, gateway, region) and those
//! values must survive every sync.

mod store;

pub use store::{RegistryStore, SqliteStore, StoredClient};

use crate::error::PersistenceError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A branch router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Routing code, always uppercase
    pub code: String,
    pub name: String,
    /// Curated fallback address used when the WAN address is unreachable
    pub gateway: String,
    pub wan_ip: String,
    pub area: String,
    pub service_provider: String,
    /// Whether discovery may overwrite this row on the next sync
    pub auto_update: bool,
    /// Console monitoring status for the current cycle only
    #[serde(skip)]
    pub is_up: bool,
}

/// Routing codes are compared and stored uppercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Fold a registry row into a freshly discovered device.
///
/// Name, gateway, service provider and the auto-update flag always come from
/// the registry. The region comes from the registry unless it is empty. WAN
/// address and status always come from discovery.
pub fn merge(discovered: &mut Device, existing: &Device) {
    discovered.name = existing.name.clone();
    discovered.gateway = existing.gateway.clone();
    discovered.service_provider = existing.service_provider.clone();
    discovered.auto_update = existing.auto_update;
    if !existing.area.is_empty() {
        discovered.area = existing.area.clone();
    }
}

/// Merge discovered devices with the registry in place and return the ones
/// the registry does not know yet.
///
/// Codes are unique after normalisation: a repeated code keeps its first
/// entry and later ones are dropped from `discovered`.
pub fn diff(discovered: &mut Vec<Device>, registry: &[Device]) -> Vec<Device> {
    let known: HashMap<String, &Device> = registry
        .iter()
        .map(|device| (normalize_code(&device.code), device))
        .collect();

    let mut seen = HashSet::new();
    discovered.retain_mut(|device| {
        device.code = normalize_code(&device.code);
        if seen.insert(device.code.clone()) {
            true
        } else {
            tracing::warn!(code = %device.code, "Console lists router code more than once, keeping the first entry");
            false
        }
    });

    let mut created = Vec::new();
    for device in discovered.iter_mut() {
        match known.get(&device.code) {
            Some(existing) => merge(device, existing),
            None => {
                device.auto_update = true;
                created.push(device.clone());
            }
        }
    }

    created
}

/// Create tables and registry rows for newly discovered routers in one
/// atomic batch.
pub fn sync_new_devices<S: RegistryStore + ?Sized>(
    store: &S,
    created: &[Device],
) -> Result<(), PersistenceError> {
    if created.is_empty() {
        return Ok(());
    }

    for device in created {
        tracing::info!("New router found, code: {}", device.code);
    }
    store.insert_devices(created)?;
    tracing::info!("Added {} new routers to the registry", created.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovered(code: &str, wan_ip: &str, area: &str, up: bool) -> Device {
        Device {
            code: code.to_string(),
            name: String::new(),
            gateway: String::new(),
            wan_ip: wan_ip.to_string(),
            area: area.to_string(),
            service_provider: String::new(),
            auto_update: true,
            is_up: up,
        }
    }

    fn registered(code: &str, name: &str, gateway: &str, area: &str, auto_update: bool) -> Device {
        Device {
            code: code.to_string(),
            name: name.to_string(),
            gateway: gateway.to_string(),
            wan_ip: "192.0.2.1".to_string(),
            area: area.to_string(),
            service_provider: "CT".to_string(),
            auto_update,
            is_up: false,
        }
    }

    #[test]
    fn test_new_device_is_returned() {
        let mut found = vec![discovered("531", "10.1.1.1", "East", true)];
        let created = diff(&mut found, &[]);

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].code, "531");
        assert_eq!(created[0].wan_ip, "10.1.1.1");
        assert!(created[0].auto_update);
    }

    #[test]
    fn test_curated_fields_survive_merge() {
        let mut found = vec![discovered("a12", "10.9.9.9", "Folder", true)];
        let registry = vec![registered("A12", "Harbor St", "172.16.0.1", "North", false)];

        let created = diff(&mut found, &registry);
        assert!(created.is_empty());

        let merged = &found[0];
        assert_eq!(merged.code, "A12");
        assert_eq!(merged.name, "Harbor St");
        assert_eq!(merged.gateway, "172.16.0.1");
        assert_eq!(merged.area, "North");
        assert_eq!(merged.service_provider, "CT");
        assert!(!merged.auto_update);
        assert_eq!(merged.wan_ip, "10.9.9.9");
        assert!(merged.is_up);
    }

    #[test]
    fn test_empty_registry_area_takes_discovered_value() {
        let mut found = vec![discovered("A12", "10.9.9.9", "Folder", false)];
        let registry = vec![registered("A12", "Harbor St", "", "", true)];

        diff(&mut found, &registry);
        assert_eq!(found[0].area, "Folder");
        assert!(!found[0].is_up);
    }

    #[test]
    fn test_mixed_batch() {
        let mut found = vec![
            discovered("531", "10.1.1.1", "East", true),
            discovered("532", "10.1.1.2", "East", true),
        ];
        let registry = vec![registered("532", "Mill Rd", "", "East", true)];

        let created = diff(&mut found, &registry);
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].code, "531");
        assert_eq!(found[1].name, "Mill Rd");
    }

    #[test]
    fn test_repeated_code_keeps_first_entry() {
        let mut found = vec![
            discovered("531", "10.1.1.1", "East", true),
            discovered("a12", "10.1.1.2", "East", true),
            discovered("A12", "10.9.9.9", "West", false),
        ];

        let created = diff(&mut found, &[]);
        let codes: Vec<&str> = created.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["531", "A12"]);

        assert_eq!(found.len(), 2);
        assert_eq!(found[1].wan_ip, "10.1.1.2");
        assert!(found[1].is_up);
    }
}
