//! rapwatch Core Library
//!
//! This crate provides the core functionality for the rapwatch inventory job:
//! - Router discovery against the management console (cookie login, JSON list)
//! - Wired client scraping on each router (session token, CLI text table)
//! - Registry reconciliation and client snapshot storage (SQLite)
//! - The daily schedule that drives one inventory cycle per day
//!
//! # Example
//!
//! ```no_run
//! use rapwatch_core::{config, Inventory, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = config::load_config(std::path::Path::new("config.toml"))?;
//!     let store = SqliteStore::open(&config.database.path)?;
//!
//!     let inventory = Inventory::from_config(&config, store)?;
//!     let report = inventory.run_cycle().await?;
//!     println!("Stored {} clients", report.clients_stored);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod console;
pub mod device;
pub mod error;
pub mod inventory;
pub mod registry;
pub mod scheduler;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{Config, ConfigSource};
pub use console::ConsoleClient;
pub use device::{ClientRecord, DeviceClient};
pub use error::{AuthError, ConfigError, CycleError, DiscoveryError, FetchError, PersistenceError};
pub use inventory::{ClientFetcher, CycleReport, DeviceSource, Inventory, InventoryOptions};
pub use registry::{Device, RegistryStore, SqliteStore, StoredClient};
pub use scheduler::DailySchedule;
