//! The daily inventory cycle.
//!
//! Discover → Reconcile → PersistNew → FanOutScrape → PersistClients.
//!
//! Console and registry failures abort the cycle before any device is
//! contacted. Device failures are isolated: each one is logged with the
//! router code and never affects its siblings.

use crate::config::Config;
use crate::console::ConsoleClient;
use crate::device::{ClientRecord, DeviceClient};
use crate::error::{ConfigError, CycleError, DiscoveryError, FetchError};
use crate::registry::{self, Device, RegistryStore, SqliteStore};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};

/// Default number of devices scraped at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Default ceiling for the fan-out of one cycle.
pub const DEFAULT_CYCLE_DEADLINE: Duration = Duration::from_secs(300);

/// Source of the authoritative device list.
pub trait DeviceSource: Send + Sync {
    fn discover_devices(&self) -> impl Future<Output = Result<Vec<Device>, DiscoveryError>> + Send;
}

/// Fetches the wired client list of one device.
pub trait ClientFetcher: Send + Sync {
    fn fetch_clients(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Vec<ClientRecord>, FetchError>> + Send;
}

impl DeviceSource for ConsoleClient {
    async fn discover_devices(&self) -> Result<Vec<Device>, DiscoveryError> {
        self.discover().await
    }
}

impl ClientFetcher for DeviceClient {
    async fn fetch_clients(&self, address: &str) -> Result<Vec<ClientRecord>, FetchError> {
        self.fetch_wired_clients(address).await
    }
}

#[derive(Debug, Clone)]
pub struct InventoryOptions {
    /// Width of the scrape worker pool
    pub max_concurrency: usize,
    /// In-flight scrapes are abandoned once this elapses
    pub cycle_deadline: Option<Duration>,
}

impl Default for InventoryOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            cycle_deadline: Some(DEFAULT_CYCLE_DEADLINE),
        }
    }
}

impl From<&Config> for InventoryOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_concurrency: config.max_concurrency.max(1),
            cycle_deadline: config.cycle_deadline(),
        }
    }
}

/// Summary of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub discovered: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped_down: usize,
    pub scraped: usize,
    pub retried_via_gateway: usize,
    pub failed: usize,
    pub abandoned: usize,
    pub clients_stored: usize,
    pub timed_out: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug)]
enum ScrapeOutcome {
    Stored { clients: usize, via_gateway: bool },
    Failed,
}

impl CycleReport {
    fn record(&mut self, outcome: ScrapeOutcome) {
        match outcome {
            ScrapeOutcome::Stored {
                clients,
                via_gateway,
            } => {
                self.scraped += 1;
                self.clients_stored += clients;
                if via_gateway {
                    self.retried_via_gateway += 1;
                }
            }
            ScrapeOutcome::Failed => self.failed += 1,
        }
    }
}

pub struct Inventory<S, F, R> {
    source: S,
    fetcher: F,
    store: R,
    options: InventoryOptions,
}

impl Inventory<ConsoleClient, DeviceClient, SqliteStore> {
    /// Wire up the live console and device clients over an opened store.
    pub fn from_config(config: &Config, store: SqliteStore) -> Result<Self, ConfigError> {
        config.validate()?;
        let console = ConsoleClient::new(config.console.clone(), config.timeout())?;
        let device = DeviceClient::new(config.device.clone(), config.timeout())?;
        Ok(Self::new(console, device, store, InventoryOptions::from(config)))
    }
}

impl<S, F, R> Inventory<S, F, R>
where
    S: DeviceSource,
    F: ClientFetcher,
    R: RegistryStore,
{
    pub fn new(source: S, fetcher: F, store: R, options: InventoryOptions) -> Self {
        Self {
            source,
            fetcher,
            store,
            options,
        }
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    /// Run one full cycle. Returns only after every scrape has resolved or
    /// the cycle deadline has passed.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let started = Instant::now();
        tracing::info!("Inventory cycle starting");

        let mut devices = self.source.discover_devices().await?;
        let mut report = CycleReport {
            discovered: devices.len(),
            ..Default::default()
        };

        let known = self.store.select_all_devices()?;
        let created = registry::diff(&mut devices, &known);
        registry::sync_new_devices(&self.store, &created)?;
        report.created = created.len();

        for device in devices.iter().filter(|d| d.auto_update) {
            match self.store.update_device(device) {
                Ok(()) => report.updated += 1,
                Err(e) => tracing::warn!(code = %device.code, "Failed to update router: {}", e),
            }
        }

        let (up, down): (Vec<&Device>, Vec<&Device>) = devices.iter().partition(|d| d.is_up);
        for device in &down {
            tracing::info!(code = %device.code, "Router is not up, skipping");
        }
        report.skipped_down = down.len();

        self.fan_out(&up, &mut report).await;

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Inventory cycle finished in {:.1}s: {} routers, {} new, {} scraped ({} via gateway), {} failed, {} clients stored",
            started.elapsed().as_secs_f64(),
            report.discovered,
            report.created,
            report.scraped,
            report.retried_via_gateway,
            report.failed,
            report.clients_stored
        );

        Ok(report)
    }

    async fn fan_out(&self, devices: &[&Device], report: &mut CycleReport) {
        if devices.is_empty() {
            return;
        }

        let width = self.options.max_concurrency.max(1);
        tracing::info!(
            "Querying wired clients on {} routers ({} at a time)",
            devices.len(),
            width
        );

        let mut scrapes = stream::iter(devices.iter().copied())
            .map(|device| self.scrape(device))
            .buffer_unordered(width);

        let mut finished = 0;
        let drain = async {
            while let Some(outcome) = scrapes.next().await {
                finished += 1;
                report.record(outcome);
            }
        };

        let completed = match self.options.cycle_deadline {
            Some(deadline) => tokio::time::timeout(deadline, drain).await.is_ok(),
            None => {
                drain.await;
                true
            }
        };

        if !completed {
            report.timed_out = true;
            report.abandoned = devices.len() - finished;
            tracing::warn!(
                "Cycle deadline reached, abandoning {} in-flight router queries",
                report.abandoned
            );
        }
    }

    /// Query one router, falling back to its gateway, and store the result.
    async fn scrape(&self, device: &Device) -> ScrapeOutcome {
        let code = device.code.as_str();

        let (result, via_gateway) = match self.fetcher.fetch_clients(&device.wan_ip).await {
            Ok(clients) => (Ok(clients), false),
            Err(e) => {
                tracing::warn!(
                    code,
                    "Show clients wired failed via WAN address {}: {}",
                    device.wan_ip,
                    e
                );
                if device.gateway.is_empty() {
                    tracing::warn!(code, "No gateway configured, giving up");
                    return ScrapeOutcome::Failed;
                }
                tracing::info!(code, "Retrying via gateway {}", device.gateway);
                (self.fetcher.fetch_clients(&device.gateway).await, true)
            }
        };

        let clients = match result {
            Ok(clients) => clients,
            Err(e) => {
                tracing::warn!(code, "Retry via gateway {} failed: {}", device.gateway, e);
                return ScrapeOutcome::Failed;
            }
        };

        match self.store.append_client_records(code, &clients) {
            Ok(stored) => {
                tracing::debug!(code, "Stored {} wired clients", stored);
                ScrapeOutcome::Stored {
                    clients: stored,
                    via_gateway,
                }
            }
            Err(e) => {
                tracing::warn!(code, "Failed to store wired clients: {}", e);
                ScrapeOutcome::Failed
            }
        }
    }
}
