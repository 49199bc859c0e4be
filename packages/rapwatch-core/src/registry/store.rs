//! Registry storage backed by SQLite.
//!
//! Layout:
//! - `routers`: one row per router, keyed by code
//! - one table per router, named by its code, holding every client snapshot
//!   with its capture time (append-only)

use super::{normalize_code, Device};
use crate::device::ClientRecord;
use crate::error::PersistenceError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS routers (
        code TEXT PRIMARY KEY,
        name TEXT NOT NULL DEFAULT '',
        gateway TEXT NOT NULL DEFAULT '',
        wanip TEXT NOT NULL DEFAULT '',
        area TEXT NOT NULL DEFAULT '',
        sp TEXT NOT NULL DEFAULT '',
        autoupdate INTEGER NOT NULL DEFAULT 1
    );
";

/// A client row as stored, with its capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredClient {
    pub captured_at: DateTime<Utc>,
    #[serde(flatten)]
    pub client: ClientRecord,
}

/// Storage operations the inventory pipeline needs.
pub trait RegistryStore: Send + Sync {
    fn select_all_devices(&self) -> Result<Vec<Device>, PersistenceError>;

    /// Create each device's client table and insert its registry row in one
    /// transaction. Rows are stored with auto-update enabled.
    fn insert_devices(&self, devices: &[Device]) -> Result<(), PersistenceError>;

    fn update_device(&self, device: &Device) -> Result<(), PersistenceError>;

    /// Idempotent.
    fn create_device_table(&self, code: &str) -> Result<(), PersistenceError>;

    /// Append one snapshot; returns the number of rows written.
    fn append_client_records(
        &self,
        code: &str,
        clients: &[ClientRecord],
    ) -> Result<usize, PersistenceError>;

    fn query_client_records(
        &self,
        code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        mac: Option<&str>,
    ) -> Result<Vec<StoredClient>, PersistenceError>;
}

/// Quoted client table name for a routing code.
///
/// Codes end up as identifiers, so only ASCII alphanumerics, `_` and `-` are
/// accepted, and names that would shadow the registry itself are refused.
fn table_name(code: &str) -> Result<String, PersistenceError> {
    let code = normalize_code(code);
    let valid = !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && code != "ROUTERS"
        && !code.starts_with("SQLITE_");

    if !valid {
        return Err(PersistenceError::InvalidCode(code));
    }
    Ok(format!("\"{}\"", code))
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn create_table_in(tx: &Transaction<'_>, code: &str) -> Result<(), PersistenceError> {
    let table = table_name(code)?;
    let index = format!("\"idx_{}_time\"", normalize_code(code));
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            time TEXT NOT NULL,
            name TEXT NOT NULL,
            ip TEXT NOT NULL,
            mac TEXT NOT NULL,
            os TEXT NOT NULL,
            network TEXT NOT NULL,
            ap TEXT NOT NULL,
            role TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS {index} ON {table}(time);"
    ))?;
    Ok(())
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file, creating its directory first.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| PersistenceError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        tracing::debug!("Opened registry database {:?}", path);
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn.lock().map_err(|_| PersistenceError::LockPoisoned)
    }

    pub fn select_device(&self, code: &str) -> Result<Option<Device>, PersistenceError> {
        let conn = self.lock()?;
        let device = conn
            .query_row(
                "SELECT code, name, gateway, wanip, area, sp, autoupdate FROM routers WHERE code = ?1",
                params![normalize_code(code)],
                row_to_device,
            )
            .optional()?;
        Ok(device)
    }
}

fn row_to_device(row: &rusqlite::Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        code: row.get(0)?,
        name: row.get(1)?,
        gateway: row.get(2)?,
        wan_ip: row.get(3)?,
        area: row.get(4)?,
        service_provider: row.get(5)?,
        auto_update: row.get::<_, i64>(6)? != 0,
        is_up: false,
    })
}

impl RegistryStore for SqliteStore {
    fn select_all_devices(&self) -> Result<Vec<Device>, PersistenceError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT code, name, gateway, wanip, area, sp, autoupdate FROM routers ORDER BY code",
        )?;
        let devices = stmt
            .query_map([], row_to_device)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(devices)
    }

    fn insert_devices(&self, devices: &[Device]) -> Result<(), PersistenceError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for device in devices {
            create_table_in(&tx, &device.code)?;
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO routers (code, name, gateway, wanip, area, sp, autoupdate)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
            )?;
            for device in devices {
                stmt.execute(params![
                    normalize_code(&device.code),
                    device.name,
                    device.gateway,
                    device.wan_ip,
                    device.area,
                    device.service_provider,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn update_device(&self, device: &Device) -> Result<(), PersistenceError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE routers SET name = ?1, gateway = ?2, wanip = ?3, area = ?4, sp = ?5, autoupdate = ?6
             WHERE code = ?7",
            params![
                device.name,
                device.gateway,
                device.wan_ip,
                device.area,
                device.service_provider,
                device.auto_update as i64,
                normalize_code(&device.code),
            ],
        )?;
        Ok(())
    }

    fn create_device_table(&self, code: &str) -> Result<(), PersistenceError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        create_table_in(&tx, code)?;
        tx.commit()?;
        Ok(())
    }

    fn append_client_records(
        &self,
        code: &str,
        clients: &[ClientRecord],
    ) -> Result<usize, PersistenceError> {
        let table = table_name(code)?;
        if clients.is_empty() {
            return Ok(0);
        }

        let captured_at = timestamp(Utc::now());
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {table} (time, name, ip, mac, os, network, ap, role)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ))?;
            for c in clients {
                stmt.execute(params![
                    captured_at,
                    c.name,
                    c.ip,
                    c.mac,
                    c.os,
                    c.network,
                    c.access_point,
                    c.role,
                ])?;
            }
        }
        tx.commit()?;
        Ok(clients.len())
    }

    fn query_client_records(
        &self,
        code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        mac: Option<&str>,
    ) -> Result<Vec<StoredClient>, PersistenceError> {
        let table = table_name(code)?;
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT time, name, ip, mac, os, network, ap, role FROM {table}
             WHERE time BETWEEN ?1 AND ?2 AND (?3 IS NULL OR lower(mac) = lower(?3))
             ORDER BY time, id"
        ))?;

        let rows = stmt
            .query_map(params![timestamp(start), timestamp(end), mac], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    ClientRecord {
                        name: row.get(1)?,
                        ip: row.get(2)?,
                        mac: row.get(3)?,
                        os: row.get(4)?,
                        network: row.get(5)?,
                        access_point: row.get(6)?,
                        role: row.get(7)?,
                    },
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(time, client)| {
                let captured_at = DateTime::parse_from_rfc3339(&time)
                    .map_err(|_| PersistenceError::Timestamp(time.clone()))?
                    .with_timezone(&Utc);
                Ok(StoredClient {
                    captured_at,
                    client,
                })
            })
            .collect()
    }
}
