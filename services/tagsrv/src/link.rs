//! Slave connection management
//!
//! The wire protocol itself is supplied by `tokio-modbus`; this module
//! wraps it behind the narrow [`RegisterLink`] trait and owns one handle
//! per named slave. A single `tokio::sync::Mutex` per slave serializes the
//! scanner loop and on-demand calls over the shared handle.

use crate::config::SlaveConfig;
use crate::error::{Result, TagSrvError};
use crate::tag::RegisterSpace;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tokio_modbus::client::{Context, Reader, Writer};
use tokio_modbus::slave::Slave;
use tracing::{debug, info};

/// Transport primitives the tag engine needs from a slave connection
#[async_trait]
pub trait RegisterLink: Send {
    /// Read single-bit values (coils or discrete inputs).
    async fn read_bits(&mut self, space: RegisterSpace, start: u16, count: u16)
        -> Result<Vec<bool>>;

    /// Read 16-bit registers (input or holding).
    async fn read_words(&mut self, space: RegisterSpace, start: u16, count: u16)
        -> Result<Vec<u16>>;

    /// Write one coil.
    async fn write_bit(&mut self, start: u16, value: bool) -> Result<()>;

    /// Write one holding register.
    async fn write_word(&mut self, start: u16, value: u16) -> Result<()>;

    /// Write a block of holding registers.
    async fn write_words(&mut self, start: u16, values: &[u16]) -> Result<()>;
}

/// Factory producing connected links
#[async_trait]
pub trait LinkConnector: Send + Sync {
    async fn connect(&self, config: &SlaveConfig) -> Result<Box<dyn RegisterLink>>;
}

// ============================================================================
// Modbus TCP implementation
// ============================================================================

/// Connects Modbus TCP links with a bounded connect timeout
#[derive(Debug, Default)]
pub struct TcpLinkConnector;

#[async_trait]
impl LinkConnector for TcpLinkConnector {
    async fn connect(&self, config: &SlaveConfig) -> Result<Box<dyn RegisterLink>> {
        let endpoint = format!("{}:{}", config.host, config.port);
        debug!(slave = %config.name, %endpoint, "connecting");

        let addr = match endpoint.parse() {
            Ok(addr) => addr,
            Err(_) => {
                // Host names resolve through the runtime's resolver
                let mut addrs =
                    timeout(config.timeout(), tokio::net::lookup_host(&endpoint))
                        .await
                        .map_err(|_| {
                            TagSrvError::timeout(format!("resolving {endpoint} timed out"))
                        })?
                        .map_err(|e| {
                            TagSrvError::connection(format!("failed to resolve {endpoint}: {e}"))
                        })?;
                addrs.next().ok_or_else(|| {
                    TagSrvError::connection(format!("{endpoint} resolved to no addresses"))
                })?
            },
        };

        let ctx = match timeout(
            config.timeout(),
            tokio_modbus::client::tcp::connect_slave(addr, Slave(config.unit_id)),
        )
        .await
        {
            Ok(Ok(ctx)) => ctx,
            Ok(Err(e)) => {
                return Err(TagSrvError::connection(format!(
                    "failed to connect to {endpoint}: {e}"
                )));
            },
            Err(_) => {
                return Err(TagSrvError::timeout(format!(
                    "connection to {endpoint} timed out"
                )));
            },
        };

        info!(slave = %config.name, %endpoint, unit_id = config.unit_id, "connected");
        Ok(Box::new(TcpLink {
            ctx,
            io_timeout: config.timeout(),
        }))
    }
}

struct TcpLink {
    ctx: Context,
    io_timeout: std::time::Duration,
}

/// Bound one register transaction by the slave's I/O timeout.
async fn bounded<T>(
    io_timeout: std::time::Duration,
    what: &str,
    fut: impl std::future::Future<Output = std::io::Result<T>>,
) -> Result<T> {
    match timeout(io_timeout, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(TagSrvError::protocol(format!("{what} failed: {e}"))),
        Err(_) => Err(TagSrvError::timeout(format!("{what} timed out"))),
    }
}

#[async_trait]
impl RegisterLink for TcpLink {
    async fn read_bits(
        &mut self,
        space: RegisterSpace,
        start: u16,
        count: u16,
    ) -> Result<Vec<bool>> {
        let io_timeout = self.io_timeout;
        match space {
            RegisterSpace::Coil => {
                bounded(io_timeout, "read coils", self.ctx.read_coils(start, count)).await
            },
            RegisterSpace::DiscreteInput => {
                bounded(
                    io_timeout,
                    "read discrete inputs",
                    self.ctx.read_discrete_inputs(start, count),
                )
                .await
            },
            _ => Err(TagSrvError::protocol(format!(
                "{space:?} is not a bit space"
            ))),
        }
    }

    async fn read_words(
        &mut self,
        space: RegisterSpace,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>> {
        let io_timeout = self.io_timeout;
        match space {
            RegisterSpace::InputRegister => {
                bounded(
                    io_timeout,
                    "read input registers",
                    self.ctx.read_input_registers(start, count),
                )
                .await
            },
            RegisterSpace::HoldingRegister => {
                bounded(
                    io_timeout,
                    "read holding registers",
                    self.ctx.read_holding_registers(start, count),
                )
                .await
            },
            _ => Err(TagSrvError::protocol(format!(
                "{space:?} is not a register space"
            ))),
        }
    }

    async fn write_bit(&mut self, start: u16, value: bool) -> Result<()> {
        let io_timeout = self.io_timeout;
        bounded(
            io_timeout,
            "write coil",
            self.ctx.write_single_coil(start, value),
        )
        .await
    }

    async fn write_word(&mut self, start: u16, value: u16) -> Result<()> {
        let io_timeout = self.io_timeout;
        bounded(
            io_timeout,
            "write register",
            self.ctx.write_single_register(start, value),
        )
        .await
    }

    async fn write_words(&mut self, start: u16, values: &[u16]) -> Result<()> {
        let io_timeout = self.io_timeout;
        bounded(
            io_timeout,
            "write registers",
            self.ctx.write_multiple_registers(start, values),
        )
        .await
    }
}

// ============================================================================
// Per-slave connection state
// ============================================================================

/// One named slave: its configuration plus the live handle, if any
pub struct SlaveLink {
    config: SlaveConfig,
    connector: Arc<dyn LinkConnector>,
    link: Option<Box<dyn RegisterLink>>,
}

impl SlaveLink {
    fn new(config: SlaveConfig, connector: Arc<dyn LinkConnector>) -> Self {
        Self {
            config,
            connector,
            link: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn connected(&self) -> bool {
        self.link.is_some()
    }

    /// Return immediately when the cached handle is open; otherwise make
    /// one bounded connect attempt. No background retry; the next caller
    /// re-attempts.
    pub async fn ensure_connected(&mut self) -> Result<()> {
        if self.link.is_some() {
            return Ok(());
        }
        let link = self.connector.connect(&self.config).await?;
        self.link = Some(link);
        Ok(())
    }

    /// Drop the handle; the next use reconnects.
    pub fn close(&mut self) {
        if self.link.take().is_some() {
            debug!(slave = %self.config.name, "link closed");
        }
    }

    fn link_mut(&mut self) -> Result<&mut Box<dyn RegisterLink>> {
        self.link
            .as_mut()
            .ok_or_else(|| TagSrvError::connection(format!("{} not connected", self.config.name)))
    }

    /// An I/O failure invalidates the cached handle so the next use starts
    /// from a fresh connect.
    fn invalidate_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.close();
        }
        result
    }

    pub async fn read_bits(
        &mut self,
        space: RegisterSpace,
        start: u16,
        count: u16,
    ) -> Result<Vec<bool>> {
        self.ensure_connected().await?;
        let result = self.link_mut()?.read_bits(space, start, count).await;
        self.invalidate_on_error(result)
    }

    pub async fn read_words(
        &mut self,
        space: RegisterSpace,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>> {
        self.ensure_connected().await?;
        let result = self.link_mut()?.read_words(space, start, count).await;
        self.invalidate_on_error(result)
    }

    pub async fn write_bit(&mut self, start: u16, value: bool) -> Result<()> {
        self.ensure_connected().await?;
        let result = self.link_mut()?.write_bit(start, value).await;
        self.invalidate_on_error(result)
    }

    pub async fn write_word(&mut self, start: u16, value: u16) -> Result<()> {
        self.ensure_connected().await?;
        let result = self.link_mut()?.write_word(start, value).await;
        self.invalidate_on_error(result)
    }

    pub async fn write_words(&mut self, start: u16, values: &[u16]) -> Result<()> {
        self.ensure_connected().await?;
        let result = self.link_mut()?.write_words(start, values).await;
        self.invalidate_on_error(result)
    }
}

// ============================================================================
// Manager
// ============================================================================

/// Owns one [`SlaveLink`] per configured slave, created lazily on first use
pub struct SlaveLinkManager {
    connector: Arc<dyn LinkConnector>,
    configs: HashMap<String, SlaveConfig>,
    slaves: DashMap<String, Arc<Mutex<SlaveLink>>>,
}

impl SlaveLinkManager {
    pub fn new(connector: Arc<dyn LinkConnector>, configs: Vec<SlaveConfig>) -> Self {
        Self {
            connector,
            configs: configs.into_iter().map(|c| (c.name.clone(), c)).collect(),
            slaves: DashMap::new(),
        }
    }

    /// Lock the named slave for exclusive use. The entry is created lazily
    /// the first time a tag references the slave.
    pub async fn acquire(&self, name: &str) -> Result<OwnedMutexGuard<SlaveLink>> {
        let cell = match self.slaves.get(name) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                let config = self
                    .configs
                    .get(name)
                    .ok_or_else(|| TagSrvError::SlaveNotFound(name.to_string()))?
                    .clone();
                let connector = Arc::clone(&self.connector);
                Arc::clone(
                    self.slaves
                        .entry(name.to_string())
                        .or_insert_with(|| Arc::new(Mutex::new(SlaveLink::new(config, connector))))
                        .value(),
                )
            },
        };
        Ok(cell.lock_owned().await)
    }

    /// Close one slave's handle.
    pub async fn close(&self, name: &str) {
        if let Some(entry) = self.slaves.get(name).map(|e| Arc::clone(e.value())) {
            entry.lock().await.close();
        }
    }

    /// Close every handle. Called on shutdown and on explicit removal.
    pub async fn close_all(&self) {
        let cells: Vec<Arc<Mutex<SlaveLink>>> =
            self.slaves.iter().map(|e| Arc::clone(e.value())).collect();
        for cell in cells {
            cell.lock().await.close();
        }
        info!("all slave links closed");
    }

    /// Connectivity snapshot across every configured slave.
    pub async fn connectivity(&self) -> Vec<(String, bool)> {
        let mut out = Vec::with_capacity(self.configs.len());
        let mut names: Vec<&String> = self.configs.keys().collect();
        names.sort();
        for name in names {
            let connected = match self.slaves.get(name).map(|e| Arc::clone(e.value())) {
                Some(cell) => cell.lock().await.connected(),
                None => false,
            };
            out.push((name.clone(), connected));
        }
        out
    }

    pub fn has_slave(&self, name: &str) -> bool {
        self.configs.contains_key(name)
    }
}

impl std::fmt::Debug for SlaveLinkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlaveLinkManager")
            .field("configs", &self.configs.keys())
            .field("active", &self.slaves.len())
            .finish()
    }
}
