//! Gateway facade
//!
//! One owned struct wires the registry, slave links, value cache, scanner
//! and write service together and exposes the operations an outer API
//! layer consumes. There is no global state; everything hangs off this
//! struct.

use crate::cache::{CachedValue, ValueCache};
use crate::config::GatewayConfig;
use crate::error::{Result, WriteError};
use crate::link::{LinkConnector, SlaveLinkManager, TcpLinkConnector};
use crate::registry::TagRegistry;
use crate::scanner::{read_tag, Scanner};
use crate::tag::Tag;
use crate::write::WriteService;
use serde::Serialize;
use std::sync::Arc;
use tagcodec::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Connectivity of one configured slave
#[derive(Debug, Clone, Serialize)]
pub struct SlaveStatus {
    pub name: String,
    pub connected: bool,
}

/// Point-in-time gateway state
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub running: bool,
    pub tag_count: usize,
    pub slaves: Vec<SlaveStatus>,
}

/// The assembled tag gateway
pub struct TagGateway {
    registry: Arc<RwLock<TagRegistry>>,
    links: Arc<SlaveLinkManager>,
    cache: Arc<ValueCache>,
    scanner: Scanner,
    writer: WriteService,
}

impl TagGateway {
    /// Build a gateway speaking Modbus TCP to the configured slaves.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_connector(config, Arc::new(TcpLinkConnector))
    }

    /// Build a gateway over a custom transport, used by tests and by
    /// embedders that bring their own link.
    pub fn with_connector(config: GatewayConfig, connector: Arc<dyn LinkConnector>) -> Self {
        let registry = Arc::new(RwLock::new(TagRegistry::new(&config.tag_table)));
        let links = Arc::new(SlaveLinkManager::new(connector, config.slaves.clone()));
        let cache = Arc::new(ValueCache::new());

        let scanner = Scanner::new(
            Arc::clone(&registry),
            Arc::clone(&links),
            Arc::clone(&cache),
            config.poll.clone(),
        );
        let writer = WriteService::new(
            Arc::clone(&registry),
            Arc::clone(&links),
            Arc::clone(&cache),
        );

        Self {
            registry,
            links,
            cache,
            scanner,
            writer,
        }
    }

    /// Load the tag table from disk. Returns the number of tags.
    pub async fn load_tags(&self) -> Result<usize> {
        self.registry.write().await.load()
    }

    // ========== registry CRUD ==========

    pub async fn add_or_update_tag(&self, tag: Tag) -> Result<()> {
        if !self.links.has_slave(&tag.slave) {
            // Accepted but it will never poll until the slave is configured
            warn!(tag = %tag.name, slave = %tag.slave, "tag references an unconfigured slave");
        }
        self.registry.write().await.add_or_update(tag)
    }

    /// Remove a tag and evict its cached value.
    pub async fn remove_tag(&self, name: &str) -> Result<bool> {
        let removed = self.registry.write().await.remove(name)?;
        if removed {
            self.cache.evict(name);
        }
        Ok(removed)
    }

    pub async fn get_tag(&self, name: &str) -> Option<Tag> {
        self.registry.read().await.get(name).cloned()
    }

    pub async fn tags(&self) -> Vec<Tag> {
        self.registry.read().await.list().cloned().collect()
    }

    // ========== values ==========

    pub fn get_cached_value(&self, name: &str) -> Option<CachedValue> {
        self.cache.get(name)
    }

    pub fn values(&self) -> Vec<(String, CachedValue)> {
        self.cache.snapshot()
    }

    /// Bypass the cache and read the tag from the wire right now. Shares
    /// the per-slave lock with the scanner, so the two never interleave on
    /// one handle.
    pub async fn read_tag_now(&self, name: &str) -> Result<Value> {
        let tag = self
            .get_tag(name)
            .await
            .ok_or_else(|| crate::error::TagSrvError::TagNotFound(name.to_string()))?;
        read_tag(&self.links, &tag).await
    }

    pub async fn write_value(&self, name: &str, value: Value) -> std::result::Result<(), WriteError> {
        self.writer.write(name, value).await
    }

    // ========== lifecycle ==========

    pub async fn start(&self) {
        self.scanner.start().await;
    }

    pub async fn stop(&self) {
        self.scanner.stop().await;
    }

    /// Stop polling and close every slave connection.
    pub async fn shutdown(&self) {
        self.scanner.stop().await;
        self.links.close_all().await;
        info!("gateway shut down");
    }

    pub async fn status(&self) -> GatewayStatus {
        let slaves = self
            .links
            .connectivity()
            .await
            .into_iter()
            .map(|(name, connected)| SlaveStatus { name, connected })
            .collect();

        GatewayStatus {
            running: self.scanner.running().await,
            tag_count: self.registry.read().await.len(),
            slaves,
        }
    }
}
