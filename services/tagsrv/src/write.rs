//! On-demand single-tag writes

use crate::cache::ValueCache;
use crate::error::{TagSrvError, WriteError};
use crate::link::SlaveLinkManager;
use crate::registry::TagRegistry;
use crate::tag::{AccessMode, DataKind};
use std::sync::Arc;
use tagcodec::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Validates and performs a single tag write, reversing the codec.
pub struct WriteService {
    registry: Arc<RwLock<TagRegistry>>,
    links: Arc<SlaveLinkManager>,
    cache: Arc<ValueCache>,
}

impl WriteService {
    pub fn new(
        registry: Arc<RwLock<TagRegistry>>,
        links: Arc<SlaveLinkManager>,
        cache: Arc<ValueCache>,
    ) -> Self {
        Self {
            registry,
            links,
            cache,
        }
    }

    /// Write `value` to the named tag. On success the cache is updated so
    /// consumers see the commanded value until the next scan confirms it.
    pub async fn write(&self, name: &str, value: Value) -> Result<(), WriteError> {
        let tag = {
            let registry = self.registry.read().await;
            registry
                .get(name)
                .cloned()
                .ok_or_else(|| WriteError::UnknownTag(name.to_string()))?
        };

        if tag.read_write == AccessMode::ReadOnly {
            return Err(WriteError::NotWritable(name.to_string()));
        }
        let space = tag
            .space()
            .map_err(|e| WriteError::Encode(e.to_string()))?;
        if !space.is_writable() {
            return Err(WriteError::NotWritable(name.to_string()));
        }

        let offset = space.offset(tag.address);
        debug!(tag = %tag.name, slave = %tag.slave, address = tag.address, %value, "writing");

        let mut link = self
            .links
            .acquire(&tag.slave)
            .await
            .map_err(connection_error)?;

        match tag.data_kind {
            DataKind::Digital => {
                // Single-bit writes go to coils only
                if space != crate::tag::RegisterSpace::Coil {
                    return Err(WriteError::NotWritable(name.to_string()));
                }
                link.write_bit(offset, value.as_bool())
                    .await
                    .map_err(connection_error)?;
            },
            DataKind::Analog => {
                let spec = tag.resolved_conversion();
                if spec.register_count() > 1 {
                    let registers = tagcodec::encode(&value, &spec)?;
                    link.write_words(offset, &registers)
                        .await
                        .map_err(connection_error)?;
                } else {
                    link.write_word(offset, value.as_i64() as u16)
                        .await
                        .map_err(connection_error)?;
                }
            },
        }

        drop(link);
        self.cache.insert(name, value);
        info!(tag = %tag.name, %value, "write complete");
        Ok(())
    }
}

fn connection_error(err: TagSrvError) -> WriteError {
    WriteError::Connection(err.to_string())
}
