//! Modbus tag acquisition gateway
//!
//! Reads and writes process values over Modicon-style addressing and
//! exposes them as named, independently scaled tags. The crate provides:
//!
//! - a persisted CSV tag table ([`registry::TagRegistry`])
//! - per-slave connection management over Modbus TCP ([`link`])
//! - a multi-rate polling scanner feeding a value cache ([`scanner`],
//!   [`cache`])
//! - validated single-tag writes ([`write`])
//!
//! all assembled behind [`gateway::TagGateway`]. Register decoding and
//! value scaling live in the `tagcodec` crate.

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod link;
pub mod registry;
pub mod scanner;
pub mod tag;
pub mod write;

pub use cache::{CachedValue, ValueCache};
pub use config::{GatewayConfig, PollConfig, SlaveConfig};
pub use error::{Result, TagSrvError, WriteError};
pub use gateway::{GatewayStatus, SlaveStatus, TagGateway};
pub use link::{LinkConnector, RegisterLink, SlaveLinkManager, TcpLinkConnector};
pub use registry::TagRegistry;
pub use scanner::Scanner;
pub use tag::{AccessMode, DataKind, RegisterSpace, Tag};
pub use write::WriteService;
