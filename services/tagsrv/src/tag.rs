//! Tag model and Modicon addressing
//!
//! A tag binds a name to one register address on one slave, together with
//! its wire conversion, scan rate and scaling parameters.

use crate::error::{Result, TagSrvError};
use serde::{Deserialize, Serialize};
use tagcodec::{ConversionSpec, ScalingConfig};
use tracing::warn;

/// The four register categories of Modicon-style addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterSpace {
    /// 1–9999, single-bit, read/write
    Coil,
    /// 10001–19999, single-bit, read-only
    DiscreteInput,
    /// 30001–39999, 16-bit, read-only
    InputRegister,
    /// 40001–49999, 16-bit, read/write
    HoldingRegister,
}

impl RegisterSpace {
    /// Classify a Modicon address.
    pub fn from_address(address: u16) -> Result<Self> {
        match address {
            1..=9999 => Ok(Self::Coil),
            10001..=19999 => Ok(Self::DiscreteInput),
            30001..=39999 => Ok(Self::InputRegister),
            40001..=49999 => Ok(Self::HoldingRegister),
            _ => Err(TagSrvError::validation(format!(
                "address {address} is outside every register range"
            ))),
        }
    }

    /// Zero-based protocol offset of a Modicon address in this space.
    pub fn offset(&self, address: u16) -> u16 {
        match self {
            Self::Coil => address - 1,
            Self::DiscreteInput => address - 10001,
            Self::InputRegister => address - 30001,
            Self::HoldingRegister => address - 40001,
        }
    }

    /// Whether addresses in this space hold single bits.
    pub fn is_bit_space(&self) -> bool {
        matches!(self, Self::Coil | Self::DiscreteInput)
    }

    /// Whether a master may write to this space.
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Coil | Self::HoldingRegister)
    }
}

/// Digital or analog process point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataKind {
    Digital,
    #[default]
    Analog,
}

impl DataKind {
    /// Parse the tag-table spelling ("Analog", "Digital", legacy "discrete").
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "analog" => Some(Self::Analog),
            "digital" | "discrete" => Some(Self::Digital),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Digital => "Digital",
            Self::Analog => "Analog",
        }
    }
}

/// Whether a tag accepts writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccessMode {
    ReadOnly,
    #[default]
    ReadWrite,
}

impl AccessMode {
    /// Parse the tag-table spelling ("Read Write", "read_only", ...).
    pub fn parse(s: &str) -> Self {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "readonly" | "read" => Self::ReadOnly,
            _ => Self::ReadWrite,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadOnly => "Read Only",
            Self::ReadWrite => "Read Write",
        }
    }
}

/// One configured process point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Unique name, the registry key
    pub name: String,
    /// Slave connection the tag reads from
    pub slave: String,
    /// Modicon address (1–49999)
    pub address: u16,
    pub data_kind: DataKind,
    /// Conversion catalogue display name; resolved lazily
    pub conversion: String,
    /// Bit extracted when a digital tag sits in a register space (0–15)
    pub start_bit: u8,
    /// Informational bit width from the table schema
    pub length_bit: u8,
    /// Polling interval in seconds
    pub scan_rate: u32,
    pub read_write: AccessMode,
    pub scaling: ScalingConfig,
    pub default_value: f64,
    pub description: String,
}

impl Tag {
    /// A tag with every optional field at its documented default.
    pub fn new(name: impl Into<String>, slave: impl Into<String>, address: u16) -> Self {
        Self {
            name: name.into(),
            slave: slave.into(),
            address,
            data_kind: DataKind::Analog,
            conversion: String::new(),
            start_bit: 0,
            length_bit: 16,
            scan_rate: 1,
            read_write: AccessMode::ReadWrite,
            scaling: ScalingConfig::default(),
            default_value: 0.0,
            description: String::new(),
        }
    }

    /// Register space derived from the address.
    pub fn space(&self) -> Result<RegisterSpace> {
        RegisterSpace::from_address(self.address)
    }

    /// Resolve the conversion name against the catalogue. Digital tags and
    /// unknown names fall back to the default conversion; the fallback for
    /// an unknown name is diagnosed once per call site.
    pub fn resolved_conversion(&self) -> ConversionSpec {
        if self.conversion.trim().is_empty() {
            return ConversionSpec::default();
        }
        ConversionSpec::parse(&self.conversion).unwrap_or_else(|| {
            warn!(
                tag = %self.name,
                conversion = %self.conversion,
                "unknown conversion, using default"
            );
            ConversionSpec::default()
        })
    }

    /// Number of registers one read of this tag covers.
    pub fn register_count(&self) -> u16 {
        match self.data_kind {
            DataKind::Digital => 1,
            DataKind::Analog => self.resolved_conversion().register_count() as u16,
        }
    }

    /// Validate required fields and the address/category invariants.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TagSrvError::validation("missing required field: Name"));
        }
        if self.slave.trim().is_empty() {
            return Err(TagSrvError::validation("missing required field: Slave"));
        }
        let space = self.space()?;

        // Coils and discrete inputs hold single bits, never multi-register
        // values
        if space.is_bit_space() {
            if self.data_kind != DataKind::Digital {
                return Err(TagSrvError::validation(format!(
                    "tag {}: address {} is a bit address and requires Digital data kind",
                    self.name, self.address
                )));
            }
        } else if self.data_kind == DataKind::Analog && self.conversion.trim().is_empty() {
            return Err(TagSrvError::validation(format!(
                "tag {}: missing required field: Conversion",
                self.name
            )));
        }

        if self.start_bit > 15 {
            return Err(TagSrvError::validation(format!(
                "tag {}: start bit {} out of range (0-15)",
                self.name, self.start_bit
            )));
        }
        if self.scan_rate == 0 {
            return Err(TagSrvError::validation(format!(
                "tag {}: scan rate must be positive",
                self.name
            )));
        }
        if self.length_bit == 0 || self.length_bit > 64 {
            return Err(TagSrvError::validation(format!(
                "tag {}: length bit {} out of range (1-64)",
                self.name, self.length_bit
            )));
        }

        Ok(())
    }
}
