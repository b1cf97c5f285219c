//! Persisted tag registry
//!
//! The CSV tag table is the single source of truth. The in-memory map is
//! rebuilt from it on [`TagRegistry::load`] and rewritten in full on every
//! mutation; there are no partial writes. Re-adding an existing name
//! overwrites in place.

use crate::error::{Result, TagSrvError};
use crate::tag::{AccessMode, DataKind, Tag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tagcodec::{ScalingConfig, ScalingType};
use tracing::{info, warn};

/// One CSV row, string-typed like the on-disk table. Optional columns
/// default so older tables import cleanly.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TagRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Slave", default)]
    slave: String,
    #[serde(rename = "Data_Type")]
    data_type: String,
    #[serde(rename = "Conversion", default)]
    conversion: String,
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "Start_Bit", default)]
    start_bit: String,
    #[serde(rename = "Length_Bit", default)]
    length_bit: String,
    #[serde(rename = "Span_High", default)]
    span_high: String,
    #[serde(rename = "Span_Low", default)]
    span_low: String,
    #[serde(rename = "Default_Value", default)]
    default_value: String,
    #[serde(rename = "Scan_Rate", default)]
    scan_rate: String,
    #[serde(rename = "Read_Write", default)]
    read_write: String,
    #[serde(rename = "Description", default)]
    description: String,
    #[serde(rename = "Scaling_Type", default)]
    scaling_type: String,
    #[serde(rename = "Formula", default)]
    formula: String,
    #[serde(rename = "Scale", default)]
    scale: String,
    #[serde(rename = "Offset", default)]
    offset: String,
    #[serde(rename = "Input_High", default)]
    input_high: String,
    #[serde(rename = "Input_Low", default)]
    input_low: String,
    #[serde(rename = "Clamp_to_Span", default)]
    clamp_to_span: String,
    #[serde(rename = "Clamp_High", default)]
    clamp_high: String,
    #[serde(rename = "Clamp_Low", default)]
    clamp_low: String,
    #[serde(rename = "Clamp_to_Zero", default)]
    clamp_to_zero: String,
}

fn parse_f64(s: &str, default: f64) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        default
    } else {
        s.parse().unwrap_or(default)
    }
}

fn parse_int<T: std::str::FromStr>(s: &str, default: T) -> T {
    let s = s.trim();
    if s.is_empty() {
        default
    } else {
        // Tables exported by spreadsheet tools may carry "3.0"
        s.parse()
            .ok()
            .or_else(|| s.split('.').next().and_then(|head| head.parse().ok()))
            .unwrap_or(default)
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn bool_str(v: bool) -> String {
    if v { "True" } else { "False" }.to_string()
}

impl TagRow {
    fn into_tag(self) -> Result<Tag> {
        if self.name.trim().is_empty() {
            return Err(TagSrvError::validation("missing required field: Name"));
        }
        let data_kind = DataKind::parse(&self.data_type).ok_or_else(|| {
            TagSrvError::validation(format!(
                "tag {}: missing required field: Data_Type",
                self.name
            ))
        })?;
        let address: u16 = self.address.trim().parse().map_err(|_| {
            TagSrvError::validation(format!(
                "tag {}: missing required field: Address",
                self.name
            ))
        })?;

        let clamp_span = parse_bool(&self.clamp_to_span);
        let scaling = ScalingConfig {
            scaling_type: ScalingType::from_name(&self.scaling_type),
            span_low: parse_f64(&self.span_low, 0.0),
            span_high: parse_f64(&self.span_high, 100.0),
            scale: parse_f64(&self.scale, 1.0),
            offset: parse_f64(&self.offset, 0.0),
            input_low: parse_f64(&self.input_low, 0.0),
            input_high: parse_f64(&self.input_high, 100.0),
            formula: {
                let f = self.formula.trim();
                if f.is_empty() {
                    None
                } else {
                    Some(f.to_string())
                }
            },
            // The legacy aggregate column implies both span clamps
            clamp_to_span_low: clamp_span || parse_bool(&self.clamp_low),
            clamp_to_span_high: clamp_span || parse_bool(&self.clamp_high),
            clamp_to_zero: parse_bool(&self.clamp_to_zero),
        };

        let tag = Tag {
            name: self.name.trim().to_string(),
            slave: self.slave.trim().to_string(),
            address,
            data_kind,
            conversion: self.conversion.trim().to_string(),
            start_bit: parse_int(&self.start_bit, 0u8),
            length_bit: parse_int(&self.length_bit, 16u8),
            scan_rate: parse_int(&self.scan_rate, 1u32),
            read_write: AccessMode::parse(&self.read_write),
            scaling,
            default_value: parse_f64(&self.default_value, 0.0),
            description: self.description.trim().to_string(),
        };
        tag.validate()?;
        Ok(tag)
    }

    fn from_tag(tag: &Tag) -> Self {
        let s = &tag.scaling;
        Self {
            name: tag.name.clone(),
            slave: tag.slave.clone(),
            data_type: tag.data_kind.name().to_string(),
            conversion: tag.conversion.clone(),
            address: tag.address.to_string(),
            start_bit: tag.start_bit.to_string(),
            length_bit: tag.length_bit.to_string(),
            span_high: s.span_high.to_string(),
            span_low: s.span_low.to_string(),
            default_value: tag.default_value.to_string(),
            scan_rate: tag.scan_rate.to_string(),
            read_write: tag.read_write.name().to_string(),
            description: tag.description.clone(),
            scaling_type: s.scaling_type.name().to_string(),
            formula: s.formula.clone().unwrap_or_default(),
            scale: s.scale.to_string(),
            offset: s.offset.to_string(),
            input_high: s.input_high.to_string(),
            input_low: s.input_low.to_string(),
            clamp_to_span: bool_str(s.clamp_to_span_low && s.clamp_to_span_high),
            clamp_high: bool_str(s.clamp_to_span_high),
            clamp_low: bool_str(s.clamp_to_span_low),
            clamp_to_zero: bool_str(s.clamp_to_zero),
        }
    }
}

/// CSV-backed tag table
#[derive(Debug)]
pub struct TagRegistry {
    path: PathBuf,
    tags: BTreeMap<String, Tag>,
}

impl TagRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rebuild the in-memory map from the table file. A missing file is
    /// created empty; a malformed row is skipped with a diagnostic rather
    /// than failing the whole load.
    pub fn load(&mut self) -> Result<usize> {
        if !self.path.exists() {
            self.tags.clear();
            self.save()?;
            return Ok(0);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        self.tags.clear();
        for row in reader.deserialize::<TagRow>() {
            let row = row?;
            let name = row.name.clone();
            match row.into_tag() {
                Ok(tag) => {
                    self.tags.insert(tag.name.clone(), tag);
                },
                Err(e) => {
                    warn!(tag = %name, error = %e, "skipping invalid tag row");
                },
            }
        }

        info!(count = self.tags.len(), path = %self.path.display(), "tag table loaded");
        Ok(self.tags.len())
    }

    /// Rewrite the whole table file from the in-memory map.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        for tag in self.tags.values() {
            writer.serialize(TagRow::from_tag(tag))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Validate, upsert and persist one tag.
    pub fn add_or_update(&mut self, tag: Tag) -> Result<()> {
        tag.validate()?;
        self.tags.insert(tag.name.clone(), tag);
        self.save()
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.tags.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    /// Remove a tag and persist. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        if self.tags.remove(name).is_some() {
            self.save()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
