//! Raw value → engineering value transforms
//!
//! [`apply`] is pure and total: numeric edge cases (zero denominators,
//! negative radicands, out-of-range 12-bit inputs) degrade to the raw or
//! span-low value instead of failing, and a broken user formula keeps the
//! pre-formula result.

use crate::formula;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The scaling transform catalogue. Display names match the tag-table
/// vocabulary verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScalingType {
    #[default]
    NoScale,
    /// `span_low + (x/100) * (span_high - span_low)`
    PercentToSpan,
    /// `scale * x + offset`
    LinearMxB,
    /// Map `[input_low, input_high]` onto the span
    InputRangeToSpan,
    /// Map a 12-bit input (0..=4095) onto the span
    TwelveBitToSpan,
    /// `span_low + sqrt(x/100) * (span_high - span_low)`
    SquareRootPercent,
    /// `span_low + sqrt(x / (input_high - input_low)) * (span_high - span_low)`
    SquareRootInputRange,
}

impl ScalingType {
    /// Parse a tag-table display name. Unknown names map to `NoScale`.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "Scale 0-100% Input to Span" => Self::PercentToSpan,
            "Linear Scale, MX+B" => Self::LinearMxB,
            "Scale Defined Input H/L to Span" => Self::InputRangeToSpan,
            "Scale 12-Bit Input to Span" => Self::TwelveBitToSpan,
            "Scale 0-100% Square Root Input" => Self::SquareRootPercent,
            "Square Root of (Input/(F2-F1)) to Span" => Self::SquareRootInputRange,
            _ => Self::NoScale,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NoScale => "No Scale",
            Self::PercentToSpan => "Scale 0-100% Input to Span",
            Self::LinearMxB => "Linear Scale, MX+B",
            Self::InputRangeToSpan => "Scale Defined Input H/L to Span",
            Self::TwelveBitToSpan => "Scale 12-Bit Input to Span",
            Self::SquareRootPercent => "Scale 0-100% Square Root Input",
            Self::SquareRootInputRange => "Square Root of (Input/(F2-F1)) to Span",
        }
    }
}

/// Per-tag scaling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingConfig {
    pub scaling_type: ScalingType,
    pub span_low: f64,
    pub span_high: f64,
    /// M in MX+B
    pub scale: f64,
    /// B in MX+B
    pub offset: f64,
    pub input_low: f64,
    pub input_high: f64,
    /// Optional user expression over `x`, applied after the base transform
    pub formula: Option<String>,
    pub clamp_to_span_low: bool,
    pub clamp_to_span_high: bool,
    pub clamp_to_zero: bool,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            scaling_type: ScalingType::NoScale,
            span_low: 0.0,
            span_high: 100.0,
            scale: 1.0,
            offset: 0.0,
            input_low: 0.0,
            input_high: 100.0,
            formula: None,
            clamp_to_span_low: false,
            clamp_to_span_high: false,
            clamp_to_zero: false,
        }
    }
}

/// Apply the configured transform, formula and clamps to a raw value.
pub fn apply(raw: f64, cfg: &ScalingConfig) -> f64 {
    let span = cfg.span_high - cfg.span_low;

    let mut scaled = match cfg.scaling_type {
        ScalingType::NoScale => raw,
        ScalingType::PercentToSpan => cfg.span_low + (raw / 100.0) * span,
        ScalingType::LinearMxB => cfg.scale * raw + cfg.offset,
        ScalingType::InputRangeToSpan => {
            if cfg.input_high != cfg.input_low {
                let ratio = (raw - cfg.input_low) / (cfg.input_high - cfg.input_low);
                cfg.span_low + ratio * span
            } else {
                raw
            }
        },
        ScalingType::TwelveBitToSpan => {
            if (0.0..=4095.0).contains(&raw) {
                cfg.span_low + (raw / 4095.0) * span
            } else {
                raw
            }
        },
        ScalingType::SquareRootPercent => {
            if raw >= 0.0 {
                cfg.span_low + (raw / 100.0).sqrt() * span
            } else {
                cfg.span_low
            }
        },
        ScalingType::SquareRootInputRange => {
            if cfg.input_high != cfg.input_low {
                let ratio = raw / (cfg.input_high - cfg.input_low);
                if ratio >= 0.0 {
                    cfg.span_low + ratio.sqrt() * span
                } else {
                    cfg.span_low
                }
            } else {
                raw
            }
        },
    };

    if let Some(expr) = cfg.formula.as_deref() {
        if !expr.trim().is_empty() {
            match formula::evaluate(expr, scaled) {
                Ok(v) => scaled = v,
                Err(e) => {
                    // Non-fatal: keep the pre-formula value
                    warn!(formula = expr, error = %e, "formula evaluation failed");
                },
            }
        }
    }

    // Clamp order is fixed; clamp_to_zero sees the pre-clamp value and
    // overrides the span clamps (last writer wins).
    let out_of_span = scaled < cfg.span_low || scaled > cfg.span_high;
    let mut clamped = scaled;
    if cfg.clamp_to_span_low && clamped < cfg.span_low {
        clamped = cfg.span_low;
    }
    if cfg.clamp_to_span_high && clamped > cfg.span_high {
        clamped = cfg.span_high;
    }
    if cfg.clamp_to_zero && out_of_span {
        clamped = 0.0;
    }

    clamped
}
