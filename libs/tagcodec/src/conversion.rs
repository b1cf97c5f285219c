//! Conversion catalogue
//!
//! Maps the display names used in tag tables to a concrete
//! [`ConversionSpec`]: a value kind plus byte/word ordering.

use crate::order::{ByteOrder, WordOrder};
use serde::{Deserialize, Serialize};

/// The value kind a register sequence decodes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Int16,
    Int32,
    Int64,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    /// Packed BCD, one decimal digit per nibble
    BcdUint32,
    /// ASCII characters packed two per register, parsed as a number
    TextToNumber,
    /// Vendor double precision: `regs[0] * 10000 + regs[1]`
    ModiconDouble,
}

impl ValueKind {
    /// Number of 16-bit registers this kind occupies
    pub fn register_count(&self) -> usize {
        match self {
            ValueKind::Int16 | ValueKind::Uint16 => 1,
            ValueKind::Int32
            | ValueKind::Uint32
            | ValueKind::Float32
            | ValueKind::BcdUint32
            | ValueKind::TextToNumber
            | ValueKind::ModiconDouble => 2,
            ValueKind::Int64 | ValueKind::Uint64 | ValueKind::Float64 => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Int16 => "int16",
            ValueKind::Int32 => "int32",
            ValueKind::Int64 => "int64",
            ValueKind::Uint16 => "uint16",
            ValueKind::Uint32 => "uint32",
            ValueKind::Uint64 => "uint64",
            ValueKind::Float32 => "float32",
            ValueKind::Float64 => "float64",
            ValueKind::BcdUint32 => "bcd_uint32",
            ValueKind::TextToNumber => "text_to_number",
            ValueKind::ModiconDouble => "modicon_double",
        }
    }
}

/// A fully resolved wire encoding for one tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionSpec {
    pub kind: ValueKind,
    pub byte_order: ByteOrder,
    pub word_order: WordOrder,
}

/// Display name → spec. The names are the tag-table vocabulary and are
/// matched verbatim.
const CATALOGUE: &[(&str, ConversionSpec)] = &[
    // INT64
    (
        "INT64, Little Endian, Swap Byte (GHEFCDAB)",
        spec(ValueKind::Int64, ByteOrder::Big, WordOrder::Little),
    ),
    (
        "INT64, Big Endian, Swap Byte (BADCFEHG)",
        spec(ValueKind::Int64, ByteOrder::Little, WordOrder::Big),
    ),
    (
        "INT64, Little Endian (HGFEDCBA)",
        spec(ValueKind::Int64, ByteOrder::Little, WordOrder::Little),
    ),
    (
        "INT64, Big Endian (ABCDEFGH)",
        spec(ValueKind::Int64, ByteOrder::Big, WordOrder::Big),
    ),
    // UINT64
    (
        "UINT64, Big Endian (ABCDEFGH)",
        spec(ValueKind::Uint64, ByteOrder::Big, WordOrder::Big),
    ),
    (
        "UINT64, Little Endian (HGFEDCBA)",
        spec(ValueKind::Uint64, ByteOrder::Little, WordOrder::Little),
    ),
    (
        "UINT64, Big Endian, Swap Byte (BADCFEHG)",
        spec(ValueKind::Uint64, ByteOrder::Little, WordOrder::Big),
    ),
    (
        "UINT64, Little Endian, Swap Byte (GHEFCDAB)",
        spec(ValueKind::Uint64, ByteOrder::Big, WordOrder::Little),
    ),
    // UINT32
    (
        "UINT, Big Endian (ABCD)",
        spec(ValueKind::Uint32, ByteOrder::Big, WordOrder::Big),
    ),
    (
        "UINT, Big Endian, Swap Word (CDAB)",
        spec(ValueKind::Uint32, ByteOrder::Big, WordOrder::Little),
    ),
    (
        "UINT, Packed BCD, Big Endian (ABCD)",
        spec(ValueKind::BcdUint32, ByteOrder::Big, WordOrder::Big),
    ),
    (
        "UINT, Packed BCD, Big Endian, Swap Word (CDAB)",
        spec(ValueKind::BcdUint32, ByteOrder::Big, WordOrder::Little),
    ),
    (
        "UINT, Little Endian (DCBA)",
        spec(ValueKind::Uint32, ByteOrder::Little, WordOrder::Little),
    ),
    // INT32
    (
        "INT, Big Endian (ABCD)",
        spec(ValueKind::Int32, ByteOrder::Big, WordOrder::Big),
    ),
    (
        "INT, Big Endian, Swap Word (CDAB)",
        spec(ValueKind::Int32, ByteOrder::Big, WordOrder::Little),
    ),
    (
        "INT, Little Endian (DCBA)",
        spec(ValueKind::Int32, ByteOrder::Little, WordOrder::Little),
    ),
    (
        "INT, Text to Number",
        spec(ValueKind::TextToNumber, ByteOrder::Big, WordOrder::Big),
    ),
    // Vendor special
    (
        "UINT32, Modicon Double Precision (reg1*10000+reg2)",
        spec(ValueKind::ModiconDouble, ByteOrder::Big, WordOrder::Big),
    ),
    // FLOAT
    (
        "FLOAT, Big Endian (ABCD)",
        spec(ValueKind::Float32, ByteOrder::Big, WordOrder::Big),
    ),
    (
        "FLOAT, Big Endian, Swap Word (CDAB)",
        spec(ValueKind::Float32, ByteOrder::Big, WordOrder::Little),
    ),
    (
        "FLOAT, Little Endian, Swap Word (BADC)",
        spec(ValueKind::Float32, ByteOrder::Little, WordOrder::Big),
    ),
    (
        "FLOAT, Little Endian (DCBA)",
        spec(ValueKind::Float32, ByteOrder::Little, WordOrder::Little),
    ),
    // DOUBLE
    (
        "DOUBLE, Big Endian (ABCDEFGH)",
        spec(ValueKind::Float64, ByteOrder::Big, WordOrder::Big),
    ),
    (
        "DOUBLE, Little Endian (HGFEDCBA)",
        spec(ValueKind::Float64, ByteOrder::Little, WordOrder::Little),
    ),
    // Single register
    ("INT16", spec(ValueKind::Int16, ByteOrder::Big, WordOrder::Big)),
    ("UINT16", spec(ValueKind::Uint16, ByteOrder::Big, WordOrder::Big)),
];

const fn spec(kind: ValueKind, byte_order: ByteOrder, word_order: WordOrder) -> ConversionSpec {
    ConversionSpec {
        kind,
        byte_order,
        word_order,
    }
}

impl ConversionSpec {
    /// Look up a catalogue display name. Returns `None` for unknown names;
    /// the caller decides the fallback policy.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        CATALOGUE
            .iter()
            .find(|(display, _)| *display == name)
            .map(|(_, s)| *s)
    }

    /// Number of 16-bit registers this conversion occupies
    pub fn register_count(&self) -> usize {
        self.kind.register_count()
    }

    /// All catalogue display names, in table order
    pub fn catalogue_names() -> impl Iterator<Item = &'static str> {
        CATALOGUE.iter().map(|(display, _)| *display)
    }
}

impl Default for ConversionSpec {
    /// "FLOAT, Big Endian (ABCD)", the catalogue default for analog tags
    fn default() -> Self {
        spec(ValueKind::Float32, ByteOrder::Big, WordOrder::Big)
    }
}
