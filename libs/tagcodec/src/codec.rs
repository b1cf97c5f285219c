//! Register sequence ↔ typed value conversion
//!
//! Stateless: every function takes the registers and a [`ConversionSpec`]
//! and returns a value or an error. Reads of coils/discrete inputs never
//! come through here; they are single bits handled at the link layer.

use crate::conversion::{ConversionSpec, ValueKind};
use crate::error::{CodecError, Result};
use crate::order::{bytes_to_registers, registers_to_bytes};
use crate::value::Value;
use tracing::{trace, warn};

/// Decode a register sequence into a typed value.
///
/// The slice may be longer than the conversion needs; only the leading
/// `register_count()` registers are consumed.
pub fn decode(registers: &[u16], spec: &ConversionSpec) -> Result<Value> {
    let needed = spec.register_count();
    if registers.len() < needed {
        return Err(CodecError::InsufficientRegisters {
            needed,
            got: registers.len(),
        });
    }
    let regs = &registers[..needed];

    let value = match spec.kind {
        ValueKind::ModiconDouble => {
            // Vendor convention, no byte/word order variation applies
            Value::Integer(i64::from(regs[0]) * 10_000 + i64::from(regs[1]))
        },
        ValueKind::TextToNumber => decode_text(regs, spec),
        ValueKind::BcdUint32 => decode_bcd(regs, spec),
        _ => {
            let bytes = registers_to_bytes(regs, spec.byte_order, spec.word_order);
            decode_standard(&bytes, spec.kind)
        },
    };

    trace!(kind = spec.kind.name(), ?regs, %value, "decoded registers");
    Ok(value)
}

/// Encode a typed value into a wire-order register sequence.
///
/// Exact inverse of [`decode`] for the integer, float and BCD kinds.
/// `TextToNumber` and `ModiconDouble` are read-oriented formats and
/// return [`CodecError::NotEncodable`].
pub fn encode(value: &Value, spec: &ConversionSpec) -> Result<Vec<u16>> {
    let bytes = match spec.kind {
        ValueKind::Int16 => (value.as_i64() as i16).to_be_bytes().to_vec(),
        ValueKind::Uint16 => (value.as_u64() as u16).to_be_bytes().to_vec(),
        ValueKind::Int32 => (value.as_i64() as i32).to_be_bytes().to_vec(),
        ValueKind::Uint32 => (value.as_u64() as u32).to_be_bytes().to_vec(),
        ValueKind::Int64 => value.as_i64().to_be_bytes().to_vec(),
        ValueKind::Uint64 => value.as_u64().to_be_bytes().to_vec(),
        ValueKind::Float32 => (value.as_f64() as f32).to_be_bytes().to_vec(),
        ValueKind::Float64 => value.as_f64().to_be_bytes().to_vec(),
        ValueKind::BcdUint32 => encode_bcd(value.as_u64())?,
        ValueKind::TextToNumber => return Err(CodecError::NotEncodable("text_to_number")),
        ValueKind::ModiconDouble => return Err(CodecError::NotEncodable("modicon_double")),
    };

    Ok(bytes_to_registers(&bytes, spec.byte_order, spec.word_order))
}

fn decode_standard(bytes: &[u8], kind: ValueKind) -> Value {
    match kind {
        ValueKind::Int16 => Value::Integer(i64::from(i16::from_be_bytes([bytes[0], bytes[1]]))),
        ValueKind::Uint16 => Value::Integer(i64::from(u16::from_be_bytes([bytes[0], bytes[1]]))),
        ValueKind::Int32 => Value::Integer(i64::from(i32::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ]))),
        ValueKind::Uint32 => Value::Integer(i64::from(u32::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ]))),
        ValueKind::Float32 => Value::Float(f64::from(f32::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ]))),
        ValueKind::Int64 => Value::Integer(i64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])),
        ValueKind::Uint64 => Value::Unsigned(u64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])),
        ValueKind::Float64 => Value::Float(f64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])),
        // Special kinds are dispatched before this point
        ValueKind::BcdUint32 | ValueKind::TextToNumber | ValueKind::ModiconDouble => {
            unreachable!("special kinds handled in decode()")
        },
    }
}

/// ASCII-packed number: two characters per register, non-printable bytes
/// stripped, remainder parsed as a decimal. Parse failure falls back to
/// 0.0, a documented quirk of deployed tag tables, surfaced here as a
/// diagnostic rather than an error.
fn decode_text(regs: &[u16], spec: &ConversionSpec) -> Value {
    let bytes = registers_to_bytes(regs, spec.byte_order, spec.word_order);
    let text: String = bytes
        .iter()
        .map(|&b| char::from(b))
        .filter(|c| c.is_ascii_graphic())
        .collect();

    match text.parse::<f64>() {
        Ok(v) => Value::Float(v),
        Err(_) => {
            warn!(text = %text, "text_to_number parse failed, falling back to 0");
            Value::Float(0.0)
        },
    }
}

/// Packed BCD: each nibble is one decimal digit, most significant first.
/// Nibbles above 9 are malformed and skipped; the valid digits concatenate.
fn decode_bcd(regs: &[u16], spec: &ConversionSpec) -> Value {
    let bytes = registers_to_bytes(regs, spec.byte_order, spec.word_order);
    let mut result: i64 = 0;
    for byte in bytes {
        for nibble in [byte >> 4, byte & 0x0F] {
            if nibble <= 9 {
                result = result * 10 + i64::from(nibble);
            }
        }
    }
    Value::Integer(result)
}

/// Pack a decimal value into BCD nibbles across two registers (8 digits).
fn encode_bcd(value: u64) -> Result<Vec<u8>> {
    if value > 99_99_99_99 {
        return Err(CodecError::ValueOutOfRange {
            kind: "bcd_uint32",
            reason: format!("{value} exceeds 8 BCD digits"),
        });
    }

    let mut bytes = [0u8; 4];
    let mut v = value;
    for slot in bytes.iter_mut().rev() {
        let low = (v % 10) as u8;
        v /= 10;
        let high = (v % 10) as u8;
        v /= 10;
        *slot = (high << 4) | low;
    }
    Ok(bytes.to_vec())
}
