//! Byte and word ordering for multi-register values
//!
//! Two independent axes describe how a value is laid out on the wire:
//!
//! - **Byte order** governs the two bytes inside each 16-bit register.
//! - **Word order** governs the sequence of registers when a value spans
//!   more than one.
//!
//! With the value's big-endian bytes labelled `A B C D`, the four 32-bit
//! layouts factor as:
//!
//! | Layout | Byte order | Word order |
//! |--------|-----------|------------|
//! | `ABCD` | Big       | Big        |
//! | `CDAB` | Big       | Little     |
//! | `BADC` | Little    | Big        |
//! | `DCBA` | Little    | Little     |

use serde::{Deserialize, Serialize};

/// Order of the two bytes within a single 16-bit register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Most significant byte first (network order)
    Big,
    /// Least significant byte first
    Little,
}

/// Order of 16-bit registers when combined into a 32/64-bit value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WordOrder {
    /// Most significant word first
    Big,
    /// Least significant word first
    Little,
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::Big
    }
}

impl Default for WordOrder {
    fn default() -> Self {
        Self::Big
    }
}

/// Reassemble a register sequence into the value's big-endian byte sequence.
///
/// Word order `Little` reverses the register sequence; byte order `Little`
/// swaps the bytes of each register. The result is always interpreted
/// big-endian by the caller.
pub fn registers_to_bytes(registers: &[u16], byte_order: ByteOrder, word_order: WordOrder) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(registers.len() * 2);

    let push = |bytes: &mut Vec<u8>, reg: u16| {
        let [hi, lo] = reg.to_be_bytes();
        match byte_order {
            ByteOrder::Big => {
                bytes.push(hi);
                bytes.push(lo);
            },
            ByteOrder::Little => {
                bytes.push(lo);
                bytes.push(hi);
            },
        }
    };

    match word_order {
        WordOrder::Big => {
            for &reg in registers {
                push(&mut bytes, reg);
            }
        },
        WordOrder::Little => {
            for &reg in registers.iter().rev() {
                push(&mut bytes, reg);
            }
        },
    }

    bytes
}

/// Split a value's big-endian byte sequence into wire-order registers.
///
/// Exact inverse of [`registers_to_bytes`]. `bytes.len()` must be even.
pub fn bytes_to_registers(bytes: &[u8], byte_order: ByteOrder, word_order: WordOrder) -> Vec<u16> {
    let mut registers: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| match byte_order {
            ByteOrder::Big => u16::from_be_bytes([pair[0], pair[1]]),
            ByteOrder::Little => u16::from_le_bytes([pair[0], pair[1]]),
        })
        .collect();

    if word_order == WordOrder::Little {
        registers.reverse();
    }

    registers
}
