// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the pv-modbus-exporter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Inverter register map and decoding rules
//!
//! The exporter reads a fixed set of input registers from the inverter.
//! Each entry of [`REGISTER_MAP`] names the metric it feeds, the start
//! address, and the value kind stored there. The raw register blocks are
//! big-endian byte sequences of `2 * register_count` bytes.

pub mod client;

use thiserror::Error;

use crate::metrics::PvMetric;

pub use client::{ModbusRegisterReader, RegisterReader};

/// Raw 32-bit reading the inverter reports when a power register has no
/// current value (observed device quirk, not part of the Modbus spec).
/// Decodes to zero instead of a nonsensical ~2.1 GW reading. Do not assume
/// other register kinds use the same convention.
pub const NO_DATA_SENTINEL: u32 = 0x8000_0000;

/// Error produced when a register block does not match its declared kind.
///
/// This signals a descriptor/configuration fault, not a transient device
/// condition, and is never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("register block is {actual} bytes, expected {expected} for a {kind:?} value")]
    BlockLength {
        kind: RegisterKind,
        expected: usize,
        actual: usize,
    },
}

/// The kinds of values stored in the inverter's input registers.
///
/// Each kind owns its decode rule, so the hot path dispatches on the
/// descriptor instead of switching on raw block sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    /// One register, big-endian unsigned 16-bit value.
    /// Unused by the configured metrics but part of the decoding contract.
    U16,
    /// Two registers, big-endian unsigned 32-bit value with the
    /// [`NO_DATA_SENTINEL`] convention.
    U32,
    /// Four registers, big-endian unsigned 64-bit value.
    U64,
}

impl RegisterKind {
    /// Number of 16-bit registers a value of this kind spans.
    pub const fn register_count(self) -> u16 {
        match self {
            RegisterKind::U16 => 1,
            RegisterKind::U32 => 2,
            RegisterKind::U64 => 4,
        }
    }

    /// Decode a raw big-endian register block into a physical value.
    pub fn decode(self, block: &[u8]) -> Result<f64, DecodeError> {
        let expected = usize::from(self.register_count()) * 2;
        if block.len() != expected {
            return Err(DecodeError::BlockLength {
                kind: self,
                expected,
                actual: block.len(),
            });
        }

        let value = match self {
            RegisterKind::U16 => {
                let raw: [u8; 2] = block.try_into().expect("length checked above");
                u16::from_be_bytes(raw) as f64
            }
            RegisterKind::U32 => {
                let raw: [u8; 4] = block.try_into().expect("length checked above");
                let value = u32::from_be_bytes(raw);
                if value == NO_DATA_SENTINEL {
                    0.0
                } else {
                    value as f64
                }
            }
            RegisterKind::U64 => {
                let raw: [u8; 8] = block.try_into().expect("length checked above");
                u64::from_be_bytes(raw) as f64
            }
        };

        Ok(value)
    }
}

/// One entry of the read schedule: which metric, where, and what kind.
#[derive(Debug, Clone, Copy)]
pub struct RegisterSpec {
    pub metric: PvMetric,
    pub address: u16,
    pub kind: RegisterKind,
}

impl RegisterSpec {
    /// Number of 16-bit registers to request for this entry.
    pub const fn count(&self) -> u16 {
        self.kind.register_count()
    }
}

/// The fixed read schedule, polled in table order every cycle.
///
/// Addresses are the SMA input registers for daily yield and the per-tracker
/// and combined power values. The table never changes at runtime.
pub const REGISTER_MAP: [RegisterSpec; 4] = [
    RegisterSpec {
        metric: PvMetric::DailyYield,
        address: 30517,
        kind: RegisterKind::U64,
    },
    RegisterSpec {
        metric: PvMetric::Mppt1Watts,
        address: 30773,
        kind: RegisterKind::U32,
    },
    RegisterSpec {
        metric: PvMetric::Mppt2Watts,
        address: 30961,
        kind: RegisterKind::U32,
    },
    RegisterSpec {
        metric: PvMetric::TotalWatts,
        address: 30775,
        kind: RegisterKind::U32,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_zero_block_decodes_to_zero() {
        assert_eq!(
            RegisterKind::U32.decode(&[0x00, 0x00, 0x00, 0x00]),
            Ok(0.0)
        );
    }

    #[test]
    fn u32_sentinel_decodes_to_zero() {
        // 0x80000000 == 2147483648, the "no data" reading
        assert_eq!(
            RegisterKind::U32.decode(&[0x80, 0x00, 0x00, 0x00]),
            Ok(0.0)
        );
    }

    #[test]
    fn u32_regular_value_decodes_verbatim() {
        assert_eq!(
            RegisterKind::U32.decode(&[0x00, 0x00, 0x27, 0x10]),
            Ok(10000.0)
        );
    }

    #[test]
    fn u32_top_bit_with_other_bits_is_not_the_sentinel() {
        // Only the exact sentinel maps to zero
        assert_eq!(
            RegisterKind::U32.decode(&[0x80, 0x00, 0x00, 0x01]),
            Ok(2147483649.0)
        );
    }

    #[test]
    fn u64_block_decodes_big_endian() {
        assert_eq!(
            RegisterKind::U64.decode(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xE8]),
            Ok(1000.0)
        );
    }

    #[test]
    fn u16_block_decodes_big_endian() {
        assert_eq!(RegisterKind::U16.decode(&[0x01, 0x00]), Ok(256.0));
    }

    #[test]
    fn wrong_block_length_is_a_decode_error() {
        let err = RegisterKind::U32.decode(&[0x00, 0x00, 0x27]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::BlockLength {
                kind: RegisterKind::U32,
                expected: 4,
                actual: 3,
            }
        );

        assert!(RegisterKind::U64.decode(&[0x00; 4]).is_err());
        assert!(RegisterKind::U16.decode(&[0x00; 4]).is_err());
    }

    #[test]
    fn register_map_matches_the_documented_schedule() {
        assert_eq!(REGISTER_MAP.len(), 4);

        let daily = &REGISTER_MAP[0];
        assert_eq!(daily.metric, PvMetric::DailyYield);
        assert_eq!(daily.address, 30517);
        assert_eq!(daily.count(), 4);

        let mppt1 = &REGISTER_MAP[1];
        assert_eq!(mppt1.metric, PvMetric::Mppt1Watts);
        assert_eq!(mppt1.address, 30773);
        assert_eq!(mppt1.count(), 2);

        let mppt2 = &REGISTER_MAP[2];
        assert_eq!(mppt2.metric, PvMetric::Mppt2Watts);
        assert_eq!(mppt2.address, 30961);
        assert_eq!(mppt2.count(), 2);

        let total = &REGISTER_MAP[3];
        assert_eq!(total.metric, PvMetric::TotalWatts);
        assert_eq!(total.address, 30775);
        assert_eq!(total.count(), 2);
    }
}
