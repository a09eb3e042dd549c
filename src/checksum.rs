//! The computed-value engine: accumulators for checksums, CRCs, and hashes.
//!
//! During the serialize walk, every octet of a covered range is routed through
//! the active accumulators (see [`OutputFrame`](crate::stream::OutputFrame)
//! taps); on exit the finalized value is written into the bound target field
//! and patched into the emitted octets. Deserialization reads computed fields
//! as ordinary values and performs no verification.

use crate::value::Value;
use crc::{Crc, CRC_16_ARC, CRC_16_IBM_SDLC, CRC_16_MODBUS, CRC_16_XMODEM, CRC_32_ISO_HDLC, CRC_64_ECMA_182};
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use twox_hash::XxHash64;

/// CRC-16 polynomial/parameter presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crc16Algo {
    /// CRC-16/XMODEM (CCITT polynomial 0x1021, init 0x0000).
    Ccitt,
    /// CRC-16/IBM-SDLC (X.25).
    X25,
    /// CRC-16/MODBUS.
    Modbus,
    /// CRC-16/ARC (the classic "IBM" CRC).
    Arc,
}

/// Additive checksum flavors over the covered octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumMode {
    /// Sum of octets modulo 256.
    Modulo256,
    /// Two's complement of the modulo-256 sum.
    TwosComplement,
    /// One's complement of the modulo-256 sum.
    OnesComplement,
    /// XOR of all octets.
    Xor,
}

/// Which accumulator a `FieldValue` attribute instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputedKind {
    /// 16-bit CRC with a preset parameter block.
    Crc16(Crc16Algo),
    /// CRC-32 (ISO-HDLC, the ubiquitous "crc32").
    Crc32,
    /// CRC-64/ECMA-182.
    Crc64,
    /// Single-octet additive checksum.
    Checksum(ChecksumMode),
    /// 64-bit XXH64 hash.
    XxHash64 {
        /// Hash seed.
        seed: u64,
    },
}

/// A stateful checksummer fed by the serialize walk.
///
/// `reset` is called on entering the covered node, `update` for every emitted
/// octet of the range (padding included), `finalize` on exit.
pub trait ValueAccumulator: Send {
    /// Preferred update granularity in octets; purely advisory.
    fn block_size(&self) -> usize {
        1
    }

    /// Clears accumulated state.
    fn reset(&mut self);

    /// Feeds a slice of covered octets.
    fn update(&mut self, bytes: &[u8]);

    /// Produces the computed value, consuming the accumulated state.
    fn finalize(&mut self) -> Value;
}

static CRC16_CCITT: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);
static CRC16_X25: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_SDLC);
static CRC16_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);
static CRC16_ARC: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);
static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

struct Crc16Acc {
    crc: &'static Crc<u16>,
    digest: Option<crc::Digest<'static, u16>>,
}

impl ValueAccumulator for Crc16Acc {
    fn reset(&mut self) {
        self.digest = Some(self.crc.digest());
    }

    fn update(&mut self, bytes: &[u8]) {
        if let Some(d) = self.digest.as_mut() {
            d.update(bytes);
        }
    }

    fn finalize(&mut self) -> Value {
        match self.digest.take() {
            Some(d) => Value::UInt(u64::from(d.finalize())),
            None => Value::UInt(0),
        }
    }
}

struct Crc32Acc {
    digest: Option<crc::Digest<'static, u32>>,
}

impl ValueAccumulator for Crc32Acc {
    fn reset(&mut self) {
        self.digest = Some(CRC32.digest());
    }

    fn update(&mut self, bytes: &[u8]) {
        if let Some(d) = self.digest.as_mut() {
            d.update(bytes);
        }
    }

    fn finalize(&mut self) -> Value {
        match self.digest.take() {
            Some(d) => Value::UInt(u64::from(d.finalize())),
            None => Value::UInt(0),
        }
    }
}

struct Crc64Acc {
    digest: Option<crc::Digest<'static, u64>>,
}

impl ValueAccumulator for Crc64Acc {
    fn reset(&mut self) {
        self.digest = Some(CRC64.digest());
    }

    fn update(&mut self, bytes: &[u8]) {
        if let Some(d) = self.digest.as_mut() {
            d.update(bytes);
        }
    }

    fn finalize(&mut self) -> Value {
        match self.digest.take() {
            Some(d) => Value::UInt(d.finalize()),
            None => Value::UInt(0),
        }
    }
}

struct SumAcc {
    mode: ChecksumMode,
    sum: u8,
}

impl ValueAccumulator for SumAcc {
    fn reset(&mut self) {
        self.sum = 0;
    }

    fn update(&mut self, bytes: &[u8]) {
        match self.mode {
            ChecksumMode::Xor => {
                for b in bytes {
                    self.sum ^= b;
                }
            }
            _ => {
                for b in bytes {
                    self.sum = self.sum.wrapping_add(*b);
                }
            }
        }
    }

    fn finalize(&mut self) -> Value {
        let out = match self.mode {
            ChecksumMode::Modulo256 | ChecksumMode::Xor => self.sum,
            ChecksumMode::TwosComplement => self.sum.wrapping_neg(),
            ChecksumMode::OnesComplement => !self.sum,
        };
        Value::UInt(u64::from(out))
    }
}

struct XxAcc {
    seed: u64,
    hasher: XxHash64,
}

impl ValueAccumulator for XxAcc {
    fn block_size(&self) -> usize {
        32
    }

    fn reset(&mut self) {
        self.hasher = XxHash64::with_seed(self.seed);
    }

    fn update(&mut self, bytes: &[u8]) {
        self.hasher.write(bytes);
    }

    fn finalize(&mut self) -> Value {
        Value::UInt(self.hasher.finish())
    }
}

/// Instantiates a fresh accumulator for the given kind.
pub fn accumulator_for(kind: ComputedKind) -> Box<dyn ValueAccumulator> {
    match kind {
        ComputedKind::Crc16(algo) => {
            let crc = match algo {
                Crc16Algo::Ccitt => &CRC16_CCITT,
                Crc16Algo::X25 => &CRC16_X25,
                Crc16Algo::Modbus => &CRC16_MODBUS,
                Crc16Algo::Arc => &CRC16_ARC,
            };
            Box::new(Crc16Acc { crc, digest: None })
        }
        ComputedKind::Crc32 => Box::new(Crc32Acc { digest: None }),
        ComputedKind::Crc64 => Box::new(Crc64Acc { digest: None }),
        ComputedKind::Checksum(mode) => Box::new(SumAcc { mode, sum: 0 }),
        ComputedKind::XxHash64 { seed } => Box::new(XxAcc {
            seed,
            hasher: XxHash64::with_seed(seed),
        }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    fn run(kind: ComputedKind, data: &[u8]) -> Value {
        let mut acc = accumulator_for(kind);
        acc.reset();
        acc.update(data);
        acc.finalize()
    }

    #[test]
    fn crc16_ccitt_known_vector() {
        // "123456789" under CRC-16/XMODEM is 0x31C3.
        assert_eq!(
            run(ComputedKind::Crc16(Crc16Algo::Ccitt), b"123456789"),
            Value::UInt(0x31C3)
        );
    }

    #[test]
    fn crc32_known_vector() {
        // "123456789" under CRC-32/ISO-HDLC is 0xCBF43926.
        assert_eq!(run(ComputedKind::Crc32, b"123456789"), Value::UInt(0xCBF4_3926));
    }

    #[test]
    fn additive_modes() {
        let data = [0x01u8, 0x02, 0xFF];
        assert_eq!(
            run(ComputedKind::Checksum(ChecksumMode::Modulo256), &data),
            Value::UInt(0x02)
        );
        assert_eq!(
            run(ComputedKind::Checksum(ChecksumMode::TwosComplement), &data),
            Value::UInt(0xFE)
        );
        assert_eq!(
            run(ComputedKind::Checksum(ChecksumMode::OnesComplement), &data),
            Value::UInt(0xFD)
        );
        assert_eq!(
            run(ComputedKind::Checksum(ChecksumMode::Xor), &data),
            Value::UInt(0xFC)
        );
    }

    #[test]
    fn reset_clears_state() {
        let mut acc = accumulator_for(ComputedKind::Crc16(Crc16Algo::Ccitt));
        acc.reset();
        acc.update(b"garbage");
        acc.reset();
        acc.update(b"123456789");
        assert_eq!(acc.finalize(), Value::UInt(0x31C3));
    }

    #[test]
    fn xxhash_is_seed_sensitive() {
        let a = run(ComputedKind::XxHash64 { seed: 0 }, b"data");
        let b = run(ComputedKind::XxHash64 { seed: 1 }, b"data");
        assert_ne!(a, b);
    }
}
