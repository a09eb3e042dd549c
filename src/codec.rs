//! Primitive codecs: fixed-width integers, floats, booleans, and string
//! encodings, with explicit endianness.
//!
//! Everything here is allocation-light and branch-predictable; the walkers
//! above it decide *what* to encode, this module decides *how the octets look*.

use crate::error::{BinformError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Byte order of a multi-octet primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian {
    /// Least significant octet first.
    Little,
    /// Most significant octet first.
    Big,
}

impl Default for Endian {
    fn default() -> Self {
        Self::Little
    }
}

/// Fixed-width primitive kinds the engine can place on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prim {
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 64-bit integer.
    U64,
    /// Signed 64-bit integer.
    I64,
    /// IEEE-754 single precision.
    F32,
    /// IEEE-754 double precision.
    F64,
    /// Boolean, one octet, zero = false.
    Bool,
}

impl Prim {
    /// Serialized width in octets.
    pub fn width(&self) -> usize {
        match self {
            Self::U8 | Self::I8 | Self::Bool => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    /// Lowercase name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Bool => "bool",
        }
    }

    /// True for the floating point kinds.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// True for the signed integer kinds.
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }
}

/// Encoded form of one primitive value, at most eight octets.
#[derive(Debug, Clone, Copy)]
pub struct PrimBytes {
    buf: [u8; 8],
    len: usize,
}

impl PrimBytes {
    /// Borrows the encoded octets.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

fn out_of_range(prim: Prim, value: &Value) -> BinformError {
    BinformError::ValueOutOfRange {
        prim: prim.name(),
        value: format!("{value:?}"),
    }
}

fn mismatch(expected: &'static str, value: &Value) -> BinformError {
    BinformError::TypeMismatch {
        expected,
        found: value.kind_name(),
    }
}

macro_rules! put {
    ($buf:expr, $bytes:expr) => {{
        let b = $bytes;
        $buf[..b.len()].copy_from_slice(&b);
        b.len()
    }};
}

/// Encodes a [`Value`] as the given primitive with the given byte order.
///
/// Integer values are range-checked against the target width; floats accept
/// any numeric variant.
pub fn encode_prim(prim: Prim, value: &Value, endian: Endian) -> Result<PrimBytes> {
    let mut buf = [0u8; 8];
    let len = match prim {
        Prim::Bool => {
            let b = match value {
                Value::Bool(b) => *b,
                other => other.as_u64().map(|v| v != 0).ok_or_else(|| mismatch("bool", value))?,
            };
            buf[0] = u8::from(b);
            1
        }
        Prim::F32 => {
            let v = value.as_f64().ok_or_else(|| mismatch("float", value))? as f32;
            match endian {
                Endian::Little => put!(buf, v.to_le_bytes()),
                Endian::Big => put!(buf, v.to_be_bytes()),
            }
        }
        Prim::F64 => {
            let v = value.as_f64().ok_or_else(|| mismatch("float", value))?;
            match endian {
                Endian::Little => put!(buf, v.to_le_bytes()),
                Endian::Big => put!(buf, v.to_be_bytes()),
            }
        }
        _ if prim.is_signed() => {
            let v = value.as_i64().ok_or_else(|| mismatch("int", value))?;
            match prim {
                Prim::I8 => {
                    let n = i8::try_from(v).map_err(|_| out_of_range(prim, value))?;
                    put!(buf, n.to_le_bytes())
                }
                Prim::I16 => {
                    let n = i16::try_from(v).map_err(|_| out_of_range(prim, value))?;
                    match endian {
                        Endian::Little => put!(buf, n.to_le_bytes()),
                        Endian::Big => put!(buf, n.to_be_bytes()),
                    }
                }
                Prim::I32 => {
                    let n = i32::try_from(v).map_err(|_| out_of_range(prim, value))?;
                    match endian {
                        Endian::Little => put!(buf, n.to_le_bytes()),
                        Endian::Big => put!(buf, n.to_be_bytes()),
                    }
                }
                _ => match endian {
                    Endian::Little => put!(buf, v.to_le_bytes()),
                    Endian::Big => put!(buf, v.to_be_bytes()),
                },
            }
        }
        _ => {
            let v = value.as_u64().ok_or_else(|| mismatch("uint", value))?;
            match prim {
                Prim::U8 => {
                    let n = u8::try_from(v).map_err(|_| out_of_range(prim, value))?;
                    buf[0] = n;
                    1
                }
                Prim::U16 => {
                    let n = u16::try_from(v).map_err(|_| out_of_range(prim, value))?;
                    match endian {
                        Endian::Little => put!(buf, n.to_le_bytes()),
                        Endian::Big => put!(buf, n.to_be_bytes()),
                    }
                }
                Prim::U32 => {
                    let n = u32::try_from(v).map_err(|_| out_of_range(prim, value))?;
                    match endian {
                        Endian::Little => put!(buf, n.to_le_bytes()),
                        Endian::Big => put!(buf, n.to_be_bytes()),
                    }
                }
                _ => match endian {
                    Endian::Little => put!(buf, v.to_le_bytes()),
                    Endian::Big => put!(buf, v.to_be_bytes()),
                },
            }
        }
    };
    Ok(PrimBytes { buf, len })
}

macro_rules! take {
    ($ty:ty, $bytes:expr, $endian:expr) => {{
        let mut arr = [0u8; std::mem::size_of::<$ty>()];
        arr.copy_from_slice($bytes);
        match $endian {
            Endian::Little => <$ty>::from_le_bytes(arr),
            Endian::Big => <$ty>::from_be_bytes(arr),
        }
    }};
}

/// Decodes a primitive from exactly `prim.width()` octets.
pub fn decode_prim(prim: Prim, bytes: &[u8], endian: Endian) -> Result<Value> {
    if bytes.len() < prim.width() {
        return Err(BinformError::Underflow {
            needed: prim.width() as u64,
            available: bytes.len() as u64,
        });
    }
    let bytes = &bytes[..prim.width()];
    Ok(match prim {
        Prim::U8 => Value::UInt(u64::from(bytes[0])),
        Prim::I8 => Value::Int(i64::from(bytes[0] as i8)),
        Prim::U16 => Value::UInt(u64::from(take!(u16, bytes, endian))),
        Prim::I16 => Value::Int(i64::from(take!(i16, bytes, endian))),
        Prim::U32 => Value::UInt(u64::from(take!(u32, bytes, endian))),
        Prim::I32 => Value::Int(i64::from(take!(i32, bytes, endian))),
        Prim::U64 => Value::UInt(take!(u64, bytes, endian)),
        Prim::I64 => Value::Int(take!(i64, bytes, endian)),
        Prim::F32 => Value::Float(f64::from(take!(f32, bytes, endian))),
        Prim::F64 => Value::Float(take!(f64, bytes, endian)),
        Prim::Bool => Value::Bool(bytes[0] != 0),
    })
}

/// Interprets a binding/converter result as a byte order.
///
/// Accepts the spellings `little`/`le`/`lsb` and `big`/`be`/`msb`
/// (case-insensitive), or the integers 0 (little) and 1 (big).
pub fn endian_from_value(value: &Value) -> Result<Endian> {
    match value {
        Value::Str(s) => match s.to_ascii_lowercase().as_str() {
            "little" | "le" | "lsb" => Ok(Endian::Little),
            "big" | "be" | "msb" => Ok(Endian::Big),
            _ => Err(BinformError::TypeMismatch {
                expected: "endianness",
                found: "string",
            }),
        },
        other => match other.as_u64() {
            Some(0) => Ok(Endian::Little),
            Some(1) => Ok(Endian::Big),
            _ => Err(BinformError::TypeMismatch {
                expected: "endianness",
                found: other.kind_name(),
            }),
        },
    }
}

/// Character encodings the engine knows how to produce and consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    /// UTF-8 (the default).
    Utf8,
    /// 7-bit ASCII; octets above 0x7F are rejected.
    Ascii,
    /// ISO-8859-1, one octet per code point.
    Latin1,
    /// UTF-16, little endian code units.
    Utf16Le,
    /// UTF-16, big endian code units.
    Utf16Be,
}

impl Default for Encoding {
    fn default() -> Self {
        Self::Utf8
    }
}

impl Encoding {
    /// Resolves a descriptor-supplied encoding name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Some(Self::Utf8),
            "ascii" | "us-ascii" => Some(Self::Ascii),
            "latin1" | "iso-8859-1" => Some(Self::Latin1),
            "utf16" | "utf-16" | "utf-16le" | "utf16le" => Some(Self::Utf16Le),
            "utf-16be" | "utf16be" => Some(Self::Utf16Be),
            _ => None,
        }
    }

    /// Canonical name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "ascii",
            Self::Latin1 => "iso-8859-1",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
        }
    }

    /// Width in octets of one terminator (NUL) code unit.
    pub fn terminator_width(&self) -> usize {
        match self {
            Self::Utf16Le | Self::Utf16Be => 2,
            _ => 1,
        }
    }
}

/// Encodes a string per the given encoding, without a terminator.
pub fn encode_str(s: &str, encoding: Encoding) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Utf8 => Ok(s.as_bytes().to_vec()),
        Encoding::Ascii => {
            if let Some(bad) = s.chars().find(|c| !c.is_ascii()) {
                return Err(BinformError::Unencodable {
                    encoding: encoding.name(),
                    detail: format!("character {bad:?} is not ASCII"),
                });
            }
            Ok(s.as_bytes().to_vec())
        }
        Encoding::Latin1 => {
            let mut out = Vec::with_capacity(s.len());
            for c in s.chars() {
                let cp = c as u32;
                if cp > 0xFF {
                    return Err(BinformError::Unencodable {
                        encoding: encoding.name(),
                        detail: format!("character {c:?} is outside ISO-8859-1"),
                    });
                }
                out.push(cp as u8);
            }
            Ok(out)
        }
        Encoding::Utf16Le => {
            let mut out = Vec::with_capacity(s.len() * 2);
            for unit in s.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            Ok(out)
        }
        Encoding::Utf16Be => {
            let mut out = Vec::with_capacity(s.len() * 2);
            for unit in s.encode_utf16() {
                out.extend_from_slice(&unit.to_be_bytes());
            }
            Ok(out)
        }
    }
}

/// Decodes a string per the given encoding.
pub fn decode_str(bytes: &[u8], encoding: Encoding) -> Result<String> {
    match encoding {
        Encoding::Utf8 | Encoding::Ascii => {
            String::from_utf8(bytes.to_vec()).map_err(|e| BinformError::Unencodable {
                encoding: encoding.name(),
                detail: e.to_string(),
            })
        }
        Encoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        Encoding::Utf16Le | Encoding::Utf16Be => {
            if bytes.len() % 2 != 0 {
                return Err(BinformError::Unencodable {
                    encoding: encoding.name(),
                    detail: "odd number of octets".into(),
                });
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| {
                    let arr = [pair[0], pair[1]];
                    match encoding {
                        Encoding::Utf16Le => u16::from_le_bytes(arr),
                        _ => u16::from_be_bytes(arr),
                    }
                })
                .collect();
            String::from_utf16(&units).map_err(|e| BinformError::Unencodable {
                encoding: encoding.name(),
                detail: e.to_string(),
            })
        }
    }
}

/// Decodes a string after stripping trailing zero code units.
///
/// Constant-length string windows are padded with zero octets on serialize;
/// trimming them here lets padded windows round-trip to the original text.
pub fn decode_str_trimmed(bytes: &[u8], encoding: Encoding) -> Result<String> {
    let unit = encoding.terminator_width();
    let mut end = bytes.len() - bytes.len() % unit;
    while end >= unit && bytes[end - unit..end].iter().all(|&b| b == 0) {
        end -= unit;
    }
    decode_str(&bytes[..end], encoding)
}
