// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Trace and span identifiers in W3C/OpenTelemetry hex form.
//!
//! Identifiers can be parsed and displayed by anyone, but only the tracer
//! generates them: there is no public constructor from a raw integer.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Error parsing a hex identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdParseError {
    #[error("expected {expected} hex characters, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("identifier must not be all zeros")]
    Zero,
}

fn parse_hex<const LEN: usize>(s: &str) -> Result<u128, IdParseError> {
    if s.len() != LEN {
        return Err(IdParseError::Length {
            expected: LEN,
            actual: s.len(),
        });
    }
    // `from_str_radix` alone would also take a leading sign.
    if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(IdParseError::Hex(s.to_string()));
    }
    let value = u128::from_str_radix(s, 16).map_err(|_| IdParseError::Hex(s.to_string()))?;
    if value == 0 {
        return Err(IdParseError::Zero);
    }
    Ok(value)
}

/// 128-bit identifier shared by every span in one call tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId(u128);

impl TraceId {
    pub(crate) fn generate() -> Self {
        // 122 random bits; the version nibble keeps the value non-zero.
        Self(Uuid::new_v4().as_u128())
    }

    /// 32 lower-case hex characters.
    pub fn to_hex(&self) -> String {
        format!("{:032x}", self.0)
    }

    /// Big-endian bytes, as carried on the wire.
    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    /// First 8 hex characters, for display.
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId({})", self.short())
    }
}

impl FromStr for TraceId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex::<32>(s).map(Self)
    }
}

/// 64-bit identifier unique to one span.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId(u64);

impl SpanId {
    pub(crate) fn generate() -> Self {
        // Upper half of a v4 UUID: carries the version nibble, so never zero.
        Self((Uuid::new_v4().as_u128() >> 64) as u64)
    }

    /// 16 lower-case hex characters.
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// First 8 hex characters, for display.
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpanId({})", self.to_hex())
    }
}

impl FromStr for SpanId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex::<16>(s).map(|v| Self(v as u64))
    }
}

macro_rules! hex_serde {
    ($ty:ty) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_serde!(TraceId);
hex_serde!(SpanId);
