// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run identifiers

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exact byte length of a run ID: `YYYYMMDD_HHMMSS_xxxxxx`.
pub const RUN_ID_LEN: usize = 22;

const HEX_ALPHABET: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunIdError {
    #[error("invalid run id: {0:?}")]
    Invalid(String),
}

/// A validated run identifier of the form `YYYYMMDD_HHMMSS_xxxxxx`.
///
/// The date/time part is the creation instant of the run; the suffix is six
/// random lowercase hex characters. Parsing is strict: anything that does not
/// match the shape is rejected, so a `RunId` can be embedded in filesystem
/// paths and SQL without further escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh ID from the clock's wall time.
    pub fn generate(clock: &impl Clock) -> Self {
        let stamp = clock.now_utc().format("%Y%m%d_%H%M%S");
        Self(format!("{}_{}", stamp, nanoid::nanoid!(6, &HEX_ALPHABET)))
    }

    /// Parse and validate a candidate run ID.
    pub fn parse(s: &str) -> Result<Self, RunIdError> {
        if is_valid_run_id(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(RunIdError::Invalid(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `YYYYMMDD_HHMMSS` prefix.
    pub fn timestamp_part(&self) -> &str {
        &self.0[..15]
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for RunId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for RunId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for RunId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RunId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Check a string against `^[0-9]{8}_[0-9]{6}_[a-f0-9]{6}$` without a regex
/// engine.
pub fn is_valid_run_id(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != RUN_ID_LEN {
        return false;
    }
    let digits = |range: std::ops::Range<usize>| b[range].iter().all(u8::is_ascii_digit);
    let hex = |range: std::ops::Range<usize>| {
        b[range].iter().all(|c| c.is_ascii_digit() || (b'a'..=b'f').contains(c))
    };
    digits(0..8) && b[8] == b'_' && digits(9..15) && b[15] == b'_' && hex(16..22)
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
