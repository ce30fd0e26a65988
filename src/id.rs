//! Request identifiers.
//!
//! A [`RequestId`] is an [`xid`](https://github.com/rs/xid): 12 bytes that
//! ids minted by other services in the same format share, so those are
//! accepted as-is:
//!
//! ```text
//! ┌──────────────┬───────────┬────────┬─────────────┐
//! │ unix seconds │ machine   │ pid    │ counter     │
//! │ 4 bytes (BE) │ 3 bytes   │ 2 bytes│ 3 bytes (BE)│
//! └──────────────┴───────────┴────────┴─────────────┘
//! ```
//!
//! The text form is 20 characters of lowercase base32hex (`0-9`, `a-v`).
//! Because the timestamp comes first, both the raw bytes and the text sort by
//! creation time.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// Length of the raw form in bytes.
pub const RAW_LEN: usize = 12;

/// Length of the text form in characters.
pub const ENCODED_LEN: usize = 20;

/// A globally unique, time-sortable request identifier.
///
/// ```rust
/// use reqlog::RequestId;
///
/// let id = RequestId::new();
/// let text = id.to_string();
/// assert_eq!(text.len(), 20);
/// assert_eq!(text.parse::<RequestId>().unwrap(), id);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(xid::Id);

/// Why a string is not a valid [`RequestId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseRequestIdError {
    #[error("request id must be 20 bytes long, got {len}")]
    Length { len: usize },

    #[error("invalid character {ch:?} at position {index} in request id")]
    Character { index: usize, ch: char },

    #[error("request id is not in canonical form")]
    NonCanonical,
}

impl RequestId {
    /// Mints a fresh id. Never fails.
    pub fn new() -> Self {
        Self(xid::new())
    }

    /// Wraps 12 raw bytes. Every byte pattern is a valid id.
    pub const fn from_bytes(raw: [u8; RAW_LEN]) -> Self {
        Self(xid::Id(raw))
    }

    pub const fn as_bytes(&self) -> &[u8; RAW_LEN] {
        &self.0.0
    }

    /// Creation time in whole seconds since the unix epoch.
    pub fn timestamp(&self) -> u32 {
        let raw = self.as_bytes();
        u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]])
    }

    pub fn time(&self) -> SystemTime {
        self.0.time()
    }

    pub fn machine(&self) -> [u8; 3] {
        self.0.machine()
    }

    pub fn pid(&self) -> u16 {
        self.0.pid()
    }

    pub fn counter(&self) -> u32 {
        self.0.counter()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

// ── Text form ─────────────────────────────────────────────────────────────────

impl FromStr for RequestId {
    type Err = ParseRequestIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ENCODED_LEN {
            return Err(ParseRequestIdError::Length { len: s.len() });
        }
        if let Some((index, ch)) = s.char_indices().find(|&(_, c)| !matches!(c, '0'..='9' | 'a'..='v')) {
            return Err(ParseRequestIdError::Character { index, ch });
        }

        // The last character carries 4 padding bits that the decoder drops.
        // Only accept the spelling the id prints back as, so one id has one
        // text form.
        let id = s.parse::<xid::Id>().map_err(|_| ParseRequestIdError::NonCanonical)?;
        if id.to_string() != s {
            return Err(ParseRequestIdError::NonCanonical);
        }
        Ok(Self(id))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({self})")
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
