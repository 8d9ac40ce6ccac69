//! Short, lexically-divergent schema identifiers.
//!
//! A uid is the base58 encoding of the current unix millisecond timestamp,
//! reversed character-wise so that ids minted close together diverge near
//! the front of the string, followed by a base58 sequence counter
//! left-padded to a fixed width. The counter wraps modulo 0xFFFF and is
//! the only piece of process-wide mutable state; it lives in an explicit
//! `UidGenerator` value rather than an ambient global.
//!
//! Uniqueness: two ids generated in the same process never share a
//! (timestamp, counter) pair. Cross-process collisions are possible in
//! principle but require two processes to mint the same counter slot in
//! the same millisecond.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Wrap bound for the sequence counter.
const COUNTER_MODULUS: u32 = 0xFFFF;

/// Fixed width of the encoded counter suffix.
const COUNTER_WIDTH: usize = 3;

/// An opaque schema identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Uid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Uid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Process-wide uid source. Safe for concurrent callers; `generate` never
/// fails.
#[derive(Debug, Default)]
pub struct UidGenerator {
    counter: AtomicU32,
}

impl UidGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&self) -> Uid {
        let millis = unix_millis();
        let seq = self.next_seq();

        // Reverse the time component so that sequential ids are more
        // obviously different.
        let mut id: String = encode_base58(millis).chars().rev().collect();
        let suffix = encode_base58(seq as u64);
        for _ in suffix.len()..COUNTER_WIDTH {
            id.push('0');
        }
        id.push_str(&suffix);
        Uid(id)
    }

    /// Hex variant: 4-byte timestamp + 2-byte counter, both lowercase hex.
    pub fn generate_hex(&self) -> String {
        let millis = unix_millis();
        let seq = self.next_seq();
        format!("{millis:x}{seq:04x}")
    }

    fn next_seq(&self) -> u32 {
        let prev = self
            .counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| {
                Some((i + 1) % COUNTER_MODULUS)
            })
            .unwrap_or(0);
        (prev + 1) % COUNTER_MODULUS
    }
}

fn unix_millis() -> u64 {
    let now = time::OffsetDateTime::now_utc();
    (now.unix_timestamp_nanos() / 1_000_000) as u64
}

/// Base58 encoding of an integer: bs58 over the minimal big-endian byte
/// representation, which matches positional base-58 for values without
/// leading zero bytes. Zero encodes as "1" (the alphabet's zero digit).
fn encode_base58(n: u64) -> String {
    if n == 0 {
        return "1".to_string();
    }
    let bytes = n.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    bs58::encode(&bytes[first..]).into_string()
}
