//! Conversation-group identity.
//!
//! A [`QraftAiSessionId`] is a 32-bit FNV-1a digest of a seed string, rendered
//! in base 36 with a `qs_` prefix. Ids bound to a backend session hash the
//! external id, so every prompt that resumes the same backend session lands in
//! the same group without a lookup. Locally originated ids hash a microsecond
//! timestamp; their uniqueness is probabilistic (clock resolution plus a 32-bit
//! digest), not cryptographic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ExternalSessionId;
use crate::time::now_unix_micros;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

const ID_PREFIX: &str = "qs_";
const EXTERNAL_SEED_SUFFIX: &str = "claude";
const LOCAL_SEED_SUFFIX: &str = "Qraft";

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QraftAiSessionId(String);

impl QraftAiSessionId {
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Same external id in, same group id out.
    pub fn derive_from_external(external: &ExternalSessionId) -> Self {
        Self::derive_from_seed(&format!("{}{EXTERNAL_SEED_SUFFIX}", external.as_str()))
    }

    /// Fresh group id for a conversation that has no backend session yet.
    pub fn derive_local() -> Self {
        Self::derive_local_at(next_local_micros())
    }

    pub fn derive_local_at(timestamp_micros: u128) -> Self {
        Self::derive_from_seed(&format!("{timestamp_micros}{LOCAL_SEED_SUFFIX}"))
    }

    pub fn derive_from_seed(seed: &str) -> Self {
        Self(format!("{ID_PREFIX}{}", to_base36(fnv1a_32(seed))))
    }
}

impl fmt::Display for QraftAiSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn fnv1a_32(input: &str) -> u32 {
    input.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_owned();
    }
    let mut out = Vec::with_capacity(7);
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

static LAST_LOCAL_MICROS: AtomicU64 = AtomicU64::new(0);

// Two derivations inside the same microsecond would otherwise share a seed.
fn next_local_micros() -> u128 {
    let now = now_unix_micros() as u64;
    let mut last = LAST_LOCAL_MICROS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last.saturating_add(1));
        match LAST_LOCAL_MICROS.compare_exchange_weak(
            last,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return u128::from(next),
            Err(actual) => last = actual,
        }
    }
}
