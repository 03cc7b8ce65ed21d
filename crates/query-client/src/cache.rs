//! Response-unchanged detection.
//!
//! Each action remembers a fingerprint of its last successful response body.
//! Request ids differ on every call, so they are removed before hashing.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use sha2::{Digest, Sha256};

static REQUEST_ID_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:RequestI[Dd]|requestId)>[^<]*</(?:RequestI[Dd]|requestId)>")
        .expect("valid request id element pattern")
});

/// Result of a cached call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    /// The response changed (or was never seen) and has been parsed.
    Fresh(T),
    /// The response is identical to the last one seen for this action.
    Unchanged {
        /// Consecutive unchanged responses so far.
        hits: u32,
        /// When the current response was first seen.
        since: DateTime<Utc>,
    },
}

impl<T> Fetched<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Fetched::Unchanged { .. })
    }

    pub fn fresh(self) -> Option<T> {
        match self {
            Fetched::Fresh(value) => Some(value),
            Fetched::Unchanged { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    fingerprint: Vec<u8>,
    hits: u32,
    since: DateTime<Utc>,
}

/// Outcome of recording a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCheck {
    Changed,
    Unchanged { hits: u32, since: DateTime<Utc> },
}

/// Per-action fingerprints of the last response.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `body` as the latest response for `action`.
    pub fn check(&self, action: &str, body: &str) -> CacheCheck {
        let fingerprint = fingerprint(body);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = entries.get_mut(action) {
            if entry.fingerprint == fingerprint {
                entry.hits += 1;
                return CacheCheck::Unchanged {
                    hits: entry.hits,
                    since: entry.since,
                };
            }
        }

        entries.insert(
            action.to_string(),
            Entry {
                fingerprint,
                hits: 0,
                since: Utc::now(),
            },
        );
        CacheCheck::Changed
    }

    /// Forget everything recorded for `action`.
    pub fn invalidate(&self, action: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(action);
    }
}

fn fingerprint(body: &str) -> Vec<u8> {
    let stripped = REQUEST_ID_ELEMENT.replace_all(body, "");
    Sha256::digest(stripped.as_bytes()).to_vec()
}
