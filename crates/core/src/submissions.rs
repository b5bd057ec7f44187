//! Time-windowed duplicate submission guard.
//!
//! Advisory and per-process: two server processes do not share state, and a
//! restart forgets every fingerprint.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::domain::request::RequestKind;

pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionCheck {
    Accepted,
    Duplicate { retry_after: Duration },
}

#[derive(Debug)]
pub struct SubmissionGuard {
    window: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl Default for SubmissionGuard {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW)
    }
}

impl SubmissionGuard {
    pub fn new(window: Duration) -> Self {
        Self { window, seen: Mutex::new(HashMap::new()) }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Logically equal payloads hash the same regardless of client key order.
    pub fn fingerprint(requestor_id: &str, kind: RequestKind, payload: &serde_json::Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(requestor_id.as_bytes());
        hasher.update(b"|");
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b"|");
        let mut canonical = String::new();
        write_canonical(payload, &mut canonical);
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn check(&self, fingerprint: &str) -> SubmissionCheck {
        self.check_at(fingerprint, Instant::now())
    }

    pub fn check_at(&self, fingerprint: &str, now: Instant) -> SubmissionCheck {
        let mut seen = match self.seen.lock() {
            Ok(seen) => seen,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = self.window;
        seen.retain(|_, first_seen| now.saturating_duration_since(*first_seen) < window);

        if let Some(first_seen) = seen.get(fingerprint) {
            let elapsed = now.saturating_duration_since(*first_seen);
            return SubmissionCheck::Duplicate { retry_after: window.saturating_sub(elapsed) };
        }

        seen.insert(fingerprint.to_string(), now);
        SubmissionCheck::Accepted
    }

    /// Releases a fingerprint whose submission failed so the client can retry.
    pub fn forget(&self, fingerprint: &str) {
        match self.seen.lock() {
            Ok(mut seen) => {
                seen.remove(fingerprint);
            }
            Err(poisoned) => {
                poisoned.into_inner().remove(fingerprint);
            }
        }
    }
}

fn write_canonical(value: &serde_json::Value, output: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            output.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    output.push(',');
                }
                output.push_str(&serde_json::Value::String(key.clone()).to_string());
                output.push(':');
                if let Some(child) = map.get(key) {
                    write_canonical(child, output);
                }
            }
            output.push('}');
        }
        serde_json::Value::Array(items) => {
            output.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    output.push(',');
                }
                write_canonical(item, output);
            }
            output.push(']');
        }
        scalar => output.push_str(&scalar.to_string()),
    }
}
