//! In-process store for pending password reset tokens.
//!
//! A token is a one-shot capability: issuing returns an opaque value mailed
//! to the user, and consuming removes it in the same locked section so a
//! token can never authorize two resets. Entries expire after one hour.
//! State lives in memory only; restarting the gateway invalidates all
//! outstanding resets.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Reset tokens are valid for this long after issue.
const RESET_TOKEN_TTL_SECS: i64 = 3_600;

#[derive(Debug, Clone)]
struct PendingReset {
    subject_id: String,
    issued_at: DateTime<Utc>,
}

impl PendingReset {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.issued_at > Duration::seconds(RESET_TOKEN_TTL_SECS)
    }
}

/// Shared store of outstanding reset tokens.
#[derive(Debug, Clone, Default)]
pub struct ResetTokenStore {
    inner: Arc<Mutex<HashMap<String, PendingReset>>>,
}

impl ResetTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingReset>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mint a fresh token bound to a subject.
    ///
    /// The token value itself is the only credential; it is returned once
    /// and never stored anywhere else.
    pub fn issue(&self, subject_id: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.lock().insert(
            token.clone(),
            PendingReset {
                subject_id: subject_id.to_string(),
                issued_at: Utc::now(),
            },
        );
        token
    }

    /// Redeem a token, returning the bound subject.
    ///
    /// Removal and the expiry check happen under one lock, so a replayed
    /// token loses the race and gets `None`.
    pub fn consume(&self, token: &str) -> Option<String> {
        let mut map = self.lock();
        let pending = map.remove(token)?;
        if pending.is_expired(Utc::now()) {
            return None;
        }
        Some(pending.subject_id)
    }

    /// Drop expired entries so abandoned resets do not accumulate.
    /// Returns how many entries were removed.
    pub fn prune_expired(&self) -> usize {
        let now = Utc::now();
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, pending| !pending.is_expired(now));
        before - map.len()
    }

    #[cfg(test)]
    fn insert_with_age(&self, token: &str, subject_id: &str, age_secs: i64) {
        self.lock().insert(
            token.to_string(),
            PendingReset {
                subject_id: subject_id.to_string(),
                issued_at: Utc::now() - Duration::seconds(age_secs),
            },
        );
    }
}
