//! The lock a run holds while it may write state

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Minutes a lock is honoured before another run may take it over
pub const LOCK_TTL_MINUTES: i64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub id: String,
    /// The command holding the lock (e.g., "apply", "destroy", "import")
    pub operation: String,
    /// user@hostname
    pub who: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(operation: impl Into<String>) -> Self {
        Self::with_ttl(operation, Duration::minutes(LOCK_TTL_MINUTES))
    }

    pub fn with_ttl(operation: impl Into<String>, ttl: Duration) -> Self {
        let created = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            who: current_owner(),
            created,
            expires: created + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires <= Utc::now()
    }

    /// Whole minutes until the lock lapses, zero once it has
    pub fn minutes_left(&self) -> i64 {
        (self.expires - Utc::now()).num_minutes().max(0)
    }
}

fn current_owner() -> String {
    let user = ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .unwrap_or_else(|| "unknown".to_string());
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}@{}", user, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_lock_lasts_fifteen_minutes() {
        let lock = LockInfo::new("apply");
        assert_eq!(lock.operation, "apply");
        assert!(lock.who.contains('@'));
        assert_eq!((lock.expires - lock.created).num_minutes(), LOCK_TTL_MINUTES);
        assert!(!lock.is_expired());
        assert!(lock.minutes_left() >= LOCK_TTL_MINUTES - 1);
    }

    #[test]
    fn lapsed_lock_is_expired() {
        let lock = LockInfo::with_ttl("apply", Duration::minutes(-1));
        assert!(lock.is_expired());
        assert_eq!(lock.minutes_left(), 0);
    }
}
