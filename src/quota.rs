//! Usage quota tracking and enforcement
//!
//! This module owns the per-owner message counter and premium flag,
//! decides whether a submission is allowed under the free-tier policy,
//! and moves the counter through the server-side atomic increment.

use crate::config::QuotaConfig;
use crate::error::Result;
use crate::persistence::{Persistence, UsageRecord};
use std::sync::{Arc, Mutex};

/// Free-tier policy
///
/// # Fields
///
/// * `limit` - Messages allowed before the gate blocks
/// * `enforce` - When false the gate always allows; counting still happens
///
/// # Examples
///
/// ```
/// use askgenie::quota::QuotaPolicy;
///
/// let policy = QuotaPolicy { limit: 3, enforce: true };
/// assert_eq!(policy.limit, 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    /// Free messages allowed before the gate blocks
    pub limit: i64,

    /// Whether the gate is enforced
    pub enforce: bool,
}

impl From<&QuotaConfig> for QuotaPolicy {
    fn from(config: &QuotaConfig) -> Self {
        Self {
            limit: config.policy_limit,
            enforce: config.enforce,
        }
    }
}

/// Outcome of the policy gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// The submission may proceed
    Allowed,
    /// The free-tier limit has been reached
    LimitReached {
        /// Messages already used
        used: i64,
        /// Configured limit
        limit: i64,
    },
}

/// Outcome of an increment call
///
/// `Denied` means the increment itself failed (transport side); it is
/// distinct from [`QuotaDecision::LimitReached`], which is a policy decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncrementOutcome {
    /// Counted; carries the refreshed record
    Counted(UsageRecord),
    /// The increment did not happen
    Denied(String),
}

/// Quota tracker shared by the conversation views of one owner
///
/// Cloning yields a handle onto the same cached usage record.
#[derive(Clone)]
pub struct QuotaTracker {
    persistence: Arc<dyn Persistence>,
    policy: QuotaPolicy,
    usage: Arc<Mutex<Option<UsageRecord>>>,
}

impl QuotaTracker {
    /// Creates a new tracker with the given policy
    pub fn new(persistence: Arc<dyn Persistence>, policy: QuotaPolicy) -> Self {
        Self {
            persistence,
            policy,
            usage: Arc::new(Mutex::new(None)),
        }
    }

    /// The active policy
    pub fn policy(&self) -> QuotaPolicy {
        self.policy
    }

    /// Fetch the owner's usage record, creating the default one if absent
    ///
    /// # Errors
    ///
    /// Returns error only on transport failure; "not found" creates the
    /// default record instead.
    pub async fn load(&self, owner_id: &str) -> Result<UsageRecord> {
        let record = match self.persistence.get_usage(owner_id).await? {
            Some(record) => record,
            None => {
                let record = UsageRecord::fresh(owner_id);
                tracing::info!(owner = owner_id, "Initializing usage record");
                if let Err(e) = self.persistence.insert_usage(&record).await {
                    tracing::warn!("Failed to initialize usage record: {:#}", e);
                }
                record
            }
        };

        self.store(record.clone());
        Ok(record)
    }

    /// Whether the policy allows another submission for `record`
    pub fn is_allowed(&self, record: &UsageRecord) -> bool {
        self.check(record) == QuotaDecision::Allowed
    }

    /// Typed form of [`QuotaTracker::is_allowed`]
    pub fn check(&self, record: &UsageRecord) -> QuotaDecision {
        if !self.policy.enforce || record.is_premium || record.messages_used < self.policy.limit {
            QuotaDecision::Allowed
        } else {
            QuotaDecision::LimitReached {
                used: record.messages_used,
                limit: self.policy.limit,
            }
        }
    }

    /// Count one message through the server-side atomic increment
    ///
    /// On success the record is reloaded so the cached badge value is
    /// fresh. If only the reload fails, the increment still counts and the
    /// record is rebuilt from the returned count.
    pub async fn increment(&self, owner_id: &str) -> IncrementOutcome {
        let count = match self.persistence.increment_message_count(owner_id).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!("Error incrementing message count: {:#}", e);
                return IncrementOutcome::Denied(format!("{:#}", e));
            }
        };

        match self.load(owner_id).await {
            Ok(record) => IncrementOutcome::Counted(record),
            Err(e) => {
                tracing::warn!("Usage refresh after increment failed: {:#}", e);
                let mut record = self
                    .usage()
                    .filter(|u| u.owner_id == owner_id)
                    .unwrap_or_else(|| UsageRecord::fresh(owner_id));
                record.messages_used = count;
                self.store(record.clone());
                IncrementOutcome::Counted(record)
            }
        }
    }

    /// Last known usage record, for badges
    pub fn usage(&self) -> Option<UsageRecord> {
        self.usage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Messages left before the gate blocks
    ///
    /// `None` means unlimited (premium).
    pub fn remaining(&self, record: &UsageRecord) -> Option<i64> {
        if record.is_premium {
            None
        } else {
            Some(self.policy.limit.saturating_sub(record.messages_used).max(0))
        }
    }

    /// File attachments are a premium feature
    pub fn can_attach_files(&self, record: &UsageRecord) -> bool {
        record.is_premium
    }

    fn store(&self, record: UsageRecord) {
        *self
            .usage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::fake::FakePersistence;

    fn tracker(store: Arc<FakePersistence>, enforce: bool) -> QuotaTracker {
        QuotaTracker::new(store, QuotaPolicy { limit: 3, enforce })
    }

    fn record(used: i64, premium: bool) -> UsageRecord {
        UsageRecord {
            owner_id: "u1".to_string(),
            messages_used: used,
            is_premium: premium,
            premium_expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_load_creates_default() {
        let store = Arc::new(FakePersistence::new());
        let tracker = tracker(store.clone(), true);

        let usage = tracker.load("u1").await.unwrap();
        assert_eq!(usage.messages_used, 0);
        assert!(!usage.is_premium);
        assert!(store.get_usage("u1").await.unwrap().is_some());
        assert_eq!(tracker.usage(), Some(usage));
    }

    #[tokio::test]
    async fn test_load_transport_error() {
        let store = Arc::new(FakePersistence::new());
        store.fail_points().set_get_usage(true);
        assert!(tracker(store, true).load("u1").await.is_err());
    }

    #[test]
    fn test_gate_at_limit() {
        let tracker = tracker(Arc::new(FakePersistence::new()), true);
        assert!(tracker.is_allowed(&record(2, false)));
        assert!(!tracker.is_allowed(&record(3, false)));
        assert_eq!(
            tracker.check(&record(3, false)),
            QuotaDecision::LimitReached { used: 3, limit: 3 }
        );
    }

    #[test]
    fn test_gate_premium_unlimited() {
        let tracker = tracker(Arc::new(FakePersistence::new()), true);
        assert!(tracker.is_allowed(&record(3, true)));
        assert!(tracker.is_allowed(&record(1_000, true)));
    }

    #[test]
    fn test_gate_disabled() {
        let tracker = tracker(Arc::new(FakePersistence::new()), false);
        assert!(tracker.is_allowed(&record(3, false)));
        assert!(tracker.is_allowed(&record(99, false)));
    }

    #[tokio::test]
    async fn test_increment_refreshes() {
        let store = Arc::new(FakePersistence::new());
        let tracker = tracker(store, true);
        tracker.load("u1").await.unwrap();

        match tracker.increment("u1").await {
            IncrementOutcome::Counted(usage) => assert_eq!(usage.messages_used, 1),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(tracker.usage().unwrap().messages_used, 1);
    }

    #[tokio::test]
    async fn test_increment_failure_is_denied() {
        let store = Arc::new(FakePersistence::new());
        store.fail_points().set_increment(true);
        let tracker = tracker(store, true);

        assert!(matches!(
            tracker.increment("u1").await,
            IncrementOutcome::Denied(_)
        ));
    }

    #[tokio::test]
    async fn test_increment_counts_when_refresh_fails() {
        let store = Arc::new(FakePersistence::new());
        let tracker = tracker(store.clone(), true);
        tracker.load("u1").await.unwrap();
        store.fail_points().set_get_usage(true);

        match tracker.increment("u1").await {
            IncrementOutcome::Counted(usage) => assert_eq!(usage.messages_used, 1),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_remaining() {
        let tracker = tracker(Arc::new(FakePersistence::new()), true);
        assert_eq!(tracker.remaining(&record(1, false)), Some(2));
        assert_eq!(tracker.remaining(&record(5, false)), Some(0));
        assert_eq!(tracker.remaining(&record(5, true)), None);
    }

    #[test]
    fn test_attach_files_premium_only() {
        let tracker = tracker(Arc::new(FakePersistence::new()), false);
        assert!(!tracker.can_attach_files(&record(0, false)));
        assert!(tracker.can_attach_files(&record(0, true)));
    }
}
