//! Per-controller transaction state machine
//!
//! ```text
//!            change()                 success
//!   Idle ──────────────▶ Pending ──────────────▶ Idle
//!    ▲                     │
//!    │ clear / success     │ failure / expiry
//!    │                     ▼
//!    └──────────────── Failed ──── change() ───▶ Pending
//! ```
//!
//! `clear_to_send` holds in `Idle` and `Failed`; `model_failure` only in
//! `Failed`. A pending transaction is never marked as failed.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Transaction {
    /// No write outstanding, edits are accepted
    #[default]
    Idle,
    /// A locally-originated edit has been sent and awaits its outcome
    Pending { since: Instant },
    /// The last remote transaction failed; edits are accepted again
    Failed { error: String, message: String },
}

impl Transaction {
    pub fn pending_now() -> Self {
        Transaction::Pending {
            since: Instant::now(),
        }
    }

    pub fn clear_to_send(&self) -> bool {
        !matches!(self, Transaction::Pending { .. })
    }

    pub fn model_failure(&self) -> bool {
        matches!(self, Transaction::Failed { .. })
    }

    /// Whether a View may submit a new edit
    pub fn accepts_edits(&self) -> bool {
        self.clear_to_send() || self.model_failure()
    }

    /// How long the transaction has been pending, if it is
    pub fn pending_for(&self, now: Instant) -> Option<Duration> {
        match self {
            Transaction::Pending { since } => Some(now.saturating_duration_since(*since)),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Transaction::Idle => "idle",
            Transaction::Pending { .. } => "pending",
            Transaction::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_per_state() {
        let idle = Transaction::Idle;
        assert!(idle.clear_to_send());
        assert!(!idle.model_failure());

        let pending = Transaction::pending_now();
        assert!(!pending.clear_to_send());
        assert!(!pending.model_failure());
        assert!(!pending.accepts_edits());

        let failed = Transaction::Failed {
            error: "timeout".to_string(),
            message: "504".to_string(),
        };
        assert!(failed.clear_to_send());
        assert!(failed.model_failure());
        assert!(failed.accepts_edits());
    }

    #[test]
    fn test_pending_for() {
        let since = Instant::now();
        let pending = Transaction::Pending { since };
        let later = since + Duration::from_millis(40);

        assert_eq!(pending.pending_for(later), Some(Duration::from_millis(40)));
        assert_eq!(Transaction::Idle.pending_for(later), None);
    }
}
