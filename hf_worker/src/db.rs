//! Model structs corresponding to database tables. Must be kept in sync with migrations.

use std::fmt;
use std::time::Duration;

use hodlerfc::config::WritePolicy;
use serde_with::serde_as;

/// Where a point update is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    /// Claimed by a webjob, transaction not yet confirmed.
    Pending,
    /// Mined successfully.
    Confirmed,
    /// Gave up or reverted.
    Failed,
}
impl UpdateStatus {
    /// Value stored in the `status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}
impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest fantasy points write for a card. One row per card.
#[serde_as]
#[derive(Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PointUpdate {
    /// PK, the card ID.
    pub card_id: u64,
    /// Points being (or last) written.
    pub points: u64,
    /// Status of the write.
    pub status: UpdateStatus,
    /// Transaction hash, once known.
    pub tx_hash: Option<String>,
    /// Last time updated (unix epoch milliseconds).
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub last_update: Duration,
}

/// How long a `pending` row blocks a resubmission of the same points: the longest a
/// [`WritePolicy`] can keep a single write busy. Saturates at [`Duration::MAX`].
pub fn in_flight_window(policy: &WritePolicy) -> Duration {
    let per_attempt = policy.retry_delay.saturating_add(
        policy
            .receipt_poll_interval
            .saturating_mul(policy.receipt_poll_attempts),
    );
    per_attempt.saturating_mul(policy.attempts())
}

impl PointUpdate {
    /// If this row blocks a new write of `points`: the same points are confirmed, or pending
    /// and updated after `cutoff`. Failed rows never block.
    ///
    /// Must match the `WHERE NOT (...)` of the claim upsert in [`crate::webjob::update_points`].
    pub fn blocks(&self, points: u64, cutoff: Duration) -> bool {
        self.points == points
            && match self.status {
                UpdateStatus::Confirmed => true,
                UpdateStatus::Pending => cutoff < self.last_update,
                UpdateStatus::Failed => false,
            }
    }
}
