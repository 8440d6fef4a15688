// Moderation domain models - the ban state machine vocabulary.
//
// These are pure domain types; the web layer converts them to HTTP
// responses and the notifier to outbound mails.

use crate::core::accounts::Account;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Length of a temporary ban.
pub const TEMP_BAN_DAYS: i64 = 7;

/// The ban that makes `ban_count` reach this threshold is permanent.
pub const PERMANENT_BAN_THRESHOLD: u32 = 3;

/// Where an account currently stands with moderation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BanStatus {
    Active,
    Banned { until: DateTime<Utc> },
    PermanentlyBanned,
}

impl BanStatus {
    pub fn is_banned(&self) -> bool {
        !matches!(self, BanStatus::Active)
    }
}

/// Compute the live ban status of an account.
///
/// This is a pure read-time check: a stored `banned` flag whose
/// `ban_ends_at` has passed reads as `Active` without any write. The
/// stored fields are only rewritten by an explicit ban or unban.
pub fn ban_status(account: &Account, now: DateTime<Utc>) -> BanStatus {
    if !account.banned {
        return BanStatus::Active;
    }
    match account.ban_ends_at {
        None => BanStatus::PermanentlyBanned,
        Some(until) if now < until => BanStatus::Banned { until },
        Some(_) => BanStatus::Active,
    }
}

/// What an admin-triggered ban resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BanOutcome {
    TemporarilyBanned { until: DateTime<Utc> },
    PermanentlyBanned,
}
