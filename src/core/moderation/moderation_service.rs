// Moderation service - core business logic for the ban lifecycle.
//
// This service handles:
// - Temporary bans (one week) with email notice
// - Escalation to a permanent ban on the third offence
// - Explicit unbans with a reinstatement notice
//
// NO HTTP or SQL dependencies here - just pure domain logic. Ban expiry
// is a read-time computation (see `ban_status`), never a write-on-read.

use super::moderation_models::{BanOutcome, PERMANENT_BAN_THRESHOLD, TEMP_BAN_DAYS};
use crate::core::accounts::{AccountError, AccountStore, BanState};
use crate::core::notify::{Notification, Notifier};
use chrono::{Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("account not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<AccountError> for ModerationError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::NotFound => ModerationError::NotFound,
            other => ModerationError::Storage(other.to_string()),
        }
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ModerationService<S: AccountStore> {
    store: Arc<S>,
    notifier: Notifier,
}

impl<S: AccountStore> ModerationService<S> {
    pub fn new(store: Arc<S>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Ban an account for one week, or permanently once its ban count
    /// reaches the escalation threshold. Sends the matching notice.
    pub async fn ban(&self, account_id: i64) -> Result<BanOutcome, ModerationError> {
        let account = self
            .store
            .account_by_id(account_id)
            .await?
            .ok_or(ModerationError::NotFound)?;

        let now = Utc::now();
        let ban_count = account.ban_count + 1;

        let outcome = if ban_count >= PERMANENT_BAN_THRESHOLD {
            self.store
                .update_ban_state(
                    account_id,
                    BanState {
                        banned: true,
                        banned_at: Some(now),
                        ban_ends_at: None,
                        ban_count,
                    },
                )
                .await?;
            self.notifier.notify(Notification::PermanentlyBanned {
                pseudo: account.pseudo.clone(),
                email: account.email.clone(),
            });
            BanOutcome::PermanentlyBanned
        } else {
            let until = now + Duration::days(TEMP_BAN_DAYS);
            self.store
                .update_ban_state(
                    account_id,
                    BanState {
                        banned: true,
                        banned_at: Some(now),
                        ban_ends_at: Some(until),
                        ban_count,
                    },
                )
                .await?;
            self.notifier.notify(Notification::Banned {
                pseudo: account.pseudo.clone(),
                email: account.email.clone(),
                ban_ends_at: until,
            });
            BanOutcome::TemporarilyBanned { until }
        };

        tracing::info!(account_id, ban_count, "Account banned");
        Ok(outcome)
    }

    /// Lift a ban and send the reinstatement notice. `ban_count` is kept
    /// so escalation still applies to repeat offenders.
    pub async fn unban(&self, account_id: i64) -> Result<(), ModerationError> {
        let account = self
            .store
            .account_by_id(account_id)
            .await?
            .ok_or(ModerationError::NotFound)?;

        self.store
            .update_ban_state(
                account_id,
                BanState {
                    banned: false,
                    banned_at: None,
                    ban_ends_at: None,
                    ban_count: account.ban_count,
                },
            )
            .await?;

        self.notifier.notify(Notification::Unbanned {
            pseudo: account.pseudo,
            email: account.email,
        });

        tracing::info!(account_id, "Account unbanned");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::accounts::tests::MemAccountStore;
    use crate::core::accounts::{Account, NewAccount, Role};
    use crate::core::moderation::moderation_models::{ban_status, BanStatus};
    use crate::infra::mail::MemoryMailer;
    use chrono::DateTime;

    async fn drain() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    async fn setup() -> (Arc<MemAccountStore>, ModerationService<MemAccountStore>, MemoryMailer)
    {
        let store = Arc::new(MemAccountStore::new());
        let mailer = MemoryMailer::new();
        let service = ModerationService::new(Arc::clone(&store), Notifier::spawn(mailer.clone(), 16));
        (store, service, mailer)
    }

    async fn member(store: &MemAccountStore) -> Account {
        store
            .insert_account(NewAccount {
                pseudo: "ryo".to_string(),
                email: "ryo@example.com".to_string(),
                password_hash: "$2b$fake".to_string(),
                role: Role::User,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ban_sets_week_long_window_and_notifies() {
        let (store, service, mailer) = setup().await;
        let account = member(&store).await;

        let outcome = service.ban(account.id).await.unwrap();
        let banned = store.account_by_id(account.id).await.unwrap().unwrap();

        assert!(banned.banned);
        assert_eq!(banned.ban_count, 1);
        let (banned_at, ends_at) = (banned.banned_at.unwrap(), banned.ban_ends_at.unwrap());
        assert_eq!(ends_at - banned_at, Duration::days(TEMP_BAN_DAYS));
        assert!(matches!(outcome, BanOutcome::TemporarilyBanned { until } if until == ends_at));

        drain().await;
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Bannissement");
        assert_eq!(sent[0].to, "ryo@example.com");
    }

    #[tokio::test]
    async fn test_ban_then_unban_restores_active_keeping_count() {
        let (store, service, _mailer) = setup().await;
        let account = member(&store).await;
        let before = store.account_by_id(account.id).await.unwrap().unwrap();

        service.ban(account.id).await.unwrap();
        service.unban(account.id).await.unwrap();

        let after = store.account_by_id(account.id).await.unwrap().unwrap();
        assert!(!after.banned);
        assert_eq!(after.banned_at, None);
        assert_eq!(after.ban_ends_at, None);
        assert_eq!(after.ban_count, before.ban_count + 1);
        assert_eq!(ban_status(&after, Utc::now()), BanStatus::Active);
    }

    #[tokio::test]
    async fn test_third_ban_is_permanent() {
        let (store, service, mailer) = setup().await;
        let account = member(&store).await;

        service.ban(account.id).await.unwrap();
        service.unban(account.id).await.unwrap();
        service.ban(account.id).await.unwrap();
        service.unban(account.id).await.unwrap();
        let outcome = service.ban(account.id).await.unwrap();

        assert_eq!(outcome, BanOutcome::PermanentlyBanned);
        let banned = store.account_by_id(account.id).await.unwrap().unwrap();
        assert!(banned.banned);
        assert_eq!(banned.ban_count, 3);
        assert_eq!(banned.ban_ends_at, None);
        assert_eq!(ban_status(&banned, Utc::now()), BanStatus::PermanentlyBanned);

        drain().await;
        let subjects: Vec<_> = mailer.sent().iter().map(|m| m.subject.clone()).collect();
        assert_eq!(subjects.last().unwrap(), "Bannissement définitif");
    }

    #[tokio::test]
    async fn test_expired_ban_reads_active_without_write() {
        let (store, _service, _mailer) = setup().await;
        let account = member(&store).await;

        let past = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        store
            .update_ban_state(
                account.id,
                BanState {
                    banned: true,
                    banned_at: Some(past),
                    ban_ends_at: Some(past + Duration::days(TEMP_BAN_DAYS)),
                    ban_count: 1,
                },
            )
            .await
            .unwrap();

        let stored = store.account_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(ban_status(&stored, Utc::now()), BanStatus::Active);
        // The stored flags are untouched: expiry is read-time only.
        assert!(stored.banned);
        assert!(stored.ban_ends_at.is_some());
    }

    #[tokio::test]
    async fn test_ban_unknown_account_reports_not_found() {
        let (_store, service, _mailer) = setup().await;
        assert!(matches!(
            service.ban(999).await,
            Err(ModerationError::NotFound)
        ));
        assert!(matches!(
            service.unban(999).await,
            Err(ModerationError::NotFound)
        ));
    }
}
