// Account management core - registration, admin creation and password
// reset. Platform-agnostic, no HTTP or SQL in here.
//
// The ban fields live on the account row but are only mutated by the
// moderation service; this module just carries them.

use crate::core::notify::{Notification, Notifier};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::distributions::{Alphanumeric, DistString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// How long a password-reset link stays valid.
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

pub type AccountId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn can_moderate(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }
}

/// A registered member or administrator.
///
/// Invariant: `banned` is true exactly when `banned_at` is set. A
/// permanent ban is `banned_at` set with `ban_ends_at` empty.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub pseudo: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub banned: bool,
    pub banned_at: Option<DateTime<Utc>>,
    pub ban_ends_at: Option<DateTime<Utc>>,
    pub ban_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a new account row.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub pseudo: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// The moderation fields of an account, written as one unit so the row
/// can never hold a half-applied ban.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BanState {
    pub banned: bool,
    pub banned_at: Option<DateTime<Utc>>,
    pub ban_ends_at: Option<DateTime<Utc>>,
    pub ban_count: u32,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("account not found")]
    NotFound,

    #[error("pseudo already taken")]
    PseudoTaken,

    #[error("email already in use")]
    EmailTaken,

    #[error("{0}")]
    Validation(String),

    #[error("invalid or expired reset token")]
    InvalidResetToken,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("storage error: {0}")]
    Storage(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for persisting accounts and password-reset tokens.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account. Returns `PseudoTaken` on a duplicate pseudo
    /// and `EmailTaken` on a duplicate email.
    async fn insert_account(&self, account: NewAccount) -> Result<Account, AccountError>;

    async fn account_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError>;

    async fn account_by_pseudo(&self, pseudo: &str) -> Result<Option<Account>, AccountError>;

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, AccountError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, AccountError>;

    async fn update_password(
        &self,
        id: AccountId,
        password_hash: &str,
    ) -> Result<(), AccountError>;

    async fn update_ban_state(&self, id: AccountId, ban: BanState) -> Result<(), AccountError>;

    /// Remove the account row. Returns `NotFound` if it does not exist.
    async fn delete_account(&self, id: AccountId) -> Result<(), AccountError>;

    async fn save_reset_token(
        &self,
        id: AccountId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AccountError>;

    /// Consume a reset token: a second take with the same token yields None.
    async fn take_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<(AccountId, DateTime<Utc>)>, AccountError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct AccountService<S: AccountStore> {
    store: Arc<S>,
    notifier: Notifier,
    /// Base URL prepended to password-reset links, e.g. "https://blog.example".
    reset_base_url: String,
}

impl<S: AccountStore> AccountService<S> {
    pub fn new(store: Arc<S>, notifier: Notifier, reset_base_url: String) -> Self {
        Self {
            store,
            notifier,
            reset_base_url,
        }
    }

    /// Register a new member and send the registration confirmation.
    pub async fn register(
        &self,
        pseudo: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, AccountError> {
        self.create(pseudo, email, password, Role::User).await
    }

    /// Same flow as `register` but with the admin role. Reserved to the
    /// super-admin at the delivery layer.
    pub async fn create_admin(
        &self,
        pseudo: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, AccountError> {
        self.create(pseudo, email, password, Role::Admin).await
    }

    async fn create(
        &self,
        pseudo: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Account, AccountError> {
        validate_pseudo(pseudo)?;
        validate_email(email)?;
        validate_password(password)?;

        if self.store.account_by_pseudo(pseudo).await?.is_some() {
            return Err(AccountError::PseudoTaken);
        }
        // One account per email, otherwise a password-reset request could
        // land on the wrong row.
        if self.store.account_by_email(email).await?.is_some() {
            return Err(AccountError::EmailTaken);
        }

        let password_hash = hash_password(password.to_string()).await?;
        let account = self
            .store
            .insert_account(NewAccount {
                pseudo: pseudo.to_string(),
                email: email.to_string(),
                password_hash,
                role,
            })
            .await?;

        tracing::info!(pseudo = %account.pseudo, role = role.as_str(), "New account created");
        self.notifier.notify(Notification::RegistrationConfirmed {
            pseudo: account.pseudo.clone(),
            email: account.email.clone(),
        });

        Ok(account)
    }

    /// Seed the super-admin account at startup. Idempotent: if the
    /// pseudo already exists the existing account is returned untouched,
    /// and no registration email is sent either way.
    pub async fn ensure_super_admin(
        &self,
        pseudo: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, AccountError> {
        if let Some(existing) = self.store.account_by_pseudo(pseudo).await? {
            return Ok(existing);
        }

        let password_hash = hash_password(password.to_string()).await?;
        let account = self
            .store
            .insert_account(NewAccount {
                pseudo: pseudo.to_string(),
                email: email.to_string(),
                password_hash,
                role: Role::SuperAdmin,
            })
            .await?;
        tracing::info!(pseudo = %account.pseudo, "Super-admin account seeded");
        Ok(account)
    }

    pub async fn list(&self) -> Result<Vec<Account>, AccountError> {
        self.store.list_accounts().await
    }

    pub async fn delete(&self, id: AccountId) -> Result<(), AccountError> {
        self.store.delete_account(id).await?;
        tracing::info!(account_id = id, "Account deleted");
        Ok(())
    }

    /// Start the password-reset flow. An unknown email is a silent no-op
    /// so the endpoint cannot be used to enumerate accounts.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AccountError> {
        let Some(account) = self.store.account_by_email(email).await? else {
            tracing::info!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = Alphanumeric.sample_string(&mut rand::thread_rng(), 64);
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        self.store
            .save_reset_token(account.id, &token, expires_at)
            .await?;

        let reset_url = format!(
            "{}/auth/password-reset/confirm?token={}",
            self.reset_base_url, token
        );
        self.notifier.notify(Notification::PasswordResetRequested {
            pseudo: account.pseudo,
            email: account.email,
            reset_url,
        });

        Ok(())
    }

    /// Finish the password-reset flow. The token is single-use and
    /// rejected past its expiry.
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        validate_password(new_password)?;

        let Some((account_id, expires_at)) = self.store.take_reset_token(token).await? else {
            return Err(AccountError::InvalidResetToken);
        };
        if Utc::now() >= expires_at {
            return Err(AccountError::InvalidResetToken);
        }

        let account = self
            .store
            .account_by_id(account_id)
            .await?
            .ok_or(AccountError::NotFound)?;

        let password_hash = hash_password(new_password.to_string()).await?;
        self.store
            .update_password(account.id, &password_hash)
            .await?;

        tracing::info!(pseudo = %account.pseudo, "Password reset completed");
        self.notifier.notify(Notification::PasswordResetConfirmed {
            pseudo: account.pseudo,
            email: account.email,
        });

        Ok(())
    }
}

// ============================================================================
// PASSWORD HASHING & VALIDATION
// ============================================================================

/// bcrypt is CPU-bound, so it runs on the blocking pool.
async fn hash_password(password: String) -> Result<String, AccountError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AccountError::Hashing(e.to_string()))?
        .map_err(|e| AccountError::Hashing(e.to_string()))
}

/// Verify a password against a stored bcrypt hash (the salt is embedded
/// in the hash). Shared with the auth service.
pub async fn verify_password(password: String, hash: String) -> Result<bool, AccountError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AccountError::Hashing(e.to_string()))?
        .map_err(|e| AccountError::Hashing(e.to_string()))
}

fn validate_pseudo(pseudo: &str) -> Result<(), AccountError> {
    let ok_chars = pseudo
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if pseudo.len() < 3 || pseudo.len() > 30 || !ok_chars {
        return Err(AccountError::Validation(
            "le pseudo doit faire de 3 à 30 caractères alphanumériques, '_' ou '-'".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AccountError> {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(AccountError::Validation(
            "adresse e-mail invalide".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AccountError> {
    if password.len() < 8 {
        return Err(AccountError::Validation(
            "le mot de passe doit faire au moins 8 caractères".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::infra::mail::MemoryMailer;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store for testing; also reused by the auth, moderation
    /// and content service tests.
    #[derive(Default)]
    pub(crate) struct MemAccountStore {
        inner: Mutex<Inner>,
    }

    #[derive(Default)]
    struct Inner {
        next_id: AccountId,
        accounts: HashMap<AccountId, Account>,
        reset_tokens: HashMap<String, (AccountId, DateTime<Utc>)>,
    }

    impl MemAccountStore {
        pub(crate) fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl AccountStore for MemAccountStore {
        async fn insert_account(&self, account: NewAccount) -> Result<Account, AccountError> {
            let mut inner = self.inner.lock().unwrap();
            if inner
                .accounts
                .values()
                .any(|a| a.pseudo == account.pseudo)
            {
                return Err(AccountError::PseudoTaken);
            }
            if inner.accounts.values().any(|a| a.email == account.email) {
                return Err(AccountError::EmailTaken);
            }
            inner.next_id += 1;
            let stored = Account {
                id: inner.next_id,
                pseudo: account.pseudo,
                email: account.email,
                password_hash: account.password_hash,
                role: account.role,
                banned: false,
                banned_at: None,
                ban_ends_at: None,
                ban_count: 0,
                created_at: Utc::now(),
            };
            inner.accounts.insert(stored.id, stored.clone());
            Ok(stored)
        }

        async fn account_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError> {
            Ok(self.inner.lock().unwrap().accounts.get(&id).cloned())
        }

        async fn account_by_pseudo(
            &self,
            pseudo: &str,
        ) -> Result<Option<Account>, AccountError> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .accounts
                .values()
                .find(|a| a.pseudo == pseudo)
                .cloned())
        }

        async fn account_by_email(&self, email: &str) -> Result<Option<Account>, AccountError> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .accounts
                .values()
                .find(|a| a.email == email)
                .cloned())
        }

        async fn list_accounts(&self) -> Result<Vec<Account>, AccountError> {
            let mut all: Vec<Account> =
                self.inner.lock().unwrap().accounts.values().cloned().collect();
            all.sort_by_key(|a| a.id);
            Ok(all)
        }

        async fn update_password(
            &self,
            id: AccountId,
            password_hash: &str,
        ) -> Result<(), AccountError> {
            let mut inner = self.inner.lock().unwrap();
            let account = inner.accounts.get_mut(&id).ok_or(AccountError::NotFound)?;
            account.password_hash = password_hash.to_string();
            Ok(())
        }

        async fn update_ban_state(
            &self,
            id: AccountId,
            ban: BanState,
        ) -> Result<(), AccountError> {
            let mut inner = self.inner.lock().unwrap();
            let account = inner.accounts.get_mut(&id).ok_or(AccountError::NotFound)?;
            account.banned = ban.banned;
            account.banned_at = ban.banned_at;
            account.ban_ends_at = ban.ban_ends_at;
            account.ban_count = ban.ban_count;
            Ok(())
        }

        async fn delete_account(&self, id: AccountId) -> Result<(), AccountError> {
            self.inner
                .lock()
                .unwrap()
                .accounts
                .remove(&id)
                .map(|_| ())
                .ok_or(AccountError::NotFound)
        }

        async fn save_reset_token(
            &self,
            id: AccountId,
            token: &str,
            expires_at: DateTime<Utc>,
        ) -> Result<(), AccountError> {
            self.inner
                .lock()
                .unwrap()
                .reset_tokens
                .insert(token.to_string(), (id, expires_at));
            Ok(())
        }

        async fn take_reset_token(
            &self,
            token: &str,
        ) -> Result<Option<(AccountId, DateTime<Utc>)>, AccountError> {
            Ok(self.inner.lock().unwrap().reset_tokens.remove(token))
        }
    }

    async fn drain() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn service(mailer: &MemoryMailer) -> AccountService<MemAccountStore> {
        AccountService::new(
            Arc::new(MemAccountStore::new()),
            Notifier::spawn(mailer.clone(), 16),
            "https://blog.example".to_string(),
        )
    }

    #[tokio::test]
    async fn test_register_hashes_password_and_confirms() {
        let mailer = MemoryMailer::new();
        let service = service(&mailer);

        let account = service
            .register("sakura", "sakura@example.com", "correct horse")
            .await
            .unwrap();

        assert_eq!(account.role, Role::User);
        assert_ne!(account.password_hash, "correct horse");
        assert!(
            verify_password("correct horse".to_string(), account.password_hash)
                .await
                .unwrap()
        );

        drain().await;
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Confirmation d'inscription");
    }

    #[tokio::test]
    async fn test_duplicate_pseudo_rejected() {
        let mailer = MemoryMailer::new();
        let service = service(&mailer);

        service
            .register("sakura", "a@example.com", "password-1")
            .await
            .unwrap();
        let err = service
            .register("sakura", "b@example.com", "password-2")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::PseudoTaken));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let mailer = MemoryMailer::new();
        let service = service(&mailer);

        let sakura = service
            .register("sakura", "shared@example.com", "password-1")
            .await
            .unwrap();
        let err = service
            .register("mallory", "shared@example.com", "password-2")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::EmailTaken));

        // With emails unique, a reset request can only ever target the
        // one account holding the address.
        service
            .request_password_reset("shared@example.com")
            .await
            .unwrap();
        drain().await;
        let sent = mailer.sent();
        let reset_mail = sent
            .iter()
            .find(|m| m.subject.starts_with("Réinitialisation"))
            .unwrap();
        assert!(reset_mail.body.contains(&sakura.pseudo));
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let mailer = MemoryMailer::new();
        let service = service(&mailer);

        assert!(matches!(
            service.register("x", "a@example.com", "password-1").await,
            Err(AccountError::Validation(_))
        ));
        assert!(matches!(
            service.register("sakura", "nope", "password-1").await,
            Err(AccountError::Validation(_))
        ));
        assert!(matches!(
            service.register("sakura", "a@example.com", "short").await,
            Err(AccountError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_password_reset_roundtrip_and_single_use() {
        let mailer = MemoryMailer::new();
        let service = service(&mailer);

        service
            .register("sakura", "sakura@example.com", "old password")
            .await
            .unwrap();
        service
            .request_password_reset("sakura@example.com")
            .await
            .unwrap();
        drain().await;

        // Pull the token out of the reset email.
        let sent = mailer.sent();
        let reset_mail = sent
            .iter()
            .find(|m| m.subject.starts_with("Réinitialisation"))
            .unwrap();
        let token = reset_mail
            .body
            .split("token=")
            .nth(1)
            .unwrap()
            .split_whitespace()
            .next()
            .unwrap()
            .to_string();

        service
            .confirm_password_reset(&token, "new password")
            .await
            .unwrap();

        let account = service.store.account_by_pseudo("sakura").await.unwrap().unwrap();
        assert!(
            verify_password("new password".to_string(), account.password_hash)
                .await
                .unwrap()
        );

        // Second use of the same token is refused.
        let err = service
            .confirm_password_reset(&token, "another password")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidResetToken));
    }

    #[tokio::test]
    async fn test_reset_for_unknown_email_is_silent() {
        let mailer = MemoryMailer::new();
        let service = service(&mailer);

        service
            .request_password_reset("nobody@example.com")
            .await
            .unwrap();
        drain().await;
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_expired_reset_token_rejected() {
        let mailer = MemoryMailer::new();
        let service = service(&mailer);

        let account = service
            .register("sakura", "sakura@example.com", "old password")
            .await
            .unwrap();
        service
            .store
            .save_reset_token(account.id, "stale-token", Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        let err = service
            .confirm_password_reset("stale-token", "new password")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidResetToken));
    }
}
