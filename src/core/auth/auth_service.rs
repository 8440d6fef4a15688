// Auth service - credential verification and session management.
//
// Login is refused for banned accounts using the read-time ban check, so
// a stale `banned` flag past its end date never locks anyone out. The
// session table is in-process: a restart logs everyone out, which is
// acceptable for a blog.

use crate::core::accounts::{verify_password, Account, AccountId, AccountStore, Role};
use crate::core::moderation::{ban_status, BanStatus};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::distributions::{Alphanumeric, DistString};
use std::sync::Arc;
use thiserror::Error;

/// Sessions die after this long without activity (matches the cookie
/// max-age set by the web layer).
pub const SESSION_TTL_DAYS: i64 = 30;

const SESSION_TOKEN_LEN: usize = 128;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// An established login, threaded through request handling as a value -
/// never ambient global state.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub account_id: AccountId,
    pub pseudo: String,
    pub role: Role,
    pub last_seen: DateTime<Utc>,
}

/// Who is making a request. Capability checks are explicit methods, not
/// duck typing on whichever account type happens to be present.
#[derive(Debug, Clone)]
pub enum Principal {
    User(Account),
    Admin(Account),
    Anonymous,
}

impl Principal {
    pub fn from_account(account: Account) -> Self {
        if account.role.can_moderate() {
            Principal::Admin(account)
        } else {
            Principal::User(account)
        }
    }

    pub fn account(&self) -> Option<&Account> {
        match self {
            Principal::User(a) | Principal::Admin(a) => Some(a),
            Principal::Anonymous => None,
        }
    }

    pub fn can_post(&self) -> bool {
        self.account().is_some()
    }

    pub fn can_moderate(&self) -> bool {
        matches!(self, Principal::Admin(_))
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Principal::Admin(a) if a.role == Role::SuperAdmin)
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum AuthError {
    /// Covers both "no such account" and "wrong password"; the log keeps
    /// the distinction, the caller-visible message does not.
    #[error("identifiant ou mot de passe incorrect")]
    InvalidCredentials,

    #[error("account is banned")]
    Banned {
        banned_at: Option<DateTime<Utc>>,
        ban_ends_at: Option<DateTime<Utc>>,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct AuthService<S: AccountStore> {
    store: Arc<S>,
    sessions: DashMap<String, Session>,
}

impl<S: AccountStore> AuthService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            sessions: DashMap::new(),
        }
    }

    /// Verify credentials, refuse banned accounts, establish a session.
    pub async fn authenticate(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let account = match self.store.account_by_pseudo(identifier).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                tracing::warn!(identifier, "Login attempt for unknown account");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(AuthError::Storage(e.to_string())),
        };

        let verified = verify_password(password.to_string(), account.password_hash.clone())
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        if !verified {
            tracing::warn!(identifier, "Login attempt with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        match ban_status(&account, Utc::now()) {
            BanStatus::Active => {}
            BanStatus::Banned { until } => {
                tracing::info!(pseudo = %account.pseudo, "Login refused: banned account");
                return Err(AuthError::Banned {
                    banned_at: account.banned_at,
                    ban_ends_at: Some(until),
                });
            }
            BanStatus::PermanentlyBanned => {
                tracing::info!(pseudo = %account.pseudo, "Login refused: permanently banned");
                return Err(AuthError::Banned {
                    banned_at: account.banned_at,
                    ban_ends_at: None,
                });
            }
        }

        let session = Session {
            token: self.fresh_token(),
            account_id: account.id,
            pseudo: account.pseudo.clone(),
            role: account.role,
            last_seen: Utc::now(),
        };
        self.sessions.insert(session.token.clone(), session.clone());

        tracing::info!(pseudo = %account.pseudo, "Logged in");
        Ok(session)
    }

    fn fresh_token(&self) -> String {
        loop {
            let token = Alphanumeric.sample_string(&mut rand::thread_rng(), SESSION_TOKEN_LEN);
            if !self.sessions.contains_key(&token) {
                return token;
            }
        }
    }

    /// Look up a session by token, refreshing its activity timestamp.
    /// Expired sessions are dropped on sight.
    pub fn session(&self, token: &str) -> Option<Session> {
        let expired = match self.sessions.get_mut(token) {
            Some(mut entry) => {
                if Utc::now() - entry.last_seen < Duration::days(SESSION_TTL_DAYS) {
                    entry.last_seen = Utc::now();
                    return Some(entry.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.sessions.remove(token);
        }
        None
    }

    pub fn logout(&self, token: &str) {
        self.sessions.remove(token);
    }

    /// Resolve the principal for a request. A session whose account has
    /// been banned (or deleted) since login degrades to Anonymous and
    /// the session is dropped.
    pub async fn principal(&self, token: Option<&str>) -> Result<Principal, AuthError> {
        let Some(token) = token else {
            return Ok(Principal::Anonymous);
        };
        let Some(session) = self.session(token) else {
            return Ok(Principal::Anonymous);
        };

        let account = self
            .store
            .account_by_id(session.account_id)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        match account {
            Some(account) if !ban_status(&account, Utc::now()).is_banned() => {
                Ok(Principal::from_account(account))
            }
            _ => {
                self.sessions.remove(token);
                Ok(Principal::Anonymous)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
