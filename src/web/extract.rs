// Shared application state and the request-principal extractor.

use crate::core::accounts::{Account, AccountService};
use crate::core::auth::{AuthService, Principal};
use crate::core::content::ContentService;
use crate::core::moderation::ModerationService;
use crate::infra::accounts::SqliteAccountStore;
use crate::infra::content::SqliteContentStore;
use crate::web::error::ApiError;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use std::sync::Arc;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session-id";

/// Everything the handlers need, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService<SqliteAccountStore>>,
    pub auth: Arc<AuthService<SqliteAccountStore>>,
    pub moderation: Arc<ModerationService<SqliteAccountStore>>,
    pub content: Arc<ContentService<SqliteContentStore, SqliteAccountStore>>,
}

/// The caller behind the current request, resolved from the session
/// cookie. Missing, expired or banned-since-login sessions all resolve
/// to `Principal::Anonymous` rather than an error.
pub struct CurrentPrincipal(pub Principal);

impl CurrentPrincipal {
    pub fn require_account(&self) -> Result<&Account, ApiError> {
        self.0.account().ok_or(ApiError::LoginRequired)
    }

    pub fn require_moderator(&self) -> Result<&Account, ApiError> {
        let account = self.require_account()?;
        if !self.0.can_moderate() {
            return Err(ApiError::Forbidden);
        }
        Ok(account)
    }

    pub fn require_super_admin(&self) -> Result<&Account, ApiError> {
        let account = self.require_account()?;
        if !self.0.is_super_admin() {
            return Err(ApiError::Forbidden);
        }
        Ok(account)
    }
}

impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_cookie(&parts.headers);
        let principal = state.auth.principal(token.as_deref()).await?;
        Ok(CurrentPrincipal(principal))
    }
}

/// Pull the session token out of the Cookie header, if any.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}
