// Account and session endpoints: register, login/logout, password reset.

use crate::core::accounts::{Account, Role};
use crate::core::auth::{Principal, SESSION_TTL_DAYS};
use crate::core::moderation::{ban_status, BanStatus};
use crate::web::error::ApiError;
use crate::web::extract::{session_cookie, AppState, CurrentPrincipal, SESSION_COOKIE};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Public projection of an account - everything but the password hash.
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: i64,
    pub pseudo: String,
    pub email: String,
    pub role: Role,
    pub ban_count: u32,
    #[serde(flatten)]
    pub ban_status: BanStatus,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            pseudo: account.pseudo.clone(),
            email: account.email.clone(),
            role: account.role,
            ban_count: account.ban_count,
            ban_status: ban_status(account, Utc::now()),
        }
    }
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub pseudo: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .accounts
        .register(&req.pseudo, &req.email, &req.password)
        .await?;
    Ok((StatusCode::CREATED, Json(AccountView::from(&account))))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub pseudo: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.auth.authenticate(&req.pseudo, &req.password).await?;

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE,
        session.token,
        SESSION_TTL_DAYS * 24 * 60 * 60,
    );
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!({ "pseudo": session.pseudo, "role": session.role })),
    ))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = session_cookie(&headers) {
        state.auth.logout(&token);
    }
    let cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
        SESSION_COOKIE
    );
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        StatusCode::NO_CONTENT,
    )
}

/// Who the session cookie says you are.
pub async fn me(principal: CurrentPrincipal) -> Json<serde_json::Value> {
    match &principal.0 {
        Principal::Anonymous => Json(json!({ "anonymous": true })),
        Principal::User(account) | Principal::Admin(account) => {
            Json(json!({ "anonymous": false, "account": AccountView::from(account) }))
        }
    }
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Always answers 202: whether the email matches an account is not
/// revealed to the caller.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<StatusCode, ApiError> {
    state.accounts.request_password_reset(&req.email).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub new_password: String,
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetConfirm>,
) -> Result<StatusCode, ApiError> {
    state
        .accounts
        .confirm_password_reset(&req.token, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
