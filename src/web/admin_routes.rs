// Administration endpoints: account listing, ban/unban, deletion and
// admin creation. Everything here requires a moderator session; admin
// creation is reserved to the super-admin.

use crate::core::content::Category;
use crate::core::moderation::BanOutcome;
use crate::web::auth_routes::{AccountView, RegisterRequest};
use crate::web::error::ApiError;
use crate::web::extract::{AppState, CurrentPrincipal};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

pub async fn list_accounts(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
) -> Result<Json<Vec<AccountView>>, ApiError> {
    principal.require_moderator()?;
    let accounts = state.accounts.list().await?;
    Ok(Json(accounts.iter().map(AccountView::from).collect()))
}

pub async fn create_admin(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountView>), ApiError> {
    principal.require_super_admin()?;
    let account = state
        .accounts
        .create_admin(&req.pseudo, &req.email, &req.password)
        .await?;
    Ok((StatusCode::CREATED, Json(AccountView::from(&account))))
}

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

pub async fn create_category(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    principal.require_moderator()?;
    let category = state.content.create_category(&req.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn ban_account(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    principal: CurrentPrincipal,
) -> Result<Json<serde_json::Value>, ApiError> {
    principal.require_moderator()?;
    let outcome = state.moderation.ban(account_id).await?;
    let body = match outcome {
        BanOutcome::TemporarilyBanned { until } => {
            json!({ "permanent": false, "until": until })
        }
        BanOutcome::PermanentlyBanned => json!({ "permanent": true }),
    };
    Ok(Json(body))
}

pub async fn unban_account(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    principal: CurrentPrincipal,
) -> Result<StatusCode, ApiError> {
    principal.require_moderator()?;
    state.moderation.unban(account_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_account(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    principal: CurrentPrincipal,
) -> Result<StatusCode, ApiError> {
    principal.require_moderator()?;
    state.accounts.delete(account_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
