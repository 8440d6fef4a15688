// Content endpoints: articles, forum subjects and biographies, plus the
// comment/reply/reaction graph beneath them.

use crate::core::content::{
    Category, Comment, CommentLikeState, ContentItem, ContentKind, ContentPage, ReactionKind,
    ReactionOutcome, Reply,
};
use crate::web::error::ApiError;
use crate::web::extract::{AppState, CurrentPrincipal};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

fn parse_kind(raw: &str) -> Result<ContentKind, ApiError> {
    ContentKind::parse(raw)
        .ok_or_else(|| ApiError::NotFound(format!("type de contenu inconnu: {raw}")))
}

#[derive(Deserialize)]
pub struct ListContentQuery {
    pub category: Option<i64>,
}

pub async fn list_content(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<ListContentQuery>,
) -> Result<Json<Vec<ContentItem>>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.content.list(kind, query.category).await?))
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.content.categories().await?))
}

#[derive(Deserialize)]
pub struct CreateContentRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub category_id: Option<i64>,
}

/// Forum subjects are open to any member; articles and biographies are
/// written by the staff.
pub async fn create_content(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    principal: CurrentPrincipal,
    Json(req): Json<CreateContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let author = match kind {
        ContentKind::ForumSubject => principal.require_account()?,
        ContentKind::Article | ContentKind::Biography => principal.require_moderator()?,
    };

    let item = state
        .content
        .create(author, kind, &req.title, &req.body, req.category_id)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn content_page(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    principal: CurrentPrincipal,
) -> Result<Json<ContentPage>, ApiError> {
    let kind = parse_kind(&kind)?;
    let viewer = principal.0.account().map(|a| a.id);
    let page = state.content.page(id, viewer).await?;
    if page.item.kind != kind {
        return Err(ApiError::NotFound("contenu introuvable".to_string()));
    }
    Ok(Json(page))
}

pub async fn delete_content(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    principal: CurrentPrincipal,
) -> Result<StatusCode, ApiError> {
    let kind = parse_kind(&kind)?;
    principal.require_moderator()?;

    let page = state.content.page(id, None).await?;
    if page.item.kind != kind {
        return Err(ApiError::NotFound("contenu introuvable".to_string()));
    }
    state.content.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    principal: CurrentPrincipal,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    parse_kind(&kind)?;
    let account = principal.require_account()?;
    let comment = state.content.add_comment(account.id, id, &req.body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Deserialize)]
pub struct ReactionRequest {
    pub kind: String,
}

pub async fn react(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    principal: CurrentPrincipal,
    Json(req): Json<ReactionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    parse_kind(&kind)?;
    let account = principal.require_account()?;
    let reaction = ReactionKind::parse(&req.kind)
        .ok_or_else(|| ApiError::Validation(format!("réaction inconnue: {}", req.kind)))?;

    let outcome = state.content.react(account.id, id, reaction).await?;
    let body = match outcome {
        ReactionOutcome::Recorded {
            likes, dislikes, ..
        } => json!({ "likes": likes, "dislikes": dislikes, "already_reacted": false }),
        ReactionOutcome::AlreadyReacted { likes, dislikes } => {
            json!({ "likes": likes, "dislikes": dislikes, "already_reacted": true })
        }
    };
    Ok(Json(body))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    principal: CurrentPrincipal,
) -> Result<StatusCode, ApiError> {
    state.content.delete_comment(&principal.0, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub body: String,
}

pub async fn add_reply(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    principal: CurrentPrincipal,
    Json(req): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<Reply>), ApiError> {
    let account = principal.require_account()?;
    let reply = state
        .content
        .add_reply(account.id, comment_id, &req.body)
        .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

pub async fn delete_reply(
    State(state): State<AppState>,
    Path(reply_id): Path<i64>,
    principal: CurrentPrincipal,
) -> Result<StatusCode, ApiError> {
    state.content.delete_reply(&principal.0, reply_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn like_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    principal: CurrentPrincipal,
) -> Result<Json<CommentLikeState>, ApiError> {
    let account = principal.require_account()?;
    let likes = state.content.like_comment(account.id, comment_id).await?;
    Ok(Json(likes))
}
