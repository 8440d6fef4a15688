// HTTP error surface - converts core errors into status codes and JSON
// bodies. Storage details are logged, never shown to the client.

use crate::core::accounts::AccountError;
use crate::core::auth::AuthError;
use crate::core::content::ContentError;
use crate::core::moderation::ModerationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("identifiant ou mot de passe incorrect")]
    InvalidCredentials,

    #[error("compte banni")]
    Banned {
        banned_at: Option<DateTime<Utc>>,
        ban_ends_at: Option<DateTime<Utc>>,
    },

    #[error("connexion requise")]
    LoginRequired,

    #[error("accès refusé")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("ce pseudo est déjà pris")]
    PseudoTaken,

    #[error("cette adresse email est déjà utilisée")]
    EmailTaken,

    #[error("cette catégorie existe déjà")]
    CategoryTaken,

    #[error("lien de réinitialisation invalide ou expiré")]
    InvalidResetToken,

    #[error("erreur interne")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidCredentials | ApiError::LoginRequired => StatusCode::UNAUTHORIZED,
            ApiError::Banned { .. } | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PseudoTaken | ApiError::EmailTaken | ApiError::CategoryTaken => {
                StatusCode::CONFLICT
            }
            ApiError::InvalidResetToken => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            ApiError::Banned {
                banned_at,
                ban_ends_at,
            } => json!({
                "error": self.to_string(),
                "banned_at": banned_at,
                "ban_ends_at": ban_ends_at,
            }),
            ApiError::LoginRequired => json!({
                "error": self.to_string(),
                "redirect": "/login",
            }),
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "Request failed with internal error");
                json!({ "error": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::NotFound => ApiError::NotFound("compte introuvable".to_string()),
            AccountError::PseudoTaken => ApiError::PseudoTaken,
            AccountError::EmailTaken => ApiError::EmailTaken,
            AccountError::Validation(msg) => ApiError::Validation(msg),
            AccountError::InvalidResetToken => ApiError::InvalidResetToken,
            AccountError::Hashing(detail) | AccountError::Storage(detail) => {
                ApiError::Internal(detail)
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::Banned {
                banned_at,
                ban_ends_at,
            } => ApiError::Banned {
                banned_at,
                ban_ends_at,
            },
            AuthError::Storage(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<ModerationError> for ApiError {
    fn from(e: ModerationError) -> Self {
        match e {
            ModerationError::NotFound => ApiError::NotFound("compte introuvable".to_string()),
            ModerationError::Storage(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<ContentError> for ApiError {
    fn from(e: ContentError) -> Self {
        match e {
            ContentError::ContentNotFound => {
                ApiError::NotFound("contenu introuvable".to_string())
            }
            ContentError::CommentNotFound => {
                ApiError::NotFound("commentaire introuvable".to_string())
            }
            ContentError::ReplyNotFound => ApiError::NotFound("réponse introuvable".to_string()),
            ContentError::CategoryNotFound => {
                ApiError::NotFound("catégorie introuvable".to_string())
            }
            ContentError::CategoryTaken => ApiError::CategoryTaken,
            ContentError::LoginRequired => ApiError::LoginRequired,
            ContentError::Forbidden => ApiError::Forbidden,
            ContentError::Validation(msg) => ApiError::Validation(msg),
            ContentError::Storage(detail) => ApiError::Internal(detail),
        }
    }
}
