// The web module is the delivery layer: it translates HTTP requests
// into core service calls and core results into responses.

#[path = "error.rs"]
pub mod error;

#[path = "extract.rs"]
pub mod extract;

#[path = "auth_routes.rs"]
pub mod auth_routes;

#[path = "content_routes.rs"]
pub mod content_routes;

#[path = "admin_routes.rs"]
pub mod admin_routes;

use axum::routing::{delete, get, post};
use axum::Router;
use extract::AppState;
use tower_http::trace::TraceLayer;

/// Assemble the full route table over the shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/register", post(auth_routes::register))
        .route("/api/login", post(auth_routes::login))
        .route("/api/logout", post(auth_routes::logout))
        .route("/api/me", get(auth_routes::me))
        .route(
            "/api/password-reset/request",
            post(auth_routes::request_password_reset),
        )
        .route(
            "/api/password-reset/confirm",
            post(auth_routes::confirm_password_reset),
        )
        .route("/api/categories", get(content_routes::list_categories))
        .route(
            "/api/content/{kind}",
            get(content_routes::list_content).post(content_routes::create_content),
        )
        .route(
            "/api/content/{kind}/{id}",
            get(content_routes::content_page).delete(content_routes::delete_content),
        )
        .route(
            "/api/content/{kind}/{id}/comments",
            post(content_routes::add_comment),
        )
        .route(
            "/api/content/{kind}/{id}/reactions",
            post(content_routes::react),
        )
        .route("/api/comments/{id}", delete(content_routes::delete_comment))
        .route("/api/comments/{id}/replies", post(content_routes::add_reply))
        .route("/api/comments/{id}/like", post(content_routes::like_comment))
        .route("/api/replies/{id}", delete(content_routes::delete_reply))
        .route(
            "/api/admin/accounts",
            get(admin_routes::list_accounts).post(admin_routes::create_admin),
        )
        .route(
            "/api/admin/categories",
            post(admin_routes::create_category),
        )
        .route(
            "/api/admin/accounts/{id}",
            delete(admin_routes::delete_account),
        )
        .route("/api/admin/accounts/{id}/ban", post(admin_routes::ban_account))
        .route(
            "/api/admin/accounts/{id}/unban",
            post(admin_routes::unban_account),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::accounts::AccountService;
    use crate::core::auth::AuthService;
    use crate::core::content::ContentService;
    use crate::core::moderation::ModerationService;
    use crate::core::notify::Notifier;
    use crate::infra::accounts::SqliteAccountStore;
    use crate::infra::content::SqliteContentStore;
    use crate::infra::mail::MemoryMailer;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::util::ServiceExt;

    async fn test_router() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let accounts_store = Arc::new(
            SqliteAccountStore::new(path.to_str().unwrap())
                .await
                .unwrap(),
        );
        let content_store = Arc::new(
            SqliteContentStore::from_pool(accounts_store.pool())
                .await
                .unwrap(),
        );

        let notifier = Notifier::spawn(MemoryMailer::new(), 16);
        let accounts = Arc::new(AccountService::new(
            accounts_store.clone(),
            notifier.clone(),
            "http://localhost".to_string(),
        ));
        accounts
            .ensure_super_admin("root", "root@example.com", "motdepasse")
            .await
            .unwrap();

        let state = AppState {
            accounts,
            auth: Arc::new(AuthService::new(accounts_store.clone())),
            moderation: Arc::new(ModerationService::new(accounts_store.clone(), notifier)),
            content: Arc::new(ContentService::new(
                content_store,
                accounts_store,
                Notifier::spawn(MemoryMailer::new(), 16),
            )),
        };
        (dir, router(state))
    }

    fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Register an account and return its session cookie.
    async fn login(router: &Router, pseudo: &str, password: &str) -> String {
        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/login",
                None,
                Some(json!({ "pseudo": pseudo, "password": password })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn register(router: &Router, pseudo: &str, password: &str) -> i64 {
        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/register",
                None,
                Some(json!({
                    "pseudo": pseudo,
                    "email": format!("{pseudo}@example.com"),
                    "password": password,
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn register_login_me_roundtrip() {
        let (_dir, router) = test_router().await;
        register(&router, "vincent", "motdepasse").await;
        let cookie = login(&router, "vincent", "motdepasse").await;

        let response = router
            .clone()
            .oneshot(request("GET", "/api/me", Some(&cookie), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["anonymous"], json!(false));
        assert_eq!(body["account"]["pseudo"], json!("vincent"));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let (_dir, router) = test_router().await;
        register(&router, "vincent", "motdepasse").await;

        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/login",
                None,
                Some(json!({ "pseudo": "vincent", "password": "autremotdepasse" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn forum_subject_needs_a_session() {
        let (_dir, router) = test_router().await;

        let body = json!({ "title": "Meilleur arc de One Piece ?", "body": "Votez." });
        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/content/forum_subject",
                None,
                Some(body.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        register(&router, "vincent", "motdepasse").await;
        let cookie = login(&router, "vincent", "motdepasse").await;
        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/content/forum_subject",
                Some(&cookie),
                Some(body),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn articles_are_staff_only() {
        let (_dir, router) = test_router().await;
        register(&router, "vincent", "motdepasse").await;
        let member = login(&router, "vincent", "motdepasse").await;

        let body = json!({ "title": "One Piece, tome 1", "body": "Critique." });
        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/content/article",
                Some(&member),
                Some(body.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let admin = login(&router, "root", "motdepasse").await;
        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/content/article",
                Some(&admin),
                Some(body),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn categories_are_staff_created_and_filter_articles() {
        let (_dir, router) = test_router().await;
        register(&router, "vincent", "motdepasse").await;
        let member = login(&router, "vincent", "motdepasse").await;

        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/admin/categories",
                Some(&member),
                Some(json!({ "name": "shōnen" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let admin = login(&router, "root", "motdepasse").await;
        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/admin/categories",
                Some(&admin),
                Some(json!({ "name": "shōnen" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let category_id = body_json(response).await["id"].as_i64().unwrap();

        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/content/article",
                Some(&admin),
                Some(json!({
                    "title": "One Piece, tome 1",
                    "body": "Critique.",
                    "category_id": category_id,
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/content/article",
                Some(&admin),
                Some(json!({ "title": "Eiichiro Oda", "body": "Portrait." })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = router
            .clone()
            .oneshot(request(
                "GET",
                &format!("/api/content/article?category={category_id}"),
                None,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["title"], json!("One Piece, tome 1"));
    }

    #[tokio::test]
    async fn banned_member_is_refused_at_login() {
        let (_dir, router) = test_router().await;
        let member_id = register(&router, "vincent", "motdepasse").await;
        let admin = login(&router, "root", "motdepasse").await;

        let response = router
            .clone()
            .oneshot(request(
                "POST",
                &format!("/api/admin/accounts/{member_id}/ban"),
                Some(&admin),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["permanent"], json!(false));

        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/login",
                None,
                Some(json!({ "pseudo": "vincent", "password": "motdepasse" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert!(body["ban_ends_at"].is_string());
    }

    #[tokio::test]
    async fn admin_creation_is_super_admin_only() {
        let (_dir, router) = test_router().await;
        register(&router, "vincent", "motdepasse").await;
        let member = login(&router, "vincent", "motdepasse").await;

        let body = json!({
            "pseudo": "nouveladmin",
            "email": "admin2@example.com",
            "password": "motdepasse",
        });
        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/admin/accounts",
                Some(&member),
                Some(body.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let root = login(&router, "root", "motdepasse").await;
        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/admin/accounts",
                Some(&root),
                Some(body),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn unknown_content_kind_is_not_found() {
        let (_dir, router) = test_router().await;
        let response = router
            .clone()
            .oneshot(request("GET", "/api/content/webtoon", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
