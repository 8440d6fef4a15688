// This is the entry point of the manga blog server.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (database, SMTP)
// - `web/` = HTTP-specific adapters (routes, extractors)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Serve the HTTP API

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "web/web_layer.rs"]
mod web;

mod config;

use crate::config::Config;
use crate::core::accounts::AccountService;
use crate::core::auth::AuthService;
use crate::core::content::ContentService;
use crate::core::moderation::ModerationService;
use crate::core::notify::Notifier;
use crate::infra::accounts::SqliteAccountStore;
use crate::infra::content::SqliteContentStore;
use crate::infra::mail::{DiscardMailer, SmtpMailer};
use crate::web::extract::AppState;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = Config::load();

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let account_store = Arc::new(
        SqliteAccountStore::new(&config.database_path)
            .await
            .expect("Failed to initialize account store"),
    );
    let content_store = Arc::new(
        SqliteContentStore::from_pool(account_store.pool())
            .await
            .expect("Failed to initialize content store"),
    );

    // Outbound mail runs on a bounded background queue; without SMTP
    // configuration every notification is logged and dropped.
    let notifier = match &config.mail {
        Some(mail) => Notifier::spawn(
            SmtpMailer::new(mail).expect("Failed to build SMTP transport"),
            config.mail_queue_capacity,
        ),
        None => Notifier::spawn(DiscardMailer, config.mail_queue_capacity),
    };

    let accounts = Arc::new(AccountService::new(
        account_store.clone(),
        notifier.clone(),
        config.base_url.clone(),
    ));
    let auth = Arc::new(AuthService::new(account_store.clone()));
    let moderation = Arc::new(ModerationService::new(
        account_store.clone(),
        notifier.clone(),
    ));
    let content = Arc::new(ContentService::new(
        content_store,
        account_store,
        notifier,
    ));

    if let Some(seed) = &config.super_admin {
        accounts
            .ensure_super_admin(&seed.pseudo, &seed.email, &seed.password)
            .await
            .expect("Failed to seed super-admin account");
    }

    let app = web::router(AppState {
        accounts,
        auth,
        moderation,
        content,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {}: {}", config.bind_addr, e));
    tracing::info!(addr = %config.bind_addr, "Serving HTTP API");

    axum::serve(listener, app)
        .await
        .expect("HTTP server crashed");
}
