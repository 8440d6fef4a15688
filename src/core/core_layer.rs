// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "accounts/account_service.rs"]
pub mod accounts;

#[path = "auth/auth_service.rs"]
pub mod auth;

#[path = "content/mod.rs"]
pub mod content;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "notify/notifier_service.rs"]
pub mod notify;
