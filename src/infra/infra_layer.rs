// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "accounts/account_store.rs"]
pub mod accounts;

#[path = "content/content_store.rs"]
pub mod content;

#[path = "mail/mod.rs"]
pub mod mail;
