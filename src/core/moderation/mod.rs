// Core moderation module - the ban lifecycle.
// Following the same pattern as the accounts module.

pub mod moderation_models;
pub mod moderation_service;

pub use moderation_models::*;
pub use moderation_service::*;
