// Core content module - articles, forum subjects, mangaka biographies
// and the comment/reply/like graph on top of them.

pub mod content_models;
pub mod content_service;

pub use content_models::*;
pub use content_service::*;
