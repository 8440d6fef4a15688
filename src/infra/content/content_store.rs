// SQLite-backed content persistence (articles, forum subjects,
// biographies with their comments, replies and reactions).

pub mod sqlite_store;

// Re-export for convenience
pub use sqlite_store::SqliteContentStore;
