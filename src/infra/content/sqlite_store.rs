use crate::core::accounts::AccountId;
use crate::core::content::{
    Category, CategoryId, Comment, CommentId, CommentLikeState, ContentError, ContentId,
    ContentItem, ContentKind, ContentStore, NewContent, ReactionKind, ReactionOutcome, Reply,
    ReplyId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;

pub struct SqliteContentStore {
    pool: Pool<Sqlite>,
}

impl SqliteContentStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure the parent directory exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !database_url.contains(":memory:") {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let options = SqliteConnectOptions::from_str(&conn_str)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        Self::from_pool(pool).await
    }

    /// Build on an already-opened pool so both stores share one database
    /// file and connection set.
    pub async fn from_pool(pool: Pool<Sqlite>) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS content_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                author_id INTEGER NOT NULL,
                category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL,
                likes INTEGER NOT NULL DEFAULT 0,
                dislikes INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_id INTEGER NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS replies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                comment_id INTEGER NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        // One reaction per (account, content): switching sides is an
        // UPDATE of the kind column, not a second row.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reactions (
                account_id INTEGER NOT NULL,
                content_id INTEGER NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                PRIMARY KEY (account_id, content_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comment_likes (
                account_id INTEGER NOT NULL,
                comment_id INTEGER NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
                PRIMARY KEY (account_id, comment_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn insert_content(&self, new: NewContent) -> Result<ContentItem, ContentError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO content_items (kind, title, body, author_id, category_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(new.kind.as_str())
        .bind(&new.title)
        .bind(&new.body)
        .bind(new.author_id)
        .bind(new.category_id)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ContentError::Storage(e.to_string()))?;

        Ok(ContentItem {
            id: result.last_insert_rowid(),
            kind: new.kind,
            title: new.title,
            body: new.body,
            author_id: new.author_id,
            category_id: new.category_id,
            created_at,
            likes: 0,
            dislikes: 0,
        })
    }

    async fn content_by_id(&self, id: ContentId) -> Result<Option<ContentItem>, ContentError> {
        let row = sqlx::query("SELECT * FROM content_items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        row.map(|row| row_to_item(&row)).transpose()
    }

    async fn list_content(
        &self,
        kind: ContentKind,
        category: Option<CategoryId>,
    ) -> Result<Vec<ContentItem>, ContentError> {
        let rows = sqlx::query(
            "SELECT * FROM content_items WHERE kind = ?1 \
             AND (?2 IS NULL OR category_id = ?2) \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(kind.as_str())
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ContentError::Storage(e.to_string()))?;

        rows.iter().map(row_to_item).collect()
    }

    async fn insert_category(&self, name: &str) -> Result<Category, ContentError> {
        let result = sqlx::query("INSERT INTO categories (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await;

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation())
                {
                    return Err(ContentError::CategoryTaken);
                }
                return Err(ContentError::Storage(e.to_string()));
            }
        };

        Ok(Category {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    async fn category_by_id(&self, id: CategoryId) -> Result<Option<Category>, ContentError> {
        let row = sqlx::query("SELECT id, name FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        Ok(row.map(|row| Category {
            id: row.get("id"),
            name: row.get("name"),
        }))
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ContentError> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| Category {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }

    async fn delete_content(&self, id: ContentId) -> Result<bool, ContentError> {
        let result = sqlx::query("DELETE FROM content_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_comment(
        &self,
        content_id: ContentId,
        author_id: AccountId,
        body: &str,
    ) -> Result<Comment, ContentError> {
        let created_at = Utc::now();
        let result =
            sqlx::query("INSERT INTO comments (content_id, author_id, body, created_at) VALUES (?, ?, ?, ?)")
                .bind(content_id)
                .bind(author_id)
                .bind(body)
                .bind(created_at)
                .execute(&self.pool)
                .await
                .map_err(|e| ContentError::Storage(e.to_string()))?;

        Ok(Comment {
            id: result.last_insert_rowid(),
            content_id,
            author_id,
            body: body.to_string(),
            created_at,
        })
    }

    async fn comment_by_id(&self, id: CommentId) -> Result<Option<Comment>, ContentError> {
        let row = sqlx::query("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        Ok(row.map(|row| row_to_comment(&row)))
    }

    async fn comments_for(&self, content_id: ContentId) -> Result<Vec<Comment>, ContentError> {
        let rows = sqlx::query("SELECT * FROM comments WHERE content_id = ? ORDER BY id")
            .bind(content_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        Ok(rows.iter().map(row_to_comment).collect())
    }

    async fn delete_comment(&self, id: CommentId) -> Result<bool, ContentError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_reply(
        &self,
        comment_id: CommentId,
        author_id: AccountId,
        body: &str,
    ) -> Result<Reply, ContentError> {
        let created_at = Utc::now();
        let result =
            sqlx::query("INSERT INTO replies (comment_id, author_id, body, created_at) VALUES (?, ?, ?, ?)")
                .bind(comment_id)
                .bind(author_id)
                .bind(body)
                .bind(created_at)
                .execute(&self.pool)
                .await
                .map_err(|e| ContentError::Storage(e.to_string()))?;

        Ok(Reply {
            id: result.last_insert_rowid(),
            comment_id,
            author_id,
            body: body.to_string(),
            created_at,
        })
    }

    async fn replies_for(&self, comment_id: CommentId) -> Result<Vec<Reply>, ContentError> {
        let rows = sqlx::query("SELECT * FROM replies WHERE comment_id = ? ORDER BY id")
            .bind(comment_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| Reply {
                id: row.get("id"),
                comment_id: row.get("comment_id"),
                author_id: row.get("author_id"),
                body: row.get("body"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn reply_by_id(&self, id: ReplyId) -> Result<Option<Reply>, ContentError> {
        let row = sqlx::query("SELECT * FROM replies WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        Ok(row.map(|row| Reply {
            id: row.get("id"),
            comment_id: row.get("comment_id"),
            author_id: row.get("author_id"),
            body: row.get("body"),
            created_at: row.get("created_at"),
        }))
    }

    async fn delete_reply(&self, id: ReplyId) -> Result<bool, ContentError> {
        let result = sqlx::query("DELETE FROM replies WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn toggle_reaction(
        &self,
        account_id: AccountId,
        content_id: ContentId,
        kind: ReactionKind,
    ) -> Result<ReactionOutcome, ContentError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        let item = sqlx::query("SELECT likes, dislikes FROM content_items WHERE id = ?")
            .bind(content_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;
        let Some(item) = item else {
            return Err(ContentError::ContentNotFound);
        };
        let (mut likes, mut dislikes) =
            (item.get::<i64, _>("likes"), item.get::<i64, _>("dislikes"));

        let existing =
            sqlx::query("SELECT kind FROM reactions WHERE account_id = ? AND content_id = ?")
                .bind(account_id)
                .bind(content_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| ContentError::Storage(e.to_string()))?
                .map(|row| row.get::<String, _>("kind"));

        let replaced_opposite = match existing.as_deref() {
            Some(s) if s == kind.as_str() => {
                // Same side again: nothing to change.
                return Ok(ReactionOutcome::AlreadyReacted { likes, dislikes });
            }
            Some(_) => {
                sqlx::query("UPDATE reactions SET kind = ? WHERE account_id = ? AND content_id = ?")
                    .bind(kind.as_str())
                    .bind(account_id)
                    .bind(content_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| ContentError::Storage(e.to_string()))?;
                match kind.opposite() {
                    ReactionKind::Like => likes -= 1,
                    ReactionKind::Dislike => dislikes -= 1,
                }
                true
            }
            None => {
                sqlx::query(
                    "INSERT INTO reactions (account_id, content_id, kind) VALUES (?, ?, ?)",
                )
                .bind(account_id)
                .bind(content_id)
                .bind(kind.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| ContentError::Storage(e.to_string()))?;
                false
            }
        };
        match kind {
            ReactionKind::Like => likes += 1,
            ReactionKind::Dislike => dislikes += 1,
        }

        sqlx::query("UPDATE content_items SET likes = ?, dislikes = ? WHERE id = ?")
            .bind(likes)
            .bind(dislikes)
            .bind(content_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        Ok(ReactionOutcome::Recorded {
            likes,
            dislikes,
            replaced_opposite,
        })
    }

    async fn toggle_comment_like(
        &self,
        account_id: AccountId,
        comment_id: CommentId,
    ) -> Result<bool, ContentError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        let exists = sqlx::query("SELECT 1 FROM comments WHERE id = ?")
            .bind(comment_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;
        if exists.is_none() {
            return Err(ContentError::CommentNotFound);
        }

        let removed =
            sqlx::query("DELETE FROM comment_likes WHERE account_id = ? AND comment_id = ?")
                .bind(account_id)
                .bind(comment_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| ContentError::Storage(e.to_string()))?
                .rows_affected();

        let created = removed == 0;
        if created {
            sqlx::query("INSERT INTO comment_likes (account_id, comment_id) VALUES (?, ?)")
                .bind(account_id)
                .bind(comment_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| ContentError::Storage(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| ContentError::Storage(e.to_string()))?;

        Ok(created)
    }

    async fn comment_like_state(
        &self,
        comment_id: CommentId,
        viewer: Option<AccountId>,
    ) -> Result<CommentLikeState, ContentError> {
        let rows =
            sqlx::query("SELECT account_id FROM comment_likes WHERE comment_id = ? ORDER BY account_id")
                .bind(comment_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ContentError::Storage(e.to_string()))?;

        let liker_ids: Vec<AccountId> = rows.iter().map(|row| row.get("account_id")).collect();
        let liked_by_viewer = viewer.is_some_and(|v| liker_ids.contains(&v));

        Ok(CommentLikeState {
            like_count: liker_ids.len() as i64,
            liker_ids,
            liked_by_viewer,
        })
    }
}

fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<ContentItem, ContentError> {
    let kind_str: String = row.get("kind");
    let kind = ContentKind::parse(&kind_str)
        .ok_or_else(|| ContentError::Storage(format!("unknown content kind: {}", kind_str)))?;

    Ok(ContentItem {
        id: row.get("id"),
        kind,
        title: row.get("title"),
        body: row.get("body"),
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        likes: row.get("likes"),
        dislikes: row.get("dislikes"),
    })
}

fn row_to_comment(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        content_id: row.get("content_id"),
        author_id: row.get("author_id"),
        body: row.get("body"),
        created_at: row.get("created_at"),
    }
}
