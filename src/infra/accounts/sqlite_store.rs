use crate::core::accounts::{Account, AccountError, AccountId, AccountStore, BanState, NewAccount, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;

pub struct SqliteAccountStore {
    pool: Pool<Sqlite>,
}

impl SqliteAccountStore {
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

        // foreign_keys is per-connection in SQLite, so it has to be set
        // through the connect options rather than a one-off PRAGMA.
        let options = SqliteConnectOptions::from_str(&conn_str)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Share an already-opened pool (the content store reuses it).
    pub fn pool(&self) -> Pool<Sqlite> {
        self.pool.clone()
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pseudo TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                banned INTEGER NOT NULL DEFAULT 0,
                banned_at TEXT,
                ban_ends_at TEXT,
                ban_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS password_reset_tokens (
                token TEXT PRIMARY KEY,
                account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                expires_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn insert_account(&self, account: NewAccount) -> Result<Account, AccountError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (pseudo, email, password_hash, role, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.pseudo)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                if let Some(db) = e.as_database_error() {
                    if db.is_unique_violation() {
                        // SQLite names the violated column in the message.
                        if db.message().contains("accounts.email") {
                            return Err(AccountError::EmailTaken);
                        }
                        return Err(AccountError::PseudoTaken);
                    }
                }
                return Err(AccountError::Storage(e.to_string()));
            }
        };

        Ok(Account {
            id: result.last_insert_rowid(),
            pseudo: account.pseudo,
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            banned: false,
            banned_at: None,
            ban_ends_at: None,
            ban_count: 0,
            created_at,
        })
    }

    async fn account_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AccountError::Storage(e.to_string()))?;

        row.map(|row| row_to_account(&row)).transpose()
    }

    async fn account_by_pseudo(&self, pseudo: &str) -> Result<Option<Account>, AccountError> {
        let row = sqlx::query("SELECT * FROM accounts WHERE pseudo = ?")
            .bind(pseudo)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AccountError::Storage(e.to_string()))?;

        row.map(|row| row_to_account(&row)).transpose()
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, AccountError> {
        let row = sqlx::query("SELECT * FROM accounts WHERE email = ? LIMIT 1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AccountError::Storage(e.to_string()))?;

        row.map(|row| row_to_account(&row)).transpose()
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, AccountError> {
        let rows = sqlx::query("SELECT * FROM accounts ORDER BY pseudo COLLATE NOCASE")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AccountError::Storage(e.to_string()))?;

        rows.iter().map(row_to_account).collect()
    }

    async fn update_password(
        &self,
        id: AccountId,
        password_hash: &str,
    ) -> Result<(), AccountError> {
        let result = sqlx::query("UPDATE accounts SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AccountError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AccountError::NotFound);
        }
        Ok(())
    }

    async fn update_ban_state(&self, id: AccountId, ban: BanState) -> Result<(), AccountError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET banned = ?, banned_at = ?, ban_ends_at = ?, ban_count = ?
            WHERE id = ?
            "#,
        )
        .bind(ban.banned)
        .bind(ban.banned_at)
        .bind(ban.ban_ends_at)
        .bind(ban.ban_count as i64)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AccountError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AccountError::NotFound);
        }
        Ok(())
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), AccountError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AccountError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AccountError::NotFound);
        }
        Ok(())
    }

    async fn save_reset_token(
        &self,
        id: AccountId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        sqlx::query(
            "INSERT INTO password_reset_tokens (token, account_id, expires_at) VALUES (?, ?, ?)",
        )
        .bind(token)
        .bind(id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AccountError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn take_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<(AccountId, DateTime<Utc>)>, AccountError> {
        // DELETE ... RETURNING makes the take single-use without a
        // separate read-then-delete window.
        let row = sqlx::query(
            "DELETE FROM password_reset_tokens WHERE token = ? RETURNING account_id, expires_at",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccountError::Storage(e.to_string()))?;

        Ok(row.map(|row| {
            (
                row.get::<i64, _>("account_id"),
                row.get::<DateTime<Utc>, _>("expires_at"),
            )
        }))
    }
}

fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account, AccountError> {
    let role_str: String = row.get("role");
    let role = Role::parse(&role_str)
        .ok_or_else(|| AccountError::Storage(format!("unknown role in database: {}", role_str)))?;

    Ok(Account {
        id: row.get("id"),
        pseudo: row.get("pseudo"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role,
        banned: row.get("banned"),
        banned_at: row.get("banned_at"),
        ban_ends_at: row.get("ban_ends_at"),
        ban_count: row.get::<i64, _>("ban_count") as u32,
        created_at: row.get("created_at"),
    })
}
