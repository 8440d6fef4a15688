// Runtime configuration, read once at startup from environment
// variables (a local .env file is honored through dotenv).

use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// SQLite database file path.
    pub database_path: String,
    /// Public base URL, used to build password-reset links.
    pub base_url: String,
    /// Depth of the outbound notification queue.
    pub mail_queue_capacity: usize,
    /// SMTP settings; None disables outbound mail entirely.
    pub mail: Option<MailConfig>,
    /// Super-admin account seeded at startup; None skips seeding.
    pub super_admin: Option<AdminSeed>,
}

pub struct AdminSeed {
    pub pseudo: String,
    pub email: String,
    pub password: String,
}

pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
    /// From address, e.g. "MangaBlog <no-reply@mangablog.fr>".
    pub sender: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            bind_addr: try_load("BIND_ADDR", "0.0.0.0:3000"),
            database_path: try_load("DATABASE_PATH", "data/mangablog.db"),
            base_url: try_load("BASE_URL", "http://localhost:3000"),
            mail_queue_capacity: try_load("MAIL_QUEUE_CAPACITY", "256"),
            mail: MailConfig::load(),
            super_admin: AdminSeed::load(),
        }
    }
}

impl AdminSeed {
    fn load() -> Option<Self> {
        let Ok(password) = env::var("SUPER_ADMIN_PASSWORD") else {
            info!("SUPER_ADMIN_PASSWORD not set, skipping super-admin seeding");
            return None;
        };

        Some(Self {
            pseudo: try_load("SUPER_ADMIN_PSEUDO", "admin"),
            email: try_load("SUPER_ADMIN_EMAIL", "admin@mangablog.fr"),
            password,
        })
    }
}

impl MailConfig {
    fn load() -> Option<Self> {
        let Ok(host) = env::var("SMTP_HOST") else {
            info!("SMTP_HOST not set, notification emails will be dropped");
            return None;
        };

        Some(Self {
            host,
            port: try_load("SMTP_PORT", "587"),
            username: env::var("SMTP_USERNAME").ok(),
            password: env::var("SMTP_PASSWORD").ok(),
            use_tls: try_load("SMTP_USE_TLS", "true"),
            sender: try_load("SMTP_SENDER", "MangaBlog <no-reply@mangablog.fr>"),
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
