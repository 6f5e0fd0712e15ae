use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Session secrets that ship in docs and sample `.env` files and must never
/// be used for real.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-secret-key",
];

/// Upper bound on `NOTICEBOARD_SESSION_TTL_DAYS` (ten years).
const MAX_SESSION_TTL_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct Config {
    pub session_secret: String,
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub static_dir: PathBuf,
    pub session_ttl_days: i64,
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; `from_env` passes the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let session_secret = lookup("NOTICEBOARD_SESSION_SECRET").unwrap_or_default();
        if session_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&session_secret.as_str()) {
            bail!(
                "NOTICEBOARD_SESSION_SECRET is unset or still a placeholder; \
                 set it in the environment or .env file"
            );
        }

        let port = match lookup("NOTICEBOARD_PORT") {
            Some(raw) => raw.parse().with_context(|| format!("invalid NOTICEBOARD_PORT '{raw}'"))?,
            None => 8080,
        };

        let session_ttl_days = match lookup("NOTICEBOARD_SESSION_TTL_DAYS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid NOTICEBOARD_SESSION_TTL_DAYS '{raw}'"))?,
            None => 30,
        };
        if !(1..=MAX_SESSION_TTL_DAYS).contains(&session_ttl_days) {
            bail!("NOTICEBOARD_SESSION_TTL_DAYS must be between 1 and {MAX_SESSION_TTL_DAYS}");
        }

        let cookie_secure = match lookup("NOTICEBOARD_COOKIE_SECURE") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid NOTICEBOARD_COOKIE_SECURE '{raw}'"))?,
            None => false,
        };

        Ok(Self {
            session_secret,
            host: lookup("NOTICEBOARD_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: lookup("NOTICEBOARD_DB_PATH")
                .unwrap_or_else(|| "var/messages.db".into())
                .into(),
            static_dir: lookup("NOTICEBOARD_STATIC_DIR")
                .unwrap_or_else(|| "static".into())
                .into(),
            session_ttl_days,
            cookie_secure,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().with_context(|| format!("invalid listen address '{addr}'"))
    }
}
