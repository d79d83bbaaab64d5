use crate::crypto::CipherKind;
use crate::error::AppError;

pub const DEFAULT_ENCRYPTION_KEY: &str = "default-key-change-in-production";

#[derive(Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub request_timeout_secs: u64,
    pub encryption_key: String,
    pub privacy_cipher: CipherKind,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_sweep_secs: u64,
    pub chat_history_limit: i64,
    pub admin_password_hash: Option<String>,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(name: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_or(name, default)
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e)))
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let encryption_key = match std::env::var("ENCRYPTION_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => {
                tracing::warn!("ENCRYPTION_KEY not set, private messages use the default key");
                DEFAULT_ENCRYPTION_KEY.to_string()
            }
        };

        Ok(Config {
            server_host: env_or("SERVER_HOST", "127.0.0.1"),
            server_port: parse_env("SERVER_PORT", "8080")?,
            database_url: env_or("DATABASE_URL", "sqlite://dashboard_chat.db?mode=rwc"),
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", "20")?,
            db_min_connections: parse_env("DB_MIN_CONNECTIONS", "5")?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", "30")?,
            encryption_key,
            privacy_cipher: parse_env("PRIVACY_CIPHER", "xor")?,
            rate_limit_max: parse_env("RATE_LIMIT_MAX", "10")?,
            rate_limit_window_secs: parse_env("RATE_LIMIT_WINDOW_SECS", "60")?,
            rate_limit_sweep_secs: parse_env("RATE_LIMIT_SWEEP_SECS", "300")?,
            chat_history_limit: parse_env("CHAT_HISTORY_LIMIT", "100")?,
            admin_password_hash: std::env::var("ADMIN_PASSWORD_HASH")
                .ok()
                .filter(|hash| !hash.is_empty()),
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            db_min_connections: 1,
            request_timeout_secs: 30,
            encryption_key: DEFAULT_ENCRYPTION_KEY.to_string(),
            privacy_cipher: CipherKind::Xor,
            rate_limit_max: 10,
            rate_limit_window_secs: 60,
            rate_limit_sweep_secs: 300,
            chat_history_limit: 100,
            admin_password_hash: None,
        }
    }
}
