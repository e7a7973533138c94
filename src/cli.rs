//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::DEFAULT_LOOKUP_TIMEOUT;
use crate::db::Database;
use crate::password::{PasswordConfig, PasswordError};
use crate::rate_limit::{
    LOGIN_ATTEMPTS_PER_WINDOW, RATE_LIMIT_WINDOW, REGISTER_ATTEMPTS_PER_WINDOW, RateLimitConfig,
};
use clap::Parser;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Fatal configuration problems detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
    )]
    MissingSecret,
    #[error(
        "JWT secret is shorter than {} characters. Use a longer secret",
        MIN_JWT_SECRET_LENGTH
    )]
    SecretTooShort,
    #[error("Failed to read JWT secret file {path}: {source}")]
    SecretFileUnreadable {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid password hashing parameters: {0}")]
    InvalidHashParams(#[from] PasswordError),
    #[error("Invalid CORS origin: {0}")]
    InvalidCorsOrigin(String),
}

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "Liftgate", about = "Authentication service for the workout tracker")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file (":memory:" for a throwaway database)
    #[arg(short, long, default_value = "liftgate.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Registration attempts allowed per client per hour
    #[arg(long, default_value_t = REGISTER_ATTEMPTS_PER_WINDOW)]
    pub register_limit: usize,

    /// Login attempts allowed per client per hour
    #[arg(long, default_value_t = LOGIN_ATTEMPTS_PER_WINDOW)]
    pub login_limit: usize,

    /// Argon2 memory cost in KiB
    #[arg(long, default_value_t = PasswordConfig::default().memory_kib)]
    pub hash_memory_kib: u32,

    /// Argon2 iterations
    #[arg(long, default_value_t = PasswordConfig::default().iterations)]
    pub hash_iterations: u32,

    /// Argon2 parallelism
    #[arg(long, default_value_t = PasswordConfig::default().parallelism)]
    pub hash_parallelism: u32,

    /// Upper bound on a single user lookup, in milliseconds
    #[arg(long, default_value_t = DEFAULT_LOOKUP_TIMEOUT.as_millis() as u64)]
    pub lookup_timeout_ms: u64,

    /// Allowed CORS origin (repeatable). Any origin is allowed when omitted
    #[arg(long = "cors-origin")]
    pub cors_origins: Vec<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
/// Verbosity follows `RUST_LOG`, defaulting to `info`.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Result<String, ConfigError> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        std::fs::read_to_string(path)
            .map_err(|source| ConfigError::SecretFileUnreadable {
                path: path.to_string(),
                source,
            })?
            .trim()
            .to_string()
    } else {
        return Err(ConfigError::MissingSecret);
    };

    check_secret_length(&secret)?;
    Ok(secret)
}

fn check_secret_length(secret: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::SecretTooShort);
    }
    Ok(())
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        rate_limits: RateLimitConfig {
            window: RATE_LIMIT_WINDOW,
            register_limit: args.register_limit,
            login_limit: args.login_limit,
        },
        password: PasswordConfig {
            memory_kib: args.hash_memory_kib,
            iterations: args.hash_iterations,
            parallelism: args.hash_parallelism,
        },
        lookup_timeout: Duration::from_millis(args.lookup_timeout_ms),
        cors_origins: args.cors_origins.clone(),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
