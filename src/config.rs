// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup; nothing is
//! re-read after boot.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `LUMA_DB_PATH` | Path to the embedded database file | `luma.redb` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LUMA_ACCESS_SECRET` | HMAC secret for access tokens | Required |
//! | `LUMA_REFRESH_SECRET` | HMAC secret for refresh tokens | Required |
//! | `LUMA_ACCESS_TTL_SECS` | Access token lifetime | `3600` |
//! | `LUMA_ACCESS_REMEMBER_TTL_SECS` | Access lifetime with remember-me | `2592000` |
//! | `LUMA_REFRESH_TTL_SECS` | Refresh token lifetime | `604800` |
//! | `LUMA_REFRESH_REMEMBER_TTL_SECS` | Refresh lifetime with remember-me | `5184000` |
//! | `REDIS_URL` | Revocation blacklist endpoint | Optional (blacklist disabled) |
//! | `TOKEN_SWEEP_INTERVAL_SECS` | Interval between expired-token sweeps | `86400` |
//! | `TOKEN_SWEEP_GRACE_SECS` | How long expired rows are kept for audit | `604800` |
//! | `LUMA_ENV` | `development` exposes internal error detail | `production` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::path::PathBuf;

use crate::auth::TokenTtls;

/// Errors surfaced while reading the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),
    #[error("environment variable {0} has an invalid value")]
    InvalidVar(&'static str),
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub access_secret: String,
    pub refresh_secret: String,
    pub token_ttls: TokenTtls,
    /// Revocation blacklist endpoint; `None` disables the blacklist
    pub redis_url: Option<String>,
    pub sweep_interval_secs: u64,
    pub sweep_grace_secs: i64,
    pub development: bool,
    pub log_json: bool,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let access_secret = required("LUMA_ACCESS_SECRET")?;
        let refresh_secret = required("LUMA_REFRESH_SECRET")?;

        let defaults = TokenTtls::default();
        let token_ttls = TokenTtls {
            access_secs: parsed("LUMA_ACCESS_TTL_SECS", defaults.access_secs)?,
            access_remember_secs: parsed(
                "LUMA_ACCESS_REMEMBER_TTL_SECS",
                defaults.access_remember_secs,
            )?,
            refresh_secs: parsed("LUMA_REFRESH_TTL_SECS", defaults.refresh_secs)?,
            refresh_remember_secs: parsed(
                "LUMA_REFRESH_REMEMBER_TTL_SECS",
                defaults.refresh_remember_secs,
            )?,
        };

        Ok(Self {
            db_path: env::var("LUMA_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("luma.redb")),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parsed("PORT", 8080)?,
            access_secret,
            refresh_secret,
            token_ttls,
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            sweep_interval_secs: parsed("TOKEN_SWEEP_INTERVAL_SECS", 86_400)?,
            sweep_grace_secs: parsed("TOKEN_SWEEP_GRACE_SECS", 604_800)?,
            development: env::var("LUMA_ENV")
                .map(|v| v.eq_ignore_ascii_case("development"))
                .unwrap_or(false),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar(name)),
        Err(_) => Ok(default),
    }
}
