use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::gateway::GatewayConfig;

pub mod cors;
pub mod urls;

const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 20;
const DEFAULT_PENDING_GRACE_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub app_base_url: String,
    pub gateway: GatewayConfig,
    pub pending_grace_minutes: i64,
    pub cors_allowed_origins: Option<String>,
    pub log_request_body: bool,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let timeout_secs = positive_or_default(
            "WALLET_TIMEOUT_SECS",
            env::var("WALLET_TIMEOUT_SECS").ok(),
            DEFAULT_GATEWAY_TIMEOUT_SECS,
        )?;

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: required("DATABASE_URL")?,
            app_base_url: required("APP_BASE_URL")?,
            gateway: GatewayConfig {
                base_url: required("WALLET_BASE_URL")?,
                username: required("WALLET_USERNAME")?,
                password: required("WALLET_PASSWORD")?,
                app_key: required("WALLET_APP_KEY")?,
                app_secret: required("WALLET_APP_SECRET")?,
                merchant_number: env::var("WALLET_MERCHANT_NUMBER").unwrap_or_default(),
                timeout: Duration::from_secs(timeout_secs),
            },
            pending_grace_minutes: positive_or_default(
                "PENDING_GRACE_MINUTES",
                env::var("PENDING_GRACE_MINUTES").ok(),
                DEFAULT_PENDING_GRACE_MINUTES,
            )?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            log_request_body: env::var("LOG_REQUEST_BODY")
                .map(|raw| raw.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            log_format: parse_log_format(&env::var("LOG_FORMAT").unwrap_or_default()),
        })
    }

    pub fn pending_grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.pending_grace_minutes)
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{} must be set", name))
}

/// Parses a whole-number setting that must be greater than zero.
fn positive_or_default<T>(name: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<T>()
        .with_context(|| format!("{} must be a whole number", name))?;
    if value <= T::default() {
        anyhow::bail!("{} must be greater than zero", name);
    }
    Ok(value)
}

fn parse_log_format(raw: &str) -> LogFormat {
    if raw.trim().eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    }
}
