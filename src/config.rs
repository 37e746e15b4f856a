//!
//! src/config.rs
//!
//! Builds the application configuration from environment variables
//! (and a .env file when present)
//!

use std::{net::SocketAddr, time};
use url::Url;

use crate::errors::CatalogError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 16;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/catalog.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Variable lookup used by every builder. `load_config` reads the process
/// environment, tests hand in a map.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Returns the variable or a config error naming it
fn env_check(env: Lookup, s: &str) -> Result<String, CatalogError> {
    match env(s) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CatalogError::Config(format!("{s} was not set"))),
    }
}

fn env_or(env: Lookup, s: &str, default: &str) -> String {
    env(s)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_to_u64(env: Lookup, s: &str, default: u64) -> Result<u64, CatalogError> {
    match env(s) {
        Some(v) if !v.trim().is_empty() => v.trim().parse::<u64>()
            .map_err(|e| CatalogError::Config(format!("{s} invalid: {e}"))),
        _ => Ok(default),
    }
}

fn ensure_http(url: &Url) -> Result<(), String> {
    match url.scheme() {
        "https" | "http" => Ok(()),
        other => Err(format!("URL must be http(s), got {other}: {url}")),
    }
}

///
/// Metadata provider (ACRCloud) endpoint and credential
///
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub endpoint: Url,
    pub api_key: String,
}

fn build_provider(env: Lookup) -> Result<ProviderConfig, CatalogError> {
    let endpoint = env_check(env, "ACR_CLOUD_API_ENDPOINT")?;
    let api_key  = env_check(env, "ACR_CLOUD_API_KEY")?;

    let endpoint = Url::parse(&endpoint)
        .map_err(|e| CatalogError::Config(
            format!("ACR_CLOUD_API_ENDPOINT invalid {e}")
        ))?;
    ensure_http(&endpoint).map_err(CatalogError::Config)?;

    Ok( ProviderConfig { endpoint, api_key } )
}

///
/// Configuration for the outbound http client
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
        }
    }
}

fn build_http(env: Lookup) -> Result<HttpConfig, CatalogError> {
    let timeout = env_to_u64(env, "PROVIDER_TIMEOUT_MS", HTTP_TIMEOUT)?;
    let connect = env_to_u64(env, "PROVIDER_CONNECT_TIMEOUT_MS", HTTP_CONNECT_TIMEOUT)?;
    Ok( HttpConfig {
        timeout: time::Duration::from_millis(timeout),
        connect_timeout: time::Duration::from_millis(connect),
        ..HttpConfig::default()
    })
}

///
/// Configuration for the sqlite catalog
///
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub db_url: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { db_url: DEFAULT_DATABASE_URL.to_string() }
    }
}

///
/// Token signing. The secret is never printed by Debug.
///
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl: time::Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

fn build_auth(env: Lookup) -> Result<AuthConfig, CatalogError> {
    let jwt_secret = env_check(env, "JWT_ACCESS_TOKEN_SECRET")?;
    let ttl = env_to_u64(env, "JWT_ACCESS_TOKEN_EXPIRATION_TIME", DEFAULT_TOKEN_TTL_SECS)?;
    if ttl == 0 {
        return Err(CatalogError::Config(
            "JWT_ACCESS_TOKEN_EXPIRATION_TIME must be positive".to_string()
        ));
    }
    Ok( AuthConfig { jwt_secret, token_ttl: time::Duration::from_secs(ttl) } )
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

fn build_server(env: Lookup) -> Result<ServerConfig, CatalogError> {
    let raw = env_or(env, "BIND_ADDR", DEFAULT_BIND_ADDR);
    let bind_addr = raw.parse::<SocketAddr>()
        .map_err(|e| CatalogError::Config(format!("BIND_ADDR invalid {e}")))?;
    Ok( ServerConfig { bind_addr } )
}

///
/// Configuration for Logger
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,track_resolver=debug,sqlx=warn,reqwest=warn".to_string(),
            format: LogFormat::Json,
            with_ansi: true,
            include_file_line: true,
            include_target: true,
        }
    }
}

fn build_logging(env: Lookup) -> Result<LoggingConfig, CatalogError> {
    let format = match env_or(env, "LOG_FORMAT", "json").to_ascii_lowercase().as_str() {
        "json"   => LogFormat::Json,
        "pretty" => LogFormat::Pretty,
        other    => return Err(CatalogError::Config(
            format!("LOG_FORMAT must be json or pretty, got {other}")
        )),
    };
    Ok( LoggingConfig { format, ..LoggingConfig::default() } )
}

///
/// AppConfig which holds everything the service needs at startup
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub http: HttpConfig,
    pub persistence: PersistenceConfig,
    pub auth: AuthConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig
}

/// Builds the config from an arbitrary variable lookup
pub fn load_config_with(env: Lookup) -> Result<AppConfig, CatalogError> {
    let provider    = build_provider(env)?;
    let http        = build_http(env)?;
    let persistence = PersistenceConfig {
        db_url: env_or(env, "DATABASE_URL", DEFAULT_DATABASE_URL),
    };
    let auth        = build_auth(env)?;
    let server      = build_server(env)?;
    let logging     = build_logging(env)?;

    Ok( AppConfig { provider, http, persistence, auth, server, logging } )
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, CatalogError> {
    dotenvy::dotenv().ok();
    load_config_with(&|s: &str| std::env::var(s).ok())
}

/// Only the database is needed to seed users, so this skips the provider
/// and token settings
pub fn load_persistence() -> PersistenceConfig {
    dotenvy::dotenv().ok();
    let env = |s: &str| std::env::var(s).ok();
    PersistenceConfig { db_url: env_or(&env, "DATABASE_URL", DEFAULT_DATABASE_URL) }
}
