//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `MAILSMITH_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `MAILSMITH_` override YAML values
//! 3. **DATABASE_URL** - Special case: switches `database` to an external PostgreSQL database
//! 4. **OPENAI_API_KEY** - Special case: overrides `generation.api_key` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `MAILSMITH_GENERATION__MODEL=gpt-4o-mini` sets the `generation.model` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use mailsmith::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port`
//! - **Database**: `database.type` (`memory` or `external`), `database.url`, `database.pool`
//! - **Security**: `secret_key` (signs session tokens)
//! - **Generation**: `generation.api_key`, `generation.base_url`, `generation.model`, sampling limits
//! - **Authentication**: `auth.jwt_expiry`, `auth.password`, `auth.signup`, `auth.cors`
//! - **Credits**: `credits.initial_credits`
//! - **Features**: `enable_metrics`, `enable_otel_export`

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use url::Url;

use crate::errors::Error;

/// The fixed instruction sent ahead of every user prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a professional email assistant. Write clear, polite, well-formatted emails based on user requests.";

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "MAILSMITH_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have defaults defined in the `Default` implementation. `Debug` output masks every
/// credential so the loaded configuration can be logged.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Set from `DATABASE_URL`; folded into `database` by [`Config::load`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Set from `OPENAI_API_KEY`; folded into `generation.api_key` by [`Config::load`].
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    /// Storage backend - in-process memory or external PostgreSQL
    pub database: DatabaseConfig,
    /// Secret key for session token signing (required)
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    /// Text generation backend configuration
    pub generation: GenerationConfig,
    /// Authentication and sign-up configuration
    pub auth: AuthConfig,
    /// Credit system configuration
    pub credits: CreditsConfig,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Connection pool settings for the PostgreSQL database.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
        }
    }
}

/// Where accounts, balances and the email vault live.
#[derive(Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatabaseConfig {
    /// Keep everything in process memory. Data is lost on shutdown.
    Memory,
    /// Use an external PostgreSQL database. Migrations run on startup.
    External {
        /// Connection string
        url: String,
        #[serde(default)]
        pool: PoolSettings,
    },
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::Memory
    }
}

impl DatabaseConfig {
    pub fn external_url(&self) -> Option<&str> {
        match self {
            DatabaseConfig::Memory => None,
            DatabaseConfig::External { url, .. } => Some(url),
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        match self {
            DatabaseConfig::Memory => PoolSettings::default(),
            DatabaseConfig::External { pool, .. } => pool.clone(),
        }
    }
}

/// OpenAI-compatible chat completion backend.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// API credential. Generation requests fail with 500 while this is unset.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL of the API, including the version segment (e.g. `https://api.openai.com/v1`)
    pub base_url: Url,
    /// Model identifier sent with every request
    pub model: String,
    /// Instruction prepended to every prompt
    pub system_prompt: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// Timeout for a single backend call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Url::parse("https://api.openai.com/v1").expect("static URL is valid"),
            model: "gpt-3.5-turbo".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.7,
            max_tokens: 400,
            timeout: Duration::from_secs(60),
        }
    }
}

impl GenerationConfig {
    /// The API key, if one is configured and non-blank.
    pub fn configured_api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|key| !key.is_empty())
    }
}

const REDACTED: &str = "[REDACTED]";

/// `sk-...abcd` for keys long enough to keep a recognizable prefix and suffix.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 12 {
        return REDACTED.to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// A connection string with its password replaced.
fn mask_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => match url.set_password(Some(REDACTED)) {
            Ok(()) => url.to_string(),
            Err(()) => REDACTED.to_string(),
        },
        Ok(url) => url.to_string(),
        Err(_) => REDACTED.to_string(),
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_deref().map(mask_url))
            .field("openai_api_key", &self.openai_api_key.as_deref().map(mask_key))
            .field("database", &self.database)
            .field("secret_key", &self.secret_key.as_ref().map(|_| REDACTED))
            .field("generation", &self.generation)
            .field("auth", &self.auth)
            .field("credits", &self.credits)
            .field("enable_metrics", &self.enable_metrics)
            .field("enable_otel_export", &self.enable_otel_export)
            .finish()
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseConfig::Memory => f.write_str("Memory"),
            DatabaseConfig::External { url, pool } => f
                .debug_struct("External")
                .field("url", &mask_url(url))
                .field("pool", pool)
                .finish(),
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &self.api_key.as_deref().map(mask_key))
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Session token lifetime
    #[serde(with = "humantime_serde")]
    pub jwt_expiry: Duration,
    /// Password validation rules
    pub password: PasswordConfig,
    /// Sign-up restrictions
    pub signup: SignupConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
}

/// Password validation rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    /// Minimum password length
    pub min_length: usize,
    /// Maximum password length
    pub max_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 6,
            max_length: 128,
        }
    }
}

/// Sign-up restrictions.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignupConfig {
    /// Email domains allowed to register (compared case-insensitively)
    pub allowed_email_domains: Vec<String>,
    /// Allow at most one sign-up per client network address
    pub one_per_address: bool,
    /// Header carrying the client address; the first comma-separated entry is used
    pub address_header: String,
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            allowed_email_domains: vec!["gmail.com".to_string()],
            one_per_address: true,
            address_header: "x-forwarded-for".to_string(),
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Url(Url::parse("http://localhost:3000").expect("static URL is valid"))],
            allow_credentials: true,
            max_age: Some(3600),
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

/// Credit system configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreditsConfig {
    /// Balance provisioned for every new account
    pub initial_credits: i64,
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self { initial_credits: 3 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_url: None,
            openai_api_key: None,
            database: DatabaseConfig::default(),
            secret_key: None,
            generation: GenerationConfig::default(),
            auth: AuthConfig {
                jwt_expiry: Duration::from_secs(24 * 60 * 60),
                ..Default::default()
            },
            credits: CreditsConfig::default(),
            enable_metrics: false,
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // if database_url is set, use it (preserving existing pool settings)
        if let Some(url) = config.database_url.take() {
            let pool = config.database.pool_settings();
            config.database = DatabaseConfig::External { url, pool };
        }

        if let Some(api_key) = config.openai_api_key.take() {
            config.generation.api_key = Some(api_key);
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.secret_key.as_deref().is_none_or(str::is_empty) {
            return Err(Error::Internal {
                operation: "Config validation: secret_key is not configured. \
                     Please set MAILSMITH_SECRET_KEY environment variable or add secret_key to config file."
                    .to_string(),
            });
        }

        let password = &self.auth.password;
        if password.min_length > password.max_length {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid password configuration: min_length ({}) cannot be greater than max_length ({})",
                    password.min_length, password.max_length
                ),
            });
        }

        if password.min_length < 1 {
            return Err(Error::Internal {
                operation: "Config validation: Invalid password configuration: min_length must be at least 1".to_string(),
            });
        }

        // Less than 5 minutes
        if self.auth.jwt_expiry.as_secs() < 300 {
            return Err(Error::Internal {
                operation: "Config validation: JWT expiry duration is too short (minimum 5 minutes)".to_string(),
            });
        }

        // More than 30 days
        if self.auth.jwt_expiry.as_secs() > 86400 * 30 {
            return Err(Error::Internal {
                operation: "Config validation: JWT expiry duration is too long (maximum 30 days)".to_string(),
            });
        }

        if self.auth.signup.allowed_email_domains.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: auth.signup.allowed_email_domains cannot be empty.".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: generation.temperature ({}) must be between 0 and 2",
                    self.generation.temperature
                ),
            });
        }

        if self.generation.max_tokens == 0 {
            return Err(Error::Internal {
                operation: "Config validation: generation.max_tokens must be positive".to_string(),
            });
        }

        if self.credits.initial_credits < 0 {
            return Err(Error::Internal {
                operation: "Config validation: credits.initial_credits cannot be negative".to_string(),
            });
        }

        let cors = &self.auth.cors;
        if cors.allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: CORS allowed_origins cannot be empty. Add at least one allowed origin.".to_string(),
            });
        }

        let has_wildcard = cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("MAILSMITH_").split("__"))
            // Common DATABASE_URL and OPENAI_API_KEY patterns
            .merge(Env::raw().only(&["DATABASE_URL", "OPENAI_API_KEY"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
