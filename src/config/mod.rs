use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::api::session::parse_duration_ms;

/// Errors raised while validating a loaded configuration.
///
/// Every variant is fatal: the server refuses to start until it is fixed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("auth.jwt_secret is required (set it in the config file or LEADGEN_JWT_SECRET)")]
    MissingJwtSecret,
    #[error("auth.jwt_secret must be at least 32 characters")]
    WeakJwtSecret,
    #[error("auth.token_lifetime is invalid: {0:?}")]
    InvalidTokenLifetime(String),
    #[error("uploads.s3.bucket is required when uploads.storage = \"s3\"")]
    MissingS3Bucket,
    #[error("uploads.max_file_size must be greater than zero")]
    InvalidUploadLimit,
    #[error("email.notify_address is required when email.smtp_host is set")]
    MissingNotifyAddress,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Enables production behaviour such as `Secure` session cookies
    #[serde(default)]
    pub production: bool,
    /// Public base URL of the site, used in links inside e-mails
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Origins allowed by CORS; empty means same-origin only
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            production: false,
            public_url: default_public_url(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_public_url() -> String {
    "http://localhost:5000".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret for session tokens
    #[serde(default)]
    pub jwt_secret: String,
    /// Token lifetime, e.g. "7d", "12h" or a bare day count
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime: String,
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
    /// Bootstrap admin password. A random one is generated and logged once
    /// when this is unset and no admin exists yet.
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_lifetime: default_token_lifetime(),
            admin_email: default_admin_email(),
            admin_name: default_admin_name(),
            admin_password: None,
        }
    }
}

fn default_token_lifetime() -> String {
    "7d".to_string()
}

fn default_admin_email() -> String {
    "admin@lead.online".to_string()
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: bool,
    pub from_address: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Sales inbox that receives new-lead notifications
    pub notify_address: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            smtp_tls: default_smtp_tls(),
            from_address: None,
            from_name: default_from_name(),
            notify_address: None,
        }
    }
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.from_address.is_some()
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> bool {
    true
}

fn default_from_name() -> String {
    "LeadGenPro".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    /// Directory for the local store (default: <data_dir>/uploads)
    pub local_dir: Option<PathBuf>,
    /// Per-file limit in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
    #[serde(default)]
    pub s3: Option<S3Config>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            storage: default_storage_kind(),
            local_dir: None,
            max_file_size: default_max_file_size(),
            allowed_mime_types: default_allowed_mime_types(),
            s3: None,
        }
    }
}

impl UploadConfig {
    pub fn local_dir(&self, data_dir: &Path) -> PathBuf {
        self.local_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("uploads"))
    }

    pub fn is_allowed(&self, mime: &str) -> bool {
        let mime = mime.trim().to_ascii_lowercase();
        self.allowed_mime_types.iter().any(|m| m == &mime)
    }
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

fn default_max_file_size() -> usize {
    10 * 1024 * 1024
}

fn default_allowed_mime_types() -> Vec<String> {
    [
        "application/pdf",
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "text/plain",
        "text/csv",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "application/vnd.ms-excel",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...)
    pub endpoint: Option<String>,
    #[serde(default = "default_s3_prefix")]
    pub prefix: String,
    /// Base URL used to build public links; defaults to the bucket URL
    pub public_url: Option<String>,
}

fn default_s3_region() -> String {
    "eu-central-1".to_string()
}

fn default_s3_prefix() -> String {
    "leads/".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_requests")]
    pub api_requests_per_window: u32,
    #[serde(default = "default_intake_requests")]
    pub intake_requests_per_window: u32,
    #[serde(default = "default_auth_requests")]
    pub auth_requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_requests_per_window: default_api_requests(),
            intake_requests_per_window: default_intake_requests(),
            auth_requests_per_window: default_auth_requests(),
            window_seconds: default_window_seconds(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_api_requests() -> u32 {
    100
}

fn default_intake_requests() -> u32 {
    10
}

fn default_auth_requests() -> u32 {
    20
}

fn default_window_seconds() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Match customer leads by company name against the e-mail local part
    /// when a lead has no customer id. Only meant for records created before
    /// customer ids existed.
    #[serde(default = "default_true")]
    pub legacy_company_match: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            legacy_company_match: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between logged request summaries
    #[serde(default = "default_summary_interval")]
    pub summary_interval: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            summary_interval: default_summary_interval(),
        }
    }
}

fn default_summary_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load the config file (if present), apply `LEADGEN_*` overrides and
    /// validate the result.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Overlay environment variables. The lookup is injected so tests do not
    /// have to touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LEADGEN_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Some(v) = lookup("LEADGEN_TOKEN_LIFETIME") {
            self.auth.token_lifetime = v;
        }
        if let Some(v) = lookup("LEADGEN_ADMIN_EMAIL") {
            self.auth.admin_email = v;
        }
        if let Some(v) = lookup("LEADGEN_ADMIN_PASSWORD") {
            self.auth.admin_password = Some(v);
        }
        if let Some(v) = lookup("LEADGEN_PRODUCTION") {
            self.server.production = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup("LEADGEN_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = v;
        }
        if let Some(v) = lookup("LEADGEN_DATA_DIR") {
            self.server.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("LEADGEN_SMTP_HOST") {
            self.email.smtp_host = Some(v);
        }
        if let Some(v) = lookup("LEADGEN_SMTP_USERNAME") {
            self.email.smtp_username = Some(v);
        }
        if let Some(v) = lookup("LEADGEN_SMTP_PASSWORD") {
            self.email.smtp_password = Some(v);
        }
        if let Some(v) = lookup("LEADGEN_S3_BUCKET") {
            self.uploads
                .s3
                .get_or_insert_with(|| S3Config {
                    bucket: String::new(),
                    region: default_s3_region(),
                    endpoint: None,
                    prefix: default_s3_prefix(),
                    public_url: None,
                })
                .bucket = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }
        if self.auth.jwt_secret.len() < 32 {
            return Err(ConfigError::WeakJwtSecret);
        }
        if parse_duration_ms(&self.auth.token_lifetime).is_none() {
            return Err(ConfigError::InvalidTokenLifetime(
                self.auth.token_lifetime.clone(),
            ));
        }
        if self.uploads.max_file_size == 0 {
            return Err(ConfigError::InvalidUploadLimit);
        }
        if self.uploads.storage == StorageKind::S3 {
            let has_bucket = self
                .uploads
                .s3
                .as_ref()
                .map(|s3| !s3.bucket.trim().is_empty())
                .unwrap_or(false);
            if !has_bucket {
                return Err(ConfigError::MissingS3Bucket);
            }
        }
        if self.email.smtp_host.is_some() && self.email.notify_address.is_none() {
            return Err(ConfigError::MissingNotifyAddress);
        }
        Ok(())
    }

    /// Token lifetime in milliseconds. Only valid after `validate`.
    pub fn token_lifetime_ms(&self) -> u64 {
        parse_duration_ms(&self.auth.token_lifetime).unwrap_or(7 * 24 * 60 * 60 * 1000)
    }
}
