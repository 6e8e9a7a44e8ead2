//! Configuration for the progression core

use serde::{Deserialize, Serialize};

/// Credentials for the external payment provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub secret_key: String,
    pub webhook_secret: String,

    /// ISO currency code charged at checkout
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl PaymentConfig {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            currency: default_currency(),
        }
    }
}

/// Database pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL (MySQL/TiDB or SQLite)
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Enable SQL statement logging
    #[serde(default)]
    pub sql_logging: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            sql_logging: false,
        }
    }
}

/// Process-wide configuration. Read-only after start-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,

    /// Public site URL, used to recognise absolute upload URLs
    #[serde(default)]
    pub site_url: String,

    /// Root of the date-sharded upload directory
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,

    /// Price of one credit in cents
    #[serde(default = "default_credit_price_cents")]
    pub credit_price_cents: i32,

    /// Monthly free-credit ceiling for regular users
    #[serde(default = "default_regular_free_credits")]
    pub regular_free_credits: i32,

    /// Monthly free-credit ceiling for educators
    #[serde(default = "default_educator_free_credits")]
    pub educator_free_credits: i32,

    #[serde(default = "default_min_credits_per_purchase")]
    pub min_credits_per_purchase: i32,

    #[serde(default = "default_max_credits_per_purchase")]
    pub max_credits_per_purchase: i32,

    /// Pending and failed purchases older than this are deleted
    #[serde(default = "default_stale_purchase_days")]
    pub stale_purchase_days: i64,

    /// `None` disables the purchase path
    #[serde(default)]
    pub payments: Option<PaymentConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            site_url: String::new(),
            uploads_dir: default_uploads_dir(),
            credit_price_cents: default_credit_price_cents(),
            regular_free_credits: default_regular_free_credits(),
            educator_free_credits: default_educator_free_credits(),
            min_credits_per_purchase: default_min_credits_per_purchase(),
            max_credits_per_purchase: default_max_credits_per_purchase(),
            stale_purchase_days: default_stale_purchase_days(),
            payments: None,
        }
    }
}

impl Config {
    /// Monthly free-credit ceiling for a user class.
    pub fn free_credit_ceiling(&self, is_educator: bool) -> i32 {
        if is_educator {
            self.educator_free_credits
        } else {
            self.regular_free_credits
        }
    }

    pub fn payments_enabled(&self) -> bool {
        self.payments.is_some()
    }
}

fn default_currency() -> String {
    "nzd".to_string()
}

fn default_max_connections() -> u32 {
    50
}

fn default_min_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_uploads_dir() -> String {
    "uploads".to_string()
}

fn default_credit_price_cents() -> i32 {
    35
}

fn default_regular_free_credits() -> i32 {
    10
}

fn default_educator_free_credits() -> i32 {
    50
}

fn default_min_credits_per_purchase() -> i32 {
    3
}

fn default_max_credits_per_purchase() -> i32 {
    1000
}

fn default_stale_purchase_days() -> i64 {
    7
}
