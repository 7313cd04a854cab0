// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use config::{Config as ConfigFile, File, Environment};

/// Central configuration for the marketplace server
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub server_addr: String,

    pub session: SessionConfig,
    pub checkout: CheckoutConfig,
    pub payment: PaymentConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle lifetime of a session, seconds. Also used as the cookie max-age.
    pub ttl_secs: i64,
    /// How often the background sweep evicts idle sessions, seconds.
    pub sweep_interval_secs: u64,
    /// Whether the session cookie is marked Secure.
    pub cookie_secure: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Sales tax applied to the cart subtotal. Zero means untaxed.
    pub tax_rate: f64,
    pub currency: String,
    /// Where the payment provider sends the buyer after completion/abandonment.
    pub success_url: String,
    pub cancel_url: String,
    /// Pending orders older than this are discarded, seconds.
    pub pending_ttl_secs: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Base URL of the hosted-checkout provider API.
    pub api_base: String,
    /// Timeout for outbound payment calls, seconds.
    pub timeout_secs: u64,
    /// Shared secret for webhook signatures; empty disables verification.
    pub webhook_secret: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8081".to_string(),

            session: SessionConfig {
                ttl_secs: 1800,
                sweep_interval_secs: 300,
                cookie_secure: true,
            },
            checkout: CheckoutConfig {
                tax_rate: 0.0,
                currency: "usd".to_string(),
                success_url: "http://localhost:3000/checkout_success".to_string(),
                cancel_url: "http://localhost:3000/checkout_cancel".to_string(),
                pending_ttl_secs: 3600,
            },
            payment: PaymentConfig {
                api_base: "https://payments.example.com".to_string(),
                timeout_secs: 10,
                webhook_secret: String::new(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        // Build configuration
        let config = ConfigFile::builder()
            // Start with defaults
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add environment specific config
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            // Add a local config file for local overrides
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables with prefix "APP"
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Build and deserialize
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from environment variables directly (backward compatibility)
    pub fn from_env() -> Self {
        // Try to load from file first
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let defaults = Self::default();

                let server_addr = env::var("SERVER_ADDR")
                    .unwrap_or(defaults.server_addr);

                let session_ttl_secs = env::var("SESSION_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(defaults.session.ttl_secs);

                let sweep_interval_secs = env::var("SESSION_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(defaults.session.sweep_interval_secs);

                let cookie_secure = env::var("SESSION_COOKIE_SECURE")
                    .map(|v| v.to_lowercase() == "true")
                    .unwrap_or(defaults.session.cookie_secure);

                let tax_rate = env::var("CHECKOUT_TAX_RATE")
                    .ok()
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(defaults.checkout.tax_rate);

                let currency = env::var("CHECKOUT_CURRENCY")
                    .unwrap_or(defaults.checkout.currency);

                let success_url = env::var("CHECKOUT_SUCCESS_URL")
                    .unwrap_or(defaults.checkout.success_url);

                let cancel_url = env::var("CHECKOUT_CANCEL_URL")
                    .unwrap_or(defaults.checkout.cancel_url);

                let pending_ttl_secs = env::var("CHECKOUT_PENDING_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(defaults.checkout.pending_ttl_secs);

                let api_base = env::var("PAYMENT_API_BASE")
                    .unwrap_or(defaults.payment.api_base);

                let timeout_secs = env::var("PAYMENT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(defaults.payment.timeout_secs);

                let webhook_secret = env::var("PAYMENT_WEBHOOK_SECRET")
                    .unwrap_or(defaults.payment.webhook_secret);

                Self {
                    server_addr,
                    session: SessionConfig {
                        ttl_secs: session_ttl_secs,
                        sweep_interval_secs,
                        cookie_secure,
                    },
                    checkout: CheckoutConfig {
                        tax_rate,
                        currency,
                        success_url,
                        cancel_url,
                        pending_ttl_secs,
                    },
                    payment: PaymentConfig {
                        api_base,
                        timeout_secs,
                        webhook_secret,
                    },
                }
            }
        }
    }
}
