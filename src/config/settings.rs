//! Application settings loaded from `config.toml`.
//!
//! Every section is optional; missing keys fall back to the defaults below so a
//! bare checkout runs against a local `SQLite` file. A few values can be
//! overridden from the environment (`DATABASE_URL`, `HOST`, `PORT`). The Stripe
//! secret key is deliberately absent: it is read from `STRIPE_SECRET_KEY` right
//! before the gateway is built.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "ECOMMERCE_CONFIG";

/// Root of config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub stripe: StripeSettings,
    pub email: EmailSettings,
    pub uploads: UploadSettings,
}

/// `[server]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS (the storefront dev servers by default)
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
                "http://localhost:5173".to_string(),
            ],
        }
    }
}

/// `[database]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

/// `[stripe]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StripeSettings {
    /// Base URL of the Stripe REST API
    pub api_base: String,
    /// Currency for direct charges and checkout sessions when the request gives none
    pub currency: String,
    /// Payment method confirmed server-side for direct charges
    pub payment_method: String,
}

impl Default for StripeSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.stripe.com".to_string(),
            currency: "usd".to_string(),
            payment_method: "pm_card_visa".to_string(),
        }
    }
}

/// `[email]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub from: String,
    pub from_name: String,
    /// Store name used in subjects and footers
    pub store_name: String,
    /// Currency label printed next to amounts
    pub currency_label: String,
    /// Link behind the "track my order" button
    pub storefront_url: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            from: "no-reply@techstore.com".to_string(),
            from_name: "TechStore".to_string(),
            store_name: "TechStore".to_string(),
            currency_label: "TND".to_string(),
            storefront_url: "http://localhost:3000".to_string(),
        }
    }
}

/// `[uploads]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Directory product images are written to and served from
    pub dir: PathBuf,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
        }
    }
}

/// Parses a config file.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })
}

/// Parses config.toml contents.
pub fn parse_config(contents: &str) -> std::result::Result<AppConfig, toml::de::Error> {
    toml::from_str(contents)
}

/// Loads the configuration the server starts with.
///
/// Reads the file named by `ECOMMERCE_CONFIG` (default `config.toml`). A missing
/// default file is not an error: defaults are used instead. Environment
/// overrides are applied last.
pub fn load_app_configuration() -> Result<AppConfig> {
    let explicit = std::env::var(CONFIG_PATH_ENV).ok();
    let path = PathBuf::from(explicit.as_deref().unwrap_or("config.toml"));

    let mut config = if path.exists() {
        let config = load_config(&path)?;
        info!("Loaded configuration from {}", path.display());
        config
    } else if explicit.is_some() {
        return Err(Error::Config {
            message: format!("Config file {} does not exist", path.display()),
        });
    } else {
        warn!("No config.toml found, using defaults");
        AppConfig::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Applies `DATABASE_URL`, `HOST` and `PORT` on top of the file values.
fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(host) = lookup("HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("PORT") {
        config.server.port = port.parse().map_err(|e| Error::Config {
            message: format!("PORT must be a port number, got {port:?}: {e}"),
        })?;
    }
    Ok(())
}
