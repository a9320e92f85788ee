//! Point-of-sale configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Remote store (both required, otherwise the app runs in local-only mode)
//! - `FIRESTORE_PROJECT_ID` - Google Cloud project that hosts the database
//! - `FIRESTORE_API_KEY` - Web API key for the Firestore REST endpoint
//!
//! ## Optional
//! - `FIRESTORE_DATABASE` - Database name (default: `(default)`)
//! - `FIRESTORE_POLL_INTERVAL_MS` - Subscription refresh interval (default: 2000)
//! - `SMARTSHOP_CACHE_DIR` - Local cache directory (default: `.smartshop`)
//! - `GEMINI_API_KEY` - Generative Language API key for voice commands
//! - `GEMINI_MODEL` - Model used for voice commands (default: `gemini-2.0-flash`)
//! - `BANK_ID`, `BANK_ACCOUNT_NO`, `BANK_ACCOUNT_NAME` - Transfer QR recipient
//! - `BANK_QR_TEMPLATE` - VietQR template (default: `compact`)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_DATABASE: &str = "(default)";
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_CACHE_DIR: &str = ".smartshop";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_QR_TEMPLATE: &str = "compact";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Point-of-sale application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Remote document store, `None` when not configured
    pub remote: Option<RemoteConfig>,
    /// Directory holding the offline cache files
    pub cache_dir: PathBuf,
    /// Voice command classifier, `None` when no API key is set
    pub voice: Option<VoiceConfig>,
    /// Bank account shown on transfer QR codes
    pub bank: Option<BankConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Firestore connection settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct RemoteConfig {
    /// Google Cloud project ID
    pub project_id: String,
    /// Database name within the project
    pub database: String,
    /// Web API key
    pub api_key: SecretString,
    /// How often subscriptions re-read their collection
    pub poll_interval: Duration,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .field("api_key", &"[REDACTED]")
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Voice classifier settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct VoiceConfig {
    pub api_key: SecretString,
    pub model: String,
}

impl std::fmt::Debug for VoiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

/// Bank account used to build transfer QR codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankConfig {
    /// Bank short code (e.g. BIDV, VCB, MB)
    pub bank_id: String,
    pub account_no: String,
    /// Account holder name without diacritics
    pub account_name: String,
    /// VietQR image template (compact, print, `qr_only`)
    pub template: String,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an optional variable is present but invalid,
    /// or if the bank account group is only partially set.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let remote = RemoteConfig::from_env()?;
        let cache_dir = PathBuf::from(get_env_or_default("SMARTSHOP_CACHE_DIR", DEFAULT_CACHE_DIR));
        let voice = VoiceConfig::from_env();
        let bank = BankConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            remote,
            cache_dir,
            voice,
            bank,
            sentry_dsn,
        })
    }

    /// Configuration with no remote store, voice, or bank settings.
    #[must_use]
    pub fn local_only(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote: None,
            cache_dir: cache_dir.into(),
            voice: None,
            bank: None,
            sentry_dsn: None,
        }
    }
}

impl RemoteConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(project_id) = get_usable_env("FIRESTORE_PROJECT_ID") else {
            return Ok(None);
        };
        let Some(api_key) = get_usable_env("FIRESTORE_API_KEY") else {
            return Ok(None);
        };

        let poll_ms = get_env_or_default(
            "FIRESTORE_POLL_INTERVAL_MS",
            &DEFAULT_POLL_INTERVAL_MS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("FIRESTORE_POLL_INTERVAL_MS".to_string(), e.to_string())
        })?;

        Ok(Some(Self {
            project_id,
            database: get_env_or_default("FIRESTORE_DATABASE", DEFAULT_DATABASE),
            api_key: SecretString::from(api_key),
            poll_interval: Duration::from_millis(poll_ms.max(250)),
        }))
    }

    /// Console page that creates the Firestore database.
    #[must_use]
    pub fn setup_link(&self) -> String {
        format!(
            "https://console.cloud.google.com/datastore/setup?project={}",
            self.project_id
        )
    }

    /// Console page that edits the Firestore security rules.
    #[must_use]
    pub fn rules_link(&self) -> String {
        format!(
            "https://console.firebase.google.com/project/{}/firestore/rules",
            self.project_id
        )
    }
}

impl VoiceConfig {
    fn from_env() -> Option<Self> {
        let api_key = get_usable_env("GEMINI_API_KEY")?;
        Some(Self {
            api_key: SecretString::from(api_key),
            model: get_env_or_default("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
        })
    }
}

impl BankConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let bank_id = get_optional_env("BANK_ID");
        let account_no = get_optional_env("BANK_ACCOUNT_NO");
        let account_name = get_optional_env("BANK_ACCOUNT_NAME");

        match (bank_id, account_no, account_name) {
            (None, None, None) => Ok(None),
            (Some(bank_id), Some(account_no), Some(account_name)) => Ok(Some(Self {
                bank_id,
                account_no,
                account_name,
                template: get_env_or_default("BANK_QR_TEMPLATE", DEFAULT_QR_TEMPLATE),
            })),
            (bank_id, account_no, _) => {
                let missing = if bank_id.is_none() {
                    "BANK_ID"
                } else if account_no.is_none() {
                    "BANK_ACCOUNT_NO"
                } else {
                    "BANK_ACCOUNT_NAME"
                };
                Err(ConfigError::MissingEnvVar(missing.to_string()))
            }
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an optional variable, treating placeholder values as unset.
fn get_usable_env(key: &str) -> Option<String> {
    let value = get_optional_env(key)?;
    if is_placeholder(&value) {
        tracing::warn!(variable = key, "ignoring placeholder value");
        return None;
    }
    Some(value)
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Whether a value looks like an unfilled template placeholder.
fn is_placeholder(value: &str) -> bool {
    let lower = value.to_lowercase();
    PLACEHOLDER_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}
