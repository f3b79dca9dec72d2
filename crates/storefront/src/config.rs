//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `HILO_API_BASE_URL` - Base URL of the backend cart service
//! - `HILO_API_TOKEN` - Bearer token for the cart service (high entropy)
//! - `HILO_GATEWAY_BASE_URL` - Base URL of the payment gateway functions
//! - `HILO_GATEWAY_TOKEN` - Bearer token for the gateway (high entropy)
//! - `HILO_RETURN_URL` - URL the gateway redirects back to after payment
//!
//! ## Optional
//! - `HILO_STORAGE_DIR` - Directory for the durable client store (default: .hilo)
//! - `HILO_CURRENCY` - ISO 4217 currency code (default: COP)
//! - `HILO_STATUS_POLL_SECS` - Payment status poll interval (default: 2)

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use hilo_core::CurrencyCode;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
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
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront engine configuration.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// Base URL of the backend cart service
    pub api_base_url: Url,
    /// Bearer token for the backend cart service
    pub api_token: SecretString,
    /// Base URL of the payment gateway
    pub gateway_base_url: Url,
    /// Bearer token for the payment gateway
    pub gateway_token: SecretString,
    /// URL the gateway redirects back to after payment
    pub return_url: Url,
    /// Directory backing the durable client store
    pub storage_dir: PathBuf,
    /// Currency all cart math is performed in
    pub currency: CurrencyCode,
    /// Interval between payment status polls
    pub status_poll_interval: Duration,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("api_token", &"[REDACTED]")
            .field("gateway_base_url", &self.gateway_base_url.as_str())
            .field("gateway_token", &"[REDACTED]")
            .field("return_url", &self.return_url.as_str())
            .field("storage_dir", &self.storage_dir)
            .field("currency", &self.currency)
            .field("status_poll_interval", &self.status_poll_interval)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = get_url("HILO_API_BASE_URL")?;
        let api_token = get_validated_secret("HILO_API_TOKEN")?;
        let gateway_base_url = get_url("HILO_GATEWAY_BASE_URL")?;
        let gateway_token = get_validated_secret("HILO_GATEWAY_TOKEN")?;
        let return_url = get_url("HILO_RETURN_URL")?;
        let storage_dir = PathBuf::from(get_env_or_default("HILO_STORAGE_DIR", ".hilo"));
        let currency = match get_env_or_default("HILO_CURRENCY", "COP").as_str() {
            "COP" => CurrencyCode::COP,
            "USD" => CurrencyCode::USD,
            "EUR" => CurrencyCode::EUR,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "HILO_CURRENCY".to_string(),
                    format!("unsupported currency: {other}"),
                ));
            }
        };
        let status_poll_interval = get_env_or_default("HILO_STATUS_POLL_SECS", "2")
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| {
                ConfigError::InvalidEnvVar("HILO_STATUS_POLL_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            api_base_url,
            api_token,
            gateway_base_url,
            gateway_token,
            return_url,
            storage_dir,
            currency,
            status_poll_interval,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable parsed as a URL.
fn get_url(key: &str) -> Result<Url, ConfigError> {
    let value = get_required_env(key)?;
    Url::parse(&value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real tokens have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        // High-entropy random string
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = StorefrontConfig {
            api_base_url: Url::parse("https://api.hilo.test").unwrap(),
            api_token: SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6"),
            gateway_base_url: Url::parse("https://pay.hilo.test").unwrap(),
            gateway_token: SecretString::from("zQ8#mW2!pL6@rT4$nK9&vB1*xC5^dF3"),
            return_url: Url::parse("https://hilo.test/payment-pending").unwrap(),
            storage_dir: PathBuf::from(".hilo"),
            currency: CurrencyCode::COP,
            status_poll_interval: Duration::from_secs(2),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("api.hilo.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("aB3$xY9"));
        assert!(!debug_output.contains("zQ8#mW2"));
    }
}
