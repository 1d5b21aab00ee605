use crate::error::{PaymentError, Result};
use std::str::FromStr;
use std::time::Duration;

pub const PRODUCTION_BASE_URL: &str = "https://api.cashfree.com/pg";
pub const SANDBOX_BASE_URL: &str = "https://sandbox.cashfree.com/pg";

const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Which gateway environment orders are created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatewayMode {
    #[default]
    Production,
    Sandbox,
}

impl FromStr for GatewayMode {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "sandbox" | "test" => Ok(Self::Sandbox),
            other => Err(PaymentError::ConfigurationError(format!(
                "Unknown GATEWAY_MODE '{}', expected 'production' or 'sandbox'",
                other
            ))),
        }
    }
}

impl GatewayMode {
    pub fn base_url(&self) -> &'static str {
        match self {
            GatewayMode::Production => PRODUCTION_BASE_URL,
            GatewayMode::Sandbox => SANDBOX_BASE_URL,
        }
    }
}

/// Process-wide gateway configuration.
///
/// Built once at startup and shared read-only with every request. A missing
/// credential fails construction, so request handling never sees a partial
/// configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_version: String,
    pub mode: GatewayMode,
    /// Set when the mode was not configured and production was assumed.
    pub mode_defaulted: bool,
    pub base_url_override: Option<String>,
    /// Fallback for requests that do not carry their own return origin.
    pub public_base_url: Option<String>,
    pub currency: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Returns the raw value for an environment key, if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                PaymentError::ConfigurationError(format!("Missing required setting {}", key))
            })
        };

        let client_id = required("GATEWAY_CLIENT_ID")?;
        let client_secret = required("GATEWAY_CLIENT_SECRET")?;
        let api_version = required("GATEWAY_API_VERSION")?;

        let (mode, mode_defaulted) = match get("GATEWAY_MODE") {
            Some(raw) => (raw.parse()?, false),
            None => (GatewayMode::Production, true),
        };

        let timeout = match get("GATEWAY_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                PaymentError::ConfigurationError(format!(
                    "GATEWAY_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    raw
                ))
            })?,
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            client_id,
            client_secret,
            api_version,
            mode,
            mode_defaulted,
            base_url_override: get("GATEWAY_BASE_URL"),
            public_base_url: get("PUBLIC_BASE_URL"),
            currency: get("GATEWAY_CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            timeout,
        })
    }

    /// The gateway base URL, without a trailing slash.
    pub fn base_url(&self) -> String {
        self.base_url_override
            .as_deref()
            .unwrap_or(self.mode.base_url())
            .trim_end_matches('/')
            .to_string()
    }
}
