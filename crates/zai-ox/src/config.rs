use bon::Builder;
use std::{collections::HashMap, time::Duration};

use crate::error::ZaiError;

pub const DEFAULT_BASE_URL: &str = "https://chat.z.ai";
/// Connect and idle-read timeout for the upstream stream
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Process-wide configuration, built once and handed to the client
#[derive(Debug, Clone, Builder)]
pub struct Settings {
    /// Upstream base URL
    #[builder(default = DEFAULT_BASE_URL.to_string(), into)]
    pub base_url: String,

    /// Caller model name to upstream model name
    #[builder(default)]
    pub models_mapping: HashMap<String, String>,

    /// Base headers sent with every upstream request
    #[builder(default)]
    pub headers: HashMap<String, String>,

    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Settings {
    /// Read settings from `ZAI_BASE_URL`, `ZAI_MODELS_MAPPING` (JSON object),
    /// `ZAI_HEADERS` (JSON object) and `ZAI_TIMEOUT_SECS`. Unset variables keep defaults.
    pub fn from_env() -> Result<Self, ZaiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ZaiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(base_url) = lookup("ZAI_BASE_URL") {
            settings.base_url = base_url;
        }

        if let Some(raw) = lookup("ZAI_MODELS_MAPPING") {
            settings.models_mapping = parse_map("ZAI_MODELS_MAPPING", &raw)?;
        }

        if let Some(raw) = lookup("ZAI_HEADERS") {
            settings.headers = parse_map("ZAI_HEADERS", &raw)?;
        }

        if let Some(raw) = lookup("ZAI_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ZaiError::Config(format!("ZAI_TIMEOUT_SECS: {e}")))?;
            settings.timeout = Duration::from_secs(secs);
        }

        Ok(settings)
    }

    /// Upstream model for a caller model; unmapped names are forwarded as-is
    #[must_use]
    pub fn upstream_model<'a>(&'a self, model: &'a str) -> &'a str {
        self.models_mapping
            .get(model)
            .map_or(model, String::as_str)
    }
}

/// Parse a JSON object of strings held in environment variable `name`
fn parse_map(name: &str, raw: &str) -> Result<HashMap<String, String>, ZaiError> {
    serde_json::from_str(raw).map_err(|e| ZaiError::Config(format!("{name}: {e}")))
}
