//! Client configuration.

use serde::{Deserialize, Serialize};

/// Environment variables consulted for the API key, in order.
pub const API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

/// Where and how to reach the Gemini API.
///
/// The API key is not part of the config; it is handed to the client
/// separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API root, without a trailing slash.
    pub base_url: String,

    /// Model used for image edits.
    pub image_model: String,

    /// Model used for prompt enhancement.
    pub text_model: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Default API root.
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";

    /// Default image-edit model.
    pub const DEFAULT_IMAGE_MODEL: &'static str = "gemini-2.5-flash-image-preview";

    /// Default prompt-enhancement model.
    pub const DEFAULT_TEXT_MODEL: &'static str = "gemini-2.5-flash";

    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// URL of the `generateContent` method for `model`.
    #[must_use]
    pub fn generate_content_url(&self, model: &str) -> String {
        format!(
            "{}/models/{model}:generateContent",
            self.base_url.trim_end_matches('/')
        )
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
            image_model: Self::DEFAULT_IMAGE_MODEL.to_owned(),
            text_model: Self::DEFAULT_TEXT_MODEL.to_owned(),
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Look up the API key through `lookup` (normally [`std::env::var`]),
/// trying each of [`API_KEY_VARS`] and skipping blank values.
pub fn api_key_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_owned())
        .find(|value| !value.is_empty())
}

/// The API key from the process environment.
#[must_use]
pub fn api_key_from_env() -> Option<String> {
    api_key_from(|name| std::env::var(name).ok())
}
