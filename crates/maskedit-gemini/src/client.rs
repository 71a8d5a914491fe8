//! HTTP client for the Gemini `generateContent` endpoint.

use std::time::Duration;

use maskedit_core::{
    EditRequest, EditResult, EnhancedPrompts, ImageEditService, PromptEnhancer, ServiceError,
};
use reqwest::header::CONTENT_TYPE;

use crate::config::{GeminiConfig, api_key_from_env};
use crate::error::{GeminiError, edit_failure, enhance_failure};
use crate::wire::{
    GenerateContentRequest, GenerateContentResponse, api_error_message, edit_request_body,
    enhance_request_body, interpret_edit_response, interpret_enhance_response,
};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini-backed [`ImageEditService`] and [`PromptEnhancer`].
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
    api_key: String,
}

impl GeminiClient {
    /// Build a client with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns [`GeminiError::MissingApiKey`] if the key is blank and
    /// [`GeminiError::Http`] if the HTTP client cannot be constructed.
    pub fn new(config: GeminiConfig, api_key: impl Into<String>) -> Result<Self, GeminiError> {
        let api_key = api_key.into().trim().to_owned();
        if api_key.is_empty() {
            return Err(GeminiError::MissingApiKey);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    /// Build a client with the API key taken from the environment.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn from_env(config: GeminiConfig) -> Result<Self, GeminiError> {
        let api_key = api_key_from_env().ok_or(GeminiError::MissingApiKey)?;
        Self::new(config, api_key)
    }

    /// The configuration this client was built with.
    #[must_use]
    pub const fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Run one image edit.
    ///
    /// # Errors
    ///
    /// Any [`GeminiError`] from building the request, the HTTP round
    /// trip or interpreting the response.
    pub async fn edit_image(&self, request: &EditRequest) -> Result<EditResult, GeminiError> {
        let body = edit_request_body(request)?;
        log::debug!(
            "requesting edit from {} (masked: {})",
            self.config.image_model,
            request.mask.is_some()
        );
        let response = self.generate_content(&self.config.image_model, &body).await?;
        interpret_edit_response(response)
    }

    /// Rewrite a prompt pair.
    ///
    /// # Errors
    ///
    /// Any [`GeminiError`] from the HTTP round trip or from parsing the
    /// returned JSON.
    pub async fn enhance_prompts(
        &self,
        prompt: &str,
        negative_prompt: &str,
    ) -> Result<EnhancedPrompts, GeminiError> {
        let body = enhance_request_body(prompt, negative_prompt);
        log::debug!("requesting prompt enhancement from {}", self.config.text_model);
        let response = self.generate_content(&self.config.text_model, &body).await?;
        interpret_enhance_response(response)
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let response = self
            .http
            .post(self.config.generate_content_url(model))
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = api_error_message(&text);
            log::warn!("{model} returned {status}: {message}");
            return Err(GeminiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| GeminiError::Decode(e.to_string()))
    }
}

impl ImageEditService for GeminiClient {
    async fn edit(&self, request: &EditRequest) -> Result<EditResult, ServiceError> {
        self.edit_image(request).await.map_err(|e| {
            log::warn!("image edit failed: {e}");
            ServiceError::new(edit_failure(&e))
        })
    }
}

impl PromptEnhancer for GeminiClient {
    async fn enhance(
        &self,
        prompt: &str,
        negative_prompt: &str,
    ) -> Result<EnhancedPrompts, ServiceError> {
        self.enhance_prompts(prompt, negative_prompt)
            .await
            .map_err(|e| {
                log::warn!("prompt enhancement failed: {e}");
                ServiceError::new(enhance_failure(&e))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_api_key_is_rejected() {
        let result = GeminiClient::new(GeminiConfig::default(), "   ");
        assert!(matches!(result, Err(GeminiError::MissingApiKey)));
    }

    #[test]
    fn key_is_trimmed_and_config_kept() {
        let config = GeminiConfig {
            timeout_secs: 5,
            ..GeminiConfig::default()
        };
        let client = GeminiClient::new(config.clone(), " secret\n");
        let Ok(client) = client else {
            unreachable!("a non-blank key builds a client");
        };
        assert_eq!(client.api_key, "secret");
        assert_eq!(client.config(), &config);
    }
}
