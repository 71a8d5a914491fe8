//! The services a command-line session talks to.

use maskedit_core::{
    EditRequest, EditResult, EnhancedPrompts, ImageEditService, PromptEnhancer, ServiceError,
};
use maskedit_gemini::{GeminiClient, GeminiError, edit_failure, enhance_failure};

/// A Gemini client, or nothing when no API key is configured.
///
/// Without a client every call fails with a missing-key message, so a
/// script can still upload, mask and download offline.
#[derive(Debug)]
pub struct Backend {
    client: Option<GeminiClient>,
}

impl Backend {
    /// Wrap an optional client.
    pub const fn new(client: Option<GeminiClient>) -> Self {
        Self { client }
    }
}

impl ImageEditService for Backend {
    async fn edit(&self, request: &EditRequest) -> Result<EditResult, ServiceError> {
        match &self.client {
            Some(client) => client.edit(request).await,
            None => Err(ServiceError::new(edit_failure(&GeminiError::MissingApiKey))),
        }
    }
}

impl PromptEnhancer for Backend {
    async fn enhance(
        &self,
        prompt: &str,
        negative_prompt: &str,
    ) -> Result<EnhancedPrompts, ServiceError> {
        match &self.client {
            Some(client) => client.enhance(prompt, negative_prompt).await,
            None => Err(ServiceError::new(enhance_failure(
                &GeminiError::MissingApiKey,
            ))),
        }
    }
}
