//! Contracts for the external services a session talks to.
//!
//! The core never performs I/O itself. A front end supplies
//! implementations of [`ImageEditService`] and [`PromptEnhancer`]
//! (an HTTP client, or an in-memory fake in tests).

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::mask::Mask;
use crate::raster::DataUri;

/// Everything the edit service needs for one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    /// The original upload, unchanged.
    pub image: DataUri,
    /// What to change.
    pub prompt: String,
    /// What to avoid; empty means none.
    pub negative_prompt: String,
    /// Region the edit is restricted to.
    pub mask: Option<Mask>,
}

impl EditRequest {
    /// The negative prompt, if it has any non-whitespace content.
    #[must_use]
    pub fn negative_prompt(&self) -> Option<&str> {
        let trimmed = self.negative_prompt.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// What the edit service returned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditResult {
    /// The edited image.
    pub image: Option<DataUri>,
    /// Any commentary the model returned with it.
    pub text: Option<String>,
}

/// Rewritten prompts from the enhancement service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedPrompts {
    /// Replacement prompt.
    pub enhanced_prompt: String,
    /// Replacement negative prompt.
    pub enhanced_negative_prompt: String,
}

/// A collaborator call failed. The message is shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    message: String,
}

impl ServiceError {
    /// Wrap a failure message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Generates an edited image from a prompt and optional mask.
pub trait ImageEditService {
    /// Run one edit.
    fn edit(&self, request: &EditRequest) -> impl Future<Output = Result<EditResult, ServiceError>>;
}

/// Rewrites prompts so they are less likely to be refused.
pub trait PromptEnhancer {
    /// Rewrite `prompt` and `negative_prompt`.
    fn enhance(
        &self,
        prompt: &str,
        negative_prompt: &str,
    ) -> impl Future<Output = Result<EnhancedPrompts, ServiceError>>;
}
