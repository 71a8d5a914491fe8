//! Failures talking to the Gemini API.

use maskedit_core::{MaskError, RasterError};

/// Errors from building, sending or interpreting a Gemini call.
///
/// The `Display` text is what the user ends up seeing, after the
/// "Failed to ..." prefix added by [`edit_failure`] and
/// [`enhance_failure`].
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    /// The response had no candidates at all.
    #[error("No content generated. The request may have been blocked by the API.")]
    NoCandidate,

    /// The first candidate carried no content parts.
    #[error("The AI did not return a valid image.{0} Please try a different prompt.")]
    NoValidImage(String),

    /// The candidate had parts but none of them was an image.
    #[error("The AI did not return an image. It may have refused the request.")]
    NoImage,

    /// The request could not be sent or the body could not be read.
    #[error("{0}")]
    Http(String),

    /// The API answered with a non-success status.
    #[error("{message} (HTTP {status})")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message from the error body.
        message: String,
    },

    /// The response body was not the expected JSON.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Returned image data was malformed.
    #[error("invalid image data: {0}")]
    Payload(#[from] RasterError),

    /// The mask could not be encoded for upload.
    #[error("{0}")]
    Mask(#[from] MaskError),

    /// No API key was configured.
    #[error("no API key: set GEMINI_API_KEY or API_KEY")]
    MissingApiKey,

    /// The enhancement text was not the requested JSON object.
    #[error("could not parse enhanced prompts: {0}")]
    EnhanceParse(String),
}

impl GeminiError {
    /// A [`Self::NoValidImage`] whose detail names the finish reason
    /// and whether a safety rating blocked the output.
    #[must_use]
    pub fn no_valid_image(finish_reason: Option<&str>, blocked_by_safety: bool) -> Self {
        let mut detail = finish_reason
            .map(|reason| format!(" (Reason: {reason})"))
            .unwrap_or_default();
        if blocked_by_safety {
            detail.push_str(" The content may have been blocked by safety filters.");
        }
        Self::NoValidImage(detail)
    }
}

impl From<reqwest::Error> for GeminiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

/// Message for a failed image edit.
#[must_use]
pub fn edit_failure(e: &GeminiError) -> String {
    format!("Failed to edit image. {e}")
}

/// Message for a failed prompt enhancement.
#[must_use]
pub fn enhance_failure(e: &GeminiError) -> String {
    format!("Failed to enhance prompt. {e}")
}
