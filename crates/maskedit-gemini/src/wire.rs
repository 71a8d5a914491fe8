//! `generateContent` request and response shapes.
//!
//! Everything here is pure: building request bodies from core types and
//! interpreting decoded responses. The HTTP round trip lives in
//! [`crate::client`].

use maskedit_core::{DataUri, EditRequest, EditResult, EnhancedPrompts};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::GeminiError;

/// Appended to the prompt when the edit is restricted to a mask.
pub const MASK_NOTE: &str = " (Note: apply this edit ONLY to the masked area)";

/// System instruction for prompt enhancement.
pub const ENHANCE_INSTRUCTION: &str = "You are a creative assistant that enhances user prompts for an AI image editor.
Your task is to rewrite the user's prompt and negative prompt to be more descriptive, safer, and more likely to produce a high-quality, unblocked result from a generative AI model.
- Expand on the user's idea, adding artistic details (e.g., lighting, style, composition).
- Ensure the tone is positive and avoids any ambiguous or potentially sensitive terms.
- If the negative prompt is empty, create a helpful one that excludes common image artifacts (e.g., \"blurry, distorted, watermark, text, extra limbs\").
- Return ONLY the JSON object with the enhanced prompts.";

/// Body of a `generateContent` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation turns; a single user turn here.
    pub contents: Vec<Content>,
    /// Optional system instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    /// Output controls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// One turn of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Content {
    /// `user` or `model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Ordered parts; absent when the model returned nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<Part>>,
}

impl Content {
    fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_owned()),
            parts: Some(parts),
        }
    }
}

/// Text or inline binary data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline binary content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn inline(uri: &DataUri) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: uri.mime_type().to_owned(),
                data: uri.base64_payload(),
            }),
        }
    }
}

/// Base64 payload with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type of the decoded bytes.
    pub mime_type: String,
    /// Standard base64.
    pub data: String,
}

/// Output controls for a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Requested output kinds, e.g. `IMAGE` and `TEXT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    /// MIME type of text output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    /// JSON schema the text output must follow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

/// Decoded `generateContent` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Candidate answers; the first one is used.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// One candidate answer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// What the model produced.
    #[serde(default)]
    pub content: Option<Content>,
    /// Why generation stopped, e.g. `STOP` or `IMAGE_SAFETY`.
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Per-category safety verdicts.
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

/// A safety verdict for one harm category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SafetyRating {
    /// Harm category.
    #[serde(default)]
    pub category: Option<String>,
    /// Whether this category blocked the output.
    #[serde(default)]
    pub blocked: bool,
}

/// Combine the prompt, negative prompt and mask note into the text sent
/// to the model.
#[must_use]
pub fn compose_prompt(prompt: &str, negative_prompt: Option<&str>, masked: bool) -> String {
    let mut text = match negative_prompt.map(str::trim).filter(|n| !n.is_empty()) {
        Some(negative) => format!("{prompt}. Negative prompt: do not include {negative}."),
        None => prompt.to_owned(),
    };
    if masked {
        text.push_str(MASK_NOTE);
    }
    text
}

/// Build the image-edit body. Parts are ordered image, mask, text.
///
/// # Errors
///
/// Returns [`GeminiError::Mask`] if the mask cannot be encoded.
pub fn edit_request_body(request: &EditRequest) -> Result<GenerateContentRequest, GeminiError> {
    let mut parts = vec![Part::inline(&request.image)];
    if let Some(mask) = &request.mask {
        parts.push(Part::inline(&mask.to_data_uri()?));
    }
    parts.push(Part::text(compose_prompt(
        &request.prompt,
        request.negative_prompt(),
        request.mask.is_some(),
    )));

    Ok(GenerateContentRequest {
        contents: vec![Content::user(parts)],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_modalities: Some(vec!["IMAGE".to_owned(), "TEXT".to_owned()]),
            ..GenerationConfig::default()
        }),
    })
}

/// Build the prompt-enhancement body.
#[must_use]
pub fn enhance_request_body(prompt: &str, negative_prompt: &str) -> GenerateContentRequest {
    let text = format!(
        "Rewrite the following for an AI image generator:\n\nPrompt: \"{prompt}\"\nNegative Prompt: \"{negative_prompt}\""
    );
    let schema = json!({
        "type": "OBJECT",
        "properties": {
            "enhancedPrompt": {
                "type": "STRING",
                "description": "The enhanced, descriptive, and safe version of the user's main prompt.",
            },
            "enhancedNegativePrompt": {
                "type": "STRING",
                "description": "The enhanced or generated negative prompt to avoid common issues.",
            },
        },
        "required": ["enhancedPrompt", "enhancedNegativePrompt"],
    });

    GenerateContentRequest {
        contents: vec![Content::user(vec![Part::text(text)])],
        system_instruction: Some(Content {
            role: None,
            parts: Some(vec![Part::text(ENHANCE_INSTRUCTION)]),
        }),
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json".to_owned()),
            response_schema: Some(schema),
            ..GenerationConfig::default()
        }),
    }
}

/// Interpret an image-edit response.
///
/// The last text part becomes the result text and the last inline part
/// the result image.
///
/// # Errors
///
/// Returns [`GeminiError::NoCandidate`], [`GeminiError::NoValidImage`]
/// or [`GeminiError::NoImage`] for the three ways a response can come
/// back without an image, and [`GeminiError::Payload`] when the image
/// data is not valid base64.
pub fn interpret_edit_response(
    response: GenerateContentResponse,
) -> Result<EditResult, GeminiError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(GeminiError::NoCandidate)?;

    let Some(parts) = candidate.content.and_then(|c| c.parts) else {
        let blocked = candidate.safety_ratings.iter().any(|r| r.blocked);
        return Err(GeminiError::no_valid_image(
            candidate.finish_reason.as_deref(),
            blocked,
        ));
    };

    let mut result = EditResult::default();
    for part in parts {
        if let Some(text) = part.text.filter(|t| !t.is_empty()) {
            result.text = Some(text);
        } else if let Some(inline) = part.inline_data {
            result.image = Some(DataUri::from_base64(inline.mime_type, &inline.data)?);
        }
    }

    if result.image.is_none() {
        return Err(GeminiError::NoImage);
    }
    Ok(result)
}

/// Interpret a prompt-enhancement response: the candidate's text must
/// be the JSON object requested by the schema.
///
/// # Errors
///
/// Returns [`GeminiError::NoCandidate`] if nothing came back and
/// [`GeminiError::EnhanceParse`] if the text is not the expected JSON.
pub fn interpret_enhance_response(
    response: GenerateContentResponse,
) -> Result<EnhancedPrompts, GeminiError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(GeminiError::NoCandidate)?;
    let text: String = candidate
        .content
        .and_then(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    serde_json::from_str(text.trim()).map_err(|e| GeminiError::EnhanceParse(e.to_string()))
}

/// Pull the human-readable message out of an API error body, falling
/// back to the raw body.
#[must_use]
pub fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: ApiError,
    }
    #[derive(Deserialize)]
    struct ApiError {
        message: String,
    }

    serde_json::from_str::<Envelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use maskedit_core::{Dimensions, Mask};
    use serde_json::Value;

    use super::*;

    fn request(negative: &str, mask: Option<Mask>) -> EditRequest {
        EditRequest {
            image: DataUri::new("image/jpeg", b"jpegbytes".to_vec()),
            prompt: "add a hat".to_owned(),
            negative_prompt: negative.to_owned(),
            mask,
        }
    }

    fn response(value: Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn prompt_without_extras_is_unchanged() {
        assert_eq!(compose_prompt("add a hat", None, false), "add a hat");
        assert_eq!(compose_prompt("add a hat", Some("   "), false), "add a hat");
    }

    #[test]
    fn negative_prompt_and_mask_note_are_appended() {
        assert_eq!(
            compose_prompt("add a hat", Some(" blur "), true),
            "add a hat. Negative prompt: do not include blur. (Note: apply this edit ONLY to the masked area)"
        );
    }

    #[test]
    fn unmasked_body_has_image_then_text() {
        let body = serde_json::to_value(edit_request_body(&request("", None)).unwrap()).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts.as_array().unwrap().len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], STANDARD.encode(b"jpegbytes"));
        assert_eq!(parts[1]["text"], "add a hat");
        assert_eq!(
            body["generationConfig"]["responseModalities"],
            json!(["IMAGE", "TEXT"])
        );
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn masked_body_orders_image_mask_text() {
        let mask = Mask::from_fn(Dimensions::new(2, 2), |x, _| x == 0);
        let body =
            serde_json::to_value(edit_request_body(&request("blur", Some(mask.clone()))).unwrap())
                .unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap().clone();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        let mask_png = STANDARD
            .decode(parts[1]["inlineData"]["data"].as_str().unwrap())
            .unwrap();
        assert_eq!(Mask::from_png(&mask_png).unwrap(), mask);
        assert!(parts[2]["text"].as_str().unwrap().ends_with(MASK_NOTE));
    }

    #[test]
    fn enhance_body_requests_json_schema() {
        let body = serde_json::to_value(enhance_request_body("hat", "")).unwrap();
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(
            body["generationConfig"]["responseSchema"]["required"],
            json!(["enhancedPrompt", "enhancedNegativePrompt"])
        );
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            ENHANCE_INSTRUCTION
        );
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.contains("Prompt: \"hat\""));
        assert!(text.contains("Negative Prompt: \"\""));
    }

    #[test]
    fn image_and_last_text_are_extracted() {
        let result = interpret_edit_response(response(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "first"},
                    {"inlineData": {"mimeType": "image/png", "data": "YWJj"}},
                    {"text": "here you go"}
                ]},
                "finishReason": "STOP"
            }]
        })))
        .unwrap();
        assert_eq!(result.text.as_deref(), Some("here you go"));
        let image = result.image.unwrap();
        assert_eq!(image.to_string(), "data:image/png;base64,YWJj");
    }

    #[test]
    fn no_candidates_is_reported() {
        let err = interpret_edit_response(response(json!({}))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No content generated. The request may have been blocked by the API."
        );
    }

    #[test]
    fn missing_parts_reports_reason_and_safety() {
        let err = interpret_edit_response(response(json!({
            "candidates": [{
                "finishReason": "IMAGE_SAFETY",
                "safetyRatings": [
                    {"category": "HARM_CATEGORY_HARASSMENT", "blocked": false},
                    {"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "blocked": true}
                ]
            }]
        })))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The AI did not return a valid image. (Reason: IMAGE_SAFETY) The content may have been blocked by safety filters. Please try a different prompt."
        );
    }

    #[test]
    fn missing_parts_without_details() {
        let err = interpret_edit_response(response(json!({
            "candidates": [{"content": {"role": "model"}}]
        })))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The AI did not return a valid image. Please try a different prompt."
        );
    }

    #[test]
    fn text_only_answer_is_a_refusal() {
        let err = interpret_edit_response(response(json!({
            "candidates": [{"content": {"parts": [{"text": "I can't do that."}]}}]
        })))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The AI did not return an image. It may have refused the request."
        );
    }

    #[test]
    fn bad_image_payload_is_reported() {
        let err = interpret_edit_response(response(json!({
            "candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "image/png", "data": "@@@"}}
            ]}}]
        })))
        .unwrap_err();
        assert!(matches!(err, GeminiError::Payload(_)));
    }

    #[test]
    fn enhanced_prompts_are_parsed_from_text() {
        let prompts = interpret_enhance_response(response(json!({
            "candidates": [{"content": {"parts": [{
                "text": "  {\"enhancedPrompt\": \"a jaunty red hat\", \"enhancedNegativePrompt\": \"blurry\"}\n"
            }]}}]
        })))
        .unwrap();
        assert_eq!(prompts.enhanced_prompt, "a jaunty red hat");
        assert_eq!(prompts.enhanced_negative_prompt, "blurry");
    }

    #[test]
    fn enhancement_that_is_not_json_is_reported() {
        let err = interpret_enhance_response(response(json!({
            "candidates": [{"content": {"parts": [{"text": "sure!"}]}}]
        })))
        .unwrap_err();
        assert!(matches!(err, GeminiError::EnhanceParse(_)));
    }

    #[test]
    fn api_error_message_is_extracted() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(api_error_message(body), "Quota exceeded");
        assert_eq!(api_error_message(" gateway timeout \n"), "gateway timeout");
    }
}
