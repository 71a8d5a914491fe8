//! maskedit-gemini: Gemini-backed image editing and prompt enhancement.
//!
//! [`GeminiClient`] implements the [`maskedit_core::ImageEditService`]
//! and [`maskedit_core::PromptEnhancer`] contracts over the
//! `generateContent` REST endpoint. Request building and response
//! interpretation live in [`wire`] and are pure, so they are tested
//! without a network.

pub mod client;
pub mod config;
pub mod error;
pub mod wire;

pub use client::GeminiClient;
pub use config::{API_KEY_VARS, GeminiConfig, api_key_from, api_key_from_env};
pub use error::{GeminiError, edit_failure, enhance_failure};
