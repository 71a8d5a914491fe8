//! Safety-filter detection.
//!
//! Services report safety-filter refusals only through their error
//! text. This is the one place that inspects that text; swap the
//! classifier if the service's wording changes.

use crate::types::EditorConfig;

/// Decides whether a service failure was a safety-filter refusal.
pub trait SafetyClassifier: std::fmt::Debug {
    /// Whether `message` reports a safety-filter refusal.
    fn is_safety_filtered(&self, message: &str) -> bool;
}

/// Matches known phrases anywhere in the message (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseClassifier {
    phrases: Vec<String>,
}

impl PhraseClassifier {
    /// Classifier matching `phrases`. Empty phrases are ignored.
    #[must_use]
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Classifier using the phrases from `config`.
    #[must_use]
    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.safety_phrases.iter().cloned())
    }

    /// The phrases matched.
    #[must_use]
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

impl Default for PhraseClassifier {
    fn default() -> Self {
        Self::new(EditorConfig::DEFAULT_SAFETY_PHRASES.iter().copied())
    }
}

impl SafetyClassifier for PhraseClassifier {
    fn is_safety_filtered(&self, message: &str) -> bool {
        self.phrases.iter().any(|p| message.contains(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_phrases_match_service_wording() {
        let classifier = PhraseClassifier::default();
        assert!(classifier.is_safety_filtered(
            "Failed to edit image. The AI did not return a valid image. (Reason: IMAGE_SAFETY)"
        ));
        assert!(
            classifier
                .is_safety_filtered("The content may have been blocked by safety filters.")
        );
        assert!(!classifier.is_safety_filtered("Failed to edit image. quota exceeded"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let classifier = PhraseClassifier::default();
        assert!(!classifier.is_safety_filtered("image_safety"));
    }

    #[test]
    fn custom_phrases_replace_defaults() {
        let config = EditorConfig {
            safety_phrases: vec!["BLOCKED".to_owned(), String::new()],
            ..EditorConfig::default()
        };
        let classifier = PhraseClassifier::from_config(&config);
        assert_eq!(classifier.phrases(), ["BLOCKED"]);
        assert!(classifier.is_safety_filtered("request BLOCKED"));
        assert!(!classifier.is_safety_filtered("IMAGE_SAFETY"));
        assert!(!classifier.is_safety_filtered(""));
    }
}
