//! Side panel for ad-hoc translation between the customer's language and Chinese.

use serde::Serialize;

use crate::chat::Intent;

pub const AUTO_LANGUAGE: &str = "auto";
pub const CHINESE: &str = "zh";
pub const ENGLISH: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationPanel {
    pub source_language: String,
    pub target_language: String,
    pub source_text: String,
    pub translated_text: String,
}

impl Default for TranslationPanel {
    fn default() -> Self {
        Self {
            source_language: AUTO_LANGUAGE.to_string(),
            target_language: CHINESE.to_string(),
            source_text: String::new(),
            translated_text: String::new(),
        }
    }
}

impl TranslationPanel {
    /// Translate from the detected language; Chinese customers get English.
    pub fn apply_detected_language(&mut self, language: &str) {
        self.source_language = language.to_string();
        self.target_language = if language == CHINESE { ENGLISH } else { CHINESE }.to_string();
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.source_language, &mut self.target_language);
        std::mem::swap(&mut self.source_text, &mut self.translated_text);
    }

    pub fn reset(&mut self) {
        self.source_text.clear();
        self.translated_text.clear();
    }

    /// Intent for the current direction.
    #[must_use]
    pub fn intent(&self) -> Intent {
        if self.target_language == CHINESE {
            Intent::TranslateToChinese
        } else {
            Intent::TranslateToSource
        }
    }
}
