//! Prompt construction for the description-conditioned generation model.
//!
//! The model was conditioned on one fixed layout:
//!
//! ```text
//! SOH  BOS  <description="..."> text  EOT  EOH  SOA  CODE_START
//! ```
//!
//! Nothing downstream checks the order; a different one silently degrades
//! the generated audio.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, SynthesisError};
use crate::tokens::ControlTokenSet;

/// Used when the request carries no voice description.
pub const DEFAULT_VOICE_DESCRIPTION: &str = "Generic female voice";

/// One piece of a prompt: a reserved token ID or free text for the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromptSegment {
    Token { id: u32 },
    Text { text: String },
}

/// An immutable, ordered prompt ready for the generation model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    segments: Vec<PromptSegment>,
}

impl Prompt {
    pub fn segments(&self) -> &[PromptSegment] {
        &self.segments
    }

    /// IDs of the control markers, in prompt order.
    pub fn control_ids(&self) -> Vec<u32> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                PromptSegment::Token { id } => Some(*id),
                PromptSegment::Text { .. } => None,
            })
            .collect()
    }

    /// The annotated text segment (`<description="..."> text`).
    pub fn text(&self) -> &str {
        self.segments
            .iter()
            .find_map(|s| match s {
                PromptSegment::Text { text } => Some(text.as_str()),
                PromptSegment::Token { .. } => None,
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                PromptSegment::Token { id } => write!(f, "<|{id}|>")?,
                PromptSegment::Text { text } => f.write_str(text)?,
            }
        }
        Ok(())
    }
}

/// Normalizes whitespace and removes the space left before commas and periods.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(" ,", ",")
        .replace(" .", ".")
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    tokens: ControlTokenSet,
}

impl PromptBuilder {
    pub fn new(tokens: ControlTokenSet) -> Self {
        Self { tokens }
    }

    /// Build the prompt for `text` spoken in the voice described by `description`.
    pub fn build(&self, description: Option<&str>, text: &str) -> Result<Prompt> {
        let text = clean_text(text);
        if text.is_empty() {
            return Err(SynthesisError::InvalidInput("Text cannot be empty".to_string()));
        }

        let description = description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(DEFAULT_VOICE_DESCRIPTION);

        let t = &self.tokens;
        let token = |id| PromptSegment::Token { id };
        let segments = vec![
            token(t.start_of_header),
            token(t.sequence_start),
            PromptSegment::Text {
                text: format!("<description=\"{description}\"> {text}"),
            },
            token(t.text_end),
            token(t.end_of_header),
            token(t.start_of_audio),
            token(t.code_start),
        ];

        Ok(Prompt { segments })
    }
}
