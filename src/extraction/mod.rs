//! Structured extraction through a generative model
//!
//! A request is the fixed instruction for the configured schema followed by
//! the user's parts in order: text, inline media, caption. The model's raw
//! reply goes through [`normalize`] before anything else looks at it.

mod gemini;
mod normalize;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;

pub use gemini::GeminiClient;
pub use normalize::{ExtractedRecord, normalize};

use crate::media::InlineMedia;
use crate::{Error, Result};

const CARBON_INSTRUCTION: &str = r#"You are a Carbon Footprint Tracker AI. Your goal is to extract structured data from the user's input for the database.
**Rules:**
1. **Category:** MUST be strictly one of: 'waste', 'consumption', 'food', 'energy', 'transport'.
2. **Carbon Footprint:** Estimate the kg CO2e (Carbon Footprint) based on the item and quantity.
3. **Output:** Return ONLY a raw JSON object (no markdown) with this structure:
{
  "category": "string",
  "description": "string",
  "value": number,
  "unit": "string",
  "carbon_footprint_kg": number,
  "reply_to_user": "A friendly, encouraging message with emojis confirming what was logged."
}"#;

const SUMMARY_INSTRUCTION: &str = r#"You are a message intake assistant. Read the user's input (text, image or audio) and describe what they sent.
**Rules:**
1. **Summary:** One or two sentences describing the content.
2. **Intent:** A short lowercase label for what the user wants (for example 'request', 'report', 'question', 'other').
3. **Output:** Return ONLY a raw JSON object (no markdown) with this structure:
{
  "summary": "string",
  "intent": "string",
  "details": "string or object with any structured facts worth keeping",
  "reply_to_user": "A short friendly acknowledgement of what was received."
}"#;

/// Shape of the record the model is asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionSchema {
    /// Carbon activity (`api_activity` rows)
    #[default]
    Carbon,
    /// Generic summary/intent (`message_log` rows)
    Summary,
}

impl ExtractionSchema {
    /// Fixed system instruction for this schema
    #[must_use]
    pub const fn instruction(self) -> &'static str {
        match self {
            Self::Carbon => CARBON_INSTRUCTION,
            Self::Summary => SUMMARY_INSTRUCTION,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Carbon => "carbon",
            Self::Summary => "summary",
        }
    }
}

impl fmt::Display for ExtractionSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionSchema {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "carbon" => Ok(Self::Carbon),
            "summary" => Ok(Self::Summary),
            other => Err(Error::Config(format!(
                "unknown extraction schema '{other}' (expected 'carbon' or 'summary')"
            ))),
        }
    }
}

/// One part of a model request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineMedia,
    },
}

impl Part {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// An assembled model request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    /// Ordered parts, instruction first
    pub parts: Vec<Part>,
}

impl PromptRequest {
    /// Build a request from the schema instruction and the user's parts
    ///
    /// Empty text and caption are dropped.
    #[must_use]
    pub fn build(
        schema: ExtractionSchema,
        text: Option<&str>,
        media: Option<InlineMedia>,
        caption: Option<&str>,
    ) -> Self {
        let mut parts = vec![Part::text(schema.instruction())];

        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            parts.push(Part::text(text));
        }
        if let Some(media) = media {
            parts.push(Part::InlineData { inline_data: media });
        }
        if let Some(caption) = caption.filter(|c| !c.trim().is_empty()) {
            parts.push(Part::text(caption));
        }

        Self { parts }
    }

    /// Plain single-prompt request with no instruction
    #[must_use]
    pub fn plain(prompt: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::text(prompt)],
        }
    }
}

/// Generative model that turns a request into raw text
#[async_trait]
pub trait ExtractionModel: Send + Sync {
    /// Submit the request and return the reply text
    async fn generate(&self, request: &PromptRequest) -> Result<String>;
}
