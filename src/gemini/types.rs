//! Wire types for the Gemini `generateContent` endpoint.

use crate::config::GenerationParams;
use crate::models::{GenerationOutcome, PromptFeedback, SafetyRating};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One turn of conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: &str) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }

    pub fn model(text: &str) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

/// Request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    pub contents: &'a [Content],
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub generation_config: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub safety_settings: Vec<SafetySetting>,
}

impl<'a> GenerateContentRequest<'a> {
    pub fn new(
        contents: &'a [Content],
        generation: &GenerationParams,
        safety: &BTreeMap<String, String>,
    ) -> Self {
        Self {
            contents,
            generation_config: wire_generation_config(generation),
            safety_settings: wire_safety_settings(safety),
        }
    }
}

/// Response body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<WirePromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    pub fn feedback(&self) -> PromptFeedback {
        let candidate = self.candidates.first();
        let mut safety_ratings = self
            .prompt_feedback
            .as_ref()
            .map(|f| f.safety_ratings.clone())
            .unwrap_or_default();

        // Prompt ratings are absent when the candidate itself was filtered.
        if safety_ratings.is_empty() {
            if let Some(c) = candidate {
                safety_ratings = c.safety_ratings.clone();
            }
        }

        PromptFeedback {
            block_reason: self
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.clone()),
            finish_reason: candidate.and_then(|c| c.finish_reason.clone()),
            safety_ratings,
        }
    }

    pub fn into_outcome(self) -> GenerationOutcome {
        let text = self.text();
        let feedback = self.feedback();

        if text.is_empty() {
            GenerationOutcome::SafetyBlocked { feedback }
        } else {
            GenerationOutcome::Success { text, feedback }
        }
    }
}

/// Convert config parameter names (`max_output_tokens`) to wire names (`maxOutputTokens`).
pub fn wire_generation_config(params: &GenerationParams) -> Map<String, Value> {
    params
        .iter()
        .map(|(key, value)| (to_camel_case(key), value.clone()))
        .collect()
}

/// Expand short category names and normalize case.
pub fn wire_safety_settings(settings: &BTreeMap<String, String>) -> Vec<SafetySetting> {
    settings
        .iter()
        .map(|(category, threshold)| {
            let category = category.trim().to_uppercase();
            let category = if category.starts_with("HARM_CATEGORY_") {
                category
            } else {
                format!("HARM_CATEGORY_{}", category)
            };
            SafetySetting {
                category,
                threshold: threshold.trim().to_uppercase(),
            }
        })
        .collect()
}

fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
