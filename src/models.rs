//! Data models for the report generator.
//!
//! This module contains the core data structures shared between the
//! Gemini client, the report writer and the pipeline.

use crate::config::GenerationParams;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Model identifier plus the per-request parameters sent with it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub generation: GenerationParams,
    pub safety: BTreeMap<String, String>,
}

/// Which output a generation step produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportPart {
    /// First half of the CTI report.
    Part1,
    /// Second half of the CTI report.
    Part2,
    /// Mermaid relationship diagram.
    Diagram,
}

impl ReportPart {
    /// All parts in generation order.
    pub const ALL: [ReportPart; 3] = [ReportPart::Part1, ReportPart::Part2, ReportPart::Diagram];

    /// Suffix used in the output filename.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            ReportPart::Part1 => "part1",
            ReportPart::Part2 => "part2",
            ReportPart::Diagram => "diagram",
        }
    }

    /// Heading written at the top of the output file.
    pub fn heading(&self, title: &str) -> String {
        match self {
            ReportPart::Part1 => format!("{} (Part 1)", title),
            ReportPart::Part2 => format!("{} (Part 2)", title),
            ReportPart::Diagram => format!("{}: Relationship Diagram", title),
        }
    }
}

impl fmt::Display for ReportPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportPart::Part1 => write!(f, "CTI Report Part 1"),
            ReportPart::Part2 => write!(f, "CTI Report Part 2"),
            ReportPart::Diagram => write!(f, "Mermaid Diagram"),
        }
    }
}

/// Safety rating for one harm category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyRating {
    pub category: String,
    pub probability: String,
    #[serde(default)]
    pub blocked: bool,
}

/// Diagnostic metadata the service returns alongside (or instead of) text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptFeedback {
    /// Why the prompt was blocked, if it was.
    pub block_reason: Option<String>,
    /// Why the candidate stopped, e.g. `STOP`, `SAFETY`, `MAX_TOKENS`.
    pub finish_reason: Option<String>,
    /// Per-category ratings for the prompt.
    pub safety_ratings: Vec<SafetyRating>,
}

impl PromptFeedback {
    /// True when there is nothing worth reporting.
    pub fn is_empty(&self) -> bool {
        self.block_reason.is_none() && self.finish_reason.is_none() && self.safety_ratings.is_empty()
    }
}

impl fmt::Display for PromptFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "no feedback");
        }

        let mut parts = Vec::new();
        if let Some(ref reason) = self.block_reason {
            parts.push(format!("block_reason={}", reason));
        }
        if let Some(ref reason) = self.finish_reason {
            parts.push(format!("finish_reason={}", reason));
        }
        for rating in &self.safety_ratings {
            let flag = if rating.blocked { " (blocked)" } else { "" };
            parts.push(format!("{}={}{}", rating.category, rating.probability, flag));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Result of one generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Non-empty generated text.
    Success {
        text: String,
        feedback: PromptFeedback,
    },
    /// The service returned no usable text, usually a safety block.
    SafetyBlocked { feedback: PromptFeedback },
    /// The request failed in transport or on the service side.
    TransportError { detail: String },
}

#[cfg(test)]
impl GenerationOutcome {
    /// Generated text, if the request succeeded.
    pub fn text(&self) -> Option<&str> {
        match self {
            GenerationOutcome::Success { text, .. } => Some(text),
            _ => None,
        }
    }
}
