//! Prompt templates.
//!
//! Each template is a plain text file containing the `{script_content}`
//! placeholder exactly once. Rendering drops the aggregated scripts in at
//! that spot verbatim: no escaping, no truncation.

use crate::config::PromptsConfig;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Placeholder replaced by the aggregated script content.
pub const PLACEHOLDER: &str = "{script_content}";

/// A loaded prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Load a template from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to load prompt template: {}", path.display()))?;

        Self::from_text(text)
            .with_context(|| format!("Invalid prompt template: {}", path.display()))
    }

    /// Build a template from text, checking the placeholder.
    pub fn from_text(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        match text.matches(PLACEHOLDER).count() {
            1 => Ok(Self { text }),
            0 => bail!("template does not contain the {} placeholder", PLACEHOLDER),
            n => bail!(
                "template contains the {} placeholder {} times, expected once",
                PLACEHOLDER,
                n
            ),
        }
    }

    /// Substitute the script blob into the placeholder.
    pub fn render(&self, script_content: &str) -> String {
        // Split rather than replace so a placeholder inside the blob stays literal.
        let (before, after) = self
            .text
            .split_once(PLACEHOLDER)
            .unwrap_or((self.text.as_str(), ""));

        let mut out = String::with_capacity(before.len() + script_content.len() + after.len());
        out.push_str(before);
        out.push_str(script_content);
        out.push_str(after);
        out
    }

    pub fn text_len(&self) -> usize {
        self.text.len()
    }
}

/// The three templates used by one run.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub part1: PromptTemplate,
    pub part2: PromptTemplate,
    pub diagram: PromptTemplate,
}

impl PromptSet {
    pub fn load(config: &PromptsConfig) -> Result<Self> {
        Ok(Self {
            part1: PromptTemplate::load(&config.part1_file)?,
            part2: PromptTemplate::load(&config.part2_file)?,
            diagram: PromptTemplate::load(&config.mermaid_file)?,
        })
    }
}
