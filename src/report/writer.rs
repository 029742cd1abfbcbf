//! Markdown report writer.
//!
//! Each part is written to `<base_filename>_<suffix>.md` with a heading,
//! a generation timestamp and a separator, followed by the generated body.

use crate::models::ReportPart;
use anyhow::{Context, Result};
use chrono::Local;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Fence token the model tends to wrap diagrams in.
const MERMAID_FENCE: &str = "```mermaid";
const CLOSING_FENCE: &str = "```";

/// Writes report parts into one output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    directory: PathBuf,
    base_filename: String,
    title: String,
}

impl ReportWriter {
    pub fn new(directory: &Path, base_filename: &str, title: &str) -> Self {
        Self {
            directory: directory.to_path_buf(),
            base_filename: base_filename.to_string(),
            title: title.to_string(),
        }
    }

    /// Create the output directory if it does not exist yet.
    pub fn ensure_output_dir(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.directory).with_context(|| {
            format!(
                "Failed to create output directory {}",
                self.directory.display()
            )
        })?;

        Ok(std::fs::canonicalize(&self.directory).unwrap_or_else(|_| self.directory.clone()))
    }

    /// Path a part is written to.
    pub fn path_for(&self, part: ReportPart) -> PathBuf {
        self.directory
            .join(format!("{}_{}.md", self.base_filename, part.file_suffix()))
    }

    /// Full file content for a part.
    pub fn render(&self, part: ReportPart, text: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!("# {}\n\n", part.heading(&self.title)));
        output.push_str(&format!(
            "Generated on: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        output.push_str("---\n\n");

        match part {
            ReportPart::Diagram => {
                output.push_str(MERMAID_FENCE);
                output.push('\n');
                output.push_str(unfence_diagram(text));
                output.push('\n');
                output.push_str(CLOSING_FENCE);
            }
            ReportPart::Part1 | ReportPart::Part2 => output.push_str(text),
        }

        output
    }

    /// Write one part. Returns the path written.
    pub fn write(&self, part: ReportPart, text: &str) -> Result<PathBuf> {
        let path = self.path_for(part);
        let content = self.render(part, text);

        let mut file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(path)
    }
}

/// Strip one surrounding ```` ```mermaid ```` fence from model output.
///
/// Text that is not fenced comes back trimmed and otherwise unchanged, so
/// the writer never produces a fence inside a fence.
pub fn unfence_diagram(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix(MERMAID_FENCE) {
        body = rest.trim();
    }
    if let Some(rest) = body.strip_suffix(CLOSING_FENCE) {
        body = rest.trim();
    }
    body
}
