//! Report generation pipeline.
//!
//! Runs the fixed sequence: output directory, script aggregation, template
//! loading, then part 1, a configured pause, part 2 and the diagram. Input
//! preparation failures are fatal. Generation and write failures are
//! reported and the next step still runs, since a partial report is still
//! worth keeping.

use crate::config::Config;
use crate::gemini::{ContentGenerator, GenerationRequest};
use crate::models::{GenerationOutcome, ModelSettings, ReportPart};
use crate::prompt::{PromptSet, PromptTemplate};
use crate::report::ReportWriter;
use crate::scanner::{AggregatedScripts, ScriptScanner};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Everything read from disk before the first API call.
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub scripts: AggregatedScripts,
    pub prompts: PromptSet,
}

/// What a run produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub written: Vec<(ReportPart, PathBuf)>,
    pub failed: Vec<ReportPart>,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.written.len() == ReportPart::ALL.len()
    }
}

/// Aggregate scripts and load templates. No output is written.
pub fn prepare_inputs(config: &Config) -> Result<PreparedInput> {
    println!("\n[Step 1/5] Loading input script data...");
    let scanner = ScriptScanner::new(&config.input.directory, &config.input.file_pattern)?;
    let scripts = scanner.aggregate()?.with_context(|| {
        format!(
            "Failed to load input scripts: nothing usable matched '{}' in {}",
            config.input.file_pattern,
            scanner.directory().display()
        )
    })?;

    println!("\n[Step 2/5] Loading prompt templates...");
    let prompts = PromptSet::load(&config.prompts)?;

    check_input_size(&scripts, config.report_settings.max_input_tokens);

    Ok(PreparedInput { scripts, prompts })
}

/// Report the estimated prompt size. Returns false if it exceeds `limit`.
///
/// Exceeding the limit only warns; the service remains the authority on
/// what it accepts.
pub fn check_input_size(scripts: &AggregatedScripts, limit: Option<u64>) -> bool {
    let estimated = scripts.estimated_tokens();
    println!("\n📏 Estimated input tokens: ~{}", estimated);

    match limit {
        Some(max) if estimated > max => {
            warn!(
                "Estimated input ({} tokens) exceeds max_input_tokens ({}); the service may reject or truncate it",
                estimated, max
            );
            false
        }
        _ => true,
    }
}

/// Drives one run against a [`ContentGenerator`].
pub struct Pipeline<'a, G> {
    config: &'a Config,
    generator: &'a G,
    writer: ReportWriter,
    show_progress: bool,
}

impl<'a, G: ContentGenerator> Pipeline<'a, G> {
    pub fn new(config: &'a Config, generator: &'a G) -> Self {
        let writer = ReportWriter::new(
            &config.output.directory,
            &config.output.base_filename,
            &config.output.title,
        );

        Self {
            config,
            generator,
            writer,
            show_progress: true,
        }
    }

    /// Show or hide the countdown between report parts.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Create the output directory and load all inputs.
    pub fn prepare(&self) -> Result<PreparedInput> {
        let dir = self.writer.ensure_output_dir()?;
        println!("\n📁 Output directory: {}", dir.display());

        prepare_inputs(self.config)
    }

    /// Prepare inputs, then generate and write every part.
    pub async fn run(&self) -> Result<RunSummary> {
        let input = self.prepare()?;
        Ok(self.generate_reports(&input).await)
    }

    /// Generate and write part 1, part 2 and the diagram.
    pub async fn generate_reports(&self, input: &PreparedInput) -> RunSummary {
        let mut summary = RunSummary::default();
        let report_settings = self.config.report_model_settings();
        let other_settings = self.config.other_model_settings();

        for (step, part) in ReportPart::ALL.into_iter().enumerate() {
            if part == ReportPart::Part2 {
                self.wait_interval(self.config.report_settings.interval_seconds)
                    .await;
            }

            let (template, settings): (&PromptTemplate, &ModelSettings) = match part {
                ReportPart::Part1 => (&input.prompts.part1, &report_settings),
                ReportPart::Part2 => (&input.prompts.part2, &report_settings),
                ReportPart::Diagram => (&input.prompts.diagram, &other_settings),
            };

            println!("\n[Step {}/5] Starting {} generation...", step + 3, part);
            let prompt = template.render(&input.scripts.content);

            match self.generate_part(part, &prompt, settings).await {
                Some(path) => summary.written.push((part, path)),
                None => summary.failed.push(part),
            }
        }

        summary
    }

    /// Open the chat session on the diagram model.
    pub fn start_chat(&self) -> Result<G::Chat> {
        self.generator
            .start_chat(&self.config.other_model_settings())
    }

    async fn generate_part(
        &self,
        part: ReportPart,
        prompt: &str,
        settings: &ModelSettings,
    ) -> Option<PathBuf> {
        let task = part.to_string();
        println!("   ⏳ Generating {}... This may take some time.", task);

        let outcome = self
            .generator
            .generate(&GenerationRequest {
                prompt,
                settings,
                task: &task,
            })
            .await;

        match outcome {
            GenerationOutcome::Success { text, feedback } => {
                debug!("{} feedback: {}", task, feedback);
                match self.writer.write(part, &text) {
                    Ok(path) => {
                        info!("{} saved to {}", task, path.display());
                        println!("   ✅ {} saved to: {}", task, path.display());
                        Some(path)
                    }
                    Err(e) => {
                        error!("Error saving {}: {:#}", task, e);
                        println!("   ❌ Error saving {}: {:#}", task, e);
                        None
                    }
                }
            }
            GenerationOutcome::SafetyBlocked { feedback } => {
                error!("{} generation failed: empty response or safety block", task);
                println!("   ❌ {} generation failed", task);
                println!("      Error: Empty response or safety block");
                println!("      Prompt feedback: {}", feedback);
                None
            }
            GenerationOutcome::TransportError { detail } => {
                error!("{} generation failed: {}", task, detail);
                println!("   ❌ {} generation failed", task);
                println!("      Error: {}", detail);
                None
            }
        }
    }

    async fn wait_interval(&self, seconds: u64) {
        if seconds == 0 {
            return;
        }

        println!(
            "\n⏳ Waiting for {} seconds before generating Part 2...",
            seconds
        );

        let pb = if self.show_progress {
            ProgressBar::new(seconds)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len}s")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        for _ in 0..seconds {
            tokio::time::sleep(Duration::from_secs(1)).await;
            pb.inc(1);
        }

        pb.finish_and_clear();
    }
}
