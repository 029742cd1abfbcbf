//! ctigen - Cyber Threat Intelligence report generator
//!
//! A CLI tool that aggregates analysis scripts, asks Gemini for a two-part
//! CTI report and a Mermaid relationship diagram, then opens an interactive
//! chat session against the same service.
//!
//! Exit codes:
//!   0 - Success (chat ended normally, or --no-chat / --dry-run)
//!   1 - Fatal startup error (config, credential, inputs, output directory)

mod chat;
mod cli;
mod config;
mod gemini;
mod models;
mod pipeline;
mod prompt;
mod report;
mod scanner;

use anyhow::{Context, Result};
use cli::Args;
use config::Config;
use gemini::{ContentGenerator, GeminiClient};
use models::ReportPart;
use pipeline::{Pipeline, RunSummary};
use tokio::io::BufReader;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config(&args);
    }

    // Initialize logging
    init_logging(&args);

    info!("ctigen v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: write a sample config file.
fn handle_init_config(args: &Args) -> Result<()> {
    let path = args.config.as_path();

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            path.display()
        );
        std::process::exit(1);
    }

    std::fs::write(path, Config::sample_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✅ Created {} with sample settings.", path.display());
    println!("   Edit it to point at your scripts, prompts and models.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete workflow. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    println!("🛡️  Automated CTI Report Generator using Gemini");

    let mut config = Config::load(&args.config)?;
    config.merge_with_args(&args);
    info!("Configuration loaded from {}", args.config.display());

    if args.dry_run {
        return handle_dry_run(&config);
    }

    let api_key = config.api_key()?;
    let client = GeminiClient::new(&config.api_base, api_key)?;
    println!("🔑 API key loaded from ${}", config.api_key_env_var);

    println!("🤖 Models:");
    println!("   Report: {}", config.models.report_model);
    println!("   Other:  {}", config.models.other_model);
    println!("   Interval: {}s", config.report_settings.interval_seconds);

    let pipeline = Pipeline::new(&config, &client).with_progress(!args.quiet);
    let summary = pipeline.run().await?;

    print_summary(&summary);

    if !args.no_chat {
        run_chat(&pipeline).await?;
    }

    println!("\n✅ Finished.");
    Ok(0)
}

/// Handle --dry-run: aggregate and render, make no API calls.
fn handle_dry_run(config: &Config) -> Result<i32> {
    println!("\n🔍 Dry run: loading scripts and templates (no API calls)...");

    let input = pipeline::prepare_inputs(config)?;

    println!("\n   Scripts included ({}):", input.scripts.files.len());
    for file in &input.scripts.files {
        println!("     📄 {}", file);
    }

    println!("\n   Rendered prompts:");
    for part in ReportPart::ALL {
        let template = match part {
            ReportPart::Part1 => &input.prompts.part1,
            ReportPart::Part2 => &input.prompts.part2,
            ReportPart::Diagram => &input.prompts.diagram,
        };
        let rendered = template.render(&input.scripts.content);
        println!(
            "     {}: template {} bytes, prompt {} chars (~{} tokens)",
            part,
            template.text_len(),
            rendered.chars().count(),
            scanner::estimate_tokens(&rendered)
        );
    }

    println!("\n✅ Dry run complete. No API calls were made.");
    Ok(0)
}

fn print_summary(summary: &RunSummary) {
    if summary.is_complete() {
        println!("\n📊 Report Summary: all parts written");
    } else {
        println!(
            "\n📊 Report Summary: {} of {} parts written",
            summary.written.len(),
            ReportPart::ALL.len()
        );
    }
    for (part, path) in &summary.written {
        println!("   ✅ {}: {}", part, path.display());
    }
    for part in &summary.failed {
        println!("   ❌ {}: not written", part);
    }
}

/// Start the chat session and hand stdin/stdout to the chat loop.
async fn run_chat<G: ContentGenerator>(pipeline: &Pipeline<'_, G>) -> Result<()> {
    println!("\n💬 Starting chat system");
    println!("   Ask questions about the scripts and the generated report.");
    println!(
        "   Type {} to end the chat.",
        chat::EXIT_COMMANDS
            .iter()
            .map(|c| format!("'{}'", c))
            .collect::<Vec<_>>()
            .join(" or ")
    );

    let mut session = match pipeline.start_chat() {
        Ok(session) => session,
        Err(e) => {
            error!("Error initializing chat: {:#}", e);
            println!("   ❌ Error initializing chat: {:#}", e);
            return Ok(());
        }
    };

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let exchanges = chat::run_chat_loop(&mut session, &mut stdin, &mut stdout).await?;

    info!("Chat ended after {} exchanges", exchanges);
    println!("\n💬 Chat system ended.");
    Ok(())
}
