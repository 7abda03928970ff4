//! chat-memory CLI
//!
//! Runs the conversation memory pipeline over a JSON transcript and prints
//! the result as JSON on stdout. Logs go to stderr.

use anyhow::Context;
use chat_memory::memory::pick_tier;
use chat_memory::provider::OpenAiCompatGenerator;
use chat_memory::transcript::conversational_view;
use chat_memory::{sanitize, AppConfig, Detector, MemoryPipeline, PipelineConfig, Summarizer, Turn};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// chat-memory - decide when and how to summarize chat history
#[derive(Parser, Debug)]
#[command(name = "chat-memory")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config.toml (defaults to ~/.chat-memory/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output: debug-level logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and print the decision
    Run {
        #[command(flatten)]
        transcript: TranscriptArg,

        /// Base system prompt
        #[arg(long, conflicts_with = "system_prompt_file")]
        system_prompt: Option<String>,

        /// Read the base system prompt from a file
        #[arg(long)]
        system_prompt_file: Option<PathBuf>,
    },
    /// Print a medium-length plain summary of the transcript
    Preview {
        #[command(flatten)]
        transcript: TranscriptArg,
    },
    /// Print size, language and salience measurements (no model calls)
    Measure {
        #[command(flatten)]
        transcript: TranscriptArg,
    },
    /// Sanitize text read from stdin
    Sanitize,
}

#[derive(Args, Debug)]
struct TranscriptArg {
    /// JSON array of {"role", "content"} messages
    #[arg(long = "transcript", short = 't')]
    path: PathBuf,
}

#[derive(Serialize)]
struct MeasureReport {
    turns: usize,
    tier: chat_memory::SummaryTier,
    passes_gate: bool,
    #[serde(flatten)]
    measurement: chat_memory::SalienceMeasurement,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref()).await;
    run_command(cli.command, config).await
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn build_pipeline(config: AppConfig) -> MemoryPipeline {
    debug!(
        "Summarizer chain: {}",
        config.models.iter().collect::<Vec<_>>().join(" -> ")
    );
    let generator = Arc::new(OpenAiCompatGenerator::new(config.provider));
    MemoryPipeline::new(Summarizer::new(generator, config.models), config.pipeline)
}

async fn run_command(command: Command, config: AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Run {
            transcript,
            system_prompt,
            system_prompt_file,
        } => {
            let turns = load_transcript(&transcript.path).await?;
            let base_prompt = match (system_prompt, system_prompt_file) {
                (Some(text), _) => text,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read system prompt {}", path.display()))?,
                (None, None) => String::new(),
            };

            info!("Running memory pipeline over {} messages", turns.len());
            let decision = build_pipeline(config).run(&turns, &base_prompt).await;
            print_json(&decision)
        }
        Command::Preview { transcript } => {
            let turns = load_transcript(&transcript.path).await?;
            let preview = build_pipeline(config).preview(&turns).await;
            print_json(&preview)
        }
        Command::Measure { transcript } => {
            let turns = load_transcript(&transcript.path).await?;
            print_json(&measure_report(&turns, &config.pipeline))
        }
        Command::Sanitize => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            writeln!(io::stdout(), "{}", sanitize(&input))?;
            Ok(())
        }
    }
}

/// Measurements and gate verdict only. Builds no summarizer or HTTP client.
fn measure_report(turns: &[Turn], config: &PipelineConfig) -> MeasureReport {
    let view = conversational_view(turns);
    let measurement = Detector::default().measure(&view);

    MeasureReport {
        turns: view.len(),
        tier: pick_tier(measurement.approx_token_count),
        passes_gate: config.passes_gate(view.len(), &measurement),
        measurement,
    }
}

async fn load_transcript(path: &Path) -> anyhow::Result<Vec<Turn>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read transcript {}", path.display()))?;
    parse_transcript(&content).with_context(|| format!("Invalid transcript {}", path.display()))
}

fn parse_transcript(content: &str) -> anyhow::Result<Vec<Turn>> {
    Ok(serde_json::from_str(content)?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
