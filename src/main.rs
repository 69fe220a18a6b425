use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use codescribe::config::Config;
use codescribe::providers::OpenAiCompatibleBackend;
use codescribe::review::{render_review, AgentReviewResult, AnalysisRequest, ReviewPipeline};

/// Multi-agent code review for a unified diff.
#[derive(Parser, Debug)]
#[command(name = "codescribe", version, about)]
struct Cli {
    /// Config file (defaults to the user config dir, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Review a diff read from a file or stdin
    Review {
        /// Diff file; reads stdin when omitted
        #[arg(long)]
        diff: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Keep successful agents' results when some agents fail
        #[arg(long)]
        best_effort: bool,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the JSON schema of the configuration file
    Schema,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()))
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn read_diff(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => tokio::fs::read_to_string(p)
            .await
            .with_context(|| format!("Failed to read diff {}", p.display())),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read diff from stdin")?;
            Ok(buf)
        }
    }
}

/// Warn when the diff exceeds the configured review limits.
fn check_limits(request: &AnalysisRequest, config: &Config) {
    let files = request.changed_files().len();
    if files > config.max_files_per_review {
        tracing::warn!(
            "Diff touches {files} files, which exceeds the limit of {}. Some files may not be reviewed.",
            config.max_files_per_review
        );
    }
    let tokens = request.estimated_tokens();
    if tokens > config.max_tokens_per_request {
        tracing::warn!(
            "Diff is ~{tokens} tokens, above max_tokens_per_request ({})",
            config.max_tokens_per_request
        );
    }
}

fn print_results(results: &[AgentReviewResult], format: OutputFormat, config: &Config) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(results)?),
        OutputFormat::Markdown => {
            if let Some(md) = render_review(results, config.max_comment_length) {
                println!("{md}");
            }
        }
    }
    Ok(())
}

async fn run_review(
    config: &Config,
    diff: Option<&Path>,
    format: OutputFormat,
    best_effort: bool,
) -> Result<()> {
    if !config.enable_agentic_review {
        tracing::warn!("Agentic review is disabled (enable_agentic_review = false), skipping");
        return Ok(());
    }

    let request = AnalysisRequest::new(read_diff(diff).await?);
    if request.diff().trim().is_empty() {
        tracing::warn!("Empty diff, skipping review");
        return Ok(());
    }
    check_limits(&request, config);

    if config.backend.api_key.is_none() {
        tracing::warn!("No API key configured (set GROQ_API_KEY or backend.api_key)");
    }
    let backend = Arc::new(OpenAiCompatibleBackend::from_config(&config.backend));
    let pipeline = ReviewPipeline::from_config(config, backend);

    let results: Vec<AgentReviewResult> = if best_effort {
        pipeline
            .review_settled(&request)
            .await
            .into_iter()
            .filter_map(|outcome| outcome.into_result())
            .collect()
    } else {
        pipeline.review(&request).await
    };

    if pipeline.raw_fallbacks() > 0 {
        tracing::warn!(
            count = pipeline.raw_fallbacks(),
            "Some agent replies were not structured JSON"
        );
    }

    if results.is_empty() {
        tracing::warn!("No review produced");
        return Ok(());
    }

    print_results(&results, format, config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Review {
            diff,
            format,
            best_effort,
        } => run_review(&config, diff.as_deref(), format, best_effort).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let mut shown = config.clone();
                if shown.backend.api_key.is_some() {
                    shown.backend.api_key = Some("***".into());
                }
                print!("{}", toml::to_string_pretty(&shown)?);
                Ok(())
            }
            ConfigAction::Schema => {
                let schema = schemars::schema_for!(Config);
                println!("{}", serde_json::to_string_pretty(&schema)?);
                Ok(())
            }
        },
    }
}
