//! `cr-agent`: CLI front-end for the review pipeline.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cr_reviewer::pipeline::PipelineConfig;
use cr_reviewer::{ChangeRequestId, ProviderConfig, ProviderKind, run_review};

#[derive(Parser)]
#[command(
    name = "cr-agent",
    version,
    about = "Automated code review for pull and merge requests"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Review one pull/merge request and post findings as inline comments.
    Review {
        /// Hosting platform of the change request.
        #[arg(long, value_enum)]
        platform: Platform,

        /// "owner/name" (GitHub) or the full project path (GitLab).
        #[arg(long)]
        repository: String,

        /// Pull request number / merge request iid.
        #[arg(long)]
        request_id: u64,

        /// Directory of custom instruction files mixed into every prompt.
        #[arg(long, env = "REVIEW_INSTRUCTIONS_DIR")]
        instructions_path: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Platform {
    Github,
    Gitlab,
}

impl From<Platform> for ProviderKind {
    fn from(p: Platform) -> Self {
        match p {
            Platform::Github => ProviderKind::GitHub,
            Platform::Gitlab => ProviderKind::GitLab,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // A .env file is a developer convenience, not a requirement.
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Review {
            platform,
            repository,
            request_id,
            instructions_path,
        } => review(platform, repository, request_id, instructions_path).await,
    }
}

async fn review(
    platform: Platform,
    repository: String,
    request_id: u64,
    instructions_path: Option<PathBuf>,
) -> ExitCode {
    let provider = match ProviderConfig::from_env(platform.into()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            return ExitCode::FAILURE;
        }
    };
    let mut cfg = PipelineConfig::from_env(provider);
    if instructions_path.is_some() {
        cfg.instructions_dir = instructions_path;
    }

    let id = ChangeRequestId {
        repository,
        iid: request_id,
    };

    match run_review(cfg, &id).await {
        Ok(report) if report.files_total == 0 => {
            println!("{}", "nothing reviewable in this change request".yellow());
            ExitCode::SUCCESS
        }
        Ok(report) => {
            let summary = format!(
                "{}/{} reviews done and posted successfully",
                report.files_reviewed, report.files_total
            );
            if report.is_failure() {
                println!("{}", summary.red());
                ExitCode::FAILURE
            } else {
                println!("{}", summary.green());
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
