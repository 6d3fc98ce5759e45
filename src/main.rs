use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use patchbot_core::{Env, OutputFormat, PatchbotConfig, TriggerMode};
use patchbot_review::event::{normalize_event, EventDisposition};
use patchbot_review::github::GitHubGateway;
use patchbot_review::pipeline::ReviewOrchestrator;

#[derive(Parser)]
#[command(
    name = "patchbot",
    version,
    about = "Automated pull request reviewer backed by a chat-completion model",
    long_about = "Patchbot reviews the files changed in a pull request and posts the\n\
                   model's answer as an inline comment on each file.\n\n\
                   Examples:\n  \
                     patchbot review                      Review the PR from the Actions event\n  \
                     patchbot review --event-path e.json  Review a saved event payload\n  \
                     patchbot --format json review        Print the full run report\n  \
                     patchbot init                        Write a default .patchbot.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .patchbot.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format: text prints the status, json the full run report
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Review the pull request described by a webhook event
    #[command(long_about = "Review the pull request described by a webhook event.\n\n\
        Accepts pull_request, pull_request_target and repository_dispatch events.\n\
        Model settings come from OPENAI_API_KEY, MODEL, LANGUAGE, PROMPT and friends;\n\
        file selection from TARGETS and IGNORE (use IGNORE=NONE to exclude nothing).\n\n\
        Examples:\n  patchbot review\n  patchbot review --event-name repository_dispatch --trigger-mode command")]
    Review {
        /// Webhook event name
        #[arg(long, env = "GITHUB_EVENT_NAME")]
        event_name: String,

        /// Path to the JSON event payload
        #[arg(long, env = "GITHUB_EVENT_PATH")]
        event_path: PathBuf,

        /// GitHub token used to read the diff and post comments
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,

        /// GitHub API base URL (for GitHub Enterprise)
        #[arg(long, env = "GITHUB_API_URL")]
        api_url: Option<String>,

        /// What triggered this run; `command` skips the no-review label check
        #[arg(long)]
        trigger_mode: Option<TriggerMode>,
    },
    /// Create a default .patchbot.toml in the current directory
    Init,
}

const DEFAULT_CONFIG: &str = r#"# Patchbot Configuration
# Environment variables override every value below.

[llm]
# OpenAI-compatible endpoint (env: OPENAI_API_ENDPOINT)
# base_url = "https://api.openai.com/v1"
# model = "gpt-4o"
# temperature = 1.0
# top_p = 1.0
# max_tokens = 4000
# max_model_tokens = 20000
# The key is read from OPENAI_API_KEY or the repository variable of that name.

[filter]
# Files must match one of these globs to be reviewed (env: TARGETS)
include = ["**/*"]
# Globs to skip; "NONE" excludes nothing (env: IGNORE)
exclude = "NONE"
# max_patch_length = 50000
# trigger_mode = "event"
# no_review_labels = ["no-review-by-ChatGPT", "renovate/Major", "renovate/Minor", "renovate/Patch", "renovate/security"]

[prompt]
# language = "Japanese"
# template = "Review this patch for security issues"
"#;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_event(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read event payload {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Review {
            ref event_name,
            ref event_path,
            ref github_token,
            ref api_url,
            trigger_mode,
        } => {
            let payload = read_event(event_path)?;
            let target = match normalize_event(event_name, &payload)? {
                EventDisposition::Review(target) => target,
                EventDisposition::Ignored(reason) => {
                    tracing::info!("{reason}");
                    println!("{reason}");
                    return Ok(());
                }
            };

            let mut config = PatchbotConfig::load(cli.config.as_deref(), &Env::real())?;
            if let Some(mode) = trigger_mode {
                config.filter.trigger_mode = mode;
            }
            tracing::debug!(
                model = %config.llm.model,
                trigger_mode = %config.filter.trigger_mode,
                pr = target.pull_request.number,
                repo = %target.repo,
                "starting review"
            );

            let gateway = GitHubGateway::new(github_token.as_deref(), api_url.as_deref())?;
            let orchestrator = ReviewOrchestrator::new(gateway, config);
            let report = orchestrator.run(&target).await;

            match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&report).into_diagnostic()?
                    );
                }
                OutputFormat::Text => {
                    println!("{}", report.status);
                    if cli.verbose {
                        eprintln!(
                            "reviewed {} file(s), posted {} comment(s), skipped {}, failed {}",
                            report.verdicts.len(),
                            report.comments_posted(),
                            report.skipped.len(),
                            report.failures(),
                        );
                    }
                }
            }
        }
        Command::Init => {
            let path = Path::new(".patchbot.toml");
            if path.exists() {
                miette::bail!(".patchbot.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .patchbot.toml with default configuration");
        }
    }

    Ok(())
}
