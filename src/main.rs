use anyhow::{Context, Result};
use clap::Parser;
use console::{Term, style};
use prerelease_checks::checks::{ReleaseContext, build_phases};
use prerelease_checks::config::{CheckOptions, Overrides};
use prerelease_checks::pipeline::Engine;
use prerelease_checks::tools::{GitCli, NpmCli, Probe};
use prerelease_checks::ui::{ChecksUI, UiMode};
use std::path::PathBuf;
use std::sync::Arc;

/// Exit status for configuration rejected before any check runs.
const EXIT_CONFIG_ERROR: i32 = 2;

#[derive(Parser)]
#[command(name = "prerelease-checks")]
#[command(
    version,
    about = "Verify a package is ready to publish: git checkout, npm toolchain and registry access"
)]
pub struct Cli {
    /// Branch releases must be cut from [default: master]
    #[arg(long)]
    pub release_branch: Option<String>,

    /// Version range npm must satisfy [default: >=6.8.0]
    #[arg(long)]
    pub required_npm: Option<String>,

    /// Version range git must satisfy [default: >=2.11.0]
    #[arg(long)]
    pub required_git: Option<String>,

    /// Directory to check (defaults to the current directory)
    #[arg(long)]
    pub project_dir: Option<PathBuf>,

    /// Seconds to wait for a registry to answer [default: 5]
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Progress output: full, minimal or json
    #[arg(long, default_value = "full")]
    pub ui: String,

    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            release_branch: self.release_branch.clone(),
            required_npm: self.required_npm.clone(),
            required_git: self.required_git.clone(),
            timeout_secs: self.timeout_secs,
            unpublished_package: None,
        }
    }

    /// Spinners need a terminal; anything else gets plain lines.
    fn ui_mode(&self) -> UiMode {
        match UiMode::parse(&self.ui) {
            UiMode::Full if !Term::stderr().is_term() => UiMode::Minimal,
            mode => mode,
        }
    }
}

fn setup_logging(verbose: bool, json: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.log_json);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let options = match CheckOptions::load(&project_dir, cli.overrides()) {
        Ok(options) => options,
        Err(error) => {
            eprintln!("{} {}", style("Configuration error:").red().bold(), error);
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };
    tracing::debug!(?options, "resolved options");

    let probe = Probe::new(options.timeout).context("Failed to build HTTP client")?;
    let git = Arc::new(GitCli::new(&options.project_dir));
    let npm = Arc::new(NpmCli::new(&options.project_dir, probe));
    let phases = build_phases(git, npm);

    let ui = Arc::new(ChecksUI::new(cli.ui_mode()));
    let mut ctx = ReleaseContext::new(options);
    let result = Engine::new(ui).run(&phases, &mut ctx).await;

    if let Some(failure) = &result.failure {
        eprintln!("{} {}", style("Release check failed:").red().bold(), failure);
    }
    std::process::exit(result.exit_code());
}
