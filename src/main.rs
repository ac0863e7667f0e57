use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use git_stack::config::Config;
use git_stack::process::ShellRunner;
use git_stack::rebase::RebaseStrategy;
use git_stack::terminal::TerminalUi;
use git_stack::workflow::Workflow;

/// Sync a stack of commits to one pull request per layer.
#[derive(Parser, Debug)]
#[command(name = "git-stack", version)]
struct Cli {
    /// Skip the drift check and every confirmation
    #[arg(short, long)]
    force: bool,

    /// Print the stack status and exit
    #[arg(short, long)]
    check: bool,

    /// Run git hooks when replaying and pushing (default)
    #[arg(long, overrides_with = "no_verify")]
    verify: bool,

    /// Skip git hooks when replaying and pushing
    #[arg(long, overrides_with = "verify")]
    no_verify: bool,

    /// Replay strategy: in-memory (git-revise) or incremental-disk (cherry-pick)
    #[arg(long, default_value = "in-memory")]
    rebase: RebaseStrategy,

    /// Show debug output, including review cache hits and misses
    #[arg(short, long)]
    verbose: bool,

    /// Base branch, detected from origin when omitted
    #[arg(short, long)]
    branch: Option<String>,

    #[arg(long, hide = true)]
    debug: bool,

    /// Write the workflow state to disk after every step (requires --debug)
    #[arg(long, hide = true)]
    write_state_json: bool,

    /// Give unassigned commits a synthetic stack id (requires --debug)
    #[arg(long, hide = true)]
    mock_metadata: bool,
}

impl Cli {
    fn config(self) -> Config {
        Config::new()
            .with_force(self.force)
            .with_check(self.check)
            .with_verify(self.verify || !self.no_verify)
            .with_rebase(self.rebase)
            .with_verbose(self.verbose)
            .with_branch(self.branch)
            .with_debug(self.debug)
            .with_write_state_json(self.write_state_json)
            .with_mock_metadata(self.mock_metadata)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "git_stack=debug" } else { "git_stack=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.config();
    tracing::debug!(?config, "starting");

    let code = Workflow::new(ShellRunner::new(), TerminalUi::new(), config)
        .run()
        .await;
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
