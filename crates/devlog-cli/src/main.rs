mod cmd_config;
mod cmd_context;
mod cmd_hook;
mod cmd_install;
mod cmd_signals;
mod cmd_worker;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use devlog_store::SignalPaths;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "devlog", version, about = "Commit-triggered journal signals")]
struct Cli {
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hook entrypoints (called by git)
    Hook {
        #[command(subcommand)]
        cmd: HookCmd,
    },
    /// Install the git post-commit hook
    Install {
        /// Replace an existing hook without keeping a backup
        #[arg(long)]
        force: bool,
    },
    /// Remove the git post-commit hook (restores any backup)
    Uninstall,
    /// Inspect or prune the signal directory
    Signals {
        #[command(subcommand)]
        cmd: cmd_signals::SignalsCmd,
    },
    /// Print the context bundle for a commit as JSON
    Context {
        /// Commit reference (defaults to HEAD)
        commit: Option<String>,
        /// Diff budget in bytes (defaults to `context.max_diff_bytes`)
        #[arg(long)]
        max_diff_bytes: Option<usize>,
    },
    /// Read or write configuration
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
    /// Background worker (spawned by the hook)
    Worker {
        #[command(subcommand)]
        cmd: WorkerCmd,
    },
}

#[derive(Subcommand)]
enum HookCmd {
    /// git post-commit: emit signals and spawn the worker. Always exits 0.
    PostCommit {
        /// Commit hash (defaults to HEAD)
        #[arg(long)]
        commit: Option<String>,
    },
}

#[derive(Subcommand)]
enum WorkerCmd {
    /// Run one bounded worker invocation
    Run(cmd_worker::RunArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let repo_root = SignalPaths::find_root(&cwd).unwrap_or(cwd);

    match cli.cmd {
        Command::Hook { cmd } => match cmd {
            HookCmd::PostCommit { commit } => cmd_hook::post_commit(&repo_root, commit.as_deref()),
        },
        Command::Install { force } => cmd_install::install(&repo_root, force),
        Command::Uninstall => cmd_install::uninstall(&repo_root),
        Command::Signals { cmd } => cmd_signals::run(cmd, &repo_root),
        Command::Context {
            commit,
            max_diff_bytes,
        } => cmd_context::execute(&repo_root, commit.as_deref(), max_diff_bytes),
        Command::Config { cmd } => cmd_config::run(cmd, &repo_root),
        Command::Worker { cmd } => match cmd {
            WorkerCmd::Run(args) => cmd_worker::run(args),
        },
    }
}

/// `DEVLOG_LOG` takes an `EnvFilter` directive. The default stays quiet so
/// the hook never clutters `git commit` output.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("devlog=debug")
    } else {
        EnvFilter::try_from_env("DEVLOG_LOG").unwrap_or_else(|_| EnvFilter::new("devlog=warn"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .with(filter)
        .init();
}
