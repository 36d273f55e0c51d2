use clap::Subcommand;
use devlog_store::config::{
    parse_value, read_config_file, user_config_path, write_config_file, KNOWN_KEYS,
};
use devlog_store::{Config, SignalPaths};
use std::path::{Path, PathBuf};

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (e.g. worker.timeout_secs)
        key: String,
        /// Config value (true/false/number/string; comma list for trigger.periods)
        value: String,
        /// Write the user file instead of the repository file
        #[arg(long)]
        user: bool,
    },
    /// Get a config value from one file
    Get {
        /// Config key
        key: String,
        #[arg(long)]
        user: bool,
    },
    /// List values set in one file
    List {
        #[arg(long)]
        user: bool,
    },
    /// Show the effective configuration after all layers
    Show,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, repo_root: &Path) -> anyhow::Result<()> {
    match cmd {
        ConfigCmd::Set { key, value, user } => set(repo_root, &key, &value, user),
        ConfigCmd::Get { key, user } => get(repo_root, &key, user),
        ConfigCmd::List { user } => list(repo_root, user),
        ConfigCmd::Show => show(repo_root),
    }
}

// ── Command Implementations ──

fn target_file(repo_root: &Path, user: bool) -> anyhow::Result<PathBuf> {
    if user {
        return user_config_path()
            .ok_or_else(|| anyhow::anyhow!("no user config directory on this platform"));
    }
    Ok(SignalPaths::discover(repo_root).config_json)
}

/// `devlog config set <key> <value>`
pub fn set(repo_root: &Path, key: &str, value: &str, user: bool) -> anyhow::Result<()> {
    if !KNOWN_KEYS.contains(&key) {
        anyhow::bail!("unknown config key `{key}` (known: {})", KNOWN_KEYS.join(", "));
    }
    if !user {
        // The repository file lives under `.devlog/`, which must exclude itself.
        SignalPaths::discover(repo_root).ensure_layout()?;
    }
    let path = target_file(repo_root, user)?;
    let mut config = read_config_file(&path)?;
    config.insert(key.to_string(), parse_value(key, value));
    write_config_file(&path, &config)?;
    println!("{key} = {value}");
    Ok(())
}

/// `devlog config get <key>`
pub fn get(repo_root: &Path, key: &str, user: bool) -> anyhow::Result<()> {
    let config = read_config_file(&target_file(repo_root, user)?)?;
    match config.get(key) {
        Some(val) => println!("{val}"),
        None => println!("(not set)"),
    }
    Ok(())
}

/// `devlog config list`
pub fn list(repo_root: &Path, user: bool) -> anyhow::Result<()> {
    let config = read_config_file(&target_file(repo_root, user)?)?;
    if config.is_empty() {
        println!("(no config set)");
    } else {
        for (k, v) in &config {
            println!("{k} = {v}");
        }
    }
    Ok(())
}

/// `devlog config show`
pub fn show(repo_root: &Path) -> anyhow::Result<()> {
    let c = Config::load(&SignalPaths::discover(repo_root));
    let periods: Vec<&str> = c.trigger_periods.iter().map(|g| g.as_str()).collect();
    println!("journal.root = {}", c.journal_root.display());
    println!("worker.enabled = {}", c.worker_enabled);
    println!("worker.timeout_secs = {}", c.worker_timeout_secs);
    println!(
        "worker.command = {}",
        c.worker_command.as_deref().unwrap_or("(none)")
    );
    println!(
        "worker.program = {}",
        c.worker_program
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(current executable)".into())
    );
    println!("cleanup.min_free_bytes = {}", c.min_free_bytes);
    println!("context.max_diff_bytes = {}", c.max_diff_bytes);
    println!("trigger.periods = {}", periods.join(","));
    if c.disabled {
        println!("(disabled by DEVLOG_DISABLE)");
    }
    Ok(())
}
