use std::path::{Path, PathBuf};

use clap::Subcommand;
use devlog_signals::{RetentionManager, SignalReader};
use devlog_store::{Config, SignalPaths};

#[derive(Subcommand)]
pub enum SignalsCmd {
    /// List pending signals, oldest first
    List {
        /// Output as JSON lines (one signal per line)
        #[arg(long)]
        json: bool,
    },
    /// Delete one processed signal
    Ack {
        /// Signal file (name or path)
        file: PathBuf,
    },
    /// Delete every pending signal
    Clear,
    /// Purge oldest signals while free disk space is below a floor
    Gc {
        /// Floor in bytes (defaults to `cleanup.min_free_bytes`)
        #[arg(long)]
        min_free: Option<u64>,
    },
}

pub fn run(cmd: SignalsCmd, repo_root: &Path) -> anyhow::Result<()> {
    let paths = SignalPaths::discover(repo_root);
    match cmd {
        SignalsCmd::List { json } => list(&paths, json),
        SignalsCmd::Ack { file } => ack(&paths, &file),
        SignalsCmd::Clear => clear(&paths),
        SignalsCmd::Gc { min_free } => gc(&paths, min_free),
    }
}

/// `devlog signals list`
fn list(paths: &SignalPaths, json: bool) -> anyhow::Result<()> {
    let pending = SignalReader::new(paths.clone()).pending()?;
    if pending.is_empty() && !json {
        println!("(no pending signals)");
        return Ok(());
    }
    for p in &pending {
        let file = p
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match (&p.signal, json) {
            (Ok(signal), true) => {
                let mut value = signal.to_value();
                value["file"] = serde_json::Value::String(file);
                println!("{}", serde_json::to_string(&value)?);
            }
            (Err(e), true) => {
                println!(
                    "{}",
                    serde_json::json!({ "file": file, "error": e.to_string() })
                );
            }
            (Ok(signal), false) => {
                println!("{file}  {}", serde_json::Value::Object(signal.params().clone()));
            }
            (Err(e), false) => println!("{file}  INVALID: {e}"),
        }
    }
    Ok(())
}

/// Accept either a bare file name or a path.
fn resolve_signal_file(paths: &SignalPaths, file: &Path) -> PathBuf {
    if file.components().count() == 1 {
        paths.signals_dir.join(file)
    } else {
        file.to_path_buf()
    }
}

/// `devlog signals ack <file>`
fn ack(paths: &SignalPaths, file: &Path) -> anyhow::Result<()> {
    let path = resolve_signal_file(paths, file);
    if SignalReader::new(paths.clone()).acknowledge(&path)? {
        println!("Removed {}", path.display());
    } else {
        println!("Already gone: {}", path.display());
    }
    Ok(())
}

/// `devlog signals clear`
fn clear(paths: &SignalPaths) -> anyhow::Result<()> {
    let removed = RetentionManager::new(paths.clone()).clear_for_new_commit()?;
    println!("Removed {removed} signal(s)");
    Ok(())
}

/// `devlog signals gc`
fn gc(paths: &SignalPaths, min_free: Option<u64>) -> anyhow::Result<()> {
    let floor = match min_free {
        Some(n) => n,
        None => Config::load(paths).min_free_bytes,
    };
    if floor == 0 {
        println!("No free-space floor set (use --min-free or cleanup.min_free_bytes)");
        return Ok(());
    }
    let removed =
        RetentionManager::new(paths.clone()).emergency_cleanup(&paths.signals_dir, floor)?;
    println!("Removed {removed} signal(s)");
    Ok(())
}
