use devlog_context::ContextResolver;
use devlog_store::{Config, SignalPaths};
use std::path::Path;

pub fn execute(repo_root: &Path, commit: Option<&str>, max_diff_bytes: Option<usize>) -> anyhow::Result<()> {
    let max = max_diff_bytes.unwrap_or_else(|| Config::load(&SignalPaths::discover(repo_root)).max_diff_bytes);
    let resolver = ContextResolver::new(repo_root).with_max_diff_bytes(max);
    let commit = match commit {
        Some(c) => c.to_string(),
        None => resolver.head_commit()?,
    };

    let ctx = resolver.resolve(&commit)?;
    println!("{}", serde_json::to_string_pretty(&ctx)?);
    Ok(())
}
