use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const HOOK_NAME: &str = "post-commit";
const BACKUP_SUFFIX: &str = ".devlog-backup";
const MARKER: &str = "# managed by devlog";

/// `devlog install`
pub fn install(repo_root: &Path, force: bool) -> anyhow::Result<()> {
    let hooks = hooks_dir(repo_root)?;
    let exe = std::env::current_exe()?;
    let path = install_into(&hooks, &exe, force)?;
    devlog_store::SignalPaths::discover(repo_root).ensure_layout()?;
    println!("Installed {}", path.display());
    Ok(())
}

/// `devlog uninstall`
pub fn uninstall(repo_root: &Path) -> anyhow::Result<()> {
    let hooks = hooks_dir(repo_root)?;
    match uninstall_from(&hooks)? {
        Uninstalled::Restored(p) => println!("Removed devlog hook, restored {}", p.display()),
        Uninstalled::Removed => println!("Removed devlog hook"),
        Uninstalled::NotInstalled => println!("No devlog hook installed"),
    }
    Ok(())
}

/// Ask git where hooks live; honours `core.hooksPath` and worktrees.
fn hooks_dir(repo_root: &Path) -> anyhow::Result<PathBuf> {
    let out = Command::new("git")
        .args(["rev-parse", "--git-path", "hooks"])
        .current_dir(repo_root)
        .output()
        .map_err(|e| anyhow::anyhow!("cannot run git: {e}"))?;
    if !out.status.success() {
        anyhow::bail!("{} is not a git repository", repo_root.display());
    }
    let rel = PathBuf::from(String::from_utf8_lossy(&out.stdout).trim());
    Ok(if rel.is_absolute() {
        rel
    } else {
        repo_root.join(rel)
    })
}

fn hook_script(exe: &Path) -> String {
    let exe = exe.display().to_string().replace('\'', r"'\''");
    format!(
        "#!/bin/sh\n{MARKER}\n'{exe}' hook post-commit --commit \"$(git rev-parse HEAD)\" >/dev/null 2>&1\nexit 0\n"
    )
}

fn is_ours(path: &Path) -> bool {
    fs::read_to_string(path)
        .map(|s| s.lines().any(|l| l == MARKER))
        .unwrap_or(false)
}

fn backup_path(hook: &Path) -> PathBuf {
    let mut name = hook.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Write the hook. A foreign hook is moved aside unless `force`.
fn install_into(hooks: &Path, exe: &Path, force: bool) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(hooks)?;
    let hook = hooks.join(HOOK_NAME);
    if hook.exists() && !is_ours(&hook) && !force {
        let backup = backup_path(&hook);
        if backup.exists() {
            anyhow::bail!(
                "{} exists and so does {}; rerun with --force to overwrite",
                hook.display(),
                backup.display()
            );
        }
        fs::rename(&hook, &backup)?;
        println!("Existing hook moved to {}", backup.display());
    }
    devlog_store::write_atomic(&hook, hook_script(exe).as_bytes())?;
    set_executable(&hook)?;
    Ok(hook)
}

#[derive(Debug, PartialEq, Eq)]
enum Uninstalled {
    Restored(PathBuf),
    Removed,
    NotInstalled,
}

fn uninstall_from(hooks: &Path) -> anyhow::Result<Uninstalled> {
    let hook = hooks.join(HOOK_NAME);
    if !hook.exists() || !is_ours(&hook) {
        return Ok(Uninstalled::NotInstalled);
    }
    fs::remove_file(&hook)?;
    let backup = backup_path(&hook);
    if backup.exists() {
        fs::rename(&backup, &hook)?;
        return Ok(Uninstalled::Restored(hook));
    }
    Ok(Uninstalled::Removed)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
