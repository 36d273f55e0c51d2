use std::fs;
use std::io::Write;
use std::path::Path;

pub mod config;
pub mod paths;

pub use config::Config;
pub use paths::SignalPaths;

/// Atomic write: write to temp file in same dir, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// Atomic create: like [`write_atomic`], but the final rename refuses to
/// replace an existing file (`ErrorKind::AlreadyExists`).
///
/// The temp file is dot-prefixed, so directory scanners that skip hidden
/// entries never see a partial write. The parent must already exist.
pub fn write_atomic_new(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("no parent dir for {}", path.display()),
        )
    })?;
    let mut tmp = tempfile::Builder::new().prefix(".tmp").tempfile_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(path).map_err(|e| e.error)?;
    Ok(())
}
