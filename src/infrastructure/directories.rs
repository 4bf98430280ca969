use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::config::DirectoryConfig;

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
}

/// Creates the log directory if needed and checks that it is writable.
pub fn ensure_directories(cfg: &DirectoryConfig) -> Result<ResolvedPaths> {
    let logs_dir = PathBuf::from(&cfg.logs_dir);
    if !logs_dir.exists() {
        fs::create_dir_all(&logs_dir)
            .with_context(|| format!("failed to create log directory {}", cfg.logs_dir))?;
    }

    let probe = logs_dir.join(".write-test");
    fs::write(&probe, b"ok")
        .with_context(|| format!("log directory {} is not writable", cfg.logs_dir))?;
    fs::remove_file(&probe)?;

    Ok(ResolvedPaths {
        logs_dir: logs_dir.canonicalize().unwrap_or(logs_dir),
    })
}
