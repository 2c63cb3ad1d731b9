//! Document discovery: find the documentation repo root and its AsciiDoc files.

use crate::types::CqaConfig;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Find the documentation repo root by walking up from CWD.
///
/// Strategy:
/// - Pass 1: Check `config.root_markers` in order
/// - Pass 2: Check for `.git` directory
/// - Pass 3: Fall back to CWD
pub fn find_root(config: &CqaConfig) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_root_from(&cwd, config)
}

pub fn find_root_from(start: &Path, config: &CqaConfig) -> PathBuf {
    // Pass 1: Look for repo marker entries
    for dir in start.ancestors() {
        if config.root_markers.iter().any(|m| dir.join(m).exists()) {
            return dir.to_path_buf();
        }
    }

    // Pass 2: Look for .git directory
    for dir in start.ancestors() {
        if dir.join(".git").exists() {
            return dir.to_path_buf();
        }
    }

    // Pass 3: Fall back to the starting directory
    warn!("no documentation root marker found, using {}", start.display());
    start.to_path_buf()
}

/// Discover all documents under `root`, sorted, skipping `config.skip_dirs`.
pub fn find_documents(root: &Path, config: &CqaConfig) -> Vec<PathBuf> {
    let pattern = root.join(format!("**/*.{}", config.document_extension));
    let mut found = Vec::new();

    match glob::glob(&pattern.to_string_lossy()) {
        Ok(entries) => {
            for entry in entries {
                match entry {
                    Ok(path) if path.is_file() && !is_skipped(&path, root, config) => {
                        found.push(path)
                    }
                    Ok(_) => {}
                    Err(e) => warn!("unreadable path during discovery: {}", e),
                }
            }
        }
        Err(e) => warn!("invalid discovery pattern {}: {}", pattern.display(), e),
    }

    found.sort();
    found
}

fn is_skipped(path: &Path, root: &Path, config: &CqaConfig) -> bool {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|name| config.skip_dirs.contains(&name))
    })
}

/// Repo-relative path with forward slashes, as used in the JTBD mapping.
pub fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
