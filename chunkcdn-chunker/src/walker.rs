//! Finds the files to chunk below an input directory.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the walked root, `/`-separated.
    pub key: String,
    pub length: u64,
}

#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub files: Vec<SourceFile>,
    pub skipped: u64,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Walk `root` and return every regular, non-hidden file, sorted by key.
///
/// Hidden directories are pruned, hidden files and non-regular entries
/// (symlinks, sockets, devices) are counted as skipped. `exclude` is pruned
/// as well, so an output directory inside the input tree is never chunked.
pub fn collect_sources(root: &Path, exclude: Option<&Path>) -> Result<WalkOutcome> {
    let root = root
        .canonicalize()
        .with_context(|| format!("cannot resolve input directory {}", root.display()))?;
    let exclude = exclude.and_then(|p| p.canonicalize().ok());

    let mut outcome = WalkOutcome::default();
    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            if exclude.as_deref() == Some(e.path()) {
                return false;
            }
            !(e.file_type().is_dir() && is_hidden(e))
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            continue;
        }
        if is_hidden(&entry) {
            debug!("skip hidden file: {}", entry.path().display());
            outcome.skipped += 1;
            continue;
        }
        if !file_type.is_file() {
            warn!("skip non-regular file: {}", entry.path().display());
            outcome.skipped += 1;
            continue;
        }

        let Some(key) = relative_key(&root, entry.path()) else {
            warn!("skip file with non UTF-8 path: {}", entry.path().display());
            outcome.skipped += 1;
            continue;
        };
        let length = entry
            .metadata()
            .with_context(|| format!("stat {}", entry.path().display()))?
            .len();

        if key.contains('/') {
            warn!("{key} is nested and will not be reachable through the reconstructor");
        }
        outcome.files.push(SourceFile {
            path: entry.into_path(),
            key,
            length,
        });
    }

    Ok(outcome)
}
