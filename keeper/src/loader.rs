//! Policy and snapshot loading from the file system

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use treasury_model::{Policy, Snapshot};

/// Read and validate the active policy
pub fn load_policy(path: &str) -> Result<Policy> {
    let expanded = shellexpand::tilde(path);
    let text = std::fs::read_to_string(expanded.as_ref())
        .context(format!("Failed to read policy from {}", path))?;

    let policy: Policy = serde_json::from_str(&text)
        .context(format!("Failed to parse policy JSON in {}", path))?;
    policy
        .validate()
        .context(format!("Invalid policy in {}", path))?;

    Ok(policy)
}

/// Parse one snapshot file
pub fn parse_snapshot(path: &Path) -> Result<Snapshot> {
    let text = std::fs::read_to_string(path)
        .context(format!("Failed to read snapshot {}", path.display()))?;

    let snapshot: Snapshot = serde_json::from_str(&text)
        .context(format!("Failed to parse snapshot JSON in {}", path.display()))?;
    snapshot
        .validate()
        .context(format!("Invalid snapshot in {}", path.display()))?;

    Ok(snapshot)
}

/// Every valid `*.json` snapshot in `dir`, sorted by id.
///
/// Unreadable or invalid files are logged and skipped; for duplicate ids the
/// first file in path order wins.
pub fn load_snapshots(dir: &str) -> Result<Vec<Snapshot>> {
    let expanded = shellexpand::tilde(dir);
    let entries = std::fs::read_dir(expanded.as_ref())
        .context(format!("Failed to read snapshot directory {}", dir))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut seen = BTreeSet::new();
    let mut snapshots = Vec::with_capacity(paths.len());
    for path in paths {
        match parse_snapshot(&path) {
            Ok(snapshot) => {
                if !seen.insert(snapshot.id.clone()) {
                    log::warn!(
                        "Skipping {}: duplicate snapshot id {}",
                        path.display(),
                        snapshot.id
                    );
                    continue;
                }
                snapshots.push(snapshot);
            }
            Err(e) => log::warn!("Skipping {}: {:#}", path.display(), e),
        }
    }

    snapshots.sort_by(|a, b| a.id.cmp(&b.id));
    log::debug!("Loaded {} snapshot(s) from {}", snapshots.len(), dir);
    Ok(snapshots)
}
