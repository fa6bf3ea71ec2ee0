//! Seen-PR tracking to avoid duplicate notifications
//!
//! [`SeenSet`] is the pure in-memory set. [`PrTracker`] wraps it with an
//! optional JSON state file so suppression survives restarts. Persistence is
//! best effort: a broken state file is logged and never stops the monitor.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::record::PrId;
use crate::Result;

/// How long persisted entries are kept across restarts
pub const RETENTION_DAYS: i64 = 30;

const STATE_VERSION: &str = "1.0";

/// Set of PR ids already notified, with the time each was first marked
///
/// Grows monotonically; there is no removal API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    entries: HashMap<PrId, DateTime<Utc>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff `id` has never been marked
    pub fn is_new(&self, id: PrId) -> bool {
        !self.entries.contains_key(&id)
    }

    /// Mark `id` as seen, returning whether it was newly added
    pub fn mark_seen(&mut self, id: PrId) -> bool {
        self.mark_seen_at(id, Utc::now())
    }

    fn mark_seen_at(&mut self, id: PrId, at: DateTime<Utc>) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, at);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// When `id` was first marked
    pub fn seen_at(&self, id: PrId) -> Option<DateTime<Utc>> {
        self.entries.get(&id).copied()
    }
}

/// On-disk layout of the state file
#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    last_updated: Option<String>,
    #[serde(default)]
    prs: Vec<StateEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum StateEntry {
    Timestamped { id: PrId, timestamp: String },
    /// Bare ids from older state files, kept regardless of age
    Legacy(PrId),
    /// Anything else; skipped so one bad entry can't discard the rest
    Malformed(serde_json::Value),
}

/// JSON file backing a [`PrTracker`]
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Read the file, dropping entries older than the retention window
    ///
    /// Returns the loaded set and whether any entry was discarded.
    fn read(&self, now: DateTime<Utc>) -> Result<Option<(SeenSet, bool)>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let doc: StateDocument = serde_json::from_str(&contents)?;

        let cutoff = now - Duration::days(RETENTION_DAYS);
        let total = doc.prs.len();
        let mut set = SeenSet::new();
        for entry in doc.prs {
            match entry {
                StateEntry::Timestamped { id, timestamp } => {
                    match DateTime::parse_from_rfc3339(&timestamp) {
                        Ok(ts) if ts.with_timezone(&Utc) >= cutoff => {
                            set.mark_seen_at(id, ts.with_timezone(&Utc));
                        }
                        Ok(_) => {}
                        Err(e) => warn!(
                            id,
                            %timestamp,
                            error = %e,
                            "Skipping entry with invalid timestamp"
                        ),
                    }
                }
                StateEntry::Legacy(id) => {
                    set.mark_seen_at(id, now);
                }
                StateEntry::Malformed(value) => {
                    warn!(entry = %value, "Skipping malformed PR tracking entry");
                }
            }
        }
        let pruned = set.len() != total;
        Ok(Some((set, pruned)))
    }

    /// Atomically replace the file with `set`
    fn write(&self, set: &SeenSet) -> Result<()> {
        let mut entries: Vec<(&PrId, &DateTime<Utc>)> = set.entries.iter().collect();
        entries.sort_by_key(|(id, _)| **id);
        let prs = entries
            .into_iter()
            .map(|(id, at)| StateEntry::Timestamped {
                id: *id,
                timestamp: at.to_rfc3339(),
            })
            .collect();

        let doc = StateDocument {
            version: Some(STATE_VERSION.to_string()),
            last_updated: Some(Utc::now().to_rfc3339()),
            prs,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.temp_path();
        let result = serde_json::to_string_pretty(&doc)
            .map_err(crate::Error::from)
            .and_then(|json| std::fs::write(&tmp, json).map_err(crate::Error::from))
            .and_then(|_| std::fs::rename(&tmp, &self.path).map_err(crate::Error::from));

        if result.is_err() && tmp.exists() {
            let _ = std::fs::remove_file(&tmp);
        }
        result
    }
}

/// Seen-PR tracker used by the monitor loop
#[derive(Debug, Default)]
pub struct PrTracker {
    seen: SeenSet,
    store: Option<StateFile>,
}

impl PrTracker {
    /// Tracker with no persistence
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Tracker backed by `path`, loading whatever is there
    ///
    /// A missing or unreadable file yields an empty tracker.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::open_at(path, Utc::now())
    }

    fn open_at(path: impl Into<PathBuf>, now: DateTime<Utc>) -> Self {
        let store = StateFile::new(path);
        let seen = match store.read(now) {
            Ok(Some((seen, pruned))) => {
                info!(count = seen.len(), path = %store.path().display(), "Loaded seen PR ids");
                if pruned {
                    if let Err(e) = store.write(&seen) {
                        error!(error = %e, "Failed to rewrite pruned PR tracking file");
                    }
                }
                seen
            }
            Ok(None) => {
                info!(
                    path = %store.path().display(),
                    "No existing PR tracking file found, starting fresh"
                );
                SeenSet::new()
            }
            Err(e) => {
                warn!(
                    path = %store.path().display(),
                    error = %e,
                    "Error loading seen PRs, starting with empty tracking"
                );
                SeenSet::new()
            }
        };
        Self {
            seen,
            store: Some(store),
        }
    }

    pub fn is_new(&self, id: PrId) -> bool {
        self.seen.is_new(id)
    }

    /// Mark `id` as seen and persist; no-op if already seen
    pub fn mark_seen(&mut self, id: PrId) {
        if !self.seen.mark_seen(id) {
            return;
        }
        debug!(id, "Marked PR as seen");
        self.save();
    }

    /// Write the current set to the state file, if any
    pub fn save(&self) {
        let Some(store) = &self.store else {
            return;
        };
        match store.write(&self.seen) {
            Ok(()) => debug!(count = self.seen.len(), "Saved seen PR ids"),
            Err(e) => error!(path = %store.path().display(), error = %e, "Error saving seen PRs"),
        }
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Path of the backing state file
    pub fn state_path(&self) -> Option<&Path> {
        self.store.as_ref().map(StateFile::path)
    }
}
