//! Research history.
//!
//! Keeps the most recent completed runs in memory and, when a directory is
//! configured, mirrors each one to `<dir>/<run-id>.json`.

use crate::persistence::{atomic_write_json, load_json_dir};
use crate::research::run::ResearchRun;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bounded store of completed runs, newest last.
pub struct ResearchHistory {
    runs: RwLock<VecDeque<Arc<ResearchRun>>>,
    capacity: usize,
    dir: Option<PathBuf>,
}

impl ResearchHistory {
    /// An in-memory history holding at most `capacity` runs.
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            runs: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            dir: None,
        }
    }

    /// A history persisted under `dir`, pre-loaded with the newest runs found there.
    pub fn open(dir: &Path, capacity: usize) -> io::Result<Self> {
        let mut runs: Vec<(PathBuf, ResearchRun)> = load_json_dir(dir)?;
        runs.sort_by_key(|(_, r)| r.started_at);
        let history = Self {
            capacity: capacity.max(1),
            dir: Some(dir.to_path_buf()),
            runs: RwLock::new(VecDeque::with_capacity(capacity)),
        };
        let skip = runs.len().saturating_sub(history.capacity);
        for (path, _) in &runs[..skip] {
            remove_run_file(path);
        }
        {
            let mut ring = history.runs.write().unwrap_or_else(|e| e.into_inner());
            ring.extend(runs.into_iter().skip(skip).map(|(_, run)| Arc::new(run)));
        }
        info!(dir = %dir.display(), loaded = history.len(), "Research history opened");
        Ok(history)
    }

    /// Record a completed run. The oldest run is evicted once at capacity,
    /// along with its file.
    ///
    /// Persistence failures are logged and do not affect the in-memory record.
    pub fn record(&self, run: Arc<ResearchRun>) {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{}.json", run.id));
            match atomic_write_json(&path, run.as_ref()) {
                Ok(()) => debug!(path = %path.display(), "Persisted research run"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to persist research run"),
            }
        }
        let mut ring = self.runs.write().unwrap_or_else(|e| e.into_inner());
        let mut evicted = Vec::new();
        while ring.len() >= self.capacity {
            evicted.extend(ring.pop_front());
        }
        ring.push_back(run);
        drop(ring);

        if let Some(dir) = &self.dir {
            for old in evicted {
                remove_run_file(&dir.join(format!("{}.json", old.id)));
            }
        }
    }

    /// Up to `limit` runs, most recent first.
    pub fn recent(&self, limit: usize) -> Vec<Arc<ResearchRun>> {
        let ring = self.runs.read().unwrap_or_else(|e| e.into_inner());
        ring.iter().rev().take(limit).cloned().collect()
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<ResearchRun>> {
        let ring = self.runs.read().unwrap_or_else(|e| e.into_inner());
        ring.iter().find(|r| r.id == id).cloned()
    }

    /// Find a run by full id or unambiguous id prefix.
    pub fn find(&self, id_or_prefix: &str) -> Option<Arc<ResearchRun>> {
        if let Ok(id) = id_or_prefix.parse::<Uuid>() {
            return self.get(id);
        }
        let prefix = id_or_prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return None;
        }
        let ring = self.runs.read().unwrap_or_else(|e| e.into_inner());
        let mut matches = ring.iter().filter(|r| r.id.to_string().starts_with(&prefix));
        match (matches.next(), matches.next()) {
            (Some(run), None) => Some(Arc::clone(run)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.runs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn remove_run_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed evicted research run"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove evicted research run"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchDepth;
    use crate::mode::ExecutionMode;
    use tempfile::TempDir;

    fn run(query: &str) -> Arc<ResearchRun> {
        Arc::new(ResearchRun::new(query, ResearchDepth::Quick, ExecutionMode::simulated()))
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let history = ResearchHistory::in_memory(2);
        let first = run("first");
        history.record(first.clone());
        history.record(run("second"));
        history.record(run("third"));

        assert_eq!(history.len(), 2);
        assert!(history.get(first.id).is_none());
        let recent = history.recent(10);
        assert_eq!(recent[0].query, "third");
        assert_eq!(recent[1].query, "second");
    }

    #[test]
    fn test_recent_limit() {
        let history = ResearchHistory::in_memory(50);
        for i in 0..5 {
            history.record(run(&format!("q{i}")));
        }
        let recent = history.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].query, "q4");
    }

    #[test]
    fn test_find_by_prefix() {
        let history = ResearchHistory::in_memory(10);
        let r = run("x");
        history.record(r.clone());
        let prefix = &r.id.to_string()[..8];
        assert_eq!(history.find(prefix).map(|f| f.id), Some(r.id));
        assert_eq!(history.find(&r.id.to_string()).map(|f| f.id), Some(r.id));
        assert!(history.find("").is_none());
        assert!(history.find("zzzz").is_none());
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let r = run("persisted question");
        {
            let history = ResearchHistory::open(dir.path(), 10).unwrap();
            assert!(history.is_empty());
            history.record(r.clone());
        }
        assert!(dir.path().join(format!("{}.json", r.id)).exists());

        let reopened = ResearchHistory::open(dir.path(), 10).unwrap();
        let loaded = reopened.get(r.id).unwrap();
        assert_eq!(loaded.query, "persisted question");
        assert_eq!(loaded.mode, ExecutionMode::simulated());
    }

    #[test]
    fn test_open_respects_capacity() {
        let dir = TempDir::new().unwrap();
        {
            let history = ResearchHistory::open(dir.path(), 10).unwrap();
            for i in 0..4 {
                history.record(run(&format!("q{i}")));
            }
        }
        let reopened = ResearchHistory::open(dir.path(), 2).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(json_files(dir.path()), 2);
    }

    fn json_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .flatten()
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .count()
    }

    #[test]
    fn test_eviction_removes_run_file() {
        let dir = TempDir::new().unwrap();
        let history = ResearchHistory::open(dir.path(), 2).unwrap();
        let first = run("first");
        history.record(first.clone());
        history.record(run("second"));
        history.record(run("third"));

        assert_eq!(json_files(dir.path()), 2);
        assert!(!dir.path().join(format!("{}.json", first.id)).exists());
        let reopened = ResearchHistory::open(dir.path(), 10).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.get(first.id).is_none());
    }
}
