use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::logger;
use crate::types::Strength;

/// Samples kept per timing key.
pub const MAX_SAMPLES: usize = 5;

/// Key used when safe mode is off.
pub const FAST_KEY: &str = "fast";

pub fn timing_key(safe_mode: Option<Strength>) -> &'static str {
    match safe_mode {
        Some(s) => s.key(),
        None => FAST_KEY,
    }
}

/// One completed selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockTimingSample {
    pub elapsed_ms: u64,
    pub recorded_at: String,
}

impl LockTimingSample {
    pub fn now(elapsed: Duration) -> Self {
        Self {
            elapsed_ms: elapsed.as_millis() as u64,
            recorded_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Rolling lock timings keyed by strength (or `fast`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockStats {
    pub samples: BTreeMap<String, VecDeque<LockTimingSample>>,
}

impl LockStats {
    pub fn push(&mut self, key: &str, sample: LockTimingSample) {
        let list = self.samples.entry(key.to_string()).or_default();
        list.push_back(sample);
        while list.len() > MAX_SAMPLES {
            list.pop_front();
        }
    }

    pub fn average_ms(&self, key: &str) -> Option<u64> {
        let list = self.samples.get(key).filter(|l| !l.is_empty())?;
        Some(list.iter().map(|s| s.elapsed_ms).sum::<u64>() / list.len() as u64)
    }

    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Shared handle the engine appends to and the UI reads from. When a path
/// is set, every append is flushed to disk.
#[derive(Clone, Default)]
pub struct StatsStore {
    inner: Arc<Mutex<LockStats>>,
    path: Option<PathBuf>,
}

impl StatsStore {
    pub fn open(path: PathBuf) -> Self {
        Self { inner: Arc::new(Mutex::new(LockStats::load(&path))), path: Some(path) }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn append(&self, key: &str, sample: LockTimingSample) {
        let Ok(mut stats) = self.inner.lock() else { return };
        stats.push(key, sample);
        if let Some(path) = &self.path {
            if let Err(e) = stats.save(path) {
                logger::warn(&format!("failed to save stats: {}", e));
            }
        }
    }

    pub fn snapshot(&self) -> LockStats {
        self.inner.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ms: u64) -> LockTimingSample {
        LockTimingSample { elapsed_ms: ms, recorded_at: String::new() }
    }

    #[test]
    fn keeps_only_the_latest_five() {
        let mut stats = LockStats::default();
        for ms in 1..=7 {
            stats.push(FAST_KEY, sample(ms * 100));
        }
        let list = &stats.samples[FAST_KEY];
        assert_eq!(list.len(), MAX_SAMPLES);
        assert_eq!(list.front().unwrap().elapsed_ms, 300);
        assert_eq!(stats.average_ms(FAST_KEY), Some(500));
    }

    #[test]
    fn keys_are_independent() {
        let mut stats = LockStats::default();
        stats.push(timing_key(Some(Strength::High)), sample(900));
        stats.push(timing_key(None), sample(40));
        assert_eq!(stats.average_ms("high"), Some(900));
        assert_eq!(stats.average_ms("fast"), Some(40));
        assert_eq!(stats.average_ms("low"), None);
    }

    #[test]
    fn store_persists_each_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let store = StatsStore::open(path.clone());
        store.append("medium", sample(700));
        let reloaded = StatsStore::open(path);
        assert_eq!(reloaded.snapshot().average_ms("medium"), Some(700));
    }
}
