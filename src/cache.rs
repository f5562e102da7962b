use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct EntryRef<'a, T> {
    operation: &'a str,
    fingerprint: &'a str,
    day: NaiveDate,
    value: &'a T,
}

#[derive(Deserialize)]
struct Entry<T> {
    operation: String,
    fingerprint: String,
    day: NaiveDate,
    value: T,
}

#[derive(Deserialize)]
struct EntryDay {
    day: NaiveDate,
}

/// On-disk read-through cache whose entries expire when the calendar day
/// changes.
///
/// Entries are keyed by operation name and a SHA-256 fingerprint of the
/// operation's inputs.
#[derive(Debug, Clone)]
pub struct DailyCache {
    dir: PathBuf,
}

impl DailyCache {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create cache directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn fingerprint<K: Serialize>(key: &K) -> anyhow::Result<String> {
        let bytes = serde_json::to_vec(key).context("failed to encode cache key")?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    pub fn get_or_insert_with<K, T, F>(
        &self,
        operation: &str,
        key: &K,
        today: NaiveDate,
        load: F,
    ) -> anyhow::Result<T>
    where
        K: Serialize,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> anyhow::Result<T>,
    {
        let fingerprint = Self::fingerprint(key)?;
        let path = self.entry_path(operation, &fingerprint);

        if let Some(value) = read_fresh(&path, operation, &fingerprint, today) {
            info!(operation, day = %today, "cache hit");
            return Ok(value);
        }

        let value = load()?;
        let entry = EntryRef {
            operation,
            fingerprint: &fingerprint,
            day: today,
            value: &value,
        };
        let bytes = serde_json::to_vec(&entry).context("failed to encode cache entry")?;
        fs::write(&path, bytes)
            .with_context(|| format!("failed to write cache entry {}", path.display()))?;
        debug!(operation, path = %path.display(), "cache entry stored");

        Ok(value)
    }

    /// Removes entries written on any day other than `today`.
    pub fn evict_stale(&self, today: NaiveDate) -> anyhow::Result<usize> {
        let mut removed = 0usize;

        for item in fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list cache directory {}", self.dir.display()))?
        {
            let path = item?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let stale = match fs::read(&path)
                .ok()
                .and_then(|bytes| serde_json::from_slice::<EntryDay>(&bytes).ok())
            {
                Some(entry) => entry.day != today,
                None => {
                    warn!(path = %path.display(), "unreadable cache entry");
                    true
                }
            };

            if stale {
                fs::remove_file(&path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    fn entry_path(&self, operation: &str, fingerprint: &str) -> PathBuf {
        self.dir
            .join(format!("{operation}-{}.json", &fingerprint[..16]))
    }
}

fn read_fresh<T: DeserializeOwned>(
    path: &Path,
    operation: &str,
    fingerprint: &str,
    today: NaiveDate,
) -> Option<T> {
    let bytes = fs::read(path).ok()?;
    let entry: Entry<T> = match serde_json::from_slice(&bytes) {
        Ok(entry) => entry,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring corrupt cache entry");
            return None;
        }
    };

    (entry.operation == operation && entry.fingerprint == fingerprint && entry.day == today)
        .then_some(entry.value)
}
