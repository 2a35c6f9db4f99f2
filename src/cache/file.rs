//! Durable cache tier: one JSON file per key under a configured directory,
//! named by the key's digest. Corrupt files are treated as misses so a bad
//! write never wedges the tier; directory-level IO failure surfaces as
//! `TierUnavailable`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::cache::{CacheEntry, CacheTier, TierName, TierUnavailable};
use crate::model::CacheKey;

pub struct FileTier {
    dir: PathBuf,
}

impl FileTier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.digest()))
    }

    fn unavailable(&self, reason: impl Into<String>) -> TierUnavailable {
        TierUnavailable {
            tier: TierName::File,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CacheTier for FileTier {
    fn name(&self) -> TierName {
        TierName::File
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, TierUnavailable> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.unavailable(format!("read {}: {e}", path.display()))),
        };
        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!(key = %key, path = %path.display(), error = %e, "corrupt cache file treated as miss");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), TierUnavailable> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.unavailable(format!("create {}: {e}", self.dir.display())))?;
        let path = self.path_for(key);
        let bytes = serde_json::to_vec_pretty(&entry)
            .map_err(|e| self.unavailable(format!("serialize entry: {e}")))?;
        fs::write(&path, bytes)
            .await
            .map_err(|e| self.unavailable(format!("write {}: {e}", path.display())))
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), TierUnavailable> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.unavailable(format!("remove {}: {e}", path.display()))),
        }
    }

    async fn count(&self) -> Result<usize, TierUnavailable> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(self.unavailable(format!("read_dir {}: {e}", self.dir.display()))),
        };
        let mut n = 0;
        loop {
            match dir.next_entry().await {
                Ok(Some(item)) => {
                    if item
                        .path()
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
                    {
                        n += 1;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    return Err(self.unavailable(format!("read_dir {}: {e}", self.dir.display())))
                }
            }
        }
        Ok(n)
    }
}
