//! On-disk store for the last alerted verdict batch.
//!
//! Data model (JSON):
//!   { "saved_at": RFC 3339 timestamp,
//!     "verdicts": [NegRiskVerdict, ...] }   (feed order, each entry carries its url)
//!
//! Writes go to a sibling temp file that is renamed over the target, so a
//! crash mid-write leaves the previous snapshot intact.

use crate::arb::NegRiskVerdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt snapshot {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A persisted batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub saved_at: DateTime<Utc>,
    pub verdicts: Vec<NegRiskVerdict>,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the stored snapshot. A missing file is `Ok(None)`.
    pub async fn load(&self) -> Result<Option<StoredSnapshot>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored snapshot");
                return Ok(None);
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let snapshot: StoredSnapshot =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        debug!(
            path = %self.path.display(),
            verdicts = snapshot.verdicts.len(),
            saved_at = %snapshot.saved_at,
            "loaded stored snapshot"
        );
        Ok(Some(snapshot))
    }

    /// Like [`load`](Self::load) but any failure is logged and reported as
    /// "no prior state".
    pub async fn load_previous(&self) -> Option<Vec<NegRiskVerdict>> {
        match self.load().await {
            Ok(snapshot) => snapshot.map(|s| s.verdicts),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable snapshot, treating as first run");
                None
            }
        }
    }

    /// Replace the stored snapshot with `verdicts`.
    pub async fn save(&self, verdicts: &[NegRiskVerdict]) -> Result<(), StoreError> {
        let snapshot = StoredSnapshot {
            saved_at: Utc::now(),
            verdicts: verdicts.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;

        info!(path = %self.path.display(), verdicts = verdicts.len(), "snapshot saved");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arb::{evaluate_market, NegRiskParams};
    use crate::feed::{Contract, Market};
    use tempfile::TempDir;

    fn sample() -> Vec<NegRiskVerdict> {
        let params = NegRiskParams::default();
        vec![
            evaluate_market(
                &Market::new(
                    "https://x/1",
                    vec![
                        Contract::with_no_cost(0.40),
                        Contract::with_no_cost(0.35),
                        Contract::with_no_cost(0.20),
                    ],
                ),
                &params,
            ),
            evaluate_market(&Market::new("https://x/2", vec![]), &params),
        ]
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("neg_risk.json"));
        assert!(store.load().await.unwrap().is_none());
        assert!(store.load_previous().await.is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_keeps_every_field() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("neg_risk.json"));
        let verdicts = sample();

        store.save(&verdicts).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.verdicts, verdicts);
        assert!(!dir.path().join("neg_risk.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("neg_risk.json"));
        let verdicts = sample();

        store.save(&verdicts).await.unwrap();
        store.save(&verdicts[..1]).await.unwrap();
        assert_eq!(store.load_previous().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_falls_back_to_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("neg_risk.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let store = SnapshotStore::new(&path);

        assert!(matches!(store.load().await, Err(StoreError::Corrupt { .. })));
        assert!(store.load_previous().await.is_none());
    }

    #[tokio::test]
    async fn test_unwritable_path_is_error() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("missing-dir").join("neg_risk.json"));
        assert!(matches!(
            store.save(&sample()).await,
            Err(StoreError::Io { .. })
        ));
    }
}
