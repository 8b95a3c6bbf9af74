use moldrec_core::{
    rebuild, DesignRecord, Error, RecordSource, Recommendation, RefreshStats, RefreshWorker, Result,
    Snapshot, SnapshotHandle,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::csv_source::CsvSource;
use crate::github::{GithubConfig, GithubSync, SyncOutcome};
use crate::sqlite_source::SqliteSource;

/// Where the design records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    Csv { path: PathBuf },
    Sqlite { path: PathBuf, table: String },
}

impl SourceConfig {
    pub fn open(&self) -> Result<Arc<dyn RecordSource>> {
        match self {
            SourceConfig::Csv { path } => Ok(Arc::new(CsvSource::new(path))),
            SourceConfig::Sqlite { path, table } => {
                let source = SqliteSource::open(path, table)
                    .map_err(|e| Error::Database(format!("{:#}", e)))?;
                Ok(Arc::new(source))
            }
        }
    }
}

/// Owns the record source, the current snapshot and the refresh worker.
pub struct StorageManager {
    source: Arc<dyn RecordSource>,
    snapshots: Arc<SnapshotHandle>,
    worker: RefreshWorker,
    github: Option<GithubSync>,
}

impl StorageManager {
    /// Load and fit once, synchronously, then start the refresh worker.
    /// A failing first load is fatal: there is no previous snapshot to keep.
    pub fn new(source: Arc<dyn RecordSource>) -> Result<Self> {
        let snapshots = Arc::new(SnapshotHandle::default());
        rebuild(source.as_ref(), &snapshots)?;
        let worker = RefreshWorker::start(source.clone(), snapshots.clone())?;
        Ok(Self {
            source,
            snapshots,
            worker,
            github: None,
        })
    }

    pub fn open(config: &SourceConfig) -> Result<Self> {
        Self::new(config.open()?)
    }

    /// Enable GitHub sync. Ignored for sources without a local file.
    pub fn with_github(mut self, config: &GithubConfig) -> Result<Self> {
        let sync = GithubSync::from_config(config).map_err(|e| Error::InvalidConfig(format!("{:#}", e)))?;
        if sync.is_some() && self.source.file_path().is_none() {
            tracing::warn!(
                "GitHub sync configured but {} has no local file; sync disabled",
                self.source.describe()
            );
            return Ok(self);
        }
        self.github = sync;
        Ok(self)
    }

    #[inline]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.current()
    }

    #[inline]
    pub fn snapshots(&self) -> &Arc<SnapshotHandle> {
        &self.snapshots
    }

    #[inline]
    #[must_use]
    pub fn github_enabled(&self) -> bool {
        self.github.is_some()
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// Rank the current generation against `query`.
    pub fn recommend(&self, query: &str, top_n: usize) -> Vec<Recommendation> {
        self.snapshots.current().recommend(query, top_n)
    }

    /// Persist `record` and queue a refresh. Returns the refresh ticket.
    pub fn append_and_refresh(&self, record: &DesignRecord) -> Result<u64> {
        self.source.append(record)?;
        tracing::info!(code = %record.code, "Appended record to {}", self.source.describe());
        self.worker.request()
    }

    /// Queue a refresh without changing the store.
    pub fn refresh(&self) -> Result<u64> {
        self.worker.request()
    }

    /// Rebuild on the calling thread.
    pub fn refresh_now(&self) -> Result<u64> {
        rebuild(self.source.as_ref(), &self.snapshots)
    }

    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.worker.wait_idle(timeout)
    }

    pub fn refresh_stats(&self) -> RefreshStats {
        self.worker.stats()
    }

    /// Push the source file to GitHub. `None` when sync is off.
    pub async fn sync_to_github(&self, code: &str) -> Option<Result<SyncOutcome>> {
        let github = self.github.as_ref()?;
        let content = match self.source.read_file()? {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "GitHub sync skipped, source file unreadable");
                return Some(Err(e));
            }
        };
        let message = format!("update CSV by API ({})", if code.is_empty() { "unknown" } else { code });
        let outcome = github
            .upload(&content, &message)
            .await
            .map_err(|e| Error::Sync(format!("{:#}", e)));
        if let Err(e) = &outcome {
            tracing::warn!(error = %e, "GitHub sync failed");
        }
        Some(outcome)
    }

    pub fn shutdown(&self) {
        self.worker.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn csv_fixture(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("designs.csv");
        fs::write(
            &path,
            "제번,고객사,품명,제품,제품종류\n\
             25-001,현대,핸들커버(구형),도어,사출금형\n\
             25-002,기아,손잡이,트렁크,사출금형\n\
             25-003,현대,브라켓,시트,프레스금형\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_open_csv_and_recommend() {
        let dir = TempDir::new().unwrap();
        let manager = StorageManager::open(&SourceConfig::Csv { path: csv_fixture(&dir) }).unwrap();
        assert_eq!(manager.snapshot().len(), 3);
        assert_eq!(manager.snapshot().generation(), 1);

        let results = manager.recommend("사출금형 핸들", 10);
        assert_eq!(results[0].record.code, "25-001");
    }

    #[test]
    fn test_open_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let config = SourceConfig::Csv { path: dir.path().join("missing.csv") };
        assert!(StorageManager::open(&config).is_err());
    }

    #[test]
    fn test_append_refreshes_in_background() {
        let dir = TempDir::new().unwrap();
        let manager = StorageManager::open(&SourceConfig::Csv { path: csv_fixture(&dir) }).unwrap();

        let before = manager.snapshot();
        manager
            .append_and_refresh(&DesignRecord::new("25-004", "프레스금형", "가이드 핀"))
            .unwrap();
        assert!(manager.wait_idle(Duration::from_secs(5)));

        let after = manager.snapshot();
        assert_eq!(after.len(), 4);
        assert_eq!(after.matrix().n_rows(), 4);
        assert!(after.generation() > before.generation());
        // the reader that held the old generation still sees a consistent bundle
        assert_eq!(before.len(), before.matrix().n_rows());

        let results = manager.recommend("프레스금형 가이드", 1);
        assert_eq!(results[0].record.code, "25-004");
    }

    #[test]
    fn test_broken_source_keeps_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = csv_fixture(&dir);
        let manager = StorageManager::open(&SourceConfig::Csv { path: path.clone() }).unwrap();

        fs::write(&path, [0xffu8, 0xfe]).unwrap();
        manager.refresh().unwrap();
        assert!(manager.wait_idle(Duration::from_secs(5)));

        assert_eq!(manager.snapshot().len(), 3);
        assert_eq!(manager.refresh_stats().failed, 1);
        assert!(manager.refresh_now().is_err());
    }

    #[test]
    fn test_sqlite_source() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("mold.db");
        let source = SqliteSource::open(&db, "designs").unwrap();
        source.import_csv(csv_fixture(&dir), 500).unwrap();
        drop(source);

        let manager = StorageManager::open(&SourceConfig::Sqlite {
            path: db,
            table: "designs".to_string(),
        })
        .unwrap();
        assert_eq!(manager.snapshot().len(), 3);
        assert!(manager.source_description().starts_with("sqlite:"));
    }

    #[test]
    fn test_github_needs_local_file() {
        let manager = StorageManager::new(Arc::new(SqliteSource::open_in_memory("designs").unwrap()))
            .unwrap()
            .with_github(&GithubConfig {
                token: Some("t".into()),
                repo: Some("acme/molds".into()),
                file: Some("list.csv".into()),
                ..GithubConfig::default()
            })
            .unwrap();
        assert!(!manager.github_enabled());
    }
}
