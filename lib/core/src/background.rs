// Background snapshot refresh
// A single-slot job queue drained by one worker thread. Requests that arrive
// while a rebuild is pending collapse into it; only the freshest data matters.

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::snapshot::{Snapshot, SnapshotHandle};
use crate::source::RecordSource;
use crate::{Error, Result};

/// Load `source`, fit, and publish the result into `snapshots`.
///
/// On failure nothing is published and the current snapshot stays in place.
/// Returns the generation that was built.
pub fn rebuild(source: &dyn RecordSource, snapshots: &SnapshotHandle) -> Result<u64> {
    let generation = snapshots.next_generation();
    let started = Instant::now();
    let table = source.load()?;
    let rows = table.len();
    let snapshot = Snapshot::build(table, generation);
    let vocabulary = snapshot.model().vocabulary_size();
    let published = snapshots.publish(snapshot);
    tracing::info!(
        generation,
        rows,
        vocabulary,
        published,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Snapshot rebuilt from {}",
        source.describe()
    );
    Ok(generation)
}

#[derive(Debug, Default)]
struct Slot {
    pending: bool,
    running: bool,
    shutdown: bool,
    // number of requests accepted so far
    tickets: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    pub requested: u64,
    pub completed: u64,
    pub failed: u64,
    pub last_error: Option<String>,
}

struct Shared {
    slot: Mutex<Slot>,
    condvar: Condvar,
    source: Arc<dyn RecordSource>,
    snapshots: Arc<SnapshotHandle>,
    completed: AtomicU64,
    failed: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl Shared {
    fn run(&self) {
        loop {
            {
                let mut slot = self.slot.lock();
                while !slot.pending && !slot.shutdown {
                    self.condvar.wait(&mut slot);
                }
                if !slot.pending {
                    break;
                }
                slot.pending = false;
                slot.running = true;
            }

            match rebuild(self.source.as_ref(), &self.snapshots) {
                Ok(_) => {
                    self.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error = %e, "Snapshot refresh failed, keeping previous generation");
                    *self.last_error.lock() = Some(e.to_string());
                }
            }

            let mut slot = self.slot.lock();
            slot.running = false;
            self.condvar.notify_all();
        }
    }
}

/// Rebuilds snapshots off the request path.
pub struct RefreshWorker {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshWorker {
    /// Spawn the worker thread.
    pub fn start(source: Arc<dyn RecordSource>, snapshots: Arc<SnapshotHandle>) -> Result<Self> {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot::default()),
            condvar: Condvar::new(),
            source,
            snapshots,
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            last_error: Mutex::new(None),
        });

        let worker = shared.clone();
        let handle = thread::Builder::new()
            .name("snapshot-refresh".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Ask for a rebuild. Returns the request ticket.
    ///
    /// If a rebuild is already pending this request rides along with it; if
    /// one is running, another run is scheduled after it so that writes made
    /// before this call are picked up.
    pub fn request(&self) -> Result<u64> {
        let mut slot = self.shared.slot.lock();
        if slot.shutdown {
            return Err(Error::Worker("refresh worker is shut down".to_string()));
        }
        slot.tickets += 1;
        slot.pending = true;
        self.shared.condvar.notify_all();
        Ok(slot.tickets)
    }

    /// Block until nothing is pending or running, or `timeout` elapses.
    /// Returns `true` when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock();
        while slot.pending || slot.running {
            if self.shared.condvar.wait_until(&mut slot, deadline).timed_out() {
                return !(slot.pending || slot.running);
            }
        }
        true
    }

    pub fn stats(&self) -> RefreshStats {
        RefreshStats {
            requested: self.shared.slot.lock().tickets,
            completed: self.shared.completed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            last_error: self.shared.last_error.lock().clone(),
        }
    }

    /// Stop accepting requests, finish any pending rebuild, join the thread.
    pub fn shutdown(&self) {
        {
            let mut slot = self.shared.slot.lock();
            slot.shutdown = true;
            self.shared.condvar.notify_all();
        }
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                tracing::error!("Snapshot refresh thread panicked");
            }
        }
    }
}

impl Drop for RefreshWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DesignRecord, RecordTable};
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc;

    #[derive(Default)]
    struct MemorySource {
        records: Mutex<Vec<DesignRecord>>,
        fail: AtomicBool,
        loads: AtomicU64,
        gate: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl RecordSource for MemorySource {
        fn load(&self) -> Result<RecordTable> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if let Some(rx) = self.gate.lock().take() {
                let _ = rx.recv();
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Source("unreachable".to_string()));
            }
            Ok(RecordTable::new(self.records.lock().clone()))
        }

        fn append(&self, record: &DesignRecord) -> Result<()> {
            self.records.lock().push(record.clone());
            Ok(())
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    fn record(i: usize) -> DesignRecord {
        DesignRecord::new(format!("R{i}"), "사출금형", format!("커버{i}"))
    }

    #[test]
    fn test_rebuild_publishes() {
        let source = MemorySource::default();
        source.append(&record(1)).unwrap();
        let snapshots = SnapshotHandle::default();
        let generation = rebuild(&source, &snapshots).unwrap();
        assert_eq!(generation, 1);
        assert_eq!(snapshots.current().len(), 1);
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_snapshot() {
        let source = MemorySource::default();
        source.append(&record(1)).unwrap();
        let snapshots = SnapshotHandle::default();
        rebuild(&source, &snapshots).unwrap();

        source.append(&record(2)).unwrap();
        source.fail.store(true, Ordering::SeqCst);
        assert!(rebuild(&source, &snapshots).is_err());
        assert_eq!(snapshots.current().len(), 1);
        assert_eq!(snapshots.generation(), 1);
    }

    #[test]
    fn test_worker_refreshes_after_append() {
        let source = Arc::new(MemorySource::default());
        let snapshots = Arc::new(SnapshotHandle::default());
        let worker = RefreshWorker::start(source.clone(), snapshots.clone()).unwrap();

        source.append(&record(1)).unwrap();
        source.append(&record(2)).unwrap();
        assert_eq!(worker.request().unwrap(), 1);
        assert!(worker.wait_idle(Duration::from_secs(5)));

        let snap = snapshots.current();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.matrix().n_rows(), 2);
        assert_eq!(worker.stats().completed, 1);
    }

    #[test]
    fn test_requests_coalesce_while_busy() {
        let source = Arc::new(MemorySource::default());
        let (release, gate) = mpsc::channel();
        *source.gate.lock() = Some(gate);

        let snapshots = Arc::new(SnapshotHandle::default());
        let worker = RefreshWorker::start(source.clone(), snapshots.clone()).unwrap();

        worker.request().unwrap();
        // wait for the first load to block on the gate
        let deadline = Instant::now() + Duration::from_secs(5);
        while source.loads.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        for i in 0..10 {
            source.append(&record(i)).unwrap();
            worker.request().unwrap();
        }
        release.send(()).unwrap();
        assert!(worker.wait_idle(Duration::from_secs(5)));

        // the blocked run plus one coalesced run for the ten requests
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
        assert_eq!(snapshots.current().len(), 10);
        assert_eq!(worker.stats().requested, 11);
    }

    #[test]
    fn test_worker_failure_is_recorded() {
        let source = Arc::new(MemorySource::default());
        source.append(&record(1)).unwrap();
        let snapshots = Arc::new(SnapshotHandle::default());
        rebuild(source.as_ref(), &snapshots).unwrap();

        let worker = RefreshWorker::start(source.clone(), snapshots.clone()).unwrap();
        source.fail.store(true, Ordering::SeqCst);
        worker.request().unwrap();
        assert!(worker.wait_idle(Duration::from_secs(5)));

        let stats = worker.stats();
        assert_eq!(stats.failed, 1);
        assert!(stats.last_error.unwrap().contains("unreachable"));
        assert_eq!(snapshots.current().len(), 1);
    }

    #[test]
    fn test_request_after_shutdown_fails() {
        let source = Arc::new(MemorySource::default());
        let snapshots = Arc::new(SnapshotHandle::default());
        let worker = RefreshWorker::start(source, snapshots).unwrap();
        worker.shutdown();
        assert!(matches!(worker.request(), Err(Error::Worker(_))));
        // idempotent
        worker.shutdown();
    }
}
