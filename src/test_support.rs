use crate::locks::{GlobalLock, LockRecord};
use crate::process::LivenessProbe;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Liveness probe with a scripted set of running pids.
#[derive(Debug, Default)]
pub(crate) struct FakeProbe {
    alive: Mutex<HashSet<u32>>,
}

impl FakeProbe {
    pub(crate) fn with_alive(pids: &[u32]) -> Arc<Self> {
        Arc::new(Self {
            alive: Mutex::new(pids.iter().copied().collect()),
        })
    }

    pub(crate) fn kill(&self, pid: u32) {
        self.alive
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .remove(&pid);
    }
}

impl LivenessProbe for FakeProbe {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .contains(&pid)
    }
}

/// Temp directory plus a lock path inside it that does not exist yet.
pub(crate) fn temp_lock_dir() -> (TempDir, std::path::PathBuf) {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("test.lock.d");
    (temp, dir)
}

/// Global lock with fast retries, judging liveness through `probe`.
pub(crate) fn fast_lock(dir: &Path, probe: Arc<FakeProbe>) -> GlobalLock {
    GlobalLock::new(dir)
        .with_probe(probe)
        .with_jitter(Duration::from_millis(1), Duration::from_millis(5))
}

/// Leave a lock directory behind as if `pid` had acquired it and crashed.
pub(crate) fn plant_lock(dir: &Path, pid: u32) {
    std::fs::create_dir(dir).unwrap();
    let record = LockRecord {
        pid,
        ..LockRecord::current()
    };
    record.write(dir.join(crate::locks::RECORD_FILE_NAME)).unwrap();
}
