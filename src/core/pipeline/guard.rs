use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use tracing::{debug, warn};

use crate::core::error::{PackError, PackResult};
use crate::core::packager::BUILD_MARKER;

/// Pack roots with a build in flight. Cloning shares the set.
#[derive(Debug, Clone, Default)]
pub struct BuildLocks {
    active: Arc<Mutex<HashSet<PathBuf>>>,
}

impl BuildLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `pack_root`. Fails with `BuildInProgress` while another build
    /// holds it. The claim ends when the returned lock is dropped.
    pub fn acquire(&self, pack_root: &Path) -> PackResult<BuildLock> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| PackError::Other("build lock table poisoned".into()))?;
        if !active.insert(pack_root.to_path_buf()) {
            return Err(PackError::BuildInProgress(pack_root.to_path_buf()));
        }
        debug!(pack_root = ?pack_root, "Build lock acquired");
        Ok(BuildLock {
            pack_root: pack_root.to_path_buf(),
            locks: self.clone(),
        })
    }

    pub fn is_locked(&self, pack_root: &Path) -> bool {
        self.active
            .lock()
            .map(|active| active.contains(pack_root))
            .unwrap_or(false)
    }
}

/// Exclusive claim on one pack root.
#[derive(Debug)]
pub struct BuildLock {
    pack_root: PathBuf,
    locks: BuildLocks,
}

impl BuildLock {
    pub fn pack_root(&self) -> &Path {
        &self.pack_root
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Ok(mut active) = self.locks.active.lock() {
            active.remove(&self.pack_root);
        }
    }
}

/// Blocking work of one build (copy, archive) that the guard can stop and
/// wait for. Cloning shares the flag and the in-progress lock.
#[derive(Debug, Clone, Default)]
pub struct BlockingPhase {
    cancel: Arc<AtomicBool>,
    busy: Arc<Mutex<()>>,
}

impl BlockingPhase {
    /// Run `work` unless the build was already abandoned. `work` gets the
    /// cancel flag to poll between steps.
    pub fn run<T>(&self, work: impl FnOnce(&AtomicBool) -> T) -> Option<T> {
        let _busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        if self.cancel.load(Ordering::SeqCst) {
            return None;
        }
        Some(work(&self.cancel))
    }
}

/// Removes a half-built pack root unless the build reached `disarm`.
///
/// While armed the pack root carries the build marker, so the orphan sweep
/// can still find it if this cleanup never runs. Blocking work started
/// through `phase()` is cancelled and waited for before anything is removed.
#[derive(Debug)]
pub struct PartialBuildGuard {
    pack_root: PathBuf,
    tracked: Vec<PathBuf>,
    phase: BlockingPhase,
    lock: Option<BuildLock>,
    armed: bool,
}

impl PartialBuildGuard {
    /// Create `pack_root` and mark it as being built.
    pub fn begin(pack_root: &Path) -> PackResult<Self> {
        std::fs::create_dir_all(pack_root).map_err(|e| PackError::io(pack_root, e))?;
        let marker = pack_root.join(BUILD_MARKER);
        std::fs::write(&marker, b"").map_err(|e| PackError::io(&marker, e))?;
        Ok(Self {
            pack_root: pack_root.to_path_buf(),
            tracked: Vec::new(),
            phase: BlockingPhase::default(),
            lock: None,
            armed: true,
        })
    }

    pub fn phase(&self) -> BlockingPhase {
        self.phase.clone()
    }

    /// Keep `lock` until the guard is done, including a deferred cleanup.
    pub fn hold(&mut self, lock: BuildLock) {
        self.lock = Some(lock);
    }

    /// Also remove `file` if the build does not finish.
    pub fn track(&mut self, file: PathBuf) {
        self.tracked.push(file);
    }

    /// The build completed, keep the pack root.
    pub fn disarm(mut self) {
        self.armed = false;
        let marker = self.pack_root.join(BUILD_MARKER);
        if let Err(e) = std::fs::remove_file(&marker) {
            warn!(marker = ?marker, error = %e, "Could not remove build marker");
        }
    }
}

impl Drop for PartialBuildGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(pack_root = ?self.pack_root, "Build did not finish, removing partial server pack");
        self.phase.cancel.store(true, Ordering::SeqCst);

        let root = self.pack_root.clone();
        let tracked = std::mem::take(&mut self.tracked);
        let lock = self.lock.take();
        let busy = self.phase.busy.clone();
        let idle = match busy.try_lock() {
            Ok(_) | Err(TryLockError::Poisoned(_)) => true,
            Err(TryLockError::WouldBlock) => false,
        };
        if idle {
            remove_partial(&root, &tracked);
            drop(lock);
            return;
        }

        debug!(pack_root = ?root, "Waiting for blocking work before removing partial server pack");
        let cleanup = move || {
            let _idle = busy.lock().unwrap_or_else(PoisonError::into_inner);
            remove_partial(&root, &tracked);
            drop(lock);
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(cleanup);
            }
            Err(_) => {
                std::thread::spawn(cleanup);
            }
        }
    }
}

fn remove_partial(pack_root: &Path, tracked: &[PathBuf]) {
    if let Err(e) = std::fs::remove_dir_all(pack_root) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(pack_root = ?pack_root, error = %e, "Could not remove partial server pack");
        }
    }
    for file in tracked {
        if file.exists() {
            if let Err(e) = std::fs::remove_file(file) {
                warn!(file = ?file, error = %e, "Could not remove partial build output");
            }
        }
    }
}
