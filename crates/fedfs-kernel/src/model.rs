use crate::error::{Error, Result};
use fedfs_address::MountPoint;
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Instant;

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    holds: usize,
}

/// A reentrant lock with a single condition.
///
/// Every controller chain for a mount point shares one `ModelLock`. The
/// lock decorator holds it while an operation runs and the resource
/// accountant waits on its condition for open streams to be closed.
#[derive(Debug, Default)]
pub struct ModelLock {
    state: Mutex<LockState>,
    released: Condvar,
    signalled: Condvar,
}

/// Holds a [`ModelLock`] until dropped. Not `Send`: the lock belongs to the
/// thread that acquired it.
#[must_use]
pub struct ModelLockGuard<'a> {
    lock: &'a ModelLock,
    _not_send: PhantomData<*const ()>,
}

impl ModelLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock, blocking while another thread holds it.
    pub fn lock(&self) -> ModelLockGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner == Some(me) {
            state.holds += 1;
        } else {
            while state.owner.is_some() {
                self.released.wait(&mut state);
            }
            state.owner = Some(me);
            state.holds = 1;
        }
        self.guard()
    }

    /// Acquire the lock if it is free or already held by this thread.
    pub fn try_lock(&self) -> Option<ModelLockGuard<'_>> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        match state.owner {
            Some(owner) if owner == me => state.holds += 1,
            Some(_) => return None,
            None => {
                state.owner = Some(me);
                state.holds = 1;
            }
        }
        Some(self.guard())
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }

    /// Release the lock completely, wait until [`signal_all`] is called or
    /// `deadline` passes, then reacquire the lock with the same hold count.
    ///
    /// Returns `false` if the deadline passed without a signal.
    ///
    /// [`signal_all`]: Self::signal_all
    pub fn wait_until(&self, guard: &ModelLockGuard<'_>, deadline: Instant) -> bool {
        debug_assert!(std::ptr::eq(guard.lock, self), "guard of another lock");
        let me = thread::current().id();
        let mut state = self.state.lock();
        debug_assert_eq!(state.owner, Some(me));
        let holds = std::mem::take(&mut state.holds);
        state.owner = None;
        self.released.notify_all();

        let signalled = !self.signalled.wait_until(&mut state, deadline).timed_out();

        while state.owner.is_some() {
            self.released.wait(&mut state);
        }
        state.owner = Some(me);
        state.holds = holds;
        signalled
    }

    /// Wake all threads blocked in [`wait_until`](Self::wait_until).
    pub fn signal_all(&self) {
        let _state = self.state.lock();
        self.signalled.notify_all();
    }

    fn guard(&self) -> ModelLockGuard<'_> {
        ModelLockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    fn unlock(&self) {
        let mut state = self.state.lock();
        state.holds -= 1;
        if state.holds == 0 {
            state.owner = None;
            self.released.notify_all();
        }
    }
}

impl Drop for ModelLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

/// The state shared by all controllers of one mounted file system.
#[derive(Debug)]
pub struct Model {
    mount_point: MountPoint,
    parent: Option<Arc<Model>>,
    mounted: AtomicBool,
    lock: ModelLock,
}

impl Model {
    /// Create the model of `mount_point`. The parent model must belong to
    /// the parent of the mount point.
    pub fn new(mount_point: MountPoint, parent: Option<Arc<Model>>) -> Result<Self> {
        check_parent(&mount_point, parent.as_deref())?;
        Ok(Self {
            mount_point,
            parent,
            mounted: AtomicBool::new(false),
            lock: ModelLock::new(),
        })
    }

    pub fn mount_point(&self) -> &MountPoint {
        &self.mount_point
    }

    pub fn parent(&self) -> Option<&Arc<Model>> {
        self.parent.as_ref()
    }

    /// True while the file system holds state that a sync has to commit or
    /// release.
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Only the controller owning this model may call this.
    pub fn set_mounted(&self, mounted: bool) {
        if self.mounted.swap(mounted, Ordering::AcqRel) != mounted {
            if mounted {
                debug!("Mounted {}", self.mount_point);
            } else {
                debug!("Unmounted {}", self.mount_point);
            }
        }
    }

    pub fn lock(&self) -> &ModelLock {
        &self.lock
    }
}

/// Check that `parent` is the model of the parent of `mount_point`.
pub fn check_parent(mount_point: &MountPoint, parent: Option<&Model>) -> Result<()> {
    match (mount_point.parent(), parent) {
        (None, None) => Ok(()),
        (Some(expected), Some(parent)) if expected == parent.mount_point() => Ok(()),
        (expected, parent) => Err(Error::InvalidArgument(format!(
            "parent model {:?} does not match parent mount point {:?} of {mount_point}",
            parent.map(|p| p.mount_point().to_string()),
            expected.map(ToString::to_string),
        ))),
    }
}
