//! Tracks the streams opened on a file system so a sync can wait for them
//! to be closed, or close them forcibly.

use crate::io::{closed, Closable};
use crate::model::Model;
use crate::sync::{SyncError, SyncErrorBuilder};
use log::{trace, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Something the accountant can close on behalf of its owner.
pub trait Resource: Send + Sync {
    /// Close the resource. Must be idempotent.
    fn close(&self) -> io::Result<()>;
}

struct Account {
    resource: Weak<dyn Resource>,
    owner: ThreadId,
}

/// Accounts for the resources opened on one file system.
///
/// All methods acquire the [`ModelLock`](crate::ModelLock) of the model
/// passed at construction, so they are serialized with the operations of
/// the lock decorator.
pub struct ResourceAccountant {
    model: Arc<Model>,
    accounts: Mutex<HashMap<usize, Account>>,
}

fn key_of(resource: &Arc<dyn Resource>) -> usize {
    Arc::as_ptr(resource) as *const () as usize
}

impl ResourceAccountant {
    pub fn new(model: Arc<Model>) -> Self {
        Self {
            model,
            accounts: Mutex::new(HashMap::new()),
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Start accounting for `resource` on behalf of the current thread.
    ///
    /// Returns `false` if the resource is already accounted for.
    pub fn start_accounting_for(&self, resource: &Arc<dyn Resource>) -> bool {
        let _guard = self.model.lock().lock();
        let mut accounts = self.accounts.lock();
        let key = key_of(resource);
        if accounts.contains_key(&key) {
            return false;
        }
        accounts.insert(
            key,
            Account {
                resource: Arc::downgrade(resource),
                owner: thread::current().id(),
            },
        );
        trace!("Accounting for resource {key:#x} on {}", self.model.mount_point());
        true
    }

    /// Stop accounting for `resource` and wake threads waiting for
    /// resources to be closed.
    ///
    /// Returns `false` if the resource was not accounted for.
    pub fn stop_accounting_for(&self, resource: &Arc<dyn Resource>) -> bool {
        let _guard = self.model.lock().lock();
        let key = key_of(resource);
        let removed = self.accounts.lock().remove(&key).is_some();
        if removed {
            trace!("Stopped accounting for resource {key:#x}");
            self.model.lock().signal_all();
        }
        removed
    }

    /// Number of resources currently accounted for.
    pub fn resources(&self) -> usize {
        let _guard = self.model.lock().lock();
        self.count().0
    }

    /// Wait until all resources opened by other threads have been closed
    /// or `timeout` elapsed. A zero timeout does not wait.
    ///
    /// Resources opened by the current thread are never waited for, since
    /// only this thread could close them. Returns the number of resources
    /// still accounted for, including those of the current thread.
    pub fn wait_stop_accounting(&self, timeout: Duration) -> usize {
        let lock = self.model.lock();
        let guard = lock.lock();
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let (total, foreign) = self.count();
            if foreign == 0 {
                return total;
            }
            match deadline {
                Some(deadline) if Instant::now() < deadline => {
                    lock.wait_until(&guard, deadline);
                }
                Some(_) => return total,
                None => {
                    lock.wait_until(&guard, Instant::now() + Duration::from_secs(3600));
                }
            }
        }
    }

    /// Close all accounted resources, recording failures in `builder`.
    ///
    /// Every resource is removed from the accountant whether or not closing
    /// it succeeds.
    pub fn close_all(&self, builder: &mut SyncErrorBuilder) -> usize {
        let lock = self.model.lock();
        let _guard = lock.lock();
        let accounts: Vec<Account> = self.accounts.lock().drain().map(|(_, a)| a).collect();
        let mut closed = 0;
        for account in accounts {
            let Some(resource) = account.resource.upgrade() else {
                continue;
            };
            closed += 1;
            if let Err(e) = resource.close() {
                warn!("Failed to close resource on {}: {e}", self.model.mount_point());
                builder.warn(
                    SyncError::error(
                        Some(self.model.mount_point().clone()),
                        "failed to close resource",
                    )
                    .with_source(e),
                );
            }
        }
        lock.signal_all();
        closed
    }

    /// Drop accounts whose resource is gone and return the total and the
    /// number owned by other threads.
    fn count(&self) -> (usize, usize) {
        let me = thread::current().id();
        let mut accounts = self.accounts.lock();
        accounts.retain(|_, account| account.resource.strong_count() > 0);
        let foreign = accounts.values().filter(|a| a.owner != me).count();
        (accounts.len(), foreign)
    }
}

struct Shared<S> {
    cell: Mutex<Option<S>>,
}

impl<S: Closable + Send> Resource for Shared<S> {
    fn close(&self) -> io::Result<()> {
        let stream = self.cell.lock().take();
        match stream {
            Some(mut stream) => stream.close(),
            None => Ok(()),
        }
    }
}

/// A stream registered with a [`ResourceAccountant`] for as long as it is
/// open.
pub struct Accounted<S: Closable + Send + 'static> {
    shared: Arc<Shared<S>>,
    accountant: Arc<ResourceAccountant>,
}

impl<S: Closable + Send + 'static> Accounted<S> {
    pub fn new(stream: S, accountant: Arc<ResourceAccountant>) -> Self {
        let shared = Arc::new(Shared {
            cell: Mutex::new(Some(stream)),
        });
        let resource: Arc<dyn Resource> = shared.clone();
        accountant.start_accounting_for(&resource);
        Self { shared, accountant }
    }

    fn with<T>(&self, f: impl FnOnce(&mut S) -> io::Result<T>) -> io::Result<T> {
        match self.shared.cell.lock().as_mut() {
            Some(stream) => f(stream),
            None => Err(closed()),
        }
    }
}

impl<S: Read + Closable + Send + 'static> Read for Accounted<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.with(|s| s.read(buf))
    }
}

impl<S: Write + Closable + Send + 'static> Write for Accounted<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with(|s| s.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with(|s| s.flush())
    }
}

impl<S: Seek + Closable + Send + 'static> Seek for Accounted<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.with(|s| s.seek(pos))
    }
}

impl<S: Closable + Send + 'static> Closable for Accounted<S> {
    fn close(&mut self) -> io::Result<()> {
        let result = self.shared.close();
        let resource: Arc<dyn Resource> = self.shared.clone();
        self.accountant.stop_accounting_for(&resource);
        result
    }
}

impl<S: Closable + Send + 'static> Drop for Accounted<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close stream on drop: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStream;
    use fedfs_address::MountPoint;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counted(AtomicUsize);

    impl Resource for Counted {
        fn close(&self) -> io::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn accountant() -> Arc<ResourceAccountant> {
        let model = Model::new(MountPoint::parse("file:/").unwrap(), None).unwrap();
        Arc::new(ResourceAccountant::new(Arc::new(model)))
    }

    #[test]
    fn test_start_stop_idempotence() {
        let accountant = accountant();
        let resource: Arc<dyn Resource> = Arc::new(Counted(AtomicUsize::new(0)));
        assert!(accountant.start_accounting_for(&resource));
        assert!(!accountant.start_accounting_for(&resource));
        assert!(accountant.stop_accounting_for(&resource));
        assert!(!accountant.stop_accounting_for(&resource));
    }

    #[test]
    fn test_own_resources_are_not_waited_for() {
        let accountant = accountant();
        let resource: Arc<dyn Resource> = Arc::new(Counted(AtomicUsize::new(0)));
        accountant.start_accounting_for(&resource);
        let start = Instant::now();
        assert_eq!(accountant.wait_stop_accounting(Duration::from_secs(10)), 1);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_close_all() {
        let accountant = accountant();
        let counted = Arc::new(Counted(AtomicUsize::new(0)));
        let resource: Arc<dyn Resource> = counted.clone();
        accountant.start_accounting_for(&resource);
        let mut builder = SyncErrorBuilder::new();
        assert_eq!(accountant.close_all(&mut builder), 1);
        assert!(builder.check().is_ok());
        assert_eq!(counted.0.load(Ordering::SeqCst), 1);
        assert_eq!(accountant.wait_stop_accounting(Duration::ZERO), 0);
    }

    #[test]
    fn test_dropped_resources_are_forgotten() {
        let accountant = accountant();
        let resource: Arc<dyn Resource> = Arc::new(Counted(AtomicUsize::new(0)));
        accountant.start_accounting_for(&resource);
        drop(resource);
        assert_eq!(accountant.resources(), 0);
    }

    #[test]
    fn test_accounted_stream() {
        let accountant = accountant();
        let mut stream = Accounted::new(MemoryStream::new(b"xyz".to_vec()), accountant.clone());
        assert_eq!(accountant.resources(), 1);
        let mut content = String::new();
        stream.read_to_string(&mut content).unwrap();
        assert_eq!(content, "xyz");
        stream.close().unwrap();
        assert_eq!(accountant.resources(), 0);
        assert_eq!(stream.read(&mut [0u8; 1]).unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_forcibly_closed_stream_fails() {
        let accountant = accountant();
        let mut stream = Accounted::new(MemoryStream::default(), accountant.clone());
        accountant.close_all(&mut SyncErrorBuilder::new());
        assert!(stream.write(b"late").is_err());
        assert!(stream.close().is_ok());
    }
}
