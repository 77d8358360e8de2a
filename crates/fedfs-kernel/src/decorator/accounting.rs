use crate::accountant::{Accounted, ResourceAccountant};
use crate::controller::Controller;
use crate::error::Result;
use crate::io::{
    InputChannel, InputSocket, InputStream, OutputChannel, OutputSocket, OutputStream,
};
use crate::node::Node;
use crate::options::{AccessOptions, SyncOptions};
use crate::sync::{SyncError, SyncErrorBuilder};
use fedfs_address::NodeName;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

/// Accounts for every stream opened through it so that [`sync`] can wait
/// for them to be closed or close them forcibly.
///
/// [`sync`]: Controller::sync
pub struct AccountingController {
    inner: Arc<dyn Controller>,
    accountant: Arc<ResourceAccountant>,
    wait_timeout: Duration,
}

impl AccountingController {
    /// Wrap `inner`. `wait_timeout` bounds how long a sync with
    /// [`SyncOptions::WAIT_CLOSE_IO`] waits for other threads to close
    /// their streams.
    pub fn new(inner: Arc<dyn Controller>, wait_timeout: Duration) -> Self {
        let accountant = Arc::new(ResourceAccountant::new(Arc::clone(inner.model())));
        Self {
            inner,
            accountant,
            wait_timeout,
        }
    }

    pub fn accountant(&self) -> &Arc<ResourceAccountant> {
        &self.accountant
    }
}

impl Controller for AccountingController {
    crate::forward_controller!(
        inner => model, parent, node, check_access, set_read_only, set_times, make, unlink
    );

    fn input(&self, options: AccessOptions, name: &NodeName) -> Box<dyn InputSocket> {
        Box::new(AccountingInputSocket {
            inner: self.inner.input(options, name),
            accountant: Arc::clone(&self.accountant),
        })
    }

    fn output(
        &self,
        options: AccessOptions,
        name: &NodeName,
        template: Option<&Node>,
    ) -> Box<dyn OutputSocket> {
        Box::new(AccountingOutputSocket {
            inner: self.inner.output(options, name, template),
            accountant: Arc::clone(&self.accountant),
        })
    }

    fn sync(&self, options: SyncOptions) -> std::result::Result<(), SyncError> {
        let mount_point = self.mount_point().clone();
        let timeout = if options.contains(SyncOptions::WAIT_CLOSE_IO) {
            self.wait_timeout
        } else {
            Duration::ZERO
        };
        let mut builder = SyncErrorBuilder::new();
        let open = self.accountant.wait_stop_accounting(timeout);
        if open > 0 {
            if !options.contains(SyncOptions::FORCE_CLOSE_IO) {
                debug!("Sync of {mount_point} blocked by {open} open resource(s)");
                return Err(builder.fail(SyncError::error(
                    Some(mount_point),
                    format!("{open} open resource(s) prevent sync"),
                )));
            }
            let closed = self.accountant.close_all(&mut builder);
            if closed > 0 {
                warn!("Forcibly closed {closed} open resource(s) on {mount_point}");
                builder.warn(SyncError::warning(
                    Some(mount_point),
                    format!("forcibly closed {closed} open resource(s)"),
                ));
            }
        }
        if let Err(e) = self.inner.sync(options) {
            builder.warn(e);
        }
        builder.check()
    }
}

struct AccountingInputSocket {
    inner: Box<dyn InputSocket>,
    accountant: Arc<ResourceAccountant>,
}

impl InputSocket for AccountingInputSocket {
    fn target(&self) -> Result<Node> {
        self.inner.target()
    }

    fn stream(&self) -> Result<Box<dyn InputStream>> {
        let stream = self.inner.stream()?;
        Ok(Box::new(Accounted::new(stream, Arc::clone(&self.accountant))))
    }

    fn channel(&self) -> Result<Box<dyn InputChannel>> {
        let channel = self.inner.channel()?;
        Ok(Box::new(Accounted::new(channel, Arc::clone(&self.accountant))))
    }
}

struct AccountingOutputSocket {
    inner: Box<dyn OutputSocket>,
    accountant: Arc<ResourceAccountant>,
}

impl OutputSocket for AccountingOutputSocket {
    fn stream(&self) -> Result<Box<dyn OutputStream>> {
        let stream = self.inner.stream()?;
        Ok(Box::new(Accounted::new(stream, Arc::clone(&self.accountant))))
    }

    fn channel(&self) -> Result<Box<dyn OutputChannel>> {
        let channel = self.inner.channel()?;
        Ok(Box::new(Accounted::new(channel, Arc::clone(&self.accountant))))
    }
}
