use crate::error::{Error, Result};
use crate::io::{InputSocket, OutputSocket};
use crate::model::Model;
use crate::node::Node;
use crate::options::{AccessOptions, AccessTypes, NodeType, SyncOptions, TimeType};
use crate::sync::SyncError;
use fedfs_address::{MountPoint, NodeName};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

/// Operations on the entries of one file system.
///
/// A controller chain is a stack of decorators around a driver's
/// controller; every link shares the same [`Model`] and the same parent
/// controller.
pub trait Controller: Send + Sync {
    fn model(&self) -> &Arc<Model>;

    /// The controller of the file system containing the archive file, if
    /// the mount point is opaque.
    fn parent(&self) -> Option<&Arc<dyn Controller>>;

    fn mount_point(&self) -> &MountPoint {
        self.model().mount_point()
    }

    /// The metadata of the entry `name`, or `None` if it does not exist.
    fn node(&self, options: AccessOptions, name: &NodeName) -> Result<Option<Node>>;

    /// Fail unless the entry `name` permits every access in `types`.
    fn check_access(
        &self,
        options: AccessOptions,
        name: &NodeName,
        types: AccessTypes,
    ) -> Result<()>;

    fn set_read_only(&self, options: AccessOptions, name: &NodeName) -> Result<()>;

    /// Set the given timestamps of the entry `name`.
    ///
    /// Returns `false` if some but not all of them could be set.
    fn set_times(
        &self,
        options: AccessOptions,
        name: &NodeName,
        times: &BTreeMap<TimeType, SystemTime>,
    ) -> Result<bool>;

    /// Set each timestamp in `types` to `value`. Same contract as
    /// [`set_times`](Self::set_times).
    fn set_time(
        &self,
        options: AccessOptions,
        name: &NodeName,
        types: &[TimeType],
        value: SystemTime,
    ) -> Result<bool> {
        let times = types.iter().map(|&t| (t, value)).collect();
        self.set_times(options, name, &times)
    }

    /// A socket for reading the entry `name`. No I/O happens until a
    /// stream is opened.
    fn input(&self, options: AccessOptions, name: &NodeName) -> Box<dyn InputSocket>;

    /// A socket for writing the entry `name`. If `template` is given, the
    /// new entry inherits its metadata where supported.
    fn output(
        &self,
        options: AccessOptions,
        name: &NodeName,
        template: Option<&Node>,
    ) -> Box<dyn OutputSocket>;

    /// Create the entry `name` of `node_type`.
    fn make(
        &self,
        options: AccessOptions,
        name: &NodeName,
        node_type: NodeType,
        template: Option<&Node>,
    ) -> Result<()>;

    /// Delete the entry `name`. Directories must be empty.
    fn unlink(&self, options: AccessOptions, name: &NodeName) -> Result<()>;

    /// Commit buffered changes to the parent file system and release
    /// resources according to `options`.
    fn sync(&self, options: SyncOptions) -> std::result::Result<(), SyncError>;
}

/// Check that `parent` is the controller of the parent of `model`'s mount
/// point.
pub fn check_parent(model: &Model, parent: Option<&dyn Controller>) -> Result<()> {
    let expected = model.parent().map(|m| m.mount_point());
    let actual = parent.map(|p| p.mount_point());
    if expected != actual {
        return Err(Error::InvalidArgument(format!(
            "parent controller {:?} does not match parent mount point {:?} of {}",
            actual.map(ToString::to_string),
            expected.map(ToString::to_string),
            model.mount_point(),
        )));
    }
    Ok(())
}

/// Implement [`Controller`] methods by delegating to a field.
///
/// ```ignore
/// impl Controller for MyDecorator {
///     forward_controller!(inner => model, parent, node, check_access);
///     // remaining methods ...
/// }
/// ```
#[macro_export]
macro_rules! forward_controller {
    ($field:ident => $($method:ident),+ $(,)?) => {
        $( $crate::forward_controller!(@method $field $method); )+
    };
    (@method $f:ident model) => {
        fn model(&self) -> &::std::sync::Arc<$crate::Model> {
            self.$f.model()
        }
    };
    (@method $f:ident parent) => {
        fn parent(&self) -> ::std::option::Option<&::std::sync::Arc<dyn $crate::Controller>> {
            self.$f.parent()
        }
    };
    (@method $f:ident node) => {
        fn node(
            &self,
            options: $crate::AccessOptions,
            name: &$crate::NodeName,
        ) -> $crate::Result<::std::option::Option<$crate::Node>> {
            self.$f.node(options, name)
        }
    };
    (@method $f:ident check_access) => {
        fn check_access(
            &self,
            options: $crate::AccessOptions,
            name: &$crate::NodeName,
            types: $crate::AccessTypes,
        ) -> $crate::Result<()> {
            self.$f.check_access(options, name, types)
        }
    };
    (@method $f:ident set_read_only) => {
        fn set_read_only(
            &self,
            options: $crate::AccessOptions,
            name: &$crate::NodeName,
        ) -> $crate::Result<()> {
            self.$f.set_read_only(options, name)
        }
    };
    (@method $f:ident set_times) => {
        fn set_times(
            &self,
            options: $crate::AccessOptions,
            name: &$crate::NodeName,
            times: &::std::collections::BTreeMap<$crate::TimeType, ::std::time::SystemTime>,
        ) -> $crate::Result<bool> {
            self.$f.set_times(options, name, times)
        }
    };
    (@method $f:ident input) => {
        fn input(
            &self,
            options: $crate::AccessOptions,
            name: &$crate::NodeName,
        ) -> ::std::boxed::Box<dyn $crate::InputSocket> {
            self.$f.input(options, name)
        }
    };
    (@method $f:ident output) => {
        fn output(
            &self,
            options: $crate::AccessOptions,
            name: &$crate::NodeName,
            template: ::std::option::Option<&$crate::Node>,
        ) -> ::std::boxed::Box<dyn $crate::OutputSocket> {
            self.$f.output(options, name, template)
        }
    };
    (@method $f:ident make) => {
        fn make(
            &self,
            options: $crate::AccessOptions,
            name: &$crate::NodeName,
            node_type: $crate::NodeType,
            template: ::std::option::Option<&$crate::Node>,
        ) -> $crate::Result<()> {
            self.$f.make(options, name, node_type, template)
        }
    };
    (@method $f:ident unlink) => {
        fn unlink(
            &self,
            options: $crate::AccessOptions,
            name: &$crate::NodeName,
        ) -> $crate::Result<()> {
            self.$f.unlink(options, name)
        }
    };
    (@method $f:ident sync) => {
        fn sync(
            &self,
            options: $crate::SyncOptions,
        ) -> ::std::result::Result<(), $crate::SyncError> {
            self.$f.sync(options)
        }
    };
}
