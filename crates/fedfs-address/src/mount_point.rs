use crate::error::{Error, Result};
use crate::modifier::{PostFix, UriModifier};
use crate::node_name::NodeName;
use crate::node_path::NodePath;
use crate::scheme::Scheme;
use crate::uri::Uri;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Separator between the inner path of an opaque mount point and the
/// entries of the file system it denotes.
pub const SEPARATOR: &str = "!/";

/// Maximum number of file systems that may be nested inside each other in
/// one address.
pub const MAX_NESTING_DEPTH: usize = 64;

/// The absolute address of a file system.
///
/// A mount point is either *hierarchical*, e.g. `file:/home/user/`, which
/// denotes a directory of the platform file system, or *opaque*, e.g.
/// `zip:file:/home/user/a.zip!/`, which denotes the file system inside the
/// archive file addressed by its inner [`NodePath`].
///
/// Within an opaque mount point, an inner location that itself contains
/// the separator `!/` addresses an archive nested inside an archive of the
/// same scheme: `zip:file:/a.zip!/b.zip!/` is the zip file `b.zip` inside
/// the zip file `file:/a.zip`. This compact form is how such mount points
/// are rendered; the explicit form `zip:zip:file:/a.zip!/b.zip!/` is
/// accepted by [`UriModifier::Canonicalize`].
#[derive(Clone, Debug)]
pub struct MountPoint {
    uri: Uri,
    scheme: Scheme,
    path: Option<Box<NodePath>>,
}

impl MountPoint {
    /// Apply `modifier` to `uri` and parse the result as a mount point.
    pub fn new(uri: Uri, modifier: UriModifier) -> Result<Self> {
        Self::parse_at(uri, modifier, 0)
    }

    /// Parse a mount point that must already be in canonical form.
    pub fn parse(s: &str) -> Result<Self> {
        Self::new(Uri::parse(s)?, UriModifier::Null)
    }

    /// Parse a mount point, canonicalizing it first.
    pub fn canonicalize(s: &str) -> Result<Self> {
        Self::new(Uri::parse(s)?, UriModifier::Canonicalize)
    }

    /// Build the opaque mount point for the archive file at `path`.
    pub fn from_parts(scheme: Scheme, path: NodePath) -> Result<Self> {
        if path.node_name().path().is_empty() {
            return Err(Error::invalid(path.to_string(), "empty entry name"));
        }
        let ssp = format!("{}{SEPARATOR}", compact(&scheme, &path));
        let uri = Uri::assemble_opaque(Some(scheme.as_str()), &ssp, None);
        Ok(Self {
            uri,
            scheme,
            path: Some(Box::new(path)),
        })
    }

    pub(crate) fn parse_at(uri: Uri, modifier: UriModifier, depth: usize) -> Result<Self> {
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::invalid(
                uri.as_str(),
                format!("more than {MAX_NESTING_DEPTH} nested file systems"),
            ));
        }
        let uri = modifier.modify(uri, PostFix::MountPoint)?;
        if uri.fragment().is_some() {
            return Err(Error::invalid(uri.as_str(), "mount point must not have a fragment"));
        }
        let Some(scheme) = uri.scheme() else {
            return Err(Error::invalid(uri.as_str(), "mount point must be absolute"));
        };
        let scheme = Scheme::new(scheme)?;

        if !uri.is_opaque() {
            if uri.query().is_some() {
                return Err(Error::invalid(uri.as_str(), "mount point must not have a query"));
            }
            if !uri.path().unwrap_or_default().ends_with('/') {
                return Err(Error::invalid(
                    uri.as_str(),
                    "path does not end with a separator",
                ));
            }
            return Ok(Self {
                uri,
                scheme,
                path: None,
            });
        }

        let ssp = uri.scheme_specific_part();
        let Some(inner) = ssp.strip_suffix(SEPARATOR) else {
            return Err(Error::invalid(
                uri.as_str(),
                format!("does not end with mount point separator {SEPARATOR:?}"),
            ));
        };
        let inner_uri = Uri::parse(inner)?;
        let nested = !inner_uri.is_opaque()
            && inner_uri
                .path()
                .is_some_and(|path| path.contains(SEPARATOR));
        let path = match inner.rfind(SEPARATOR) {
            Some(i) if nested => {
                let split = i + SEPARATOR.len();
                let parent_uri = Uri::parse(&format!("{scheme}:{}", &inner[..split]))?;
                let parent = Self::parse_at(parent_uri, modifier, depth + 1)?;
                let name = NodeName::new(Uri::parse(&inner[split..])?, modifier)?;
                NodePath::from_parts(parent, name)
            }
            _ => NodePath::parse_at(inner_uri, modifier, depth + 1)?,
        };

        let mount_point = Self::from_parts(scheme, path)?;
        if modifier == UriModifier::Null && mount_point.uri != uri {
            return Err(Error::invalid(
                uri.as_str(),
                format!("not in canonical form {:?}", mount_point.uri.as_str()),
            ));
        }
        Ok(mount_point)
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// The address of the archive file if this mount point is opaque.
    pub fn path(&self) -> Option<&NodePath> {
        self.path.as_deref()
    }

    /// The mount point of the file system containing the archive file.
    pub fn parent(&self) -> Option<&MountPoint> {
        self.path().map(NodePath::mount_point)
    }

    pub fn is_opaque(&self) -> bool {
        self.path.is_some()
    }

    /// Number of enclosing file systems; zero for a hierarchical mount
    /// point.
    pub fn depth(&self) -> usize {
        self.ancestors().count() - 1
    }

    /// This mount point followed by its parent, grandparent and so on.
    pub fn ancestors(&self) -> impl Iterator<Item = &MountPoint> {
        std::iter::successors(Some(self), |mp| mp.parent())
    }

    /// True if `self` is `other` or encloses it.
    pub fn contains(&self, other: &MountPoint) -> bool {
        other.ancestors().any(|mp| mp == self)
    }

    /// The path of `name` within this file system.
    pub fn resolve(&self, name: &NodeName) -> NodePath {
        NodePath::from_parts(self.clone(), name.clone())
    }

    /// The hierarchical equivalent of this mount point, e.g.
    /// `zip:file:/a.zip!/` becomes `file:/a.zip/`.
    pub fn to_hierarchical_uri(&self) -> Uri {
        match self.path() {
            None => self.uri.clone(),
            Some(path) => {
                let inner = path.to_hierarchical_uri();
                let dir = format!("{}/", inner.path().unwrap_or_default());
                Uri::assemble(inner.scheme(), inner.authority(), &dir, None, None)
            }
        }
    }
}

/// Render `path` for embedding into a mount point of `scheme`, eliding the
/// scheme of a directly enclosing archive of the same scheme.
fn compact(scheme: &Scheme, path: &NodePath) -> String {
    let rendered = path.to_string();
    let parent = path.mount_point();
    if parent.is_opaque() && parent.scheme() == scheme {
        if let Some(rest) = rendered.strip_prefix(&format!("{scheme}:")) {
            return rest.to_string();
        }
    }
    rendered
}

impl fmt::Display for MountPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.uri.fmt(f)
    }
}

impl FromStr for MountPoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for MountPoint {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for MountPoint {}

impl Hash for MountPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

impl PartialOrd for MountPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MountPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uri.cmp(&other.uri)
    }
}
