use crate::error::{Error, Result};
use crate::modifier::{PostFix, UriModifier};
use crate::uri::Uri;
use std::fmt;
use std::str::FromStr;

/// Separator between the segments of a node name.
pub const SEPARATOR: char = '/';

/// The relative address of an entry within one file system.
///
/// A node name is a relative URI without authority or fragment whose path
/// is neither `.` nor `..`, does not start with `/`, `./` or `../` and does
/// not end with `/`. The empty name is [`NodeName::ROOT`].
///
/// ```
/// use fedfs_address::NodeName;
///
/// let parent: NodeName = "META-INF".parse()?;
/// let member: NodeName = "MANIFEST.MF".parse()?;
/// let name = NodeName::resolve(&parent, &member);
/// assert_eq!(name.to_string(), "META-INF/MANIFEST.MF");
/// # Ok::<(), fedfs_address::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeName {
    uri: Uri,
}

impl NodeName {
    /// The root of a file system.
    pub const ROOT: NodeName = NodeName { uri: Uri::EMPTY };

    /// Apply `modifier` to `uri` and validate the result.
    pub fn new(uri: Uri, modifier: UriModifier) -> Result<Self> {
        let uri = modifier.modify(uri, PostFix::NodeName)?;
        validate(&uri)?;
        Ok(Self { uri })
    }

    /// Parse a node name that must already be in normal form.
    pub fn parse(s: &str) -> Result<Self> {
        Self::new(Uri::parse(s)?, UriModifier::Null)
    }

    /// Parse a node name, fixing up redundant and surrounding separators.
    pub fn canonicalize(s: &str) -> Result<Self> {
        Self::new(Uri::parse(s)?, UriModifier::Canonicalize)
    }

    /// Concatenate `member` onto `parent`, treating `parent` as a
    /// directory.
    ///
    /// The query comes from whichever side contributes a non-empty path,
    /// preferring `member` when both do.
    pub fn resolve(parent: &NodeName, member: &NodeName) -> NodeName {
        let parent_path = parent.path();
        let member_path = member.path();
        if parent_path.is_empty() {
            return member.clone();
        }
        if member_path.is_empty() {
            return parent.clone();
        }
        let path = format!("{parent_path}{SEPARATOR}{member_path}");
        NodeName {
            uri: Uri::assemble(None, None, &path, member.query(), None),
        }
    }

    /// True if this is the root name: empty path and no query.
    pub fn is_root(&self) -> bool {
        self.path().is_empty() && self.query().is_none()
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The raw path of this name.
    pub fn path(&self) -> &str {
        self.uri.path().unwrap_or_default()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// The path segments of this name; empty for the root.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path().split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// The last path segment, or `""` for the root.
    pub fn base_name(&self) -> &str {
        let path = self.path();
        path.rfind(SEPARATOR).map_or(path, |i| &path[i + 1..])
    }

    /// The name of the directory containing this entry, or `None` for the
    /// root. The query is not inherited.
    pub fn parent(&self) -> Option<NodeName> {
        if self.path().is_empty() {
            return None;
        }
        let path = self.path();
        let parent = path.rfind(SEPARATOR).map_or("", |i| &path[..i]);
        Some(NodeName {
            uri: Uri::assemble(None, None, parent, None, None),
        })
    }

    /// True if `self` is `other` or one of its ancestors.
    pub fn is_ancestor_of(&self, other: &NodeName) -> bool {
        let path = self.path();
        if path.is_empty() {
            return true;
        }
        other.path() == path
            || other
                .path()
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }
}

fn validate(uri: &Uri) -> Result<()> {
    let fail = |reason: &str| Err(Error::invalid(uri.as_str(), reason));
    if uri.is_absolute() {
        return fail("node name must be relative");
    }
    if uri.authority().is_some() {
        return fail("node name must not have an authority");
    }
    if uri.fragment().is_some() {
        return fail("node name must not have a fragment");
    }
    let Some(path) = uri.path() else {
        return fail("node name must have a path");
    };
    if path == "." || path == ".." {
        return fail("illegal dot segment");
    }
    if path.starts_with(SEPARATOR) {
        return fail("illegal leading separator");
    }
    if path.starts_with("./") || path.starts_with("../") {
        return fail("illegal leading dot segment");
    }
    if path.ends_with(SEPARATOR) {
        return fail("illegal trailing separator");
    }
    Ok(())
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.uri.fmt(f)
    }
}

impl FromStr for NodeName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Default for NodeName {
    fn default() -> Self {
        Self::ROOT
    }
}
