use crate::error::{Error, Result};
use crate::modifier::{PostFix, UriModifier};
use crate::mount_point::{MountPoint, SEPARATOR};
use crate::node_name::NodeName;
use crate::uri::Uri;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// The fully resolved address of an entry: a [`MountPoint`] plus a
/// [`NodeName`] within it.
///
/// For opaque URIs the split happens at the last `!/`, so
/// `zip:file:/a.zip!/dir/entry` is the entry `dir/entry` of the mount
/// point `zip:file:/a.zip!/`. For hierarchical URIs the mount point is the
/// directory containing the entry, so `file:/a/b` is the entry `b` of
/// `file:/a/`.
#[derive(Clone, Debug)]
pub struct NodePath {
    uri: Uri,
    mount_point: MountPoint,
    node_name: NodeName,
}

impl NodePath {
    /// Apply `modifier` to `uri` and parse the result as a node path.
    pub fn new(uri: Uri, modifier: UriModifier) -> Result<Self> {
        Self::parse_at(uri, modifier, 0)
    }

    /// Parse a node path that must already be in canonical form.
    pub fn parse(s: &str) -> Result<Self> {
        Self::new(Uri::parse(s)?, UriModifier::Null)
    }

    /// Parse a node path, canonicalizing it first.
    pub fn canonicalize(s: &str) -> Result<Self> {
        Self::new(Uri::parse(s)?, UriModifier::Canonicalize)
    }

    /// Join a mount point and a node name.
    pub fn from_parts(mount_point: MountPoint, node_name: NodeName) -> Self {
        let uri = match mount_point.uri().path() {
            None => {
                let ssp = format!(
                    "{}{}",
                    mount_point.uri().scheme_specific_part(),
                    node_name
                );
                Uri::assemble_opaque(mount_point.uri().scheme(), &ssp, None)
            }
            Some(dir) => {
                let path = format!("{dir}{}", node_name.path());
                let base = mount_point.uri();
                Uri::assemble(
                    base.scheme(),
                    base.authority(),
                    &path,
                    node_name.query(),
                    None,
                )
            }
        };
        Self {
            uri,
            mount_point,
            node_name,
        }
    }

    pub(crate) fn parse_at(uri: Uri, modifier: UriModifier, depth: usize) -> Result<Self> {
        let uri = modifier.modify(uri, PostFix::NodePath)?;
        if uri.fragment().is_some() {
            return Err(Error::invalid(uri.as_str(), "node path must not have a fragment"));
        }
        if !uri.is_absolute() {
            return Err(Error::invalid(uri.as_str(), "node path must be absolute"));
        }

        let path = if uri.is_opaque() {
            let s = uri.as_str();
            let Some(i) = s.rfind(SEPARATOR) else {
                return Err(Error::invalid(
                    s,
                    format!("missing mount point separator {SEPARATOR:?}"),
                ));
            };
            let split = i + SEPARATOR.len();
            let mount_point = MountPoint::parse_at(Uri::parse(&s[..split])?, modifier, depth)?;
            let node_name = NodeName::new(Uri::parse(&s[split..])?, modifier)?;
            Self::from_parts(mount_point, node_name)
        } else {
            let full = uri.path().unwrap_or_default();
            let Some(i) = full.rfind('/') else {
                return Err(Error::invalid(uri.as_str(), "node path has an empty path"));
            };
            let mount_uri = Uri::hierarchical(
                uri.scheme(),
                uri.authority(),
                &full[..=i],
                None,
                None,
            )?;
            let mount_point = MountPoint::parse_at(mount_uri, modifier, depth)?;
            let name_uri = Uri::hierarchical(None, None, &full[i + 1..], uri.query(), None)?;
            let node_name = NodeName::new(name_uri, modifier)?;
            Self::from_parts(mount_point, node_name)
        };

        if modifier == UriModifier::Null && path.uri != uri {
            return Err(Error::invalid(
                uri.as_str(),
                format!("not in canonical form {:?}", path.uri.as_str()),
            ));
        }
        Ok(path)
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn mount_point(&self) -> &MountPoint {
        &self.mount_point
    }

    pub fn node_name(&self) -> &NodeName {
        &self.node_name
    }

    /// Append `member` to the node name of this path.
    pub fn resolve(&self, member: &NodeName) -> NodePath {
        Self::from_parts(
            self.mount_point.clone(),
            NodeName::resolve(&self.node_name, member),
        )
    }

    /// The hierarchical equivalent of this path, e.g.
    /// `zip:file:/a.zip!/b/c` becomes `file:/a.zip/b/c`.
    pub fn to_hierarchical_uri(&self) -> Uri {
        if !self.mount_point.is_opaque() {
            return self.uri.clone();
        }
        let base = self.mount_point.to_hierarchical_uri();
        let dir = base.path().unwrap_or_default();
        let path = if self.node_name.path().is_empty() {
            let trimmed = dir.trim_end_matches('/');
            if trimmed.is_empty() {
                "/".to_string()
            } else {
                trimmed.to_string()
            }
        } else {
            format!("{dir}{}", self.node_name.path())
        };
        Uri::assemble(
            base.scheme(),
            base.authority(),
            &path,
            self.node_name.query(),
            None,
        )
    }

    /// The innermost archive containing this path, or the archive this path
    /// is the root of.
    pub fn inner_archive(&self) -> Option<&MountPoint> {
        Some(&self.mount_point).filter(|mp| mp.is_opaque())
    }

    /// The archive containing this path as an entry. For the root of an
    /// archive this is the archive the archive file lives in, if any.
    pub fn enclosing_archive(&self) -> Option<&MountPoint> {
        if !self.mount_point.is_opaque() {
            return None;
        }
        if !self.node_name.is_root() {
            return Some(&self.mount_point);
        }
        self.mount_point.parent().filter(|mp| mp.is_opaque())
    }

    /// The name of this path within its [enclosing
    /// archive](Self::enclosing_archive).
    pub fn enclosing_entry_name(&self) -> Option<&NodeName> {
        if !self.mount_point.is_opaque() {
            return None;
        }
        if !self.node_name.is_root() {
            return Some(&self.node_name);
        }
        self.mount_point
            .path()
            .filter(|path| path.mount_point().is_opaque())
            .map(NodePath::node_name)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.uri.fmt(f)
    }
}

impl FromStr for NodePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for NodePath {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for NodePath {}

impl Hash for NodePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

impl PartialOrd for NodePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uri.cmp(&other.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_hierarchical() {
        let path = NodePath::parse("file:/a/b?q").unwrap();
        assert_eq!(path.mount_point().to_string(), "file:/a/");
        assert_eq!(path.node_name().to_string(), "b?q");
    }

    #[test]
    fn test_split_opaque() {
        let path = NodePath::parse("zip:file:/a.zip!/dir/entry").unwrap();
        assert_eq!(path.mount_point().to_string(), "zip:file:/a.zip!/");
        assert_eq!(path.node_name().to_string(), "dir/entry");
    }

    #[test]
    fn test_round_trip() {
        for input in [
            "file:/",
            "file:/a/",
            "file://host/share/x",
            "zip:file:/a.zip!/",
            "zip:file:/a.zip!/b",
            "zip:file:/a.zip!/b.zip!/c/d",
            "tar.gz:zip:file:/a.zip!/b.tgz!/c",
        ] {
            let path = NodePath::parse(input).unwrap();
            assert_eq!(path.to_string(), input);
            let rebuilt = NodePath::from_parts(
                path.mount_point().clone(),
                path.node_name().clone(),
            );
            assert_eq!(rebuilt, path);
        }
    }

    #[test]
    fn test_resolve() {
        let path = NodePath::parse("zip:file:/a.zip!/dir").unwrap();
        let member = NodeName::parse("x/y").unwrap();
        assert_eq!(path.resolve(&member).to_string(), "zip:file:/a.zip!/dir/x/y");
        assert_eq!(path.resolve(&NodeName::ROOT), path);
    }

    #[test]
    fn test_invalid() {
        for input in ["a/b", "file:/a/./b", "zip:file:/a.zip!/b/", "zip:file:/a.zip", "file:/a#f"] {
            assert!(NodePath::parse(input).is_err(), "{input} should be invalid");
        }
    }

    #[test]
    fn test_canonicalize() {
        let path = NodePath::canonicalize("file:////host/share/dir/").unwrap();
        assert_eq!(path.to_string(), "file://host/share/dir");
        assert_eq!(path.mount_point().to_string(), "file://host/share/");

        let path = NodePath::canonicalize("zip:file:/a/../a.zip!//b//c").unwrap();
        assert_eq!(path.to_string(), "zip:file:/a.zip!/b/c");
    }

    #[test]
    fn test_to_hierarchical_uri() {
        let path = NodePath::parse("zip:file:/a.zip!/b/c").unwrap();
        assert_eq!(path.to_hierarchical_uri().to_string(), "file:/a.zip/b/c");
        let root = NodePath::parse("zip:file:/a.zip!/").unwrap();
        assert_eq!(root.to_hierarchical_uri().to_string(), "file:/a.zip");
    }
}
