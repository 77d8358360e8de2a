//! Normalization policies applied to URIs before they become addresses.

use crate::error::{Error, Result};
use crate::uri::Uri;

/// How a URI is treated before it is validated as an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UriModifier {
    /// Accept the URI only if it is already normalized.
    #[default]
    Null,
    /// Fix up redundant separators, trailing separators and empty
    /// authorities, then normalize.
    Canonicalize,
}

/// The kind of address a URI is being modified for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFix {
    NodePath,
    MountPoint,
    NodeName,
}

impl UriModifier {
    /// Apply this policy to `uri` on behalf of the address kind `fix`.
    pub fn modify(self, uri: Uri, fix: PostFix) -> Result<Uri> {
        match self {
            UriModifier::Null => {
                if uri.normalize() != uri {
                    return Err(Error::invalid(uri.as_str(), "URI is not normalized"));
                }
                Ok(uri)
            }
            UriModifier::Canonicalize => fix.apply(uri),
        }
    }
}

impl PostFix {
    /// Canonicalize `uri` for this address kind.
    pub fn apply(self, uri: Uri) -> Result<Uri> {
        match self {
            PostFix::NodePath => fix_node_path(uri),
            PostFix::MountPoint => Ok(uri.normalize()),
            PostFix::NodeName => fix_node_name(uri),
        }
    }
}

fn fix_node_path(uri: Uri) -> Result<Uri> {
    if !uri.is_absolute() || uri.is_opaque() || uri.fragment().is_some() {
        return Ok(uri.normalize());
    }

    let mut authority = uri.authority().map(str::to_owned);
    let mut path = uri.path().unwrap_or_default().to_owned();

    // UNC style prefixes: `file:////host/share` -> `file://host/share`.
    if authority.as_deref().map_or(true, str::is_empty) && path.starts_with("//") {
        if let Some(end) = path[2..].find('/').map(|i| i + 2) {
            authority = Some(path[2..end].to_owned());
            path = path[end..].to_owned();
        }
    }

    let lifted = Uri::assemble(uri.scheme(), authority.as_deref(), &path, uri.query(), None);
    let normalized = lifted.normalize();

    let authority = normalized.authority().filter(|a| !a.is_empty());
    let path = normalized.path().unwrap_or_default();
    let mut end = path.len();
    while end > 1 && path[..end].ends_with('/') && !is_drive_root(&path[..end]) {
        end -= 1;
    }

    Uri::hierarchical(
        normalized.scheme(),
        authority,
        &path[..end],
        normalized.query(),
        None,
    )
}

fn fix_node_name(uri: Uri) -> Result<Uri> {
    if uri.is_absolute() || uri.authority().is_some() || uri.fragment().is_some() {
        return Ok(uri);
    }
    let normalized = uri.normalize();
    let path = normalized.path().unwrap_or_default();
    let stripped = path.trim_matches('/');
    if stripped.len() == path.len() {
        return Ok(normalized);
    }
    Uri::hierarchical(None, None, stripped, normalized.query(), None)
}

/// `/C:/` or `C:/`.
fn is_drive_root(path: &str) -> bool {
    let bytes = path.strip_prefix('/').unwrap_or(path).as_bytes();
    bytes.len() == 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(input: &str, fix: PostFix) -> String {
        UriModifier::Canonicalize
            .modify(Uri::parse(input).unwrap(), fix)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_null_rejects_unnormalized() {
        let uri = Uri::parse("a/./b").unwrap();
        assert!(UriModifier::Null.modify(uri, PostFix::NodeName).is_err());

        let uri = Uri::parse("a/b").unwrap();
        assert!(UriModifier::Null.modify(uri, PostFix::NodeName).is_ok());
    }

    #[test]
    fn test_canonicalize_node_path() {
        let examples = &[
            ("file:////host/share/dir/", "file://host/share/dir"),
            ("file:///a/b/", "file:/a/b"),
            ("file:/a//b/./c", "file:/a/b/c"),
            ("file:/", "file:/"),
            ("file:/C:/", "file:/C:/"),
            ("file:/C:/dir/", "file:/C:/dir"),
            ("file://host/", "file://host/"),
            ("zip:file:/a.zip!/b", "zip:file:/a.zip!/b"),
        ];
        for (input, expected) in examples {
            assert_eq!(canonical(input, PostFix::NodePath), *expected, "{input}");
        }
    }

    #[test]
    fn test_canonicalize_node_name() {
        let examples = &[
            ("/foo/", "foo"),
            ("foo//bar/", "foo/bar"),
            ("./foo", "foo"),
            ("foo/..", ""),
            ("foo?q", "foo?q"),
        ];
        for (input, expected) in examples {
            assert_eq!(canonical(input, PostFix::NodeName), *expected, "{input}");
        }
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        for input in ["file:////host/share//x/", "/a/./b//", "file:/a/../b/"] {
            let fix = if input.starts_with('/') {
                PostFix::NodeName
            } else {
                PostFix::NodePath
            };
            let once = canonical(input, fix);
            assert_eq!(canonical(&once, fix), once);
        }
    }
}
