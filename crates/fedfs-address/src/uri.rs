use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A URI reference in its raw, percent-encoded form.
///
/// The type keeps the decomposition of RFC 3986 (`scheme`, `authority`,
/// `path`, `query`, `fragment`) next to the rendered string. A URI with a
/// scheme whose scheme-specific part does not start with `/` is *opaque*:
/// it has no authority, path or query of its own, only a scheme-specific
/// part.
///
/// Equality, hashing and ordering all use the rendered string, so two URIs
/// compare equal exactly when they print the same.
#[derive(Debug, Clone)]
pub struct Uri {
    string: String,
    scheme: Option<String>,
    opaque: Option<String>,
    authority: Option<String>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl Uri {
    /// The empty relative URI.
    pub const EMPTY: Uri = Uri {
        string: String::new(),
        scheme: None,
        opaque: None,
        authority: None,
        path: String::new(),
        query: None,
        fragment: None,
    };

    /// Parse a URI reference.
    pub fn parse(input: &str) -> Result<Self> {
        check_chars(input)?;

        let (rest, fragment) = match input.split_once('#') {
            Some((rest, fragment)) => {
                if fragment.contains('#') {
                    return Err(Error::invalid(input, "more than one fragment separator"));
                }
                (rest, Some(fragment))
            }
            None => (input, None),
        };

        let (scheme, rest) = split_scheme(input, rest)?;
        if scheme.is_some() {
            if rest.is_empty() {
                return Err(Error::invalid(input, "expected scheme-specific part"));
            }
            if !rest.starts_with('/') {
                return Ok(Self::assemble_opaque(scheme, rest, fragment));
            }
        }

        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };

        let (authority, path) = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find('/').unwrap_or(after.len());
                (Some(&after[..end]), &after[end..])
            }
            None => (None, rest),
        };

        Ok(Self::assemble(scheme, authority, path, query, fragment))
    }

    /// Build a hierarchical URI from its raw components.
    ///
    /// Fails if the components would not survive a round trip through
    /// [`Uri::parse`], e.g. a relative path whose first segment contains a
    /// colon, or a path that starts with `//` without an authority.
    pub fn hierarchical(
        scheme: Option<&str>,
        authority: Option<&str>,
        path: &str,
        query: Option<&str>,
        fragment: Option<&str>,
    ) -> Result<Self> {
        let candidate = Self::assemble(scheme, authority, path, query, fragment);
        let parsed = Self::parse(&candidate.string)?;
        if parsed.opaque.is_some()
            || parsed.scheme != candidate.scheme
            || parsed.authority != candidate.authority
            || parsed.path != candidate.path
            || parsed.query != candidate.query
            || parsed.fragment != candidate.fragment
        {
            return Err(Error::invalid(
                candidate.string,
                "components do not form an unambiguous hierarchical URI",
            ));
        }
        Ok(parsed)
    }

    /// Build an opaque URI from a scheme and a scheme-specific part.
    pub fn opaque(scheme: &str, ssp: &str, fragment: Option<&str>) -> Result<Self> {
        let candidate = Self::assemble_opaque(Some(scheme), ssp, fragment);
        let parsed = Self::parse(&candidate.string)?;
        if parsed.opaque.as_deref() != Some(ssp) || parsed.fragment != candidate.fragment {
            return Err(Error::invalid(
                candidate.string,
                "components do not form an opaque URI",
            ));
        }
        Ok(parsed)
    }

    pub(crate) fn assemble(
        scheme: Option<&str>,
        authority: Option<&str>,
        path: &str,
        query: Option<&str>,
        fragment: Option<&str>,
    ) -> Self {
        let mut string = String::new();
        if let Some(scheme) = scheme {
            string.push_str(scheme);
            string.push(':');
        }
        if let Some(authority) = authority {
            string.push_str("//");
            string.push_str(authority);
        }
        string.push_str(path);
        if let Some(query) = query {
            string.push('?');
            string.push_str(query);
        }
        if let Some(fragment) = fragment {
            string.push('#');
            string.push_str(fragment);
        }
        Self {
            string,
            scheme: scheme.map(str::to_owned),
            opaque: None,
            authority: authority.map(str::to_owned),
            path: path.to_owned(),
            query: query.map(str::to_owned),
            fragment: fragment.map(str::to_owned),
        }
    }

    pub(crate) fn assemble_opaque(scheme: Option<&str>, ssp: &str, fragment: Option<&str>) -> Self {
        let mut string = String::new();
        if let Some(scheme) = scheme {
            string.push_str(scheme);
            string.push(':');
        }
        string.push_str(ssp);
        if let Some(fragment) = fragment {
            string.push('#');
            string.push_str(fragment);
        }
        Self {
            string,
            scheme: scheme.map(str::to_owned),
            opaque: Some(ssp.to_owned()),
            authority: None,
            path: String::new(),
            query: None,
            fragment: fragment.map(str::to_owned),
        }
    }

    /// The rendered URI.
    pub fn as_str(&self) -> &str {
        &self.string
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// True if the URI has a scheme.
    pub fn is_absolute(&self) -> bool {
        self.scheme.is_some()
    }

    /// True if the URI is absolute and its scheme-specific part does not
    /// start with a separator.
    pub fn is_opaque(&self) -> bool {
        self.opaque.is_some()
    }

    /// The raw authority. `Some("")` denotes an empty authority as in
    /// `file:///a`.
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// The raw path, or `None` for opaque URIs.
    pub fn path(&self) -> Option<&str> {
        if self.is_opaque() {
            None
        } else {
            Some(&self.path)
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Everything between the scheme delimiter and the fragment.
    pub fn scheme_specific_part(&self) -> &str {
        let start = self.scheme.as_ref().map_or(0, |scheme| scheme.len() + 1);
        let end = self.string.len() - self.fragment.as_ref().map_or(0, |f| f.len() + 1);
        &self.string[start..end]
    }

    /// Remove `.` and `..` segments and redundant separators from the path.
    ///
    /// Opaque URIs are returned unchanged. A leading `..` that cannot be
    /// resolved is kept, and a relative result whose first segment contains
    /// a colon is prefixed with `./` so that it is not mistaken for a
    /// scheme.
    pub fn normalize(&self) -> Uri {
        if self.is_opaque() {
            return self.clone();
        }
        let path = normalize_path(&self.path);
        if path == self.path {
            return self.clone();
        }
        Self::assemble(
            self.scheme(),
            self.authority(),
            &path,
            self.query(),
            self.fragment(),
        )
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    let mut directory = path.ends_with('/');

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        match segment {
            "." => directory = true,
            ".." => {
                match segments.last() {
                    Some(&last) if last != ".." => {
                        segments.pop();
                    }
                    _ => segments.push(".."),
                }
                directory = true;
            }
            _ => {
                segments.push(segment);
                directory = false;
            }
        }
    }
    if path.ends_with('/') {
        directory = true;
    }

    let mut normalized = String::with_capacity(path.len());
    if absolute {
        normalized.push('/');
    } else if segments.first().is_some_and(|first| first.contains(':')) {
        normalized.push_str("./");
    }
    normalized.push_str(&segments.join("/"));
    if directory && !segments.is_empty() {
        normalized.push('/');
    }
    normalized
}

fn split_scheme<'a>(input: &str, rest: &'a str) -> Result<(Option<&'a str>, &'a str)> {
    let Some(end) = rest.find([':', '/', '?']) else {
        return Ok((None, rest));
    };
    if !rest[end..].starts_with(':') {
        return Ok((None, rest));
    }
    let scheme = &rest[..end];
    if !is_valid_scheme(scheme) {
        return Err(Error::invalid(input, "illegal character in scheme name"));
    }
    Ok((Some(scheme), &rest[end + 1..]))
}

/// RFC 3986: `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`.
pub(crate) fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn check_chars(input: &str) -> Result<()> {
    let bytes = input.as_bytes();
    let mut i = 0;
    for (index, c) in input.char_indices() {
        if index < i {
            continue;
        }
        if c == '%' {
            let escaped = bytes.get(index + 1..index + 3);
            if !escaped.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                return Err(Error::invalid(input, format!("malformed escape at index {index}")));
            }
            i = index + 3;
            continue;
        }
        let legal = if c.is_ascii() {
            c.is_ascii_alphanumeric() || "-._~:/?#[]@!$&'()*+,;=".contains(c)
        } else {
            !c.is_control() && !c.is_whitespace()
        };
        if !legal {
            return Err(Error::invalid(input, format!("illegal character {c:?} at index {index}")));
        }
    }
    Ok(())
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string)
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for Uri {
    fn eq(&self, other: &Self) -> bool {
        self.string == other.string
    }
}

impl Eq for Uri {}

impl Hash for Uri {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.string.hash(state);
    }
}

impl PartialOrd for Uri {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Uri {
    fn cmp(&self, other: &Self) -> Ordering {
        self.string.cmp(&other.string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_components() {
        let uri = Uri::parse("file://host/a/b?q#f").unwrap();
        assert_eq!(uri.scheme(), Some("file"));
        assert_eq!(uri.authority(), Some("host"));
        assert_eq!(uri.path(), Some("/a/b"));
        assert_eq!(uri.query(), Some("q"));
        assert_eq!(uri.fragment(), Some("f"));
        assert!(!uri.is_opaque());
        assert_eq!(uri.scheme_specific_part(), "//host/a/b?q");
    }

    #[test]
    fn test_parse_opaque() {
        let uri = Uri::parse("zip:file:/a.zip!/b").unwrap();
        assert!(uri.is_opaque());
        assert_eq!(uri.scheme(), Some("zip"));
        assert_eq!(uri.path(), None);
        assert_eq!(uri.scheme_specific_part(), "file:/a.zip!/b");
    }

    #[test]
    fn test_parse_relative() {
        let uri = Uri::parse("a/b?x").unwrap();
        assert!(!uri.is_absolute());
        assert_eq!(uri.path(), Some("a/b"));
        assert_eq!(uri.query(), Some("x"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Uri::parse("a b").is_err());
        assert!(Uri::parse("file:").is_err());
        assert!(Uri::parse("1x:foo").is_err());
        assert!(Uri::parse("a%zz").is_err());
        assert!(Uri::parse("a#b#c").is_err());
    }

    #[test]
    fn test_normalize() {
        let examples = &[
            ("a/./b", "a/b"),
            ("a/../b", "b"),
            ("a//b/", "a/b/"),
            ("a/b/..", "a/"),
            ("a/..", ""),
            ("../a", "../a"),
            ("./a", "a"),
            ("file:/a/./b/../c", "file:/a/c"),
            ("file:////server/share", "file:///server/share"),
            ("./a:b", "./a:b"),
            ("zip:file:/a.zip!/./b", "zip:file:/a.zip!/./b"),
        ];
        for (input, expected) in examples {
            let uri = Uri::parse(input).unwrap();
            assert_eq!(uri.normalize().as_str(), *expected, "normalize({input})");
        }
    }

    #[test]
    fn test_hierarchical_rejects_ambiguous_parts() {
        assert!(Uri::hierarchical(None, None, "a:b", None, None).is_err());
        assert!(Uri::hierarchical(Some("file"), None, "//x/y", None, None).is_err());
        assert!(Uri::hierarchical(Some("file"), None, "/x/y", None, None).is_ok());
    }

    #[test]
    fn test_ordering_follows_string() {
        let a = Uri::parse("a").unwrap();
        let b = Uri::parse("b").unwrap();
        assert!(a < b);
        assert_eq!(a.cmp(&a.clone()), Ordering::Equal);
    }
}
