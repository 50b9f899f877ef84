//! Utility module to handle the path part of an URL as a resource path.
//!
//! A [`DavPath`] is the normalized, percent-decoded path of a resource
//! relative to the handler's prefix. The root is the empty path, every
//! other path is a sequence of `/segment` parts without a trailing slash.
//!
use std::error::Error;
use std::fmt;

use percent_encoding as pct;

use crate::DavError;

/// Normalized path of a resource.
///
/// Paths are ordered by plain string comparison, so a parent always sorts
/// before its descendants.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DavPath {
    path: String,
}

/// Error returned by some of the DavPath methods.
#[derive(Debug)]
pub enum ParseError {
    /// cannot parse
    InvalidPath,
    /// outside of prefix
    PrefixMismatch,
    /// too many dotdots
    ForbiddenPath,
}

impl Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<ParseError> for DavError {
    // all of them are a bad request.
    fn from(_: ParseError) -> Self {
        DavError::InvalidPath
    }
}

// encode all non-unreserved characters, except '/'.
// make sure that everything that has special meaning in HTML is escaped too.
const PATH_ENCODE_SET: &pct::AsciiSet = &pct::NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

impl fmt::Debug for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_url_string())
    }
}

impl fmt::Display for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_url_string())
    }
}

// a single path segment must be non-empty, not "." or "..", and
// must not contain a separator or a NUL byte.
fn valid_segment(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains('/') && !s.contains('\0')
}

// normalize a decoded path: collapse "//", resolve "." and "..".
fn normalize_path(rp: &str) -> Result<String, ParseError> {
    if rp.contains('\0') {
        return Err(ParseError::InvalidPath);
    }
    let mut segs: Vec<&str> = Vec::new();
    for seg in rp.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if segs.pop().is_none() {
                    return Err(ParseError::ForbiddenPath);
                }
            }
            s => segs.push(s),
        }
    }
    let mut path = String::with_capacity(rp.len());
    for s in segs {
        path.push('/');
        path.push_str(s);
    }
    Ok(path)
}

impl DavPath {
    /// The root of the resource tree.
    pub fn root() -> DavPath {
        DavPath {
            path: String::new(),
        }
    }

    /// Validating factory for an already percent-decoded path.
    ///
    /// `"/"`, `""`, `"/a/"` and `"a"` are all accepted; the result never
    /// has a trailing slash.
    pub fn new(path: &str) -> Result<DavPath, ParseError> {
        Ok(DavPath {
            path: normalize_path(path)?,
        })
    }

    /// Create a path from the path part of a request URI, stripping the
    /// prefix and percent-decoding the rest.
    pub fn from_str_and_prefix(src: &str, prefix: &str) -> Result<DavPath, ParseError> {
        if !src.starts_with('/') {
            return Err(ParseError::InvalidPath);
        }
        let src = match src.find('?') {
            Some(n) => &src[..n],
            None => src,
        };
        let prefix = prefix.trim_end_matches('/');
        let rest = match src.strip_prefix(prefix) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => return Err(ParseError::PrefixMismatch),
        };
        let decoded = pct::percent_decode_str(rest)
            .decode_utf8()
            .map_err(|_| ParseError::InvalidPath)?;
        DavPath::new(&decoded)
    }

    /// Create a path from a request URI, stripping the prefix.
    pub fn from_uri_and_prefix(uri: &http::uri::Uri, prefix: &str) -> Result<DavPath, ParseError> {
        match uri.path() {
            "*" => Ok(DavPath::root()),
            path if path.starts_with('/') => DavPath::from_str_and_prefix(path, prefix),
            _ => Err(ParseError::InvalidPath),
        }
    }

    /// Is this the root path.
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// The parent path. The parent of the root is the root itself.
    pub fn parent(&self) -> DavPath {
        match self.path.rfind('/') {
            Some(n) => DavPath {
                path: self.path[..n].to_string(),
            },
            None => DavPath::root(),
        }
    }

    /// Append one segment. Fails if `name` is not a single valid segment.
    pub fn child(&self, name: &str) -> Result<DavPath, ParseError> {
        if !valid_segment(name) {
            return Err(ParseError::InvalidPath);
        }
        Ok(DavPath {
            path: format!("{}/{}", self.path, name),
        })
    }

    /// The last segment of the path, empty for the root.
    pub fn name(&self) -> &str {
        match self.path.rfind('/') {
            Some(n) => &self.path[n + 1..],
            None => "",
        }
    }

    /// Is `self` equal to `other` or one of its descendants.
    pub fn starts_with(&self, other: &DavPath) -> bool {
        other.is_root()
            || self.path == other.path
            || (self.path.starts_with(&other.path)
                && self.path.as_bytes().get(other.path.len()) == Some(&b'/'))
    }

    /// Re-root this path: replace the `from` prefix by `to`.
    pub fn rebase(&self, from: &DavPath, to: &DavPath) -> DavPath {
        DavPath {
            path: format!("{}{}", to.path, &self.path[from.path.len()..]),
        }
    }

    /// The decoded path as a string, `"/"` for the root.
    pub fn as_str(&self) -> &str {
        if self.path.is_empty() {
            "/"
        } else {
            &self.path
        }
    }

    /// The path as a percent-encoded URL string, without prefix.
    pub fn as_url_string(&self) -> String {
        pct::utf8_percent_encode(self.as_str(), PATH_ENCODE_SET).to_string()
    }

    /// The path as a percent-encoded URL string, with `prefix` in front.
    /// A collection gets a trailing slash.
    pub fn with_prefix(&self, prefix: &str, collection: bool) -> String {
        let prefix = prefix.trim_end_matches('/');
        let mut url = format!("{}{}", prefix, self.as_url_string());
        if collection && !url.ends_with('/') {
            url.push('/');
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> DavPath {
        DavPath::new(s).unwrap()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(p("/"), DavPath::root());
        assert_eq!(p(""), DavPath::root());
        assert_eq!(p("/a/b/"), p("/a/b"));
        assert_eq!(p("a//b/./c/../d"), p("/a/b/d"));
        assert!(matches!(DavPath::new("/.."), Err(ParseError::ForbiddenPath)));
        assert!(DavPath::new("/a\0b").is_err());
    }

    #[test]
    fn test_parent_child() {
        let root = DavPath::root();
        assert_eq!(root.parent(), root);
        for base in [root.clone(), p("/a"), p("/a/b c")] {
            let child = base.child("x.txt").unwrap();
            assert_eq!(child.parent(), base);
            assert_eq!(child.name(), "x.txt");
        }
        assert!(root.child("a/b").is_err());
        assert!(root.child("").is_err());
        assert!(root.child("..").is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(DavPath::root() < p("/a"));
        assert!(p("/a") < p("/a/b"));
        assert!(p("/a/b") < p("/b"));
    }

    #[test]
    fn test_prefix() {
        let uri: http::Uri = "/dav/a%20b/c".parse().unwrap();
        let path = DavPath::from_uri_and_prefix(&uri, "/dav").unwrap();
        assert_eq!(path.as_str(), "/a b/c");
        assert_eq!(path.as_url_string(), "/a%20b/c");
        assert_eq!(path.with_prefix("/dav/", true), "/dav/a%20b/c/");

        let uri: http::Uri = "/davx/a".parse().unwrap();
        assert!(DavPath::from_uri_and_prefix(&uri, "/dav").is_err());
        let uri: http::Uri = "/dav".parse().unwrap();
        assert!(DavPath::from_uri_and_prefix(&uri, "/dav").unwrap().is_root());
    }

    #[test]
    fn test_starts_with_rebase() {
        assert!(p("/a/b").starts_with(&p("/a")));
        assert!(p("/a").starts_with(&p("/a")));
        assert!(!p("/ab").starts_with(&p("/a")));
        assert!(p("/x").starts_with(&DavPath::root()));
        assert_eq!(p("/a/b/c").rebase(&p("/a"), &p("/z")), p("/z/b/c"));
        assert_eq!(p("/a").rebase(&p("/a"), &DavPath::root()), DavPath::root());
    }
}
