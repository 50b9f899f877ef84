use std::convert::TryFrom;
use std::fmt;

use headers::Header;
use http::header::{HeaderName, HeaderValue};
use url::Url;
use uuid::Uuid;

use crate::davpath::DavPath;
use crate::locks::{TokenMap, LOCK_TOKEN_PREFIX};

lazy_static! {
    static ref DEPTH: HeaderName = HeaderName::from_static("depth");
    static ref TIMEOUT: HeaderName = HeaderName::from_static("timeout");
    static ref OVERWRITE: HeaderName = HeaderName::from_static("overwrite");
    static ref DESTINATION: HeaderName = HeaderName::from_static("destination");
    static ref LOCK_TOKEN: HeaderName = HeaderName::from_static("lock-token");
    static ref IF: HeaderName = HeaderName::from_static("if");
}

// helper.
fn one<'i, I>(values: &mut I) -> Result<&'i HeaderValue, headers::Error>
where
    I: Iterator<Item = &'i HeaderValue>,
{
    let v = values.next().ok_or_else(invalid)?;
    if values.next().is_some() {
        Err(invalid())
    } else {
        Ok(v)
    }
}

// helper
fn invalid() -> headers::Error {
    headers::Error::invalid()
}

// helper
fn map_invalid(_e: impl std::error::Error) -> headers::Error {
    headers::Error::invalid()
}

macro_rules! header {
    ($tname:ident, $hname:ident, $sname:expr) => {
        lazy_static! {
            pub static ref $hname: HeaderName = HeaderName::from_static($sname);
        }

        #[derive(Debug, Clone, PartialEq)]
        pub struct $tname(pub String);

        impl Header for $tname {
            fn name() -> &'static HeaderName {
                &$hname
            }

            fn decode<'i, I>(values: &mut I) -> Result<$tname, headers::Error>
            where
                I: Iterator<Item = &'i HeaderValue>,
            {
                one(values)?
                    .to_str()
                    .map(|x| $tname(x.to_owned()))
                    .map_err(map_invalid)
            }

            fn encode<E>(&self, values: &mut E)
            where
                E: Extend<HeaderValue>,
            {
                if let Ok(value) = HeaderValue::from_str(&self.0) {
                    values.extend(std::iter::once(value))
                }
            }
        }
    };
}

header!(XLitmus, X_LITMUS_HDR, "x-litmus");

/// Depth: header. Anything that is not `0` or `1` means infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Depth {
    /// One level less, `None` once the bottom has been reached.
    pub fn decrement(self) -> Option<Depth> {
        match self {
            Depth::Zero => None,
            Depth::One => Some(Depth::Zero),
            Depth::Infinity => Some(Depth::Infinity),
        }
    }

    /// The largest allowed depth that is not deeper than `self`. If
    /// none is, the shallowest allowed depth.
    pub fn clamp_to(self, allowed: &[Depth]) -> Depth {
        allowed
            .iter()
            .copied()
            .filter(|d| *d <= self)
            .max()
            .or_else(|| allowed.iter().copied().min())
            .unwrap_or(self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "infinity",
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Header for Depth {
    fn name() -> &'static HeaderName {
        &DEPTH
    }

    fn decode<'i, I>(values: &mut I) -> Result<Depth, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = one(values)?;
        match value.as_bytes() {
            b"0" => Ok(Depth::Zero),
            b"1" => Ok(Depth::One),
            _ => Ok(Depth::Infinity),
        }
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        values.extend(std::iter::once(HeaderValue::from_static(self.as_str())));
    }
}

/// Overwrite: header. Only `F` turns overwriting off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overwrite(pub bool);

impl Default for Overwrite {
    fn default() -> Self {
        Overwrite(true)
    }
}

impl Header for Overwrite {
    fn name() -> &'static HeaderName {
        &OVERWRITE
    }

    fn decode<'i, I>(values: &mut I) -> Result<Overwrite, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let line = one(values)?;
        Ok(Overwrite(!line.as_bytes().eq_ignore_ascii_case(b"F")))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let value = if self.0 { "T" } else { "F" };
        values.extend(std::iter::once(HeaderValue::from_static(value)));
    }
}

/// Timeout: header, in seconds. `None` is infinite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timeout(pub Option<u64>);

fn parse_timeout(word: &str) -> Option<u64> {
    let word = word.trim();
    let secs = word
        .strip_prefix("Second-")
        .or_else(|| word.strip_prefix("Seconds-"))?;
    secs.parse::<u64>().ok()
}

impl Header for Timeout {
    fn name() -> &'static HeaderName {
        &TIMEOUT
    }

    // only the first listed value counts. Anything that cannot be
    // parsed, including "Infinite", is infinite.
    fn decode<'i, I>(values: &mut I) -> Result<Timeout, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(invalid)?;
        let first = value
            .to_str()
            .map_err(map_invalid)?
            .split(',')
            .next()
            .unwrap_or("");
        Ok(Timeout(parse_timeout(first)))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let value = match self.0 {
            Some(secs) => format!("Second-{}", secs),
            None => "Infinite".to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&value) {
            values.extend(std::iter::once(value));
        }
    }
}

/// Destination: header, as sent by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination(pub String);

impl Destination {
    /// Resolve against the request URL and strip `prefix`. Both absolute
    /// URLs and absolute paths are accepted.
    pub fn to_davpath(&self, prefix: &str) -> Option<DavPath> {
        let base = Url::parse("http://localhost/").ok()?;
        let url = base.join(&self.0).ok()?;
        DavPath::from_str_and_prefix(url.path(), prefix).ok()
    }
}

impl Header for Destination {
    fn name() -> &'static HeaderName {
        &DESTINATION
    }

    fn decode<'i, I>(values: &mut I) -> Result<Destination, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let s = one(values)?.to_str().map_err(map_invalid)?;
        if s.is_empty() {
            return Err(invalid());
        }
        Ok(Destination(s.to_string()))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(value));
        }
    }
}

/// Lock-Token: header, `<urn:uuid:...>`.
///
/// Anything else fails to decode, which callers treat the same as a
/// missing header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockToken(pub Uuid);

fn parse_coded_token(s: &str) -> Option<Uuid> {
    let inner = s.trim().strip_prefix('<')?.strip_suffix('>')?;
    let id = inner.strip_prefix(LOCK_TOKEN_PREFIX)?;
    Uuid::parse_str(id).ok()
}

impl Header for LockToken {
    fn name() -> &'static HeaderName {
        &LOCK_TOKEN
    }

    fn decode<'i, I>(values: &mut I) -> Result<LockToken, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let s = one(values)?.to_str().map_err(map_invalid)?;
        parse_coded_token(s).map(LockToken).ok_or_else(invalid)
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let s = format!("<{}{}>", LOCK_TOKEN_PREFIX, self.0);
        if let Ok(value) = HeaderValue::from_str(&s) {
            values.extend(std::iter::once(value));
        }
    }
}

/// One condition inside an `If` list.
#[derive(Debug, Clone, PartialEq)]
pub enum IfItem {
    StateToken(String),
    ETag(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfCondition {
    pub not: bool,
    pub item: IfItem,
}

/// One parenthesized list, optionally tagged with a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct IfList {
    pub resource_tag: Option<String>,
    pub conditions: Vec<IfCondition>,
}

/// If: header (RFC4918 10.4).
#[derive(Debug, Clone, PartialEq)]
pub struct If(pub Vec<IfList>);

impl If {
    /// Collect the submitted lock tokens. Tagged resources are resolved
    /// against `prefix`; tags outside of it are ignored.
    pub fn token_map(&self, prefix: &str) -> TokenMap {
        let mut map = TokenMap::new();
        for list in &self.0 {
            let path = match list.resource_tag {
                Some(ref tag) => match Destination(tag.clone()).to_davpath(prefix) {
                    Some(path) => Some(path),
                    None => continue,
                },
                None => None,
            };
            for cond in &list.conditions {
                if let (false, IfItem::StateToken(ref token)) = (cond.not, &cond.item) {
                    match path {
                        Some(ref path) => map.insert(path.clone(), token.clone()),
                        None => map.insert_untagged(token.clone()),
                    }
                }
            }
        }
        map
    }
}

// tiny tokenizer for the If: header.
struct IfParser<'a> {
    s: &'a str,
}

impl<'a> IfParser<'a> {
    fn skip_ws(&mut self) {
        self.s = self.s.trim_start();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.s.chars().next()
    }

    // read up to and including `end`, return what was in between.
    fn delimited(&mut self, end: char) -> Option<&'a str> {
        let n = self.s.find(end)?;
        let inner = &self.s[1..n];
        self.s = &self.s[n + 1..];
        Some(inner)
    }

    fn condition(&mut self) -> Option<IfCondition> {
        let mut not = false;
        if self.s.starts_with("Not") || self.s.starts_with("not") {
            not = true;
            self.s = &self.s[3..];
            self.skip_ws();
        }
        let item = match self.s.chars().next()? {
            '<' => IfItem::StateToken(self.delimited('>')?.to_string()),
            '[' => IfItem::ETag(self.delimited(']')?.to_string()),
            _ => return None,
        };
        Some(IfCondition { not, item })
    }

    fn list(&mut self, resource_tag: Option<String>) -> Option<IfList> {
        // skip '('
        self.s = &self.s[1..];
        let mut conditions = Vec::new();
        loop {
            match self.peek()? {
                ')' => {
                    self.s = &self.s[1..];
                    break;
                }
                _ => conditions.push(self.condition()?),
            }
        }
        if conditions.is_empty() {
            return None;
        }
        Some(IfList {
            resource_tag,
            conditions,
        })
    }

    fn parse(mut self) -> Option<If> {
        let mut lists = Vec::new();
        let mut tag: Option<String> = None;
        let mut tagged = None;
        while let Some(c) = self.peek() {
            match c {
                '<' => {
                    // a resource tag; mixing tagged and untagged is not allowed.
                    if tagged == Some(false) {
                        return None;
                    }
                    tagged = Some(true);
                    tag = Some(self.delimited('>')?.to_string());
                }
                '(' => {
                    if tagged.is_none() {
                        tagged = Some(false);
                    }
                    if tagged == Some(true) && tag.is_none() {
                        return None;
                    }
                    lists.push(self.list(tag.clone())?);
                }
                _ => return None,
            }
        }
        if lists.is_empty() {
            return None;
        }
        Some(If(lists))
    }
}

impl TryFrom<&str> for If {
    type Error = headers::Error;

    fn try_from(s: &str) -> Result<If, headers::Error> {
        IfParser { s }.parse().ok_or_else(invalid)
    }
}

impl Header for If {
    fn name() -> &'static HeaderName {
        &IF
    }

    fn decode<'i, I>(values: &mut I) -> Result<If, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let mut lists = Vec::new();
        for value in values {
            let s = value.to_str().map_err(map_invalid)?;
            lists.extend(If::try_from(s)?.0);
        }
        if lists.is_empty() {
            return Err(invalid());
        }
        Ok(If(lists))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let mut s = String::new();
        for list in &self.0 {
            if let Some(ref tag) = list.resource_tag {
                s.push_str(&format!("<{}> ", tag));
            }
            s.push('(');
            for (i, cond) in list.conditions.iter().enumerate() {
                if i > 0 {
                    s.push(' ');
                }
                if cond.not {
                    s.push_str("Not ");
                }
                match cond.item {
                    IfItem::StateToken(ref t) => s.push_str(&format!("<{}>", t)),
                    IfItem::ETag(ref e) => s.push_str(&format!("[{}]", e)),
                }
            }
            s.push_str(") ");
        }
        if let Ok(value) = HeaderValue::from_str(s.trim_end()) {
            values.extend(std::iter::once(value));
        }
    }
}
