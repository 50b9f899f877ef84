use std::io::{Cursor, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use bitflags::bitflags;
use bytes::Bytes;
use headers::Header;
use http::method::InvalidMethod;
use time::macros::offset;

use crate::errors::DavError;
use crate::DavResult;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DavMethod: u32 {
        const HEAD = 0x0001;
        const GET = 0x0002;
        const PUT = 0x0004;
        const OPTIONS = 0x0010;
        const PROPFIND = 0x0020;
        const PROPPATCH = 0x0040;
        const MKCOL = 0x0080;
        const COPY = 0x0100;
        const MOVE = 0x0200;
        const DELETE = 0x0400;
        const LOCK = 0x0800;
        const UNLOCK = 0x1000;

        const WEBDAV_RO = Self::HEAD.bits() | Self::GET.bits()
            | Self::OPTIONS.bits() | Self::PROPFIND.bits();
        const WEBDAV_BODY = Self::PUT.bits() | Self::PROPFIND.bits()
            | Self::PROPPATCH.bits() | Self::LOCK.bits() | Self::MKCOL.bits();

        // Allow sets, see `allowed_methods`.
        const ALLOW_UNMAPPED_RW = Self::WEBDAV_RO.bits()
            | Self::LOCK.bits() | Self::MKCOL.bits() | Self::PUT.bits();
        const ALLOW_COLLECTION_RW = Self::WEBDAV_RO.bits()
            | Self::COPY.bits() | Self::DELETE.bits() | Self::LOCK.bits()
            | Self::MOVE.bits() | Self::PROPPATCH.bits() | Self::UNLOCK.bits();
        const ALLOW_ITEM_RW = Self::ALLOW_COLLECTION_RW.bits() | Self::PUT.bits();
    }
}

impl DavMethod {
    pub const WEBDAV_RW: Self = Self::all();

    /// Does this method change the store.
    pub fn is_write(self) -> bool {
        !DavMethod::WEBDAV_RO.contains(self)
    }

    /// Comma separated list for the `Allow` header, in a fixed order.
    /// The flag names double as the wire names.
    pub fn allow_header(self) -> String {
        self.iter_names()
            .map(|(name, _)| name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// State of the target resource, for `Allow` derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Unmapped,
    Item,
    Collection,
}

/// The methods that make sense for a resource in `state`.
pub fn allowed_methods(state: ResourceState, read_only: bool) -> DavMethod {
    if read_only {
        return DavMethod::WEBDAV_RO;
    }
    match state {
        ResourceState::Unmapped => DavMethod::ALLOW_UNMAPPED_RW,
        ResourceState::Item => DavMethod::ALLOW_ITEM_RW,
        ResourceState::Collection => DavMethod::ALLOW_COLLECTION_RW,
    }
}

// translate method into our own enum that has webdav methods as well.
pub(crate) fn dav_method(m: &http::Method) -> DavResult<DavMethod> {
    let m = match *m {
        http::Method::HEAD => DavMethod::HEAD,
        http::Method::GET => DavMethod::GET,
        http::Method::PUT => DavMethod::PUT,
        http::Method::DELETE => DavMethod::DELETE,
        http::Method::OPTIONS => DavMethod::OPTIONS,
        _ => match m.as_str() {
            "PROPFIND" => DavMethod::PROPFIND,
            "PROPPATCH" => DavMethod::PROPPATCH,
            "MKCOL" => DavMethod::MKCOL,
            "COPY" => DavMethod::COPY,
            "MOVE" => DavMethod::MOVE,
            "LOCK" => DavMethod::LOCK,
            "UNLOCK" => DavMethod::UNLOCK,
            _ => {
                return Err(DavError::UnknownDavMethod);
            }
        },
    };
    Ok(m)
}

// for external use.
impl std::convert::TryFrom<&http::Method> for DavMethod {
    type Error = InvalidMethod;

    fn try_from(value: &http::Method) -> Result<Self, Self::Error> {
        dav_method(value).map_err(|_| {
            // A trick to get at the value of http::method::InvalidMethod.
            http::method::Method::from_bytes(b"").unwrap_err()
        })
    }
}

pub fn systemtime_to_offsetdatetime(t: SystemTime) -> time::OffsetDateTime {
    match t.duration_since(UNIX_EPOCH) {
        Ok(t) => time::OffsetDateTime::from_unix_timestamp(t.as_secs() as i64)
            .unwrap_or(time::OffsetDateTime::UNIX_EPOCH)
            .to_offset(offset!(UTC)),
        Err(_) => time::OffsetDateTime::UNIX_EPOCH.to_offset(offset!(UTC)),
    }
}

/// RFC 1123 date, as used by `Last-Modified` and `getlastmodified`.
pub fn systemtime_to_httpdate(t: SystemTime) -> String {
    let d = headers::Date::from(t);
    let mut v = Vec::new();
    d.encode(&mut v);
    v.first()
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

// A buffer that implements "Write".
#[derive(Clone)]
pub struct MemBuffer(Cursor<Vec<u8>>);

impl MemBuffer {
    pub fn new() -> MemBuffer {
        MemBuffer(Cursor::new(Vec::new()))
    }

    pub fn take(&mut self) -> Bytes {
        let buf = std::mem::take(self.0.get_mut());
        self.0.set_position(0);
        Bytes::from(buf)
    }
}

impl Write for MemBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
