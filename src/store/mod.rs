//! Contains the structs and traits that define a resource store backend.
//!
//! The engine never touches storage directly. Everything goes through the
//! [`DavStore`] trait: existence checks, entity snapshots, content, dead
//! properties and per-resource locks. An implementation must be safe to
//! call from many requests at once, but it does not need to offer any
//! transactional primitives.
use std::error::Error;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::SystemTime;

use bytes::Bytes;
use futures_util::Stream;

use crate::davpath::DavPath;
use crate::locks::DavLock;
use crate::props::Property;

#[cfg(any(docsrs, feature = "memstore"))]
pub(crate) mod memstore;

/// Errors generated by a store implementation.
#[derive(Debug)]
pub enum StoreError {
    NotImplemented,
    GeneralFailure,
    Exists,
    NotFound,
    Forbidden,
    Io(io::Error),
}

/// The Result type.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Future returned by almost all of the DavStore methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Byte stream used for resource content, in both directions.
pub type ContentStream<'a> = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'a>>;

/// Kind of resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Collection,
    Item,
}

/// Read snapshot of a resource.
///
/// This is not a live handle. After a mutation the caller has to fetch
/// the entity again.
#[derive(Debug, Clone)]
pub struct Entity {
    pub path: DavPath,
    pub kind: EntityType,
    pub size: u64,
    pub last_modified: SystemTime,
    /// Content hash, only meaningful for items.
    pub etag: Option<String>,
    pub lock: Option<DavLock>,
}

impl Entity {
    pub fn is_collection(&self) -> bool {
        self.kind == EntityType::Collection
    }

    pub fn is_item(&self) -> bool {
        self.kind == EntityType::Item
    }

    /// Display name, the last path segment.
    pub fn name(&self) -> &str {
        self.path.name()
    }
}

/// The trait that defines a resource store.
pub trait DavStore: Send + Sync {
    /// Does a resource exist at `path`.
    fn exists<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, bool>;

    /// Snapshot of the resource at `path`.
    fn entity<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, Entity>;

    /// Direct children of a collection.
    fn list<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, Vec<DavPath>>;

    /// Content of an item.
    fn content<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, ContentStream<'static>>;

    /// Create or replace an item.
    fn create_item<'a>(
        &'a self,
        path: &'a DavPath,
        content: ContentStream<'a>,
    ) -> StoreFuture<'a, ()>;

    /// Create an empty collection.
    fn create_collection<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, ()>;

    /// Delete one resource, together with its dead properties and lock.
    fn delete<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, ()>;

    /// Dead properties of a resource.
    fn properties<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, Vec<Property>>;

    /// Replace the full dead property set of a resource.
    fn set_properties<'a>(
        &'a self,
        path: &'a DavPath,
        props: Vec<Property>,
    ) -> StoreFuture<'a, ()>;

    /// A new lock with a fresh token. The caller fills in the other fields.
    fn create_lock(&self) -> DavLock {
        DavLock::new()
    }

    /// Attach `lock` to the resource at `path`.
    fn lock<'a>(&'a self, path: &'a DavPath, lock: DavLock) -> StoreFuture<'a, Entity>;

    /// Remove the lock from the resource at `path`.
    fn unlock<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, ()>;
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound,
            io::ErrorKind::AlreadyExists => StoreError::Exists,
            io::ErrorKind::PermissionDenied => StoreError::Forbidden,
            _ => StoreError::Io(e),
        }
    }
}
