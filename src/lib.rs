//! ## Async WebDAV protocol engine
//!
//! [`Webdav`] (RFC4918) is defined as
//! HTTP (GET/HEAD/PUT/DELETE) plus a bunch of extension methods (PROPFIND, etc).
//! These extension methods are used to manage collections (like unix directories),
//! get information on collections (like unix `ls` or `readdir`), rename and
//! copy items, lock/unlock items, etc.
//!
//! A `handler` is a piece of code that takes a `http::Request`, processes it in some
//! way, and then generates a `http::Response`. This library is a `handler` that maps
//! the HTTP/Webdav protocol onto a resource store. The store is a trait, [`DavStore`],
//! so the same engine works on top of memory, a database, or anything else that can
//! hold a tree of collections and items.
//!
//! ## What the engine does.
//!
//! - dispatches the webdav methods (GET, HEAD, PUT, DELETE, MKCOL, COPY, MOVE,
//!   LOCK, UNLOCK, PROPFIND, PROPPATCH, OPTIONS) after an authorization gate
//!   and the `If`, `If-Match` and `If-None-Match` preconditions.
//! - keeps write locks. A lock is stamped onto every resource it covers and
//!   checked against the tokens in the `If:` header, up to the root and down
//!   through the affected subtree, before anything is changed.
//! - computes the live properties, merges them with the dead properties the
//!   store keeps, and writes `207 Multi-Status` documents with stable namespace
//!   prefixes.
//!
//! Only exclusive write locks are handed out in practice. Lock timeouts are
//! reported but never expire.
//!
//! ## Backends.
//!
//! Included is one store:
//!
//! - [`MemStore`]: ephemeral in-memory store, with dead properties and locks.
//!
//! ## Example.
//!
//! Example server using [hyper] that serves an in-memory store in r/w mode.
//!
//! ```no_run
//! use std::convert::Infallible;
//! use dav_engine::{DavHandler, MemStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let addr = ([127, 0, 0, 1], 4918).into();
//!
//!     let dav_server = DavHandler::builder(MemStore::new())
//!         .autoindex(true)
//!         .build();
//!
//!     let make_service = hyper::service::make_service_fn(move |_| {
//!         let dav_server = dav_server.clone();
//!         async move {
//!             let func = move |req| {
//!                 let dav_server = dav_server.clone();
//!                 async move {
//!                     Ok::<_, Infallible>(dav_server.handle(req).await)
//!                 }
//!             };
//!             Ok::<_, Infallible>(hyper::service::service_fn(func))
//!         }
//!     });
//!
//!     println!("Serving on {}", addr);
//!     let _ = hyper::Server::bind(&addr)
//!         .serve(make_service)
//!         .await
//!         .map_err(|e| eprintln!("server error: {}", e));
//! }
//! ```
//!
//! [`Webdav`]: https://tools.ietf.org/html/rfc4918
//! [hyper]: https://hyper.rs/

#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

mod conditional;
mod davhandler;
mod davheaders;
mod errors;
mod locks;
mod multistatus;
mod props;
mod util;
mod xmltree_ext;

pub mod body;
pub mod davpath;
pub mod store;

use crate::errors::{DavError, DavResult};

pub use crate::davhandler::{Access, Authorize, DavBuilder, DavHandler, DEFAULT_MAX_BODY_SIZE};
pub use crate::davheaders::Depth;
pub use crate::davpath::DavPath;
pub use crate::locks::{DavLock, LockScope, LockType, TokenMap, LOCK_TOKEN_PREFIX};
pub use crate::props::{
    assign_prefixes, live_properties, merge_properties, Property, PropertyIdentifier,
    PropertyValue, DAV_NS,
};
pub use crate::store::{DavStore, Entity, EntityType, StoreError};
pub use crate::util::{allowed_methods, DavMethod, ResourceState};

#[cfg(any(docsrs, feature = "memstore"))]
#[cfg_attr(docsrs, doc(cfg(feature = "memstore")))]
pub use crate::store::memstore::MemStore;
