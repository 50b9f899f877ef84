//! Lock model and lock validation.
//!
//! A lock is stamped onto every resource it covers, so validating a path
//! means looking at the lock (if any) carried by each affected entity and
//! comparing its token against the tokens the client submitted.
//!
//! Validation is a pure read pass. Callers validate the whole affected
//! part of the tree first and mutate afterwards. Nothing here is atomic
//! with respect to other requests: a LOCK or UNLOCK that lands between
//! the check and the mutation is not detected.
use std::collections::HashMap;

use futures_util::future::{BoxFuture, FutureExt};
use http::StatusCode;
use uuid::Uuid;

use crate::davheaders::Depth;
use crate::davpath::DavPath;
use crate::errors::{DavError, DavResult};
use crate::store::{DavStore, Entity};

/// Prefix of every lock token on the wire.
pub const LOCK_TOKEN_PREFIX: &str = "urn:uuid:";

/// Lock scope. Only exclusive locks are ever enforced, `Shared` is
/// recorded and reported but behaves the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    Exclusive,
    Shared,
}

/// Lock type. WebDAV only defines write locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockType {
    Write,
}

/// A webdav lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavLock {
    pub token: Uuid,
    pub scope: LockScope,
    pub kind: LockType,
    pub owner: Option<String>,
    pub root: DavPath,
    pub depth: Depth,
    /// Advisory, `None` means infinite. Nothing expires locks.
    pub timeout: Option<u64>,
}

impl DavLock {
    /// A fresh exclusive write lock on the root with a new token.
    pub fn new() -> DavLock {
        DavLock {
            token: Uuid::new_v4(),
            scope: LockScope::Exclusive,
            kind: LockType::Write,
            owner: None,
            root: DavPath::root(),
            depth: Depth::Infinity,
            timeout: None,
        }
    }

    /// The token as it appears in `If` and `Lock-Token` headers.
    pub fn token_urn(&self) -> String {
        format!("{}{}", LOCK_TOKEN_PREFIX, self.token)
    }
}

impl Default for DavLock {
    fn default() -> Self {
        DavLock::new()
    }
}

/// Lock tokens submitted with a request, usually from the `If` header.
///
/// Tagged tokens belong to one resource. Untagged tokens were sent for the
/// request URI and are accepted for every resource the request touches.
#[derive(Debug, Clone, Default)]
pub struct TokenMap {
    tagged: HashMap<DavPath, Vec<String>>,
    untagged: Vec<String>,
}

impl TokenMap {
    pub fn new() -> TokenMap {
        TokenMap::default()
    }

    /// Submit `token` for `path`.
    pub fn insert(&mut self, path: DavPath, token: impl Into<String>) {
        self.tagged.entry(path).or_default().push(token.into());
    }

    /// Submit `token` for every resource.
    pub fn insert_untagged(&mut self, token: impl Into<String>) {
        self.untagged.push(token.into());
    }

    pub fn is_empty(&self) -> bool {
        self.tagged.is_empty() && self.untagged.is_empty()
    }

    fn submitted_for(&self, path: &DavPath, token: &str) -> bool {
        self.tagged
            .get(path)
            .map(|v| v.iter().any(|t| t == token))
            .unwrap_or(false)
    }

    /// Does the client hold the token of `lock`, which sits on `path`.
    pub fn proves(&self, path: &DavPath, lock: &DavLock) -> bool {
        let token = lock.token_urn();
        self.untagged.iter().any(|t| *t == token)
            || self.submitted_for(path, &token)
            || self.submitted_for(&lock.root, &token)
    }
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub(crate) enum LockCheck {
    Valid,
    /// The resource at this path holds a lock the client did not prove.
    Locked(DavPath),
}

impl LockCheck {
    pub fn is_valid(&self) -> bool {
        *self == LockCheck::Valid
    }
}

/// Fails if `entity` carries a lock whose token was not submitted.
pub(crate) fn check_lock_token_on_entity(entity: &Entity, tokens: &TokenMap) -> LockCheck {
    match entity.lock {
        Some(ref lock) if !tokens.proves(&entity.path, lock) => {
            debug!("lock check: {} is locked by {}", entity.path, lock.token_urn());
            LockCheck::Locked(entity.path.clone())
        }
        _ => LockCheck::Valid,
    }
}

// validate a single path, a missing resource is never locked.
async fn check_path(store: &dyn DavStore, path: &DavPath, tokens: &TokenMap) -> DavResult<LockCheck> {
    if !store.exists(path).await? {
        return Ok(LockCheck::Valid);
    }
    let entity = store.entity(path).await?;
    Ok(check_lock_token_on_entity(&entity, tokens))
}

/// Validate `path` and every ancestor up to and including the root.
pub(crate) async fn check_up(
    store: &dyn DavStore,
    path: &DavPath,
    tokens: &TokenMap,
) -> DavResult<LockCheck> {
    let mut path = path.clone();
    loop {
        let res = check_path(store, &path, tokens).await?;
        if !res.is_valid() || path.is_root() {
            return Ok(res);
        }
        path = path.parent();
    }
}

/// The depth-infinity lock held by the nearest locked ancestor of `path`.
///
/// Such a lock covers everything below its root, including resources that
/// are created after it was taken.
pub(crate) async fn covering_lock(
    store: &dyn DavStore,
    path: &DavPath,
) -> DavResult<Option<DavLock>> {
    let mut path = path.clone();
    while !path.is_root() {
        path = path.parent();
        if !store.exists(&path).await? {
            continue;
        }
        if let Some(lock) = store.entity(&path).await?.lock {
            if lock.depth == Depth::Infinity {
                return Ok(Some(lock));
            }
        }
    }
    Ok(None)
}

/// Validate `path` and every descendant down to `depth`.
///
/// Running out of depth while there are still descendants left is an
/// internal error: destructive operations must always pass `Infinity`.
pub(crate) fn check_down<'a>(
    store: &'a dyn DavStore,
    path: &'a DavPath,
    depth: Depth,
    tokens: &'a TokenMap,
) -> BoxFuture<'a, DavResult<LockCheck>> {
    async move {
        if !store.exists(path).await? {
            return Ok(LockCheck::Valid);
        }
        let entity = store.entity(path).await?;
        let res = check_lock_token_on_entity(&entity, tokens);
        if !res.is_valid() || !entity.is_collection() {
            return Ok(res);
        }
        let children = store.list(path).await?;
        if children.is_empty() {
            return Ok(LockCheck::Valid);
        }
        let next = match depth.decrement() {
            Some(d) => d,
            None => {
                error!("check_down: depth exhausted at {} with children left", path);
                return Err(DavError::Status(StatusCode::INTERNAL_SERVER_ERROR));
            }
        };
        for child in &children {
            let res = check_down(store, child, next, tokens).await?;
            if !res.is_valid() {
                return Ok(res);
            }
        }
        Ok(LockCheck::Valid)
    }
    .boxed()
}
