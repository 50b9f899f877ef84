use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream;
use headers::HeaderMapExt;
use http::{Request, StatusCode};
use uuid::Uuid;
use xmltree::Element;

use super::reply::DavReply;
use super::DavRequest;
use crate::davheaders::{self, Depth};
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::locks::{check_down, check_up, covering_lock, DavLock, LockCheck, LockScope, TokenMap};
use crate::multistatus::lockdiscovery;
use crate::store::{ContentStream, Entity};
use crate::xmltree_ext::ElementExt;
use crate::DavResult;

// What a <D:lockinfo> body asks for.
struct LockInfo {
    scope: LockScope,
    owner: Option<String>,
}

fn parse_lockinfo(body: &[u8]) -> DavResult<LockInfo> {
    let tree = Element::parse2(body)?;
    if !tree.is_dav("lockinfo") {
        return Err(DavError::XmlParseError);
    }

    let scope = tree
        .dav_child("lockscope")
        .and_then(|s| s.child_elems_iter().next())
        .ok_or(DavError::XmlParseError)?;
    let scope = if scope.is_dav("exclusive") {
        LockScope::Exclusive
    } else if scope.is_dav("shared") {
        LockScope::Shared
    } else {
        return Err(DavError::XmlParseError);
    };

    let write = tree
        .dav_child("locktype")
        .map(|t| t.child_elems_iter().any(|e| e.is_dav("write")))
        .unwrap_or(false);
    if !write {
        return Err(DavError::XmlParseError);
    }

    let owner = tree
        .dav_child("owner")
        .map(|o| o.text_content().trim().to_string())
        .filter(|o| !o.is_empty());

    Ok(LockInfo { scope, owner })
}

impl crate::DavHandler {
    // Stamp `lock` onto every resource it covers, children first.
    fn lock_tree<'a>(
        &'a self,
        path: &'a DavPath,
        lock: &'a DavLock,
    ) -> BoxFuture<'a, DavResult<Entity>> {
        async move {
            let store = self.store();
            if lock.depth == Depth::Infinity && store.entity(path).await?.is_collection() {
                for child in store.list(path).await? {
                    self.lock_tree(&child, lock).await?;
                }
            }
            Ok(store.lock(path, lock.clone()).await?)
        }
        .boxed()
    }

    // A resource created below a depth-infinity lock joins that lock.
    pub(crate) async fn inherit_lock(&self, path: &DavPath) -> DavResult<()> {
        if let Some(lock) = covering_lock(self.store(), path).await? {
            trace!("{} joins lock {}", path, lock.token_urn());
            self.lock_tree(path, &lock).await?;
        }
        Ok(())
    }

    // Release the lock with `token` everywhere below (and at) `path`.
    fn unlock_tree<'a>(&'a self, path: &'a DavPath, token: Uuid) -> BoxFuture<'a, DavResult<()>> {
        async move {
            let store = self.store();
            let entity = store.entity(path).await?;
            if entity.lock.as_ref().map(|l| l.token) == Some(token) {
                store.unlock(path).await?;
            }
            if entity.is_collection() {
                for child in store.list(path).await? {
                    self.unlock_tree(&child, token).await?;
                }
            }
            Ok(())
        }
        .boxed()
    }

    fn lock_reply(&self, status: StatusCode, lock: &DavLock, entity: Entity) -> DavResult<DavReply> {
        let body = lockdiscovery(lock, self.prefix())?;
        Ok(DavReply::Lock {
            status,
            entity,
            token: lock.token_urn(),
            body,
        })
    }

    pub(crate) async fn handle_lock(
        &self,
        req: &Request<()>,
        dreq: &DavRequest,
        body: &[u8],
    ) -> DavResult<DavReply> {
        let path = &dreq.path;
        let store = self.store();

        // parse before anything gets created.
        let info = if body.is_empty() {
            None
        } else {
            Some(parse_lockinfo(body)?)
        };

        let depth = req
            .headers()
            .typed_get::<Depth>()
            .unwrap_or(Depth::Infinity)
            .clamp_to(&[Depth::Zero, Depth::Infinity]);
        let timeout = req
            .headers()
            .typed_get::<davheaders::Timeout>()
            .unwrap_or_default()
            .0;

        let existing = self.entity_opt(path).await?;

        // an already-locked resource: report the lock, or refuse a new one.
        if let Some(ref entity) = existing {
            if let Some(ref lock) = entity.lock {
                if info.is_some() {
                    debug!("LOCK {}: already locked", path);
                    return Ok(StatusCode::LOCKED.into());
                }
                return self.lock_reply(StatusCode::OK, lock, entity.clone());
            }
        }

        let info = match info {
            Some(info) => info,
            None => {
                debug!("LOCK {}: no lockinfo and nothing to refresh", path);
                return Ok(StatusCode::BAD_REQUEST.into());
            }
        };

        // exclusive locks do not nest.
        if let Some(lock) = covering_lock(store, path).await? {
            debug!("LOCK {}: inside lock {} on {}", path, lock.token_urn(), lock.root);
            return Ok(StatusCode::LOCKED.into());
        }

        // the lock must not cover anything that is locked already.
        let res = match existing {
            Some(_) if depth == Depth::Infinity => {
                check_down(store, path, Depth::Infinity, &TokenMap::new()).await?
            }
            Some(_) => LockCheck::Valid,
            None => check_up(store, path, &dreq.tokens).await?,
        };
        if let LockCheck::Locked(at) = res {
            debug!("LOCK {}: conflicts with lock at {}", path, at);
            return Ok(StatusCode::LOCKED.into());
        }

        let status = match existing {
            Some(_) => StatusCode::OK,
            None => {
                if !self.has_parent(path).await? {
                    return Ok(StatusCode::CONFLICT.into());
                }
                // lock-null resource.
                let empty: ContentStream<'static> =
                    Box::pin(stream::empty::<std::io::Result<Bytes>>());
                store.create_item(path, empty).await?;
                StatusCode::CREATED
            }
        };

        let mut lock = store.create_lock();
        lock.scope = info.scope;
        lock.owner = info.owner.or_else(|| self.config.principal.clone());
        lock.root = path.clone();
        lock.depth = depth;
        lock.timeout = timeout;

        let entity = self.lock_tree(path, &lock).await?;
        debug!("LOCK {}: created {}", path, lock.token_urn());
        self.lock_reply(status, &lock, entity)
    }

    pub(crate) async fn handle_unlock(
        &self,
        req: &Request<()>,
        dreq: &DavRequest,
    ) -> DavResult<DavReply> {
        let path = &dreq.path;

        let entity = match self.entity_opt(path).await? {
            Some(e) => e,
            None => return Ok(StatusCode::NOT_FOUND.into()),
        };
        let lock = match entity.lock {
            Some(lock) => lock,
            None => return Ok(StatusCode::BAD_REQUEST.into()),
        };

        // a malformed Lock-Token: header counts as no header at all.
        match req.headers().typed_get::<davheaders::LockToken>() {
            Some(t) if t.0 == lock.token => {}
            other => {
                debug!("UNLOCK {}: token {:?} does not match", path, other);
                return Ok(StatusCode::LOCKED.into());
            }
        }

        self.unlock_tree(&lock.root, lock.token).await?;
        Ok(StatusCode::NO_CONTENT.into())
    }
}
