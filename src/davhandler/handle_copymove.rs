use futures_util::future::{BoxFuture, FutureExt};
use headers::HeaderMapExt;
use http::{Request, StatusCode};

use super::reply::DavReply;
use super::DavRequest;
use crate::davheaders::{self, Depth};
use crate::davpath::DavPath;
use crate::locks::{check_down, check_up, LockCheck};
use crate::util::DavMethod;
use crate::DavResult;

impl crate::DavHandler {
    // Copy `source` to `dest` in pre-order, descending at most `depth`
    // levels. Dead properties travel along, locks do not.
    fn copy_tree<'a>(
        &'a self,
        source: &'a DavPath,
        dest: &'a DavPath,
        depth: Depth,
    ) -> BoxFuture<'a, DavResult<()>> {
        async move {
            let store = self.store();
            let entity = store.entity(source).await?;
            trace!("copy {} -> {}", source, dest);
            if entity.is_collection() {
                store.create_collection(dest).await?;
            } else {
                let content = store.content(source).await?;
                store.create_item(dest, content).await?;
            }
            let props = store.properties(source).await?;
            if !props.is_empty() {
                store.set_properties(dest, props).await?;
            }

            if entity.is_collection() {
                if let Some(depth) = depth.decrement() {
                    for child in store.list(source).await? {
                        let target = child.rebase(source, dest);
                        self.copy_tree(&child, &target, depth).await?;
                    }
                }
            }
            Ok(())
        }
        .boxed()
    }

    pub(crate) async fn handle_copymove(
        &self,
        req: &Request<()>,
        dreq: &DavRequest,
    ) -> DavResult<DavReply> {
        let source = &dreq.path;
        let is_move = dreq.method == DavMethod::MOVE;
        let tokens = &dreq.tokens;

        if !self.store().exists(source).await? {
            return Ok(StatusCode::NOT_FOUND.into());
        }

        let dest = match req.headers().typed_get::<davheaders::Destination>() {
            Some(d) => match d.to_davpath(self.prefix()) {
                Some(p) => p,
                None => {
                    debug!("destination {:?} outside of {}", d.0, self.prefix());
                    return Ok(StatusCode::BAD_REQUEST.into());
                }
            },
            None => return Ok(StatusCode::BAD_REQUEST.into()),
        };
        let overwrite = req
            .headers()
            .typed_get::<davheaders::Overwrite>()
            .unwrap_or_default()
            .0;
        let depth = if is_move {
            Depth::Infinity
        } else {
            req.headers()
                .typed_get::<Depth>()
                .unwrap_or(Depth::Infinity)
                .clamp_to(&[Depth::Zero, Depth::One, Depth::Infinity])
        };

        // onto itself, into its own subtree, or over one of its ancestors.
        if dest.starts_with(source) || source.starts_with(&dest) {
            debug!("COPY/MOVE {} -> {}: overlapping", source, dest);
            return Ok(StatusCode::FORBIDDEN.into());
        }

        let dest_exists = self.store().exists(&dest).await?;
        if dest_exists && !overwrite {
            return Ok(StatusCode::PRECONDITION_FAILED.into());
        }
        if !self.has_parent(&dest).await? {
            return Ok(StatusCode::CONFLICT.into());
        }

        // all lock validation happens before anything is changed.
        let mut res = check_up(self.store(), &dest, tokens).await?;
        if res.is_valid() && dest_exists {
            res = check_down(self.store(), &dest, Depth::Infinity, tokens).await?;
        }
        if res.is_valid() && is_move {
            res = check_down(self.store(), source, Depth::Infinity, tokens).await?;
            if res.is_valid() {
                res = check_up(self.store(), &source.parent(), tokens).await?;
            }
        }
        if let LockCheck::Locked(at) = res {
            debug!("COPY/MOVE {} -> {}: locked at {}", source, dest, at);
            return Ok(StatusCode::LOCKED.into());
        }

        if dest_exists {
            self.delete_tree(&dest).await?;
        }
        self.copy_tree(source, &dest, depth).await?;
        self.inherit_lock(&dest).await?;
        if is_move {
            self.delete_tree(source).await?;
        }

        if dest_exists {
            Ok(StatusCode::NO_CONTENT.into())
        } else {
            Ok(StatusCode::CREATED.into())
        }
    }
}
