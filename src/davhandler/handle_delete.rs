use futures_util::future::{BoxFuture, FutureExt};
use http::StatusCode;

use super::reply::DavReply;
use super::DavRequest;
use crate::davheaders::Depth;
use crate::davpath::DavPath;
use crate::locks::{check_down, check_up, LockCheck};
use crate::DavResult;

impl crate::DavHandler {
    // Remove a subtree, children before parents. Lock validation must
    // have been done by the caller.
    pub(crate) fn delete_tree<'a>(&'a self, path: &'a DavPath) -> BoxFuture<'a, DavResult<()>> {
        async move {
            let entity = self.store().entity(path).await?;
            if entity.is_collection() {
                for child in self.store().list(path).await? {
                    self.delete_tree(&child).await?;
                }
            }
            trace!("delete {}", path);
            self.store().delete(path).await?;
            Ok(())
        }
        .boxed()
    }

    pub(crate) async fn handle_delete(&self, dreq: &DavRequest) -> DavResult<DavReply> {
        let path = &dreq.path;

        if path.is_root() {
            debug!("refusing to delete the root");
            return Ok(StatusCode::FORBIDDEN.into());
        }
        if !self.store().exists(path).await? {
            return Ok(StatusCode::NOT_FOUND.into());
        }

        // validate everything first, then delete.
        let mut res = check_up(self.store(), path, &dreq.tokens).await?;
        if res.is_valid() {
            res = check_down(self.store(), path, Depth::Infinity, &dreq.tokens).await?;
        }
        if let LockCheck::Locked(at) = res {
            debug!("DELETE {}: locked at {}", path, at);
            return Ok(StatusCode::LOCKED.into());
        }

        self.delete_tree(path).await?;
        Ok(StatusCode::NO_CONTENT.into())
    }
}
