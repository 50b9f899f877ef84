use http::StatusCode;

use super::reply::DavReply;
use super::DavRequest;
use crate::locks::{check_up, LockCheck};
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_mkcol(&self, dreq: &DavRequest, body: &[u8]) -> DavResult<DavReply> {
        let path = &dreq.path;

        if !body.is_empty() {
            return Ok(StatusCode::UNSUPPORTED_MEDIA_TYPE.into());
        }
        if self.store().exists(path).await? {
            return Ok(StatusCode::METHOD_NOT_ALLOWED.into());
        }
        if !self.has_parent(path).await? {
            return Ok(StatusCode::CONFLICT.into());
        }
        if let LockCheck::Locked(at) = check_up(self.store(), path, &dreq.tokens).await? {
            debug!("MKCOL {}: locked at {}", path, at);
            return Ok(StatusCode::LOCKED.into());
        }

        self.store().create_collection(path).await?;
        self.inherit_lock(path).await?;
        let entity = self.store().entity(path).await?;
        Ok(DavReply::Entity(StatusCode::CREATED, entity))
    }
}
