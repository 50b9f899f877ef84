use std::error::Error as StdError;
use std::io;

use bytes::Buf;
use http::StatusCode;
use http_body::Body as HttpBody;

use super::reply::DavReply;
use super::DavRequest;
use crate::locks::{check_up, LockCheck};
use crate::store::ContentStream;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_put<ReqBody, ReqData, ReqError>(
        &self,
        dreq: &DavRequest,
        body: ReqBody,
    ) -> DavResult<DavReply>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError> + Send,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let path = &dreq.path;

        let existing = self.entity_opt(path).await?;
        if let Some(ref entity) = existing {
            if entity.is_collection() {
                debug!("PUT on collection {}", path);
                return Ok(StatusCode::METHOD_NOT_ALLOWED.into());
            }
        }
        if !self.has_parent(path).await? {
            return Ok(StatusCode::CONFLICT.into());
        }
        if let LockCheck::Locked(at) = check_up(self.store(), path, &dreq.tokens).await? {
            debug!("PUT {}: locked at {}", path, at);
            return Ok(StatusCode::LOCKED.into());
        }

        let content = async_stream::stream! {
            pin_utils::pin_mut!(body);
            while let Some(res) = body.data().await {
                match res {
                    Ok(mut buf) => {
                        yield Ok(buf.copy_to_bytes(buf.remaining()));
                    }
                    Err(e) => {
                        yield Err(io::Error::new(io::ErrorKind::Other, e));
                        break;
                    }
                }
            }
        };
        let content: ContentStream<'_> = Box::pin(content);
        self.store().create_item(path, content).await?;
        if existing.is_none() {
            self.inherit_lock(path).await?;
        }

        let entity = self.store().entity(path).await?;
        Ok(DavReply::Entity(StatusCode::CREATED, entity))
    }
}
