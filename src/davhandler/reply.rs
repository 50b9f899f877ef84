//
// Handler outcomes and the one place they are turned into a response.
//
use bytes::Bytes;
use headers::HeaderMapExt;
use http::header::{self, HeaderValue};
use http::{Response, StatusCode};

use crate::body::Body;
use crate::store::{ContentStream, Entity};
use crate::util::DavMethod;

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// What a handler produced.
///
/// Expected protocol outcomes (404, 409, 423, ...) are replies too, only
/// exceptional failures are returned as a `DavError`.
pub(crate) enum DavReply {
    /// Bare status.
    Status(StatusCode),
    /// Status about a resource, adds `ETag` and `Last-Modified`.
    Entity(StatusCode, Entity),
    /// 207 with a multistatus document.
    MultiStatus(Bytes),
    /// LOCK answer.
    Lock {
        status: StatusCode,
        entity: Entity,
        token: String,
        body: Bytes,
    },
    /// GET on an item.
    Content {
        entity: Entity,
        content_type: String,
        stream: ContentStream<'static>,
    },
    /// GET on a collection.
    Listing { entity: Entity, html: String },
    /// 401 with a challenge for `realm`.
    Unauthorized { realm: String },
}

impl std::fmt::Debug for DavReply {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "DavReply({})", self.status())
    }
}

impl From<StatusCode> for DavReply {
    fn from(status: StatusCode) -> DavReply {
        DavReply::Status(status)
    }
}

impl DavReply {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            DavReply::Status(s) | DavReply::Entity(s, _) => *s,
            DavReply::MultiStatus(_) => StatusCode::MULTI_STATUS,
            DavReply::Lock { status, .. } => *status,
            DavReply::Content { .. } | DavReply::Listing { .. } => StatusCode::OK,
            DavReply::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        }
    }

    /// Build the response. Every response gets the `DAV`, `MS-Author-Via`
    /// and `Allow` headers; `head` drops the body but keeps its length.
    pub(crate) fn into_response(self, allow: DavMethod, head: bool) -> Response<Body> {
        let mut res = Response::new(Body::empty());
        *res.status_mut() = self.status();
        standard_headers(&mut res);
        res.headers_mut()
            .insert(header::ALLOW, header_value(&allow.allow_header()));

        let (entity, body, length, content_type) = match self {
            DavReply::Status(_) => (None, Body::empty(), 0, None),
            DavReply::Entity(_, entity) => (Some(entity), Body::empty(), 0, None),
            DavReply::MultiStatus(data) => {
                let len = data.len() as u64;
                (None, Body::from(data), len, Some(XML_CONTENT_TYPE.to_string()))
            }
            DavReply::Lock {
                entity, token, body, ..
            } => {
                res.headers_mut().insert(
                    "lock-token",
                    header_value(&format!("<{}>", token)),
                );
                let len = body.len() as u64;
                (Some(entity), Body::from(body), len, Some(XML_CONTENT_TYPE.to_string()))
            }
            DavReply::Content {
                entity,
                content_type,
                stream,
            } => {
                let len = entity.size;
                (Some(entity), Body::stream(stream), len, Some(content_type))
            }
            DavReply::Listing { entity, html } => {
                let len = html.len() as u64;
                // the listing changes whenever a member changes.
                let entity = Entity { etag: None, ..entity };
                (Some(entity), Body::from(html), len, Some(HTML_CONTENT_TYPE.to_string()))
            }
            DavReply::Unauthorized { realm } => {
                res.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    header_value(&format!("Basic realm=\"{}\"", realm)),
                );
                (None, Body::empty(), 0, None)
            }
        };

        let h = res.headers_mut();
        if let Some(entity) = entity {
            if let Some(etag) = entity.etag.as_ref() {
                if let Ok(etag) = format!("\"{}\"", etag).parse::<headers::ETag>() {
                    h.typed_insert(etag);
                }
            }
            h.typed_insert(headers::LastModified::from(entity.last_modified));
        }
        if let Some(ct) = content_type {
            h.insert(header::CONTENT_TYPE, header_value(&ct));
        }
        h.typed_insert(headers::ContentLength(length));

        if !head {
            *res.body_mut() = body;
        }
        res
    }
}

/// `DAV` and `MS-Author-Via`.
pub(crate) fn standard_headers(res: &mut Response<Body>) {
    let h = res.headers_mut();
    h.insert("dav", HeaderValue::from_static("1,2"));
    h.insert("ms-author-via", HeaderValue::from_static("DAV"));
}

// values we build are always valid, but fall back to empty if not.
fn header_value(s: &str) -> HeaderValue {
    HeaderValue::from_str(s).unwrap_or_else(|_| HeaderValue::from_static(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::davpath::DavPath;
    use crate::store::EntityType;
    use std::time::{Duration, UNIX_EPOCH};

    fn entity() -> Entity {
        Entity {
            path: DavPath::new("/f.txt").unwrap(),
            kind: EntityType::Item,
            size: 5,
            last_modified: UNIX_EPOCH + Duration::from_secs(784111777),
            etag: Some("5-abc".to_string()),
            lock: None,
        }
    }

    #[test]
    fn test_standard_headers() {
        let res = DavReply::Status(StatusCode::NOT_FOUND).into_response(DavMethod::WEBDAV_RO, false);
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()["dav"], "1,2");
        assert_eq!(res.headers()["ms-author-via"], "DAV");
        assert_eq!(res.headers()["allow"], "HEAD, GET, OPTIONS, PROPFIND");
        assert_eq!(res.headers()["content-length"], "0");
        assert!(res.headers().get("etag").is_none());
    }

    #[test]
    fn test_entity_headers() {
        let res = DavReply::Entity(StatusCode::CREATED, entity())
            .into_response(DavMethod::WEBDAV_RO, false);
        assert_eq!(res.headers()["etag"], "\"5-abc\"");
        assert_eq!(res.headers()["last-modified"], "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[tokio::test]
    async fn test_head_keeps_length() {
        let reply = DavReply::MultiStatus(Bytes::from_static(b"<x/>"));
        let res = reply.into_response(DavMethod::WEBDAV_RO, true);
        assert_eq!(res.status(), StatusCode::MULTI_STATUS);
        assert_eq!(res.headers()["content-length"], "4");
        assert_eq!(res.headers()["content-type"], XML_CONTENT_TYPE);
        assert!(res.into_body().into_bytes().await.unwrap().is_empty());
    }

    #[test]
    fn test_unauthorized() {
        let reply = DavReply::Unauthorized {
            realm: "dav".to_string(),
        };
        let res = reply.into_response(DavMethod::WEBDAV_RO, false);
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers()["www-authenticate"], "Basic realm=\"dav\"");
    }
}
