#![allow(dead_code)]

use dav_engine::body::Body;
use dav_engine::{DavBuilder, DavHandler, MemStore};
use http::{HeaderMap, Method, Request, StatusCode};

pub const LOCKINFO: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:lockinfo xmlns:D="DAV:">
  <D:lockscope><D:exclusive/></D:lockscope>
  <D:locktype><D:write/></D:locktype>
  <D:owner>tester</D:owner>
</D:lockinfo>"#;

pub const ALLPROP: &str =
    r#"<?xml version="1.0" encoding="utf-8"?><D:propfind xmlns:D="DAV:"><D:allprop/></D:propfind>"#;

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Reply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The lock token without the angle brackets.
    pub fn lock_token(&self) -> String {
        let t = self.header("lock-token").expect("no Lock-Token header");
        t.trim_start_matches('<').trim_end_matches('>').to_string()
    }

    pub fn responses(&self) -> usize {
        self.body.matches("<D:response>").count()
    }
}

pub fn builder() -> DavBuilder {
    let _ = env_logger::builder().is_test(true).try_init();
    DavHandler::builder(MemStore::new())
}

pub fn server() -> DavHandler {
    builder().build()
}

pub async fn call(
    dh: &DavHandler,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> Reply {
    let mut req = Request::builder()
        .method(Method::from_bytes(method.as_bytes()).unwrap())
        .uri(uri);
    for (name, value) in headers {
        req = req.header(*name, *value);
    }
    let req = req.body(Body::from(body.to_string())).unwrap();

    let (parts, body) = dh.handle(req).await.into_parts();
    let body = body.into_bytes().await.unwrap();
    Reply {
        status: parts.status,
        headers: parts.headers,
        body: String::from_utf8(body.to_vec()).unwrap(),
    }
}

pub async fn put(dh: &DavHandler, uri: &str, content: &str) {
    let r = call(dh, "PUT", uri, &[], content).await;
    assert_eq!(r.status, StatusCode::CREATED, "PUT {}", uri);
}

pub async fn mkcol(dh: &DavHandler, uri: &str) {
    let r = call(dh, "MKCOL", uri, &[], "").await;
    assert_eq!(r.status, StatusCode::CREATED, "MKCOL {}", uri);
}

pub async fn get(dh: &DavHandler, uri: &str) -> Reply {
    call(dh, "GET", uri, &[], "").await
}

pub async fn propfind(dh: &DavHandler, uri: &str, depth: &str, body: &str) -> Reply {
    call(dh, "PROPFIND", uri, &[("depth", depth)], body).await
}

pub async fn exists(dh: &DavHandler, uri: &str) -> bool {
    propfind(dh, uri, "0", ALLPROP).await.status == StatusCode::MULTI_STATUS
}

pub async fn is_collection(dh: &DavHandler, uri: &str) -> bool {
    propfind(dh, uri, "0", ALLPROP).await.body.contains("<D:collection")
}

pub async fn lock(dh: &DavHandler, uri: &str, depth: &str) -> Reply {
    call(dh, "LOCK", uri, &[("depth", depth)], LOCKINFO).await
}

/// An untagged `If:` header for `token`.
pub fn if_token(token: &str) -> String {
    format!("(<{}>)", token)
}
