mod common;

use common::*;
use http::StatusCode;

#[tokio::test]
async fn lock_null_and_refresh() {
    let dh = server();
    let r = lock(&dh, "/new", "0").await;
    assert_eq!(r.status, StatusCode::CREATED);
    assert_eq!(r.header("content-type"), Some("application/xml; charset=utf-8"));
    let token = r.lock_token();
    assert!(token.starts_with("urn:uuid:"));
    assert!(r.body.contains("<D:lockdiscovery>"));
    assert!(r.body.contains(&token));
    assert!(exists(&dh, "/new").await);
    assert_eq!(get(&dh, "/new").await.body, "");

    // refresh: same lock.
    let r = call(&dh, "LOCK", "/new", &[], "").await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.lock_token(), token);

    // a second lock is refused.
    let r = lock(&dh, "/new", "0").await;
    assert_eq!(r.status, StatusCode::LOCKED);
}

#[tokio::test]
async fn lock_existing() {
    let dh = server();
    put(&dh, "/f", "x").await;
    let r = call(
        &dh,
        "LOCK",
        "/f",
        &[("timeout", "Second-3600, Infinite")],
        LOCKINFO,
    )
    .await;
    assert_eq!(r.status, StatusCode::OK);
    assert!(r.body.contains("Second-3600"), "{}", r.body);
    assert!(r.body.contains("<D:exclusive"));
    assert!(r.body.contains("tester"));
    assert_eq!(get(&dh, "/f").await.body, "x");
}

#[tokio::test]
async fn lock_errors() {
    let dh = server();
    put(&dh, "/f", "x").await;

    let r = call(&dh, "LOCK", "/f", &[], "").await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);

    let noscope = r#"<D:lockinfo xmlns:D="DAV:"><D:locktype><D:write/></D:locktype></D:lockinfo>"#;
    let r = call(&dh, "LOCK", "/f", &[], noscope).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);

    let notype = r#"<D:lockinfo xmlns:D="DAV:"><D:lockscope><D:exclusive/></D:lockscope></D:lockinfo>"#;
    let r = call(&dh, "LOCK", "/f", &[], notype).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);

    let r = lock(&dh, "/missing/f", "0").await;
    assert_eq!(r.status, StatusCode::CONFLICT);
    assert!(!exists(&dh, "/missing/f").await);
}

#[tokio::test]
async fn owner_defaults_to_principal() {
    let dh = builder().principal("alice").build();
    put(&dh, "/f", "x").await;
    let body = r#"<D:lockinfo xmlns:D="DAV:">
      <D:lockscope><D:exclusive/></D:lockscope>
      <D:locktype><D:write/></D:locktype>
    </D:lockinfo>"#;
    let r = call(&dh, "LOCK", "/f", &[], body).await;
    assert_eq!(r.status, StatusCode::OK);
    assert!(r.body.contains("<D:owner>alice</D:owner>"), "{}", r.body);
}

#[tokio::test]
async fn write_needs_token() {
    let dh = server();
    mkcol(&dh, "/dir").await;
    put(&dh, "/dir/g", "old").await;
    let token = lock(&dh, "/dir", "infinity").await.lock_token();

    let r = call(&dh, "PUT", "/dir/f", &[], "x").await;
    assert_eq!(r.status, StatusCode::LOCKED);
    let r = call(&dh, "PUT", "/dir/g", &[], "new").await;
    assert_eq!(r.status, StatusCode::LOCKED);
    let r = call(&dh, "MKCOL", "/dir/sub", &[], "").await;
    assert_eq!(r.status, StatusCode::LOCKED);
    let r = call(&dh, "DELETE", "/dir/g", &[], "").await;
    assert_eq!(r.status, StatusCode::LOCKED);
    assert_eq!(get(&dh, "/dir/g").await.body, "old");

    let cond = if_token(&token);
    let r = call(&dh, "PUT", "/dir/f", &[("if", cond.as_str())], "x").await;
    assert_eq!(r.status, StatusCode::CREATED);
    let r = call(&dh, "PUT", "/dir/g", &[("if", cond.as_str())], "new").await;
    assert_eq!(r.status, StatusCode::CREATED);
    assert_eq!(get(&dh, "/dir/g").await.body, "new");

    // tagged with the lock root.
    let tagged = format!("</dir> (<{}>)", token);
    let r = call(&dh, "MKCOL", "/dir/sub", &[("if", tagged.as_str())], "").await;
    assert_eq!(r.status, StatusCode::CREATED);

    // tagged with some other resource.
    let other = format!("</elsewhere> (<{}>)", token);
    let r = call(&dh, "DELETE", "/dir/g", &[("if", other.as_str())], "").await;
    assert_eq!(r.status, StatusCode::LOCKED);
}

#[tokio::test]
async fn new_members_join_collection_lock() {
    let dh = server();
    put(&dh, "/f", "x").await;
    mkcol(&dh, "/dir").await;
    let token = lock(&dh, "/dir", "infinity").await.lock_token();
    let cond = if_token(&token);

    let r = call(&dh, "PUT", "/dir/new", &[("if", cond.as_str())], "a").await;
    assert_eq!(r.status, StatusCode::CREATED);
    let r = call(&dh, "MKCOL", "/dir/sub", &[("if", cond.as_str())], "").await;
    assert_eq!(r.status, StatusCode::CREATED);
    let hdrs = [("destination", "/dir/copy"), ("if", cond.as_str())];
    let r = call(&dh, "COPY", "/f", &hdrs, "").await;
    assert_eq!(r.status, StatusCode::CREATED);

    // nobody else can lock them.
    for member in ["/dir/new", "/dir/sub", "/dir/copy"] {
        let r = lock(&dh, member, "0").await;
        assert_eq!(r.status, StatusCode::LOCKED, "{}", member);
    }
    // not even as a lock-null resource.
    let r = lock(&dh, "/dir/null", "0").await;
    assert_eq!(r.status, StatusCode::LOCKED);
    assert!(!exists(&dh, "/dir/null").await);

    // they report the collection lock.
    let req = r#"<D:propfind xmlns:D="DAV:"><D:prop><D:lockdiscovery/></D:prop></D:propfind>"#;
    let r = propfind(&dh, "/dir/new", "0", req).await;
    assert!(r.body.contains(&token), "{}", r.body);

    // and the holder keeps access.
    let r = call(&dh, "PUT", "/dir/new", &[("if", cond.as_str())], "b").await;
    assert_eq!(r.status, StatusCode::CREATED);
    let r = call(&dh, "PUT", "/dir/copy", &[], "c").await;
    assert_eq!(r.status, StatusCode::LOCKED);

    // unlocking the collection releases them too.
    let header = format!("<{}>", token);
    let r = call(&dh, "UNLOCK", "/dir", &[("lock-token", header.as_str())], "").await;
    assert_eq!(r.status, StatusCode::NO_CONTENT);
    let r = call(&dh, "PUT", "/dir/copy", &[], "c").await;
    assert_eq!(r.status, StatusCode::CREATED);
    let r = lock(&dh, "/dir/new", "0").await;
    assert_eq!(r.status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_if_header() {
    let dh = server();
    put(&dh, "/f", "x").await;
    let r = call(&dh, "PUT", "/f", &[("if", "(<urn:uuid:1234>")], "y").await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert_eq!(get(&dh, "/f").await.body, "x");
}

#[tokio::test]
async fn delete_with_locked_member() {
    let dh = server();
    mkcol(&dh, "/dir").await;
    mkcol(&dh, "/dir/sub").await;
    put(&dh, "/dir/sub/f", "x").await;
    put(&dh, "/dir/g", "y").await;
    let token = lock(&dh, "/dir/sub/f", "0").await.lock_token();

    let r = call(&dh, "DELETE", "/dir", &[], "").await;
    assert_eq!(r.status, StatusCode::LOCKED);
    // nothing was removed.
    assert!(exists(&dh, "/dir/g").await);
    assert!(exists(&dh, "/dir/sub/f").await);

    let cond = if_token(&token);
    let r = call(&dh, "DELETE", "/dir", &[("if", cond.as_str())], "").await;
    assert_eq!(r.status, StatusCode::NO_CONTENT);
    assert!(!exists(&dh, "/dir").await);
}

#[tokio::test]
async fn lock_conflicts_with_member_lock() {
    let dh = server();
    mkcol(&dh, "/dir").await;
    put(&dh, "/dir/f", "x").await;
    let r = lock(&dh, "/dir/f", "0").await;
    assert_eq!(r.status, StatusCode::OK);

    let r = lock(&dh, "/dir", "infinity").await;
    assert_eq!(r.status, StatusCode::LOCKED);

    // a depth 0 lock does not cover the member.
    let r = lock(&dh, "/dir", "0").await;
    assert_eq!(r.status, StatusCode::OK);
}

#[tokio::test]
async fn unlock_bad_tokens() {
    let dh = server();
    put(&dh, "/f", "x").await;
    let token = lock(&dh, "/f", "0").await.lock_token();
    let uuid = token.trim_start_matches("urn:uuid:").to_string();

    let wrong_prefix = format!("<opaquelocktoken:{}>", uuid);
    let open = format!("<{}", token);
    let close = format!("{}>", token);
    for bad in ["<test", "test>", open.as_str(), close.as_str(), wrong_prefix.as_str()] {
        let r = call(&dh, "UNLOCK", "/f", &[("lock-token", bad)], "").await;
        assert_eq!(r.status, StatusCode::LOCKED, "{}", bad);
    }
    let r = call(&dh, "UNLOCK", "/f", &[], "").await;
    assert_eq!(r.status, StatusCode::LOCKED);

    // a different, well-formed token.
    let r = call(
        &dh,
        "UNLOCK",
        "/f",
        &[("lock-token", "<urn:uuid:00000000-0000-0000-0000-000000000000>")],
        "",
    )
    .await;
    assert_eq!(r.status, StatusCode::LOCKED);

    let r = call(&dh, "PUT", "/f", &[], "y").await;
    assert_eq!(r.status, StatusCode::LOCKED);
}

#[tokio::test]
async fn unlock() {
    let dh = server();
    mkcol(&dh, "/dir").await;
    put(&dh, "/dir/f", "x").await;
    let token = lock(&dh, "/dir", "infinity").await.lock_token();
    let header = format!("<{}>", token);

    // from a member, releases the whole lock.
    let r = call(&dh, "UNLOCK", "/dir/f", &[("lock-token", header.as_str())], "").await;
    assert_eq!(r.status, StatusCode::NO_CONTENT);

    let r = call(&dh, "PUT", "/dir/f", &[], "y").await;
    assert_eq!(r.status, StatusCode::CREATED);
    let r = call(&dh, "PUT", "/dir/new", &[], "z").await;
    assert_eq!(r.status, StatusCode::CREATED);

    let r = call(&dh, "UNLOCK", "/dir/f", &[("lock-token", header.as_str())], "").await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    let r = call(&dh, "UNLOCK", "/nope", &[("lock-token", header.as_str())], "").await;
    assert_eq!(r.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn proppatch_locked() {
    let dh = server();
    put(&dh, "/f", "x").await;
    let token = lock(&dh, "/f", "0").await.lock_token();
    let patch = r#"<D:propertyupdate xmlns:D="DAV:" xmlns:f="foo">
      <D:set><D:prop><f:color>red</f:color></D:prop></D:set>
    </D:propertyupdate>"#;

    let r = call(&dh, "PROPPATCH", "/f", &[], patch).await;
    assert_eq!(r.status, StatusCode::LOCKED);

    let tagged = format!("<http://localhost/f> (<{}>)", token);
    let r = call(&dh, "PROPPATCH", "/f", &[("if", tagged.as_str())], patch).await;
    assert_eq!(r.status, StatusCode::CREATED);
}
