mod common;

use common::*;
use http::StatusCode;

const SET_FOO_BAR: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propertyupdate xmlns:D="DAV:" xmlns:f="foo" xmlns:b="bar">
  <D:set>
    <D:prop>
      <f:color>red &amp; blue</f:color>
      <b:size>big</b:size>
    </D:prop>
  </D:set>
</D:propertyupdate>"#;

#[tokio::test]
async fn allprop_namespaces() {
    let dh = server();
    put(&dh, "/file.txt", "hi").await;
    let r = call(&dh, "PROPPATCH", "/file.txt", &[], SET_FOO_BAR).await;
    assert_eq!(r.status, StatusCode::CREATED);

    let r = propfind(&dh, "/file.txt", "0", ALLPROP).await;
    assert_eq!(r.status, StatusCode::MULTI_STATUS);
    assert_eq!(r.header("content-type"), Some("application/xml; charset=utf-8"));
    let body = &r.body;
    assert!(body.contains("xmlns:D=\"DAV:\""), "{}", body);
    assert!(body.contains("xmlns:ns1=\"bar\""), "{}", body);
    assert!(body.contains("xmlns:ns2=\"foo\""), "{}", body);
    assert_eq!(body.matches("<D:propstat>").count(), 1);
    assert!(body.contains("HTTP/1.1 200 OK"));
    assert!(!body.contains("Not Found"));

    // live and dead.
    assert!(body.contains("<D:getcontentlength>2</D:getcontentlength>"));
    assert!(body.contains("<D:displayname>file.txt</D:displayname>"));
    assert!(body.contains("<D:getetag>"));
    assert!(body.contains("<D:supportedlock>"));
    assert!(body.contains("<ns1:size>big</ns1:size>"));
    assert!(body.contains("<ns2:color>red &amp; blue</ns2:color>"));
}

#[tokio::test]
async fn missing_property() {
    let dh = server();
    put(&dh, "/file.txt", "hi").await;

    let req = r#"<D:propfind xmlns:D="DAV:" xmlns:f="foo">
      <D:prop><D:getcontentlength/><f:nope/></D:prop>
    </D:propfind>"#;
    let r = propfind(&dh, "/file.txt", "0", req).await;
    assert_eq!(r.status, StatusCode::MULTI_STATUS);
    assert_eq!(r.body.matches("<D:propstat>").count(), 2);
    assert!(r.body.contains("<D:getcontentlength>2</D:getcontentlength>"));
    assert!(r.body.contains("HTTP/1.1 404 Not Found"));
    assert!(r.body.contains("<ns1:nope"));
    assert!(!r.body.contains("<D:displayname>"));
}

#[tokio::test]
async fn proppatch_roundtrip() {
    let dh = server();
    put(&dh, "/file.txt", "hi").await;
    call(&dh, "PROPPATCH", "/file.txt", &[], SET_FOO_BAR).await;

    let req = r#"<D:propfind xmlns:D="DAV:"><D:prop><color xmlns="foo"/></D:prop></D:propfind>"#;
    let r = propfind(&dh, "/file.txt", "0", req).await;
    assert!(r.body.contains(">red &amp; blue<"), "{}", r.body);
    assert!(!r.body.contains("big"));

    // remove one, replace the other.
    let patch = r#"<D:propertyupdate xmlns:D="DAV:" xmlns:f="foo" xmlns:b="bar">
      <D:remove><D:prop><b:size/></D:prop></D:remove>
      <D:set><D:prop><f:color>green</f:color></D:prop></D:set>
    </D:propertyupdate>"#;
    let r = call(&dh, "PROPPATCH", "/file.txt", &[], patch).await;
    assert_eq!(r.status, StatusCode::CREATED);

    let r = propfind(&dh, "/file.txt", "0", ALLPROP).await;
    assert!(r.body.contains(">green<"));
    assert!(!r.body.contains("big"));
    assert!(!r.body.contains(">red"));
}

#[tokio::test]
async fn proppatch_live_ignored() {
    let dh = server();
    put(&dh, "/file.txt", "hi").await;
    let patch = r#"<D:propertyupdate xmlns:D="DAV:">
      <D:set><D:prop><D:getcontentlength>99</D:getcontentlength></D:prop></D:set>
    </D:propertyupdate>"#;
    let r = call(&dh, "PROPPATCH", "/file.txt", &[], patch).await;
    assert_eq!(r.status, StatusCode::CREATED);

    let r = propfind(&dh, "/file.txt", "0", ALLPROP).await;
    assert!(r.body.contains("<D:getcontentlength>2</D:getcontentlength>"));
    assert!(!r.body.contains(">99<"));
}

#[tokio::test]
async fn proppatch_errors() {
    let dh = server();
    let r = call(&dh, "PROPPATCH", "/nope", &[], SET_FOO_BAR).await;
    assert_eq!(r.status, StatusCode::NOT_FOUND);

    put(&dh, "/file.txt", "hi").await;
    let r = call(&dh, "PROPPATCH", "/file.txt", &[], "<D:propfind xmlns:D=\"DAV:\"/>").await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    let r = call(&dh, "PROPPATCH", "/file.txt", &[], "not xml").await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn propname() {
    let dh = server();
    put(&dh, "/file.txt", "hi").await;
    call(&dh, "PROPPATCH", "/file.txt", &[], SET_FOO_BAR).await;

    let req = r#"<D:propfind xmlns:D="DAV:"><D:propname/></D:propfind>"#;
    let r = propfind(&dh, "/file.txt", "0", req).await;
    assert_eq!(r.status, StatusCode::MULTI_STATUS);
    assert!(r.body.contains("<ns2:color"));
    assert!(r.body.contains("<D:getetag"));
    assert!(!r.body.contains(">red"));
    assert!(!r.body.contains("file.txt</D:displayname>"));
}

#[tokio::test]
async fn depth() {
    let dh = server();
    mkcol(&dh, "/dir").await;
    mkcol(&dh, "/dir/sub").await;
    put(&dh, "/dir/sub/f", "x").await;
    put(&dh, "/dir/g", "y").await;

    assert_eq!(propfind(&dh, "/dir", "0", ALLPROP).await.responses(), 1);
    assert_eq!(propfind(&dh, "/dir", "1", ALLPROP).await.responses(), 3);
    assert_eq!(propfind(&dh, "/dir", "infinity", ALLPROP).await.responses(), 4);

    let r = propfind(&dh, "/dir", "1", ALLPROP).await;
    assert!(r.body.contains("<D:href>/dir/</D:href>"));
    assert!(r.body.contains("<D:href>/dir/sub/</D:href>"));
    assert!(r.body.contains("<D:href>/dir/g</D:href>"));
}

#[tokio::test]
async fn depth_infinity_disallowed() {
    let dh = builder().infinite_depth(false).build();
    let r = propfind(&dh, "/", "infinity", ALLPROP).await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);
    let r = call(&dh, "PROPFIND", "/", &[], ALLPROP).await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);
    assert_eq!(propfind(&dh, "/", "1", ALLPROP).await.status, StatusCode::MULTI_STATUS);
}

#[tokio::test]
async fn propfind_errors() {
    let dh = server();
    let r = propfind(&dh, "/nope", "0", ALLPROP).await;
    assert_eq!(r.status, StatusCode::NOT_FOUND);

    let r = propfind(&dh, "/", "0", "").await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    let r = propfind(&dh, "/", "0", "<D:propfind xmlns:D=\"DAV:\"><D:prop/></D:propfind>").await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lockdiscovery_property() {
    let dh = server();
    put(&dh, "/file.txt", "hi").await;
    let token = lock(&dh, "/file.txt", "0").await.lock_token();

    let req = r#"<D:propfind xmlns:D="DAV:"><D:prop><D:lockdiscovery/></D:prop></D:propfind>"#;
    let r = propfind(&dh, "/file.txt", "0", req).await;
    assert!(r.body.contains("<D:activelock>"), "{}", r.body);
    assert!(r.body.contains(&token));
    assert!(r.body.contains("tester"));
}
