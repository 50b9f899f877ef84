use futures_util::future::{BoxFuture, FutureExt};
use headers::HeaderMapExt;
use http::{Request, StatusCode};
use xmltree::Element;

use super::reply::DavReply;
use super::DavRequest;
use crate::davheaders::Depth;
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::locks::{check_up, LockCheck};
use crate::multistatus::{multistatus, PropResponse};
use crate::props::{self, live_properties, merge_properties, Property, PropertyIdentifier};
use crate::store::Entity;
use crate::xmltree_ext::ElementExt;
use crate::DavResult;

// The three kinds of PROPFIND.
#[derive(Debug, Clone, PartialEq)]
enum PropRequest {
    Names,
    All,
    Props(Vec<PropertyIdentifier>),
}

fn parse_propfind(body: &[u8]) -> DavResult<PropRequest> {
    let tree = Element::parse2(body)?;
    if !tree.is_dav("propfind") {
        return Err(DavError::XmlParseError);
    }
    if tree.dav_child("propname").is_some() {
        return Ok(PropRequest::Names);
    }
    if tree.dav_child("allprop").is_some() {
        return Ok(PropRequest::All);
    }
    let prop = tree.dav_child("prop").ok_or(DavError::XmlParseError)?;
    let ids: Vec<_> = prop
        .child_elems_iter()
        .map(PropertyIdentifier::from_element)
        .collect();
    if ids.is_empty() {
        return Err(DavError::XmlParseError);
    }
    Ok(PropRequest::Props(ids))
}

impl crate::DavHandler {
    async fn prop_response(&self, entity: &Entity, what: &PropRequest) -> DavResult<PropResponse> {
        let live = live_properties(entity, self.prefix());
        let dead = self.store().properties(&entity.path).await?;
        let all = merge_properties(live, dead);
        let href = entity.path.with_prefix(self.prefix(), entity.is_collection());

        let resp = match what {
            PropRequest::Names => {
                let mut ids: Vec<_> = all.into_iter().map(|p| p.id).collect();
                ids.sort();
                PropResponse::Names { href, ids }
            }
            PropRequest::All => PropResponse::Values {
                href,
                found: all,
                missing: Vec::new(),
            },
            PropRequest::Props(ids) => {
                let mut found = Vec::new();
                let mut missing = Vec::new();
                for id in ids {
                    match all.iter().find(|p| p.id == *id) {
                        Some(p) => found.push(p.clone()),
                        None => missing.push(id.clone()),
                    }
                }
                PropResponse::Values {
                    href,
                    found,
                    missing,
                }
            }
        };
        Ok(resp)
    }

    // pre-order walk, `depth` levels down.
    fn propfind_walk<'a>(
        &'a self,
        path: &'a DavPath,
        depth: Depth,
        what: &'a PropRequest,
    ) -> BoxFuture<'a, DavResult<Vec<PropResponse>>> {
        async move {
            let entity = self.store().entity(path).await?;
            let mut out = vec![self.prop_response(&entity, what).await?];
            if entity.is_collection() {
                if let Some(depth) = depth.decrement() {
                    for child in self.store().list(path).await? {
                        out.extend(self.propfind_walk(&child, depth, what).await?);
                    }
                }
            }
            Ok(out)
        }
        .boxed()
    }

    pub(crate) async fn handle_propfind(
        &self,
        req: &Request<()>,
        dreq: &DavRequest,
        body: &[u8],
    ) -> DavResult<DavReply> {
        let path = &dreq.path;

        if !self.store().exists(path).await? {
            return Ok(StatusCode::NOT_FOUND.into());
        }

        let depth = req
            .headers()
            .typed_get::<Depth>()
            .unwrap_or(Depth::Infinity)
            .clamp_to(&[Depth::Zero, Depth::One, Depth::Infinity]);
        if depth == Depth::Infinity && !self.config.infinite_depth {
            debug!("PROPFIND {}: depth infinity not allowed", path);
            return Ok(StatusCode::FORBIDDEN.into());
        }

        let what = parse_propfind(body)?;
        trace!("PROPFIND {} depth {} {:?}", path, depth, what);

        let responses = self.propfind_walk(path, depth, &what).await?;
        Ok(DavReply::MultiStatus(multistatus(&responses)?))
    }

    pub(crate) async fn handle_proppatch(
        &self,
        dreq: &DavRequest,
        body: &[u8],
    ) -> DavResult<DavReply> {
        let path = &dreq.path;

        if !self.store().exists(path).await? {
            return Ok(StatusCode::NOT_FOUND.into());
        }
        if let LockCheck::Locked(at) = check_up(self.store(), path, &dreq.tokens).await? {
            debug!("PROPPATCH {}: locked at {}", path, at);
            return Ok(StatusCode::LOCKED.into());
        }

        let tree = Element::parse2(body)?;
        if !tree.is_dav("propertyupdate") {
            return Err(DavError::XmlParseError);
        }

        let mut dead = self.store().properties(path).await?;
        for op in tree.child_elems_iter() {
            let set = if op.is_dav("set") {
                true
            } else if op.is_dav("remove") {
                false
            } else {
                continue;
            };
            for prop in op.child_elems_iter().filter(|e| e.is_dav("prop")) {
                for elem in prop.child_elems_iter() {
                    let id = PropertyIdentifier::from_element(elem);
                    if id.is_protected() {
                        debug!("PROPPATCH {}: ignoring {}", path, id);
                        continue;
                    }
                    if set {
                        props::upsert(&mut dead, Property::text(id, elem.text_content()));
                    } else {
                        props::remove(&mut dead, &id);
                    }
                }
            }
        }
        self.store().set_properties(path, dead).await?;

        Ok(StatusCode::CREATED.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_propfind() {
        let names = br#"<D:propfind xmlns:D="DAV:"><D:propname/></D:propfind>"#;
        assert_eq!(parse_propfind(names).unwrap(), PropRequest::Names);

        let all = br#"<propfind xmlns="DAV:"><allprop/></propfind>"#;
        assert_eq!(parse_propfind(all).unwrap(), PropRequest::All);

        let some = br#"<D:propfind xmlns:D="DAV:" xmlns:f="foo"><D:prop><D:getetag/><f:x/></D:prop></D:propfind>"#;
        assert_eq!(
            parse_propfind(some).unwrap(),
            PropRequest::Props(vec![
                PropertyIdentifier::dav("getetag"),
                PropertyIdentifier::new("foo", "x")
            ])
        );

        let empty = br#"<D:propfind xmlns:D="DAV:"><D:prop/></D:propfind>"#;
        assert!(parse_propfind(empty).is_err());
        assert!(parse_propfind(b"").is_err());
        assert!(parse_propfind(b"<D:lockinfo xmlns:D=\"DAV:\"/>").is_err());
    }
}
