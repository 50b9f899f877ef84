use headers::HeaderMapExt;
use http::{Request, StatusCode};

use crate::store::Entity;
use crate::util::DavMethod;

// the ETag of an entity as a typed header. Collections have none.
fn entity_etag(entity: &Entity) -> Option<headers::ETag> {
    let etag = entity.etag.as_ref()?;
    format!("\"{}\"", etag).parse::<headers::ETag>().ok()
}

/// Evaluate `If-Match` and `If-None-Match` against the current state of
/// the target. `None` means the request may proceed.
pub(crate) fn if_match_get_tag(
    req: &Request<()>,
    method: DavMethod,
    entity: Option<&Entity>,
) -> Option<StatusCode> {
    let etag = entity.and_then(entity_etag);

    if let Some(im) = req.headers().typed_get::<headers::IfMatch>() {
        trace!("if-match: {:?}", im);
        let pass = match (entity, etag.as_ref()) {
            (None, _) => false,
            (Some(_), _) if im.is_any() => true,
            (Some(_), Some(tag)) => im.precondition_passes(tag),
            (Some(_), None) => false,
        };
        if !pass {
            return Some(StatusCode::PRECONDITION_FAILED);
        }
    }

    if let Some(inm) = req.headers().typed_get::<headers::IfNoneMatch>() {
        trace!("if-none-match: {:?}", inm);
        let pass = match (entity, etag.as_ref()) {
            (None, _) => true,
            (Some(_), _) if inm == headers::IfNoneMatch::any() => false,
            (Some(_), Some(tag)) => inm.precondition_passes(tag),
            (Some(_), None) => true,
        };
        if !pass {
            return if method == DavMethod::GET || method == DavMethod::HEAD {
                Some(StatusCode::NOT_MODIFIED)
            } else {
                Some(StatusCode::PRECONDITION_FAILED)
            };
        }
    }
    None
}
