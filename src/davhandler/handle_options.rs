use http::StatusCode;

use super::reply::DavReply;
use super::DavRequest;
use crate::DavResult;

impl crate::DavHandler {
    // The Allow header is added to every response anyway, computed from
    // the state of the target after the request. A missing resource is
    // not an error here: it still reports what could be created.
    pub(crate) async fn handle_options(&self, dreq: &DavRequest) -> DavResult<DavReply> {
        trace!("options for {}", dreq.path);
        Ok(DavReply::Status(StatusCode::NO_CONTENT))
    }
}
