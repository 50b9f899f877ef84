//
// This module contains the main entry point of the library,
// DavHandler.
//
use std::error::Error as StdError;
use std::io;
use std::sync::Arc;

use bytes::Buf;
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;

use crate::body::Body;
use crate::conditional::if_match_get_tag;
use crate::davheaders;
use crate::davpath::DavPath;
use crate::locks::TokenMap;
use crate::store::{DavStore, Entity};
use crate::util::{allowed_methods, dav_method, DavMethod, ResourceState};

use crate::errors::DavError;
use crate::DavResult;

pub(crate) mod handle_copymove;
pub(crate) mod handle_delete;
pub(crate) mod handle_gethead;
pub(crate) mod handle_lock;
pub(crate) mod handle_mkcol;
pub(crate) mod handle_options;
pub(crate) mod handle_props;
pub(crate) mod handle_put;
pub(crate) mod reply;

use reply::{standard_headers, DavReply};

/// Default limit for request bodies that are read into memory.
pub const DEFAULT_MAX_BODY_SIZE: usize = 65536;

/// Outcome of the authorization gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Go ahead.
    Allow,
    /// 403 Forbidden.
    Deny,
    /// 401 Unauthorized, with a Basic challenge for this realm.
    RequireAuth(String),
}

/// Decides whether a request may proceed. Called once per request, before
/// anything else happens.
pub trait Authorize: Send + Sync {
    fn authorize(&self, req: &Request<()>, method: DavMethod, path: &DavPath) -> Access;
}

impl<F> Authorize for F
where
    F: Fn(&Request<()>, DavMethod, &DavPath) -> Access + Send + Sync,
{
    fn authorize(&self, req: &Request<()>, method: DavMethod, path: &DavPath) -> Access {
        (self)(req, method, path)
    }
}

/// Configuration of the handler.
#[derive(Clone)]
pub struct DavBuilder {
    /// Prefix to be stripped off when handling request.
    prefix: String,
    /// Store backend.
    store: Arc<dyn DavStore>,
    /// Refuse every method that changes the store.
    read_only: bool,
    /// Allow PROPFIND with `Depth: infinity`.
    infinite_depth: bool,
    /// Does GET on a collection return an index.
    autoindex: bool,
    /// Stylesheet URL for the index.
    listing_css: Option<String>,
    /// Principal is webdav speak for "user", used to give locks an owner.
    principal: Option<String>,
    /// Authorization gate.
    authorizer: Option<Arc<dyn Authorize>>,
    /// Limit for request bodies that are read into memory.
    max_body_size: usize,
}

impl DavBuilder {
    /// Create a new configuration builder.
    pub fn new(store: Arc<dyn DavStore>) -> DavBuilder {
        Self {
            prefix: String::new(),
            store,
            read_only: false,
            infinite_depth: true,
            autoindex: false,
            listing_css: None,
            principal: None,
            authorizer: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Use the configuration that was built to generate a DavHandler.
    pub fn build(self) -> DavHandler {
        self.into()
    }

    /// Prefix to be stripped off before translating the rest of
    /// the request path to a resource path.
    pub fn strip_prefix(self, prefix: impl Into<String>) -> Self {
        let mut this = self;
        this.prefix = prefix.into();
        this
    }

    /// Only allow GET, HEAD, OPTIONS and PROPFIND.
    pub fn read_only(self, read_only: bool) -> Self {
        let mut this = self;
        this.read_only = read_only;
        this
    }

    /// Allow PROPFIND with `Depth: infinity` (default true).
    pub fn infinite_depth(self, allow: bool) -> Self {
        let mut this = self;
        this.infinite_depth = allow;
        this
    }

    /// Does a GET on a collection produce an index.
    pub fn autoindex(self, autoindex: bool) -> Self {
        let mut this = self;
        this.autoindex = autoindex;
        this
    }

    /// Stylesheet to link from the index page.
    pub fn listing_css(self, url: impl Into<String>) -> Self {
        let mut this = self;
        this.listing_css = Some(url.into());
        this
    }

    /// Set the name of the "webdav principal". This will be the owner of
    /// locks that do not name one.
    pub fn principal(self, principal: impl Into<String>) -> Self {
        let mut this = self;
        this.principal = Some(principal.into());
        this
    }

    /// Set the authorization gate.
    pub fn authorizer(self, auth: impl Authorize + 'static) -> Self {
        let mut this = self;
        this.authorizer = Some(Arc::new(auth));
        this
    }

    /// Limit for request bodies that are read into memory (PUT streams).
    pub fn max_body_size(self, size: usize) -> Self {
        let mut this = self;
        this.max_body_size = size;
        this
    }
}

/// The immutable configuration a handler works with.
#[derive(Clone)]
pub(crate) struct DavConfig {
    pub(crate) prefix: String,
    pub(crate) store: Arc<dyn DavStore>,
    pub(crate) read_only: bool,
    pub(crate) infinite_depth: bool,
    pub(crate) autoindex: bool,
    pub(crate) listing_css: Option<String>,
    pub(crate) principal: Option<String>,
    pub(crate) authorizer: Option<Arc<dyn Authorize>>,
    pub(crate) max_body_size: usize,
}

/// The webdav handler struct.
///
/// The `new` and `build` etc methods are used to instantiate a handler.
///
/// The `handle` and `handle_with` methods are the methods that do the actual work.
#[derive(Clone)]
pub struct DavHandler {
    pub(crate) config: Arc<DavConfig>,
}

impl From<DavBuilder> for DavHandler {
    fn from(cfg: DavBuilder) -> Self {
        let config = DavConfig {
            prefix: cfg.prefix,
            store: cfg.store,
            read_only: cfg.read_only,
            infinite_depth: cfg.infinite_depth,
            autoindex: cfg.autoindex,
            listing_css: cfg.listing_css,
            principal: cfg.principal,
            authorizer: cfg.authorizer,
            max_body_size: cfg.max_body_size,
        };
        DavHandler {
            config: Arc::new(config),
        }
    }
}

/// Per-request state the handlers need besides the request itself.
pub(crate) struct DavRequest {
    pub(crate) method: DavMethod,
    pub(crate) path: DavPath,
    pub(crate) tokens: TokenMap,
}

impl DavHandler {
    /// Return a configuration builder.
    pub fn builder(store: Arc<dyn DavStore>) -> DavBuilder {
        DavBuilder::new(store)
    }

    /// Handle a webdav request.
    pub async fn handle<ReqBody, ReqData, ReqError>(&self, req: Request<ReqBody>) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError> + Send,
    {
        self.handle_inner(req).await
    }

    /// Handle a webdav request, overriding parts of the config.
    ///
    /// `prefix` is appended to the configured prefix, `principal`
    /// replaces the configured one for this request.
    pub async fn handle_with<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
        prefix: Option<String>,
        principal: Option<String>,
    ) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError> + Send,
    {
        let mut config = (*self.config).clone();
        if let Some(prefix) = prefix {
            config.prefix = format!(
                "{}/{}",
                config.prefix.strip_suffix('/').unwrap_or(&config.prefix),
                prefix.strip_prefix('/').unwrap_or(&prefix)
            );
        }
        if let Some(principal) = principal {
            config.principal = Some(principal);
        }
        let this = DavHandler {
            config: Arc::new(config),
        };
        this.handle_inner(req).await
    }
}

impl DavHandler {
    pub(crate) fn store(&self) -> &dyn DavStore {
        &*self.config.store
    }

    pub(crate) fn prefix(&self) -> &str {
        &self.config.prefix
    }

    // helper.
    pub(crate) async fn entity_opt(&self, path: &DavPath) -> DavResult<Option<Entity>> {
        if self.store().exists(path).await? {
            Ok(Some(self.store().entity(path).await?))
        } else {
            Ok(None)
        }
    }

    // helper.
    pub(crate) async fn has_parent(&self, path: &DavPath) -> DavResult<bool> {
        let parent = path.parent();
        Ok(self
            .entity_opt(&parent)
            .await?
            .map(|e| e.is_collection())
            .unwrap_or(false))
    }

    // The Allow set for the state `path` is in right now.
    pub(crate) async fn allowed(&self, path: &DavPath) -> DavMethod {
        let state = match self.entity_opt(path).await {
            Ok(Some(e)) if e.is_collection() => ResourceState::Collection,
            Ok(Some(_)) => ResourceState::Item,
            _ => ResourceState::Unmapped,
        };
        allowed_methods(state, self.config.read_only)
    }

    // drain request body and return it.
    pub(crate) async fn read_request<ReqBody, ReqData, ReqError>(
        &self,
        body: ReqBody,
        max_size: usize,
    ) -> DavResult<Vec<u8>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let mut data = Vec::new();
        pin_utils::pin_mut!(body);
        while let Some(res) = body.data().await {
            let mut buf = res.map_err(|_| {
                DavError::IoError(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "UnexpectedEof",
                ))
            })?;
            while buf.has_remaining() {
                if data.len() + buf.remaining() > max_size {
                    return Err(DavError::StatusClose(StatusCode::PAYLOAD_TOO_LARGE));
                }
                let b = buf.chunk();
                let l = b.len();
                data.extend_from_slice(b);
                buf.advance(l);
            }
        }
        Ok(data)
    }

    // internal dispatcher.
    async fn handle_inner<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> Response<Body>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError> + Send,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        // Turn any DavError results into a HTTP error response.
        match self.handle2(req).await {
            Ok(resp) => {
                debug!("== END REQUEST result {}", resp.status());
                resp
            }
            Err(err) => {
                debug!("== END REQUEST result {:?}", err);
                let mut resp = Response::new(Body::empty());
                *resp.status_mut() = err.statuscode();
                standard_headers(&mut resp);
                resp.headers_mut().typed_insert(headers::ContentLength(0));
                if err.must_close() {
                    resp.headers_mut().insert(
                        http::header::CONNECTION,
                        http::HeaderValue::from_static("close"),
                    );
                }
                resp
            }
        }
    }

    // internal dispatcher part 2.
    async fn handle2<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError> + Send,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let (req, body) = {
            let (parts, body) = req.into_parts();
            (Request::from_parts(parts, ()), body)
        };

        // debug when running the webdav litmus tests.
        if log_enabled!(log::Level::Debug) {
            if let Some(t) = req.headers().typed_get::<davheaders::XLitmus>() {
                debug!("X-Litmus: {:?}", t);
            }
        }

        // translate HTTP method to Webdav method.
        let method = match dav_method(req.method()) {
            Ok(m) => m,
            Err(e) => {
                debug!("refusing method {} request {}", req.method(), req.uri());
                return Err(e);
            }
        };

        // make sure the request path is valid.
        let path = DavPath::from_uri_and_prefix(req.uri(), self.prefix())?;

        debug!("== START REQUEST {:?} {}", method, path);

        let head = method == DavMethod::HEAD;
        let reply = match self.dispatch(&req, body, method, path.clone()).await {
            Ok(reply) => reply,
            // a malformed body is answered like any other 400.
            Err(e) if e.is_bad_request() => {
                debug!("{:?} {}: {:?}", method, path, e);
                e.statuscode().into()
            }
            Err(e) => return Err(e),
        };
        let allow = self.allowed(&path).await;
        Ok(reply.into_response(allow, head))
    }

    // authorization, preconditions, and the method handler.
    async fn dispatch<ReqBody, ReqData, ReqError>(
        &self,
        req: &Request<()>,
        body: ReqBody,
        method: DavMethod,
        path: DavPath,
    ) -> DavResult<DavReply>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError> + Send,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        if let Some(ref auth) = self.config.authorizer {
            match auth.authorize(req, method, &path) {
                Access::Allow => {}
                Access::Deny => {
                    debug!("authorizer denied {:?} {}", method, path);
                    return Ok(StatusCode::FORBIDDEN.into());
                }
                Access::RequireAuth(realm) => {
                    debug!("authorizer wants credentials for {:?} {}", method, path);
                    return Ok(DavReply::Unauthorized { realm });
                }
            }
        }

        if self.config.read_only && method.is_write() {
            debug!("read-only: refusing {:?} {}", method, path);
            return Ok(StatusCode::METHOD_NOT_ALLOWED.into());
        }

        // PUT is the only handler that reads the body itself. All the
        // other handlers either expect no body, or a pre-read Vec<u8>.
        let (body_strm, body_data) = if method == DavMethod::PUT {
            (Some(body), Vec::new())
        } else {
            (None, self.read_request(body, self.config.max_body_size).await?)
        };

        // Not all methods accept a body.
        if !DavMethod::WEBDAV_BODY.contains(method) && !body_data.is_empty() {
            debug!("{:?} with a body", method);
            return Ok(StatusCode::UNSUPPORTED_MEDIA_TYPE.into());
        }

        // lock tokens submitted through the If: header.
        let tokens = match req.headers().typed_try_get::<davheaders::If>() {
            Ok(Some(hdr)) => hdr.token_map(self.prefix()),
            Ok(None) => TokenMap::new(),
            Err(_) => {
                debug!("malformed If: header");
                return Ok(StatusCode::BAD_REQUEST.into());
            }
        };

        // If-Match / If-None-Match.
        if method != DavMethod::OPTIONS {
            let entity = self.entity_opt(&path).await?;
            if let Some(status) = if_match_get_tag(req, method, entity.as_ref()) {
                debug!("precondition failed: {}", status);
                return Ok(status.into());
            }
        }

        let dreq = DavRequest {
            method,
            path,
            tokens,
        };

        match method {
            m if m == DavMethod::OPTIONS => self.handle_options(&dreq).await,
            m if m == DavMethod::PROPFIND => self.handle_propfind(req, &dreq, &body_data).await,
            m if m == DavMethod::PROPPATCH => self.handle_proppatch(&dreq, &body_data).await,
            m if m == DavMethod::MKCOL => self.handle_mkcol(&dreq, &body_data).await,
            m if m == DavMethod::DELETE => self.handle_delete(&dreq).await,
            m if m == DavMethod::LOCK => self.handle_lock(req, &dreq, &body_data).await,
            m if m == DavMethod::UNLOCK => self.handle_unlock(req, &dreq).await,
            m if m == DavMethod::HEAD || m == DavMethod::GET => self.handle_get(&dreq).await,
            m if m == DavMethod::COPY || m == DavMethod::MOVE => {
                self.handle_copymove(req, &dreq).await
            }
            m if m == DavMethod::PUT => match body_strm {
                Some(body) => self.handle_put(&dreq, body).await,
                None => Err(DavError::Status(StatusCode::INTERNAL_SERVER_ERROR)),
            },
            _ => Err(DavError::UnknownDavMethod),
        }
    }
}
