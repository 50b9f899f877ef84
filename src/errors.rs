use std::error::Error;
use std::io::{self, ErrorKind};

use http::StatusCode;

use crate::store::StoreError;

pub(crate) type DavResult<T> = Result<T, DavError>;

/// Exceptional failures. Expected protocol outcomes (404, 423, ...) are
/// not errors, handlers return those as a `DavReply`.
#[derive(Debug)]
pub(crate) enum DavError {
    XmlReadError,  // error reading/parsing xml
    XmlParseError, // error interpreting xml
    InvalidPath,   // error parsing path
    UnknownDavMethod,
    Status(StatusCode),
    StatusClose(StatusCode),
    StoreError(StoreError),
    IoError(io::Error),
    XmlWriterError(xml::writer::Error),
}

impl Error for DavError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DavError::StoreError(e) => Some(e),
            DavError::IoError(e) => Some(e),
            DavError::XmlWriterError(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for DavError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DavError::XmlWriterError(_) => write!(f, "XML generate error"),
            DavError::IoError(_) => write!(f, "I/O error"),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl From<StoreError> for DavError {
    fn from(e: StoreError) -> Self {
        DavError::StoreError(e)
    }
}

impl From<DavError> for io::Error {
    fn from(e: DavError) -> Self {
        match e {
            DavError::IoError(e) => e,
            DavError::StoreError(e) => e.into(),
            _ => io::Error::new(io::ErrorKind::Other, e),
        }
    }
}

impl From<StoreError> for io::Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Io(e) => e,
            e => io::Error::new(io::ErrorKind::Other, e),
        }
    }
}

impl From<io::Error> for DavError {
    fn from(e: io::Error) -> Self {
        DavError::IoError(e)
    }
}

impl From<StatusCode> for DavError {
    fn from(e: StatusCode) -> Self {
        DavError::Status(e)
    }
}

impl From<xml::writer::Error> for DavError {
    fn from(e: xml::writer::Error) -> Self {
        DavError::XmlWriterError(e)
    }
}

fn ioerror_to_status(ioerror: &io::Error) -> StatusCode {
    match ioerror.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::TimedOut => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn storeerror_to_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        StoreError::GeneralFailure => StatusCode::INTERNAL_SERVER_ERROR,
        StoreError::Exists => StatusCode::METHOD_NOT_ALLOWED,
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::Forbidden => StatusCode::FORBIDDEN,
        StoreError::Io(e) => ioerror_to_status(e),
    }
}

impl DavError {
    pub fn statuscode(&self) -> StatusCode {
        match self {
            DavError::XmlReadError => StatusCode::BAD_REQUEST,
            DavError::XmlParseError => StatusCode::BAD_REQUEST,
            DavError::InvalidPath => StatusCode::BAD_REQUEST,
            DavError::UnknownDavMethod => StatusCode::NOT_IMPLEMENTED,
            DavError::IoError(e) => ioerror_to_status(e),
            DavError::StoreError(e) => storeerror_to_status(e),
            DavError::Status(e) => *e,
            DavError::StatusClose(e) => *e,
            DavError::XmlWriterError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The request body could not be read as the XML the method expects.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, DavError::XmlReadError | DavError::XmlParseError)
    }

    pub fn must_close(&self) -> bool {
        !matches!(
            self,
            &DavError::Status(_)
                | &DavError::StoreError(StoreError::NotFound)
                | &DavError::StoreError(StoreError::Forbidden)
                | &DavError::StoreError(StoreError::Exists)
        )
    }
}
