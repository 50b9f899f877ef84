//! The response body.
//!
//! Handlers answer either with a buffer built in memory (XML documents,
//! HTML listings) or with the content stream of an item straight from the
//! store. [`Body`] carries both and implements `http_body::Body`, so it can
//! be handed to hyper as is.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{Stream, TryStreamExt};
use http::header::HeaderMap;
use http_body::Body as HttpBody;

use crate::store::ContentStream;

/// Body of a response produced by the `DavHandler`.
pub struct Body(Payload);

enum Payload {
    // taken on the first poll.
    Buffer(Option<Bytes>),
    Content(ContentStream<'static>),
}

impl Body {
    /// Nothing at all.
    pub fn empty() -> Body {
        Body(Payload::Buffer(None))
    }

    /// Item content, passed through chunk by chunk.
    pub fn stream(content: ContentStream<'static>) -> Body {
        Body(Payload::Content(content))
    }

    /// Collect the whole body. Mostly useful in tests.
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        let chunks: Vec<Bytes> = self.try_collect().await?;
        Ok(Bytes::from(chunks.concat()))
    }
}

impl Stream for Body {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        match &mut self.0 {
            Payload::Buffer(buf) => Poll::Ready(buf.take().filter(|b| !b.is_empty()).map(Ok)),
            Payload::Content(content) => content.as_mut().poll_next(cx),
        }
    }
}

impl HttpBody for Body {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_data(
        self: Pin<&mut Self>,
        cx: &mut Context,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        self.poll_next(cx)
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        _cx: &mut Context,
    ) -> Poll<Result<Option<HeaderMap>, Self::Error>> {
        Poll::Ready(Ok(None))
    }

    fn is_end_stream(&self) -> bool {
        match self.0 {
            Payload::Buffer(ref buf) => buf.as_ref().map_or(true, |b| b.is_empty()),
            Payload::Content(_) => false,
        }
    }
}

impl From<Bytes> for Body {
    fn from(buf: Bytes) -> Body {
        Body(Payload::Buffer(Some(buf)))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Body {
        Body::from(Bytes::from(s))
    }
}
