//! Utilities for creating response bodies.

use std::io;

use bytes::Bytes;
use futures::StreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use statiq_static::AssetBody;
use tokio_util::io::ReaderStream;

/// Body type of every response the server produces
pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

/// Single chunk body.
pub fn full<T: Into<Bytes>>(chunk: T) -> ResponseBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Body without content.
pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Stream an asset body from disk, chunk by chunk.
pub fn stream(body: AssetBody) -> ResponseBody {
    match body.into_reader() {
        Some(reader) => {
            let frames = ReaderStream::new(reader).map(|chunk| chunk.map(Frame::data));
            StreamBody::new(frames).boxed_unsync()
        }
        None => empty(),
    }
}
