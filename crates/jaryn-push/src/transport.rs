//! Stream transport: opening the authenticated push connection.
//!
//! The worker is generic over [`Transport`] so the reconnect loop can run
//! against scripted connections in tests. [`HttpTransport`] is the real one;
//! [`ReaderStream`] adapts any async reader (a raw socket, a recorded stream).

use std::future::Future;

use bytes::{Bytes, BytesMut};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::{Error, Result};

/// A readable body that yields chunks until the peer closes it.
pub trait ChunkSource: Send {
    /// Reads the next chunk; `Ok(None)` means the stream ended.
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>>> + Send;
}

/// Opens push stream connections.
pub trait Transport: Send + Sync + 'static {
    /// Body type of an open connection.
    type Stream: ChunkSource + 'static;

    /// Opens the stream at `url`, sending `token` as a bearer credential.
    ///
    /// Implementations must map HTTP 401 to [`Error::Unauthorized`] and any
    /// other non-success status to [`Error::Status`].
    fn open(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// HTTP transport built on `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with a default HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that shares an existing HTTP client.
    ///
    /// The client must not carry a total request timeout: the stream stays
    /// open indefinitely.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    type Stream = HttpStream;

    async fn open(&self, url: &str, token: Option<&str>) -> Result<HttpStream> {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        // Header, never query string: keeps the token out of access logs.
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        debug!("Push stream opened: {}", url);
        Ok(HttpStream { response })
    }
}

/// Body of an open HTTP push connection.
#[derive(Debug)]
pub struct HttpStream {
    response: reqwest::Response,
}

impl ChunkSource for HttpStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.response.chunk().await?)
    }
}

/// Read size for [`ReaderStream`].
const READ_CHUNK: usize = 8192;

/// Body read from an async byte reader.
#[derive(Debug)]
pub struct ReaderStream<R> {
    reader: R,
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin + Send> ReaderStream<R> {
    /// Wraps `reader`.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(READ_CHUNK),
        }
    }
}

impl<R: AsyncRead + Unpin + Send> ChunkSource for ReaderStream<R> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.buffer.reserve(READ_CHUNK);
        if self.reader.read_buf(&mut self.buffer).await? == 0 {
            return Ok(None);
        }
        Ok(Some(self.buffer.split().freeze()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::FrameDecoder;

    #[tokio::test]
    async fn test_reader_stream_until_eof() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"data: {\"type\":\"Sent\"}\n")
            .read(b"\ndata: two\r\n\r\n")
            .build();
        let mut stream = ReaderStream::new(mock);
        let mut decoder = FrameDecoder::new();

        let mut payloads = Vec::new();
        while let Some(chunk) = stream.next_chunk().await.unwrap() {
            payloads.extend(decoder.decode(&chunk).unwrap());
        }
        assert_eq!(payloads, vec![r#"{"type":"Sent"}"#, "two"]);
    }

    #[tokio::test]
    async fn test_reader_stream_error() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"data: one\n\n")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();
        let mut stream = ReaderStream::new(mock);

        let first = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(&first[..], b"data: one\n\n");
        assert!(matches!(stream.next_chunk().await, Err(Error::Io(_))));
    }
}
