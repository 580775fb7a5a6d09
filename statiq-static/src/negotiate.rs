//! Response negotiation
//!
//! Turns a resolved [`Asset`] plus the request headers into a status, a
//! header set and a body stream. Handles conditional requests, byte ranges,
//! compression and download dispositions.

use std::fmt;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use statiq_core::{CompressionLevel, ServerConfig};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

use crate::compress::Algorithm;
use crate::range::{self, ByteRange};
use crate::resolver::Asset;

/// Response body: a byte stream read lazily from disk, or nothing.
///
/// Dropping it closes the file and releases any encoder state.
pub struct AssetBody {
    reader: Option<Pin<Box<dyn AsyncRead + Send>>>,
}

impl AssetBody {
    /// Body without content
    pub fn empty() -> Self {
        Self { reader: None }
    }

    /// Body streamed from `reader`
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            reader: Some(Box::pin(reader)),
        }
    }

    fn boxed(reader: Pin<Box<dyn AsyncRead + Send>>) -> Self {
        Self {
            reader: Some(reader),
        }
    }

    /// True when there is no body at all
    pub fn is_empty(&self) -> bool {
        self.reader.is_none()
    }

    /// Underlying reader, if any
    pub fn into_reader(self) -> Option<Pin<Box<dyn AsyncRead + Send>>> {
        self.reader
    }

    /// Read the whole body into memory
    pub async fn read_all(self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut reader) = self.reader {
            reader.read_to_end(&mut buf).await?;
        }
        Ok(buf)
    }
}

impl fmt::Debug for AssetBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetBody")
            .field("empty", &self.is_empty())
            .finish()
    }
}

/// Status, headers and body computed for one request
#[derive(Debug)]
pub struct NegotiatedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: AssetBody,
}

impl NegotiatedResponse {
    /// Header value as a string, for inspection and logging
    pub fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Shapes responses for found assets
#[derive(Debug, Clone)]
pub struct Negotiator {
    cache_duration: Duration,
    compression: CompressionLevel,
    download: bool,
}

impl Negotiator {
    /// Create a negotiator
    pub fn new(cache_duration: Duration, compression: CompressionLevel, download: bool) -> Self {
        Self {
            cache_duration,
            compression,
            download,
        }
    }

    /// Create a negotiator from the server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.cache_duration, config.compression, config.download)
    }

    /// Build the response for `asset`.
    ///
    /// Errors only come from reading the file (a failed seek), everything the
    /// client can send is mapped to a status code.
    pub async fn negotiate(
        &self,
        asset: Asset,
        request: &HeaderMap,
    ) -> io::Result<NegotiatedResponse> {
        let mut headers = HeaderMap::new();
        self.cache_headers(asset.modified, &mut headers);
        if self.compression.is_enabled() {
            headers.insert(header::VARY, HeaderValue::from_static("accept-encoding"));
        }

        if is_not_modified(request, asset.modified) {
            tracing::debug!(path = %asset.path.display(), "Not modified");
            return Ok(NegotiatedResponse {
                status: StatusCode::NOT_MODIFIED,
                headers,
                body: AssetBody::empty(),
            });
        }

        let range_header = request.get(header::RANGE);
        let requested = range_header
            .and_then(|value| value.to_str().ok())
            .map(|value| ByteRange::parse(value, asset.size))
            .or(range_header.map(|_| ByteRange::Malformed));

        if matches!(requested, Some(ByteRange::Unsatisfiable)) {
            tracing::debug!(path = %asset.path.display(), size = asset.size, "Range not satisfiable");
            insert(&mut headers, header::CONTENT_RANGE, range::unsatisfied_range(asset.size));
            return Ok(NegotiatedResponse {
                status: StatusCode::RANGE_NOT_SATISFIABLE,
                headers,
                body: AssetBody::empty(),
            });
        }

        insert(&mut headers, header::CONTENT_TYPE, asset.content_type.clone());
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        if self.download {
            if let Some(value) = attachment(&asset.file_name()) {
                headers.insert(header::CONTENT_DISPOSITION, value);
            }
        }

        if let Some(ByteRange::Satisfiable(span)) = &requested {
            let length = span.end() - span.start() + 1;
            let mut file = asset.file;
            file.seek(SeekFrom::Start(*span.start())).await?;

            insert(&mut headers, header::CONTENT_RANGE, range::content_range(span, asset.size));
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
            return Ok(NegotiatedResponse {
                status: StatusCode::PARTIAL_CONTENT,
                headers,
                body: AssetBody::from_reader(file.take(length)),
            });
        }

        if requested.is_some() {
            tracing::debug!(path = %asset.path.display(), "Ignoring malformed range header");
        }

        // Ranges are defined over the identity encoding
        let algorithm = if self.compression.is_enabled() && range_header.is_none() {
            request
                .get(header::ACCEPT_ENCODING)
                .and_then(|value| value.to_str().ok())
                .and_then(Algorithm::negotiate)
        } else {
            None
        };

        let body = match algorithm {
            Some(algorithm) => {
                headers.insert(
                    header::CONTENT_ENCODING,
                    HeaderValue::from_static(algorithm.encoding()),
                );
                AssetBody::boxed(algorithm.encode(asset.file, self.compression))
            }
            None => {
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(asset.size));
                AssetBody::from_reader(asset.file)
            }
        };

        Ok(NegotiatedResponse {
            status: StatusCode::OK,
            headers,
            body,
        })
    }

    fn cache_headers(&self, modified: SystemTime, headers: &mut HeaderMap) {
        insert(headers, header::LAST_MODIFIED, http_date(modified));
        insert(
            headers,
            header::CACHE_CONTROL,
            format!("public, max-age={}", self.cache_duration.as_secs()),
        );
        insert(
            headers,
            header::EXPIRES,
            http_date(
                SystemTime::now()
                    .checked_add(self.cache_duration)
                    .unwrap_or_else(max_http_date),
            ),
        );
    }
}

/// `If-Modified-Since` check at one-second precision
fn is_not_modified(request: &HeaderMap, modified: SystemTime) -> bool {
    let Some(since) = request
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| httpdate::parse_http_date(value).ok())
    else {
        return false;
    };

    unix_secs(clamp_http_date(modified)) <= unix_secs(since)
}

/// Latest instant an HTTP date can carry (9999-12-31 23:59:59 UTC)
fn max_http_date() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(253_402_300_799)
}

/// Clamp into the range `httpdate` can format; pre-1970 mtimes exist on disk
fn clamp_http_date(time: SystemTime) -> SystemTime {
    time.clamp(UNIX_EPOCH, max_http_date())
}

fn http_date(time: SystemTime) -> String {
    httpdate::fmt_http_date(clamp_http_date(time))
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// `attachment; filename="..."` with quotes escaped and control characters replaced
fn attachment(file_name: &str) -> Option<HeaderValue> {
    let escaped: String = file_name
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .flat_map(|c| match c {
            '"' | '\\' => vec!['\\', c],
            c => vec![c],
        })
        .collect();

    HeaderValue::from_bytes(format!("attachment; filename=\"{}\"", escaped).as_bytes()).ok()
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: String) {
    match HeaderValue::try_from(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => tracing::warn!(header = %name, error = %e, "Dropping invalid header value"),
    }
}
