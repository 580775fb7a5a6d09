//! Compression support

use std::pin::Pin;

use async_compression::Level;
use async_compression::tokio::bufread::{BrotliEncoder, DeflateEncoder, GzipEncoder, ZstdEncoder};
use statiq_core::CompressionLevel;
use tokio::io::{AsyncRead, BufReader};

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Brotli,
    Zstd,
    Gzip,
    Deflate,
}

impl Algorithm {
    /// Server preference, used to break ties between equal q-values
    const PREFERENCE: [Algorithm; 4] = [
        Algorithm::Brotli,
        Algorithm::Zstd,
        Algorithm::Gzip,
        Algorithm::Deflate,
    ];

    /// Get the content-encoding header value
    pub fn encoding(&self) -> &'static str {
        match self {
            Algorithm::Brotli => "br",
            Algorithm::Zstd => "zstd",
            Algorithm::Gzip => "gzip",
            Algorithm::Deflate => "deflate",
        }
    }

    /// Pick an algorithm from an `Accept-Encoding` header value.
    ///
    /// The highest q-value wins, ties go to the server preference. `*` stands
    /// for every coding not listed explicitly, and `q=0` rules a coding out.
    pub fn negotiate(accept_encoding: &str) -> Option<Self> {
        let offers: Vec<(String, f32)> = accept_encoding
            .split(',')
            .filter_map(parse_coding)
            .collect();

        let wildcard = offers
            .iter()
            .find(|(name, _)| name == "*")
            .map(|(_, q)| *q);

        let mut best: Option<(Algorithm, f32)> = None;
        for algorithm in Self::PREFERENCE {
            let q = offers
                .iter()
                .find(|(name, _)| name == algorithm.encoding())
                .map(|(_, q)| *q)
                .or(wildcard);

            let Some(q) = q else { continue };
            if q <= 0.0 {
                continue;
            }
            if best.is_none_or(|(_, best_q)| q > best_q) {
                best = Some((algorithm, q));
            }
        }

        best.map(|(algorithm, _)| algorithm)
    }

    /// Wrap a byte stream in this algorithm's encoder
    pub fn encode<R>(self, reader: R, level: CompressionLevel) -> Pin<Box<dyn AsyncRead + Send>>
    where
        R: AsyncRead + Send + 'static,
    {
        let reader = BufReader::new(reader);
        let quality = quality(level);
        match self {
            Algorithm::Brotli => Box::pin(BrotliEncoder::with_quality(reader, quality)),
            Algorithm::Zstd => Box::pin(ZstdEncoder::with_quality(reader, quality)),
            Algorithm::Gzip => Box::pin(GzipEncoder::with_quality(reader, quality)),
            Algorithm::Deflate => Box::pin(DeflateEncoder::with_quality(reader, quality)),
        }
    }
}

fn quality(level: CompressionLevel) -> Level {
    match level {
        CompressionLevel::Best => Level::Best,
        CompressionLevel::Default | CompressionLevel::Disabled => Level::Default,
    }
}

/// Parse one `coding;q=0.5` element
fn parse_coding(element: &str) -> Option<(String, f32)> {
    let mut parts = element.split(';');
    let name = parts.next()?.trim().to_ascii_lowercase();
    if name.is_empty() {
        return None;
    }

    let mut q = 1.0;
    for param in parts {
        if let Some((key, value)) = param.split_once('=') {
            if key.trim().eq_ignore_ascii_case("q") {
                q = value.trim().parse().unwrap_or(0.0);
            }
        }
    }
    Some((name, q))
}
