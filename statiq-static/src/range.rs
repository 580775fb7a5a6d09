//! Byte range parsing

use std::ops::RangeInclusive;

/// Outcome of checking a `Range` header against a file size
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteRange {
    /// A single satisfiable span, inclusive on both ends
    Satisfiable(RangeInclusive<u64>),
    /// Syntactically valid but outside the file; answered with 416
    Unsatisfiable,
    /// Not something we understand; the header is ignored
    Malformed,
}

impl ByteRange {
    /// Parse a `Range` header value (bytes=start-end, bytes=start-, bytes=-suffix).
    ///
    /// Only a single range is supported, a list is treated as malformed.
    pub fn parse(header: &str, file_size: u64) -> Self {
        let Some(spec) = header.trim().strip_prefix("bytes=") else {
            return ByteRange::Malformed;
        };
        if spec.contains(',') {
            return ByteRange::Malformed;
        }
        let Some((start, end)) = spec.trim().split_once('-') else {
            return ByteRange::Malformed;
        };
        let (start, end) = (start.trim(), end.trim());

        match (start.is_empty(), end.is_empty()) {
            // bytes=-500: the last 500 bytes
            (true, false) => {
                let Ok(suffix) = end.parse::<u64>() else {
                    return ByteRange::Malformed;
                };
                if suffix == 0 || file_size == 0 {
                    return ByteRange::Unsatisfiable;
                }
                let start = file_size.saturating_sub(suffix);
                ByteRange::Satisfiable(start..=file_size - 1)
            }
            // bytes=500-
            (false, true) => {
                let Ok(start) = start.parse::<u64>() else {
                    return ByteRange::Malformed;
                };
                if start >= file_size {
                    return ByteRange::Unsatisfiable;
                }
                ByteRange::Satisfiable(start..=file_size - 1)
            }
            // bytes=0-499
            (false, false) => {
                let (Ok(start), Ok(end)) = (start.parse::<u64>(), end.parse::<u64>()) else {
                    return ByteRange::Malformed;
                };
                if end < start {
                    return ByteRange::Malformed;
                }
                if start >= file_size {
                    return ByteRange::Unsatisfiable;
                }
                ByteRange::Satisfiable(start..=end.min(file_size - 1))
            }
            (true, true) => ByteRange::Malformed,
        }
    }
}

/// `Content-Range` value for a served span
pub fn content_range(range: &RangeInclusive<u64>, file_size: u64) -> String {
    format!("bytes {}-{}/{}", range.start(), range.end(), file_size)
}

/// `Content-Range` value for a 416 response
pub fn unsatisfied_range(file_size: u64) -> String {
    format!("bytes */{}", file_size)
}
