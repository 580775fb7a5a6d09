//! Statiq Static File Module
//!
//! Everything between a request path and the bytes sent back:
//! - Path resolution with root containment
//! - MIME type detection
//! - Conditional requests and cache headers
//! - Byte ranges
//! - Compression (brotli, zstd, gzip, deflate)
//! - SPA index fallback

mod compress;
mod fallback;
mod mime;
mod negotiate;
mod range;
mod resolver;

pub use compress::Algorithm;
pub use fallback::FallbackRouter;
pub use mime::MimeTable;
pub use negotiate::{AssetBody, NegotiatedResponse, Negotiator};
pub use range::ByteRange;
pub use resolver::{Asset, PathResolver, ResolvedAsset};
