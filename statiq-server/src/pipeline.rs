//! Request pipeline
//!
//! Method check, access gate, request logger, path resolution, SPA fallback
//! and response negotiation, run in that order for every request. Each stage
//! is a plain value built from the [`ServerConfig`] once at startup.

use http::header::{self, HeaderMap, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use statiq_core::ServerConfig;
use statiq_static::{FallbackRouter, NegotiatedResponse, Negotiator, PathResolver, ResolvedAsset};

use crate::auth::AccessGate;
use crate::body::{self, ResponseBody};
use crate::logger::RequestLog;

/// The full request handling chain
#[derive(Debug, Clone)]
pub struct Pipeline {
    gate: AccessGate,
    resolver: PathResolver,
    router: FallbackRouter,
    negotiator: Negotiator,
    log_requests: bool,
}

impl Pipeline {
    /// Build every stage from the configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            gate: AccessGate::from_config(config),
            resolver: PathResolver::from_config(config),
            router: FallbackRouter::from_config(config),
            negotiator: Negotiator::from_config(config),
            log_requests: config.log_requests,
        }
    }

    /// Handle one request. The request body is never read.
    pub async fn handle<B>(&self, request: &Request<B>) -> Response<ResponseBody> {
        if request.method() != Method::GET {
            let mut response = status_response(StatusCode::METHOD_NOT_ALLOWED);
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET"));
            return response;
        }

        if !self.gate.authorize(request.headers().get(header::AUTHORIZATION)) {
            let mut response = status_response(StatusCode::UNAUTHORIZED);
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, AccessGate::challenge());
            return response;
        }

        let path = request.uri().path();
        let log = self
            .log_requests
            .then(|| RequestLog::start(request.method(), path));

        let response = self.serve(path, request.headers()).await;

        if let Some(log) = log {
            let bytes = response
                .headers()
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            log.finish(response.status(), bytes);
        }

        response
    }

    async fn serve(&self, path: &str, headers: &HeaderMap) -> Response<ResponseBody> {
        match self.router.route(&self.resolver, path).await {
            ResolvedAsset::Found(asset) => {
                let file = asset.path.clone();
                match self.negotiator.negotiate(asset, headers).await {
                    Ok(negotiated) => into_response(negotiated),
                    Err(e) => {
                        tracing::error!(path = %file.display(), error = %e, "Failed to read file");
                        status_response(StatusCode::INTERNAL_SERVER_ERROR)
                    }
                }
            }
            ResolvedAsset::Forbidden => status_response(StatusCode::FORBIDDEN),
            ResolvedAsset::NotFound | ResolvedAsset::IsDirectory => {
                status_response(StatusCode::NOT_FOUND)
            }
        }
    }
}

fn into_response(negotiated: NegotiatedResponse) -> Response<ResponseBody> {
    let mut response = Response::new(body::stream(negotiated.body));
    *response.status_mut() = negotiated.status;
    *response.headers_mut() = negotiated.headers;
    response
}

/// Plain-text response carrying the status' reason phrase
fn status_response(status: StatusCode) -> Response<ResponseBody> {
    let reason = status.canonical_reason().unwrap_or("Error");
    let mut response = Response::new(body::full(reason));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use statiq_core::Credentials;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn site() -> TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<div id=app></div>").unwrap();
        fs::write(dir.path().join("data.txt"), "0123456789abcdefghij").unwrap();
        fs::create_dir(dir.path().join("assets")).unwrap();
        dir
    }

    fn config(dir: &TempDir) -> ServerConfig {
        ServerConfig::serve_dir(dir.path())
    }

    fn get(path: &str) -> Request<()> {
        Request::get(path).body(()).unwrap()
    }

    async fn body_bytes(response: Response<ResponseBody>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_serves_file() {
        let dir = site();
        let pipeline = Pipeline::from_config(&config(&dir));

        let response = pipeline.handle(&get("/data.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "20");
        assert_eq!(body_bytes(response).await, "0123456789abcdefghij");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let dir = site();
        let pipeline = Pipeline::from_config(&config(&dir));

        assert_eq!(pipeline.handle(&get("/missing")).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(pipeline.handle(&get("/assets")).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            pipeline.handle(&get("/../../etc/passwd")).await.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            pipeline.handle(&get("/%2e%2e/%2e%2e/etc/passwd")).await.status(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_get_only() {
        let dir = site();
        let pipeline = Pipeline::from_config(&config(&dir));

        let request = Request::post("/data.txt").body(()).unwrap();
        let response = pipeline.handle(&request).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET");
    }

    #[tokio::test]
    async fn test_spa_fallback() {
        let dir = site();
        let mut config = config(&dir);

        let direct = Pipeline::from_config(&config);
        assert_eq!(direct.handle(&get("/app/settings")).await.status(), StatusCode::NOT_FOUND);

        config.spa = true;
        let spa = Pipeline::from_config(&config);
        let response = spa.handle(&get("/app/settings")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, "<div id=app></div>");

        assert_eq!(spa.handle(&get("/assets")).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(spa.handle(&get("/../secret")).await.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_spa_without_index() {
        let dir = site();
        let mut config = config(&dir);
        config.spa = true;
        config.index_file = "missing.html".into();

        let pipeline = Pipeline::from_config(&config);
        assert_eq!(pipeline.handle(&get("/app")).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_access_gate() {
        let dir = site();
        let mut config = config(&dir);
        config.credentials = Credentials::parse(["alice:secret"]);
        let pipeline = Pipeline::from_config(&config);

        let response = pipeline.handle(&get("/data.txt")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"Restricted Area\""
        );

        let authorized = |user_pass: &str| {
            Request::get("/data.txt")
                .header(header::AUTHORIZATION, format!("Basic {}", STANDARD.encode(user_pass)))
                .body(())
                .unwrap()
        };

        let response = pipeline.handle(&authorized("alice:secret")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = pipeline.handle(&authorized("alice:wrong")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_gate_hides_existence() {
        let dir = site();
        let mut config = config(&dir);
        config.credentials = Credentials::parse(["alice:secret"]);
        let pipeline = Pipeline::from_config(&config);

        let existing = pipeline.handle(&get("/data.txt")).await;
        let missing = pipeline.handle(&get("/missing")).await;
        let escaping = pipeline.handle(&get("/../../etc/passwd")).await;
        assert_eq!(existing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(escaping.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_bytes(existing).await, body_bytes(missing).await);
    }

    #[tokio::test]
    async fn test_range_and_not_modified() {
        let dir = site();
        let pipeline = Pipeline::from_config(&config(&dir));

        let request = Request::get("/data.txt")
            .header(header::RANGE, "bytes=0-9")
            .body(())
            .unwrap();
        let response = pipeline.handle(&request).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-9/20");
        let last_modified = response.headers()[header::LAST_MODIFIED].clone();
        assert_eq!(body_bytes(response).await, "0123456789");

        let request = Request::get("/data.txt")
            .header(header::IF_MODIFIED_SINCE, last_modified)
            .body(())
            .unwrap();
        let response = pipeline.handle(&request).await;
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_request_logging_does_not_change_response() {
        let dir = site();
        let mut config = config(&dir);
        config.log_requests = true;
        let pipeline = Pipeline::from_config(&config);

        let response = pipeline.handle(&get("/data.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, "0123456789abcdefghij");
    }
}
