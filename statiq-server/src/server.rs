//! HTTP listener

use std::convert::Infallible;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use statiq_core::{Error, Result, ServerConfig};
use tokio::net::TcpListener;

use crate::pipeline::Pipeline;

/// Bind the configured address and serve until the process exits.
///
/// Failing to bind is the only error; everything after that is logged.
pub async fn run(config: &ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| Error::Server(format!("Failed to bind {}: {}", config.listen_addr, e)))?;

    tracing::info!("Listening on http://{}", listener.local_addr()?);

    serve(listener, Arc::new(Pipeline::from_config(config))).await
}

/// Accept connections on `listener`, one task per connection
pub async fn serve(listener: TcpListener, pipeline: Arc<Pipeline>) -> Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Accept error: {}", e);
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let pipeline = pipeline.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |request: Request<Incoming>| {
                let pipeline = pipeline.clone();
                // GET-only: the body is never read
                let request = request.map(|_| ());
                async move { Ok::<_, Infallible>(pipeline.handle(&request).await) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(%peer, "Error serving connection: {:?}", err);
            }
        });
    }
}
