use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::frontend::context::FrontendContext;

use super::handler::handle_request;

/// Serves HTTP/1.1 until ctrl-c.
pub async fn run_http_server(ctx: Arc<FrontendContext>) -> anyhow::Result<()> {
    let addr: SocketAddr = ctx.http_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!(target: "lens_db::frontend", "HTTP server running at http://{addr}/command");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let accept_result = tokio::select! {
            result = listener.accept() => result,
            _ = &mut shutdown => {
                info!(target: "lens_db::frontend", "HTTP server shutting down, stopping accept loop");
                break;
            }
        };

        let (stream, peer_addr) = match accept_result {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(target: "lens_db::frontend", "Failed to accept HTTP connection: {}", e);
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let ctx = Arc::clone(&ctx);

        tokio::spawn(async move {
            let builder = hyper::server::conn::http1::Builder::new();
            if let Err(err) = builder
                .serve_connection(
                    io,
                    service_fn(move |req| handle_request(req, Arc::clone(&ctx))),
                )
                .await
            {
                debug!(target: "lens_db::frontend", peer = %peer_addr, "Connection ended with error: {:?}", err);
            }
        });
    }

    info!(target: "lens_db::frontend", "HTTP server shutdown complete");
    Ok(())
}
