use http_body_util::BodyExt;
use hyper::{Request, Response, body::Incoming, header};
use std::{convert::Infallible, sync::Arc};
use tracing::warn;

use crate::frontend::context::FrontendContext;
use crate::shared::response::{Response as CommandResponse, StatusCode};

use super::dispatcher::{render, respond};

pub async fn handle_request(
    req: Request<Incoming>,
    ctx: Arc<FrontendContext>,
) -> Result<Response<String>, Infallible> {
    let (parts, body) = req.into_parts();
    let authorization = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(target: "lens_db::frontend", error = %e, "Failed to read request body");
            return Ok(render(&CommandResponse::error(
                StatusCode::BadRequest,
                "Unreadable request body",
            )));
        }
    };

    Ok(respond(ctx, &parts.method, parts.uri.path(), authorization.as_deref(), &body).await)
}
