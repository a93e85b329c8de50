use hyper::{Method, Response, header};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::command::{Command, dispatch};
use crate::engine::errors::EngineError;
use crate::frontend::context::FrontendContext;
use crate::shared::response::{JsonRenderer, Response as CommandResponse, StatusCode};

/// Maps engine failures onto response statuses.
pub fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Validation(_) | EngineError::InvalidTenant(_) | EngineError::Json(_) => {
            StatusCode::BadRequest
        }
        EngineError::UnknownTenant(_) => StatusCode::NotFound,
        EngineError::Constraint(_) => StatusCode::Conflict,
        EngineError::Sql(_) | EngineError::Io(_) => StatusCode::InternalError,
    }
}

fn is_authorized(ctx: &FrontendContext, authorization: Option<&str>) -> bool {
    match &ctx.auth_token {
        None => true,
        Some(token) => authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|given| given == token),
    }
}

pub fn render(resp: &CommandResponse) -> Response<String> {
    Response::builder()
        .status(hyper::StatusCode::from(resp.status))
        .header(header::CONTENT_TYPE, "application/json")
        .body(JsonRenderer.render(resp))
        .unwrap_or_else(|_| Response::new(String::new()))
}

/// Handles one request once the body has been read.
pub async fn respond(
    ctx: Arc<FrontendContext>,
    method: &Method,
    path: &str,
    authorization: Option<&str>,
    body: &[u8],
) -> Response<String> {
    match (method, path) {
        (&Method::GET, "/health") => render(&CommandResponse::ok(serde_json::json!("ok"))),
        (&Method::POST, "/command") => {
            if !is_authorized(&ctx, authorization) {
                warn!(target: "lens_db::frontend", "Rejected unauthorized command");
                return render(&CommandResponse::error(StatusCode::Unauthorized, "Unauthorized"));
            }
            let cmd = match Command::from_json(body) {
                Ok(cmd) => cmd,
                Err(e) => {
                    return render(&CommandResponse::error(
                        StatusCode::BadRequest,
                        format!("Invalid command: {e}"),
                    ));
                }
            };
            info!(target: "lens_db::frontend", command = cmd.name(), "Received command");
            render(&run_command(ctx, cmd).await)
        }
        (_, "/command") | (_, "/health") => {
            render(&CommandResponse::error(StatusCode::MethodNotAllowed, "Method not allowed"))
        }
        _ => render(&CommandResponse::error(StatusCode::NotFound, "Not Found")),
    }
}

/// Engine calls block on SQLite, so they leave the async workers.
async fn run_command(ctx: Arc<FrontendContext>, cmd: Command) -> CommandResponse {
    let engine = Arc::clone(&ctx.engine);
    match tokio::task::spawn_blocking(move || dispatch(&cmd, &engine)).await {
        Ok(Ok(value)) => CommandResponse::ok(value),
        Ok(Err(err)) => CommandResponse::error(status_for(&err), err),
        Err(join_err) => {
            error!(target: "lens_db::frontend", error = %join_err, "Command task failed");
            CommandResponse::error(StatusCode::InternalError, "Command task failed")
        }
    }
}
