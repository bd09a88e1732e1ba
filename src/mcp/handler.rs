//! MCP HTTP Handler
//!
//! `POST /mcp` carries exactly one JSON-RPC message per request. The HTTP
//! transport keeps no session between requests.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::dispatch::Session;
use crate::server::state::GuardedMcpDispatcher;

pub async fn mcp_post_handler(
    State(dispatcher): State<GuardedMcpDispatcher>,
    body: String,
) -> Response {
    let mut session = Session::stateless();
    match dispatcher.handle_message(&body, &mut session).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
