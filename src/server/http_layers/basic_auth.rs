//! HTTP Basic authentication for the MCP endpoint.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::mcp::protocol::SERVER_NAME;
use crate::server::metrics::record_auth_failure;
use crate::server::state::OptionalBasicAuth;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BasicAuthError {
    #[error("basic auth credentials must look like user:password")]
    MissingSeparator,
    #[error("basic auth user must not be empty")]
    EmptyUser,
}

/// Expected credentials, kept only as a digest.
pub struct BasicAuth {
    user: String,
    digest: [u8; 32],
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

fn digest(credentials: &[u8]) -> [u8; 32] {
    Sha256::digest(credentials).into()
}

impl BasicAuth {
    /// Parses `user:password`. The password may itself contain colons.
    pub fn parse(credentials: &str) -> Result<Self, BasicAuthError> {
        let (user, _) = credentials
            .split_once(':')
            .ok_or(BasicAuthError::MissingSeparator)?;
        if user.is_empty() {
            return Err(BasicAuthError::EmptyUser);
        }
        Ok(Self {
            user: user.to_string(),
            digest: digest(credentials.as_bytes()),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn verify(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };
        let Some(encoded) = value
            .strip_prefix("Basic ")
            .or_else(|| value.strip_prefix("basic "))
        else {
            return false;
        };
        match STANDARD.decode(encoded.trim()) {
            Ok(decoded) => digest(&decoded) == self.digest,
            Err(_) => false,
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(
            header::WWW_AUTHENTICATE,
            format!("Basic realm=\"{}\"", SERVER_NAME),
        )],
        "Unauthorized",
    )
        .into_response()
}

pub async fn require_basic_auth(
    State(auth): State<OptionalBasicAuth>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(auth) = auth else {
        return next.run(request).await;
    };
    if auth.verify(request.headers()) {
        next.run(request).await
    } else {
        warn!("Rejected unauthenticated request to {}", request.uri().path());
        record_auth_failure();
        unauthorized()
    }
}
