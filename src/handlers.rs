// src/handlers.rs
use std::{path::Path, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use tracing::{error, info, warn};

use crate::{
    config::Config,
    error::HandshakeError,
    normalize::RequestBody,
    token,
    types::{refreshed_body, Credentials, ErrorRes, RefreshRequest, ValidateRes},
};

pub const DASHBOARD_PATH: &str = "/player/login/dashboard";
pub const VALIDATE_PATH: &str = "/player/growid/login/validate";
pub const CHECKTOKEN_PATH: &str = "/player/growid/checktoken";
pub const VALIDATE_CHECKTOKEN_PATH: &str = "/player/growid/validate/checktoken";

/// Marker in the dashboard template replaced by the encoded client data.
pub const DATA_MARKER: &str = "{{ data }}";

pub async fn root() -> &'static str {
    "Hello, world!"
}

// ---------- HANDSHAKE ---------- //

/// Renders the login page with the client fingerprint embedded. The body is
/// a single-key mapping whose key is the fingerprint; anything unusable
/// renders an empty one.
pub async fn dashboard(
    State(config): State<Arc<Config>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let fingerprint = match RequestBody::parse(&headers, &body) {
        Ok(body) => body.first_key().unwrap_or_default(),
        Err(e) => {
            warn!("[DASHBOARD] unusable body, rendering without client data: {e}");
            String::new()
        }
    };

    match render_dashboard(&config.template_path, &fingerprint).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("[DASHBOARD] {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

async fn render_dashboard(template: &Path, fingerprint: &str) -> Result<String, HandshakeError> {
    let content = tokio::fs::read_to_string(template).await?;
    Ok(content.replacen(DATA_MARKER, &token::wrap(fingerprint), 1))
}

pub async fn validate(headers: HeaderMap, body: Bytes) -> Response {
    match issue(&headers, &body) {
        Ok(res) => Html(res).into_response(),
        Err(e) => {
            error!("[VALIDATE] {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorRes::new("Internal Server Error")),
            )
                .into_response()
        }
    }
}

fn issue(headers: &HeaderMap, body: &[u8]) -> Result<String, HandshakeError> {
    let body = RequestBody::parse(headers, body)?;
    let creds = Credentials::from_body(&body);
    info!(
        "[VALIDATE] issuing {} token for {}",
        if creds.is_registration() { "registration" } else { "login" },
        creds.grow_id
    );
    serde_json::to_string(&ValidateRes::validated(creds.issue_token()))
        .map_err(|e| HandshakeError::Unexpected(e.to_string()))
}

/// First refresh hop: bounce to the second with method and body intact.
pub async fn checktoken() -> Redirect {
    Redirect::temporary(VALIDATE_CHECKTOKEN_PATH)
}

/// Second refresh hop. Always answers 200; failures are reported in the body.
pub async fn validate_checktoken(headers: HeaderMap, body: Bytes) -> Response {
    match refresh(&headers, &body) {
        Ok(token) => Html(refreshed_body(&token)).into_response(),
        Err(e) => {
            error!("[CHECKTOKEN] {e}");
            (StatusCode::OK, Json(ErrorRes::new(e.refresh_message()))).into_response()
        }
    }
}

fn refresh(headers: &HeaderMap, body: &[u8]) -> Result<String, HandshakeError> {
    let body = RequestBody::parse(headers, body)?;
    RefreshRequest::from_body(&body)?.refreshed_token()
}
