// src/error.rs

/// Everything that can go wrong while servicing one handshake step.
///
/// No variant is fatal: each handler converts these into the response
/// contract of its own endpoint.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("refresh token is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Missing refreshToken or clientData")]
    MissingField,

    #[error("malformed JSON body: {0}")]
    MalformedBody(serde_json::Error),

    #[error("dashboard template unreadable: {0}")]
    Template(#[from] std::io::Error),

    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl HandshakeError {
    /// Message placed in the body of a failed token refresh.
    pub fn refresh_message(&self) -> &'static str {
        match self {
            Self::MissingField => "Missing refreshToken or clientData",
            Self::Decode(_) => "Invalid refreshToken",
            _ => "Internal Server Error",
        }
    }
}
