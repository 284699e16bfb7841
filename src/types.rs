// src/types.rs
use serde::Serialize;
use tracing::debug;

use crate::{error::HandshakeError, normalize::RequestBody, token};

/// Fields submitted to the validate step. An `email` turns a login into a
/// registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub token: String,
    pub grow_id: String,
    pub password: String,
    pub email: Option<String>,
}

impl Credentials {
    /// Absent fields read as empty values; an empty `email` counts as absent.
    pub fn from_body(body: &RequestBody) -> Self {
        Self {
            token: body.field("_token").unwrap_or_default(),
            grow_id: body.field("growId").unwrap_or_default(),
            password: body.field("password").unwrap_or_default(),
            email: body.field("email").filter(|e| !e.is_empty()),
        }
    }

    pub fn is_registration(&self) -> bool {
        self.email.is_some()
    }

    /// Ordered token fields for the login or registration variant.
    pub fn token_fields(&self) -> Vec<(&str, &str)> {
        let mut fields = vec![
            ("_token", self.token.as_str()),
            ("growId", self.grow_id.as_str()),
            ("password", self.password.as_str()),
        ];
        match &self.email {
            Some(email) => {
                fields.push(("email", email.as_str()));
                fields.push(("reg", "1"));
            }
            None => fields.push(("reg", "0")),
        }
        fields
    }

    pub fn issue_token(&self) -> String {
        token::encode(&self.token_fields())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub client_data: String,
}

impl RefreshRequest {
    /// Pulls `refreshToken` and `clientData` out of whichever encoding the
    /// client used. Either one missing or empty is [`HandshakeError::MissingField`].
    pub fn from_body(body: &RequestBody) -> Result<Self, HandshakeError> {
        let shape = match body {
            RequestBody::Json(_) => "JSON/object",
            RequestBody::Form(_) if body.contains("refreshToken") => "JSON/object",
            RequestBody::Form(pairs) if !pairs.is_empty() => "form-urlencoded",
            RequestBody::Raw(text) if !text.is_empty() => "raw query string",
            _ => return Err(HandshakeError::MissingField),
        };
        debug!("[CHECKTOKEN] parsed as {shape}");

        let refresh_token = body.field("refreshToken").filter(|v| !v.is_empty());
        let client_data = body.field("clientData").filter(|v| !v.is_empty());
        match (refresh_token, client_data) {
            (Some(refresh_token), Some(client_data)) => Ok(Self {
                refresh_token,
                client_data,
            }),
            _ => Err(HandshakeError::MissingField),
        }
    }

    /// Decodes the presented token, drops its registration flag, swaps the
    /// `_token` value for base64 of the client data and wraps the result in
    /// base64 again. The inner base64 inside the outer base64 is what the
    /// clients expect.
    pub fn refreshed_token(&self) -> Result<String, HandshakeError> {
        let decoded = token::decode(&self.refresh_token)?;
        let stripped = token::strip_registration_flag(&decoded);
        let rewritten = token::replace_token_field(&stripped, &token::wrap(&self.client_data));
        Ok(token::wrap(&rewritten))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRes {
    pub status: &'static str,
    pub message: &'static str,
    pub token: String,
    pub url: &'static str,
    pub account_type: &'static str,
}

impl ValidateRes {
    pub fn validated(token: String) -> Self {
        Self {
            status: "success",
            message: "Account Validated.",
            token,
            url: "",
            account_type: "growtopia",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorRes {
    pub status: &'static str,
    pub message: &'static str,
}

impl ErrorRes {
    pub fn new(message: &'static str) -> Self {
        Self {
            status: "error",
            message,
        }
    }
}

/// Success body of the refresh step. Built by hand so the byte layout never
/// depends on a serializer.
pub fn refreshed_body(token: &str) -> String {
    format!(
        r#"{{"status":"success","message":"Token is valid.","token":"{token}","url":"","accountType":"growtopia"}}"#
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn json_body(value: serde_json::Value) -> RequestBody {
        match value {
            serde_json::Value::Object(map) => RequestBody::Json(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn login_token_layout() {
        let creds = Credentials::from_body(&json_body(
            json!({"growId": "G", "password": "P", "_token": "T"}),
        ));
        assert!(!creds.is_registration());
        let decoded = token::decode(&creds.issue_token()).unwrap();
        assert_eq!(decoded, "_token=T&growId=G&password=P&reg=0");
    }

    #[test]
    fn registration_token_layout() {
        let creds = Credentials::from_body(&json_body(
            json!({"growId": "G", "password": "P", "_token": "T", "email": "e@x.com"}),
        ));
        assert!(creds.is_registration());
        let decoded = token::decode(&creds.issue_token()).unwrap();
        assert_eq!(decoded, "_token=T&growId=G&password=P&email=e@x.com&reg=1");
    }

    #[test]
    fn empty_email_is_a_login() {
        let creds = Credentials::from_body(&RequestBody::Form(vec![
            ("growId".into(), "G".into()),
            ("email".into(), "".into()),
        ]));
        assert_eq!(creds.email, None);
        let decoded = token::decode(&creds.issue_token()).unwrap();
        assert_eq!(decoded, "_token=&growId=G&password=&reg=0");
    }

    #[test]
    fn refresh_rewrites_token_field() {
        let req = RefreshRequest {
            refresh_token: token::wrap("_token=AAA&growId=G&password=P&reg=0"),
            client_data: "fp123".into(),
        };
        let inner = format!("_token={}&growId=G&password=P", token::wrap("fp123"));
        assert_eq!(req.refreshed_token().unwrap(), token::wrap(&inner));
    }

    #[test]
    fn refresh_of_token_without_token_field_only_strips_flag() {
        let req = RefreshRequest {
            refresh_token: token::wrap("growId=G&reg=1"),
            client_data: "fp".into(),
        };
        assert_eq!(req.refreshed_token().unwrap(), token::wrap("growId=G"));
    }

    #[test]
    fn refresh_of_garbage_token_is_decode_error() {
        let req = RefreshRequest {
            refresh_token: "%%%".into(),
            client_data: "fp".into(),
        };
        let err = req.refreshed_token().unwrap_err();
        assert!(matches!(err, HandshakeError::Decode(_)));
        assert_eq!(err.refresh_message(), "Invalid refreshToken");
    }

    #[test]
    fn refresh_fields_from_each_shape() {
        let expected = RefreshRequest {
            refresh_token: "rt".into(),
            client_data: "cd".into(),
        };
        let shapes = [
            json_body(json!({"refreshToken": "rt", "clientData": "cd"})),
            RequestBody::Form(vec![
                ("clientData".into(), "cd".into()),
                ("refreshToken".into(), "rt".into()),
            ]),
            RequestBody::Raw("refreshToken=rt&clientData=cd".into()),
        ];
        for body in &shapes {
            assert_eq!(RefreshRequest::from_body(body).unwrap(), expected);
        }
    }

    #[test]
    fn refresh_fields_missing() {
        let bodies = [
            RequestBody::Absent,
            json_body(json!({})),
            json_body(json!({"refreshToken": "rt"})),
            RequestBody::Form(vec![("clientData".into(), "cd".into())]),
            RequestBody::Raw("refreshToken=&clientData=cd".into()),
        ];
        for body in &bodies {
            let err = RefreshRequest::from_body(body).unwrap_err();
            assert!(matches!(err, HandshakeError::MissingField), "{body:?}");
            assert_eq!(err.refresh_message(), "Missing refreshToken or clientData");
        }
    }

    #[test]
    fn validate_res_field_order() {
        let body = serde_json::to_string(&ValidateRes::validated("tok".into())).unwrap();
        assert_eq!(
            body,
            r#"{"status":"success","message":"Account Validated.","token":"tok","url":"","accountType":"growtopia"}"#
        );
    }

    #[test]
    fn refreshed_body_layout() {
        assert_eq!(
            refreshed_body("abc"),
            r#"{"status":"success","message":"Token is valid.","token":"abc","url":"","accountType":"growtopia"}"#
        );
    }
}
