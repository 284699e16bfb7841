// src/normalize.rs
//! One view over the three body encodings the clients send.
//!
//! Desktop clients post JSON, the login page posts a urlencoded form and
//! mobile clients post a bare `key=value&...` string with whatever content
//! type their HTTP stack picks. The body is classified once here and
//! handlers only ever ask for fields.

use axum::http::{header::CONTENT_TYPE, HeaderMap};
use serde_json::{Map, Value};

use crate::error::HandshakeError;

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Map<String, Value>),
    Form(Vec<(String, String)>),
    Raw(String),
    Absent,
}

impl RequestBody {
    /// Classifies `body` by the declared content type.
    ///
    /// JSON that is not an object reads as an empty object. JSON that does not
    /// parse at all is an error; every other body is accepted.
    pub fn parse(headers: &HeaderMap, body: &[u8]) -> Result<Self, HandshakeError> {
        if body.is_empty() {
            return Ok(Self::Absent);
        }
        match mime(headers).as_str() {
            "application/json" => {
                match serde_json::from_slice(body).map_err(HandshakeError::MalformedBody)? {
                    Value::Object(map) => Ok(Self::Json(map)),
                    _ => Ok(Self::Json(Map::new())),
                }
            }
            "application/x-www-form-urlencoded" => Ok(Self::Form(parse_query(body))),
            _ => Ok(Self::Raw(String::from_utf8_lossy(body).into_owned())),
        }
    }

    /// Value of `key`, or `None` when the body does not carry it.
    ///
    /// JSON numbers and booleans read as their literal text. A raw body is
    /// read as a query string.
    pub fn field(&self, key: &str) -> Option<String> {
        match self {
            Self::Json(map) => match map.get(key)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            },
            Self::Form(pairs) => lookup(pairs, key),
            Self::Raw(text) => lookup(&parse_query(text.as_bytes()), key),
            Self::Absent => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        match self {
            Self::Json(map) => map.contains_key(key),
            Self::Form(pairs) => pairs.iter().any(|(k, _)| k == key),
            Self::Raw(text) => parse_query(text.as_bytes()).iter().any(|(k, _)| k == key),
            Self::Absent => false,
        }
    }

    /// First key of a JSON or form mapping in submission order. Raw bodies
    /// are not mappings and have no first key.
    pub fn first_key(&self) -> Option<String> {
        match self {
            Self::Json(map) => map.keys().next().cloned(),
            Self::Form(pairs) => pairs.first().map(|(k, _)| k.clone()),
            Self::Raw(_) | Self::Absent => None,
        }
    }
}

fn mime(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn parse_query(body: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

fn lookup(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}
