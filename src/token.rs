// src/token.rs
//! Opaque token codec.
//!
//! A token is the base64 form of `key=value` pairs joined with `&`. Values
//! are never escaped, so a value holding `&` or `=` corrupts the layout; the
//! clients rely on that exact layout, so it is reproduced as-is.

use base64::{
    alphabet,
    engine::{
        general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD as B64},
        DecodePaddingMode,
    },
    Engine,
};

use crate::error::HandshakeError;

/// Decoder that tolerates missing padding and stray trailing bits, as the
/// game clients are not consistent about either.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

const TOKEN_KEY: &str = "_token";
const REGISTRATION_FLAGS: [&str; 2] = ["reg=0", "reg=1"];

/// Joins `fields` as `key=value&...` and base64-encodes the result.
pub fn encode(fields: &[(&str, &str)]) -> String {
    let raw = fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    wrap(&raw)
}

/// Base64 of the UTF-8 bytes of `raw`.
pub fn wrap(raw: &str) -> String {
    B64.encode(raw.as_bytes())
}

/// Recovers the raw `key=value&...` string from a token.
pub fn decode(token: &str) -> Result<String, HandshakeError> {
    let bytes = LENIENT.decode(token.trim())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Drops the first `&reg=0` pair, or failing that the first `&reg=1` pair.
/// A string without either flag comes back unchanged.
pub fn strip_registration_flag(raw: &str) -> String {
    let mut pairs: Vec<&str> = raw.split('&').collect();
    // the flag only counts when a `&` precedes it, so the head pair is skipped
    let found = REGISTRATION_FLAGS.iter().find_map(|flag| {
        pairs
            .iter()
            .skip(1)
            .position(|pair| pair == flag)
            .map(|i| i + 1)
    });
    match found {
        Some(idx) => {
            pairs.remove(idx);
            pairs.join("&")
        }
        None => raw.to_owned(),
    }
}

/// Rewrites the value of the first `_token` pair. No `_token` pair is a no-op.
pub fn replace_token_field(raw: &str, value: &str) -> String {
    let mut replaced = false;
    raw.split('&')
        .map(|pair| match pair.split_once('=') {
            Some((TOKEN_KEY, _)) if !replaced => {
                replaced = true;
                format!("{TOKEN_KEY}={value}")
            }
            _ => pair.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("&")
}


#[cfg(test)]
mod properties {
    use proptest::{collection::vec, prelude::*, sample::Index};

    use super::*;

    fn key() -> impl Strategy<Value = String> {
        "[A-Za-z_]{1,8}"
    }

    /// Printable ASCII without `&` or `=`.
    fn value() -> impl Strategy<Value = String> {
        "[ -%'-<>-~]{0,12}"
    }

    fn flag() -> impl Strategy<Value = String> {
        prop_oneof![Just("reg=0".to_owned()), Just("reg=1".to_owned())]
    }

    fn plain_pair() -> impl Strategy<Value = String> {
        (key().prop_filter("flag key", |k| k != "reg"), value())
            .prop_map(|(k, v)| format!("{k}={v}"))
    }

    /// Any pair, flags and flag lookalikes included.
    fn pair() -> impl Strategy<Value = String> {
        prop_oneof![
            flag(),
            Just("reg=01".to_owned()),
            Just("reg".to_owned()),
            (key(), value()).prop_map(|(k, v)| format!("{k}={v}")),
        ]
    }

    fn flag_count(raw: &str) -> usize {
        raw.split('&')
            .skip(1)
            .filter(|p| REGISTRATION_FLAGS.contains(p))
            .count()
    }

    proptest! {
        #[test]
        fn decode_of_encode_is_the_joined_fields(fields in vec((key(), value()), 0..8)) {
            let borrowed: Vec<(&str, &str)> =
                fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            let joined = fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&");
            prop_assert_eq!(decode(&encode(&borrowed)).unwrap(), joined);
        }

        #[test]
        fn strip_is_idempotent_with_at_most_one_flag(
            head in pair(),
            mut rest in vec(plain_pair(), 0..6),
            inserted in proptest::option::of((flag(), any::<Index>())),
        ) {
            if let Some((flag, at)) = inserted {
                let at = at.index(rest.len() + 1);
                rest.insert(at, flag);
            }
            let raw = std::iter::once(head).chain(rest).collect::<Vec<_>>().join("&");
            let once = strip_registration_flag(&raw);
            prop_assert_eq!(flag_count(&once), 0);
            prop_assert_eq!(strip_registration_flag(&once), once);
        }

        #[test]
        fn strip_removes_exactly_one_flag_and_keeps_the_head(pairs in vec(pair(), 1..8)) {
            let raw = pairs.join("&");
            let stripped = strip_registration_flag(&raw);
            let flags = flag_count(&raw);
            prop_assert_eq!(flag_count(&stripped), flags.saturating_sub(1));
            prop_assert_eq!(stripped.split('&').next(), raw.split('&').next());
            if flags == 0 {
                prop_assert_eq!(stripped, raw);
            } else {
                prop_assert_eq!(stripped.split('&').count() + 1, raw.split('&').count());
            }
        }

        #[test]
        fn replace_without_token_pair_is_identity(
            pairs in vec(
                prop_oneof![
                    Just("_token".to_owned()),
                    Just("my_token=x".to_owned()),
                    pair().prop_filter("token pair", |p| !p.starts_with("_token=")),
                ],
                0..8,
            ),
            new in "[ -~]{0,10}",
        ) {
            let raw = pairs.join("&");
            prop_assert_eq!(replace_token_field(&raw, &new), raw);
        }
    }
}
