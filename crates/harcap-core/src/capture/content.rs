//! Conversions from raw flow data to HAR fields.

use crate::har::{Cookie, Header, Param, QueryParam};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use url::Url;

/// Number of leading bytes inspected by [`is_mostly_binary`]
const BINARY_SAMPLE_LEN: usize = 100;

/// Share of control/high bytes above which content counts as binary
const BINARY_THRESHOLD: f64 = 0.3;

/// Heuristic binary detection over the first bytes of a body.
///
/// Bytes below TAB, between CR and space, and above `~` count as binary.
/// Non-ASCII text is therefore often classified as binary.
pub fn is_mostly_binary(data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }

    let sample = &data[..data.len().min(BINARY_SAMPLE_LEN)];
    let binary = sample
        .iter()
        .filter(|&&b| b < 9 || (13 < b && b < 32) || b > 126)
        .count();

    binary as f64 / sample.len() as f64 > BINARY_THRESHOLD
}

/// A body rendered for HAR: `(text, encoding)`
pub fn encode_body(data: &[u8], binary: bool) -> (String, String) {
    if binary {
        (STANDARD.encode(data), "base64".to_string())
    } else {
        (String::from_utf8_lossy(data).into_owned(), String::new())
    }
}

pub fn to_headers(headers: &[(String, String)]) -> Vec<Header> {
    headers
        .iter()
        .map(|(name, value)| Header::new(name.clone(), value.clone()))
        .collect()
}

/// Size of the header block as written on the wire: `name: value\r\n` per
/// header plus the terminating blank line.
pub fn headers_size(headers: &[(String, String)]) -> i64 {
    let lines: usize = headers
        .iter()
        .map(|(name, value)| name.len() + value.len() + 4)
        .sum();
    (lines + 2) as i64
}

pub fn query_string(url: &str) -> Vec<QueryParam> {
    match Url::parse(url) {
        Ok(url) => url
            .query_pairs()
            .map(|(name, value)| QueryParam {
                name: name.into_owned(),
                value: value.into_owned(),
                comment: None,
            })
            .collect(),
        Err(e) => {
            tracing::debug!("Failed to parse URL {}: {}", url, e);
            Vec::new()
        }
    }
}

pub fn form_params(body: &[u8]) -> Vec<Param> {
    url::form_urlencoded::parse(body)
        .map(|(name, value)| Param {
            name: name.into_owned(),
            value: Some(value.into_owned()),
            file_name: None,
            content_type: None,
            comment: None,
        })
        .collect()
}

/// Whether a content type names url-encoded form data
pub fn is_form_urlencoded(content_type: &str) -> bool {
    content_type
        .parse::<mime::Mime>()
        .map(|m| m.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str())
        .unwrap_or(false)
}

/// Cookies sent in `Cookie` request headers
pub fn request_cookies(headers: &[(String, String)]) -> Vec<Cookie> {
    headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("cookie"))
        .flat_map(|(_, value)| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some(Cookie {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
                ..Cookie::default()
            })
        })
        .collect()
}

/// Cookies set by `Set-Cookie` response headers. `received_at` anchors `Max-Age`.
pub fn response_cookies(headers: &[(String, String)], received_at: DateTime<Utc>) -> Vec<Cookie> {
    headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
        .filter_map(|(_, value)| parse_set_cookie(value, received_at))
        .collect()
}

fn parse_set_cookie(header: &str, received_at: DateTime<Utc>) -> Option<Cookie> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.trim().split_once('=')?;

    let mut cookie = Cookie {
        name: name.trim().to_string(),
        value: value.trim().to_string(),
        http_only: Some(false),
        secure: Some(false),
        ..Cookie::default()
    };
    let mut max_age = None;

    for attr in parts {
        let (key, val) = match attr.trim().split_once('=') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (attr.trim(), None),
        };
        match (key.to_ascii_lowercase().as_str(), val) {
            ("path", Some(v)) => cookie.path = Some(v.to_string()),
            ("domain", Some(v)) => cookie.domain = Some(v.to_string()),
            ("expires", Some(v)) => {
                cookie.expires = DateTime::parse_from_rfc2822(v)
                    .ok()
                    .map(|dt| format_timestamp(dt.with_timezone(&Utc)));
            }
            ("max-age", Some(v)) => max_age = v.parse::<i64>().ok(),
            ("httponly", _) => cookie.http_only = Some(true),
            ("secure", _) => cookie.secure = Some(true),
            _ => {}
        }
    }

    // Max-Age takes precedence over Expires
    if let Some(seconds) = max_age {
        cookie.expires = Some(format_timestamp(received_at + TimeDelta::seconds(seconds)));
    }

    Some(cookie)
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
