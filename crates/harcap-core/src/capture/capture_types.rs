use crate::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

static ALL_TYPES: [CaptureType; 8] = CaptureType::ALL;

/// An optional part of a request or response that can be recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CaptureType {
    RequestHeaders,
    RequestCookies,
    RequestContent,
    RequestBinaryContent,
    ResponseHeaders,
    ResponseCookies,
    ResponseContent,
    ResponseBinaryContent,
}

impl CaptureType {
    pub const ALL: [CaptureType; 8] = [
        CaptureType::RequestHeaders,
        CaptureType::RequestCookies,
        CaptureType::RequestContent,
        CaptureType::RequestBinaryContent,
        CaptureType::ResponseHeaders,
        CaptureType::ResponseCookies,
        CaptureType::ResponseContent,
        CaptureType::ResponseBinaryContent,
    ];

    pub const REQUEST: [CaptureType; 4] = [
        CaptureType::RequestHeaders,
        CaptureType::RequestCookies,
        CaptureType::RequestContent,
        CaptureType::RequestBinaryContent,
    ];

    pub const RESPONSE: [CaptureType; 4] = [
        CaptureType::ResponseHeaders,
        CaptureType::ResponseCookies,
        CaptureType::ResponseContent,
        CaptureType::ResponseBinaryContent,
    ];

    pub const HEADERS: [CaptureType; 2] =
        [CaptureType::RequestHeaders, CaptureType::ResponseHeaders];

    pub const COOKIES: [CaptureType; 2] =
        [CaptureType::RequestCookies, CaptureType::ResponseCookies];

    pub const NON_BINARY_CONTENT: [CaptureType; 2] =
        [CaptureType::RequestContent, CaptureType::ResponseContent];

    pub const BINARY_CONTENT: [CaptureType; 2] = [
        CaptureType::RequestBinaryContent,
        CaptureType::ResponseBinaryContent,
    ];

    pub const ALL_CONTENT: [CaptureType; 4] = [
        CaptureType::RequestContent,
        CaptureType::ResponseContent,
        CaptureType::RequestBinaryContent,
        CaptureType::ResponseBinaryContent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureType::RequestHeaders => "REQUEST_HEADERS",
            CaptureType::RequestCookies => "REQUEST_COOKIES",
            CaptureType::RequestContent => "REQUEST_CONTENT",
            CaptureType::RequestBinaryContent => "REQUEST_BINARY_CONTENT",
            CaptureType::ResponseHeaders => "RESPONSE_HEADERS",
            CaptureType::ResponseCookies => "RESPONSE_COOKIES",
            CaptureType::ResponseContent => "RESPONSE_CONTENT",
            CaptureType::ResponseBinaryContent => "RESPONSE_BINARY_CONTENT",
        }
    }

    /// Resolve a single name or a group name to the capture types it stands for
    fn expand(name: &str) -> Option<&'static [CaptureType]> {
        let group: &'static [CaptureType] = match name {
            "REQUEST_CAPTURE_TYPES" => &Self::REQUEST,
            "RESPONSE_CAPTURE_TYPES" => &Self::RESPONSE,
            "HEADER_CAPTURE_TYPES" => &Self::HEADERS,
            "COOKIE_CAPTURE_TYPES" => &Self::COOKIES,
            "NON_BINARY_CONTENT_CAPTURE_TYPES" => &Self::NON_BINARY_CONTENT,
            "BINARY_CONTENT_CAPTURE_TYPES" => &Self::BINARY_CONTENT,
            "ALL_CONTENT_CAPTURE_TYPES" => &Self::ALL_CONTENT,
            _ => {
                let idx = ALL_TYPES.iter().position(|t| t.as_str() == name)?;
                return Some(&ALL_TYPES[idx..=idx]);
            }
        };
        Some(group)
    }
}

impl fmt::Display for CaptureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| Error::InvalidCaptureType(s.to_string()))
    }
}

/// The set of enabled capture types. Empty means minimal capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureTypeSet {
    types: BTreeSet<CaptureType>,
}

impl CaptureTypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        CaptureType::ALL.into_iter().collect()
    }

    /// Parse a list such as `[REQUEST_HEADERS, RESPONSE_CONTENT]` or
    /// `REQUEST_HEADERS,RESPONSE_CONTENT`. Group names expand to their
    /// members. Any unknown name rejects the whole list.
    pub fn parse(list: &str) -> Result<Self> {
        let inner = list.trim().trim_start_matches('[').trim_end_matches(']');
        let mut types = BTreeSet::new();

        for raw in inner.split(',') {
            let name = raw.trim();
            if name.is_empty() {
                continue;
            }
            let expanded = CaptureType::expand(name)
                .ok_or_else(|| Error::InvalidCaptureType(name.to_string()))?;
            types.extend(expanded.iter().copied());
        }

        Ok(Self { types })
    }

    pub fn contains(&self, capture_type: CaptureType) -> bool {
        self.types.contains(&capture_type)
    }

    pub fn insert(&mut self, capture_type: CaptureType) {
        self.types.insert(capture_type);
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CaptureType> + '_ {
        self.types.iter().copied()
    }

    /// Whether a request body of the given kind should be stored
    pub fn captures_request_body(&self, binary: bool) -> bool {
        self.contains(CaptureType::RequestContent)
            || (binary && self.contains(CaptureType::RequestBinaryContent))
    }

    /// Whether a response body of the given kind should be stored
    pub fn captures_response_body(&self, binary: bool) -> bool {
        self.contains(CaptureType::ResponseContent)
            || (binary && self.contains(CaptureType::ResponseBinaryContent))
    }
}

impl FromIterator<CaptureType> for CaptureTypeSet {
    fn from_iter<I: IntoIterator<Item = CaptureType>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for CaptureTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.types.iter().map(|t| t.as_str()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
