use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// HAR format version written by the capture engine
pub const HAR_VERSION: &str = "1.1";

/// Name recorded in `log.creator`
pub const CREATOR_NAME: &str = "harcap";

/// Timing value meaning "not measured / not applicable"
pub const NOT_APPLICABLE: i64 = -1;

/// Top-level HAR object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Har {
    pub log: Log,
}

impl Har {
    /// An empty document with the harcap creator and no pages or entries
    pub fn empty() -> Self {
        Self {
            log: Log {
                version: HAR_VERSION.to_string(),
                creator: Creator {
                    name: CREATOR_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    comment: Some(String::new()),
                },
                browser: None,
                entries: Vec::new(),
                pages: Vec::new(),
                comment: None,
            },
        }
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.log.pages.iter().find(|p| p.id == id)
    }
}

/// Main HAR log object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub version: String,
    pub creator: Creator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<Creator>,
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Creator/Browser information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Page information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(rename = "startedDateTime")]
    pub started_date_time: DateTime<Utc>,
    pub id: String,
    pub title: String,
    #[serde(rename = "pageTimings")]
    pub page_timings: PageTimings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Page {
    pub fn new(id: impl Into<String>, title: impl Into<String>, started: DateTime<Utc>) -> Self {
        Self {
            started_date_time: started,
            id: id.into(),
            title: title.into(),
            page_timings: PageTimings::default(),
            comment: None,
        }
    }
}

/// Page timing information, in milliseconds since the page started
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageTimings {
    #[serde(rename = "onContentLoad", default)]
    pub on_content_load: f64,
    #[serde(rename = "onLoad", default)]
    pub on_load: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Individual HTTP transaction entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "pageref", default)]
    pub page_ref: String,
    #[serde(rename = "startedDateTime")]
    pub started_date_time: DateTime<Utc>,
    /// Sum of all applicable timings, in milliseconds
    pub time: i64,
    pub request: Request,
    pub response: Response,
    #[serde(default)]
    pub cache: Cache,
    pub timings: Timings,
    #[serde(rename = "serverIPAddress", skip_serializing_if = "Option::is_none")]
    pub server_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// HTTP request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub url: String,
    #[serde(rename = "httpVersion")]
    pub http_version: String,
    pub cookies: Vec<Cookie>,
    pub headers: Vec<Header>,
    #[serde(rename = "queryString")]
    pub query_string: Vec<QueryParam>,
    #[serde(rename = "postData", skip_serializing_if = "Option::is_none")]
    pub post_data: Option<PostData>,
    #[serde(rename = "headersSize")]
    pub headers_size: i64,
    #[serde(rename = "bodySize")]
    pub body_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// HTTP response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: i64,
    #[serde(rename = "statusText")]
    pub status_text: String,
    #[serde(rename = "httpVersion")]
    pub http_version: String,
    pub cookies: Vec<Cookie>,
    pub headers: Vec<Header>,
    pub content: Content,
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    #[serde(rename = "headersSize")]
    pub headers_size: i64,
    #[serde(rename = "bodySize")]
    pub body_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Set when no response was received for the request
    #[serde(rename = "_errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Cookie
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(rename = "httpOnly", skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// HTTP header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            comment: None,
        }
    }
}

/// Query parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// POST data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostData {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<Param>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// POST parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Response content
///
/// `encoding` is `"base64"` when `text` holds base64 encoded binary data and
/// empty when `text` is the decoded body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub size: i64,
    /// Decoded size minus transferred size; negative when the body grew
    #[serde(default)]
    pub compression: i64,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub encoding: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Cache information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cache {
    #[serde(rename = "beforeRequest", skip_serializing_if = "Option::is_none")]
    pub before_request: Option<CacheEntry>,
    #[serde(rename = "afterRequest", skip_serializing_if = "Option::is_none")]
    pub after_request: Option<CacheEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub expires: Option<String>,
    #[serde(rename = "lastAccess")]
    pub last_access: String,
    #[serde(rename = "eTag")]
    pub e_tag: String,
    #[serde(rename = "hitCount")]
    pub hit_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn not_applicable() -> i64 {
    NOT_APPLICABLE
}

/// Timing information in whole milliseconds, `-1` where not applicable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    #[serde(default = "not_applicable")]
    pub blocked: i64,
    #[serde(default = "not_applicable")]
    pub dns: i64,
    #[serde(default = "not_applicable")]
    pub connect: i64,
    pub send: i64,
    pub wait: i64,
    pub receive: i64,
    #[serde(default = "not_applicable")]
    pub ssl: i64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            blocked: NOT_APPLICABLE,
            dns: NOT_APPLICABLE,
            connect: NOT_APPLICABLE,
            send: 0,
            wait: 0,
            receive: 0,
            ssl: NOT_APPLICABLE,
        }
    }
}

impl Timings {
    /// Sum of every field that is not the `-1` sentinel
    pub fn total(&self) -> i64 {
        [
            self.blocked,
            self.dns,
            self.connect,
            self.send,
            self.wait,
            self.receive,
            self.ssl,
        ]
        .into_iter()
        .filter(|v| *v != NOT_APPLICABLE)
        .sum()
    }
}
