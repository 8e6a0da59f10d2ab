//! Flow data delivered by the host proxy runtime.
//!
//! A flow is one request/response exchange. The runtime fills in the
//! timestamps as the exchange progresses and hands the flow to the
//! [`HarRecorder`](super::HarRecorder) at each lifecycle callback.

use super::connection::ConnectionId;
use chrono::{DateTime, Utc};
use std::fmt;
use std::net::IpAddr;
use url::Url;

/// Correlation key for the callbacks of one flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowId(pub u64);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow-{}", self.0)
    }
}

/// The client request of a flow
#[derive(Debug, Clone)]
pub struct RequestData {
    pub method: String,
    pub url: String,
    pub http_version: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// When the proxy started sending the request upstream
    pub started_at: DateTime<Utc>,
    /// When the request was fully sent, if it was
    pub ended_at: Option<DateTime<Utc>>,
}

impl RequestData {
    pub fn new(method: impl Into<String>, url: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            http_version: "HTTP/1.1".to_string(),
            headers: Vec::new(),
            body: Vec::new(),
            started_at,
            ended_at: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// `host` or `host:port`, with the port left out when it is 80
    pub fn host_port(&self) -> String {
        let Ok(url) = Url::parse(&self.url) else {
            return self.url.clone();
        };
        let host = url.host_str().unwrap_or_default();
        match url.port_or_known_default() {
            Some(80) | None => host.to_string(),
            Some(port) => format!("{}:{}", host, port),
        }
    }
}

/// The upstream response of a flow
#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status: u16,
    pub reason: String,
    pub http_version: String,
    pub headers: Vec<(String, String)>,
    /// Body as transferred, before content decoding
    pub raw_body: Vec<u8>,
    /// Body after content decoding
    pub body: Vec<u8>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl ResponseData {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// The upstream connection a flow was sent over
#[derive(Debug, Clone)]
pub struct ServerConnection {
    pub id: ConnectionId,
    pub ip_address: Option<IpAddr>,
    pub connected: bool,
}

/// One request/response exchange as seen by the proxy
#[derive(Debug, Clone)]
pub struct Flow {
    pub id: FlowId,
    pub request: RequestData,
    pub response: Option<ResponseData>,
    pub server: Option<ServerConnection>,
}

impl Flow {
    pub fn new(id: FlowId, request: RequestData) -> Self {
        Self {
            id,
            request,
            response: None,
            server: None,
        }
    }
}

pub const RESOLUTION_FAILED_ERROR_MESSAGE: &str = "Unable to resolve host: ";
pub const CONNECTION_FAILED_ERROR_MESSAGE: &str = "Unable to connect to host";
pub const RESPONSE_TIMED_OUT_ERROR_MESSAGE: &str = "Response timed out";

/// Why a flow ended without a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowFailure {
    ResolutionFailed,
    /// Refused or otherwise unable to connect
    ConnectionFailed,
    ResponseTimedOut,
}

impl FlowFailure {
    /// The error message recorded on the entry's response
    pub fn message(&self, request: &RequestData) -> String {
        match self {
            FlowFailure::ResolutionFailed => {
                format!("{}{}", RESOLUTION_FAILED_ERROR_MESSAGE, request.host_port())
            }
            FlowFailure::ConnectionFailed => CONNECTION_FAILED_ERROR_MESSAGE.to_string(),
            FlowFailure::ResponseTimedOut => RESPONSE_TIMED_OUT_ERROR_MESSAGE.to_string(),
        }
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
