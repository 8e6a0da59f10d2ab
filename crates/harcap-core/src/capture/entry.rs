use super::capture_types::{CaptureType, CaptureTypeSet};
use super::connection::{SetupTimings, millis_between};
use super::content;
use super::flow::{Flow, FlowFailure, RequestData, ResponseData};
use crate::har::{Content, Entry, PostData, Request, Response, Timings};
use chrono::{DateTime, Utc};

/// Message carried by the placeholder response until a real one arrives
pub const NO_RESPONSE_ERROR_MESSAGE: &str = "No response received";

/// Builds HAR entries from flow data according to the active capture types
pub struct HarEntryBuilder<'a> {
    capture_types: &'a CaptureTypeSet,
}

impl<'a> HarEntryBuilder<'a> {
    pub fn new(capture_types: &'a CaptureTypeSet) -> Self {
        Self { capture_types }
    }

    /// An entry for a request whose response is not known yet. The response
    /// is a placeholder carrying [`NO_RESPONSE_ERROR_MESSAGE`].
    pub fn begin(&self, request: &RequestData, page_ref: &str) -> Entry {
        Entry {
            page_ref: page_ref.to_string(),
            started_date_time: request.started_at,
            time: 0,
            request: self.request(request),
            response: placeholder_response(),
            cache: Default::default(),
            timings: Timings::default(),
            server_ip_address: None,
            connection: None,
            comment: None,
        }
    }

    fn request(&self, request: &RequestData) -> Request {
        let mut har_request = Request {
            method: request.method.clone(),
            url: request.url.clone(),
            http_version: request.http_version.clone(),
            query_string: content::query_string(&request.url),
            headers_size: content::headers_size(&request.headers),
            body_size: request.body.len() as i64,
            ..Request::default()
        };

        if self.capture_types.contains(CaptureType::RequestCookies) {
            har_request.cookies = content::request_cookies(&request.headers);
        }

        if self.capture_types.contains(CaptureType::RequestHeaders) {
            har_request.headers = content::to_headers(&request.headers);
        }

        let binary = content::is_mostly_binary(&request.body);
        if !request.body.is_empty() && self.capture_types.captures_request_body(binary) {
            har_request.post_data = Some(post_data(request, binary));
        }

        har_request
    }

    /// Replace the placeholder response with the real one and fill in timings.
    pub fn complete(
        &self,
        entry: &mut Entry,
        flow: &Flow,
        response: &ResponseData,
        setup: SetupTimings,
        page_ref: String,
    ) {
        let request = &flow.request;
        let request_end = request.ended_at.unwrap_or(request.started_at);

        entry.timings = Timings {
            dns: setup.dns,
            connect: setup.connect,
            ssl: setup.ssl,
            send: millis_between(request.started_at, request_end),
            wait: millis_between(request_end, response.started_at),
            receive: millis_between(response.started_at, response.ended_at),
            ..Timings::default()
        };
        entry.time = entry.timings.total();
        entry.response = self.response(response);
        entry.page_ref = page_ref;

        if let Some(server) = &flow.server {
            if server.connected {
                entry.server_ip_address = server.ip_address.map(|ip| ip.to_string());
            }
        }
    }

    fn response(&self, response: &ResponseData) -> Response {
        let raw_size = response.raw_body.len() as i64;
        let decoded_size = response.body.len() as i64;

        let mut har_response = Response {
            status: i64::from(response.status),
            status_text: response.reason.clone(),
            http_version: response.http_version.clone(),
            content: Content {
                size: raw_size,
                compression: decoded_size - raw_size,
                mime_type: response.header("content-type").unwrap_or_default().to_string(),
                ..Content::default()
            },
            redirect_url: response.header("location").unwrap_or_default().to_string(),
            headers_size: content::headers_size(&response.headers),
            body_size: raw_size,
            ..Response::default()
        };

        if self.capture_types.contains(CaptureType::ResponseCookies) {
            har_response.cookies = content::response_cookies(&response.headers, response.started_at);
        }

        if self.capture_types.contains(CaptureType::ResponseHeaders) {
            har_response.headers = content::to_headers(&response.headers);
        }

        let binary = content::is_mostly_binary(&response.body);
        if self.capture_types.captures_response_body(binary) {
            let (text, encoding) = content::encode_body(&response.body, binary);
            har_response.content.text = text;
            har_response.content.encoding = encoding;
        }

        har_response
    }

    /// Record a failed flow on its entry: the error message, whatever setup
    /// timings are knowable, and, for timeouts, the phase that stalled.
    pub fn fail(
        &self,
        entry: &mut Entry,
        flow: &Flow,
        failure: FlowFailure,
        (dns, connect): (i64, i64),
        at: DateTime<Utc>,
    ) {
        entry.response.error_message = Some(failure.message(&flow.request));

        entry.timings.dns = dns;
        if failure != FlowFailure::ResolutionFailed {
            entry.timings.connect = connect;
        }

        if failure == FlowFailure::ResponseTimedOut {
            let request = &flow.request;
            match (request.ended_at, &flow.response) {
                (None, _) => entry.timings.send = millis_between(request.started_at, at),
                (Some(sent), None) => entry.timings.wait = millis_between(sent, at),
                (Some(_), Some(response)) => {
                    entry.timings.receive = millis_between(response.started_at, at)
                }
            }
        }

        if failure != FlowFailure::ResolutionFailed {
            if let Some(ip) = flow.server.as_ref().and_then(|s| s.ip_address) {
                entry.server_ip_address = Some(ip.to_string());
            }
        }

        entry.time = entry.timings.total();
    }
}

fn placeholder_response() -> Response {
    Response {
        status: 0,
        status_text: String::new(),
        http_version: "unknown".to_string(),
        error_message: Some(NO_RESPONSE_ERROR_MESSAGE.to_string()),
        ..Response::default()
    }
}

fn post_data(request: &RequestData, binary: bool) -> PostData {
    let mime_type = request.header("content-type").unwrap_or_default().to_string();
    let params = if content::is_form_urlencoded(&mime_type) {
        Some(content::form_params(&request.body))
    } else {
        None
    };
    let (text, encoding) = content::encode_body(&request.body, binary);

    PostData {
        mime_type,
        params,
        text: Some(text),
        encoding: (!encoding.is_empty()).then_some(encoding),
        comment: None,
    }
}
