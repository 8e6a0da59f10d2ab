use bytes::Bytes;
use chrono::Utc;
use harcap_core::capture::{Flow, FlowFailure, HarRecorder, RequestData, ResponseData};
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hudsucker::{Body, HttpContext, HttpHandler, RequestOrResponse};
use std::error::Error as StdError;
use std::io;
use std::sync::Arc;

/// HTTP handler that reports every proxied exchange to a [`HarRecorder`].
///
/// The proxy clones the handler for each request, so the clone that saw a
/// request is the one that later sees its response or error. The flow lives
/// on that clone.
#[derive(Clone)]
pub struct HarCaptureHandler {
    recorder: Arc<HarRecorder>,
    flow: Option<Flow>,
}

impl HarCaptureHandler {
    pub fn new(recorder: Arc<HarRecorder>) -> Self {
        Self {
            recorder,
            flow: None,
        }
    }

    pub fn recorder(&self) -> &Arc<HarRecorder> {
        &self.recorder
    }
}

impl HttpHandler for HarCaptureHandler {
    async fn handle_request(&mut self, _ctx: &HttpContext, req: Request<Body>) -> RequestOrResponse {
        // Tunnel setup, the requests inside the tunnel are captured
        if req.method() == Method::CONNECT {
            return RequestOrResponse::Request(req);
        }

        let started_at = Utc::now();
        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::warn!("Failed to read request body for {}: {}", parts.uri, e);
                return RequestOrResponse::Response(bad_gateway("Unable to read request body"));
            }
        };

        let mut request = RequestData::new(parts.method.as_str(), parts.uri.to_string(), started_at);
        request.http_version = format!("{:?}", parts.version);
        request.headers = header_pairs(&parts.headers);
        request.body = body.to_vec();
        request.ended_at = Some(Utc::now());

        let flow = Flow::new(self.recorder.next_flow_id(), request);
        self.recorder.begin_entry(&flow);
        self.flow = Some(flow);

        RequestOrResponse::Request(Request::from_parts(parts, Body::from(Full::new(body))))
    }

    async fn handle_response(&mut self, _ctx: &HttpContext, res: Response<Body>) -> Response<Body> {
        let Some(mut flow) = self.flow.take() else {
            return res;
        };

        let started_at = Utc::now();
        let (parts, body) = res.into_parts();
        let raw = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::warn!("Failed to read response body for {}: {}", flow.request.url, e);
                self.recorder
                    .fail_entry(&flow, classify_upstream_error(&e), Utc::now());
                return bad_gateway("Unable to read upstream response");
            }
        };
        let decoded = decode_body(&parts.headers, &raw).await;

        flow.response = Some(ResponseData {
            status: parts.status.as_u16(),
            reason: parts.status.canonical_reason().unwrap_or_default().to_string(),
            http_version: format!("{:?}", parts.version),
            headers: header_pairs(&parts.headers),
            raw_body: raw.to_vec(),
            body: decoded.to_vec(),
            started_at,
            ended_at: Utc::now(),
        });
        self.recorder.complete_entry(&flow);

        Response::from_parts(parts, Body::from(Full::new(raw)))
    }

    async fn handle_error(
        &mut self,
        _ctx: &HttpContext,
        err: hudsucker::hyper_util::client::legacy::Error,
    ) -> Response<Body> {
        let failure = classify_upstream_error(&err);

        match self.flow.take() {
            Some(flow) => {
                tracing::warn!("{} {} failed: {}", flow.request.method, flow.request.url, err);
                self.recorder.fail_entry(&flow, failure, Utc::now());
                bad_gateway(&failure.message(&flow.request))
            }
            None => {
                tracing::warn!("Upstream request failed: {}", err);
                bad_gateway(&err.to_string())
            }
        }
    }
}

/// Map an upstream client error onto the failure kinds recorded in a HAR.
///
/// Walks the source chain: I/O error kinds decide first, then the messages
/// produced by the resolver and timeouts. Anything else counts as a failed
/// connection.
pub fn classify_upstream_error(err: &(dyn StdError + 'static)) -> FlowFailure {
    let mut current = Some(err);

    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::TimedOut => return FlowFailure::ResponseTimedOut,
                io::ErrorKind::ConnectionRefused => return FlowFailure::ConnectionFailed,
                _ => {}
            }
        }

        let message = e.to_string().to_ascii_lowercase();
        if message.contains("dns error")
            || message.contains("failed to lookup address")
            || message.contains("name or service not known")
        {
            return FlowFailure::ResolutionFailed;
        }
        if message.contains("timed out") {
            return FlowFailure::ResponseTimedOut;
        }

        current = e.source();
    }

    FlowFailure::ConnectionFailed
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(k, v)| {
            (
                k.to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// The body with its content encoding removed, or the raw body when it cannot
/// be decoded
async fn decode_body(headers: &HeaderMap, raw: &Bytes) -> Bytes {
    let mut encoded = Response::new(Body::from(Full::new(raw.clone())));
    *encoded.headers_mut() = headers.clone();

    let decoded = match hudsucker::decode_response(encoded) {
        Ok(res) => res.into_body().collect().await,
        Err(e) => {
            tracing::debug!("Unable to decode response body: {}", e);
            return raw.clone();
        }
    };

    match decoded {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::debug!("Unable to decode response body: {}", e);
            raw.clone()
        }
    }
}

fn bad_gateway(message: &str) -> Response<Body> {
    let mut res = Response::new(Body::from(Full::new(Bytes::from(message.to_string()))));
    *res.status_mut() = StatusCode::BAD_GATEWAY;
    res
}
