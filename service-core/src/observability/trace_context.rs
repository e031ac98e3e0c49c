//! W3C Trace Context propagation for outbound HTTP calls.
//!
//! Outbound requests (order notifications, third-party APIs) carry the current
//! span's `traceparent`/`tracestate` so a single order can be followed across
//! systems.
//!
//! See: https://www.w3.org/TR/trace-context/

use opentelemetry::trace::TraceContextExt;
use reqwest::header::HeaderMap;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Header name for W3C traceparent
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Header name for W3C tracestate
pub const TRACESTATE_HEADER: &str = "tracestate";

/// Header name for request correlation ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Inject current trace context into HTTP request headers.
///
/// Nothing is written when there is no valid OpenTelemetry span, e.g. when
/// the OTLP exporter is disabled.
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let span = Span::current();
    let context = span.context();
    let otel_span = context.span();
    let span_context = otel_span.span_context();

    if !span_context.is_valid() {
        return;
    }

    // version-trace_id-span_id-trace_flags
    let traceparent = format!(
        "00-{}-{}-{:02x}",
        span_context.trace_id(),
        span_context.span_id(),
        span_context.trace_flags().to_u8()
    );

    if let Ok(value) = traceparent.parse() {
        headers.insert(TRACEPARENT_HEADER, value);
    }

    let tracestate = span_context.trace_state().header();
    if !tracestate.is_empty() {
        if let Ok(value) = tracestate.parse() {
            headers.insert(TRACESTATE_HEADER, value);
        }
    }
}

/// A reqwest request that gets trace headers injected when sent.
pub struct TracedRequest {
    request: reqwest::RequestBuilder,
}

impl TracedRequest {
    pub fn new(request: reqwest::RequestBuilder) -> Self {
        Self { request }
    }

    /// Add JSON body to the request.
    pub fn json<T: serde::Serialize + ?Sized>(self, json: &T) -> Self {
        Self {
            request: self.request.json(json),
        }
    }

    /// Bound the whole request, connect included.
    pub fn timeout(self, timeout: std::time::Duration) -> Self {
        Self {
            request: self.request.timeout(timeout),
        }
    }

    /// Send the request with trace context headers injected.
    pub async fn send(self) -> Result<reqwest::Response, reqwest::Error> {
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);

        self.request.headers(headers).send().await
    }
}

/// Extension trait for reqwest::Client to create traced requests.
pub trait TracedClientExt {
    fn traced_post(&self, url: &str) -> TracedRequest;
}

impl TracedClientExt for reqwest::Client {
    fn traced_post(&self, url: &str) -> TracedRequest {
        TracedRequest::new(self.post(url))
    }
}
