//! W3C Trace Context propagation for outbound HTTP calls.
//!
//! See: https://www.w3.org/TR/trace-context/

use opentelemetry::trace::TraceContextExt;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Header name for W3C traceparent
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Header name for W3C tracestate
pub const TRACESTATE_HEADER: &str = "tracestate";

/// Inject the current span's trace context into `headers`.
///
/// Does nothing when no OpenTelemetry context is active, which is the case
/// whenever the job runs without an OTLP endpoint.
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let context = Span::current().context();
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
    if let Ok(value) = HeaderValue::from_str(&traceparent) {
        headers.insert(TRACEPARENT_HEADER, value);
    }

    let tracestate = span_context.trace_state().header();
    if !tracestate.is_empty()
        && let Ok(value) = HeaderValue::from_str(&tracestate)
    {
        headers.insert(TRACESTATE_HEADER, value);
    }
}
