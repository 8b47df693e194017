//! Trace context interceptor for gRPC requests.
//!
//! Extracts W3C trace context from incoming gRPC metadata so spans can be
//! correlated across the gateway and the sync pipeline.

#![allow(clippy::result_large_err)]

use tonic::{Request, Status};

const TRACEPARENT_KEY: &str = "traceparent";
const REQUEST_ID_KEY: &str = "x-request-id";

/// Extract trace context fields from gRPC metadata.
pub fn extract_trace_context<T>(request: &Request<T>) -> (Option<String>, Option<String>) {
    let metadata = request.metadata();
    let traceparent = metadata
        .get(TRACEPARENT_KEY)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let request_id = metadata
        .get(REQUEST_ID_KEY)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    (traceparent, request_id)
}

/// Interceptor for extracting and propagating trace context.
pub fn trace_context_interceptor(request: Request<()>) -> Result<Request<()>, Status> {
    let (traceparent, request_id) = extract_trace_context(&request);

    if let Some(ref tp) = traceparent {
        tracing::debug!(traceparent = %tp, "Extracted traceparent from request");
    }
    if let Some(ref id) = request_id {
        tracing::Span::current().record("request_id", id.as_str());
    }

    Ok(request)
}
