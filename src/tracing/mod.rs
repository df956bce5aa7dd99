//! Request correlation for logs and error bodies.

use axum::http::{HeaderMap, Request};
use std::{fmt, future::Future, sync::Arc};
use tower_http::{
    classify::{SharedClassifier, StatusInRangeAsFailures},
    trace::{DefaultOnFailure, DefaultOnResponse, MakeSpan, TraceLayer},
};
use tracing::Level;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id of one HTTP request. Client supplied when present.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(Arc::from(value.into()))
    }

    /// Id carried by the request headers, if it is non-empty text.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

tokio::task_local! {
    static ACTIVE_REQUEST: RequestId;
}

/// Runs `future` with `request_id` reported by [`current_request_id`].
pub async fn scope_request_id<Fut, R>(request_id: RequestId, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    ACTIVE_REQUEST.scope(request_id, future).await
}

/// Id of the request being served on this task, if any.
pub fn current_request_id() -> Option<RequestId> {
    ACTIVE_REQUEST.try_with(RequestId::clone).ok()
}

/// Span per request. Only the path is recorded; catalog queries stay out of logs.
#[derive(Clone, Default)]
pub struct StorefrontSpan;

impl<B> MakeSpan<B> for StorefrontSpan {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .cloned()
            .or_else(|| RequestId::from_headers(request.headers()));
        let request_id = request_id.as_ref().map_or("-", RequestId::as_str);

        tracing::info_span!(
            "http",
            %request_id,
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

pub type HttpTraceLayer = TraceLayer<SharedClassifier<StatusInRangeAsFailures>, StorefrontSpan>;

/// Server errors are failures; 4xx responses are logged as ordinary responses.
pub fn configure_http_tracing() -> HttpTraceLayer {
    TraceLayer::new(SharedClassifier::new(StatusInRangeAsFailures::new(500..=599)))
        .make_span_with(StorefrontSpan)
        .on_response(DefaultOnResponse::new().level(Level::INFO))
        .on_failure(DefaultOnFailure::new().level(Level::ERROR))
}
