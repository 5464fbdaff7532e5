//! REST implementation of the invoice gateway.
//!
//! Direct HTTP via reqwest against the backend's JSON API:
//! - `GET    /api/invoices`              paged list (filters as query params)
//! - `GET    /api/invoices/{id}`         detail fetch
//! - `DELETE /api/invoices/{id}`         single delete
//! - `POST   /api/invoices/batch-delete` aggregated delete
//! - `PUT    /api/invoices/{id}/status`  status update
//! - `POST   /api/invoices/upload`       multipart upload + OCR
//!
//! Requests go through a bounded retry helper: 429/408/5xx responses and
//! transport timeouts back off exponentially (honoring `Retry-After`),
//! everything else returns immediately.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::StatusCode;
use serde_json::json;
use url::Url;

use crate::error::GatewayError;
use crate::types::{InvoiceRecord, InvoiceStatus, ListQuery, SessionContext};

use super::{InvoiceGateway, PagedResult, UploadOutcome, UploadRequest};

/// Session scoping header the backend expects on every request.
const ACCOUNT_REF_HEADER: &str = "x-account-ref";

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

fn status_is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn retry_delay(
    attempt: u32,
    policy: &RetryPolicy,
    retry_after: Option<&reqwest::header::HeaderValue>,
) -> Duration {
    if let Some(value) = retry_after.and_then(|v| v.to_str().ok()) {
        if let Ok(secs) = value.parse::<u64>() {
            return Duration::from_secs(secs.min(30));
        }
    }

    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    Duration::from_millis(base)
}

/// Send a request, retrying retryable statuses and transport errors.
async fn send_with_retry(
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, GatewayError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        // Multipart bodies are not cloneable; those requests get one attempt.
        let Some(cloned) = request.try_clone() else {
            return request.send().await.map_err(GatewayError::from);
        };

        match cloned.send().await {
            Ok(response) => {
                let status = response.status();
                if status_is_retryable(status) && attempt < attempts {
                    let delay = retry_delay(
                        attempt,
                        policy,
                        response.headers().get(reqwest::header::RETRY_AFTER),
                    );
                    log::warn!(
                        "gateway retry {}/{} after status {} (sleep {:?})",
                        attempt,
                        attempts,
                        status,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                let retryable_transport = err.is_timeout() || err.is_connect();
                if retryable_transport && attempt < attempts {
                    let delay = retry_delay(attempt, policy, None);
                    log::warn!(
                        "gateway retry {}/{} after transport error: {} (sleep {:?})",
                        attempt,
                        attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(GatewayError::from(err));
            }
        }
    }

    Err(GatewayError::Network("request exhausted retries".to_string()))
}

/// Map a non-success HTTP status plus body text to the error taxonomy.
fn map_error_status(status: StatusCode, body: &str) -> GatewayError {
    let message = extract_message(body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            status.to_string()
        } else {
            body.trim().to_string()
        }
    });

    match status {
        StatusCode::NOT_FOUND => GatewayError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::PermissionDenied(message),
        s if s.is_server_error() => GatewayError::Server {
            status: s.as_u16(),
            message,
        },
        _ => GatewayError::Unknown(message),
    }
}

/// Pull a human-readable message out of a JSON error body, if there is one.
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
}

/// REST client for the invoice backend.
pub struct HttpInvoiceGateway {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
    session: SessionContext,
    retry: RetryPolicy,
}

impl HttpInvoiceGateway {
    pub fn new(
        base: Url,
        token: Option<String>,
        session: SessionContext,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unknown(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base,
            token,
            session,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base
            .join(path)
            .map_err(|e| GatewayError::Unknown(format!("bad endpoint {path}: {e}")))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, url)
            .header(ACCOUNT_REF_HEADER, &self.session.account_ref);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Check status, then decode the JSON body.
    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        let body = response.text().await.map_err(GatewayError::from)?;
        if !status.is_success() {
            return Err(map_error_status(status, &body));
        }
        serde_json::from_str(&body).map_err(GatewayError::from)
    }

    /// Check status on a response whose body we don't need.
    async fn expect_success(response: reqwest::Response) -> Result<(), GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_error_status(status, &body))
    }
}

#[async_trait]
impl InvoiceGateway for HttpInvoiceGateway {
    async fn list_invoices(&self, query: &ListQuery) -> Result<PagedResult, GatewayError> {
        let mut url = self.endpoint("/api/invoices")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page", &query.page.to_string());
            pairs.append_pair("pageSize", &query.page_size.to_string());
            if let Some(sort) = &query.sort {
                pairs.append_pair("sort", sort);
            }
            for (key, value) in query.filters.as_query_pairs() {
                pairs.append_pair(&key, &value);
            }
        }

        let response =
            send_with_retry(self.request(reqwest::Method::GET, url), &self.retry).await?;
        Self::decode(response).await
    }

    async fn fetch_detail(&self, id: &str) -> Result<InvoiceRecord, GatewayError> {
        let url = self.endpoint(&format!("/api/invoices/{id}"))?;
        let response =
            send_with_retry(self.request(reqwest::Method::GET, url), &self.retry).await?;
        Self::decode(response).await
    }

    async fn delete_invoice(&self, id: &str) -> Result<(), GatewayError> {
        let url = self.endpoint(&format!("/api/invoices/{id}"))?;
        let response =
            send_with_retry(self.request(reqwest::Method::DELETE, url), &self.retry).await?;
        Self::expect_success(response).await
    }

    async fn delete_invoices(&self, ids: &[String]) -> Result<(), GatewayError> {
        let url = self.endpoint("/api/invoices/batch-delete")?;
        let request = self
            .request(reqwest::Method::POST, url)
            .json(&json!({ "ids": ids }));
        let response = send_with_retry(request, &self.retry).await?;
        Self::expect_success(response).await
    }

    async fn update_status(&self, id: &str, status: InvoiceStatus) -> Result<(), GatewayError> {
        let url = self.endpoint(&format!("/api/invoices/{id}/status"))?;
        let request = self
            .request(reqwest::Method::PUT, url)
            .json(&json!({ "status": status }));
        let response = send_with_retry(request, &self.retry).await?;
        Self::expect_success(response).await
    }

    async fn upload_invoice(&self, request: UploadRequest) -> Result<UploadOutcome, GatewayError> {
        let url = self.endpoint("/api/invoices/upload")?;

        let metadata_json = serde_json::to_string(&request.metadata)?;
        let file_part = multipart::Part::bytes(request.bytes)
            .file_name(request.file_name.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| GatewayError::Unknown(format!("bad mime: {e}")))?;
        let form = multipart::Form::new()
            .part("file", file_part)
            .text("sha256", request.sha256)
            .text("idempotencyKey", request.idempotency_key)
            .text("metadata", metadata_json);

        // Multipart is single-attempt (see send_with_retry); the pipeline's
        // own retry path covers transient upload failures.
        let response = send_with_retry(
            self.request(reqwest::Method::POST, url).multipart(form),
            &self.retry,
        )
        .await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_maps_to_taxonomy() {
        let e = map_error_status(StatusCode::NOT_FOUND, r#"{"message":"no such invoice"}"#);
        assert!(matches!(e, GatewayError::NotFound(ref m) if m == "no such invoice"));

        let e = map_error_status(StatusCode::FORBIDDEN, "");
        assert!(matches!(e, GatewayError::PermissionDenied(_)));

        let e = map_error_status(StatusCode::BAD_GATEWAY, "upstream died");
        assert!(matches!(e, GatewayError::Server { status: 502, .. }));

        let e = map_error_status(StatusCode::CONFLICT, r#"{"error":"stale"}"#);
        assert!(matches!(e, GatewayError::Unknown(ref m) if m == "stale"));
    }

    #[test]
    fn retry_delay_honors_retry_after() {
        let policy = RetryPolicy::default();
        let header = reqwest::header::HeaderValue::from_static("7");
        assert_eq!(
            retry_delay(1, &policy, Some(&header)),
            Duration::from_secs(7)
        );
    }

    #[test]
    fn retry_delay_backs_off_exponentially() {
        let policy = RetryPolicy::default();
        let first = retry_delay(1, &policy, None);
        let second = retry_delay(2, &policy, None);
        let third = retry_delay(3, &policy, None);
        assert_eq!(first, Duration::from_millis(250));
        assert_eq!(second, Duration::from_millis(500));
        assert_eq!(third, Duration::from_millis(1_000));

        // Capped at max_backoff_ms.
        let late = retry_delay(10, &policy, None);
        assert_eq!(late, Duration::from_millis(policy.max_backoff_ms));
    }

    #[test]
    fn retryable_statuses() {
        assert!(status_is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(status_is_retryable(StatusCode::REQUEST_TIMEOUT));
        assert!(status_is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!status_is_retryable(StatusCode::NOT_FOUND));
        assert!(!status_is_retryable(StatusCode::UNAUTHORIZED));
    }
}
