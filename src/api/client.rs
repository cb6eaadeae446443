use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, StatusCode, Url, header};
use serde::de::DeserializeOwned;

use super::{ApiError, CustomerSource, Operation, Query, send_api_request};
use crate::model::{ClusterStatsResponse, ClusterSummary, CustomerRecord};

/// Characters left alone by `encodeURIComponent`; everything else in a query
/// value is percent-encoded.
const QUERY_VALUE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const MAX_DETAIL_LEN: usize = 200;

/// HTTP client for the customer analytics backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:8000";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = validate_base_url(base_url)?;
        let http = Client::builder()
            .default_headers(default_headers())
            .user_agent(concat!("segscope/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| ApiError::InvalidBaseUrl {
                url: base_url.clone(),
                message: err.to_string(),
            })?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: Operation,
        path_and_query: String,
    ) -> Result<T, ApiError> {
        let url = self.url(&path_and_query);
        tracing::trace!(%url, ?operation, "api_request_start");
        let (result, elapsed) = send_api_request(|| self.http.get(&url).send()).await;
        let response = result.map_err(|err| {
            tracing::debug!(%url, error = %err, "api_request_transport_error");
            ApiError::Transport {
                operation,
                message: transport_message(&err),
            }
        })?;
        let status = response.status();
        tracing::debug!(
            %url,
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis(),
            "api_request_done"
        );
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                operation,
                status: status.as_u16(),
                detail: error_detail(status, &body),
            });
        }
        response.json::<T>().await.map_err(|err| ApiError::Decode {
            operation,
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl CustomerSource for ApiClient {
    async fn customers(&self, limit: u32) -> Result<Vec<CustomerRecord>, ApiError> {
        let query = Query::Browse { limit };
        self.get_json(query.operation(), request_path(&query)).await
    }

    async fn search(&self, query: &str, top_k: u32) -> Result<Vec<CustomerRecord>, ApiError> {
        let query = Query::Search {
            query: query.to_string(),
            top_k,
        };
        self.get_json(query.operation(), request_path(&query)).await
    }

    async fn customers_by_cluster(
        &self,
        cluster_id: Option<u32>,
        limit: u32,
    ) -> Result<Vec<CustomerRecord>, ApiError> {
        let query = Query::ClusterFilter { cluster_id, limit };
        self.get_json(query.operation(), request_path(&query)).await
    }

    async fn cluster_stats(&self) -> Result<Vec<ClusterSummary>, ApiError> {
        let response: ClusterStatsResponse = self
            .get_json(Operation::ClusterStats, "/clusters/stats".to_string())
            .await?;
        Ok(response.into_summaries())
    }
}

/// Path and query string for a customer listing request, relative to the
/// API base URL.
pub fn request_path(query: &Query) -> String {
    match query {
        Query::Browse { limit } => format!("/customers?limit={limit}"),
        Query::Search { query, top_k } => format!(
            "/customers/search?query={}&top_k={top_k}",
            utf8_percent_encode(query, QUERY_VALUE_ENCODE_SET)
        ),
        Query::ClusterFilter { cluster_id, limit } => {
            let mut path = format!("/customers/clusters?limit={limit}");
            if let Some(cluster_id) = cluster_id {
                path.push_str(&format!("&cluster_id={cluster_id}"));
            }
            path
        }
    }
}

fn default_headers() -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );
    headers
}

/// Validate the base URL and return it without a trailing slash.
///
/// Rules: scheme must be http or https, a host is required, and query strings
/// or fragments are rejected since request paths are appended verbatim.
fn validate_base_url(base: &str) -> Result<String, ApiError> {
    let invalid = |message: String| ApiError::InvalidBaseUrl {
        url: base.to_string(),
        message,
    };
    let parsed = Url::parse(base.trim()).map_err(|err| invalid(err.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "unsupported scheme '{}', expected http or https",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(invalid("query strings and fragments are not allowed".to_string()));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

fn transport_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "could not connect to the API".to_string()
    } else {
        err.to_string()
    }
}

/// Short explanation for a failed response: the `detail` field of a JSON
/// error body when there is one, otherwise a trimmed plain-text body.
fn error_detail(status: StatusCode, body: &str) -> Option<String> {
    let body = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(detail) = value.get("detail").and_then(|detail| detail.as_str())
    {
        return Some(truncate_detail(detail));
    }
    if body.is_empty() || body.starts_with('{') || body.starts_with('<') {
        return status.canonical_reason().map(str::to_string);
    }
    Some(truncate_detail(body))
}

fn truncate_detail(detail: &str) -> String {
    let detail = detail.trim();
    if detail.chars().count() <= MAX_DETAIL_LEN {
        return detail.to_string();
    }
    let mut out: String = detail.chars().take(MAX_DETAIL_LEN - 3).collect();
    out.push_str("...");
    out
}
