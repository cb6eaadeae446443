//! Backend access for the customer analytics service.
//!
//! [`CustomerSource`] is the seam the view controller talks to; [`ApiClient`]
//! is the HTTP implementation. Tests substitute scripted sources.

pub mod client;
pub mod debug;

pub use client::ApiClient;
pub use debug::send_api_request;

use std::fmt;

use async_trait::async_trait;

use crate::model::{ClusterSummary, CustomerRecord};

/// The backend call an error came from. Its display form is the message shown
/// to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Browse,
    Search,
    ClusterFilter,
    ClusterStats,
}

impl Operation {
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::Browse => "Failed to fetch customers",
            Operation::Search => "Failed to search customers",
            Operation::ClusterFilter => "Failed to fetch customers by cluster",
            Operation::ClusterStats => "Failed to fetch cluster statistics",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.failure_message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("{operation}: HTTP {status}{}", detail_suffix(.detail))]
    Status {
        operation: Operation,
        status: u16,
        detail: Option<String>,
    },
    #[error("{operation}: {message}")]
    Transport {
        operation: Operation,
        message: String,
    },
    #[error("{operation}: invalid response: {message}")]
    Decode {
        operation: Operation,
        message: String,
    },
    #[error("invalid API base URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|detail| format!(" ({detail})"))
        .unwrap_or_default()
}

impl ApiError {
    pub fn operation(&self) -> Option<Operation> {
        match self {
            ApiError::Status { operation, .. }
            | ApiError::Transport { operation, .. }
            | ApiError::Decode { operation, .. } => Some(*operation),
            ApiError::InvalidBaseUrl { .. } => None,
        }
    }
}

/// One customer listing request, as issued by a mode-entry operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Browse { limit: u32 },
    Search { query: String, top_k: u32 },
    ClusterFilter { cluster_id: Option<u32>, limit: u32 },
}

impl Query {
    pub fn operation(&self) -> Operation {
        match self {
            Query::Browse { .. } => Operation::Browse,
            Query::Search { .. } => Operation::Search,
            Query::ClusterFilter { .. } => Operation::ClusterFilter,
        }
    }

    pub async fn run<S>(&self, source: &S) -> Result<Vec<CustomerRecord>, ApiError>
    where
        S: CustomerSource + ?Sized,
    {
        match self {
            Query::Browse { limit } => source.customers(*limit).await,
            Query::Search { query, top_k } => source.search(query, *top_k).await,
            Query::ClusterFilter { cluster_id, limit } => {
                source.customers_by_cluster(*cluster_id, *limit).await
            }
        }
    }
}

#[async_trait]
pub trait CustomerSource: Send + Sync {
    async fn customers(&self, limit: u32) -> Result<Vec<CustomerRecord>, ApiError>;

    async fn search(&self, query: &str, top_k: u32) -> Result<Vec<CustomerRecord>, ApiError>;

    async fn customers_by_cluster(
        &self,
        cluster_id: Option<u32>,
        limit: u32,
    ) -> Result<Vec<CustomerRecord>, ApiError>;

    async fn cluster_stats(&self) -> Result<Vec<ClusterSummary>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_includes_backend_detail() {
        let err = ApiError::Status {
            operation: Operation::Browse,
            status: 500,
            detail: Some("Error querying BigQuery".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Failed to fetch customers: HTTP 500 (Error querying BigQuery)"
        );
    }

    #[test]
    fn status_error_without_detail() {
        let err = ApiError::Status {
            operation: Operation::ClusterStats,
            status: 404,
            detail: None,
        };
        assert_eq!(err.to_string(), "Failed to fetch cluster statistics: HTTP 404");
        assert_eq!(err.operation(), Some(Operation::ClusterStats));
    }
}
