use crate::api::{ApiError, CustomerSource};
use crate::model::ClusterSummary;

use super::Commit;

/// Cluster statistics shown by the segment picker.
///
/// Has its own request generation, independent from the customer listing.
#[derive(Debug, Clone, Default)]
pub struct ClusterCatalog {
    summaries: Vec<ClusterSummary>,
    loading: bool,
    error: Option<String>,
    generation: u64,
    loaded_once: bool,
}

impl ClusterCatalog {
    pub fn summaries(&self) -> &[ClusterSummary] {
        &self.summaries
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True once any stats request has completed, successfully or not.
    pub fn has_loaded(&self) -> bool {
        self.loaded_once
    }

    pub fn find(&self, cluster_id: u32) -> Option<&ClusterSummary> {
        self.summaries
            .iter()
            .find(|summary| summary.cluster_id == cluster_id)
    }

    /// Start a stats fetch and return its generation.
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.loading = true;
        tracing::debug!(generation = self.generation, "cluster_stats_begin");
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<Vec<ClusterSummary>, ApiError>,
    ) -> Commit {
        if !self.is_current(generation) {
            tracing::debug!(
                generation,
                current = self.generation,
                "cluster_stats_discarded"
            );
            return Commit::Stale;
        }
        self.loading = false;
        self.loaded_once = true;
        match result {
            Ok(summaries) => {
                tracing::debug!(generation, clusters = summaries.len(), "cluster_stats_loaded");
                self.summaries = summaries;
                self.error = None;
                Commit::Applied
            }
            Err(err) => {
                tracing::error!(generation, error = %err, "cluster_stats_failed");
                self.error = Some(err.to_string());
                Commit::Failed
            }
        }
    }

    pub async fn load<S>(&mut self, source: &S) -> Commit
    where
        S: CustomerSource + ?Sized,
    {
        let generation = self.begin();
        let result = source.cluster_stats().await;
        self.complete(generation, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Operation;
    use crate::model::ClusterStats;

    fn summary(cluster_id: u32) -> ClusterSummary {
        ClusterSummary {
            cluster_id,
            cluster_name: format!("Segment {cluster_id}"),
            customer_count: 3,
            stats: ClusterStats {
                avg_age: 40.0,
                avg_premium: 100.0,
                avg_accidents: 0.5,
                avg_years_license: None,
            },
        }
    }

    #[test]
    fn older_stats_response_is_discarded() {
        let mut catalog = ClusterCatalog::default();
        let first = catalog.begin();
        let second = catalog.begin();
        assert_eq!(
            catalog.complete(second, Ok(vec![summary(1), summary(2)])),
            Commit::Applied
        );
        assert_eq!(catalog.complete(first, Ok(vec![summary(9)])), Commit::Stale);
        assert_eq!(catalog.summaries().len(), 2);
        assert!(catalog.find(9).is_none());
        assert!(!catalog.is_loading());
    }

    #[test]
    fn failure_keeps_previous_summaries() {
        let mut catalog = ClusterCatalog::default();
        let generation = catalog.begin();
        catalog.complete(generation, Ok(vec![summary(1)]));
        let generation = catalog.begin();
        let err = ApiError::Status {
            operation: Operation::ClusterStats,
            status: 500,
            detail: None,
        };
        assert_eq!(catalog.complete(generation, Err(err)), Commit::Failed);
        assert_eq!(
            catalog.error(),
            Some("Failed to fetch cluster statistics: HTTP 500")
        );
        assert_eq!(catalog.summaries().len(), 1);
        assert!(catalog.has_loaded());
    }
}
