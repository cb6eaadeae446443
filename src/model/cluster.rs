use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::format;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub avg_age: f64,
    pub avg_premium: f64,
    pub avg_accidents: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_years_license: Option<f64>,
}

impl ClusterStats {
    pub fn avg_age_label(&self) -> String {
        format::fixed(self.avg_age, 1)
    }

    pub fn avg_premium_label(&self) -> String {
        format::money(self.avg_premium)
    }

    pub fn avg_accidents_label(&self) -> String {
        format::fixed(self.avg_accidents, 2)
    }
}

/// One customer segment as reported by `/clusters/stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster_id: u32,
    pub cluster_name: String,
    pub customer_count: u64,
    pub stats: ClusterStats,
}

#[derive(Debug, Clone, Deserialize)]
struct ClusterEntry {
    cluster_name: String,
    customer_count: u64,
    stats: ClusterStats,
}

/// Body of `GET /clusters/stats`: `{ "clusters": { "<id>": {...} } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterStatsResponse {
    clusters: BTreeMap<String, ClusterEntry>,
}

impl ClusterStatsResponse {
    /// Summaries ordered by cluster id. Entries whose key is not a
    /// non-negative integer are dropped.
    pub fn into_summaries(self) -> Vec<ClusterSummary> {
        let mut summaries: Vec<ClusterSummary> = self
            .clusters
            .into_iter()
            .filter_map(|(key, entry)| {
                let Ok(cluster_id) = key.trim().parse::<u32>() else {
                    tracing::warn!(key = %key, "Ignoring cluster with non-numeric id");
                    return None;
                };
                Some(ClusterSummary {
                    cluster_id,
                    cluster_name: entry.cluster_name,
                    customer_count: entry.customer_count,
                    stats: entry.stats,
                })
            })
            .collect();
        summaries.sort_by_key(|summary| summary.cluster_id);
        summaries
    }
}
