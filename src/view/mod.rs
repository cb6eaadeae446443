//! View state for the customer dashboard.
//!
//! [`Controller`] owns the single [`ViewState`] of the process and is the
//! only thing that mutates it. Requests are tagged with a generation so that
//! a completion for a superseded request is discarded instead of committed.

pub mod clusters;
pub mod controller;
pub mod expansion;

pub use clusters::ClusterCatalog;
pub use controller::{Commit, Controller, Ticket};
pub use expansion::RowExpansion;

use std::fmt;

use crate::model::{CustomerRecord, ResultShape};

pub const DEFAULT_BROWSE_LIMIT: u32 = 100;
pub const DEFAULT_CLUSTER_LIMIT: u32 = 10;
pub const MIN_QUERY_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Browse,
    Search,
    ClusterFilter,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Browse => "browse",
            Mode::Search => "search",
            Mode::ClusterFilter => "cluster_filter",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of nearest neighbours requested by a semantic search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopK(u32);

impl TopK {
    pub const CHOICES: [u32; 4] = [5, 10, 15, 20];

    /// Returns `None` for values outside [`TopK::CHOICES`].
    pub fn new(value: u32) -> Option<Self> {
        Self::CHOICES.contains(&value).then_some(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// The next choice, wrapping around after the largest.
    pub fn next(self) -> Self {
        let pos = Self::CHOICES
            .iter()
            .position(|choice| *choice == self.0)
            .unwrap_or(0);
        Self(Self::CHOICES[(pos + 1) % Self::CHOICES.len()])
    }
}

impl Default for TopK {
    fn default() -> Self {
        Self(Self::CHOICES[0])
    }
}

impl fmt::Display for TopK {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Records of one committed request and the shape derived from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    records: Vec<CustomerRecord>,
    shape: ResultShape,
    generation: u64,
}

impl ResultSet {
    pub fn new(records: Vec<CustomerRecord>, generation: u64) -> Self {
        let shape = ResultShape::resolve(&records);
        Self {
            records,
            shape,
            generation,
        }
    }

    pub fn records(&self) -> &[CustomerRecord] {
        &self.records
    }

    pub fn shape(&self) -> &ResultShape {
        &self.shape
    }

    /// Generation of the request that produced these records. Zero before
    /// anything has been committed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CustomerRecord> {
        self.records.get(index)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub(crate) mode: Mode,
    pub(crate) search_query: String,
    pub(crate) top_k: TopK,
    pub(crate) selected_cluster_id: Option<u32>,
    pub(crate) records: ResultSet,
    pub(crate) loading: bool,
    pub(crate) error: Option<String>,
}

impl ViewState {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn top_k(&self) -> TopK {
        self.top_k
    }

    pub fn selected_cluster_id(&self) -> Option<u32> {
        self.selected_cluster_id
    }

    pub fn records(&self) -> &ResultSet {
        &self.records
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn title(&self) -> String {
        title(self.mode, &self.search_query, self.selected_cluster_id)
    }
}

/// Heading shown above the result table.
pub fn title(mode: Mode, search_query: &str, selected_cluster_id: Option<u32>) -> String {
    match mode {
        Mode::Search if !search_query.is_empty() => {
            format!("Search Results for: \"{search_query}\"")
        }
        Mode::ClusterFilter => match selected_cluster_id {
            None => "All Customer Segments".to_string(),
            Some(_) => "Customers in Selected Segment".to_string(),
        },
        _ => "All Customers".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("search query must be at least {min} characters")]
    QueryTooShort { min: usize },
}

/// Trimmed search text, or an error when it is too short to submit.
pub fn validate_query(query: &str) -> Result<&str, ValidationError> {
    let trimmed = query.trim();
    if trimmed.chars().count() < MIN_QUERY_LEN {
        return Err(ValidationError::QueryTooShort { min: MIN_QUERY_LEN });
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_follow_mode() {
        assert_eq!(title(Mode::Browse, "", None), "All Customers");
        assert_eq!(
            title(Mode::Search, "young drivers", None),
            "Search Results for: \"young drivers\""
        );
        assert_eq!(title(Mode::Search, "", None), "All Customers");
        assert_eq!(
            title(Mode::ClusterFilter, "", None),
            "All Customer Segments"
        );
        assert_eq!(
            title(Mode::ClusterFilter, "", Some(0)),
            "Customers in Selected Segment"
        );
    }

    #[test]
    fn top_k_cycles_through_choices() {
        let mut top_k = TopK::default();
        let mut seen = vec![top_k.get()];
        for _ in 0..4 {
            top_k = top_k.next();
            seen.push(top_k.get());
        }
        assert_eq!(seen, vec![5, 10, 15, 20, 5]);
        assert_eq!(TopK::new(7), None);
        assert_eq!(TopK::new(15).map(TopK::get), Some(15));
    }

    #[test]
    fn query_validation_counts_trimmed_chars() {
        assert!(validate_query("  ab  ").is_err());
        assert!(validate_query("").is_err());
        assert_eq!(validate_query(" abc ").unwrap(), "abc");
        assert_eq!(validate_query("äöü").unwrap(), "äöü");
    }
}
