use crate::api::{ApiError, CustomerSource, Query};
use crate::model::CustomerRecord;

use super::{
    DEFAULT_BROWSE_LIMIT, DEFAULT_CLUSTER_LIMIT, Mode, ResultSet, TopK, ValidationError,
    ViewState, validate_query,
};

/// A request issued by a mode-entry operation. Hand it to a task, run the
/// query, and give the result back to [`Controller::complete`] together with
/// the generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub generation: u64,
    pub query: Query,
}

impl Ticket {
    pub async fn run<S>(&self, source: &S) -> Result<Vec<CustomerRecord>, ApiError>
    where
        S: CustomerSource + ?Sized,
    {
        self.query.run(source).await
    }
}

/// What [`Controller::complete`] did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    Applied,
    Failed,
    Stale,
}

/// State machine over the three retrieval modes.
///
/// Every `begin_*` call bumps the generation; only the completion carrying
/// the latest generation is committed.
#[derive(Debug, Clone)]
pub struct Controller {
    state: ViewState,
    generation: u64,
    browse_limit: u32,
    cluster_limit: u32,
    last_query: Option<Query>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(DEFAULT_BROWSE_LIMIT, DEFAULT_CLUSTER_LIMIT)
    }
}

impl Controller {
    pub fn new(browse_limit: u32, cluster_limit: u32) -> Self {
        Self {
            state: ViewState::default(),
            generation: 0,
            browse_limit,
            cluster_limit,
            last_query: None,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn browse_limit(&self) -> u32 {
        self.browse_limit
    }

    pub fn cluster_limit(&self) -> u32 {
        self.cluster_limit
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn begin_browse(&mut self, limit: Option<u32>) -> Ticket {
        let limit = limit.unwrap_or(self.browse_limit);
        self.begin(Query::Browse { limit })
    }

    /// Fails without touching any state when the trimmed query is too short.
    pub fn begin_search(&mut self, query: &str, top_k: TopK) -> Result<Ticket, ValidationError> {
        let query = validate_query(query)?.to_string();
        self.state.top_k = top_k;
        Ok(self.begin(Query::Search {
            query,
            top_k: top_k.get(),
        }))
    }

    /// `None` lists customers across every cluster.
    pub fn begin_cluster_filter(&mut self, cluster_id: Option<u32>, limit: Option<u32>) -> Ticket {
        let limit = limit.unwrap_or(self.cluster_limit);
        self.begin(Query::ClusterFilter { cluster_id, limit })
    }

    /// Re-issue the last query, or the default browse query if none was
    /// issued yet.
    pub fn begin_refresh(&mut self) -> Ticket {
        let query = self.last_query.clone().unwrap_or(Query::Browse {
            limit: self.browse_limit,
        });
        self.begin(query)
    }

    fn begin(&mut self, query: Query) -> Ticket {
        self.generation += 1;
        let state = &mut self.state;
        state.loading = true;
        match &query {
            Query::Browse { .. } => {
                state.mode = Mode::Browse;
                state.search_query.clear();
                state.selected_cluster_id = None;
            }
            Query::Search { query, .. } => {
                state.mode = Mode::Search;
                state.search_query = query.clone();
                state.selected_cluster_id = None;
            }
            Query::ClusterFilter { cluster_id, .. } => {
                state.mode = Mode::ClusterFilter;
                state.search_query.clear();
                state.selected_cluster_id = *cluster_id;
            }
        }
        tracing::debug!(
            generation = self.generation,
            mode = %state.mode,
            query = ?query,
            "view_request_begin"
        );
        self.last_query = Some(query.clone());
        Ticket {
            generation: self.generation,
            query,
        }
    }

    /// Commit a finished request if it is still the latest one.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<Vec<CustomerRecord>, ApiError>,
    ) -> Commit {
        if !self.is_current(generation) {
            tracing::debug!(
                generation,
                current = self.generation,
                "view_request_discarded"
            );
            return Commit::Stale;
        }
        let state = &mut self.state;
        state.loading = false;
        match result {
            Ok(records) => {
                tracing::debug!(
                    generation,
                    mode = %state.mode,
                    records = records.len(),
                    "view_request_applied"
                );
                state.records = ResultSet::new(records, generation);
                state.error = None;
                Commit::Applied
            }
            Err(err) => {
                tracing::error!(
                    generation,
                    mode = %state.mode,
                    error = %err,
                    "view_request_failed"
                );
                state.error = Some(err.to_string());
                Commit::Failed
            }
        }
    }

    pub async fn enter_browse<S>(&mut self, source: &S, limit: Option<u32>) -> Commit
    where
        S: CustomerSource + ?Sized,
    {
        let ticket = self.begin_browse(limit);
        self.finish(source, ticket).await
    }

    pub async fn enter_search<S>(
        &mut self,
        source: &S,
        query: &str,
        top_k: TopK,
    ) -> Result<Commit, ValidationError>
    where
        S: CustomerSource + ?Sized,
    {
        let ticket = self.begin_search(query, top_k)?;
        Ok(self.finish(source, ticket).await)
    }

    pub async fn enter_cluster_filter<S>(
        &mut self,
        source: &S,
        cluster_id: Option<u32>,
        limit: Option<u32>,
    ) -> Commit
    where
        S: CustomerSource + ?Sized,
    {
        let ticket = self.begin_cluster_filter(cluster_id, limit);
        self.finish(source, ticket).await
    }

    async fn finish<S>(&mut self, source: &S, ticket: Ticket) -> Commit
    where
        S: CustomerSource + ?Sized,
    {
        let result = ticket.run(source).await;
        self.complete(ticket.generation, result)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;
    use crate::api::Operation;
    use crate::model::{ClusterSummary, Column};

    type Reply = Result<Vec<CustomerRecord>, ApiError>;

    /// Source whose responses are released by the test, keyed by the
    /// request path, so completions can be forced into any order.
    #[derive(Default)]
    struct GatedSource {
        gates: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
        calls: Mutex<Vec<String>>,
    }

    impl GatedSource {
        fn gate(&self, key: &str) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.gates
                .lock()
                .expect("gates lock")
                .insert(key.to_string(), rx);
            tx
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }

        async fn reply(&self, key: String) -> Reply {
            self.calls.lock().expect("calls lock").push(key.clone());
            let rx = self.gates.lock().expect("gates lock").remove(&key);
            match rx {
                Some(rx) => rx.await.expect("gate dropped"),
                None => Ok(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CustomerSource for GatedSource {
        async fn customers(&self, limit: u32) -> Reply {
            self.reply(format!("browse:{limit}")).await
        }

        async fn search(&self, query: &str, top_k: u32) -> Reply {
            self.reply(format!("search:{query}:{top_k}")).await
        }

        async fn customers_by_cluster(&self, cluster_id: Option<u32>, limit: u32) -> Reply {
            self.reply(format!("cluster:{cluster_id:?}:{limit}")).await
        }

        async fn cluster_stats(&self) -> Result<Vec<ClusterSummary>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn records(names: &[&str]) -> Vec<CustomerRecord> {
        names
            .iter()
            .map(|id| serde_json::from_value(json!({"customer_id": id})).expect("record"))
            .collect()
    }

    fn ids(controller: &Controller) -> Vec<String> {
        controller
            .state()
            .records()
            .records()
            .iter()
            .filter_map(CustomerRecord::customer_id)
            .collect()
    }

    #[tokio::test]
    async fn browse_passes_limit_only() {
        let source = GatedSource::default();
        let mut controller = Controller::default();
        let commit = controller.enter_browse(&source, None).await;
        assert_eq!(commit, Commit::Applied);
        assert_eq!(source.calls(), vec!["browse:100"]);
        assert_eq!(controller.state().mode(), Mode::Browse);
        assert!(!controller.state().is_loading());

        controller.enter_browse(&source, Some(25)).await;
        assert_eq!(source.calls().last().map(String::as_str), Some("browse:25"));
    }

    #[tokio::test]
    async fn short_query_never_reaches_source() {
        let source = GatedSource::default();
        let mut controller = Controller::default();
        controller.enter_browse(&source, None).await;
        let before = controller.state().clone();
        let generation = controller.generation();

        let result = controller.enter_search(&source, " ab ", TopK::default()).await;
        assert_eq!(result, Err(ValidationError::QueryTooShort { min: 3 }));
        assert_eq!(source.calls(), vec!["browse:100"]);
        assert_eq!(controller.state(), &before);
        assert_eq!(controller.generation(), generation);
    }

    #[tokio::test]
    async fn last_issued_request_wins_when_older_resolves_later() {
        let source = Arc::new(GatedSource::default());
        let slow = source.gate("browse:100");
        let fast = source.gate("search:young drivers:10");

        let mut controller = Controller::default();
        let first = controller.begin_browse(None);
        let second = controller
            .begin_search("young drivers", TopK::new(10).expect("valid top k"))
            .expect("valid query");
        assert!(controller.state().is_loading());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for ticket in [first.clone(), second.clone()] {
            let source = source.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = ticket.run(source.as_ref()).await;
                let _ = tx.send((ticket.generation, result));
            });
        }

        fast.send(Ok(records(&["new"]))).expect("send fast");
        let (generation, result) = rx.recv().await.expect("fast completion");
        assert_eq!(generation, second.generation);
        assert_eq!(controller.complete(generation, result), Commit::Applied);

        slow.send(Ok(records(&["old"]))).expect("send slow");
        let (generation, result) = rx.recv().await.expect("slow completion");
        assert_eq!(generation, first.generation);
        assert_eq!(controller.complete(generation, result), Commit::Stale);

        assert_eq!(ids(&controller), vec!["new"]);
        assert_eq!(controller.state().mode(), Mode::Search);
        assert!(!controller.state().is_loading());
    }

    #[tokio::test]
    async fn last_issued_request_wins_when_older_resolves_first() {
        let source = Arc::new(GatedSource::default());
        let browse = source.gate("browse:100");
        let search = source.gate("search:safe drivers:5");
        let cluster = source.gate("cluster:Some(4):10");

        let mut controller = Controller::default();
        let first = controller.begin_browse(None);
        let second = controller
            .begin_search("safe drivers", TopK::default())
            .expect("valid query");
        let third = controller.begin_cluster_filter(Some(4), None);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for ticket in [first.clone(), second.clone(), third.clone()] {
            let source = source.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = ticket.run(source.as_ref()).await;
                let _ = tx.send((ticket.generation, result));
            });
        }

        browse.send(Ok(records(&["a"]))).expect("send browse");
        let (generation, result) = rx.recv().await.expect("browse completion");
        assert_eq!(generation, first.generation);
        assert_eq!(controller.complete(generation, result), Commit::Stale);
        assert!(controller.state().is_loading());
        assert!(controller.state().records().is_empty());

        cluster.send(Ok(records(&["c"]))).expect("send cluster");
        let (generation, result) = rx.recv().await.expect("cluster completion");
        assert_eq!(generation, third.generation);
        assert_eq!(controller.complete(generation, result), Commit::Applied);

        search.send(Ok(records(&["b"]))).expect("send search");
        let (generation, result) = rx.recv().await.expect("search completion");
        assert_eq!(generation, second.generation);
        assert_eq!(controller.complete(generation, result), Commit::Stale);

        assert_eq!(ids(&controller), vec!["c"]);
        assert_eq!(controller.state().mode(), Mode::ClusterFilter);
        assert_eq!(controller.state().selected_cluster_id(), Some(4));
        assert!(!controller.state().is_loading());
    }

    #[tokio::test]
    async fn stale_completion_does_not_clear_loading() {
        let mut controller = Controller::default();
        let first = controller.begin_browse(None);
        let _second = controller.begin_cluster_filter(None, None);
        let failure = Err(ApiError::Transport {
            operation: Operation::Browse,
            message: "boom".to_string(),
        });
        assert_eq!(controller.complete(first.generation, failure), Commit::Stale);
        assert!(controller.state().is_loading());
        assert_eq!(controller.state().error(), None);
    }

    #[tokio::test]
    async fn failure_keeps_records_and_sets_error() {
        let source = Arc::new(GatedSource::default());
        let mut controller = Controller::default();
        let ok = source.gate("browse:100");
        ok.send(Ok(records(&["a", "b"]))).expect("send");
        controller.enter_browse(source.as_ref(), None).await;

        let failed = source.gate("cluster:Some(2):10");
        failed
            .send(Err(ApiError::Status {
                operation: Operation::ClusterFilter,
                status: 502,
                detail: None,
            }))
            .expect("send");
        let commit = controller
            .enter_cluster_filter(source.as_ref(), Some(2), None)
            .await;
        assert_eq!(commit, Commit::Failed);
        assert_eq!(ids(&controller), vec!["a", "b"]);
        assert_eq!(
            controller.state().error(),
            Some("Failed to fetch customers by cluster: HTTP 502")
        );
        assert!(!controller.state().is_loading());
        assert_eq!(controller.state().selected_cluster_id(), Some(2));
    }

    #[tokio::test]
    async fn success_clears_previous_error() {
        let source = Arc::new(GatedSource::default());
        let mut controller = Controller::default();
        let failed = source.gate("browse:100");
        failed
            .send(Err(ApiError::Transport {
                operation: Operation::Browse,
                message: "timeout".to_string(),
            }))
            .expect("send");
        controller.enter_browse(source.as_ref(), None).await;
        assert!(controller.state().error().is_some());

        let ticket = controller.begin_refresh();
        let result = ticket.run(source.as_ref()).await;
        controller.complete(ticket.generation, result);
        assert_eq!(controller.state().error(), None);
    }

    #[tokio::test]
    async fn entering_search_clears_selected_cluster() {
        let source = GatedSource::default();
        let mut controller = Controller::default();
        controller
            .enter_cluster_filter(&source, Some(3), None)
            .await;
        assert_eq!(controller.state().selected_cluster_id(), Some(3));
        assert_eq!(controller.state().title(), "Customers in Selected Segment");

        controller
            .enter_search(&source, "high premium", TopK::default())
            .await
            .expect("valid query");
        assert_eq!(controller.state().mode(), Mode::Search);
        assert_eq!(controller.state().selected_cluster_id(), None);
        assert_eq!(controller.state().search_query(), "high premium");
        assert_eq!(
            source.calls(),
            vec!["cluster:Some(3):10", "search:high premium:5"]
        );

        controller.enter_cluster_filter(&source, None, None).await;
        assert_eq!(controller.state().search_query(), "");
        assert_eq!(controller.state().title(), "All Customer Segments");
    }

    #[tokio::test]
    async fn refresh_repeats_current_query() {
        let source = GatedSource::default();
        let mut controller = Controller::default();
        let ticket = controller.begin_refresh();
        assert_eq!(ticket.query, Query::Browse { limit: 100 });

        controller
            .enter_search(&source, "  commuters ", TopK::new(20).expect("valid top k"))
            .await
            .expect("valid query");
        let ticket = controller.begin_refresh();
        assert_eq!(
            ticket.query,
            Query::Search {
                query: "commuters".to_string(),
                top_k: 20
            }
        );
        assert_eq!(controller.state().mode(), Mode::Search);
    }

    #[tokio::test]
    async fn shape_is_recomputed_per_commit() {
        let source = Arc::new(GatedSource::default());
        let mut controller = Controller::default();
        let search = source.gate("search:family cars:5");
        search
            .send(Ok(vec![
                serde_json::from_value(json!({"customer_id": "a", "similarity_score": 0.1}))
                    .expect("record"),
            ]))
            .expect("send");
        controller
            .enter_search(source.as_ref(), "family cars", TopK::default())
            .await
            .expect("valid query");
        assert!(controller.state().records().shape().has_column(Column::Similarity));

        controller.enter_browse(source.as_ref(), None).await;
        let shape = controller.state().records().shape();
        assert!(shape.is_empty());
        assert!(shape.headers().is_empty());
    }
}
