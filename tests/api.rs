use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use segscope::api::{ApiClient, ApiError, CustomerSource, Operation};
use segscope::view::{Commit, Controller, TopK};
use tiny_http::{Header, Response, Server};

type Handler = fn(&str) -> (u16, &'static str);

/// Local HTTP server answering every request with `handler(url)`. Returns
/// the base URL and the list of request URLs seen so far.
fn serve(handler: Handler) -> (String, Arc<Mutex<Vec<String>>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    thread::spawn(move || {
        for request in server.incoming_requests() {
            let url = request.url().to_string();
            log.lock().unwrap().push(url.clone());
            let (status, body) = handler(&url);
            let header = Header::from_bytes("Content-Type", "application/json").unwrap();
            let response = Response::from_string(body)
                .with_status_code(status)
                .with_header(header);
            let _ = request.respond(response);
        }
    });
    (format!("http://127.0.0.1:{port}/"), seen)
}

fn client(base_url: &str) -> ApiClient {
    ApiClient::new(base_url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn browse_decodes_customer_rows() {
    let (base_url, seen) = serve(|_| {
        (
            200,
            r#"[{"customer_id":"c-1","age":42,"premium":812.5,"car_brand":"Volvo"},
                {"customer_id":"c-2","age":null}]"#,
        )
    });
    let api = client(&base_url);
    let records = api.customers(25).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].customer_id().as_deref(), Some("c-1"));
    assert_eq!(records[0].number("premium"), Some(812.5));
    assert!(!records[1].has("age"));
    assert_eq!(seen.lock().unwrap().as_slice(), ["/customers?limit=25"]);
}

#[tokio::test]
async fn search_sends_encoded_query() {
    let (base_url, seen) = serve(|_| (200, "[]"));
    let api = client(&base_url);
    let mut controller = Controller::default();
    let commit = controller
        .enter_search(&api, "  young drivers & sports cars ", TopK::new(10).unwrap())
        .await
        .unwrap();
    assert_eq!(commit, Commit::Applied);
    assert!(controller.state().records().is_empty());
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        ["/customers/search?query=young%20drivers%20%26%20sports%20cars&top_k=10"]
    );
}

#[tokio::test]
async fn cluster_filter_omits_missing_cluster() {
    let (base_url, seen) = serve(|_| (200, "[]"));
    let api = client(&base_url);
    api.customers_by_cluster(None, 10).await.unwrap();
    api.customers_by_cluster(Some(3), 10).await.unwrap();
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        [
            "/customers/clusters?limit=10",
            "/customers/clusters?limit=10&cluster_id=3"
        ]
    );
}

#[tokio::test]
async fn non_success_status_carries_backend_detail() {
    let (base_url, _) = serve(|_| (503, r#"{"detail":"Vector store unavailable"}"#));
    let api = client(&base_url);
    let err = api.search("careful", 5).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Status {
            operation: Operation::Search,
            status: 503,
            detail: Some("Vector store unavailable".to_string()),
        }
    );
    assert_eq!(
        err.to_string(),
        "Failed to search customers: HTTP 503 (Vector store unavailable)"
    );
}

#[tokio::test]
async fn failed_request_keeps_previous_rows() {
    let (base_url, _) = serve(|url| {
        if url.starts_with("/customers?") {
            (200, r#"[{"customer_id":"c-1"}]"#)
        } else {
            (500, "Internal Server Error")
        }
    });
    let api = client(&base_url);
    let mut controller = Controller::default();
    assert_eq!(controller.enter_browse(&api, None).await, Commit::Applied);
    assert_eq!(
        controller.enter_cluster_filter(&api, Some(1), None).await,
        Commit::Failed
    );
    let state = controller.state();
    assert_eq!(state.records().len(), 1);
    assert!(
        state
            .error()
            .is_some_and(|err| err.starts_with("Failed to fetch customers by cluster: HTTP 500"))
    );
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let (base_url, _) = serve(|_| (200, r#"{"not":"a list"}"#));
    let api = client(&base_url);
    let err = api.customers(5).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Decode {
            operation: Operation::Browse,
            ..
        }
    ));
}

#[tokio::test]
async fn cluster_stats_are_ordered_by_id() {
    let (base_url, seen) = serve(|_| {
        (
            200,
            r#"{"clusters":{
                "2":{"cluster_name":"Urban commuters","customer_count":40,
                     "stats":{"avg_age":31.2,"avg_premium":640.0,"avg_accidents":0.4}},
                "0":{"cluster_name":"Family drivers","customer_count":55,
                     "stats":{"avg_age":44.0,"avg_premium":720.25,"avg_accidents":0.1}}
            }}"#,
        )
    });
    let api = client(&base_url);
    let summaries = api.cluster_stats().await.unwrap();
    let names: Vec<&str> = summaries.iter().map(|s| s.cluster_name.as_str()).collect();
    assert_eq!(names, ["Family drivers", "Urban commuters"]);
    assert_eq!(summaries[0].stats.avg_premium_label(), "$720.25");
    assert_eq!(seen.lock().unwrap().as_slice(), ["/clusters/stats"]);
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    // bind and drop to get a port nobody listens on
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let api = client(&format!("http://127.0.0.1:{port}"));
    let err = api.customers(5).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Transport {
            operation: Operation::Browse,
            ..
        }
    ));
}
