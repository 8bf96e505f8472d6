use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use emberlog_client::{ClientError, IncidentsApi};
use emberlog_core::{ApiConfig, IncidentQuery};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type SeenQueries = Arc<Mutex<Vec<String>>>;

fn item(id: i64, incident_type: &str) -> Value {
    json!({
        "id": id,
        "dispatched_at": "2025-09-29T04:22:12Z",
        "incident_type": incident_type,
        "address": "I-10 & 7th Ave, Phoenix, AZ",
        "units": ["E3", "R3"],
        "channel": "MCSO White Tanks",
        "source_audio": null,
        "transcript": "Engine 3, Rescue 3, motor vehicle accident."
    })
}

async fn list_incidents(State(seen): State<SeenQueries>, RawQuery(query): RawQuery) -> Json<Value> {
    seen.lock().unwrap().push(query.unwrap_or_default());
    Json(json!({
        "items": [item(103, "MVA"), { "id": 104, "units": "bad" }, item(105, "MVA")],
        "total": 12,
        "page": 2,
        "page_size": 10
    }))
}

async fn server_error() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable")
}

async fn missing_items() -> Json<Value> {
    Json(json!({ "total": 0, "page": 1, "page_size": 50 }))
}

async fn not_json() -> &'static str {
    "<html>maintenance</html>"
}

async fn spawn_server(app: Router) -> ApiConfig {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    ApiConfig::new(&format!("http://{addr}/")).unwrap()
}

#[tokio::test]
async fn test_fetch_page_encodes_filters_and_drops_bad_items() {
    let seen: SeenQueries = Arc::default();
    let app = Router::new()
        .route("/api/v1/incidents", get(list_incidents))
        .with_state(Arc::clone(&seen));
    let api = IncidentsApi::new(&spawn_server(app).await).unwrap();

    let query = IncidentQuery {
        page: 2,
        page_size: 10,
        incident_type: Some("MVA".to_string()),
        channel: Some("MCSO White Tanks".to_string()),
        address_search: Some(" 7th Ave ".to_string()),
        units: vec!["E3".to_string(), "R3".to_string()],
        ..Default::default()
    };
    let page = api.fetch_page(&query).await.unwrap();

    let ids: Vec<i64> = page.items.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![103, 105]);
    assert_eq!(page.rejected, 1);
    assert_eq!(page.total, Some(12));
    assert_eq!(page.page, 2);
    assert_eq!(page.page_size, 10);
    assert_eq!(page.total_pages(), Some(2));
    assert!(!page.has_next());

    let raw = seen.lock().unwrap()[0].clone();
    assert!(raw.starts_with("page=2&page_size=10"));
    assert!(raw.contains("incident_type=MVA"));
    assert!(raw.contains("address_search=7th+Ave"));
    assert!(raw.contains("channel=MCSO+White+Tanks"));
    assert!(raw.contains("units=E3&units=R3"));
    assert!(!raw.contains("from_dispatched_at"));
}

#[tokio::test]
async fn test_http_failure_is_surfaced() {
    let app = Router::new().route("/api/v1/incidents", get(server_error));
    let api = IncidentsApi::new(&spawn_server(app).await).unwrap();

    let err = api.fetch_page(&IncidentQuery::default()).await.unwrap_err();
    match err {
        ClientError::Http { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "database unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_structurally_invalid_bodies() {
    let app = Router::new()
        .route("/api/v1/incidents", get(missing_items));
    let api = IncidentsApi::new(&spawn_server(app).await).unwrap();
    let err = api.fetch_page(&IncidentQuery::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidResponse(_)));

    let app = Router::new().route("/api/v1/incidents", get(not_json));
    let api = IncidentsApi::new(&spawn_server(app).await).unwrap();
    let err = api.fetch_page(&IncidentQuery::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidResponse(_)));
}
