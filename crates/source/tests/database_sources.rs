//! REST, RPC and join sources against an in-process HTTP backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use mailsync_core::config::{SourceDescriptor, TableQuery};
use mailsync_core::{ImportConfig, ImportError, RecordPosition, SourceKey};
use mailsync_source::rest::{RestConnection, RestTableSource, RpcSource};
use mailsync_source::{collect_records, open_source, ContactSource};

// ============================================================================
// Test backend
// ============================================================================

#[derive(Clone)]
struct Backend {
    tables: Arc<HashMap<String, Vec<Value>>>,
    /// Ignore limit/offset and return the whole table.
    ignore_paging: bool,
    requests: Arc<AtomicUsize>,
}

async fn table_handler(
    State(backend): State<Backend>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    backend.requests.fetch_add(1, Ordering::SeqCst);
    if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some("service-key") {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let rows = backend.tables.get(&table).ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    if backend.ignore_paging {
        return Ok(Json(Value::Array(rows.clone())));
    }
    let limit: usize = params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(rows.len());
    let offset: usize = params.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let page: Vec<Value> = rows.iter().skip(offset).take(limit).cloned().collect();
    Ok(Json(Value::Array(page)))
}

async fn rpc_handler(
    Path(function): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if function != "exec_sql" {
        return Err(StatusCode::NOT_FOUND);
    }
    let query = body.get("query").and_then(Value::as_str).unwrap_or_default();
    if !query.starts_with("SELECT") {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Json(json!([
        { "email": "a@x.com", "name": "Jo" },
        { "email": "b@x.com", "name": null },
    ])))
}

async fn spawn_backend(tables: HashMap<String, Vec<Value>>, ignore_paging: bool) -> (String, Arc<AtomicUsize>) {
    let requests = Arc::new(AtomicUsize::new(0));
    let backend = Backend {
        tables: Arc::new(tables),
        ignore_paging,
        requests: requests.clone(),
    };
    let app = Router::new()
        .route("/rest/v1/rpc/{function}", post(rpc_handler))
        .route("/rest/v1/{table}", get(table_handler))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), requests)
}

fn users(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| json!({ "id": format!("u{i}"), "email": format!("user{i}@x.com") }))
        .collect()
}

fn connection(base: &str) -> RestConnection {
    RestConnection::new(base, "service-key").unwrap()
}

fn paged(table: &str, page_size: usize) -> TableQuery {
    TableQuery {
        page_size,
        ..TableQuery::new(table)
    }
}

// ============================================================================
// REST table
// ============================================================================

#[tokio::test]
async fn rest_table_reads_every_page() {
    let (base, requests) = spawn_backend(HashMap::from([("users".into(), users(25))]), false).await;
    let mut source = RestTableSource::new(connection(&base), paged("users", 10));

    let records = collect_records(&mut source).await.unwrap();

    assert_eq!(records.len(), 25);
    assert_eq!(records[24].get(&SourceKey::Name("email".into())), Some("user24@x.com"));
    assert_eq!(records[24].position, RecordPosition::Index(24));
    // 10 + 10 + 5: the short page ends the read
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn rest_table_exact_multiple_needs_one_empty_page() {
    let (base, requests) = spawn_backend(HashMap::from([("users".into(), users(20))]), false).await;
    let mut source = RestTableSource::new(connection(&base), paged("users", 10));

    assert_eq!(collect_records(&mut source).await.unwrap().len(), 20);
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn rest_table_without_paging_support_is_read_once() {
    let (base, requests) = spawn_backend(HashMap::from([("users".into(), users(25))]), true).await;
    let mut source = RestTableSource::new(connection(&base), paged("users", 10));

    assert_eq!(collect_records(&mut source).await.unwrap().len(), 25);
    assert_eq!(requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rest_table_server_error_is_source_unavailable() {
    let (base, _) = spawn_backend(HashMap::new(), false).await;
    let mut source = RestTableSource::new(connection(&base), paged("missing", 10));

    let err = collect_records(&mut source).await.unwrap_err();
    assert!(matches!(err, ImportError::SourceUnavailable(_)));
}

#[tokio::test]
async fn rest_table_bad_key_is_source_unavailable() {
    let (base, _) = spawn_backend(HashMap::from([("users".into(), users(1))]), false).await;
    let conn = RestConnection::new(&base, "wrong").unwrap();
    let mut source = RestTableSource::new(conn, paged("users", 10));

    assert!(matches!(
        source.next_record().await,
        Err(ImportError::SourceUnavailable(_))
    ));
}

// ============================================================================
// RPC
// ============================================================================

#[tokio::test]
async fn rpc_source_returns_all_rows() {
    let (base, _) = spawn_backend(HashMap::new(), false).await;
    let mut source = RpcSource::new(connection(&base), "exec_sql", "SELECT email, name FROM users");

    let records = collect_records(&mut source).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get(&SourceKey::Name("name".into())), Some("Jo"));
    assert_eq!(records[1].get(&SourceKey::Name("name".into())), None);
}

#[tokio::test]
async fn rpc_rejection_is_source_unavailable() {
    let (base, _) = spawn_backend(HashMap::new(), false).await;
    let mut source = RpcSource::new(connection(&base), "exec_sql", "DROP TABLE users");

    assert!(matches!(
        source.next_record().await,
        Err(ImportError::SourceUnavailable(_))
    ));
}

// ============================================================================
// Join through open_source
// ============================================================================

#[tokio::test]
async fn joined_descriptor_merges_profiles() {
    let profiles = vec![
        json!({ "user_id": "u0", "display_name": "Zero", "country": "NL" }),
        json!({ "user_id": "u2", "display_name": "Two" }),
    ];
    let (base, _) = spawn_backend(
        HashMap::from([("users".into(), users(3)), ("profiles".into(), profiles)]),
        false,
    )
    .await;

    let mut config = ImportConfig::for_profile("SOURCE_IT_UNUSED");
    config.supabase.url = Some(base);
    config.supabase.service_key = Some("service-key".into());

    let descriptor = SourceDescriptor::Joined {
        identity: Box::new(SourceDescriptor::RestTable(paged("users", 100))),
        profile: Box::new(SourceDescriptor::RestTable(paged("profiles", 100))),
        identity_key: "id".into(),
        profile_key: "user_id".into(),
    };

    let mut source = open_source(&descriptor, &config).unwrap();
    let records = collect_records(source.as_mut()).await.unwrap();

    let names: Vec<Option<&str>> = records
        .iter()
        .map(|r| r.get(&SourceKey::Name("display_name".into())))
        .collect();
    assert_eq!(names, vec![Some("Zero"), None, Some("Two")]);
    assert_eq!(records[0].get(&SourceKey::Name("country".into())), Some("NL"));
}
