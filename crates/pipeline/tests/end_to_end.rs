//! Full runs: file source, real HTTP client, in-process email service.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use mailsync_core::config::{FieldMap, PacingConfig, RetryConfig, SourceDescriptor};
use mailsync_core::{ImportConfig, ImportError, SchedulingMode, SourceKey};
use mailsync_pipeline::Importer;

#[derive(Clone, Default)]
struct Service {
    received: Arc<Mutex<Vec<Value>>>,
    calls: Arc<AtomicUsize>,
}

async fn create_contact(State(service): State<Service>, Json(body): Json<Value>) -> StatusCode {
    service.calls.fetch_add(1, Ordering::SeqCst);
    service.received.lock().unwrap().push(body);
    StatusCode::CREATED
}

async fn spawn_service() -> (String, Service) {
    let service = Service::default();
    let app = Router::new()
        .route("/v1/contacts", post(create_contact))
        .with_state(service.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), service)
}

fn csv_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn config(base_url: &str, path: PathBuf) -> ImportConfig {
    let mut cfg = ImportConfig::for_profile("END_TO_END_TEST");
    cfg.plunk.api_key = Some("sk_test".into());
    cfg.plunk.base_url = base_url.into();
    cfg.plunk.nest_attributes = false;
    cfg.source = Some(SourceDescriptor::DelimitedFile {
        path,
        delimiter: b',',
        skip_header: false,
    });
    cfg.field_map = FieldMap::default().with_attribute("name", SourceKey::Index(1));
    cfg.default_subscribed = true;
    cfg.pacing = PacingConfig {
        mode: SchedulingMode::ConcurrentBatch,
        batch_size: 10,
        delay: Duration::ZERO,
    };
    cfg.retry = RetryConfig {
        max_attempts: 3,
        backoff: Duration::from_millis(10),
        backoff_multiplier: 1.0,
        max_backoff: Duration::from_millis(10),
    };
    cfg
}

#[tokio::test]
async fn csv_import_skips_invalid_rows() {
    let (base, service) = spawn_service().await;
    let file = csv_file("a@x.com,Jo\nnot-an-email,Al\nb@x.com,Sam\n");

    let report = Importer::new(config(&base, file.path().to_path_buf()))
        .run()
        .await
        .unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped_invalid, 1);
    assert_eq!(service.calls.load(Ordering::SeqCst), 2);

    let mut emails: Vec<String> = service
        .received
        .lock()
        .unwrap()
        .iter()
        .map(|b| b["email"].as_str().unwrap_or_default().to_string())
        .collect();
    emails.sort();
    assert_eq!(emails, vec!["a@x.com", "b@x.com"]);
}

#[tokio::test]
async fn missing_api_key_makes_no_calls() {
    let (base, service) = spawn_service().await;
    let file = csv_file("a@x.com,Jo\n");
    let mut cfg = config(&base, file.path().to_path_buf());
    cfg.plunk.api_key = None;

    let err = Importer::new(cfg).run().await.unwrap_err();

    assert!(matches!(err, ImportError::Configuration(_)));
    assert_eq!(service.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_file_is_configuration_error() {
    let (base, service) = spawn_service().await;
    let cfg = config(&base, PathBuf::from("/no/such/contacts.csv"));

    let err = Importer::new(cfg).run().await.unwrap_err();

    assert!(matches!(err, ImportError::Configuration(_)));
    assert_eq!(service.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn short_rows_are_counted_as_malformed() {
    let (base, _) = spawn_service().await;
    let file = csv_file("Jo,a@x.com\nlonely\nSam,b@x.com\n");
    let mut cfg = config(&base, file.path().to_path_buf());
    cfg.field_map = FieldMap {
        email: SourceKey::Index(1),
        ..FieldMap::default()
    }
    .with_attribute("name", SourceKey::Index(0));

    let report = Importer::new(cfg).run().await.unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.skipped_malformed, 1);
    assert_eq!(report.skipped_invalid, 0);
}
