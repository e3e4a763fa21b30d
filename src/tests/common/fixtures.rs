use axum::http::{header, HeaderName, HeaderValue};
use axum_test::{TestServer, TestServerConfig};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

use crate::client::{LogNotifier, MeetingBackend};
use crate::handlers::api::AppState;
use crate::routes::create_router;
use crate::services::booking::BookingService;
use crate::services::clock::FixedClock;
use crate::services::database::CsvMeetingStore;
use crate::services::scheduler::Scheduler;
use crate::services::validator::BusinessRules;

pub const TEST_TOKEN: &str = "Bearer test-token";

/// An instant in April 2035. The test clock reads 2035-04-01 08:00 UTC.
pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2035, 4, day, hour, minute, 0).unwrap()
}

pub fn auth() -> (HeaderName, HeaderValue) {
    (header::AUTHORIZATION, HeaderValue::from_static(TEST_TOKEN))
}

pub fn meeting_body(title: &str, department: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Value {
    json!({
        "title": title,
        "department": department,
        "meetingType": "Planning",
        "start": start,
        "end": end,
        "attendees": ["ana@example.com"]
    })
}

/// Router over the given backend. The click window is wide so two
/// sequential test requests always count as a double click.
pub fn server_with_backend(backend: Arc<dyn MeetingBackend>, is_production: bool) -> TestServer {
    let scheduler = Scheduler::new(BusinessRules::default(), Arc::new(FixedClock::new(at(1, 8, 0))));
    let bookings = BookingService::new(
        scheduler,
        backend,
        Arc::new(LogNotifier),
        Duration::from_secs(5),
        Duration::from_secs(5),
    );
    let app = create_router(Arc::new(AppState { bookings }), is_production);

    let config = TestServerConfig::builder().mock_transport().build();
    TestServer::new_with_config(app, config).unwrap()
}

/// Router backed by a CSV store in a fresh temp directory. Keep the
/// returned directory alive for the duration of the test.
pub fn setup_test_environment(is_production: bool) -> (TestServer, Arc<CsvMeetingStore>, TempDir) {
    let dir = tempdir().unwrap();
    let store = Arc::new(CsvMeetingStore::new(dir.path().join("meetings.csv")).unwrap());
    let server = server_with_backend(store.clone(), is_production);
    (server, store, dir)
}
