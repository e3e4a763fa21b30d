use axum::http::{header, HeaderValue, StatusCode};
use serde_json::{json, Value};

use crate::tests::common::fixtures::{at, auth, meeting_body, setup_test_environment};

// Double click on an empty slot, fill in the modal, save
#[tokio::test]
async fn test_double_click_booking_workflow() {
    let (server, store, _dir) = setup_test_environment(false);
    let (name, value) = auth();
    let slot = json!({"start": at(2, 10, 0), "end": at(2, 11, 0)});

    let first: Value = server
        .post("/session/click")
        .add_header(name.clone(), value.clone())
        .json(&slot)
        .await
        .json();
    assert_eq!(first["opened"], false);
    assert_eq!(first["session"]["mode"], "idle");

    let second: Value = server
        .post("/session/click")
        .add_header(name.clone(), value.clone())
        .json(&slot)
        .await
        .json();
    assert_eq!(second["opened"], true);
    assert_eq!(second["session"]["mode"], "creating");
    assert_eq!(second["session"]["pendingRange"]["start"], json!(at(2, 10, 0)));

    let response = server
        .post("/session/save")
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "title": "Vendor demo",
            "department": "Marketing Department",
            "meetingType": "Presentation",
            "attendees": ["lee@example.com", "kim@example.com"]
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let saved: Value = response.json();
    assert_eq!(saved["meeting"]["title"], "Vendor demo");
    assert_eq!(saved["meeting"]["end"], json!(at(2, 11, 0)));
    assert_eq!(saved["notifications"]["sent"], 2);

    let session: Value = server.get("/session").add_header(name, value).await.json();
    assert_eq!(session["mode"], "idle");
    assert_eq!(store.load_meetings().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_save_keeps_modal_open() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    server
        .post("/session/select")
        .add_header(name.clone(), value.clone())
        .json(&json!({"target": "empty_slot", "start": at(3, 9, 0), "end": at(3, 10, 0)}))
        .await;

    let response = server
        .post("/session/save")
        .add_header(name.clone(), value.clone())
        .json(&json!({"title": "No department"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["field"], "department");

    let response = server
        .post("/session/save")
        .add_header(name.clone(), value.clone())
        .json(&json!({"title": "Bad clock", "department": "Loans Department", "startTime": "nine"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["kind"], "malformed_time");

    let session: Value = server.get("/session").add_header(name, value).await.json();
    assert_eq!(session["mode"], "creating");
}

#[tokio::test]
async fn test_edit_and_delete_existing_event() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    let created: Value = server
        .post("/meetings")
        .add_header(name.clone(), value.clone())
        .json(&meeting_body("Loan committee", "Loans Department", at(4, 10, 0), at(4, 11, 0)))
        .await
        .json();
    let id = created["meeting"]["id"].as_str().unwrap().to_string();

    let session: Value = server
        .post("/session/select")
        .add_header(name.clone(), value.clone())
        .json(&json!({"target": "existing_event", "id": id}))
        .await
        .json();
    assert_eq!(session["mode"], "editing");
    assert_eq!(session["subjectEventId"], id.as_str());

    let response = server
        .post("/session/save")
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "title": "Loan committee (moved)",
            "department": "Loans Department",
            "startTime": "14:00",
            "endTime": "15:30"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let saved: Value = response.json();
    assert_eq!(saved["meeting"]["start"], json!(at(4, 14, 0)));
    assert_eq!(saved["meeting"]["end"], json!(at(4, 15, 30)));
    assert_eq!(saved["notifications"]["sent"], 0);

    server
        .post("/session/select")
        .add_header(name.clone(), value.clone())
        .json(&json!({"target": "existing_event", "id": id}))
        .await;
    let response = server
        .post("/session/delete")
        .add_header(name.clone(), value.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["canceled"], true);

    let response = server
        .post("/session/select")
        .add_header(name, value)
        .json(&json!({"target": "existing_event", "id": id}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["kind"], "canceled_selection");
}

#[tokio::test]
async fn test_delete_without_open_event_is_invalid() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    let response = server.post("/session/delete").add_header(name, value).await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["kind"], "invalid_transition");
}

#[tokio::test]
async fn test_sessions_are_per_token() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    server
        .post("/session/select")
        .add_header(name.clone(), value.clone())
        .json(&json!({"target": "empty_slot", "start": at(3, 9, 0), "end": at(3, 10, 0)}))
        .await;

    let other: Value = server
        .get("/session")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer someone-else"))
        .await
        .json();
    assert_eq!(other["mode"], "idle");

    let cancelled: Value = server.post("/session/cancel").add_header(name, value).await.json();
    assert_eq!(cancelled["mode"], "idle");
}

#[tokio::test]
async fn test_click_on_busy_slot_is_rejected() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    server
        .post("/meetings")
        .add_header(name.clone(), value.clone())
        .json(&meeting_body("Board prep", "Executive Leadership", at(2, 13, 0), at(2, 14, 0)))
        .await;

    let response = server
        .post("/session/click")
        .add_header(name, value)
        .json(&json!({"start": at(2, 13, 30), "end": at(2, 14, 30)}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["kind"], "time_conflict");
}

#[tokio::test]
async fn test_calendar_views_and_department_filter() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    for (title, dept, day) in [
        ("Audit walkthrough", "Risk & Compliance, Audit, Remedial", 2),
        ("Payroll close", "Accounting & Finance/CFO", 3),
        ("Quarter planning", "Accounting & Finance/CFO", 20),
    ] {
        server
            .post("/meetings")
            .add_header(name.clone(), value.clone())
            .json(&meeting_body(title, dept, at(day, 10, 0), at(day, 11, 0)))
            .await;
    }

    let month: Value = server
        .get("/calendar")
        .add_header(name.clone(), value.clone())
        .await
        .json();
    assert_eq!(month["view"], "month");
    assert_eq!(month["focus"], "2035-04-01");
    assert_eq!(month["events"].as_array().unwrap().len(), 3);

    let week: Value = server
        .get("/calendar")
        .add_header(name.clone(), value.clone())
        .add_query_param("view", "week")
        .add_query_param("date", "2035-04-02")
        .add_query_param("department", "Accounting & Finance/CFO")
        .await
        .json();
    assert_eq!(week["view"], "week");
    let events = week["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["title"], "Payroll close");

    // View and department stick for the next request
    let next: Value = server
        .get("/calendar")
        .add_header(name.clone(), value.clone())
        .add_query_param("date", "next")
        .await
        .json();
    assert_eq!(next["view"], "week");
    assert!(next["events"].as_array().unwrap().is_empty());

    let response = server
        .get("/calendar")
        .add_header(name, value)
        .add_query_param("view", "fortnight")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_refresh_reloads_store() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    server
        .post("/meetings")
        .add_header(name.clone(), value.clone())
        .json(&meeting_body("Town hall", "Human Resource", at(6, 15, 0), at(6, 16, 0)))
        .await;

    let response = server.post("/admin/refresh").add_header(name, value).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["meetings"], 1);

    let page: Value = server.get("/meetings").await.json();
    assert_eq!(page["total"], 1);
}
