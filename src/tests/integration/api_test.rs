use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::client::MockMeetingBackend;
use crate::error::UpstreamError;
use crate::tests::common::fixtures::{at, auth, meeting_body, server_with_backend, setup_test_environment};

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _, _dir) = setup_test_environment(false);

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "OK");
}

#[tokio::test]
async fn test_create_meeting_persists_to_store() {
    let (server, store, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    let response = server
        .post("/meetings")
        .add_header(name, value)
        .json(&meeting_body("Sprint planning", "IT & Operations", at(2, 10, 0), at(2, 11, 0)))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["meeting"]["title"], "Sprint planning");
    assert_eq!(body["meeting"]["color"], "#EF4444");
    assert_eq!(body["notifications"]["sent"], 1);

    let stored = store.load_meetings().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Sprint planning");

    let id = body["meeting"]["id"].as_str().unwrap();
    let response = server.get(&format!("/meetings/{}", id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["department"], "IT & Operations");
}

#[tokio::test]
async fn test_create_without_token_is_unauthorized() {
    let (server, store, _dir) = setup_test_environment(false);

    let response = server
        .post("/meetings")
        .json(&meeting_body("Sprint planning", "IT & Operations", at(2, 10, 0), at(2, 11, 0)))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["kind"], "unauthorized");
    assert!(store.load_meetings().unwrap().is_empty());
}

#[tokio::test]
async fn test_overlapping_create_is_a_conflict() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    let first: Value = server
        .post("/meetings")
        .add_header(name.clone(), value.clone())
        .json(&meeting_body("Budget", "Treasury Department", at(2, 10, 0), at(2, 11, 0)))
        .await
        .json();
    let first_id = first["meeting"]["id"].as_str().unwrap();

    let response = server
        .post("/meetings")
        .add_header(name, value)
        .json(&meeting_body("Hiring", "Human Resource", at(2, 10, 30), at(2, 11, 30)))
        .await;

    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["kind"], "time_conflict");
    assert!(body["error"].as_str().unwrap().contains(first_id));
}

#[tokio::test]
async fn test_back_to_back_meetings_are_allowed() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    for (title, start, end) in [("First", at(2, 10, 0), at(2, 11, 0)), ("Second", at(2, 11, 0), at(2, 12, 0))] {
        let response = server
            .post("/meetings")
            .add_header(name.clone(), value.clone())
            .json(&meeting_body(title, "Loans Department", start, end))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }
}

#[tokio::test]
async fn test_rejections_name_the_field() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    let cases = [
        (meeting_body("", "Loans Department", at(2, 10, 0), at(2, 11, 0)), "missing_field", json!("title")),
        (
            meeting_body("Early", "Loans Department", at(2, 7, 0), at(2, 8, 0)),
            "outside_business_hours",
            json!("start"),
        ),
        (
            meeting_body("Backwards", "Loans Department", at(2, 11, 0), at(2, 10, 0)),
            "invalid_ordering",
            json!("end"),
        ),
        (
            meeting_body("Quick sync", "Loans Department", at(2, 10, 0), at(2, 10, 10)),
            "too_short",
            json!("start"),
        ),
        (
            json!({"title": "Past", "department": "Loans Department", "start": "2035-03-30T10:00:00Z", "end": "2035-03-30T11:00:00Z"}),
            "past_date",
            Value::Null,
        ),
    ];

    for (body, kind, field) in cases {
        let response = server
            .post("/meetings")
            .add_header(name.clone(), value.clone())
            .json(&body)
            .await;

        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY, "{}", kind);
        let error: Value = response.json();
        assert_eq!(error["kind"], kind);
        assert_eq!(error["field"], field, "{}", kind);
    }
}

#[tokio::test]
async fn test_unknown_meeting_is_not_found() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();
    let id = uuid::Uuid::new_v4();

    let response = server.get(&format!("/meetings/{}", id)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = server
        .delete(&format!("/meetings/{}", id))
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["kind"], "not_found");
}

#[tokio::test]
async fn test_move_and_cancel_meeting() {
    let (server, store, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    let created: Value = server
        .post("/meetings")
        .add_header(name.clone(), value.clone())
        .json(&meeting_body("Design review", "Marketing Department", at(3, 13, 0), at(3, 14, 0)))
        .await
        .json();
    let id = created["meeting"]["id"].as_str().unwrap().to_string();

    let response = server
        .patch(&format!("/meetings/{}/move", id))
        .add_header(name.clone(), value.clone())
        .json(&json!({"start": at(3, 15, 0), "end": at(3, 16, 30)}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let moved: Value = response.json();
    assert_eq!(moved["title"], "Design review");
    assert_eq!(moved["start"], json!(at(3, 15, 0)));

    let response = server
        .delete(&format!("/meetings/{}", id))
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["canceled"], true);

    let stored = store.load_meetings().unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].canceled);
}

#[tokio::test]
async fn test_update_meeting_rejects_conflict() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    server
        .post("/meetings")
        .add_header(name.clone(), value.clone())
        .json(&meeting_body("Standup", "IT & Operations", at(4, 9, 0), at(4, 9, 30)))
        .await;
    let created: Value = server
        .post("/meetings")
        .add_header(name.clone(), value.clone())
        .json(&meeting_body("Retro", "IT & Operations", at(4, 10, 0), at(4, 11, 0)))
        .await
        .json();
    let id = created["meeting"]["id"].as_str().unwrap().to_string();

    let response = server
        .put(&format!("/meetings/{}", id))
        .add_header(name, value)
        .json(&meeting_body("Retro", "IT & Operations", at(4, 9, 15), at(4, 10, 0)))
        .await;

    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_list_filters_and_paginates() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    for (title, dept, hour) in [
        ("Rate review", "Treasury Department", 9),
        ("Campaign kickoff", "Marketing Department", 11),
        ("Campaign retro", "Marketing Department", 14),
    ] {
        server
            .post("/meetings")
            .add_header(name.clone(), value.clone())
            .json(&meeting_body(title, dept, at(5, hour, 0), at(5, hour + 1, 0)))
            .await;
    }

    let page: Value = server
        .get("/meetings")
        .add_query_param("department", "Marketing Department")
        .add_query_param("page_size", 1)
        .await
        .json();
    assert_eq!(page["total"], 2);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    let page: Value = server.get("/meetings").add_query_param("search", "retro").await.json();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["title"], "Campaign retro");

    let page: Value = server
        .get("/meetings")
        .add_query_param("page", usize::MAX.to_string())
        .await
        .json();
    assert_eq!(page["total"], 3);
    assert!(page["items"].as_array().unwrap().is_empty());

    let response = server.get("/meetings").add_query_param("status", "someday").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analytics_counts_by_department() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    for (title, dept, hour) in [
        ("Rate review", "Treasury Department", 9),
        ("Liquidity", "Treasury Department", 13),
        ("Campaign kickoff", "Marketing Department", 16),
    ] {
        server
            .post("/meetings")
            .add_header(name.clone(), value.clone())
            .json(&meeting_body(title, dept, at(5, hour, 0), at(5, hour + 1, 0)))
            .await;
    }

    let analytics: Value = server.get("/analytics").await.json();
    assert_eq!(analytics["total_meetings"], 3);
    assert_eq!(analytics["by_department"]["Treasury Department"], 2);
    assert_eq!(analytics["average_duration_minutes"], 60);
    assert_eq!(analytics["time_distribution"]["morning"], 1);
    assert_eq!(analytics["time_distribution"]["afternoon"], 2);

    let analytics: Value = server
        .get("/analytics")
        .add_query_param("department", "Marketing Department")
        .await
        .json();
    assert_eq!(analytics["total_meetings"], 1);
}

#[tokio::test]
async fn test_upstream_timeout_maps_to_gateway_timeout() {
    let mut backend = MockMeetingBackend::new();
    backend
        .expect_create_meeting()
        .returning(|_, _| Err(UpstreamError::Timeout));
    let server = server_with_backend(Arc::new(backend), false);
    let (name, value) = auth();

    let response = server
        .post("/meetings")
        .add_header(name, value)
        .json(&meeting_body("Sprint planning", "IT & Operations", at(2, 10, 0), at(2, 11, 0)))
        .await;

    assert_eq!(response.status_code(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(response.json::<Value>()["kind"], "upstream_timeout");

    let page: Value = server.get("/meetings").await.json();
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_admin_refresh_hidden_in_production() {
    let (server, _, _dir) = setup_test_environment(true);
    let (name, value) = auth();

    let response = server.post("/admin/refresh").add_header(name, value).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_attendee_answers_invitation() {
    let (server, store, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    let mut body = meeting_body("Vendor review", "IT & Operations", at(3, 10, 0), at(3, 11, 0));
    body["organizer"] = json!("lee@example.com");
    let created: Value = server
        .post("/meetings")
        .add_header(name.clone(), value.clone())
        .json(&body)
        .await
        .json();
    assert_eq!(created["notifications"]["sent"], 1);
    assert_eq!(
        created["meeting"]["attendees"],
        json!([
            {"userId": "lee@example.com", "status": "accepted", "isOrganizer": true},
            {"userId": "ana@example.com", "status": "invited", "isOrganizer": false}
        ])
    );
    let id = created["meeting"]["id"].as_str().unwrap().to_string();

    let response = server
        .put(&format!("/meetings/{}/attendance", id))
        .add_header(name.clone(), value.clone())
        .json(&json!({"userId": "ana@example.com", "status": "tentative"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "tentative");

    let stored = store.load_meetings().unwrap();
    assert_eq!(stored[0].attendees[1].status.as_str(), "tentative");

    let response = server
        .put(&format!("/meetings/{}/attendance", id))
        .add_header(name.clone(), value.clone())
        .json(&json!({"userId": "kim@example.com", "status": "accepted"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["kind"], "not_attendee");

    for bad in [json!({"userId": "ana@example.com"}), json!({"userId": "ana@example.com", "status": "maybe"})] {
        let response = server
            .put(&format!("/meetings/{}/attendance", id))
            .add_header(name.clone(), value.clone())
            .json(&bad)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_weekly_availability() {
    let (server, _, _dir) = setup_test_environment(false);
    let (name, value) = auth();

    for (day, start, end) in [(3, "13:00", "17:00"), (1, "09:00", "12:00")] {
        let response = server
            .post("/availability")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "userId": "ana@example.com",
                "dayOfWeek": day,
                "startTime": start,
                "endTime": end,
                "isAvailable": true
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        assert_eq!(response.json::<Value>()["startTime"], start);
    }

    let slots: Value = server
        .get("/availability")
        .add_header(name.clone(), value.clone())
        .add_query_param("user_id", "ana@example.com")
        .await
        .json();
    let slots = slots.as_array().unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0]["dayOfWeek"], 1);
    assert_eq!(slots[1]["endTime"], "17:00");

    let response = server
        .post("/availability")
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "userId": "ana@example.com",
            "dayOfWeek": 7,
            "startTime": "09:00",
            "endTime": "10:00",
            "isAvailable": true
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["kind"], "bad_request");

    let response = server.get("/availability").add_header(name, value).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}
