use axum::{
    extract::{Json as ExtractJson, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::auth::BearerToken;
use crate::error::ApiError;
use crate::models::availability::{Availability, AvailabilityParams, AvailabilityRequest};
use crate::models::common::{AnalyticsParams, CalendarParams, ListParams};
use crate::models::meeting::{
    AttendanceRequest, AttendanceStatus, Attendee, BookingResponse, Meeting, MeetingFields, MeetingId,
    MoveRequest, SelectionRequest, TimeRange,
};
use crate::services::booking::{BookingService, CalendarSnapshot};
use crate::services::calendar::{CalendarView, Navigation};
use crate::services::projection::{Analytics, DepartmentFilter, MeetingQuery, Page, StatusFilter};
use crate::services::session::{ClickOutcome, SessionForm, SessionState};

// AppState struct containing shared resources
pub struct AppState {
    pub bookings: BookingService,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickResponse {
    pub opened: bool,
    pub session: SessionState,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub meetings: usize,
}

fn parse_param<T>(value: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: FromStr<Err = String>,
{
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.parse::<T>().map_err(ApiError::BadRequest))
        .transpose()
}

fn parse_navigation(value: &str) -> Result<Navigation, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "today" => Ok(Navigation::Today),
        "prev" | "previous" => Ok(Navigation::Previous),
        "next" => Ok(Navigation::Next),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
            .map(Navigation::Date)
            .map_err(|_| ApiError::BadRequest(format!("invalid date: {}", value))),
    }
}

// List meetings with sidebar filters
pub async fn list_meetings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Meeting>>, ApiError> {
    info!(
        "Received request to list meetings with page={}, page_size={}",
        params.page, params.page_size
    );

    let query = MeetingQuery {
        department: parse_param::<DepartmentFilter>(params.department.as_deref())?.unwrap_or_default(),
        search: params.search.clone(),
        status: parse_param::<StatusFilter>(params.status.as_deref())?.unwrap_or_default(),
    };
    let page = state.bookings.list(&query, &params.pagination()).await;

    info!("Returning {} of {} meetings", page.items.len(), page.total);
    Ok(Json(page))
}

// Create meeting endpoint
pub async fn create_meeting(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    ExtractJson(fields): ExtractJson<MeetingFields>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    info!("Received request to create meeting: {}", fields.title);

    let (meeting, notifications) = state.bookings.create(&token, &fields).await?;
    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            meeting,
            notifications,
        }),
    ))
}

pub async fn get_meeting(
    State(state): State<Arc<AppState>>,
    Path(meeting_id): Path<MeetingId>,
) -> Result<Json<Meeting>, ApiError> {
    Ok(Json(state.bookings.get(meeting_id).await?))
}

// Edit meeting endpoint
pub async fn update_meeting(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    Path(meeting_id): Path<MeetingId>,
    ExtractJson(fields): ExtractJson<MeetingFields>,
) -> Result<Json<Meeting>, ApiError> {
    info!("Received request to update meeting: {}", meeting_id);

    let meeting = state.bookings.update(&token, meeting_id, &fields).await?;
    Ok(Json(meeting))
}

// Drag/resize endpoint
pub async fn move_meeting(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    Path(meeting_id): Path<MeetingId>,
    ExtractJson(request): ExtractJson<MoveRequest>,
) -> Result<Json<Meeting>, ApiError> {
    info!(
        "Received request to move meeting {} to {} - {}",
        meeting_id, request.start, request.end
    );

    let meeting = state
        .bookings
        .move_meeting(&token, meeting_id, request.range())
        .await?;
    Ok(Json(meeting))
}

// Cancel meeting endpoint
pub async fn cancel_meeting(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    Path(meeting_id): Path<MeetingId>,
) -> Result<Json<Meeting>, ApiError> {
    info!("Received request to cancel meeting: {}", meeting_id);

    let meeting = state.bookings.cancel(&token, meeting_id).await?;
    Ok(Json(meeting))
}

// Answer an invitation on behalf of one attendee
pub async fn update_attendance(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    Path(meeting_id): Path<MeetingId>,
    ExtractJson(request): ExtractJson<AttendanceRequest>,
) -> Result<Json<Attendee>, ApiError> {
    let user_id = request
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("userId is required".to_string()))?;
    let status = parse_param::<AttendanceStatus>(request.status.as_deref())?
        .ok_or_else(|| ApiError::BadRequest("status is required".to_string()))?;
    info!(
        "Received attendance update for meeting {}: {} is {}",
        meeting_id, user_id, status
    );

    let attendee = state
        .bookings
        .respond(&token, meeting_id, user_id.trim(), status)
        .await?;
    Ok(Json(attendee))
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Vec<Availability>>, ApiError> {
    let user_id = params
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("user_id is required".to_string()))?;
    info!("Received request for availability of {}", user_id);

    Ok(Json(state.bookings.availability(&token, user_id.trim()).await?))
}

pub async fn create_availability(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    ExtractJson(request): ExtractJson<AvailabilityRequest>,
) -> Result<(StatusCode, Json<Availability>), ApiError> {
    let availability = request.into_availability().map_err(ApiError::BadRequest)?;
    info!(
        "Received availability for {} on day {}",
        availability.user_id, availability.day_of_week
    );

    let stored = state.bookings.create_availability(&token, &availability).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn get_calendar(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    Query(params): Query<CalendarParams>,
) -> Result<Json<CalendarSnapshot>, ApiError> {
    let view = parse_param::<CalendarView>(params.view.as_deref())?;
    let navigation = params
        .date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(parse_navigation)
        .transpose()?;
    let department = parse_param::<DepartmentFilter>(params.department.as_deref())?;

    let snapshot = state.bookings.calendar(&token, view, navigation, department).await;
    info!(
        "Calendar {:?} from {} to {} with {} meetings",
        snapshot.view,
        snapshot.range.start,
        snapshot.range.end,
        snapshot.events.len()
    );
    Ok(Json(snapshot))
}

pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<Analytics>, ApiError> {
    let department = parse_param::<DepartmentFilter>(params.department.as_deref())?.unwrap_or_default();
    Ok(Json(state.bookings.analytics(department).await))
}

pub async fn get_session(State(state): State<Arc<AppState>>, token: BearerToken) -> Json<SessionState> {
    Json(state.bookings.session_state(&token).await)
}

pub async fn select_session(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    ExtractJson(request): ExtractJson<SelectionRequest>,
) -> Result<Json<SessionState>, ApiError> {
    info!("Received selection: {:?}", request);
    let session = state.bookings.session_select(&token, request.into()).await?;
    Ok(Json(session))
}

pub async fn click_slot(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    ExtractJson(range): ExtractJson<TimeRange>,
) -> Result<Json<ClickResponse>, ApiError> {
    let (outcome, session) = state.bookings.session_click(&token, range).await?;
    Ok(Json(ClickResponse {
        opened: matches!(outcome, ClickOutcome::Open(_)),
        session,
    }))
}

pub async fn save_session(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    ExtractJson(form): ExtractJson<SessionForm>,
) -> Result<Json<BookingResponse>, ApiError> {
    info!("Received booking modal save: {}", form.title);
    let (meeting, notifications) = state.bookings.session_save(&token, &form).await?;
    Ok(Json(BookingResponse {
        meeting,
        notifications,
    }))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
) -> Result<Json<Meeting>, ApiError> {
    Ok(Json(state.bookings.session_delete(&token).await?))
}

pub async fn cancel_session(State(state): State<Arc<AppState>>, token: BearerToken) -> Json<SessionState> {
    Json(state.bookings.session_cancel(&token).await)
}

// Reload the event store from the data store
pub async fn refresh_meetings(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
) -> Result<Json<RefreshResponse>, ApiError> {
    info!("Received request to refresh meetings");
    let meetings = state.bookings.refresh(&token).await?;
    Ok(Json(RefreshResponse { meetings }))
}
