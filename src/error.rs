//! Error types for the booking core and its collaborators.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::meeting::MeetingId;

/// Why the validator refused a candidate booking.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("meetings must start and end within business hours")]
    OutsideBusinessHours,

    #[error("end time must be after start time")]
    InvalidOrdering,

    #[error("meeting is shorter than the minimum of {0} minutes")]
    TooShort(i64),

    #[error("another meeting is already scheduled at this time ({0})")]
    TimeConflict(MeetingId),

    #[error("meetings can only be scheduled for today or later")]
    PastDate,
}

impl Rejection {
    /// Stable machine-readable tag used in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::MissingField(_) => "missing_field",
            Rejection::OutsideBusinessHours => "outside_business_hours",
            Rejection::InvalidOrdering => "invalid_ordering",
            Rejection::TooShort(_) => "too_short",
            Rejection::TimeConflict(_) => "time_conflict",
            Rejection::PastDate => "past_date",
        }
    }

    /// The form field the rejection should be rendered next to, if any.
    /// Conflicts and past dates are form-level messages.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Rejection::MissingField(field) => Some(field),
            Rejection::OutsideBusinessHours | Rejection::TooShort(_) => Some("start"),
            Rejection::InvalidOrdering => Some("end"),
            Rejection::TimeConflict(_) | Rejection::PastDate => None,
        }
    }
}

/// Failures talking to the data store or the email service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::RequestFailed(err.to_string())
        }
    }
}

/// Errors surfaced by the mutators and the booking service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("meeting not found: {0}")]
    NotFound(MeetingId),

    #[error("{user} is not an attendee of meeting {meeting}")]
    NotAttendee { meeting: MeetingId, user: String },

    #[error("upstream request failed: {0}")]
    UpstreamRequestFailed(String),

    #[error("upstream request timed out")]
    UpstreamTimeout,
}

impl From<UpstreamError> for BookingError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::RequestFailed(msg) => BookingError::UpstreamRequestFailed(msg),
            UpstreamError::Timeout => BookingError::UpstreamTimeout,
        }
    }
}

/// Errors from driving the booking session state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot {action} while the session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("malformed time of day: {0}")]
    MalformedTime(String),

    #[error("selected meeting is canceled: {0}")]
    CanceledSelection(MeetingId),

    #[error(transparent)]
    Booking(#[from] BookingError),
}

impl From<Rejection> for SessionError {
    fn from(rejection: Rejection) -> Self {
        SessionError::Booking(BookingError::Rejected(rejection))
    }
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("business hours start {start} must be before end {end}")]
    EmptyBusinessHours { start: String, end: String },
}

/// Errors returned from HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("missing or malformed bearer token")]
    Unauthorized,
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        ApiError::Booking(BookingError::Rejected(rejection))
    }
}

fn booking_status(err: &BookingError) -> StatusCode {
    match err {
        BookingError::Rejected(Rejection::TimeConflict(_)) => StatusCode::CONFLICT,
        BookingError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BookingError::NotFound(_) | BookingError::NotAttendee { .. } => StatusCode::NOT_FOUND,
        BookingError::UpstreamRequestFailed(_) => StatusCode::BAD_GATEWAY,
        BookingError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn booking_kind(err: &BookingError) -> &'static str {
    match err {
        BookingError::Rejected(rejection) => rejection.kind(),
        BookingError::NotFound(_) => "not_found",
        BookingError::NotAttendee { .. } => "not_attendee",
        BookingError::UpstreamRequestFailed(_) => "upstream_request_failed",
        BookingError::UpstreamTimeout => "upstream_timeout",
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Booking(err) | ApiError::Session(SessionError::Booking(err)) => {
                booking_status(err)
            }
            ApiError::Session(SessionError::InvalidTransition { .. })
            | ApiError::Session(SessionError::CanceledSelection(_)) => StatusCode::CONFLICT,
            ApiError::Session(SessionError::MalformedTime(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Booking(err) | ApiError::Session(SessionError::Booking(err)) => {
                booking_kind(err)
            }
            ApiError::Session(SessionError::InvalidTransition { .. }) => "invalid_transition",
            ApiError::Session(SessionError::CanceledSelection(_)) => "canceled_selection",
            ApiError::Session(SessionError::MalformedTime(_)) => "malformed_time",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized => "unauthorized",
        }
    }

    fn field(&self) -> Option<&'static str> {
        match self {
            ApiError::Booking(BookingError::Rejected(rejection))
            | ApiError::Session(SessionError::Booking(BookingError::Rejected(rejection))) => {
                rejection.field()
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "field": self.field(),
        });
        (self.status(), Json(body)).into_response()
    }
}
