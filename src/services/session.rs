use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::{BookingError, SessionError};
use crate::models::meeting::{
    Department, Meeting, MeetingFields, MeetingId, MeetingType, SelectionRequest, TimeRange,
};
use crate::services::scheduler::Scheduler;
use crate::services::validator::BusinessRules;

/// Two clicks on an empty slot within this window open the booking modal.
pub const DEFAULT_CLICK_WINDOW: Duration = Duration::from_millis(300);

/// Where the booking modal currently stands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    #[serde(rename_all = "camelCase")]
    Creating { pending_range: TimeRange },
    #[serde(rename_all = "camelCase")]
    Editing { subject_event_id: MeetingId },
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Creating { .. } => "creating",
            SessionState::Editing { .. } => "editing",
        }
    }
}

/// What the user picked on the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTarget {
    EmptySlot(TimeRange),
    ExistingEvent(MeetingId),
}

impl From<SelectionRequest> for SelectionTarget {
    fn from(request: SelectionRequest) -> Self {
        match request {
            SelectionRequest::EmptySlot { start, end } => {
                SelectionTarget::EmptySlot(TimeRange::new(start, end))
            }
            SelectionRequest::ExistingEvent { id } => SelectionTarget::ExistingEvent(id),
        }
    }
}

/// Fields of the booking modal as the user submits them. Times are local
/// `HH:MM` clock strings applied to the date of the slot or event being
/// edited; when absent the slot's (or event's) own times are kept.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionForm {
    #[serde(default)]
    pub title: String,
    pub department: Option<Department>,
    pub meeting_type: Option<MeetingType>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    pub organizer: Option<String>,
}

/// The mutation a save resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveIntent {
    Create(MeetingFields),
    Update(MeetingId, MeetingFields),
}

impl SaveIntent {
    pub fn is_create(&self) -> bool {
        matches!(self, SaveIntent::Create(_))
    }

    /// Validate against the scheduler and return the record to commit.
    pub fn plan(&self, scheduler: &Scheduler) -> Result<Meeting, BookingError> {
        match self {
            SaveIntent::Create(fields) => scheduler.plan_create(fields),
            SaveIntent::Update(id, fields) => scheduler.plan_update(*id, fields),
        }
    }
}

fn parse_clock(value: &str) -> Result<NaiveTime, SessionError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| SessionError::MalformedTime(value.to_string()))
}

fn resolve_time(
    rules: &BusinessRules,
    date: NaiveDate,
    clock: Option<&str>,
    fallback: DateTime<Utc>,
) -> Result<DateTime<Utc>, SessionError> {
    match clock {
        Some(value) if !value.trim().is_empty() => {
            let time = parse_clock(value)?;
            rules
                .at_local(date, time)
                .ok_or_else(|| SessionError::MalformedTime(value.to_string()))
        }
        _ => Ok(fallback),
    }
}

/// Modal state machine: `Idle`, `Creating(range)` or `Editing(id)`.
///
/// A rejected save or delete leaves the session where it was so the user
/// can correct the form; every successful save, delete or cancel returns to
/// `Idle`.
#[derive(Debug, Clone, Default)]
pub struct BookingSession {
    state: SessionState,
}

impl BookingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            state: self.state.label(),
        }
    }

    /// Open the modal for an empty slot or an existing meeting.
    ///
    /// Empty slots must pass the conflict and past-date checks before the
    /// modal opens. Canceled meetings cannot be opened for editing.
    pub fn select(&mut self, target: SelectionTarget, scheduler: &Scheduler) -> Result<(), SessionError> {
        if !self.is_idle() {
            return Err(self.invalid("select"));
        }

        self.state = match target {
            SelectionTarget::EmptySlot(range) => {
                scheduler.check_slot(&range, None)?;
                SessionState::Creating { pending_range: range }
            }
            SelectionTarget::ExistingEvent(id) => {
                let meeting = scheduler.store().get(id).ok_or(BookingError::NotFound(id))?;
                if meeting.canceled {
                    return Err(SessionError::CanceledSelection(id));
                }
                SessionState::Editing { subject_event_id: id }
            }
        };
        debug!("Booking session is now {}", self.state.label());
        Ok(())
    }

    /// Close the modal without saving. A no-op when already idle.
    pub fn cancel(&mut self) {
        if !self.is_idle() {
            debug!("Booking session closed from {}", self.state.label());
        }
        self.state = SessionState::Idle;
    }

    /// Work out what a save would do without changing any state.
    pub fn resolve_save(&self, form: &SessionForm, scheduler: &Scheduler) -> Result<SaveIntent, SessionError> {
        let rules = scheduler.rules();
        match &self.state {
            SessionState::Idle => Err(self.invalid("save")),
            SessionState::Creating { pending_range } => {
                let date = rules.local_date(pending_range.start);
                let fields = MeetingFields {
                    title: form.title.clone(),
                    department: form.department,
                    meeting_type: form.meeting_type,
                    start: Some(resolve_time(rules, date, form.start_time.as_deref(), pending_range.start)?),
                    end: Some(resolve_time(rules, date, form.end_time.as_deref(), pending_range.end)?),
                    description: form.description.clone(),
                    attendees: form.attendees.clone(),
                    organizer: form.organizer.clone(),
                };
                Ok(SaveIntent::Create(fields))
            }
            SessionState::Editing { subject_event_id } => {
                let id = *subject_event_id;
                let existing = scheduler.store().get(id).ok_or(BookingError::NotFound(id))?;
                let date = rules.local_date(existing.start);
                let fields = MeetingFields {
                    title: form.title.clone(),
                    department: form.department.or(Some(existing.department)),
                    meeting_type: form.meeting_type.or(Some(existing.meeting_type)),
                    start: Some(resolve_time(rules, date, form.start_time.as_deref(), existing.start)?),
                    end: Some(resolve_time(rules, date, form.end_time.as_deref(), existing.end)?),
                    description: form.description.clone().or_else(|| existing.description.clone()),
                    attendees: if form.attendees.is_empty() {
                        existing.invitee_ids()
                    } else {
                        form.attendees.clone()
                    },
                    organizer: existing.creator.clone(),
                };
                Ok(SaveIntent::Update(id, fields))
            }
        }
    }

    /// The meeting a delete would cancel.
    pub fn resolve_delete(&self) -> Result<MeetingId, SessionError> {
        match &self.state {
            SessionState::Editing { subject_event_id } => Ok(*subject_event_id),
            _ => Err(self.invalid("delete")),
        }
    }

    /// Return to `Idle` after a save or delete has been committed.
    pub fn finish(&mut self) {
        info!("Booking session finished from {}", self.state.label());
        self.state = SessionState::Idle;
    }
}

/// Result of a click on an empty slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// First click; waiting to see whether a second one follows.
    Armed,
    /// Second click inside the window: open the modal for this range.
    Open(TimeRange),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClickState {
    Idle,
    Pending { at: Instant },
}

/// Tells a double click on an empty slot apart from a single one.
#[derive(Debug, Clone)]
pub struct ClickDisambiguator {
    window: Duration,
    state: ClickState,
}

impl Default for ClickDisambiguator {
    fn default() -> Self {
        Self::new(DEFAULT_CLICK_WINDOW)
    }
}

impl ClickDisambiguator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: ClickState::Idle,
        }
    }

    pub fn is_pending(&self, now: Instant) -> bool {
        match self.state {
            ClickState::Pending { at } => now.saturating_duration_since(at) <= self.window,
            ClickState::Idle => false,
        }
    }

    pub fn on_click(&mut self, range: TimeRange, now: Instant) -> ClickOutcome {
        if self.is_pending(now) {
            self.state = ClickState::Idle;
            ClickOutcome::Open(range)
        } else {
            self.state = ClickState::Pending { at: now };
            ClickOutcome::Armed
        }
    }

    pub fn cancel(&mut self) {
        self.state = ClickState::Idle;
    }
}
