use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{BookingError, Rejection};
use crate::models::meeting::{self, AttendanceStatus, Attendee, Meeting, MeetingFields, MeetingId, TimeRange};
use crate::services::clock::Clock;
use crate::services::store::EventStore;
use crate::services::validator::{self, BusinessRules, Candidate};

/// Applies create/update/cancel/move to the event store, validating first.
///
/// Every mutation comes in two halves. `plan_*` validates and returns the
/// record the store would hold afterwards without touching the store, and
/// [`Scheduler::apply`] commits such a record. The booking service commits
/// to the external data store in between.
pub struct Scheduler {
    store: EventStore,
    rules: BusinessRules,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(rules: BusinessRules, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: EventStore::new(),
            rules,
            clock,
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn rules(&self) -> &BusinessRules {
        &self.rules
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.rules.local_date(self.clock.now())
    }

    fn validate(&self, candidate: &Candidate<'_>, exclude: Option<MeetingId>) -> Result<(), Rejection> {
        validator::validate(
            &self.rules,
            candidate,
            exclude,
            self.store.all(),
            self.today(),
        )
    }

    /// Conflict and past-date checks for a bare slot selection.
    pub fn check_slot(&self, range: &TimeRange, exclude: Option<MeetingId>) -> Result<(), Rejection> {
        validator::check_slot(&self.rules, range, exclude, self.store.all(), self.today())
    }

    fn build(
        id: MeetingId,
        fields: &MeetingFields,
        creator: Option<String>,
        existing: &[Attendee],
        canceled: bool,
    ) -> Result<Meeting, BookingError> {
        let start = fields.start.ok_or(Rejection::MissingField("start"))?;
        let end = fields.end.ok_or(Rejection::MissingField("end"))?;
        let department = fields.department.ok_or(Rejection::MissingField("department"))?;
        let meeting_type = fields.meeting_type.unwrap_or_default();

        Ok(Meeting {
            id,
            title: fields.title.trim().to_string(),
            start,
            end,
            department,
            meeting_type,
            color: meeting_type.color().to_string(),
            canceled,
            description: fields.description.clone(),
            attendees: meeting::roster(existing, creator.as_deref(), &fields.attendees),
            creator,
        })
    }

    /// The organizer named in `fields` becomes the creator.
    pub fn plan_create(&self, fields: &MeetingFields) -> Result<Meeting, BookingError> {
        self.validate(&Candidate::from(fields), None)?;
        Self::build(Uuid::new_v4(), fields, fields.organizer.clone(), &[], false)
    }

    /// Updates keep the original creator and every attendee's answer.
    pub fn plan_update(&self, id: MeetingId, fields: &MeetingFields) -> Result<Meeting, BookingError> {
        let existing = self.store.get(id).ok_or(BookingError::NotFound(id))?;
        self.validate(&Candidate::from(fields), Some(id))?;
        Self::build(
            id,
            fields,
            existing.creator.clone(),
            &existing.attendees,
            existing.canceled,
        )
    }

    /// Record one attendee's answer. Times are not revalidated.
    pub fn plan_attendance(
        &self,
        id: MeetingId,
        user_id: &str,
        status: AttendanceStatus,
    ) -> Result<Meeting, BookingError> {
        let existing = self.store.get(id).ok_or(BookingError::NotFound(id))?;
        let mut meeting = existing.clone();
        let attendee = meeting
            .attendees
            .iter_mut()
            .find(|a| a.user_id == user_id)
            .ok_or_else(|| BookingError::NotAttendee {
                meeting: id,
                user: user_id.to_string(),
            })?;
        attendee.status = status;
        Ok(meeting)
    }

    pub fn plan_move(
        &self,
        id: MeetingId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Meeting, BookingError> {
        let existing = self.store.get(id).ok_or(BookingError::NotFound(id))?;
        let fields = MeetingFields {
            start: Some(start),
            end: Some(end),
            ..MeetingFields::from_meeting(existing)
        };
        self.plan_update(id, &fields)
    }

    /// Cancellation is unconditional: no validation, and canceling an
    /// already-canceled meeting yields the same record.
    pub fn plan_cancel(&self, id: MeetingId) -> Result<Meeting, BookingError> {
        let existing = self.store.get(id).ok_or(BookingError::NotFound(id))?;
        Ok(Meeting {
            canceled: true,
            ..existing.clone()
        })
    }

    /// Commit a planned record, replacing any record with the same id.
    pub fn apply(&mut self, meeting: Meeting) {
        debug!("Applying meeting {} ({})", meeting.id, meeting.title);
        self.store.upsert(meeting);
    }

    pub fn replace_all(&mut self, meetings: Vec<Meeting>) {
        info!("Replacing event store with {} meetings", meetings.len());
        self.store.replace_all(meetings);
    }
}
