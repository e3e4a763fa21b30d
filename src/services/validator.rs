use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use crate::error::Rejection;
use crate::models::meeting::{Department, Meeting, MeetingFields, MeetingId, TimeRange};

/// Which double-booking rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Any overlap of the half-open ranges is a conflict. Back-to-back is fine.
    #[default]
    Overlap,
    /// Only an identical start and end is a conflict.
    Exact,
}

impl ConflictPolicy {
    pub fn conflicts(&self, a: &TimeRange, b: &TimeRange) -> bool {
        match self {
            ConflictPolicy::Overlap => a.overlaps(b),
            ConflictPolicy::Exact => a.start == b.start && a.end == b.end,
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "overlap" | "interval" => Ok(ConflictPolicy::Overlap),
            "exact" | "exact-match" => Ok(ConflictPolicy::Exact),
            other => Err(format!("unknown conflict policy: {}", other)),
        }
    }
}

/// Business rules every booking must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessRules {
    pub opens_at: NaiveTime,
    pub closes_at: NaiveTime,
    pub min_duration: Duration,
    pub conflict_policy: ConflictPolicy,
    /// Offset in which business hours and calendar dates are evaluated.
    pub utc_offset: FixedOffset,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            opens_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            closes_at: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            min_duration: Duration::minutes(15),
            conflict_policy: ConflictPolicy::Overlap,
            utc_offset: Utc.fix(),
        }
    }
}

impl BusinessRules {
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.utc_offset).date_naive()
    }

    pub fn local_time(&self, instant: DateTime<Utc>) -> NaiveTime {
        instant.with_timezone(&self.utc_offset).time()
    }

    /// Combine a local calendar date and clock time into an instant.
    pub fn at_local(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.utc_offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|local| local.with_timezone(&Utc))
    }

    /// Both endpoints inside the window, on the same local date.
    pub fn within_business_hours(&self, range: &TimeRange) -> bool {
        let in_window = |t: NaiveTime| t >= self.opens_at && t <= self.closes_at;
        self.local_date(range.start) == self.local_date(range.end)
            && in_window(self.local_time(range.start))
            && in_window(self.local_time(range.end))
    }

    pub fn min_duration_minutes(&self) -> i64 {
        self.min_duration.num_minutes()
    }
}

/// The subset of meeting fields the validator looks at.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub title: &'a str,
    pub department: Option<Department>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl<'a> From<&'a MeetingFields> for Candidate<'a> {
    fn from(fields: &'a MeetingFields) -> Self {
        Self {
            title: &fields.title,
            department: fields.department,
            start: fields.start,
            end: fields.end,
        }
    }
}

impl<'a> From<&'a Meeting> for Candidate<'a> {
    fn from(meeting: &'a Meeting) -> Self {
        Self {
            title: &meeting.title,
            department: Some(meeting.department),
            start: Some(meeting.start),
            end: Some(meeting.end),
        }
    }
}

/// First active meeting, other than `exclude`, that conflicts with `range`.
pub fn find_conflict<'a, I>(
    rules: &BusinessRules,
    range: &TimeRange,
    exclude: Option<MeetingId>,
    events: I,
) -> Option<MeetingId>
where
    I: IntoIterator<Item = &'a Meeting>,
{
    events
        .into_iter()
        .filter(|event| event.is_active())
        .filter(|event| Some(event.id) != exclude)
        .find(|event| rules.conflict_policy.conflicts(&event.range(), range))
        .map(|event| event.id)
}

/// Run every booking rule against a candidate, returning the first failure.
///
/// Checks run in a fixed order: required fields, business hours, ordering,
/// minimum duration, conflicts with other active meetings, past date.
pub fn validate<'a, I>(
    rules: &BusinessRules,
    candidate: &Candidate<'_>,
    exclude: Option<MeetingId>,
    events: I,
    today: NaiveDate,
) -> Result<(), Rejection>
where
    I: IntoIterator<Item = &'a Meeting>,
{
    if candidate.title.trim().is_empty() {
        return Err(Rejection::MissingField("title"));
    }
    let start = candidate.start.ok_or(Rejection::MissingField("start"))?;
    let end = candidate.end.ok_or(Rejection::MissingField("end"))?;
    if candidate.department.is_none() {
        return Err(Rejection::MissingField("department"));
    }

    let range = TimeRange::new(start, end);
    if !rules.within_business_hours(&range) {
        return Err(Rejection::OutsideBusinessHours);
    }
    if end <= start {
        return Err(Rejection::InvalidOrdering);
    }
    if range.duration() < rules.min_duration {
        return Err(Rejection::TooShort(rules.min_duration_minutes()));
    }

    check_slot(rules, &range, exclude, events, today)
}

/// The checks slot selection and drag/resize run before anything else:
/// no conflict with an active meeting and not on a past date.
pub fn check_slot<'a, I>(
    rules: &BusinessRules,
    range: &TimeRange,
    exclude: Option<MeetingId>,
    events: I,
    today: NaiveDate,
) -> Result<(), Rejection>
where
    I: IntoIterator<Item = &'a Meeting>,
{
    if let Some(conflicting) = find_conflict(rules, range, exclude, events) {
        debug!("Candidate {}-{} conflicts with {}", range.start, range.end, conflicting);
        return Err(Rejection::TimeConflict(conflicting));
    }
    if rules.local_date(range.start) < today {
        return Err(Rejection::PastDate);
    }
    Ok(())
}
