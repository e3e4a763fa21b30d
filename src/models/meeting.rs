use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type MeetingId = Uuid;

/// Organizational units a meeting can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Department {
    #[serde(rename = "Loans Department")]
    Loans,
    #[serde(rename = "Marketing Department")]
    Marketing,
    #[serde(rename = "Repossessed Properties Department")]
    RepossessedProperties,
    #[serde(rename = "Treasury Department")]
    Treasury,
    #[serde(rename = "Customer Service")]
    CustomerService,
    #[serde(rename = "Accounting & Finance/CFO")]
    AccountingFinance,
    #[serde(rename = "Human Resource")]
    HumanResource,
    #[serde(rename = "Risk & Compliance, Audit, Remedial")]
    RiskCompliance,
    #[serde(rename = "IT & Operations")]
    ItOperations,
    #[serde(rename = "Executive Leadership")]
    ExecutiveLeadership,
    #[serde(rename = "CSR (SAFC Heroes)")]
    Csr,
}

impl Department {
    pub const ALL: [Department; 11] = [
        Department::Loans,
        Department::Marketing,
        Department::RepossessedProperties,
        Department::Treasury,
        Department::CustomerService,
        Department::AccountingFinance,
        Department::HumanResource,
        Department::RiskCompliance,
        Department::ItOperations,
        Department::ExecutiveLeadership,
        Department::Csr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Loans => "Loans Department",
            Department::Marketing => "Marketing Department",
            Department::RepossessedProperties => "Repossessed Properties Department",
            Department::Treasury => "Treasury Department",
            Department::CustomerService => "Customer Service",
            Department::AccountingFinance => "Accounting & Finance/CFO",
            Department::HumanResource => "Human Resource",
            Department::RiskCompliance => "Risk & Compliance, Audit, Remedial",
            Department::ItOperations => "IT & Operations",
            Department::ExecutiveLeadership => "Executive Leadership",
            Department::Csr => "CSR (SAFC Heroes)",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Department::ALL
            .iter()
            .copied()
            .find(|dept| dept.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown department: {}", value))
    }
}

/// Kind of meeting. Each kind has a fixed display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MeetingType {
    #[default]
    #[serde(rename = "Team Meeting")]
    TeamMeeting,
    #[serde(rename = "Client Call")]
    ClientCall,
    #[serde(rename = "Review Session")]
    ReviewSession,
    #[serde(rename = "Training")]
    Training,
    #[serde(rename = "Planning")]
    Planning,
    #[serde(rename = "One-on-One")]
    OneOnOne,
    #[serde(rename = "Budget Review")]
    BudgetReview,
    #[serde(rename = "Project Update")]
    ProjectUpdate,
    #[serde(rename = "Brainstorming")]
    Brainstorming,
    #[serde(rename = "Presentation")]
    Presentation,
}

impl MeetingType {
    pub const ALL: [MeetingType; 10] = [
        MeetingType::TeamMeeting,
        MeetingType::ClientCall,
        MeetingType::ReviewSession,
        MeetingType::Training,
        MeetingType::Planning,
        MeetingType::OneOnOne,
        MeetingType::BudgetReview,
        MeetingType::ProjectUpdate,
        MeetingType::Brainstorming,
        MeetingType::Presentation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingType::TeamMeeting => "Team Meeting",
            MeetingType::ClientCall => "Client Call",
            MeetingType::ReviewSession => "Review Session",
            MeetingType::Training => "Training",
            MeetingType::Planning => "Planning",
            MeetingType::OneOnOne => "One-on-One",
            MeetingType::BudgetReview => "Budget Review",
            MeetingType::ProjectUpdate => "Project Update",
            MeetingType::Brainstorming => "Brainstorming",
            MeetingType::Presentation => "Presentation",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            MeetingType::TeamMeeting => "#10B981",
            MeetingType::ClientCall => "#3B82F6",
            MeetingType::ReviewSession => "#F59E0B",
            MeetingType::Training => "#8B5CF6",
            MeetingType::Planning => "#EF4444",
            MeetingType::OneOnOne => "#06B6D4",
            MeetingType::BudgetReview => "#EC4899",
            MeetingType::ProjectUpdate => "#F97316",
            MeetingType::Brainstorming => "#6366F1",
            MeetingType::Presentation => "#14B8A6",
        }
    }
}

impl fmt::Display for MeetingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeetingType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        MeetingType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown meeting type: {}", value))
    }
}

/// A half-open `[start, end)` span of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// An attendee's answer to an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    #[default]
    Invited,
    Accepted,
    Declined,
    Tentative,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Invited => "invited",
            AttendanceStatus::Accepted => "accepted",
            AttendanceStatus::Declined => "declined",
            AttendanceStatus::Tentative => "tentative",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "invited" => Ok(AttendanceStatus::Invited),
            "accepted" => Ok(AttendanceStatus::Accepted),
            "declined" => Ok(AttendanceStatus::Declined),
            "tentative" => Ok(AttendanceStatus::Tentative),
            other => Err(format!("unknown attendance status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub user_id: String,
    #[serde(default)]
    pub status: AttendanceStatus,
    #[serde(default)]
    pub is_organizer: bool,
}

impl Attendee {
    pub fn invited(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            status: AttendanceStatus::Invited,
            is_organizer: false,
        }
    }

    /// Organizers have accepted their own meeting.
    pub fn organizer(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            status: AttendanceStatus::Accepted,
            is_organizer: true,
        }
    }
}

/// Build the attendee list for a saved meeting.
///
/// The organizer comes first, then each invited id once, in the order
/// given. Anyone already on `existing` keeps their answer.
pub fn roster(existing: &[Attendee], organizer: Option<&str>, invitees: &[String]) -> Vec<Attendee> {
    let mut attendees: Vec<Attendee> = Vec::with_capacity(invitees.len() + 1);

    if let Some(organizer) = organizer.filter(|o| !o.trim().is_empty()) {
        let row = existing
            .iter()
            .find(|a| a.user_id == organizer)
            .map(|a| Attendee {
                is_organizer: true,
                ..a.clone()
            })
            .unwrap_or_else(|| Attendee::organizer(organizer));
        attendees.push(row);
    }

    for id in invitees.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
        if attendees.iter().any(|a| a.user_id == id) {
            continue;
        }
        let row = existing
            .iter()
            .find(|a| a.user_id == id && !a.is_organizer)
            .cloned()
            .unwrap_or_else(|| Attendee::invited(id));
        attendees.push(row);
    }
    attendees
}

/// A booked meeting as the calendar sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: MeetingId,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub department: Department,
    #[serde(default)]
    pub meeting_type: MeetingType,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub canceled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

impl Meeting {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }

    /// Active meetings take part in conflict checks; canceled ones do not.
    pub fn is_active(&self) -> bool {
        !self.canceled
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Everyone on the meeting except the organizer.
    pub fn invitees(&self) -> impl Iterator<Item = &Attendee> {
        self.attendees.iter().filter(|a| !a.is_organizer)
    }

    pub fn invitee_ids(&self) -> Vec<String> {
        self.invitees().map(|a| a.user_id.clone()).collect()
    }
}

/// Form fields submitted when creating or editing a meeting.
///
/// Everything except the title is optional on the wire so that the
/// required-field check can name what is missing instead of failing
/// deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingFields {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub department: Option<Department>,
    #[serde(default)]
    pub meeting_type: Option<MeetingType>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
    /// User ids to invite.
    #[serde(default)]
    pub attendees: Vec<String>,
    /// Creator of a new meeting. Ignored on update.
    #[serde(default)]
    pub organizer: Option<String>,
}

impl MeetingFields {
    pub fn from_meeting(meeting: &Meeting) -> Self {
        Self {
            title: meeting.title.clone(),
            department: Some(meeting.department),
            meeting_type: Some(meeting.meeting_type),
            start: Some(meeting.start),
            end: Some(meeting.end),
            description: meeting.description.clone(),
            attendees: meeting.invitee_ids(),
            organizer: meeting.creator.clone(),
        }
    }
}

// Request body for drag/resize
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MoveRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MoveRequest {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

// Request body for answering an invitation
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRequest {
    pub user_id: Option<String>,
    pub status: Option<String>,
}

// Request body for opening the booking modal
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum SelectionRequest {
    EmptySlot { start: DateTime<Utc>, end: DateTime<Utc> },
    ExistingEvent { id: MeetingId },
}

// Outcome of notifying attendees after a booking
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationReport {
    pub sent: usize,
    pub failed: Vec<String>,
}

// Response structure for endpoints that save a meeting
#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    pub meeting: Meeting,
    pub notifications: NotificationReport,
}
