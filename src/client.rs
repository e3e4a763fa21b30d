use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::BearerToken;
use crate::error::UpstreamError;
use crate::models::availability::Availability;
use crate::models::meeting::{AttendanceStatus, Attendee, Meeting, MeetingId, MeetingType};

/// Attendees come back either as bare ids or as attendee rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawAttendee {
    Id(String),
    Row {
        user_id: String,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        is_organizer: bool,
    },
}

impl From<RawAttendee> for Attendee {
    fn from(raw: RawAttendee) -> Self {
        match raw {
            RawAttendee::Id(id) => Attendee::invited(id),
            RawAttendee::Row {
                user_id,
                status,
                is_organizer,
            } => {
                // Unknown answers count as no answer yet
                let status = status
                    .as_deref()
                    .and_then(|s| s.parse::<AttendanceStatus>().ok())
                    .unwrap_or_default();
                Attendee {
                    user_id,
                    status,
                    is_organizer,
                }
            }
        }
    }
}

impl From<&Attendee> for RawAttendee {
    fn from(attendee: &Attendee) -> Self {
        RawAttendee::Row {
            user_id: attendee.user_id.clone(),
            status: Some(attendee.status.to_string()),
            is_organizer: attendee.is_organizer,
        }
    }
}

// Weekly availability row as the data store (and the CSV file) holds it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawAvailability {
    pub id: String,
    pub user_id: String,
    pub day_of_week: i64,
    pub start_time: String,
    pub end_time: String,
    pub is_available: bool,
}

impl TryFrom<RawAvailability> for Availability {
    type Error = String;

    fn try_from(raw: RawAvailability) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .parse()
            .map_err(|e| format!("invalid availability id {}: {}", raw.id, e))?;
        Availability::from_parts(
            id,
            &raw.user_id,
            raw.day_of_week,
            &raw.start_time,
            &raw.end_time,
            raw.is_available,
        )
    }
}

impl From<&Availability> for RawAvailability {
    fn from(availability: &Availability) -> Self {
        Self {
            id: availability.id.to_string(),
            user_id: availability.user_id.clone(),
            day_of_week: i64::from(availability.day_of_week),
            start_time: availability.start_clock(),
            end_time: availability.end_clock(),
            is_available: availability.is_available,
        }
    }
}

// Meeting record as the data store returns it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawMeeting {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub organizer_id: Option<String>,
    #[serde(default)]
    pub attendees: Vec<RawAttendee>,
    #[serde(default)]
    pub canceled: bool,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub meeting_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TryFrom<RawMeeting> for Meeting {
    type Error = String;

    fn try_from(raw: RawMeeting) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .parse::<MeetingId>()
            .map_err(|e| format!("invalid meeting id {}: {}", raw.id, e))?;
        let department = raw
            .department
            .as_deref()
            .ok_or_else(|| format!("meeting {} has no department", raw.id))?
            .parse()?;
        let meeting_type = match raw.meeting_type.as_deref() {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => MeetingType::default(),
        };

        Ok(Meeting {
            id,
            title: raw.title,
            start: raw.start_time,
            end: raw.end_time,
            department,
            meeting_type,
            color: raw
                .color
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| meeting_type.color().to_string()),
            canceled: raw.canceled,
            description: raw.description,
            creator: raw.organizer_id,
            attendees: raw.attendees.into_iter().map(Attendee::from).collect(),
        })
    }
}

// Body of create and update requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeetingPayload {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub color: String,
    pub department: String,
    pub meeting_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer_id: Option<String>,
    pub attendees: Vec<RawAttendee>,
    pub canceled: bool,
}

impl From<&Meeting> for MeetingPayload {
    fn from(meeting: &Meeting) -> Self {
        Self {
            title: meeting.title.clone(),
            description: meeting.description.clone(),
            start_time: meeting.start,
            end_time: meeting.end,
            color: meeting.color.clone(),
            department: meeting.department.to_string(),
            meeting_type: meeting.meeting_type.to_string(),
            organizer_id: meeting.creator.clone(),
            attendees: meeting.attendees.iter().map(RawAttendee::from).collect(),
            canceled: meeting.canceled,
        }
    }
}

/// The external data store that owns meeting persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MeetingBackend: Send + Sync {
    async fn fetch_meetings(&self, token: &BearerToken) -> Result<Vec<Meeting>, UpstreamError>;

    /// Persist a new meeting and return the record as stored.
    async fn create_meeting(&self, token: &BearerToken, meeting: &Meeting) -> Result<Meeting, UpstreamError>;

    async fn update_meeting(&self, token: &BearerToken, meeting: &Meeting) -> Result<Meeting, UpstreamError>;

    async fn cancel_meeting(&self, token: &BearerToken, id: MeetingId) -> Result<(), UpstreamError>;

    async fn fetch_availability(&self, token: &BearerToken, user_id: &str) -> Result<Vec<Availability>, UpstreamError>;

    async fn create_availability(
        &self,
        token: &BearerToken,
        availability: &Availability,
    ) -> Result<Availability, UpstreamError>;
}

/// Client for the remote meeting data store
pub struct DataStoreClient {
    client: Client,
    base_url: String,
}

impl DataStoreClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(request: RequestBuilder, token: &BearerToken) -> Result<Response, UpstreamError> {
        let res = request
            .header("Content-Type", "application/json")
            .bearer_auth(token.as_str())
            .send()
            .await?;
        info!("Response received with status: {}", res.status());

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!("Data store returned {}: {}", status, body);
            return Err(UpstreamError::RequestFailed(format!("status {}: {}", status, body)));
        }
        Ok(res)
    }

    async fn read_meeting(res: Response) -> Result<Meeting, UpstreamError> {
        let raw = res.json::<RawMeeting>().await?;
        Meeting::try_from(raw).map_err(UpstreamError::RequestFailed)
    }
}

#[async_trait]
impl MeetingBackend for DataStoreClient {
    async fn fetch_meetings(&self, token: &BearerToken) -> Result<Vec<Meeting>, UpstreamError> {
        let url = self.url("/meetings/");
        info!("Fetching meetings from data store");
        debug!("API URL: {}", url);

        let res = Self::send(self.client.get(&url), token).await?;
        let raw = res.json::<Vec<RawMeeting>>().await?;

        let mut meetings = Vec::with_capacity(raw.len());
        for record in raw {
            match Meeting::try_from(record) {
                Ok(meeting) => meetings.push(meeting),
                Err(e) => warn!("Skipping unreadable meeting record: {}", e),
            }
        }
        Ok(meetings)
    }

    async fn create_meeting(&self, token: &BearerToken, meeting: &Meeting) -> Result<Meeting, UpstreamError> {
        let url = self.url("/meetings/create");
        info!("Creating meeting '{}' in data store", meeting.title);
        debug!("API URL: {}", url);

        let payload = MeetingPayload::from(meeting);
        let res = Self::send(self.client.post(&url).json(&payload), token).await?;
        Self::read_meeting(res).await
    }

    async fn update_meeting(&self, token: &BearerToken, meeting: &Meeting) -> Result<Meeting, UpstreamError> {
        let url = self.url(&format!("/meetings/{}", meeting.id));
        info!("Updating meeting {} in data store", meeting.id);
        debug!("API URL: {}", url);

        let payload = MeetingPayload::from(meeting);
        let res = Self::send(self.client.put(&url).json(&payload), token).await?;
        Self::read_meeting(res).await
    }

    async fn cancel_meeting(&self, token: &BearerToken, id: MeetingId) -> Result<(), UpstreamError> {
        let url = self.url(&format!("/meetings/{}", id));
        info!("Canceling meeting {} in data store", id);
        debug!("API URL: {}", url);

        Self::send(self.client.delete(&url), token).await?;
        Ok(())
    }

    async fn fetch_availability(&self, token: &BearerToken, user_id: &str) -> Result<Vec<Availability>, UpstreamError> {
        let url = self.url("/availability");
        info!("Fetching availability for {} from data store", user_id);
        debug!("API URL: {}", url);

        let request = self.client.get(&url).query(&[("user_id", user_id)]);
        let raw = Self::send(request, token).await?.json::<Vec<RawAvailability>>().await?;

        let mut slots = Vec::with_capacity(raw.len());
        for record in raw {
            match Availability::try_from(record) {
                Ok(slot) => slots.push(slot),
                Err(e) => warn!("Skipping unreadable availability record: {}", e),
            }
        }
        Ok(slots)
    }

    async fn create_availability(
        &self,
        token: &BearerToken,
        availability: &Availability,
    ) -> Result<Availability, UpstreamError> {
        let url = self.url("/availability");
        info!("Creating availability for {} in data store", availability.user_id);
        debug!("API URL: {}", url);

        let payload = RawAvailability::from(availability);
        let res = Self::send(self.client.post(&url).json(&payload), token).await?;
        let raw = res.json::<RawAvailability>().await?;
        Availability::try_from(raw).map_err(UpstreamError::RequestFailed)
    }
}

/// A message for one attendee.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn meeting_invite(to: &str, meeting: &Meeting) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("Meeting invitation: {}", meeting.title),
            body: format!(
                "You have been invited to \"{}\" ({}) from {} to {}.",
                meeting.title,
                meeting.department,
                meeting.start.to_rfc3339(),
                meeting.end.to_rfc3339()
            ),
        }
    }
}

/// Email delivery collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), UpstreamError>;
}

/// Posts notifications as JSON to the email service.
pub struct EmailClient {
    client: Client,
    url: String,
}

impl EmailClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for EmailClient {
    async fn send(&self, notification: &Notification) -> Result<(), UpstreamError> {
        debug!("Sending notification to {}", notification.to);
        let res = self.client.post(&self.url).json(notification).send().await?;
        if !res.status().is_success() {
            return Err(UpstreamError::RequestFailed(format!(
                "email service returned {}",
                res.status()
            )));
        }
        Ok(())
    }
}

/// Stand-in used when no email service is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), UpstreamError> {
        info!(
            "Notification for {} not delivered (no email service): {}",
            notification.to, notification.subject
        );
        Ok(())
    }
}
