use async_trait::async_trait;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::BearerToken;
use crate::client::{MeetingBackend, RawAvailability};
use crate::error::UpstreamError;
use crate::models::availability::Availability;
use crate::models::meeting::{AttendanceStatus, Attendee, Meeting, MeetingId, MeetingType};

const ORGANIZER_MARK: &str = "organizer";

const HEADERS: [&str; 13] = [
    "id",
    "title",
    "start_time",
    "end_time",
    "department",
    "meeting_type",
    "color",
    "canceled",
    "description",
    "organizer_id",
    "attendees",
    "created_at",
    "canceled_at",
];

// Record to be stored in CSV
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MeetingRecord {
    pub id: String,
    pub title: String,
    pub start_time: String, // RFC 3339
    pub end_time: String,   // RFC 3339
    pub department: String,
    pub meeting_type: String,
    pub color: String,
    pub canceled: bool,
    pub description: String,
    pub organizer_id: String,
    pub attendees: String, // id:status[:organizer], semicolon separated
    pub created_at: String,
    pub canceled_at: String, // empty if not canceled
}

impl MeetingRecord {
    fn from_meeting(meeting: &Meeting, created_at: &str, canceled_at: &str) -> Self {
        Self {
            id: meeting.id.to_string(),
            title: meeting.title.clone(),
            start_time: meeting.start.to_rfc3339(),
            end_time: meeting.end.to_rfc3339(),
            department: meeting.department.to_string(),
            meeting_type: meeting.meeting_type.to_string(),
            color: meeting.color.clone(),
            canceled: meeting.canceled,
            description: meeting.description.clone().unwrap_or_default(),
            organizer_id: meeting.creator.clone().unwrap_or_default(),
            attendees: meeting
                .attendees
                .iter()
                .map(encode_attendee)
                .collect::<Vec<_>>()
                .join(";"),
            created_at: created_at.to_string(),
            canceled_at: canceled_at.to_string(),
        }
    }
}

fn encode_attendee(attendee: &Attendee) -> String {
    if attendee.is_organizer {
        format!("{}:{}:{}", attendee.user_id, attendee.status, ORGANIZER_MARK)
    } else {
        format!("{}:{}", attendee.user_id, attendee.status)
    }
}

/// A bare id is an invitation without an answer.
fn decode_attendee(entry: &str) -> Result<Attendee, String> {
    let mut parts = entry.splitn(3, ':');
    let user_id = parts.next().unwrap_or_default().to_string();
    let status = match parts.next() {
        Some(status) => status.parse::<AttendanceStatus>()?,
        None => AttendanceStatus::Invited,
    };
    let is_organizer = parts.next() == Some(ORGANIZER_MARK);
    Ok(Attendee {
        user_id,
        status,
        is_organizer,
    })
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_instant(value: &str, name: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid {} {}: {}", name, value, e))
}

impl TryFrom<&MeetingRecord> for Meeting {
    type Error = String;

    fn try_from(record: &MeetingRecord) -> Result<Self, Self::Error> {
        let meeting_type: MeetingType = if record.meeting_type.is_empty() {
            MeetingType::default()
        } else {
            record.meeting_type.parse()?
        };

        Ok(Meeting {
            id: record
                .id
                .parse()
                .map_err(|e| format!("invalid meeting id {}: {}", record.id, e))?,
            title: record.title.clone(),
            start: parse_instant(&record.start_time, "start_time")?,
            end: parse_instant(&record.end_time, "end_time")?,
            department: record.department.parse()?,
            meeting_type,
            color: non_empty(&record.color).unwrap_or_else(|| meeting_type.color().to_string()),
            canceled: record.canceled,
            description: non_empty(&record.description),
            creator: non_empty(&record.organizer_id),
            attendees: record
                .attendees
                .split(';')
                .filter(|a| !a.is_empty())
                .map(decode_attendee)
                .collect::<Result<_, _>>()?,
        })
    }
}

fn io_error(context: &str, e: impl std::fmt::Display) -> UpstreamError {
    UpstreamError::RequestFailed(format!("{}: {}", context, e))
}

/// Local stand-in for the data store, persisting meetings to a CSV file.
///
/// Weekly availability lives in a second file next to it, created on the
/// first write.
pub struct CsvMeetingStore {
    csv_path: PathBuf,
    availability_path: PathBuf,
    file_mutex: Mutex<()>,
}

impl CsvMeetingStore {
    /// Open the store, creating the file (and its directory) with headers
    /// when it does not exist yet.
    pub fn new(csv_path: impl AsRef<Path>) -> Result<Self, UpstreamError> {
        let csv_path = csv_path.as_ref().to_path_buf();

        if !csv_path.exists() {
            info!("Creating new meetings database file at {}", csv_path.display());

            if let Some(dir) = csv_path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir).map_err(|e| io_error("Failed to create data directory", e))?;
            }

            let file = File::create(&csv_path).map_err(|e| io_error("Failed to create database file", e))?;
            let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
            writer
                .write_record(HEADERS)
                .map_err(|e| io_error("Failed to write headers", e))?;
            writer.flush().map_err(|e| io_error("Failed to flush headers", e))?;
        }

        Ok(Self {
            availability_path: csv_path.with_extension("availability.csv"),
            csv_path,
            file_mutex: Mutex::new(()),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, UpstreamError> {
        self.file_mutex
            .lock()
            .map_err(|e| io_error("Failed to acquire mutex", e))
    }

    fn read_records(&self) -> Result<Vec<MeetingRecord>, UpstreamError> {
        let file = File::open(&self.csv_path).map_err(|e| io_error("Failed to open database file", e))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        reader
            .deserialize::<MeetingRecord>()
            .map(|result| result.map_err(|e| io_error("Failed to read record", e)))
            .collect()
    }

    fn write_records(&self, records: &[MeetingRecord]) -> Result<(), UpstreamError> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.csv_path)
            .map_err(|e| io_error("Failed to open database file for writing", e))?;

        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
        if records.is_empty() {
            writer
                .write_record(HEADERS)
                .map_err(|e| io_error("Failed to write headers", e))?;
        }
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| io_error("Failed to serialize record", e))?;
        }
        writer.flush().map_err(|e| io_error("Failed to flush writer", e))?;
        Ok(())
    }

    fn append_record(&self, record: &MeetingRecord) -> Result<(), UpstreamError> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .map_err(|e| io_error("Failed to open database file", e))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer
            .serialize(record)
            .map_err(|e| io_error("Failed to serialize record", e))?;
        writer.flush().map_err(|e| io_error("Failed to flush writer", e))?;

        info!("Stored meeting record {} ({})", record.id, record.title);
        Ok(())
    }

    /// Rewrite the record with `id` in place.
    fn modify<F>(&self, id: MeetingId, change: F) -> Result<MeetingRecord, UpstreamError>
    where
        F: FnOnce(&MeetingRecord) -> MeetingRecord,
    {
        let _lock = self.lock()?;
        let mut records = self.read_records()?;
        let key = id.to_string();

        let record = records
            .iter_mut()
            .find(|record| record.id == key)
            .ok_or_else(|| UpstreamError::RequestFailed(format!("meeting {} not found", id)))?;
        *record = change(record);
        let updated = record.clone();

        self.write_records(&records)?;
        Ok(updated)
    }

    fn read_availability(&self) -> Result<Vec<RawAvailability>, UpstreamError> {
        if !self.availability_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.availability_path)
            .map_err(|e| io_error("Failed to open availability file", e))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        reader
            .deserialize::<RawAvailability>()
            .map(|result| result.map_err(|e| io_error("Failed to read availability record", e)))
            .collect()
    }

    fn append_availability(&self, record: &RawAvailability) -> Result<(), UpstreamError> {
        let is_new = !self.availability_path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.availability_path)
            .map_err(|e| io_error("Failed to open availability file", e))?;

        let mut writer = WriterBuilder::new().has_headers(is_new).from_writer(file);
        writer
            .serialize(record)
            .map_err(|e| io_error("Failed to serialize availability record", e))?;
        writer.flush().map_err(|e| io_error("Failed to flush writer", e))?;
        Ok(())
    }

    pub fn load_meetings(&self) -> Result<Vec<Meeting>, UpstreamError> {
        let _lock = self.lock()?;
        let records = self.read_records()?;

        let mut meetings = Vec::with_capacity(records.len());
        for record in &records {
            match Meeting::try_from(record) {
                Ok(meeting) => meetings.push(meeting),
                Err(e) => warn!("Skipping unreadable meeting record: {}", e),
            }
        }
        Ok(meetings)
    }
}

#[async_trait]
impl MeetingBackend for CsvMeetingStore {
    async fn fetch_meetings(&self, _token: &BearerToken) -> Result<Vec<Meeting>, UpstreamError> {
        let meetings = self.load_meetings()?;
        debug!("Loaded {} meetings from {}", meetings.len(), self.csv_path.display());
        Ok(meetings)
    }

    async fn create_meeting(&self, _token: &BearerToken, meeting: &Meeting) -> Result<Meeting, UpstreamError> {
        let _lock = self.lock()?;
        let now = Utc::now().to_rfc3339();
        self.append_record(&MeetingRecord::from_meeting(meeting, &now, ""))?;
        Ok(meeting.clone())
    }

    async fn update_meeting(&self, _token: &BearerToken, meeting: &Meeting) -> Result<Meeting, UpstreamError> {
        self.modify(meeting.id, |existing| {
            MeetingRecord::from_meeting(meeting, &existing.created_at, &existing.canceled_at)
        })?;
        info!("Updated meeting record {}", meeting.id);
        Ok(meeting.clone())
    }

    async fn cancel_meeting(&self, _token: &BearerToken, id: MeetingId) -> Result<(), UpstreamError> {
        self.modify(id, |existing| {
            if existing.canceled {
                return existing.clone();
            }
            MeetingRecord {
                canceled: true,
                canceled_at: Utc::now().to_rfc3339(),
                ..existing.clone()
            }
        })?;
        info!("Marked meeting {} as canceled", id);
        Ok(())
    }

    async fn fetch_availability(&self, _token: &BearerToken, user_id: &str) -> Result<Vec<Availability>, UpstreamError> {
        let _lock = self.lock()?;
        let mut slots = Vec::new();
        for record in self.read_availability()? {
            if record.user_id != user_id {
                continue;
            }
            match Availability::try_from(record) {
                Ok(slot) => slots.push(slot),
                Err(e) => warn!("Skipping unreadable availability record: {}", e),
            }
        }
        Ok(slots)
    }

    async fn create_availability(
        &self,
        _token: &BearerToken,
        availability: &Availability,
    ) -> Result<Availability, UpstreamError> {
        let _lock = self.lock()?;
        self.append_availability(&RawAvailability::from(availability))?;
        info!(
            "Stored availability {} for {} on day {}",
            availability.id, availability.user_id, availability.day_of_week
        );
        Ok(availability.clone())
    }
}
