use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const CLOCK_FORMAT: &str = "%H:%M";

/// `HH:MM` on the wire.
mod clock {
    use super::CLOCK_FORMAT;
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(CLOCK_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        super::parse_clock(&value).map_err(serde::de::Error::custom)
    }
}

fn parse_clock(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value.trim(), CLOCK_FORMAT)
        .map_err(|_| format!("invalid time of day: {}", value))
}

/// A recurring weekly window in which a user is (or is not) free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub id: Uuid,
    pub user_id: String,
    /// 0 is Sunday, 6 is Saturday.
    pub day_of_week: u8,
    #[serde(with = "clock")]
    pub start_time: NaiveTime,
    #[serde(with = "clock")]
    pub end_time: NaiveTime,
    pub is_available: bool,
}

impl Availability {
    /// Validate raw parts into a window. The window must be non-empty.
    pub fn from_parts(
        id: Uuid,
        user_id: &str,
        day_of_week: i64,
        start_time: &str,
        end_time: &str,
        is_available: bool,
    ) -> Result<Self, String> {
        if user_id.trim().is_empty() {
            return Err("user_id is required".to_string());
        }
        let day_of_week = u8::try_from(day_of_week)
            .ok()
            .filter(|day| *day <= 6)
            .ok_or_else(|| format!("day_of_week must be between 0 and 6, got {}", day_of_week))?;
        let start_time = parse_clock(start_time)?;
        let end_time = parse_clock(end_time)?;
        if start_time >= end_time {
            return Err(format!(
                "start_time {} must be before end_time {}",
                start_time.format(CLOCK_FORMAT),
                end_time.format(CLOCK_FORMAT)
            ));
        }

        Ok(Self {
            id,
            user_id: user_id.trim().to_string(),
            day_of_week,
            start_time,
            end_time,
            is_available,
        })
    }

    pub fn start_clock(&self) -> String {
        self.start_time.format(CLOCK_FORMAT).to_string()
    }

    pub fn end_clock(&self) -> String {
        self.end_time.format(CLOCK_FORMAT).to_string()
    }
}

/// Body of `POST /availability`. Every field is required; they are
/// optional here so the error can name the one that is missing.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub user_id: Option<String>,
    pub day_of_week: Option<i64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub is_available: Option<bool>,
}

impl AvailabilityRequest {
    pub fn into_availability(self) -> Result<Availability, String> {
        fn required<T>(value: Option<T>, name: &str) -> Result<T, String> {
            value.ok_or_else(|| format!("{} is required", name))
        }

        Availability::from_parts(
            Uuid::new_v4(),
            &required(self.user_id, "userId")?,
            required(self.day_of_week, "dayOfWeek")?,
            &required(self.start_time, "startTime")?,
            &required(self.end_time, "endTime")?,
            required(self.is_available, "isAvailable")?,
        )
    }
}

// Query parameters for the availability endpoint
#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityParams {
    pub user_id: Option<String>,
}
