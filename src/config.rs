use chrono::{Duration, FixedOffset, NaiveTime};
use dotenv::dotenv;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::services::session::DEFAULT_CLICK_WINDOW;
use crate::services::validator::{BusinessRules, ConflictPolicy};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_CSV_PATH: &str = "meetings.csv";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 5;
const MAX_MIN_DURATION_MINUTES: i64 = 24 * 60;

/// Service configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub is_production: bool,
    /// Remote data store. When unset meetings are kept in `csv_path`.
    pub data_store_url: Option<String>,
    /// Service token used to load meetings at startup.
    pub data_store_token: Option<String>,
    pub csv_path: String,
    pub notify_url: Option<String>,
    pub rules: BusinessRules,
    pub upstream_timeout: std::time::Duration,
    pub click_window: std::time::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let bind_addr = parse_or(&var("BIND_ADDR"), "BIND_ADDR", DEFAULT_BIND_ADDR.parse().ok())?;
        let is_production = var("ENVIRONMENT")
            .map(|val| val.to_lowercase() == "production")
            .unwrap_or(false);

        let defaults = BusinessRules::default();
        let opens_at = match var("BUSINESS_HOURS_START") {
            Some(value) => parse_clock(&value, "BUSINESS_HOURS_START")?,
            None => defaults.opens_at,
        };
        let closes_at = match var("BUSINESS_HOURS_END") {
            Some(value) => parse_clock(&value, "BUSINESS_HOURS_END")?,
            None => defaults.closes_at,
        };
        if opens_at >= closes_at {
            return Err(ConfigError::EmptyBusinessHours {
                start: opens_at.format("%H:%M").to_string(),
                end: closes_at.format("%H:%M").to_string(),
            });
        }

        let min_minutes: i64 = parse_or(
            &var("MIN_DURATION_MINUTES"),
            "MIN_DURATION_MINUTES",
            Some(defaults.min_duration_minutes()),
        )?;
        if !(1..=MAX_MIN_DURATION_MINUTES).contains(&min_minutes) {
            return Err(ConfigError::Invalid {
                name: "MIN_DURATION_MINUTES",
                value: min_minutes.to_string(),
            });
        }
        let conflict_policy: ConflictPolicy =
            parse_or(&var("CONFLICT_POLICY"), "CONFLICT_POLICY", Some(defaults.conflict_policy))?;
        let utc_offset = match var("UTC_OFFSET") {
            Some(value) => parse_offset(&value).ok_or(ConfigError::Invalid {
                name: "UTC_OFFSET",
                value,
            })?,
            None => defaults.utc_offset,
        };

        let timeout_secs: u64 = parse_or(
            &var("UPSTREAM_TIMEOUT_SECS"),
            "UPSTREAM_TIMEOUT_SECS",
            Some(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        )?;
        let click_ms: u64 = parse_or(
            &var("CLICK_WINDOW_MS"),
            "CLICK_WINDOW_MS",
            Some(DEFAULT_CLICK_WINDOW.as_millis() as u64),
        )?;

        Ok(Self {
            bind_addr,
            is_production,
            data_store_url: var("DATA_STORE_URL"),
            data_store_token: var("DATA_STORE_TOKEN"),
            csv_path: var("MEETINGS_CSV_PATH").unwrap_or_else(|| DEFAULT_CSV_PATH.to_string()),
            notify_url: var("NOTIFY_URL"),
            rules: BusinessRules {
                opens_at,
                closes_at,
                min_duration: Duration::minutes(min_minutes),
                conflict_policy,
                utc_offset,
            },
            upstream_timeout: std::time::Duration::from_secs(timeout_secs),
            click_window: std::time::Duration::from_millis(click_ms),
        })
    }
}

fn parse_or<T: FromStr>(
    value: &Option<String>,
    name: &'static str,
    default: Option<T>,
) -> Result<T, ConfigError> {
    let invalid = |value: &str| ConfigError::Invalid {
        name,
        value: value.to_string(),
    };
    match value {
        Some(value) => value.trim().parse().map_err(|_| invalid(value)),
        None => default.ok_or_else(|| invalid("")),
    }
}

fn parse_clock(value: &str, name: &'static str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

/// `+HH:MM`, `-HH:MM` or `Z`.
fn parse_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
