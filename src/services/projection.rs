use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::models::common::PaginationParams;
use crate::models::meeting::{Department, Meeting};
use crate::services::validator::BusinessRules;

/// Department selector from the sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepartmentFilter {
    #[default]
    All,
    Only(Department),
}

impl DepartmentFilter {
    pub fn matches(&self, meeting: &Meeting) -> bool {
        match self {
            DepartmentFilter::All => true,
            DepartmentFilter::Only(dept) => meeting.department == *dept,
        }
    }
}

impl FromStr for DepartmentFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            Ok(DepartmentFilter::All)
        } else {
            value.parse().map(DepartmentFilter::Only)
        }
    }
}

/// Sidebar status tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Upcoming,
    Done,
    Canceled,
}

impl StatusFilter {
    pub fn matches(&self, meeting: &Meeting, now: DateTime<Utc>) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Upcoming => meeting.start >= now && !meeting.canceled,
            StatusFilter::Done => meeting.end < now && !meeting.canceled,
            StatusFilter::Canceled => meeting.canceled,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(StatusFilter::All),
            "upcoming" => Ok(StatusFilter::Upcoming),
            "done" => Ok(StatusFilter::Done),
            "canceled" | "cancelled" => Ok(StatusFilter::Canceled),
            other => Err(format!("unknown status filter: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeetingQuery {
    pub department: DepartmentFilter,
    pub search: Option<String>,
    pub status: StatusFilter,
}

impl MeetingQuery {
    pub fn matches(&self, meeting: &Meeting, now: DateTime<Utc>) -> bool {
        let search_hit = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => meeting
                .title
                .to_lowercase()
                .contains(&term.to_lowercase()),
            _ => true,
        };
        self.department.matches(meeting) && search_hit && self.status.matches(meeting, now)
    }
}

/// Meetings matching the sidebar filters, in store order.
pub fn filter_meetings(meetings: &[Meeting], query: &MeetingQuery, now: DateTime<Utc>) -> Vec<Meeting> {
    meetings
        .iter()
        .filter(|meeting| query.matches(meeting, now))
        .cloned()
        .collect()
}

/// What the calendar renders: active meetings of the selected department,
/// optionally limited to those touching `[from, to)`.
pub fn calendar_events(
    meetings: &[Meeting],
    department: DepartmentFilter,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Vec<Meeting> {
    meetings
        .iter()
        .filter(|meeting| meeting.is_active() && department.matches(meeting))
        .filter(|meeting| match window {
            Some((from, to)) => meeting.start < to && meeting.end > from,
            None => true,
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

pub fn paginate<T>(items: Vec<T>, params: &PaginationParams) -> Page<T> {
    let page = params.page.max(1);
    let page_size = params.page_size.clamp(1, 100);
    let total = items.len();
    let total_pages = total.div_ceil(page_size);

    let items = items
        .into_iter()
        .skip(page.saturating_sub(1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    Page {
        items,
        page,
        page_size,
        total,
        total_pages,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeDistribution {
    pub morning: usize,
    pub afternoon: usize,
    pub evening: usize,
}

/// Department-level meeting statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Analytics {
    pub total_meetings: usize,
    pub completed_meetings: usize,
    pub canceled_meetings: usize,
    pub weekly_meetings: usize,
    pub monthly_meetings: usize,
    pub completion_rate: u32,
    pub average_duration_minutes: i64,
    pub by_department: BTreeMap<String, usize>,
    pub by_meeting_type: BTreeMap<String, usize>,
    pub time_distribution: TimeDistribution,
}

/// Summarize meetings for the analytics page. Canceled meetings are only
/// counted in `canceled_meetings`.
pub fn analytics(
    meetings: &[Meeting],
    department: DepartmentFilter,
    now: DateTime<Utc>,
    rules: &BusinessRules,
) -> Analytics {
    let scoped: Vec<&Meeting> = meetings.iter().filter(|m| department.matches(m)).collect();
    let canceled_meetings = scoped.iter().filter(|m| m.canceled).count();
    let active: Vec<&Meeting> = scoped.into_iter().filter(|m| m.is_active()).collect();

    let total_meetings = active.len();
    let completed_meetings = active.iter().filter(|m| m.end < now).count();
    let last_week = now - Duration::days(7);
    let last_month = now - Duration::days(30);

    let mut report = Analytics {
        total_meetings,
        completed_meetings,
        canceled_meetings,
        weekly_meetings: active.iter().filter(|m| m.start >= last_week).count(),
        monthly_meetings: active.iter().filter(|m| m.start >= last_month).count(),
        ..Default::default()
    };

    if total_meetings == 0 {
        return report;
    }

    report.completion_rate =
        ((completed_meetings as f64 / total_meetings as f64) * 100.0).round() as u32;
    let total_minutes: i64 = active.iter().map(|m| m.duration_minutes()).sum();
    report.average_duration_minutes =
        (total_minutes as f64 / total_meetings as f64).round() as i64;

    for meeting in &active {
        *report
            .by_department
            .entry(meeting.department.to_string())
            .or_default() += 1;
        *report
            .by_meeting_type
            .entry(meeting.meeting_type.to_string())
            .or_default() += 1;

        match rules.local_time(meeting.start).hour() {
            9..=11 => report.time_distribution.morning += 1,
            12..=16 => report.time_distribution.afternoon += 1,
            _ => report.time_distribution.evening += 1,
        }
    }

    report
}
