use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::SessionError;
use crate::models::meeting::{Meeting, MeetingId, TimeRange};
use crate::services::projection::{self, DepartmentFilter};
use crate::services::scheduler::Scheduler;
use crate::services::session::{BookingSession, ClickDisambiguator, ClickOutcome, SelectionTarget};
use crate::services::validator::BusinessRules;

const SIGNAL_CAPACITY: usize = 64;
const AGENDA_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarView {
    #[default]
    Month,
    Week,
    Day,
    Agenda,
}

impl CalendarView {
    /// Dates shown for a focus date, end exclusive. Weeks start on Sunday.
    pub fn span(&self, focus: NaiveDate) -> DateSpan {
        match self {
            CalendarView::Month => {
                let first = focus.with_day(1).unwrap_or(focus);
                let next = first.checked_add_months(Months::new(1)).unwrap_or(first);
                DateSpan::new(first, next)
            }
            CalendarView::Week => {
                let offset = focus.weekday().num_days_from_sunday() as i64;
                let sunday = focus - Duration::days(offset);
                DateSpan::new(sunday, sunday + Duration::days(7))
            }
            CalendarView::Day => DateSpan::new(focus, focus + Duration::days(1)),
            CalendarView::Agenda => DateSpan::new(focus, focus + Duration::days(AGENDA_DAYS)),
        }
    }

    /// Focus date one page forward or back.
    fn step(&self, focus: NaiveDate, forward: bool) -> NaiveDate {
        let days = |n: i64| {
            if forward {
                focus + Duration::days(n)
            } else {
                focus - Duration::days(n)
            }
        };
        match self {
            CalendarView::Month => {
                let moved = if forward {
                    focus.checked_add_months(Months::new(1))
                } else {
                    focus.checked_sub_months(Months::new(1))
                };
                moved.unwrap_or(focus)
            }
            CalendarView::Week => days(7),
            CalendarView::Day => days(1),
            CalendarView::Agenda => days(AGENDA_DAYS),
        }
    }
}

impl FromStr for CalendarView {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "month" => Ok(CalendarView::Month),
            "week" => Ok(CalendarView::Week),
            "day" => Ok(CalendarView::Day),
            "agenda" => Ok(CalendarView::Agenda),
            other => Err(format!("unknown calendar view: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The span as instants, local midnight to local midnight.
    pub fn to_instants(&self, rules: &BusinessRules) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let from = rules.at_local(self.start, NaiveTime::default())?;
        let to = rules.at_local(self.end, NaiveTime::default())?;
        Some((from, to))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Today,
    Previous,
    Next,
    Date(NaiveDate),
}

/// Published whenever the calendar or its booking session changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum CalendarSignal {
    Navigated { view: CalendarView, focus: NaiveDate },
    ViewChanged { view: CalendarView, focus: NaiveDate },
    DepartmentChanged { department: Option<String> },
    SessionOpened { mode: &'static str },
    SessionClosed,
    MeetingSaved { id: MeetingId },
    MeetingCanceled { id: MeetingId },
}

/// One user's calendar: view granularity, focus date, department filter
/// and the booking modal, with changes published to subscribers.
#[derive(Debug)]
pub struct CalendarController {
    view: CalendarView,
    focus: NaiveDate,
    department: DepartmentFilter,
    session: BookingSession,
    clicks: ClickDisambiguator,
    signals: broadcast::Sender<CalendarSignal>,
}

impl CalendarController {
    pub fn new(today: NaiveDate, clicks: ClickDisambiguator) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            view: CalendarView::default(),
            focus: today,
            department: DepartmentFilter::All,
            session: BookingSession::new(),
            clicks,
            signals,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CalendarSignal> {
        self.signals.subscribe()
    }

    /// Send to every subscriber. No-op if nobody is listening.
    pub fn publish(&self, signal: CalendarSignal) {
        debug!("Calendar signal: {:?}", signal);
        let _ = self.signals.send(signal);
    }

    pub fn view(&self) -> CalendarView {
        self.view
    }

    pub fn focus(&self) -> NaiveDate {
        self.focus
    }

    pub fn session(&self) -> &BookingSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut BookingSession {
        &mut self.session
    }

    pub fn navigate(&mut self, navigation: Navigation, today: NaiveDate) {
        self.focus = match navigation {
            Navigation::Today => today,
            Navigation::Previous => self.view.step(self.focus, false),
            Navigation::Next => self.view.step(self.focus, true),
            Navigation::Date(date) => date,
        };
        self.publish(CalendarSignal::Navigated {
            view: self.view,
            focus: self.focus,
        });
    }

    pub fn set_view(&mut self, view: CalendarView) {
        self.view = view;
        self.publish(CalendarSignal::ViewChanged {
            view,
            focus: self.focus,
        });
    }

    pub fn set_department(&mut self, department: DepartmentFilter) {
        if self.department == department {
            return;
        }
        self.department = department;
        let department = match department {
            DepartmentFilter::All => None,
            DepartmentFilter::Only(dept) => Some(dept.to_string()),
        };
        self.publish(CalendarSignal::DepartmentChanged { department });
    }

    pub fn visible_range(&self) -> DateSpan {
        self.view.span(self.focus)
    }

    /// Active meetings of the selected department inside the visible range.
    pub fn visible_events(&self, scheduler: &Scheduler) -> Vec<Meeting> {
        let window = self.visible_range().to_instants(scheduler.rules());
        projection::calendar_events(scheduler.store().all(), self.department, window)
    }

    /// A click on an empty slot. The slot is checked on every click; the
    /// second click inside the window opens the modal.
    pub fn click_slot(
        &mut self,
        range: TimeRange,
        now: Instant,
        scheduler: &Scheduler,
    ) -> Result<ClickOutcome, SessionError> {
        if let Err(rejection) = scheduler.check_slot(&range, None) {
            self.clicks.cancel();
            return Err(rejection.into());
        }

        let outcome = self.clicks.on_click(range, now);
        if let ClickOutcome::Open(range) = outcome {
            self.select(SelectionTarget::EmptySlot(range), scheduler)?;
        }
        Ok(outcome)
    }

    pub fn click_event(&mut self, id: MeetingId, scheduler: &Scheduler) -> Result<(), SessionError> {
        self.clicks.cancel();
        self.select(SelectionTarget::ExistingEvent(id), scheduler)
    }

    pub fn select(&mut self, target: SelectionTarget, scheduler: &Scheduler) -> Result<(), SessionError> {
        self.session.select(target, scheduler)?;
        self.publish(CalendarSignal::SessionOpened {
            mode: self.session.state().label(),
        });
        Ok(())
    }

    pub fn cancel(&mut self) {
        self.clicks.cancel();
        let was_open = !self.session.is_idle();
        self.session.cancel();
        if was_open {
            self.publish(CalendarSignal::SessionClosed);
        }
    }
}
