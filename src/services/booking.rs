use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use crate::auth::BearerToken;
use crate::client::{MeetingBackend, Notification, Notifier};
use crate::error::{BookingError, SessionError, UpstreamError};
use crate::models::availability::Availability;
use crate::models::common::PaginationParams;
use crate::models::meeting::{
    AttendanceStatus, Attendee, Meeting, MeetingFields, MeetingId, NotificationReport, TimeRange,
};
use crate::services::calendar::{
    CalendarController, CalendarSignal, CalendarView, DateSpan, Navigation,
};
use crate::services::projection::{self, Analytics, DepartmentFilter, MeetingQuery, Page};
use crate::services::scheduler::Scheduler;
use crate::services::session::{
    ClickDisambiguator, ClickOutcome, SelectionTarget, SessionForm, SessionState,
};

/// What the calendar shows a user right now.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSnapshot {
    pub view: CalendarView,
    pub focus: chrono::NaiveDate,
    pub range: DateSpan,
    pub events: Vec<Meeting>,
    pub session: SessionState,
}

fn log_failure(action: &str, err: &BookingError) {
    match err {
        BookingError::Rejected(rejection) => warn!("{} rejected: {}", action, rejection),
        BookingError::NotFound(id) => warn!("{} failed: meeting {} not found", action, id),
        BookingError::NotAttendee { .. } => warn!("{} failed: {}", action, err),
        BookingError::UpstreamRequestFailed(_) | BookingError::UpstreamTimeout => {
            error!("{} failed: {}", action, err)
        }
    }
}

/// Serializes every booking mutation and commits it to the data store.
///
/// The scheduler lock is held from validation until the data store has
/// answered, so two conflicting requests cannot both pass validation.
/// When both locks are needed, `sessions` is taken before `scheduler`.
pub struct BookingService {
    scheduler: Mutex<Scheduler>,
    sessions: Mutex<HashMap<BearerToken, CalendarController>>,
    backend: Arc<dyn MeetingBackend>,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
    click_window: Duration,
}

impl BookingService {
    pub fn new(
        scheduler: Scheduler,
        backend: Arc<dyn MeetingBackend>,
        notifier: Arc<dyn Notifier>,
        timeout: Duration,
        click_window: Duration,
    ) -> Self {
        Self {
            scheduler: Mutex::new(scheduler),
            sessions: Mutex::new(HashMap::new()),
            backend,
            notifier,
            timeout,
            click_window,
        }
    }

    /// Bound an upstream call by the configured timeout.
    async fn call<T, F>(&self, request: F) -> Result<T, BookingError>
    where
        F: Future<Output = Result<T, UpstreamError>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result.map_err(BookingError::from),
            Err(_) => Err(BookingError::UpstreamTimeout),
        }
    }

    /// Replace the event store with what the data store currently holds.
    pub async fn refresh(&self, token: &BearerToken) -> Result<usize, BookingError> {
        let mut scheduler = self.scheduler.lock().await;
        let meetings = self
            .call(self.backend.fetch_meetings(token))
            .await
            .inspect_err(|e| log_failure("Refresh", e))?;
        let count = meetings.len();
        scheduler.replace_all(meetings);
        Ok(count)
    }

    async fn commit_create(
        &self,
        scheduler: &mut Scheduler,
        token: &BearerToken,
        planned: Meeting,
    ) -> Result<Meeting, BookingError> {
        let stored = self.call(self.backend.create_meeting(token, &planned)).await?;
        scheduler.apply(stored.clone());
        info!("Created meeting {} ({})", stored.id, stored.title);
        Ok(stored)
    }

    async fn commit_update(
        &self,
        scheduler: &mut Scheduler,
        token: &BearerToken,
        planned: Meeting,
    ) -> Result<Meeting, BookingError> {
        let stored = self.call(self.backend.update_meeting(token, &planned)).await?;
        scheduler.apply(stored.clone());
        info!("Updated meeting {} ({})", stored.id, stored.title);
        Ok(stored)
    }

    async fn commit_cancel(
        &self,
        scheduler: &mut Scheduler,
        token: &BearerToken,
        id: MeetingId,
    ) -> Result<Meeting, BookingError> {
        let planned = scheduler.plan_cancel(id)?;
        self.call(self.backend.cancel_meeting(token, id)).await?;
        scheduler.apply(planned.clone());
        info!("Canceled meeting {} ({})", planned.id, planned.title);
        Ok(planned)
    }

    /// Create a meeting, then notify its attendees.
    pub async fn create(
        &self,
        token: &BearerToken,
        fields: &MeetingFields,
    ) -> Result<(Meeting, NotificationReport), BookingError> {
        let meeting = {
            let mut scheduler = self.scheduler.lock().await;
            let planned = scheduler
                .plan_create(fields)
                .inspect_err(|e| log_failure("Create", e))?;
            self.commit_create(&mut scheduler, token, planned)
                .await
                .inspect_err(|e| log_failure("Create", e))?
        };
        self.publish(token, CalendarSignal::MeetingSaved { id: meeting.id }).await;

        let report = self.notify(&meeting).await;
        Ok((meeting, report))
    }

    pub async fn update(
        &self,
        token: &BearerToken,
        id: MeetingId,
        fields: &MeetingFields,
    ) -> Result<Meeting, BookingError> {
        let meeting = {
            let mut scheduler = self.scheduler.lock().await;
            let planned = scheduler
                .plan_update(id, fields)
                .inspect_err(|e| log_failure("Update", e))?;
            self.commit_update(&mut scheduler, token, planned)
                .await
                .inspect_err(|e| log_failure("Update", e))?
        };
        self.publish(token, CalendarSignal::MeetingSaved { id }).await;
        Ok(meeting)
    }

    /// Drag or resize.
    pub async fn move_meeting(
        &self,
        token: &BearerToken,
        id: MeetingId,
        range: TimeRange,
    ) -> Result<Meeting, BookingError> {
        let meeting = {
            let mut scheduler = self.scheduler.lock().await;
            let planned = scheduler
                .plan_move(id, range.start, range.end)
                .inspect_err(|e| log_failure("Move", e))?;
            self.commit_update(&mut scheduler, token, planned)
                .await
                .inspect_err(|e| log_failure("Move", e))?
        };
        self.publish(token, CalendarSignal::MeetingSaved { id }).await;
        Ok(meeting)
    }

    pub async fn cancel(&self, token: &BearerToken, id: MeetingId) -> Result<Meeting, BookingError> {
        let meeting = {
            let mut scheduler = self.scheduler.lock().await;
            self.commit_cancel(&mut scheduler, token, id)
                .await
                .inspect_err(|e| log_failure("Cancel", e))?
        };
        self.publish(token, CalendarSignal::MeetingCanceled { id }).await;
        Ok(meeting)
    }

    /// Record an attendee's answer to an invitation.
    pub async fn respond(
        &self,
        token: &BearerToken,
        id: MeetingId,
        user_id: &str,
        status: AttendanceStatus,
    ) -> Result<Attendee, BookingError> {
        let meeting = {
            let mut scheduler = self.scheduler.lock().await;
            let planned = scheduler
                .plan_attendance(id, user_id, status)
                .inspect_err(|e| log_failure("Attendance", e))?;
            self.commit_update(&mut scheduler, token, planned)
                .await
                .inspect_err(|e| log_failure("Attendance", e))?
        };
        info!("{} answered {} for meeting {}", user_id, status, id);
        self.publish(token, CalendarSignal::MeetingSaved { id }).await;

        meeting
            .attendees
            .into_iter()
            .find(|a| a.user_id == user_id)
            .ok_or_else(|| BookingError::NotAttendee {
                meeting: id,
                user: user_id.to_string(),
            })
    }

    /// A user's weekly availability, by day then start time.
    pub async fn availability(&self, token: &BearerToken, user_id: &str) -> Result<Vec<Availability>, BookingError> {
        let mut slots = self
            .call(self.backend.fetch_availability(token, user_id))
            .await
            .inspect_err(|e| log_failure("Availability", e))?;
        slots.sort_by_key(|slot| (slot.day_of_week, slot.start_time));
        Ok(slots)
    }

    pub async fn create_availability(
        &self,
        token: &BearerToken,
        availability: &Availability,
    ) -> Result<Availability, BookingError> {
        let stored = self
            .call(self.backend.create_availability(token, availability))
            .await
            .inspect_err(|e| log_failure("Availability", e))?;
        info!("Created availability {} for {}", stored.id, stored.user_id);
        Ok(stored)
    }

    /// Send invitations to every invitee concurrently. The organizer is not
    /// notified. Failures are reported, never propagated.
    pub async fn notify(&self, meeting: &Meeting) -> NotificationReport {
        let notifications: Vec<Notification> = meeting
            .invitees()
            .map(|attendee| Notification::meeting_invite(&attendee.user_id, meeting))
            .collect();

        let results = join_all(notifications.iter().map(|notification| async move {
            let outcome = self.call(self.notifier.send(notification)).await;
            (notification.to.clone(), outcome)
        }))
        .await;

        let mut report = NotificationReport::default();
        for (to, outcome) in results {
            match outcome {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!("Failed to notify {} about meeting {}: {}", to, meeting.id, e);
                    report.failed.push(to);
                }
            }
        }
        if !notifications.is_empty() {
            info!(
                "Notified {} of {} attendees for meeting {}",
                report.sent,
                notifications.len(),
                meeting.id
            );
        }
        report
    }

    pub async fn list(&self, query: &MeetingQuery, pagination: &PaginationParams) -> Page<Meeting> {
        let scheduler = self.scheduler.lock().await;
        let matches = projection::filter_meetings(scheduler.store().all(), query, scheduler.now());
        projection::paginate(matches, pagination)
    }

    pub async fn analytics(&self, department: DepartmentFilter) -> Analytics {
        let scheduler = self.scheduler.lock().await;
        projection::analytics(
            scheduler.store().all(),
            department,
            scheduler.now(),
            scheduler.rules(),
        )
    }

    pub async fn get(&self, id: MeetingId) -> Result<Meeting, BookingError> {
        let scheduler = self.scheduler.lock().await;
        scheduler
            .store()
            .get(id)
            .cloned()
            .ok_or(BookingError::NotFound(id))
    }

    fn controller<'a>(
        &self,
        sessions: &'a mut HashMap<BearerToken, CalendarController>,
        token: &BearerToken,
        scheduler: &Scheduler,
    ) -> &'a mut CalendarController {
        sessions.entry(token.clone()).or_insert_with(|| {
            info!("Starting calendar session");
            CalendarController::new(scheduler.today(), ClickDisambiguator::new(self.click_window))
        })
    }

    async fn publish(&self, token: &BearerToken, signal: CalendarSignal) {
        let sessions = self.sessions.lock().await;
        if let Some(controller) = sessions.get(token) {
            controller.publish(signal);
        }
    }

    /// Subscribe to one user's calendar signals.
    pub async fn subscribe(&self, token: &BearerToken) -> broadcast::Receiver<CalendarSignal> {
        let mut sessions = self.sessions.lock().await;
        let scheduler = self.scheduler.lock().await;
        self.controller(&mut sessions, token, &scheduler).subscribe()
    }

    /// Adjust the user's calendar to the requested view, then project it.
    pub async fn calendar(
        &self,
        token: &BearerToken,
        view: Option<CalendarView>,
        navigation: Option<Navigation>,
        department: Option<DepartmentFilter>,
    ) -> CalendarSnapshot {
        let mut sessions = self.sessions.lock().await;
        let scheduler = self.scheduler.lock().await;
        let controller = self.controller(&mut sessions, token, &scheduler);

        if let Some(view) = view.filter(|v| *v != controller.view()) {
            controller.set_view(view);
        }
        if let Some(navigation) = navigation {
            controller.navigate(navigation, scheduler.today());
        }
        if let Some(department) = department {
            controller.set_department(department);
        }

        CalendarSnapshot {
            view: controller.view(),
            focus: controller.focus(),
            range: controller.visible_range(),
            events: controller.visible_events(&scheduler),
            session: controller.session().state().clone(),
        }
    }

    pub async fn session_state(&self, token: &BearerToken) -> SessionState {
        let sessions = self.sessions.lock().await;
        sessions
            .get(token)
            .map(|controller| controller.session().state().clone())
            .unwrap_or_default()
    }

    pub async fn session_select(
        &self,
        token: &BearerToken,
        target: SelectionTarget,
    ) -> Result<SessionState, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let scheduler = self.scheduler.lock().await;
        let controller = self.controller(&mut sessions, token, &scheduler);

        match target {
            SelectionTarget::EmptySlot(_) => controller.select(target, &scheduler)?,
            SelectionTarget::ExistingEvent(id) => controller.click_event(id, &scheduler)?,
        }
        Ok(controller.session().state().clone())
    }

    /// A single click on an empty slot; the second click inside the
    /// window opens the booking modal.
    pub async fn session_click(
        &self,
        token: &BearerToken,
        range: TimeRange,
    ) -> Result<(ClickOutcome, SessionState), SessionError> {
        let mut sessions = self.sessions.lock().await;
        let scheduler = self.scheduler.lock().await;
        let controller = self.controller(&mut sessions, token, &scheduler);

        let outcome = controller.click_slot(range, Instant::now(), &scheduler)?;
        Ok((outcome, controller.session().state().clone()))
    }

    /// Save the open modal. Creates notify attendees; updates do not.
    pub async fn session_save(
        &self,
        token: &BearerToken,
        form: &SessionForm,
    ) -> Result<(Meeting, NotificationReport), SessionError> {
        let (meeting, created) = {
            let mut sessions = self.sessions.lock().await;
            let mut scheduler = self.scheduler.lock().await;
            let controller = self.controller(&mut sessions, token, &scheduler);

            let intent = controller.session().resolve_save(form, &scheduler)?;
            let created = intent.is_create();
            let planned = intent
                .plan(&scheduler)
                .inspect_err(|e| log_failure("Save", e))?;
            let meeting = if created {
                self.commit_create(&mut scheduler, token, planned).await
            } else {
                self.commit_update(&mut scheduler, token, planned).await
            }
            .inspect_err(|e| log_failure("Save", e))?;

            controller.session_mut().finish();
            controller.publish(CalendarSignal::MeetingSaved { id: meeting.id });
            (meeting, created)
        };

        let report = if created {
            self.notify(&meeting).await
        } else {
            NotificationReport::default()
        };
        Ok((meeting, report))
    }

    pub async fn session_delete(&self, token: &BearerToken) -> Result<Meeting, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let mut scheduler = self.scheduler.lock().await;
        let controller = self.controller(&mut sessions, token, &scheduler);

        let id = controller.session().resolve_delete()?;
        let meeting = self
            .commit_cancel(&mut scheduler, token, id)
            .await
            .inspect_err(|e| log_failure("Delete", e))?;

        controller.session_mut().finish();
        controller.publish(CalendarSignal::MeetingCanceled { id });
        Ok(meeting)
    }

    pub async fn session_cancel(&self, token: &BearerToken) -> SessionState {
        let mut sessions = self.sessions.lock().await;
        if let Some(controller) = sessions.get_mut(token) {
            controller.cancel();
        }
        SessionState::Idle
    }
}
