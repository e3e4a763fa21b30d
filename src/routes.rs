use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::handlers::api::{
    cancel_meeting, cancel_session, click_slot, create_availability, create_meeting, delete_session,
    get_analytics, get_availability, get_calendar, get_meeting, get_session, list_meetings,
    move_meeting, refresh_meetings, save_session, select_session, update_attendance, update_meeting,
    AppState,
};
use crate::handlers::health::health_check;

pub fn create_router(app_state: Arc<AppState>, is_production: bool) -> Router {
    let mut router = Router::new();

    // Health check is always available
    let health_route = Router::new().route("/health", get(health_check));
    router = router.merge(health_route);

    let meeting_routes = Router::new()
        .route("/meetings", get(list_meetings).post(create_meeting))
        .route(
            "/meetings/:meeting_id",
            get(get_meeting).put(update_meeting).delete(cancel_meeting),
        )
        .route("/meetings/:meeting_id/move", patch(move_meeting))
        .route("/meetings/:meeting_id/attendance", put(update_attendance))
        .route("/availability", get(get_availability).post(create_availability))
        .route("/calendar", get(get_calendar))
        .route("/analytics", get(get_analytics));
    router = router.merge(meeting_routes);

    let session_routes = Router::new()
        .route("/session", get(get_session))
        .route("/session/select", post(select_session))
        .route("/session/click", post(click_slot))
        .route("/session/save", post(save_session))
        .route("/session/delete", post(delete_session))
        .route("/session/cancel", post(cancel_session));
    router = router.merge(session_routes);

    // Only add admin routes if not in production mode
    if !is_production {
        let admin_routes = Router::new().route("/admin/refresh", post(refresh_meetings));
        router = router.merge(admin_routes);

        info!("Admin routes enabled - server running in development mode");
    } else {
        info!("Running in production mode - admin endpoints hidden");
    }

    router.with_state(app_state)
}
