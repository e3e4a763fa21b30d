use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::{error_handling::HandleErrorLayer, http::StatusCode};
use tower::{BoxError, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use meeting_room_service::{
    create_router,
    services::{clock::SystemClock, scheduler::Scheduler},
    AppState, BearerToken, BookingService, Config, CsvMeetingStore, DataStoreClient, EmailClient,
    LogNotifier, MeetingBackend, Notifier,
};

// Error handler
async fn handle_error(error: BoxError) -> (StatusCode, String) {
    if error.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            "Request took too long".to_string(),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Unhandled internal error: {}", error),
        )
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing for logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    #[cfg(feature = "sentry-monitoring")]
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        info!("Sentry error tracking enabled");
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    info!(
        "Business hours {} - {}, minimum duration {} minutes, conflict policy {:?}",
        config.rules.opens_at.format("%H:%M"),
        config.rules.closes_at.format("%H:%M"),
        config.rules.min_duration_minutes(),
        config.rules.conflict_policy
    );

    // Pick the data store: remote when configured, CSV file otherwise
    let backend: Arc<dyn MeetingBackend> = match &config.data_store_url {
        Some(url) => match DataStoreClient::new(url, config.upstream_timeout) {
            Ok(client) => {
                info!("Using remote data store at {}", url);
                Arc::new(client)
            }
            Err(e) => {
                error!("Failed to build data store client: {}", e);
                process::exit(1);
            }
        },
        None => match CsvMeetingStore::new(&config.csv_path) {
            Ok(store) => {
                info!("Using local CSV data store at {}", config.csv_path);
                Arc::new(store)
            }
            Err(e) => {
                error!("Failed to open CSV data store: {}", e);
                process::exit(1);
            }
        },
    };

    let notifier: Arc<dyn Notifier> = match &config.notify_url {
        Some(url) => match EmailClient::new(url, config.upstream_timeout) {
            Ok(client) => {
                info!("Sending attendee notifications via {}", url);
                Arc::new(client)
            }
            Err(e) => {
                error!("Failed to build email client: {}", e);
                process::exit(1);
            }
        },
        None => {
            info!("No email service configured - notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let scheduler = Scheduler::new(config.rules.clone(), Arc::new(SystemClock));
    let bookings = BookingService::new(
        scheduler,
        backend,
        notifier,
        config.upstream_timeout,
        config.click_window,
    );

    // Initial load of the event store
    let startup_token = match (&config.data_store_token, &config.data_store_url) {
        (Some(token), _) => Some(BearerToken::new(token.as_str())),
        (None, None) => Some(BearerToken::new("local")),
        (None, Some(_)) => None,
    };
    match startup_token {
        Some(token) => match bookings.refresh(&token).await {
            Ok(count) => info!("Loaded {} meetings", count),
            Err(e) => warn!("Initial meeting load failed, starting empty: {}", e),
        },
        None => warn!("DATA_STORE_TOKEN not set - event store starts empty"),
    }

    if config.is_production {
        info!("Running in PRODUCTION mode - restricting available endpoints");
    } else {
        info!("Running in DEVELOPMENT mode - all endpoints will be available");
    }

    let app_state = Arc::new(AppState { bookings });

    // Create router with appropriate routes based on environment
    let app = create_router(app_state, config.is_production).layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_error))
            .load_shed()
            .concurrency_limit(64)
            .timeout(Duration::from_secs(10))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any)),
    );

    info!("Server listening on {}", config.bind_addr);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", config.bind_addr, e);
            process::exit(1);
        }
    };

    // Set up signal handler for graceful shutdown
    let shutdown = async {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received interrupt signal, starting graceful shutdown");
            },
            _ = terminate => {
                info!("Received terminate signal, starting graceful shutdown");
            },
        }
    };

    // Start server with graceful shutdown
    info!("Server is ready to accept connections");
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!("Server error: {}", e);
        process::exit(1);
    }

    info!("Server has been gracefully shut down");
}
