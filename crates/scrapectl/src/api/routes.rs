//! HTTP API route definitions.

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};

/// Create the API router with all routes, CORS (optional) and request
/// tracing.
pub fn create_router(app_state: AppState, cors_enabled: bool) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health))
        // Job registry and dispatch
        .route("/jobs", get(handlers::list_jobs))
        .route("/jobs/toggle", post(handlers::toggle_job))
        .route("/run-now", post(handlers::run_now))
        .route("/run-all-daily", post(handlers::run_all_daily))
        // Progress tracking
        .route("/progress/start", post(handlers::start_operation))
        .route("/progress/status", get(handlers::progress_status))
        .route("/progress/tasks/:task_id", post(handlers::update_task))
        .route("/progress/pause", post(handlers::pause_operation))
        .route("/progress/resume", post(handlers::resume_operation))
        .route("/progress/cancel", post(handlers::cancel_operation))
        .route("/progress/skip-task/:task_id", post(handlers::skip_task))
        .route("/progress/skip-region/:region_code", post(handlers::skip_region))
        // Status and logs
        .route("/scrapers/failures", get(handlers::failures))
        .route("/scrapers/:id/status", get(handlers::scraper_status))
        .route(
            "/scrapers/:id/logs",
            get(handlers::scraper_logs).post(handlers::append_logs),
        )
        // Worker contract
        .route("/queue/claim", post(handlers::claim_work))
        .route("/runs/:run_id/report", post(handlers::report_run))
        .with_state(app_state);

    if cors_enabled {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
            .allow_origin(Any);
        app = app.layer(cors);
    }

    app.layer(TraceLayer::new_for_http())
}
