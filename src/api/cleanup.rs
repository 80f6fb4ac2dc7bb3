//! Operator controls for the photo-retention automation, plus the storage
//! usage report. Superadmin-only via the route gate.

use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use utoipa::{IntoParams, ToSchema};

use crate::retention::{
    CleanupOutcome, CleanupScheduler, RetentionPolicy, StartOutcome, default_cutoff, test_cutoff,
};
use crate::utils::view_cache::{self, TAG_ATTENDANCE, TAG_STATS};

#[derive(Debug, Copy, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CleanupAction {
    Start,
    Stop,
    Status,
    Trigger,
}

#[derive(Deserialize, IntoParams)]
pub struct CleanupQuery {
    /// start | stop | status | trigger
    pub action: CleanupAction,
}

#[derive(Deserialize, IntoParams)]
pub struct StatsQuery {
    /// When true the report uses a one-week cutoff instead of the
    /// production retention window, so freshly seeded rows show up as
    /// reclaimable.
    #[serde(rename = "testMode")]
    pub test_mode: Option<bool>,
}

/// Control the cleanup automation
#[utoipa::path(
    get,
    path = "/api/cleanup",
    params(CleanupQuery),
    responses(
        (status = 200, description = "Action applied", body = Object, example = json!({
            "success": true,
            "message": "Cleanup automation started",
            "isRunning": true
        })),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Cleanup"
)]
pub async fn control(
    scheduler: web::Data<CleanupScheduler>,
    query: web::Query<CleanupQuery>,
) -> impl Responder {
    match query.action {
        CleanupAction::Start => {
            let message = match scheduler.start() {
                StartOutcome::Started => "Cleanup automation started",
                StartOutcome::AlreadyRunning => "Cleanup automation is already running",
            };
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": message,
                "isRunning": true
            }))
        }
        CleanupAction::Stop => {
            scheduler.stop();
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": "Cleanup automation stopped",
                "isRunning": false
            }))
        }
        CleanupAction::Status => {
            let status = scheduler.status();
            HttpResponse::Ok().json(json!({
                "success": true,
                "isRunning": status.automation_running,
                "cleanupInProgress": status.cleanup_running
            }))
        }
        CleanupAction::Trigger => match scheduler.trigger().await {
            CleanupOutcome::Completed(outcome) => {
                view_cache::invalidate_tags(&[TAG_ATTENDANCE, TAG_STATS]);
                HttpResponse::Ok().json(json!({
                    "success": true,
                    "message": "Cleanup completed",
                    "recordsCleaned": outcome.records_cleaned,
                    "estimatedSavingsKb": outcome.estimated_savings_kb
                }))
            }
            CleanupOutcome::Skipped => HttpResponse::Ok().json(json!({
                "success": true,
                "message": "Cleanup already in progress, skipped"
            })),
            CleanupOutcome::Failed(reason) => {
                error!(reason, "Manual cleanup trigger failed");
                HttpResponse::InternalServerError().json(json!({
                    "success": false,
                    "message": "Cleanup failed"
                }))
            }
        },
    }
}

/// Photo storage usage report
#[utoipa::path(
    get,
    path = "/api/storage/stats",
    params(StatsQuery),
    responses(
        (status = 200, description = "Current usage and reclaimable estimate",
         body = crate::retention::RetentionStats),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Cleanup"
)]
pub async fn storage_stats(
    policy: web::Data<RetentionPolicy>,
    query: web::Query<StatsQuery>,
) -> actix_web::Result<impl Responder> {
    let now = Utc::now();
    let cutoff = if query.test_mode.unwrap_or(false) {
        test_cutoff(now)
    } else {
        default_cutoff(now)
    };

    let stats = policy.compute_stats(cutoff).await.map_err(|e| {
        error!(error = %e, "Failed to compute storage stats");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(stats))
}
