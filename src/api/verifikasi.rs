use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use utoipa::IntoParams;

use crate::auth::auth::AuthUser;
use crate::store::Page;
use crate::utils::view_cache::{self, TAG_ATTENDANCE, TAG_DATES, TAG_STATS};
use crate::verification::{DecideError, Decision, VerificationService};

#[derive(Deserialize, IntoParams)]
pub struct DayQuery {
    /// Local calendar day, `YYYY-MM-DD`.
    #[param(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Deserialize, IntoParams)]
pub struct MonthQuery {
    /// `YYYY-MM`
    pub month: String,
}

#[derive(Deserialize, IntoParams)]
pub struct DecideQuery {
    /// When true the decision only lands if the record is still pending;
    /// a concurrent decision yields 409 instead of being overwritten.
    pub strict: Option<bool>,
}

/// One local day's submissions for review
#[utoipa::path(
    get,
    path = "/api/verifikasi",
    params(DayQuery),
    responses(
        (status = 200, description = "Records for the day", body = Object, example = json!({
            "records": [],
            "total": 0,
            "page": 1,
            "per_page": 20
        })),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Verifikasi"
)]
pub async fn day(
    service: web::Data<VerificationService>,
    query: web::Query<DayQuery>,
) -> actix_web::Result<impl Responder> {
    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(20);

    let (records, total) = service
        .day_slice(query.date, Page::clamped(page, per_page))
        .await
        .map_err(|e| {
            error!(error = %e, date = %query.date, "Failed to load verification day");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(json!({
        "records": records,
        "total": total,
        "page": page.max(1),
        "per_page": per_page.clamp(1, 100)
    })))
}

/// Per-day submission flags for the month's date picker
#[utoipa::path(
    get,
    path = "/api/verifikasi/dates",
    params(MonthQuery),
    responses(
        (status = 200, description = "One entry per day of the month", body = Object, example = json!([
            {"date": "2025-01-06", "has_any": true, "has_pending": true}
        ])),
        (status = 400, description = "Malformed month"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Verifikasi"
)]
pub async fn dates(
    service: web::Data<VerificationService>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<impl Responder> {
    let Some((year, month)) = parse_month(&query.month) else {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Month must be formatted YYYY-MM"
        })));
    };

    if let Some(cached) = view_cache::get(TAG_DATES, &query.month).await {
        return Ok(HttpResponse::Ok().json(cached));
    }

    let flags = service.month_flags(year, month).await.map_err(|e| {
        error!(error = %e, month = %query.month, "Failed to compute month flags");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let body = serde_json::to_value(&flags).map_err(|e| {
        error!(error = %e, "Failed to serialize month flags");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;
    view_cache::put(TAG_DATES, &query.month, body.clone()).await;

    Ok(HttpResponse::Ok().json(body))
}

/// Aggregate verification counters
#[utoipa::path(
    get,
    path = "/api/verifikasi/counts",
    responses(
        (status = 200, description = "Totals by verification status",
         body = crate::store::VerificationCounts),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Verifikasi"
)]
pub async fn counts(service: web::Data<VerificationService>) -> actix_web::Result<impl Responder> {
    if let Some(cached) = view_cache::get(TAG_STATS, "counts").await {
        return Ok(HttpResponse::Ok().json(cached));
    }

    let counts = service.counts().await.map_err(|e| {
        error!(error = %e, "Failed to compute verification counts");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let body = serde_json::to_value(counts).map_err(|e| {
        error!(error = %e, "Failed to serialize verification counts");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;
    view_cache::put(TAG_STATS, "counts", body.clone()).await;

    Ok(HttpResponse::Ok().json(body))
}

/// Approve a submission
#[utoipa::path(
    put,
    path = "/api/verifikasi/{id}/approve",
    params(
        ("id" = u64, Path, description = "Attendance record id"),
        DecideQuery
    ),
    responses(
        (status = 200, description = "Decision recorded", body = Object, example = json!({"success": true})),
        (status = 403, description = "Caller is not a verifier"),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Record already decided (strict mode)"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Verifikasi"
)]
pub async fn approve(
    auth: AuthUser,
    service: web::Data<VerificationService>,
    path: web::Path<u64>,
    query: web::Query<DecideQuery>,
) -> impl Responder {
    decide(auth, service, path.into_inner(), Decision::Approved, &query).await
}

/// Reject a submission
#[utoipa::path(
    put,
    path = "/api/verifikasi/{id}/reject",
    params(
        ("id" = u64, Path, description = "Attendance record id"),
        DecideQuery
    ),
    responses(
        (status = 200, description = "Decision recorded", body = Object, example = json!({"success": true})),
        (status = 403, description = "Caller is not a verifier"),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Record already decided (strict mode)"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Verifikasi"
)]
pub async fn reject(
    auth: AuthUser,
    service: web::Data<VerificationService>,
    path: web::Path<u64>,
    query: web::Query<DecideQuery>,
) -> impl Responder {
    decide(auth, service, path.into_inner(), Decision::Rejected, &query).await
}

async fn decide(
    auth: AuthUser,
    service: web::Data<VerificationService>,
    id: u64,
    decision: Decision,
    query: &DecideQuery,
) -> actix_web::Result<HttpResponse> {
    auth.require_verifier()?;

    let result = if query.strict.unwrap_or(false) {
        service.decide_if_pending(id, decision, auth.user_id).await
    } else {
        service.decide(id, decision, auth.user_id).await
    };

    Ok(match result {
        Ok(outcome) => {
            view_cache::invalidate_tags(&[TAG_ATTENDANCE, TAG_STATS, TAG_DATES]);
            HttpResponse::Ok().json(json!({
                "success": true,
                "verified_by": outcome.verified_by
            }))
        }
        Err(DecideError::NotFound) => HttpResponse::NotFound().json(json!({
            "message": "Attendance record not found"
        })),
        Err(DecideError::AlreadyDecided) => HttpResponse::Conflict().json(json!({
            "message": "Record was already decided"
        })),
        Err(DecideError::Store(e)) => {
            error!(error = %e, record_id = id, "Failed to record decision");
            HttpResponse::InternalServerError().json(json!({
                "message": "Internal Server Error"
            }))
        }
    })
}

fn parse_month(raw: &str) -> Option<(i32, u32)> {
    let (y, m) = raw.split_once('-')?;
    let year: i32 = y.parse().ok()?;
    let month: u32 = m.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

#[cfg(test)]
mod tests {
    use super::parse_month;

    #[test]
    fn month_parsing_accepts_only_year_dash_month() {
        assert_eq!(parse_month("2025-01"), Some((2025, 1)));
        assert_eq!(parse_month("2025-12"), Some((2025, 12)));
        assert_eq!(parse_month("2025-13"), None);
        assert_eq!(parse_month("2025"), None);
        assert_eq!(parse_month("2025-0"), None);
        assert_eq!(parse_month("jan-2025"), None);
    }
}
