use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use utoipa::IntoParams;

use crate::config::Config;
use crate::model::attendance::{RAW_PRESENT, RAW_PRESENT_LATE, VerifiedStatus};
use crate::store::{AttendanceFilter, Datastore, Page};
use crate::verification::{day_range_ms, local_day_start_ms};

#[derive(Deserialize, IntoParams)]
pub struct RekapQuery {
    pub nip: Option<String>,
    /// Inclusive start date, `YYYY-MM-DD` in local time.
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    /// Inclusive end date, `YYYY-MM-DD` in local time.
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    /// pending | approved | rejected
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Deserialize, IntoParams)]
pub struct RekapPegawaiQuery {
    pub nip: String,
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

fn date_bounds_ms(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    tz_offset_minutes: i32,
) -> (Option<i64>, Option<i64>) {
    let from_ms = from.map(|d| local_day_start_ms(d, tz_offset_minutes));
    // to-date is inclusive, so the bound is the start of the following day
    let to_ms = to.map(|d| day_range_ms(d, tz_offset_minutes).1);
    (from_ms, to_ms)
}

/// Filtered attendance listing for the recap screen
#[utoipa::path(
    get,
    path = "/api/rekap",
    params(RekapQuery),
    responses(
        (status = 200, description = "Page of attendance records", body = Object, example = json!({
            "records": [],
            "total": 0,
            "page": 1,
            "per_page": 20
        })),
        (status = 400, description = "Invalid status filter"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Rekap"
)]
pub async fn list(
    store: web::Data<Datastore>,
    config: web::Data<Config>,
    query: web::Query<RekapQuery>,
) -> actix_web::Result<impl Responder> {
    if let Some(status) = query.status.as_deref() {
        if status.parse::<VerifiedStatus>().is_err() {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Unknown verification status"
            })));
        }
    }

    let (from_ms, to_ms) = date_bounds_ms(query.from, query.to, config.tz_offset_minutes);
    let filter = AttendanceFilter {
        nip: query.nip.clone().filter(|n| !n.trim().is_empty()),
        from_ms,
        to_ms,
        verified_status: query.status.clone(),
    };

    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(20);

    let (records, total) = store
        .attendance
        .list(&filter, Page::clamped(page, per_page))
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to list attendance records");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(json!({
        "records": records,
        "total": total,
        "page": page.max(1),
        "per_page": per_page.clamp(1, 100)
    })))
}

/// Per-employee recap: the employee's records in a range plus tallies
#[utoipa::path(
    get,
    path = "/api/rekap-pegawai",
    params(RekapPegawaiQuery),
    responses(
        (status = 200, description = "Employee records with tallies", body = Object, example = json!({
            "employee": {"id": 1, "nip": "198701012010011001", "name": "Budi"},
            "records": [],
            "summary": {
                "total": 0, "present": 0, "present_late": 0,
                "approved": 0, "pending": 0, "rejected": 0
            }
        })),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Rekap"
)]
pub async fn pegawai(
    store: web::Data<Datastore>,
    config: web::Data<Config>,
    query: web::Query<RekapPegawaiQuery>,
) -> actix_web::Result<impl Responder> {
    let nip = query.nip.trim();
    let employee = store.employees.find_by_nip(nip).await.map_err(|e| {
        error!(error = %e, nip, "Failed to fetch employee for recap");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;
    let Some(employee) = employee else {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Employee not found"
        })));
    };

    let (from_ms, to_ms) = date_bounds_ms(query.from, query.to, config.tz_offset_minutes);
    let filter = AttendanceFilter {
        nip: Some(nip.to_string()),
        from_ms,
        to_ms,
        verified_status: None,
    };

    // One screenful per employee; a month of records fits comfortably.
    let page = Page {
        limit: 500,
        offset: 0,
    };
    let (records, total) = store.attendance.list(&filter, page).await.map_err(|e| {
        error!(error = %e, nip, "Failed to list employee attendance");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let present = records.iter().filter(|r| r.raw_status == RAW_PRESENT).count();
    let present_late = records
        .iter()
        .filter(|r| r.raw_status == RAW_PRESENT_LATE)
        .count();
    let tally = |status: VerifiedStatus| {
        records
            .iter()
            .filter(|r| r.verified_status == status.to_string())
            .count()
    };

    Ok(HttpResponse::Ok().json(json!({
        "employee": employee,
        "records": records,
        "summary": {
            "total": total,
            "present": present,
            "present_late": present_late,
            "approved": tally(VerifiedStatus::Approved),
            "pending": tally(VerifiedStatus::Pending),
            "rejected": tally(VerifiedStatus::Rejected)
        }
    })))
}
