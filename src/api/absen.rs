use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use utoipa::{IntoParams, ToSchema};

use crate::config::Config;
use crate::model::attendance::{NewAttendance, classify_raw_status};
use crate::model::employee::EmployeeStatus;
use crate::store::Datastore;
use crate::utils::view_cache::{self, TAG_ATTENDANCE, TAG_DATES, TAG_STATS};

use super::validate_photo;

#[derive(Deserialize, ToSchema)]
pub struct SubmitAttendance {
    #[schema(example = "198701012010011001")]
    pub nip: String,
    /// Webcam still frame as a base64 data URI.
    #[schema(example = "data:image/jpeg;base64,/9j/4AAQ...")]
    pub photo: String,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PegawaiQuery {
    /// Employee personnel number
    #[schema(example = "198701012010011001")]
    pub nip: String,
}

/// Employee self-lookup before capture
#[utoipa::path(
    get,
    path = "/api/absen/pegawai",
    params(PegawaiQuery),
    responses(
        (status = 200, description = "Employee found", body = crate::model::employee::Employee),
        (status = 404, description = "Employee not found or inactive", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Absen"
)]
pub async fn find_pegawai(
    store: web::Data<Datastore>,
    query: web::Query<PegawaiQuery>,
) -> actix_web::Result<impl Responder> {
    let employee = store
        .employees
        .find_by_nip(query.nip.trim())
        .await
        .map_err(|e| {
            error!(error = %e, nip = %query.nip, "Failed to fetch employee");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    match employee {
        Some(emp) if emp.status == EmployeeStatus::Active.to_string() => {
            Ok(HttpResponse::Ok().json(emp))
        }
        _ => Ok(HttpResponse::NotFound().json(json!({
            "message": "Employee not found"
        }))),
    }
}

/// Submit an attendance entry
#[utoipa::path(
    post,
    path = "/api/absen",
    request_body = SubmitAttendance,
    responses(
        (status = 200, description = "Attendance recorded", body = Object, example = json!({
            "success": true,
            "id": 42,
            "raw_status": "present-late"
        })),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "success": false,
            "message": "Photo payload is required"
        })),
        (status = 404, description = "Employee not found or inactive"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Absen"
)]
pub async fn submit(
    store: web::Data<Datastore>,
    config: web::Data<Config>,
    payload: web::Json<SubmitAttendance>,
) -> actix_web::Result<impl Responder> {
    let nip = payload.nip.trim();
    if nip.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "success": false,
            "message": "NIP is required"
        })));
    }

    if let Err(message) = validate_photo(&payload.photo, config.max_photo_chars) {
        return Ok(HttpResponse::BadRequest().json(json!({
            "success": false,
            "message": message
        })));
    }

    let employee = store.employees.find_by_nip(nip).await.map_err(|e| {
        error!(error = %e, nip, "Failed to fetch employee for submission");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;
    let Some(employee) = employee else {
        return Ok(HttpResponse::NotFound().json(json!({
            "success": false,
            "message": "Employee not found"
        })));
    };
    if employee.status != EmployeeStatus::Active.to_string() {
        return Ok(HttpResponse::NotFound().json(json!({
            "success": false,
            "message": "Employee is inactive"
        })));
    }

    let timestamp_ms = Utc::now().timestamp_millis();
    let raw_status =
        classify_raw_status(timestamp_ms, config.tz_offset_minutes, config.ontime_cutoff);

    let id = store
        .attendance
        .insert(NewAttendance {
            nip: nip.to_string(),
            timestamp_ms,
            raw_status: raw_status.to_string(),
            photo: Some(payload.photo.clone()),
        })
        .await
        .map_err(|e| {
            error!(error = %e, nip, "Failed to insert attendance");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    // Best-effort: stale views never fail a submission.
    view_cache::invalidate_tags(&[TAG_ATTENDANCE, TAG_STATS, TAG_DATES]);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "id": id,
        "raw_status": raw_status,
        "timestamp_ms": timestamp_ms
    })))
}
