//! Employee directory management, exposed to superadmins only (the route
//! gate enforces the role before these handlers run).

use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use utoipa::{IntoParams, ToSchema};

use crate::config::Config;
use crate::model::employee::{EmployeePatch, EmployeeStatus, NewEmployee};
use crate::store::{Datastore, EmployeeFilter, Page, StoreError};

use super::validate_photo;

#[derive(Deserialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "198701012010011001")]
    pub nip: String,
    #[schema(example = "Budi Santoso")]
    pub name: String,
    pub job_title: Option<String>,
    pub rank: Option<String>,
    /// Optional profile photo as a base64 data URI.
    pub photo: Option<String>,
    /// Defaults to `active`.
    pub status: Option<EmployeeStatus>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateEmployee {
    pub name: Option<String>,
    pub job_title: Option<String>,
    pub rank: Option<String>,
    pub status: Option<EmployeeStatus>,
}

#[derive(Deserialize, ToSchema)]
pub struct SetPhoto {
    pub photo: String,
}

#[derive(Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// active | inactive
    pub status: Option<EmployeeStatus>,
    /// Substring match on nip or name.
    pub search: Option<String>,
}

/// Register an employee
#[utoipa::path(
    post,
    path = "/api/database",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Object, example = json!({"id": 1})),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "NIP already registered"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Database"
)]
pub async fn create(
    store: web::Data<Datastore>,
    config: web::Data<Config>,
    payload: web::Json<CreateEmployee>,
) -> impl Responder {
    let nip = payload.nip.trim();
    if nip.is_empty() || payload.name.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "message": "NIP and name are required"
        }));
    }

    if let Some(photo) = payload.photo.as_deref() {
        if let Err(message) = validate_photo(photo, config.max_photo_chars) {
            return HttpResponse::BadRequest().json(json!({ "message": message }));
        }
    }

    let result = store
        .employees
        .insert(NewEmployee {
            nip: nip.to_string(),
            name: payload.name.trim().to_string(),
            job_title: payload.job_title.clone(),
            rank: payload.rank.clone(),
            photo: payload.photo.clone(),
            status: payload.status.unwrap_or(EmployeeStatus::Active),
        })
        .await;

    match result {
        Ok(id) => HttpResponse::Created().json(json!({ "id": id })),
        Err(StoreError::Duplicate(_)) => HttpResponse::Conflict().json(json!({
            "message": "An employee with this NIP already exists"
        })),
        Err(e) => {
            error!(error = %e, nip, "Failed to create employee");
            HttpResponse::InternalServerError().json(json!({
                "message": "Internal Server Error"
            }))
        }
    }
}

/// List employees
#[utoipa::path(
    get,
    path = "/api/database",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Page of employees", body = Object, example = json!({
            "employees": [],
            "total": 0,
            "page": 1,
            "per_page": 20
        })),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Database"
)]
pub async fn list(
    store: web::Data<Datastore>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    let filter = EmployeeFilter {
        status: query.status.map(|s| s.to_string()),
        search: query.search.clone().filter(|s| !s.trim().is_empty()),
    };
    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(20);

    let (employees, total) = store
        .employees
        .list(&filter, Page::clamped(page, per_page))
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to list employees");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(json!({
        "employees": employees,
        "total": total,
        "page": page.max(1),
        "per_page": per_page.clamp(1, 100)
    })))
}

/// Fetch one employee
#[utoipa::path(
    get,
    path = "/api/database/{id}",
    params(("id" = u64, Path, description = "Employee row id")),
    responses(
        (status = 200, description = "Employee", body = crate::model::employee::Employee),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Database"
)]
pub async fn get(
    store: web::Data<Datastore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let employee = store.employees.find_by_id(id).await.map_err(|e| {
        error!(error = %e, id, "Failed to fetch employee");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(match employee {
        Some(emp) => HttpResponse::Ok().json(emp),
        None => HttpResponse::NotFound().json(json!({ "message": "Employee not found" })),
    })
}

/// Update an employee's profile fields
#[utoipa::path(
    put,
    path = "/api/database/{id}",
    params(("id" = u64, Path, description = "Employee row id")),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated", body = Object, example = json!({"success": true})),
        (status = 400, description = "Empty update"),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Database"
)]
pub async fn update(
    store: web::Data<Datastore>,
    path: web::Path<u64>,
    payload: web::Json<UpdateEmployee>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let patch = EmployeePatch {
        name: payload.name.clone().filter(|n| !n.trim().is_empty()),
        job_title: payload.job_title.clone(),
        rank: payload.rank.clone(),
        status: payload.status,
    };
    if patch.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "No fields to update"
        })));
    }

    let rows = store.employees.update(id, &patch).await.map_err(|e| {
        error!(error = %e, id, "Failed to update employee");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(if rows == 0 {
        HttpResponse::NotFound().json(json!({ "message": "Employee not found" }))
    } else {
        HttpResponse::Ok().json(json!({ "success": true }))
    })
}

/// Replace an employee's profile photo
#[utoipa::path(
    put,
    path = "/api/database/{id}/photo",
    params(("id" = u64, Path, description = "Employee row id")),
    request_body = SetPhoto,
    responses(
        (status = 200, description = "Photo stored", body = Object, example = json!({"success": true})),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Database"
)]
pub async fn set_photo(
    store: web::Data<Datastore>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: web::Json<SetPhoto>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    if let Err(message) = validate_photo(&payload.photo, config.max_photo_chars) {
        return Ok(HttpResponse::BadRequest().json(json!({ "message": message })));
    }

    let rows = store
        .employees
        .set_photo(id, Some(&payload.photo))
        .await
        .map_err(|e| {
            error!(error = %e, id, "Failed to store employee photo");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(if rows == 0 {
        HttpResponse::NotFound().json(json!({ "message": "Employee not found" }))
    } else {
        HttpResponse::Ok().json(json!({ "success": true }))
    })
}

/// Remove an employee's profile photo
#[utoipa::path(
    delete,
    path = "/api/database/{id}/photo",
    params(("id" = u64, Path, description = "Employee row id")),
    responses(
        (status = 200, description = "Photo removed", body = Object, example = json!({"success": true})),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Database"
)]
pub async fn delete_photo(
    store: web::Data<Datastore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let rows = store.employees.set_photo(id, None).await.map_err(|e| {
        error!(error = %e, id, "Failed to remove employee photo");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(if rows == 0 {
        HttpResponse::NotFound().json(json!({ "message": "Employee not found" }))
    } else {
        HttpResponse::Ok().json(json!({ "success": true }))
    })
}

/// Delete an employee row
#[utoipa::path(
    delete,
    path = "/api/database/{id}",
    params(("id" = u64, Path, description = "Employee row id")),
    responses(
        (status = 200, description = "Employee deleted", body = Object, example = json!({"success": true})),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Database"
)]
pub async fn delete(
    store: web::Data<Datastore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let rows = store.employees.delete(id).await.map_err(|e| {
        error!(error = %e, id, "Failed to delete employee");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(if rows == 0 {
        HttpResponse::NotFound().json(json!({ "message": "Employee not found" }))
    } else {
        HttpResponse::Ok().json(json!({ "success": true }))
    })
}
