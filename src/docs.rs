use crate::api::absen::{PegawaiQuery, SubmitAttendance};
use crate::api::database::{CreateEmployee, SetPhoto, UpdateEmployee};
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::Employee;
use crate::retention::{PurgeOutcome, RetentionStats};
use crate::store::VerificationCounts;
use crate::verification::DayFlags;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Absensi API",
        version = "1.0.0",
        description = r#"
## Employee Attendance (Absensi) System

This API powers a web-based attendance system with photo capture,
admin verification, and automatic photo retention.

### 🔹 Key Features
- **Absen**
  - Webcam photo capture with on-time / late classification
- **Rekap**
  - Filterable recap of attendance records, per-employee summaries
- **Verifikasi**
  - Admins approve or reject submissions, with date-picker flags
- **Database**
  - Employee directory management (superadmin only)
- **Cleanup**
  - Scheduled nulling of old attendance photos plus storage stats

### 🔐 Security
All endpoints under `/api` require **JWT Bearer authentication**.
Route access is role-gated: `superadmin`, `adminverif`, `user`.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::absen::submit,
        crate::api::absen::find_pegawai,

        crate::api::rekap::list,
        crate::api::rekap::pegawai,

        crate::api::verifikasi::day,
        crate::api::verifikasi::dates,
        crate::api::verifikasi::counts,
        crate::api::verifikasi::approve,
        crate::api::verifikasi::reject,

        crate::api::database::create,
        crate::api::database::list,
        crate::api::database::get,
        crate::api::database::update,
        crate::api::database::set_photo,
        crate::api::database::delete_photo,
        crate::api::database::delete,

        crate::api::cleanup::control,
        crate::api::cleanup::storage_stats
    ),
    components(
        schemas(
            SubmitAttendance,
            PegawaiQuery,
            AttendanceRecord,
            Employee,
            CreateEmployee,
            UpdateEmployee,
            SetPhoto,
            VerificationCounts,
            DayFlags,
            RetentionStats,
            PurgeOutcome
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Absen", description = "Attendance capture APIs"),
        (name = "Rekap", description = "Attendance recap APIs"),
        (name = "Verifikasi", description = "Verification workflow APIs"),
        (name = "Database", description = "Employee directory APIs"),
        (name = "Cleanup", description = "Retention and storage APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
