use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "nip": "198701012010011001",
        "name": "Budi Santoso",
        "job_title": "Staf Administrasi",
        "rank": "III/a",
        "photo": null,
        "status": "active"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    /// Business key (personnel number), distinct from the row id.
    #[schema(example = "198701012010011001")]
    pub nip: String,

    #[schema(example = "Budi Santoso")]
    pub name: String,

    #[schema(example = "Staf Administrasi", nullable = true)]
    pub job_title: Option<String>,

    #[schema(example = "III/a", nullable = true)]
    pub rank: Option<String>,

    /// Base64 data-URI payload; absent when no photo is on file.
    #[schema(nullable = true)]
    pub photo: Option<String>,

    #[schema(example = "active")]
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub nip: String,
    pub name: String,
    pub job_title: Option<String>,
    pub rank: Option<String>,
    pub photo: Option<String>,
    pub status: EmployeeStatus,
}

/// Profile fields that may change after creation. `None` leaves a field as-is.
#[derive(Debug, Default, Clone)]
pub struct EmployeePatch {
    pub name: Option<String>,
    pub job_title: Option<String>,
    pub rank: Option<String>,
    pub status: Option<EmployeeStatus>,
}

impl EmployeePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.job_title.is_none()
            && self.rank.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString, Serialize, Deserialize, ToSchema)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Inactive,
}
