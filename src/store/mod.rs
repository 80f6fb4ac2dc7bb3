//! Persistence boundary. The data model is defined once against these
//! traits; `mysql` is the production adapter, `memory` backs tests and the
//! one-shot `migrate` batch copier.

pub mod memory;
pub mod migrate;
pub mod mysql;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::{
    attendance::{AttendanceRecord, NewAttendance},
    employee::{Employee, EmployeePatch, NewEmployee},
    user::{NewUser, User},
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn clamped(page: u32, per_page: u32) -> Self {
        let per_page = per_page.clamp(1, 100) as i64;
        let page = page.max(1) as i64;
        Page {
            limit: per_page,
            offset: (page - 1) * per_page,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct EmployeeFilter {
    pub status: Option<String>,
    /// Matches against nip or name.
    pub search: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct AttendanceFilter {
    pub nip: Option<String>,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
    pub verified_status: Option<String>,
}

/// Photo-bearing rows partitioned around a cutoff, with character sums as
/// the storage-size proxy.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhotoUsage {
    pub total_records: i64,
    pub total_chars: i64,
    pub old_records: i64,
    pub old_chars: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct DayRollup {
    pub date: NaiveDate,
    pub total: i64,
    pub pending: i64,
}

#[derive(Debug, Default, Clone, Copy, Serialize, ToSchema)]
pub struct VerificationCounts {
    #[schema(example = 120)]
    pub total: i64,
    #[schema(example = 90)]
    pub approved: i64,
    #[schema(example = 25)]
    pub pending: i64,
    #[schema(example = 5)]
    pub rejected: i64,
}

#[async_trait]
pub trait EmployeeStore: Send + Sync {
    async fn insert(&self, emp: NewEmployee) -> Result<u64, StoreError>;
    async fn find_by_id(&self, id: u64) -> Result<Option<Employee>, StoreError>;
    async fn find_by_nip(&self, nip: &str) -> Result<Option<Employee>, StoreError>;
    async fn list(
        &self,
        filter: &EmployeeFilter,
        page: Page,
    ) -> Result<(Vec<Employee>, i64), StoreError>;
    async fn update(&self, id: u64, patch: &EmployeePatch) -> Result<u64, StoreError>;
    async fn set_photo(&self, id: u64, photo: Option<&str>) -> Result<u64, StoreError>;
    async fn delete(&self, id: u64) -> Result<u64, StoreError>;

    /// Full scan, used by the migration copier only.
    async fn all(&self) -> Result<Vec<Employee>, StoreError>;
    /// Insert preserving the row id, used by the migration copier only.
    async fn restore(&self, emp: &Employee) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn insert(&self, rec: NewAttendance) -> Result<u64, StoreError>;
    async fn find_by_id(&self, id: u64) -> Result<Option<AttendanceRecord>, StoreError>;
    async fn list(
        &self,
        filter: &AttendanceFilter,
        page: Page,
    ) -> Result<(Vec<AttendanceRecord>, i64), StoreError>;

    async fn photo_usage(&self, cutoff_ms: i64) -> Result<PhotoUsage, StoreError>;
    /// Nulls photo payloads on rows strictly older than the cutoff.
    /// Returns the number of rows actually updated. Rows are never deleted.
    async fn clear_photos_before(&self, cutoff_ms: i64) -> Result<u64, StoreError>;

    /// Sets verification status and verifier in one update, overwriting
    /// any prior decision.
    async fn set_decision(
        &self,
        id: u64,
        status: &str,
        verified_by: Option<u64>,
    ) -> Result<u64, StoreError>;
    /// Compare-and-set variant: updates only while the row is pending.
    async fn set_decision_if_pending(
        &self,
        id: u64,
        status: &str,
        verified_by: Option<u64>,
    ) -> Result<u64, StoreError>;

    /// Per-day totals and pending counts in `[from_ms, to_ms)`, bucketed in
    /// local time via the offset.
    async fn day_rollup(
        &self,
        from_ms: i64,
        to_ms: i64,
        tz_offset_minutes: i32,
    ) -> Result<Vec<DayRollup>, StoreError>;
    async fn verification_counts(&self) -> Result<VerificationCounts, StoreError>;

    async fn all(&self) -> Result<Vec<AttendanceRecord>, StoreError>;
    async fn restore(&self, rec: &AttendanceRecord) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: u64) -> Result<Option<User>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn insert(&self, user: NewUser) -> Result<u64, StoreError>;
    /// Insert with an explicit id; used to provision a verifier identity
    /// under the id the decision already references.
    async fn insert_with_id(&self, id: u64, user: NewUser) -> Result<(), StoreError>;
    async fn touch_last_login(&self, id: u64) -> Result<(), StoreError>;

    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: i64,
    ) -> Result<(), StoreError>;
    async fn refresh_token_active(&self, jti: &str) -> Result<bool, StoreError>;
    async fn revoke_refresh_token(&self, jti: &str) -> Result<(), StoreError>;

    async fn all(&self) -> Result<Vec<User>, StoreError>;
    async fn restore(&self, user: &User) -> Result<(), StoreError>;
}

/// Bundle of the three stores behind one handle, injected into handlers
/// and services via `web::Data`.
#[derive(Clone)]
pub struct Datastore {
    pub employees: Arc<dyn EmployeeStore>,
    pub attendance: Arc<dyn AttendanceStore>,
    pub users: Arc<dyn UserStore>,
}

impl Datastore {
    pub fn mysql(pool: sqlx::MySqlPool) -> Self {
        let adapter = Arc::new(mysql::MySqlDatastore::new(pool));
        Datastore {
            employees: adapter.clone(),
            attendance: adapter.clone(),
            users: adapter,
        }
    }

    pub fn memory() -> Self {
        let adapter = Arc::new(memory::MemDatastore::new());
        Datastore {
            employees: adapter.clone(),
            attendance: adapter.clone(),
            users: adapter,
        }
    }
}
