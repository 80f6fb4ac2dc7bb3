//! In-memory adapter backing unit tests and the migration copier's test
//! path. Mirrors the MySQL adapter's observable behavior, including
//! duplicate-key reporting.

use std::collections::BTreeMap;
use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::model::{
    attendance::{AttendanceRecord, NewAttendance, VerifiedStatus},
    employee::{Employee, EmployeePatch, NewEmployee},
    user::{NewUser, User},
};

use super::{
    AttendanceFilter, AttendanceStore, DayRollup, EmployeeFilter, EmployeeStore, Page, PhotoUsage,
    StoreError, UserStore, VerificationCounts,
};

#[derive(Default)]
struct MemState {
    employees: Vec<Employee>,
    attendance: Vec<AttendanceRecord>,
    users: Vec<User>,
    refresh_tokens: Vec<RefreshToken>,
    next_employee_id: u64,
    next_attendance_id: u64,
    next_user_id: u64,
}

struct RefreshToken {
    jti: String,
    expires_at: i64,
    revoked: bool,
}

pub struct MemDatastore {
    state: Mutex<MemState>,
    fail_user_inserts: AtomicBool,
}

impl MemDatastore {
    pub fn new() -> Self {
        MemDatastore {
            state: Mutex::new(MemState {
                next_employee_id: 1,
                next_attendance_id: 1,
                next_user_id: 1,
                ..MemState::default()
            }),
            fail_user_inserts: AtomicBool::new(false),
        }
    }

    /// Test hook: make subsequent user inserts fail, exercising the
    /// unattributed-decision fallback.
    pub fn fail_user_inserts(&self, fail: bool) {
        self.fail_user_inserts.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemState> {
        self.state.lock().expect("memory store poisoned")
    }
}

impl Default for MemDatastore {
    fn default() -> Self {
        Self::new()
    }
}

fn paginate<T: Clone>(rows: Vec<T>, page: Page) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let slice = rows
        .into_iter()
        .skip(page.offset.max(0) as usize)
        .take(page.limit.max(0) as usize)
        .collect();
    (slice, total)
}

#[async_trait]
impl EmployeeStore for MemDatastore {
    async fn insert(&self, emp: NewEmployee) -> Result<u64, StoreError> {
        let mut state = self.lock();
        if state.employees.iter().any(|e| e.nip == emp.nip) {
            return Err(StoreError::Duplicate(emp.nip));
        }
        let id = state.next_employee_id;
        state.next_employee_id += 1;
        state.employees.push(Employee {
            id,
            nip: emp.nip,
            name: emp.name,
            job_title: emp.job_title,
            rank: emp.rank,
            photo: emp.photo,
            status: emp.status.to_string(),
        });
        Ok(id)
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Employee>, StoreError> {
        Ok(self.lock().employees.iter().find(|e| e.id == id).cloned())
    }

    async fn find_by_nip(&self, nip: &str) -> Result<Option<Employee>, StoreError> {
        Ok(self.lock().employees.iter().find(|e| e.nip == nip).cloned())
    }

    async fn list(
        &self,
        filter: &EmployeeFilter,
        page: Page,
    ) -> Result<(Vec<Employee>, i64), StoreError> {
        let state = self.lock();
        let mut rows: Vec<Employee> = state
            .employees
            .iter()
            .filter(|e| filter.status.as_ref().is_none_or(|s| &e.status == s))
            .filter(|e| {
                filter
                    .search
                    .as_ref()
                    .is_none_or(|q| e.nip.contains(q) || e.name.contains(q))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(paginate(rows, page))
    }

    async fn update(&self, id: u64, patch: &EmployeePatch) -> Result<u64, StoreError> {
        if patch.is_empty() {
            return Ok(0);
        }
        let mut state = self.lock();
        let Some(emp) = state.employees.iter_mut().find(|e| e.id == id) else {
            return Ok(0);
        };
        if let Some(name) = &patch.name {
            emp.name = name.clone();
        }
        if let Some(job_title) = &patch.job_title {
            emp.job_title = Some(job_title.clone());
        }
        if let Some(rank) = &patch.rank {
            emp.rank = Some(rank.clone());
        }
        if let Some(status) = patch.status {
            emp.status = status.to_string();
        }
        Ok(1)
    }

    async fn set_photo(&self, id: u64, photo: Option<&str>) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let Some(emp) = state.employees.iter_mut().find(|e| e.id == id) else {
            return Ok(0);
        };
        emp.photo = photo.map(str::to_string);
        Ok(1)
    }

    async fn delete(&self, id: u64) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let before = state.employees.len();
        state.employees.retain(|e| e.id != id);
        Ok((before - state.employees.len()) as u64)
    }

    async fn all(&self) -> Result<Vec<Employee>, StoreError> {
        Ok(self.lock().employees.clone())
    }

    async fn restore(&self, emp: &Employee) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.employees.iter().any(|e| e.nip == emp.nip) {
            return Err(StoreError::Duplicate(emp.nip.clone()));
        }
        state.next_employee_id = state.next_employee_id.max(emp.id + 1);
        state.employees.push(emp.clone());
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for MemDatastore {
    async fn insert(&self, rec: NewAttendance) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let id = state.next_attendance_id;
        state.next_attendance_id += 1;
        state.attendance.push(AttendanceRecord {
            id,
            nip: rec.nip,
            timestamp_ms: rec.timestamp_ms,
            raw_status: rec.raw_status,
            photo: rec.photo,
            verified_status: VerifiedStatus::Pending.to_string(),
            verified_by: None,
        });
        Ok(id)
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self.lock().attendance.iter().find(|r| r.id == id).cloned())
    }

    async fn list(
        &self,
        filter: &AttendanceFilter,
        page: Page,
    ) -> Result<(Vec<AttendanceRecord>, i64), StoreError> {
        let state = self.lock();
        let mut rows: Vec<AttendanceRecord> = state
            .attendance
            .iter()
            .filter(|r| filter.nip.as_ref().is_none_or(|nip| &r.nip == nip))
            .filter(|r| filter.from_ms.is_none_or(|from| r.timestamp_ms >= from))
            .filter(|r| filter.to_ms.is_none_or(|to| r.timestamp_ms < to))
            .filter(|r| {
                filter
                    .verified_status
                    .as_ref()
                    .is_none_or(|s| &r.verified_status == s)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        Ok(paginate(rows, page))
    }

    async fn photo_usage(&self, cutoff_ms: i64) -> Result<PhotoUsage, StoreError> {
        let state = self.lock();
        let mut usage = PhotoUsage::default();
        for rec in &state.attendance {
            let Some(photo) = &rec.photo else { continue };
            let chars = photo.chars().count() as i64;
            usage.total_records += 1;
            usage.total_chars += chars;
            if rec.timestamp_ms < cutoff_ms {
                usage.old_records += 1;
                usage.old_chars += chars;
            }
        }
        Ok(usage)
    }

    async fn clear_photos_before(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let mut cleaned = 0;
        for rec in &mut state.attendance {
            if rec.photo.is_some() && rec.timestamp_ms < cutoff_ms {
                rec.photo = None;
                cleaned += 1;
            }
        }
        Ok(cleaned)
    }

    async fn set_decision(
        &self,
        id: u64,
        status: &str,
        verified_by: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let Some(rec) = state.attendance.iter_mut().find(|r| r.id == id) else {
            return Ok(0);
        };
        rec.verified_status = status.to_string();
        rec.verified_by = verified_by;
        Ok(1)
    }

    async fn set_decision_if_pending(
        &self,
        id: u64,
        status: &str,
        verified_by: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let Some(rec) = state
            .attendance
            .iter_mut()
            .find(|r| r.id == id && r.verified_status == VerifiedStatus::Pending.to_string())
        else {
            return Ok(0);
        };
        rec.verified_status = status.to_string();
        rec.verified_by = verified_by;
        Ok(1)
    }

    async fn day_rollup(
        &self,
        from_ms: i64,
        to_ms: i64,
        tz_offset_minutes: i32,
    ) -> Result<Vec<DayRollup>, StoreError> {
        let offset_ms = i64::from(tz_offset_minutes) * 60_000;
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date");
        let pending = VerifiedStatus::Pending.to_string();

        let state = self.lock();
        let mut buckets: BTreeMap<i64, (i64, i64)> = BTreeMap::new();
        for rec in &state.attendance {
            if rec.timestamp_ms < from_ms || rec.timestamp_ms >= to_ms {
                continue;
            }
            let day_index = (rec.timestamp_ms + offset_ms).div_euclid(86_400_000);
            let bucket = buckets.entry(day_index).or_default();
            bucket.0 += 1;
            if rec.verified_status == pending {
                bucket.1 += 1;
            }
        }

        let mut rollups = Vec::with_capacity(buckets.len());
        for (day_index, (total, pending)) in buckets {
            if day_index < 0 {
                continue;
            }
            if let Some(date) = epoch.checked_add_days(chrono::Days::new(day_index as u64)) {
                rollups.push(DayRollup {
                    date,
                    total,
                    pending,
                });
            }
        }
        Ok(rollups)
    }

    async fn verification_counts(&self) -> Result<VerificationCounts, StoreError> {
        let state = self.lock();
        let mut counts = VerificationCounts::default();
        for rec in &state.attendance {
            counts.total += 1;
            match rec.verified_status.as_str() {
                "approved" => counts.approved += 1,
                "pending" => counts.pending += 1,
                "rejected" => counts.rejected += 1,
                _ => {}
            }
        }
        Ok(counts)
    }

    async fn all(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        Ok(self.lock().attendance.clone())
    }

    async fn restore(&self, rec: &AttendanceRecord) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.next_attendance_id = state.next_attendance_id.max(rec.id + 1);
        state.attendance.push(rec.clone());
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemDatastore {
    async fn find_by_id(&self, id: u64) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<u64, StoreError> {
        if self.fail_user_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("user inserts disabled".into()));
        }
        let mut state = self.lock();
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate(user.username));
        }
        let id = state.next_user_id;
        state.next_user_id += 1;
        state.users.push(User {
            id,
            username: user.username,
            name: user.name,
            email: user.email,
            password: user.password,
            role_id: user.role_id,
            nip: user.nip,
            last_login_at: None,
        });
        Ok(id)
    }

    async fn insert_with_id(&self, id: u64, user: NewUser) -> Result<(), StoreError> {
        if self.fail_user_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("user inserts disabled".into()));
        }
        let mut state = self.lock();
        if state.users.iter().any(|u| u.id == id) {
            return Err(StoreError::Duplicate(id.to_string()));
        }
        state.next_user_id = state.next_user_id.max(id + 1);
        state.users.push(User {
            id,
            username: user.username,
            name: user.name,
            email: user.email,
            password: user.password,
            role_id: user.role_id,
            nip: user.nip,
            last_login_at: None,
        });
        Ok(())
    }

    async fn touch_last_login(&self, id: u64) -> Result<(), StoreError> {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == id) {
            user.last_login_at = Some(chrono::Utc::now().naive_utc());
        }
        Ok(())
    }

    async fn store_refresh_token(
        &self,
        _user_id: u64,
        jti: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        self.lock().refresh_tokens.push(RefreshToken {
            jti: jti.to_string(),
            expires_at,
            revoked: false,
        });
        Ok(())
    }

    async fn refresh_token_active(&self, jti: &str) -> Result<bool, StoreError> {
        let now = chrono::Utc::now().timestamp();
        Ok(self
            .lock()
            .refresh_tokens
            .iter()
            .any(|t| t.jti == jti && !t.revoked && t.expires_at > now))
    }

    async fn revoke_refresh_token(&self, jti: &str) -> Result<(), StoreError> {
        for token in &mut self.lock().refresh_tokens {
            if token.jti == jti {
                token.revoked = true;
            }
        }
        Ok(())
    }

    async fn all(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.lock().users.clone())
    }

    async fn restore(&self, user: &User) -> Result<(), StoreError> {
        if self.fail_user_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("user inserts disabled".into()));
        }
        let mut state = self.lock();
        if state.users.iter().any(|u| u.id == user.id) {
            return Err(StoreError::Duplicate(user.id.to_string()));
        }
        state.next_user_id = state.next_user_id.max(user.id + 1);
        state.users.push(user.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::user::NewUser;

    fn account(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            name: "Account".to_string(),
            email: format!("{}@example.test", username),
            password: "hash".to_string(),
            role_id: 3,
            nip: None,
        }
    }

    #[actix_web::test]
    async fn touch_last_login_is_observable() {
        let store = MemDatastore::new();
        let id = UserStore::insert(&store, account("budi")).await.unwrap();

        let user = UserStore::find_by_id(&store, id).await.unwrap().unwrap();
        assert!(user.last_login_at.is_none());

        store.touch_last_login(id).await.unwrap();
        let user = UserStore::find_by_id(&store, id).await.unwrap().unwrap();
        assert!(user.last_login_at.is_some());

        // Unknown ids are a quiet no-op, matching the UPDATE semantics.
        store.touch_last_login(999).await.unwrap();
    }
}
