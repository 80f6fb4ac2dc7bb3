//! Verification workflow: pending attendance submissions are approved or
//! rejected by an admin, with the acting verifier recorded. A missing
//! verifier identity is auto-provisioned rather than blocking the
//! decision; if provisioning itself fails the decision is recorded
//! unattributed.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::model::{
    attendance::{AttendanceRecord, VerifiedStatus},
    role::Role,
    user::NewUser,
};
use crate::store::{AttendanceFilter, AttendanceStore, Page, StoreError, UserStore, VerificationCounts};

/// Display name given to auto-provisioned verifier identities.
pub const PLACEHOLDER_VERIFIER_NAME: &str = "Admin User";

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString, Deserialize, ToSchema)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn status(self) -> VerifiedStatus {
        match self {
            Decision::Approved => VerifiedStatus::Approved,
            Decision::Rejected => VerifiedStatus::Rejected,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecideError {
    #[error("attendance record not found")]
    NotFound,
    #[error("record already decided")]
    AlreadyDecided,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy)]
pub struct DecisionOutcome {
    /// Verifier recorded on the row; `None` when the identity could not be
    /// resolved or provisioned.
    pub verified_by: Option<u64>,
    pub provisioned: bool,
}

/// Per-day annotation for the verification date picker.
#[derive(Debug, Clone, Copy, serde::Serialize, ToSchema)]
pub struct DayFlags {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub has_any: bool,
    pub has_pending: bool,
}

#[derive(Clone)]
pub struct VerificationService {
    attendance: Arc<dyn AttendanceStore>,
    users: Arc<dyn UserStore>,
    tz_offset_minutes: i32,
}

impl VerificationService {
    pub fn new(
        attendance: Arc<dyn AttendanceStore>,
        users: Arc<dyn UserStore>,
        tz_offset_minutes: i32,
    ) -> Self {
        VerificationService {
            attendance,
            users,
            tz_offset_minutes,
        }
    }

    /// Records a decision, overwriting any prior one. Re-deciding a
    /// decided record is allowed here; use [`decide_if_pending`] for the
    /// one-shot variant.
    ///
    /// [`decide_if_pending`]: Self::decide_if_pending
    pub async fn decide(
        &self,
        record_id: u64,
        decision: Decision,
        verifier_id: u64,
    ) -> Result<DecisionOutcome, DecideError> {
        let outcome = self.resolve_verifier(verifier_id).await;
        let rows = self
            .attendance
            .set_decision(record_id, &decision.status().to_string(), outcome.verified_by)
            .await?;
        if rows == 0 {
            return Err(DecideError::NotFound);
        }
        info!(
            record_id,
            decision = %decision,
            verified_by = ?outcome.verified_by,
            "Attendance decision recorded"
        );
        Ok(outcome)
    }

    /// Compare-and-set decision: succeeds only while the record is still
    /// pending.
    pub async fn decide_if_pending(
        &self,
        record_id: u64,
        decision: Decision,
        verifier_id: u64,
    ) -> Result<DecisionOutcome, DecideError> {
        let outcome = self.resolve_verifier(verifier_id).await;
        let rows = self
            .attendance
            .set_decision_if_pending(
                record_id,
                &decision.status().to_string(),
                outcome.verified_by,
            )
            .await?;
        if rows == 0 {
            return match self.attendance.find_by_id(record_id).await? {
                Some(_) => Err(DecideError::AlreadyDecided),
                None => Err(DecideError::NotFound),
            };
        }
        Ok(outcome)
    }

    /// Resolves the verifier identity, provisioning a placeholder on a
    /// miss. Never fails: a provisioning error degrades to an
    /// unattributed decision.
    async fn resolve_verifier(&self, verifier_id: u64) -> DecisionOutcome {
        match self.users.find_by_id(verifier_id).await {
            Ok(Some(_)) => DecisionOutcome {
                verified_by: Some(verifier_id),
                provisioned: false,
            },
            Ok(None) => {
                // Placeholder identity: not a login account, so no usable
                // password hash is stored.
                let placeholder = NewUser {
                    username: format!("admin{}", verifier_id),
                    name: PLACEHOLDER_VERIFIER_NAME.to_string(),
                    email: format!("admin{}@absensi.local", verifier_id),
                    password: String::new(),
                    role_id: Role::AdminVerif.id(),
                    nip: None,
                };
                match self.users.insert_with_id(verifier_id, placeholder).await {
                    Ok(()) => {
                        info!(verifier_id, "Provisioned placeholder verifier identity");
                        DecisionOutcome {
                            verified_by: Some(verifier_id),
                            provisioned: true,
                        }
                    }
                    Err(e) => {
                        warn!(
                            verifier_id,
                            error = %e,
                            "Verifier provisioning failed, recording decision unattributed"
                        );
                        DecisionOutcome {
                            verified_by: None,
                            provisioned: false,
                        }
                    }
                }
            }
            Err(e) => {
                warn!(
                    verifier_id,
                    error = %e,
                    "Verifier lookup failed, recording decision unattributed"
                );
                DecisionOutcome {
                    verified_by: None,
                    provisioned: false,
                }
            }
        }
    }

    /// Records captured on one local calendar day, newest first.
    pub async fn day_slice(
        &self,
        date: NaiveDate,
        page: Page,
    ) -> Result<(Vec<AttendanceRecord>, i64), StoreError> {
        let (from_ms, to_ms) = day_range_ms(date, self.tz_offset_minutes);
        let filter = AttendanceFilter {
            from_ms: Some(from_ms),
            to_ms: Some(to_ms),
            ..AttendanceFilter::default()
        };
        self.attendance.list(&filter, page).await
    }

    /// Existence flags for every day of a month.
    pub async fn month_flags(&self, year: i32, month: u32) -> Result<Vec<DayFlags>, StoreError> {
        let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
            return Ok(Vec::new());
        };
        let next_month = first
            .checked_add_months(chrono::Months::new(1))
            .unwrap_or(first);
        let from_ms = local_day_start_ms(first, self.tz_offset_minutes);
        let to_ms = local_day_start_ms(next_month, self.tz_offset_minutes);

        let rollups = self
            .attendance
            .day_rollup(from_ms, to_ms, self.tz_offset_minutes)
            .await?;

        let mut flags = Vec::new();
        let mut day = first;
        while day < next_month {
            let rollup = rollups.iter().find(|r| r.date == day);
            flags.push(DayFlags {
                date: day,
                has_any: rollup.is_some_and(|r| r.total > 0),
                has_pending: rollup.is_some_and(|r| r.pending > 0),
            });
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        Ok(flags)
    }

    pub async fn counts(&self) -> Result<VerificationCounts, StoreError> {
        self.attendance.verification_counts().await
    }
}

/// UTC epoch millis of local midnight for the given date.
pub fn local_day_start_ms(date: NaiveDate, tz_offset_minutes: i32) -> i64 {
    let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is valid");
    midnight.and_utc().timestamp_millis() - i64::from(tz_offset_minutes) * 60_000
}

/// Half-open UTC epoch-millis range covering one local calendar day.
pub fn day_range_ms(date: NaiveDate, tz_offset_minutes: i32) -> (i64, i64) {
    let start = local_day_start_ms(date, tz_offset_minutes);
    (start, start + 86_400_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::{NewAttendance, classify_raw_status};
    use crate::retention::policy::{RetentionPolicy, default_cutoff};
    use crate::store::Datastore;
    use chrono::{NaiveTime, Utc};

    const WIB_MINUTES: i32 = 7 * 60;

    fn service(store: &Datastore) -> VerificationService {
        VerificationService::new(store.attendance.clone(), store.users.clone(), WIB_MINUTES)
    }

    async fn seed_pending(store: &Datastore, ts_ms: i64) -> u64 {
        store
            .attendance
            .insert(NewAttendance {
                nip: "123".into(),
                timestamp_ms: ts_ms,
                raw_status: "present".into(),
                photo: Some("data:image/png;base64,AAAA".into()),
            })
            .await
            .unwrap()
    }

    async fn seed_verifier(store: &Datastore, username: &str) -> u64 {
        store
            .users
            .insert(NewUser {
                username: username.into(),
                name: "Verifier".into(),
                email: format!("{}@example.test", username),
                password: "hash".into(),
                role_id: Role::AdminVerif.id(),
                nip: None,
            })
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn decide_records_status_and_verifier() {
        let store = Datastore::memory();
        let svc = service(&store);
        let verifier = seed_verifier(&store, "verif").await;
        let id = seed_pending(&store, 1_000).await;

        let outcome = svc.decide(id, Decision::Approved, verifier).await.unwrap();
        assert_eq!(outcome.verified_by, Some(verifier));
        assert!(!outcome.provisioned);

        let rec = store.attendance.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(rec.verified_status, "approved");
        assert_eq!(rec.verified_by, Some(verifier));
    }

    #[actix_web::test]
    async fn decide_on_missing_record_is_not_found() {
        let store = Datastore::memory();
        let svc = service(&store);
        let verifier = seed_verifier(&store, "verif").await;

        let err = svc.decide(999, Decision::Approved, verifier).await.unwrap_err();
        assert!(matches!(err, DecideError::NotFound));
    }

    #[actix_web::test]
    async fn missing_verifier_is_auto_provisioned() {
        let store = Datastore::memory();
        let svc = service(&store);
        let id = seed_pending(&store, 1_000).await;

        let outcome = svc.decide(id, Decision::Approved, 42).await.unwrap();
        assert_eq!(outcome.verified_by, Some(42));
        assert!(outcome.provisioned);

        let provisioned = store.users.find_by_id(42).await.unwrap().unwrap();
        assert_eq!(provisioned.name, PLACEHOLDER_VERIFIER_NAME);
        assert_eq!(provisioned.role_id, Role::AdminVerif.id());
    }

    #[actix_web::test]
    async fn provisioning_failure_degrades_to_unattributed() {
        let store = Datastore::memory();
        let mem = crate::store::memory::MemDatastore::new();
        let mem = std::sync::Arc::new(mem);
        mem.fail_user_inserts(true);
        let svc = VerificationService::new(store.attendance.clone(), mem, WIB_MINUTES);
        let id = seed_pending(&store, 1_000).await;

        let outcome = svc.decide(id, Decision::Rejected, 42).await.unwrap();
        assert_eq!(outcome.verified_by, None);

        let rec = store.attendance.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(rec.verified_status, "rejected");
        assert_eq!(rec.verified_by, None);
    }

    #[actix_web::test]
    async fn redeciding_overwrites_prior_decision() {
        let store = Datastore::memory();
        let svc = service(&store);
        let first = seed_verifier(&store, "first").await;
        let second = seed_verifier(&store, "second").await;
        let id = seed_pending(&store, 1_000).await;

        svc.decide(id, Decision::Approved, first).await.unwrap();
        svc.decide(id, Decision::Rejected, second).await.unwrap();

        let rec = store.attendance.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(rec.verified_status, "rejected");
        assert_eq!(rec.verified_by, Some(second));
    }

    #[actix_web::test]
    async fn decide_if_pending_refuses_decided_records() {
        let store = Datastore::memory();
        let svc = service(&store);
        let verifier = seed_verifier(&store, "verif").await;
        let id = seed_pending(&store, 1_000).await;

        svc.decide_if_pending(id, Decision::Approved, verifier)
            .await
            .unwrap();
        let err = svc
            .decide_if_pending(id, Decision::Rejected, verifier)
            .await
            .unwrap_err();
        assert!(matches!(err, DecideError::AlreadyDecided));

        let rec = store.attendance.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(rec.verified_status, "approved");

        let err = svc
            .decide_if_pending(999, Decision::Approved, verifier)
            .await
            .unwrap_err();
        assert!(matches!(err, DecideError::NotFound));
    }

    #[actix_web::test]
    async fn day_views_bucket_by_local_day() {
        let store = Datastore::memory();
        let svc = service(&store);

        let monday = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2025, 1, 7).unwrap();
        let monday_id = seed_pending(&store, local_day_start_ms(monday, WIB_MINUTES) + 3_600_000).await;
        seed_pending(&store, local_day_start_ms(tuesday, WIB_MINUTES) + 3_600_000).await;

        let (rows, total) = svc
            .day_slice(monday, Page::clamped(1, 10))
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, monday_id);

        let verifier = seed_verifier(&store, "verif").await;
        svc.decide(monday_id, Decision::Approved, verifier)
            .await
            .unwrap();

        let flags = svc.month_flags(2025, 1).await.unwrap();
        assert_eq!(flags.len(), 31);
        let jan6 = flags.iter().find(|f| f.date == monday).unwrap();
        assert!(jan6.has_any);
        assert!(!jan6.has_pending);
        let jan7 = flags.iter().find(|f| f.date == tuesday).unwrap();
        assert!(jan7.has_any);
        assert!(jan7.has_pending);
        let jan8 = flags
            .iter()
            .find(|f| f.date == NaiveDate::from_ymd_opt(2025, 1, 8).unwrap())
            .unwrap();
        assert!(!jan8.has_any);

        let counts = svc.counts().await.unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.approved, 1);
        assert_eq!(counts.pending, 1);
    }

    /// End-to-end path: a late submission stays pending, is excluded by
    /// the three-month stats cutoff, and is approvable by an admin.
    #[actix_web::test]
    async fn late_submission_flows_through_verification() {
        let store = Datastore::memory();
        let svc = service(&store);
        let policy = RetentionPolicy::new(store.attendance.clone());

        let now = Utc::now();
        let cutoff_time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let capture = NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(8, 15, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
            - i64::from(WIB_MINUTES) * 60_000;
        let raw = classify_raw_status(capture, WIB_MINUTES, cutoff_time);
        assert_eq!(raw, "present-late");

        let id = store
            .attendance
            .insert(NewAttendance {
                nip: "123".into(),
                timestamp_ms: now.timestamp_millis(),
                raw_status: raw.to_string(),
                photo: Some("data:image/png;base64,AAAA".into()),
            })
            .await
            .unwrap();

        let rec = store.attendance.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(rec.verified_status, "pending");

        // Fresh submission is not reclaimable under the 3-month cutoff.
        let stats = policy.compute_stats(default_cutoff(now)).await.unwrap();
        assert_eq!(stats.total_records_with_photos, 1);
        assert_eq!(stats.old_records_with_photos, 0);

        let admin = seed_verifier(&store, "adminverif").await;
        svc.decide(id, Decision::Approved, admin).await.unwrap();
        let rec = store.attendance.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(rec.verified_status, "approved");
        assert_eq!(rec.verified_by, Some(admin));
    }
}
