use std::sync::Arc;

use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::store::{AttendanceStore, StoreError};

pub const DEFAULT_RETENTION_MONTHS: u32 = 3;

/// Standard cutoff: three calendar months before `now`.
pub fn default_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(DEFAULT_RETENTION_MONTHS))
        .unwrap_or_else(|| now - Duration::days(90))
}

/// Short cutoff for manually exercising the feature without waiting
/// three months of wall time.
pub fn test_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::weeks(1)
}

/// Advisory snapshot of photo storage, computed on demand and never
/// cached. Sizes use the textual payload's character length divided by
/// 1024 as a KB proxy; the payload is a base64 data URI, so this
/// overestimates the decoded byte size by roughly a third plus the
/// prefix. The bound is documented rather than corrected.
#[derive(Debug, Default, Clone, Serialize, ToSchema)]
pub struct RetentionStats {
    #[schema(example = 340)]
    pub total_records_with_photos: i64,
    #[schema(example = 120)]
    pub old_records_with_photos: i64,
    #[schema(example = 51200.0)]
    pub estimated_total_kb: f64,
    #[schema(example = 18300.5)]
    pub estimated_reclaimable_kb: f64,
    #[schema(value_type = String, format = "date-time")]
    pub cutoff: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct PurgeOutcome {
    #[schema(example = 120)]
    pub records_cleaned: u64,
    #[schema(example = 18300.5)]
    pub estimated_savings_kb: f64,
}

fn kb(chars: i64) -> f64 {
    chars as f64 / 1024.0
}

#[derive(Clone)]
pub struct RetentionPolicy {
    store: Arc<dyn AttendanceStore>,
}

impl RetentionPolicy {
    pub fn new(store: Arc<dyn AttendanceStore>) -> Self {
        RetentionPolicy { store }
    }

    /// Scans photo-bearing rows and partitions them around the cutoff.
    /// An empty table yields all-zero stats.
    pub async fn compute_stats(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<RetentionStats, StoreError> {
        let usage = self.store.photo_usage(cutoff.timestamp_millis()).await?;
        Ok(RetentionStats {
            total_records_with_photos: usage.total_records,
            old_records_with_photos: usage.old_records,
            estimated_total_kb: kb(usage.total_chars),
            estimated_reclaimable_kb: kb(usage.old_chars),
            cutoff,
        })
    }

    /// Nulls photos on every row older than the cutoff. The reclaimable
    /// size is measured before the update so the report reflects what was
    /// freed; the cleaned count is the rows the update actually touched.
    /// Row-level updates are not wrapped in a batch transaction: a store
    /// failure mid-purge leaves earlier rows updated (known limitation).
    pub async fn purge_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<PurgeOutcome, StoreError> {
        let cutoff_ms = cutoff.timestamp_millis();
        let usage = self.store.photo_usage(cutoff_ms).await?;

        let records_cleaned = match self.store.clear_photos_before(cutoff_ms).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, cutoff = %cutoff, "Retention purge aborted mid-run");
                return Err(e);
            }
        };

        let outcome = PurgeOutcome {
            records_cleaned,
            estimated_savings_kb: kb(usage.old_chars),
        };
        if records_cleaned > 0 {
            info!(
                records_cleaned,
                estimated_savings_kb = outcome.estimated_savings_kb,
                cutoff = %cutoff,
                "Retention purge cleared old attendance photos"
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::NewAttendance;
    use crate::store::Datastore;

    const CUTOFF_MS: i64 = 1_000_000;

    fn cutoff() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(CUTOFF_MS).unwrap()
    }

    async fn seed(store: &Datastore, ts_ms: i64, photo: Option<&str>) -> u64 {
        store
            .attendance
            .insert(NewAttendance {
                nip: "123".into(),
                timestamp_ms: ts_ms,
                raw_status: "present".into(),
                photo: photo.map(str::to_string),
            })
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn empty_table_yields_zero_stats() {
        let store = Datastore::memory();
        let policy = RetentionPolicy::new(store.attendance.clone());

        let stats = policy.compute_stats(cutoff()).await.unwrap();
        assert_eq!(stats.total_records_with_photos, 0);
        assert_eq!(stats.old_records_with_photos, 0);
        assert_eq!(stats.estimated_total_kb, 0.0);
        assert_eq!(stats.estimated_reclaimable_kb, 0.0);
    }

    #[actix_web::test]
    async fn purge_only_touches_old_rows_with_photos() {
        let store = Datastore::memory();
        let policy = RetentionPolicy::new(store.attendance.clone());

        let old_with_photo = seed(&store, CUTOFF_MS - 10, Some("data:image/png;base64,AAAA")).await;
        let old_no_photo = seed(&store, CUTOFF_MS - 10, None).await;
        let new_with_photo = seed(&store, CUTOFF_MS + 10, Some("data:image/png;base64,BBBB")).await;
        let at_cutoff = seed(&store, CUTOFF_MS, Some("data:image/png;base64,CCCC")).await;

        let outcome = policy.purge_older_than(cutoff()).await.unwrap();
        assert_eq!(outcome.records_cleaned, 1);

        let fetch = |id| {
            let store = store.clone();
            async move { store.attendance.find_by_id(id).await.unwrap().unwrap() }
        };
        assert!(fetch(old_with_photo).await.photo.is_none());
        assert!(fetch(old_no_photo).await.photo.is_none());
        assert!(fetch(new_with_photo).await.photo.is_some());
        assert!(fetch(at_cutoff).await.photo.is_some());
    }

    #[actix_web::test]
    async fn purge_preserves_rows_and_verification_fields() {
        let store = Datastore::memory();
        let policy = RetentionPolicy::new(store.attendance.clone());

        let id = seed(&store, CUTOFF_MS - 10, Some("data:image/png;base64,AAAA")).await;
        store
            .attendance
            .set_decision(id, "approved", Some(9))
            .await
            .unwrap();

        policy.purge_older_than(cutoff()).await.unwrap();

        let rec = store.attendance.find_by_id(id).await.unwrap().unwrap();
        assert!(rec.photo.is_none());
        assert_eq!(rec.verified_status, "approved");
        assert_eq!(rec.verified_by, Some(9));
    }

    #[actix_web::test]
    async fn stats_and_purge_agree() {
        let store = Datastore::memory();
        let policy = RetentionPolicy::new(store.attendance.clone());

        for i in 0..5 {
            seed(&store, CUTOFF_MS - 100 + i, Some("data:image/png;base64,AAAA")).await;
        }
        seed(&store, CUTOFF_MS + 100, Some("data:image/png;base64,BBBB")).await;

        let stats = policy.compute_stats(cutoff()).await.unwrap();
        let outcome = policy.purge_older_than(cutoff()).await.unwrap();

        assert_eq!(stats.old_records_with_photos as u64, outcome.records_cleaned);
        assert_eq!(stats.estimated_reclaimable_kb, outcome.estimated_savings_kb);
    }

    #[actix_web::test]
    async fn second_purge_is_a_noop() {
        let store = Datastore::memory();
        let policy = RetentionPolicy::new(store.attendance.clone());

        seed(&store, CUTOFF_MS - 10, Some("data:image/png;base64,AAAA")).await;

        let first = policy.purge_older_than(cutoff()).await.unwrap();
        assert_eq!(first.records_cleaned, 1);

        let second = policy.purge_older_than(cutoff()).await.unwrap();
        assert_eq!(second.records_cleaned, 0);
        assert_eq!(second.estimated_savings_kb, 0.0);
    }

    #[test]
    fn default_cutoff_is_three_months_back() {
        let now = DateTime::parse_from_rfc3339("2025-06-15T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let cutoff = default_cutoff(now);
        assert_eq!(cutoff.to_rfc3339(), "2025-03-15T08:00:00+00:00");
    }

    #[test]
    fn test_cutoff_is_one_week_back() {
        let now = DateTime::parse_from_rfc3339("2025-06-15T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(test_cutoff(now), now - Duration::weeks(1));
    }
}
