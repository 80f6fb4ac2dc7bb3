use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use actix_web::rt::task::JoinHandle;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::store::AttendanceStore;

use super::policy::{PurgeOutcome, RetentionPolicy, default_cutoff};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug)]
pub enum CleanupOutcome {
    Completed(PurgeOutcome),
    /// A run was already in flight; this invocation did nothing.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerStatus {
    pub automation_running: bool,
    pub cleanup_running: bool,
}

struct Automation {
    timer: Option<JoinHandle<()>>,
    running: bool,
}

struct Runner {
    policy: RetentionPolicy,
    cleanup_running: AtomicBool,
}

/// Releases the in-flight flag even when the purge errors or the run is
/// cancelled mid-await.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Runner {
    async fn run_once(&self) -> CleanupOutcome {
        if self
            .cleanup_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Cleanup already in flight, skipping this run");
            return CleanupOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.cleanup_running);

        let cutoff = default_cutoff(Utc::now());
        match self.policy.purge_older_than(cutoff).await {
            Ok(outcome) => CleanupOutcome::Completed(outcome),
            Err(e) => {
                error!(error = %e, "Scheduled cleanup failed");
                CleanupOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Drives the retention purge on a fixed period. One instance per
/// deployment, owned by the application and injected via `web::Data`.
/// Automation state is process-lifetime only: a restart silently loses
/// the "automation running" flag.
pub struct CleanupScheduler {
    runner: Arc<Runner>,
    automation: Mutex<Automation>,
    period: Duration,
}

impl CleanupScheduler {
    pub fn new(store: Arc<dyn AttendanceStore>, period: Duration) -> Self {
        CleanupScheduler {
            runner: Arc::new(Runner {
                policy: RetentionPolicy::new(store),
                cleanup_running: AtomicBool::new(false),
            }),
            automation: Mutex::new(Automation {
                timer: None,
                running: false,
            }),
            period,
        }
    }

    /// Registers the recurring timer. Returns `AlreadyRunning` without
    /// touching the existing timer when automation is already on.
    pub fn start(&self) -> StartOutcome {
        let mut automation = self.automation.lock().expect("scheduler state poisoned");
        if automation.running {
            return StartOutcome::AlreadyRunning;
        }

        let runner = self.runner.clone();
        let period = self.period;
        automation.timer = Some(actix_web::rt::spawn(async move {
            let mut ticker = actix_web::rt::time::interval(period);
            // The first tick resolves immediately; the schedule starts one
            // full period out.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                runner.run_once().await;
            }
        }));
        automation.running = true;
        info!(period_secs = period.as_secs(), "Cleanup automation started");
        StartOutcome::Started
    }

    /// Cancels the timer if present. Idempotent.
    pub fn stop(&self) {
        let mut automation = self.automation.lock().expect("scheduler state poisoned");
        if let Some(timer) = automation.timer.take() {
            timer.abort();
        }
        if automation.running {
            info!("Cleanup automation stopped");
        }
        automation.running = false;
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            automation_running: self
                .automation
                .lock()
                .expect("scheduler state poisoned")
                .running,
            cleanup_running: self.runner.cleanup_running.load(Ordering::SeqCst),
        }
    }

    /// Runs one cleanup immediately, regardless of automation state.
    /// Skips (without waiting) if a run is already in flight.
    pub async fn trigger(&self) -> CleanupOutcome {
        self.runner.run_once().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::channel::oneshot;

    use crate::model::attendance::{AttendanceRecord, NewAttendance};
    use crate::store::{
        AttendanceFilter, AttendanceStore, Datastore, DayRollup, Page, PhotoUsage, StoreError,
        VerificationCounts,
    };

    #[actix_web::test]
    async fn start_twice_reports_already_running() {
        let store = Datastore::memory();
        let scheduler = CleanupScheduler::new(store.attendance.clone(), Duration::from_secs(3600));

        assert_eq!(scheduler.start(), StartOutcome::Started);
        assert_eq!(scheduler.start(), StartOutcome::AlreadyRunning);
        assert!(scheduler.status().automation_running);

        scheduler.stop();
        assert!(!scheduler.status().automation_running);
        // stop is idempotent
        scheduler.stop();
        assert_eq!(scheduler.start(), StartOutcome::Started);
        scheduler.stop();
    }

    #[actix_web::test]
    async fn status_has_no_side_effects() {
        let store = Datastore::memory();
        let scheduler = CleanupScheduler::new(store.attendance.clone(), Duration::from_secs(3600));

        let status = scheduler.status();
        assert!(!status.automation_running);
        assert!(!status.cleanup_running);
        assert_eq!(scheduler.start(), StartOutcome::Started);
        scheduler.stop();
    }

    #[actix_web::test]
    async fn trigger_works_without_automation() {
        let store = Datastore::memory();
        store
            .attendance
            .insert(NewAttendance {
                nip: "123".into(),
                timestamp_ms: 0,
                raw_status: "present".into(),
                photo: Some("data:image/png;base64,AAAA".into()),
            })
            .await
            .unwrap();

        let scheduler = CleanupScheduler::new(store.attendance.clone(), Duration::from_secs(3600));
        match scheduler.trigger().await {
            CleanupOutcome::Completed(outcome) => assert_eq!(outcome.records_cleaned, 1),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    /// Store whose scan blocks until released, holding a cleanup in
    /// flight for the overlap test.
    struct BlockingStore {
        release: Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl AttendanceStore for BlockingStore {
        async fn photo_usage(&self, _cutoff_ms: i64) -> Result<PhotoUsage, StoreError> {
            let rx = self.release.lock().unwrap().take();
            if let Some(rx) = rx {
                let _ = rx.await;
            }
            Ok(PhotoUsage::default())
        }

        async fn clear_photos_before(&self, _cutoff_ms: i64) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn insert(&self, _rec: NewAttendance) -> Result<u64, StoreError> {
            unimplemented!()
        }
        async fn find_by_id(&self, _id: u64) -> Result<Option<AttendanceRecord>, StoreError> {
            unimplemented!()
        }
        async fn list(
            &self,
            _filter: &AttendanceFilter,
            _page: Page,
        ) -> Result<(Vec<AttendanceRecord>, i64), StoreError> {
            unimplemented!()
        }
        async fn set_decision(
            &self,
            _id: u64,
            _status: &str,
            _verified_by: Option<u64>,
        ) -> Result<u64, StoreError> {
            unimplemented!()
        }
        async fn set_decision_if_pending(
            &self,
            _id: u64,
            _status: &str,
            _verified_by: Option<u64>,
        ) -> Result<u64, StoreError> {
            unimplemented!()
        }
        async fn day_rollup(
            &self,
            _from_ms: i64,
            _to_ms: i64,
            _tz_offset_minutes: i32,
        ) -> Result<Vec<DayRollup>, StoreError> {
            unimplemented!()
        }
        async fn verification_counts(&self) -> Result<VerificationCounts, StoreError> {
            unimplemented!()
        }
        async fn all(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
            unimplemented!()
        }
        async fn restore(&self, _rec: &AttendanceRecord) -> Result<(), StoreError> {
            unimplemented!()
        }
    }

    #[actix_web::test]
    async fn trigger_skips_while_cleanup_in_flight() {
        let (tx, rx) = oneshot::channel();
        let store = Arc::new(BlockingStore {
            release: Mutex::new(Some(rx)),
        });
        let scheduler = Arc::new(CleanupScheduler::new(store, Duration::from_secs(3600)));

        let in_flight = scheduler.clone();
        let first = actix_web::rt::spawn(async move { in_flight.trigger().await });

        // Let the spawned run take the flag and park on the blocked scan.
        for _ in 0..10 {
            if scheduler.status().cleanup_running {
                break;
            }
            actix_web::rt::task::yield_now().await;
        }
        assert!(scheduler.status().cleanup_running);

        // Second trigger returns immediately as a skip.
        assert!(matches!(scheduler.trigger().await, CleanupOutcome::Skipped));

        tx.send(()).unwrap();
        let outcome = first.await.unwrap();
        assert!(matches!(outcome, CleanupOutcome::Completed(_)));
        assert!(!scheduler.status().cleanup_running);
    }

    #[actix_web::test]
    async fn failed_run_releases_the_in_flight_flag() {
        struct FailingStore;

        #[async_trait]
        impl AttendanceStore for FailingStore {
            async fn photo_usage(&self, _cutoff_ms: i64) -> Result<PhotoUsage, StoreError> {
                Err(StoreError::Unavailable("down".into()))
            }
            async fn clear_photos_before(&self, _cutoff_ms: i64) -> Result<u64, StoreError> {
                Err(StoreError::Unavailable("down".into()))
            }
            async fn insert(&self, _rec: NewAttendance) -> Result<u64, StoreError> {
                unimplemented!()
            }
            async fn find_by_id(&self, _id: u64) -> Result<Option<AttendanceRecord>, StoreError> {
                unimplemented!()
            }
            async fn list(
                &self,
                _filter: &AttendanceFilter,
                _page: Page,
            ) -> Result<(Vec<AttendanceRecord>, i64), StoreError> {
                unimplemented!()
            }
            async fn set_decision(
                &self,
                _id: u64,
                _status: &str,
                _verified_by: Option<u64>,
            ) -> Result<u64, StoreError> {
                unimplemented!()
            }
            async fn set_decision_if_pending(
                &self,
                _id: u64,
                _status: &str,
                _verified_by: Option<u64>,
            ) -> Result<u64, StoreError> {
                unimplemented!()
            }
            async fn day_rollup(
                &self,
                _from_ms: i64,
                _to_ms: i64,
                _tz_offset_minutes: i32,
            ) -> Result<Vec<DayRollup>, StoreError> {
                unimplemented!()
            }
            async fn verification_counts(&self) -> Result<VerificationCounts, StoreError> {
                unimplemented!()
            }
            async fn all(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
                unimplemented!()
            }
            async fn restore(&self, _rec: &AttendanceRecord) -> Result<(), StoreError> {
                unimplemented!()
            }
        }

        let scheduler = Arc::new(CleanupScheduler::new(
            Arc::new(FailingStore),
            Duration::from_secs(3600),
        ));
        assert!(matches!(scheduler.trigger().await, CleanupOutcome::Failed(_)));
        assert!(!scheduler.status().cleanup_running);
        // A later trigger is not blocked by the failed one.
        assert!(matches!(scheduler.trigger().await, CleanupOutcome::Failed(_)));
    }
}
