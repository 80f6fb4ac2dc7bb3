//! One-shot batch migration between two store backends. The historical
//! deployment kept a parallel SQLite schema; this replaces that dual-write
//! path with a single copy pass over the store abstraction.

use tracing::info;

use super::{Datastore, StoreError};

#[derive(Debug, Default, Clone, Copy)]
pub struct MigrationReport {
    pub employees: u64,
    pub users: u64,
    pub attendance: u64,
}

/// Copies employees, users, and attendance from `src` into `dst`,
/// preserving row ids so verifier references and business keys stay
/// intact. Intended to run once against an empty destination.
pub async fn copy_all(src: &Datastore, dst: &Datastore) -> Result<MigrationReport, StoreError> {
    let mut report = MigrationReport::default();

    for emp in src.employees.all().await? {
        dst.employees.restore(&emp).await?;
        report.employees += 1;
    }
    for user in src.users.all().await? {
        dst.users.restore(&user).await?;
        report.users += 1;
    }
    for rec in src.attendance.all().await? {
        dst.attendance.restore(&rec).await?;
        report.attendance += 1;
    }

    info!(
        employees = report.employees,
        users = report.users,
        attendance = report.attendance,
        "Store migration complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::NewAttendance;
    use crate::model::employee::{EmployeeStatus, NewEmployee};
    use crate::model::user::NewUser;

    fn employee(nip: &str) -> NewEmployee {
        NewEmployee {
            nip: nip.to_string(),
            name: format!("Employee {}", nip),
            job_title: None,
            rank: None,
            photo: None,
            status: EmployeeStatus::Active,
        }
    }

    #[actix_web::test]
    async fn copy_preserves_rows_and_references() {
        let src = Datastore::memory();
        let dst = Datastore::memory();

        src.employees.insert(employee("100")).await.unwrap();
        src.employees.insert(employee("200")).await.unwrap();
        let verifier = src
            .users
            .insert(NewUser {
                username: "verif".into(),
                name: "Verifier".into(),
                email: "verif@example.test".into(),
                password: "hash".into(),
                role_id: 2,
                nip: None,
            })
            .await
            .unwrap();
        let rec = src
            .attendance
            .insert(NewAttendance {
                nip: "100".into(),
                timestamp_ms: 1_000,
                raw_status: "present".into(),
                photo: Some("data:image/png;base64,AAAA".into()),
            })
            .await
            .unwrap();
        src.attendance
            .set_decision(rec, "approved", Some(verifier))
            .await
            .unwrap();

        let report = copy_all(&src, &dst).await.unwrap();
        assert_eq!(report.employees, 2);
        assert_eq!(report.users, 1);
        assert_eq!(report.attendance, 1);

        let copied = dst.attendance.find_by_id(rec).await.unwrap().unwrap();
        assert_eq!(copied.verified_status, "approved");
        assert_eq!(copied.verified_by, Some(verifier));
        assert!(dst.users.find_by_id(verifier).await.unwrap().is_some());
        assert!(dst.employees.find_by_nip("200").await.unwrap().is_some());
    }

    #[actix_web::test]
    async fn copy_reports_duplicate_destination_rows() {
        let src = Datastore::memory();
        let dst = Datastore::memory();

        src.employees.insert(employee("100")).await.unwrap();
        dst.employees.insert(employee("100")).await.unwrap();

        let err = copy_all(&src, &dst).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }
}
