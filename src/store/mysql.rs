//! MySQL adapter. Queries are runtime-bound (`sqlx::query*` with `.bind`)
//! so the crate builds without a reachable database.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::MySqlPool;
use tracing::debug;

use crate::model::{
    attendance::{AttendanceRecord, NewAttendance, VerifiedStatus},
    employee::{Employee, EmployeePatch, NewEmployee},
    user::{NewUser, User},
};

use super::{
    AttendanceFilter, AttendanceStore, DayRollup, EmployeeFilter, EmployeeStore, Page, PhotoUsage,
    StoreError, UserStore, VerificationCounts,
};

pub struct MySqlDatastore {
    pool: MySqlPool,
}

impl MySqlDatastore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlDatastore { pool }
    }
}

/// MySQL signals unique-key violations with SQLSTATE 23000.
fn map_insert_err(e: sqlx::Error, key: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23000") {
            return StoreError::Duplicate(key.to_string());
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl EmployeeStore for MySqlDatastore {
    async fn insert(&self, emp: NewEmployee) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO employees (nip, name, job_title, `rank`, photo, status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&emp.nip)
        .bind(&emp.name)
        .bind(&emp.job_title)
        .bind(&emp.rank)
        .bind(&emp.photo)
        .bind(emp.status.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, &emp.nip))?;

        Ok(result.last_insert_id())
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Employee>, StoreError> {
        let emp = sqlx::query_as::<_, Employee>(
            "SELECT id, nip, name, job_title, `rank`, photo, status FROM employees WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(emp)
    }

    async fn find_by_nip(&self, nip: &str) -> Result<Option<Employee>, StoreError> {
        let emp = sqlx::query_as::<_, Employee>(
            "SELECT id, nip, name, job_title, `rank`, photo, status FROM employees WHERE nip = ?",
        )
        .bind(nip)
        .fetch_optional(&self.pool)
        .await?;
        Ok(emp)
    }

    async fn list(
        &self,
        filter: &EmployeeFilter,
        page: Page,
    ) -> Result<(Vec<Employee>, i64), StoreError> {
        let mut where_sql = String::from(" WHERE 1=1");
        if filter.status.is_some() {
            where_sql.push_str(" AND status = ?");
        }
        if filter.search.is_some() {
            where_sql.push_str(" AND (nip LIKE ? OR name LIKE ?)");
        }

        let like = filter.search.as_ref().map(|s| format!("%{}%", s));

        let count_sql = format!("SELECT COUNT(*) FROM employees{}", where_sql);
        debug!(sql = %count_sql, "Counting employees");

        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(status) = &filter.status {
            count_q = count_q.bind(status);
        }
        if let Some(like) = &like {
            count_q = count_q.bind(like).bind(like);
        }
        let total = count_q.fetch_one(&self.pool).await?;

        let data_sql = format!(
            "SELECT id, nip, name, job_title, `rank`, photo, status FROM employees{} \
             ORDER BY id DESC LIMIT ? OFFSET ?",
            where_sql
        );
        let mut data_q = sqlx::query_as::<_, Employee>(&data_sql);
        if let Some(status) = &filter.status {
            data_q = data_q.bind(status);
        }
        if let Some(like) = &like {
            data_q = data_q.bind(like).bind(like);
        }
        let rows = data_q
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    async fn update(&self, id: u64, patch: &EmployeePatch) -> Result<u64, StoreError> {
        if patch.is_empty() {
            return Ok(0);
        }

        let mut sets = Vec::new();
        if patch.name.is_some() {
            sets.push("name = ?");
        }
        if patch.job_title.is_some() {
            sets.push("job_title = ?");
        }
        if patch.rank.is_some() {
            sets.push("`rank` = ?");
        }
        if patch.status.is_some() {
            sets.push("status = ?");
        }

        let sql = format!("UPDATE employees SET {} WHERE id = ?", sets.join(", "));
        let mut q = sqlx::query(&sql);
        if let Some(name) = &patch.name {
            q = q.bind(name);
        }
        if let Some(job_title) = &patch.job_title {
            q = q.bind(job_title);
        }
        if let Some(rank) = &patch.rank {
            q = q.bind(rank);
        }
        if let Some(status) = patch.status {
            q = q.bind(status.to_string());
        }
        let result = q.bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn set_photo(&self, id: u64, photo: Option<&str>) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE employees SET photo = ? WHERE id = ?")
            .bind(photo)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: u64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM employees WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn all(&self) -> Result<Vec<Employee>, StoreError> {
        let rows = sqlx::query_as::<_, Employee>(
            "SELECT id, nip, name, job_title, `rank`, photo, status FROM employees ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn restore(&self, emp: &Employee) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO employees (id, nip, name, job_title, `rank`, photo, status)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(emp.id)
        .bind(&emp.nip)
        .bind(&emp.name)
        .bind(&emp.job_title)
        .bind(&emp.rank)
        .bind(&emp.photo)
        .bind(&emp.status)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, &emp.nip))?;
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for MySqlDatastore {
    async fn insert(&self, rec: NewAttendance) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance (nip, timestamp_ms, raw_status, photo, verified_status)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&rec.nip)
        .bind(rec.timestamp_ms)
        .bind(&rec.raw_status)
        .bind(&rec.photo)
        .bind(VerifiedStatus::Pending.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_id())
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<AttendanceRecord>, StoreError> {
        let rec = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT id, nip, timestamp_ms, raw_status, photo, verified_status, verified_by \
             FROM attendance WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn list(
        &self,
        filter: &AttendanceFilter,
        page: Page,
    ) -> Result<(Vec<AttendanceRecord>, i64), StoreError> {
        let mut where_sql = String::from(" WHERE 1=1");
        if filter.nip.is_some() {
            where_sql.push_str(" AND nip = ?");
        }
        if filter.from_ms.is_some() {
            where_sql.push_str(" AND timestamp_ms >= ?");
        }
        if filter.to_ms.is_some() {
            where_sql.push_str(" AND timestamp_ms < ?");
        }
        if filter.verified_status.is_some() {
            where_sql.push_str(" AND verified_status = ?");
        }

        let count_sql = format!("SELECT COUNT(*) FROM attendance{}", where_sql);
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(nip) = &filter.nip {
            count_q = count_q.bind(nip);
        }
        if let Some(from_ms) = filter.from_ms {
            count_q = count_q.bind(from_ms);
        }
        if let Some(to_ms) = filter.to_ms {
            count_q = count_q.bind(to_ms);
        }
        if let Some(status) = &filter.verified_status {
            count_q = count_q.bind(status);
        }
        let total = count_q.fetch_one(&self.pool).await?;

        let data_sql = format!(
            "SELECT id, nip, timestamp_ms, raw_status, photo, verified_status, verified_by \
             FROM attendance{} ORDER BY timestamp_ms DESC LIMIT ? OFFSET ?",
            where_sql
        );
        let mut data_q = sqlx::query_as::<_, AttendanceRecord>(&data_sql);
        if let Some(nip) = &filter.nip {
            data_q = data_q.bind(nip);
        }
        if let Some(from_ms) = filter.from_ms {
            data_q = data_q.bind(from_ms);
        }
        if let Some(to_ms) = filter.to_ms {
            data_q = data_q.bind(to_ms);
        }
        if let Some(status) = &filter.verified_status {
            data_q = data_q.bind(status);
        }
        let rows = data_q
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    async fn photo_usage(&self, cutoff_ms: i64) -> Result<PhotoUsage, StoreError> {
        let (total_records, total_chars, old_records, old_chars) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"
                SELECT
                    COUNT(*),
                    CAST(COALESCE(SUM(CHAR_LENGTH(photo)), 0) AS SIGNED),
                    CAST(COALESCE(SUM(CASE WHEN timestamp_ms < ? THEN 1 ELSE 0 END), 0) AS SIGNED),
                    CAST(COALESCE(SUM(CASE WHEN timestamp_ms < ? THEN CHAR_LENGTH(photo) ELSE 0 END), 0) AS SIGNED)
                FROM attendance
                WHERE photo IS NOT NULL
                "#,
            )
            .bind(cutoff_ms)
            .bind(cutoff_ms)
            .fetch_one(&self.pool)
            .await?;

        Ok(PhotoUsage {
            total_records,
            total_chars,
            old_records,
            old_chars,
        })
    }

    async fn clear_photos_before(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE attendance SET photo = NULL WHERE photo IS NOT NULL AND timestamp_ms < ?",
        )
        .bind(cutoff_ms)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn set_decision(
        &self,
        id: u64,
        status: &str,
        verified_by: Option<u64>,
    ) -> Result<u64, StoreError> {
        let result =
            sqlx::query("UPDATE attendance SET verified_status = ?, verified_by = ? WHERE id = ?")
                .bind(status)
                .bind(verified_by)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn set_decision_if_pending(
        &self,
        id: u64,
        status: &str,
        verified_by: Option<u64>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE attendance SET verified_status = ?, verified_by = ? \
             WHERE id = ? AND verified_status = 'pending'",
        )
        .bind(status)
        .bind(verified_by)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn day_rollup(
        &self,
        from_ms: i64,
        to_ms: i64,
        tz_offset_minutes: i32,
    ) -> Result<Vec<DayRollup>, StoreError> {
        // Bucketing is done on days-since-epoch shifted into local time so
        // the grouping is independent of the server session timezone.
        let offset_ms = i64::from(tz_offset_minutes) * 60_000;
        let rows = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                CAST(FLOOR((timestamp_ms + ?) / 86400000) AS SIGNED) AS day_index,
                COUNT(*),
                CAST(SUM(CASE WHEN verified_status = 'pending' THEN 1 ELSE 0 END) AS SIGNED)
            FROM attendance
            WHERE timestamp_ms >= ? AND timestamp_ms < ?
            GROUP BY day_index
            ORDER BY day_index
            "#,
        )
        .bind(offset_ms)
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;

        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date");
        let mut rollups = Vec::with_capacity(rows.len());
        for (day_index, total, pending) in rows {
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
        // SUM over zero rows is NULL; COALESCE keeps the tuple decodable
        // on an empty table.
        let (total, approved, pending, rejected) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT
                COUNT(*),
                CAST(COALESCE(SUM(CASE WHEN verified_status = 'approved' THEN 1 ELSE 0 END), 0) AS SIGNED),
                CAST(COALESCE(SUM(CASE WHEN verified_status = 'pending' THEN 1 ELSE 0 END), 0) AS SIGNED),
                CAST(COALESCE(SUM(CASE WHEN verified_status = 'rejected' THEN 1 ELSE 0 END), 0) AS SIGNED)
            FROM attendance
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(VerificationCounts {
            total,
            approved,
            pending,
            rejected,
        })
    }

    async fn all(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        let rows = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT id, nip, timestamp_ms, raw_status, photo, verified_status, verified_by \
             FROM attendance ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn restore(&self, rec: &AttendanceRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO attendance
                (id, nip, timestamp_ms, raw_status, photo, verified_status, verified_by)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(rec.id)
        .bind(&rec.nip)
        .bind(rec.timestamp_ms)
        .bind(&rec.raw_status)
        .bind(&rec.photo)
        .bind(&rec.verified_status)
        .bind(rec.verified_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for MySqlDatastore {
    async fn find_by_id(&self, id: u64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, name, email, password, role_id, nip, last_login_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, name, email, password, role_id, nip, last_login_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, name, email, password, role_id, nip)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.role_id)
        .bind(&user.nip)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, &user.username))?;
        Ok(result.last_insert_id())
    }

    async fn insert_with_id(&self, id: u64, user: NewUser) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, name, email, password, role_id, nip)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.role_id)
        .bind(&user.nip)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, &user.username))?;
        Ok(())
    }

    async fn touch_last_login(&self, id: u64) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO refresh_tokens (user_id, jti, expires_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(jti)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn refresh_token_active(&self, jti: &str) -> Result<bool, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let active = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM refresh_tokens \
             WHERE jti = ? AND revoked = 0 AND expires_at > ? LIMIT 1)",
        )
        .bind(jti)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(active)
    }

    async fn revoke_refresh_token(&self, jti: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
            .bind(jti)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, User>(
            "SELECT id, username, name, email, password, role_id, nip, last_login_at FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn restore(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, name, email, password, role_id, nip, last_login_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.role_id)
        .bind(&user.nip)
        .bind(user.last_login_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, &user.username))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Live-database checks: point DATABASE_URL at a disposable MySQL with
    // the schema loaded and run `cargo test -- --ignored`. A fresh schema
    // with an empty attendance table is the interesting case: the
    // aggregate tuples must decode even when every SUM is over zero rows.
    async fn connect() -> MySqlPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        MySqlPool::connect(&url)
            .await
            .expect("Failed to connect to database")
    }

    #[actix_web::test]
    #[ignore]
    async fn aggregate_queries_decode_without_rows() {
        let store = MySqlDatastore::new(connect().await);

        let counts = store.verification_counts().await.unwrap();
        assert!(counts.approved + counts.pending + counts.rejected <= counts.total);

        let usage = store.photo_usage(0).await.unwrap();
        assert!(usage.old_records <= usage.total_records);
        assert!(usage.old_chars <= usage.total_chars);
    }
}
