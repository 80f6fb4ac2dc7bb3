use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Raw attendance classifications derived at submission time.
pub const RAW_PRESENT: &str = "present";
pub const RAW_PRESENT_LATE: &str = "present-late";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 42,
        "nip": "198701012010011001",
        "timestamp_ms": 1735693200000u64,
        "raw_status": "present",
        "photo": null,
        "verified_status": "pending",
        "verified_by": null
    })
)]
pub struct AttendanceRecord {
    #[schema(example = 42)]
    pub id: u64,

    /// Employee business key; may dangle if the employee is later removed.
    #[schema(example = "198701012010011001")]
    pub nip: String,

    /// Capture time in epoch milliseconds, the authoritative ordering key.
    #[schema(example = 1735693200000u64)]
    pub timestamp_ms: i64,

    #[schema(example = "present")]
    pub raw_status: String,

    /// Base64 data-URI; nulled by retention cleanup, the row itself survives.
    #[schema(nullable = true)]
    pub photo: Option<String>,

    #[schema(example = "pending")]
    pub verified_status: String,

    #[schema(example = 7, nullable = true)]
    pub verified_by: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub nip: String,
    pub timestamp_ms: i64,
    pub raw_status: String,
    pub photo: Option<String>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString, Serialize, Deserialize, ToSchema)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VerifiedStatus {
    Pending,
    Approved,
    Rejected,
}

/// Classify a capture instant against the on-time cutoff (a local
/// time-of-day). The offset shifts the UTC epoch into local wall time.
pub fn classify_raw_status(
    timestamp_ms: i64,
    tz_offset_minutes: i32,
    ontime_cutoff: NaiveTime,
) -> &'static str {
    let local_secs =
        (timestamp_ms / 1000 + i64::from(tz_offset_minutes) * 60).rem_euclid(86_400);
    let time_of_day = NaiveTime::from_num_seconds_from_midnight_opt(local_secs as u32, 0)
        .unwrap_or(NaiveTime::MIN);
    if time_of_day <= ontime_cutoff {
        RAW_PRESENT
    } else {
        RAW_PRESENT_LATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    const WIB_MINUTES: i32 = 7 * 60;

    fn cutoff() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 0, 0).unwrap()
    }

    fn ts(h: u32, m: u32) -> i64 {
        // 2025-01-06 local (UTC+7), expressed as UTC epoch millis.
        let local = NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap();
        local.and_utc().timestamp_millis() - i64::from(WIB_MINUTES) * 60_000
    }

    #[test]
    fn on_time_at_exact_cutoff() {
        assert_eq!(classify_raw_status(ts(8, 0), WIB_MINUTES, cutoff()), RAW_PRESENT);
    }

    #[test]
    fn late_after_cutoff() {
        assert_eq!(
            classify_raw_status(ts(8, 15), WIB_MINUTES, cutoff()),
            RAW_PRESENT_LATE
        );
    }

    #[test]
    fn early_morning_is_present() {
        assert_eq!(classify_raw_status(ts(6, 45), WIB_MINUTES, cutoff()), RAW_PRESENT);
    }

    #[test]
    fn status_strings_round_trip() {
        assert_eq!(VerifiedStatus::Pending.to_string(), "pending");
        assert_eq!("rejected".parse::<VerifiedStatus>().ok(), Some(VerifiedStatus::Rejected));
    }
}
