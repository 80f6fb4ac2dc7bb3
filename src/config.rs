use chrono::NaiveTime;
use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Local-time offset for day bucketing; defaults to WIB (UTC+7).
    pub tz_offset_minutes: i32,
    /// Submissions at or before this local time count as on time.
    pub ontime_cutoff: NaiveTime,
    /// Upper bound on a photo data URI's character count.
    pub max_photo_chars: usize,

    pub cleanup_interval_hours: u64,
    /// Start the cleanup automation at boot instead of waiting for an
    /// operator to turn it on.
    pub cleanup_autostart: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            access_token_ttl: env::var("ACCESS_TOKEN_TTL")
                .unwrap_or_else(|_| "900".to_string()) // default 15 min
                .parse()
                .expect("ACCESS_TOKEN_TTL must be a number of seconds"),
            refresh_token_ttl: env::var("REFRESH_TOKEN_TTL")
                .unwrap_or_else(|_| "604800".to_string()) // default 7 days
                .parse()
                .expect("REFRESH_TOKEN_TTL must be a number of seconds"),

            rate_login_per_min: env::var("RATE_LOGIN_PER_MIN")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .expect("RATE_LOGIN_PER_MIN must be a number"),
            rate_register_per_min: env::var("RATE_REGISTER_PER_MIN")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("RATE_REGISTER_PER_MIN must be a number"),
            rate_refresh_per_min: env::var("RATE_REFRESH_PER_MIN")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("RATE_REFRESH_PER_MIN must be a number"),
            rate_protected_per_min: env::var("RATE_PROTECTED_PER_MIN")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .expect("RATE_PROTECTED_PER_MIN must be a number"),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            tz_offset_minutes: env::var("TZ_OFFSET_MINUTES")
                .unwrap_or_else(|_| "420".to_string()) // WIB
                .parse()
                .expect("TZ_OFFSET_MINUTES must be a number of minutes"),
            ontime_cutoff: env::var("ONTIME_CUTOFF")
                .unwrap_or_else(|_| "08:00".to_string())
                .parse()
                .expect("ONTIME_CUTOFF must be HH:MM"),
            max_photo_chars: env::var("MAX_PHOTO_CHARS")
                .unwrap_or_else(|_| "2000000".to_string())
                .parse()
                .expect("MAX_PHOTO_CHARS must be a number"),

            cleanup_interval_hours: env::var("CLEANUP_INTERVAL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("CLEANUP_INTERVAL_HOURS must be a number of hours"),
            cleanup_autostart: env::var("CLEANUP_AUTOSTART")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .expect("CLEANUP_AUTOSTART must be true or false"),
        }
    }
}
