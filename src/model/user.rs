use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Login account doubling as verifier identity for the verification
/// workflow.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role_id: u8,
    pub nip: Option<String>,
    /// Stamped on each successful login; `None` for accounts that never
    /// logged in, including provisioned placeholder verifiers.
    pub last_login_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role_id: u8,
    pub nip: Option<String>,
}
