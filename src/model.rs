//! Persisted records and well-known constants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TABLE_NAME_USER: &str = "user";

/// Role for regular users.
pub const ROLE_USER: &str = "role::user";
/// Role for administrators.
pub const ROLE_ADMIN: &str = "role::admin";

/// Header carrying the caller's user ID in bypass mode.
pub const X_USER_ID: &str = "x-user-id";
pub const X_REQUEST_ID: &str = "x-request-id";

/// A row of the `user` table.
///
/// `user_id`, `username` and `phone` each carry a unique index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserM {
    pub id: i64,
    #[sqlx(rename = "userID")]
    #[serde(rename = "userID")]
    pub user_id: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub nickname: String,
    pub email: String,
    pub phone: String,
    #[sqlx(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[sqlx(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}
