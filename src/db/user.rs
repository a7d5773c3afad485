//! `user` table lookups.

use std::sync::Arc;

use async_trait::async_trait;

use super::Database;
use crate::middleware::{BoxError, UserRetriever};
use crate::model::{UserM, TABLE_NAME_USER};

#[derive(Debug, thiserror::Error)]
#[error("record not found")]
pub struct RecordNotFound;

/// Reads users by `userID`.
#[derive(Clone)]
pub struct UserStore {
    db: Arc<Database>,
}

impl UserStore {
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<UserM>, sqlx::Error> {
        let sql = select_by_user_id();
        let query = sqlx::query_as::<_, UserM>(&sql).bind(user_id);
        self.db.fetch_optional(query).await
    }
}

fn select_by_user_id() -> String {
    format!(
        "SELECT id, userID, username, password, nickname, email, phone, createdAt, updatedAt \
         FROM `{TABLE_NAME_USER}` WHERE userID = ? LIMIT 1"
    )
}

#[async_trait]
impl UserRetriever for UserStore {
    async fn get_user(&self, user_id: &str) -> Result<UserM, BoxError> {
        self.get(user_id).await?.ok_or_else(|| RecordNotFound.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_selects_every_mapped_column() {
        let sql = select_by_user_id();
        assert!(sql.contains("FROM `user`"));
        for column in ["userID", "createdAt", "updatedAt", "phone"] {
            assert!(sql.contains(column), "{column}");
        }
        assert!(sql.ends_with("WHERE userID = ? LIMIT 1"));
    }
}
