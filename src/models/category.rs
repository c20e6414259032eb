use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::RecordKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub locale_code: String,
    pub name: String,
    pub path: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: DateTime<Utc>,
}

impl Category {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.id, self.locale_code.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCreate {
    pub name: String,
    pub path: String,
    pub description: String,
    pub locale: String,
}
