use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::RecordKey;

/// Preconfigured backing row that seeds new containers of one content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DemoContainer {
    pub id: i64,
    pub locale_code: String,
    pub model_name: String,
    pub model_id: i64,
    pub created_at: DateTime<Utc>,
    pub edited_at: DateTime<Utc>,
}

impl DemoContainer {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.id, self.locale_code.clone())
    }
}
