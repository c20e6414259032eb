use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{RecordKey, Scope};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Template {
    pub id: i64,
    pub locale_code: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: DateTime<Utc>,
}

impl Template {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.id, self.locale_code.clone())
    }

    /// Containers of a template live under the reserved template version.
    pub fn scope(&self) -> Scope {
        Scope::template(self.id, self.locale_code.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateCreate {
    pub name: String,
    pub description: String,
    pub locale: String,
}
