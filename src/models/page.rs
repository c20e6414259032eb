use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{PageKey, PageStatus, Scope};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Page {
    pub id: i64,
    pub version: String,
    pub locale_code: String,
    pub version_name: String,
    pub parent_version: Option<String>,
    pub title: String,
    pub slug: String,
    pub category_id: Option<i64>,
    pub status: PageStatus,
    pub scheduled_start_at: Option<DateTime<Utc>>,
    pub scheduled_end_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub edited_at: DateTime<Utc>,
}

impl Page {
    pub fn key(&self) -> PageKey {
        PageKey {
            id: self.id,
            version: self.version.clone(),
            locale: self.locale_code.clone(),
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::new(self.id, self.version.clone(), self.locale_code.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCreate {
    pub title: String,
    pub slug: String,
    pub category_id: Option<i64>,
    pub locale: String,
}
