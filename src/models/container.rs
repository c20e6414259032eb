use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{RecordKey, Scope};

/// A placed instance of a content type inside one page scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Container {
    pub id: i64,
    pub locale_code: String,
    pub page_id: i64,
    pub page_version: String,
    pub model_name: String,
    pub model_id: i64,
    pub display_order: f64,
    pub shared: bool,
    pub hidden: Option<bool>,
    pub display_name: String,
    pub localized_from_model_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub edited_at: DateTime<Utc>,
}

impl Container {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.id, self.locale_code.clone())
    }

    pub fn scope(&self) -> Scope {
        Scope::new(
            self.page_id,
            self.page_version.clone(),
            self.locale_code.clone(),
        )
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

impl std::str::FromStr for MoveDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            _ => Err(format!("invalid move direction: {}", s)),
        }
    }
}

/// One entry of a drag-and-drop result. Its own locale scopes its update.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReorderItem {
    pub container_id: i64,
    pub locale: String,
}

/// A shared backing row as offered by the "attach shared container" picker.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SharedContainer {
    pub model_name: String,
    pub model_id: i64,
    pub display_name: String,
}
