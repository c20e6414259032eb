use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{insert_activity_log, ActivityLogInsert};
use crate::models::{ActivityAction, FieldDiff};

// Bookkeeping columns that change on every write.
const IGNORED_FIELDS: [&str; 2] = ["created_at", "edited_at"];

/// Who did what to which record.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub creator: Option<String>,
    pub action: ActivityAction,
    pub model_name: String,
    pub model_keys: String,
    pub model_label: String,
    pub diffs: Vec<FieldDiff>,
}

impl ActivityEntry {
    pub fn new(
        action: ActivityAction,
        model_name: impl Into<String>,
        model_keys: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            creator: None,
            action,
            model_name: model_name.into(),
            model_keys: model_keys.into(),
            model_label: String::new(),
            diffs: Vec::new(),
        }
    }

    pub fn creator(mut self, creator: Option<String>) -> Self {
        self.creator = creator;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.model_label = label.into();
        self
    }

    pub fn diffs(mut self, diffs: Vec<FieldDiff>) -> Self {
        self.diffs = diffs;
        self
    }
}

/// Receives activity entries. Recording never fails the caller.
pub trait ActivitySink: Send + Sync {
    fn record(&self, entry: ActivityEntry);
}

/// Writes entries to the process log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogActivity;

impl ActivitySink for LogActivity {
    fn record(&self, entry: ActivityEntry) {
        log::info!(
            "{} {} {} by {} ({} changed fields)",
            entry.action,
            entry.model_name,
            entry.model_keys,
            entry.creator.as_deref().unwrap_or("anonymous"),
            entry.diffs.len()
        );
    }
}

/// Persists entries to `page_builder_activity_logs` from a background task.
#[derive(Debug, Clone)]
pub struct PgActivityLog {
    pool: PgPool,
}

impl PgActivityLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ActivitySink for PgActivityLog {
    fn record(&self, entry: ActivityEntry) {
        let pool = self.pool.clone();

        tokio::spawn(async move {
            let result = insert_activity_log(
                &pool,
                &ActivityLogInsert {
                    id: entry.id,
                    creator: entry.creator.as_deref(),
                    action: entry.action,
                    model_name: &entry.model_name,
                    model_keys: &entry.model_keys,
                    model_label: &entry.model_label,
                    model_diffs: &entry.diffs,
                },
            )
            .await;

            if let Err(e) = result {
                log::warn!(
                    "Failed to record {} activity on {} {}: {}",
                    entry.action,
                    entry.model_name,
                    entry.model_keys,
                    e
                );
            }
        });
    }
}

/// Field-level changes between two JSON objects.
///
/// Fields present on only one side are reported against `null`. Non-object
/// inputs yield no diffs.
pub fn diff(old: &Value, new: &Value) -> Vec<FieldDiff> {
    let (Some(old), Some(new)) = (old.as_object(), new.as_object()) else {
        return Vec::new();
    };

    let mut diffs: Vec<FieldDiff> = old
        .iter()
        .filter(|(field, _)| !IGNORED_FIELDS.contains(&field.as_str()))
        .filter_map(|(field, old_value)| {
            let new_value = new.get(field).unwrap_or(&Value::Null);
            (old_value != new_value).then(|| FieldDiff {
                field: field.clone(),
                old: old_value.clone(),
                new: new_value.clone(),
            })
        })
        .collect();

    diffs.extend(
        new.iter()
            .filter(|(field, _)| !IGNORED_FIELDS.contains(&field.as_str()))
            .filter(|(field, value)| !old.contains_key(*field) && !value.is_null())
            .map(|(field, value)| FieldDiff {
                field: field.clone(),
                old: Value::Null,
                new: value.clone(),
            }),
    );

    diffs
}
