use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ActivityAction, ActivityLog, FieldDiff};

/// Column values of one activity log row.
#[derive(Debug, Clone)]
pub struct ActivityLogInsert<'a> {
    pub id: Uuid,
    pub creator: Option<&'a str>,
    pub action: ActivityAction,
    pub model_name: &'a str,
    pub model_keys: &'a str,
    pub model_label: &'a str,
    pub model_diffs: &'a [FieldDiff],
}

pub async fn insert_activity_log(
    pool: &PgPool,
    data: &ActivityLogInsert<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO page_builder_activity_logs (
            id,
            creator,
            action,
            model_name,
            model_keys,
            model_label,
            model_diffs
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(data.id)
    .bind(data.creator)
    .bind(data.action)
    .bind(data.model_name)
    .bind(data.model_keys)
    .bind(data.model_label)
    .bind(Json(data.model_diffs))
    .execute(pool)
    .await?;

    Ok(())
}

/// Activity recorded against one record, newest first.
pub async fn list_activity_logs(
    pool: &PgPool,
    model_name: &str,
    model_keys: &str,
) -> Result<Vec<ActivityLog>, sqlx::Error> {
    sqlx::query_as::<_, ActivityLog>(
        r#"
        SELECT *
        FROM page_builder_activity_logs
        WHERE model_name = $1 AND model_keys = $2
        ORDER BY created_at DESC
        "#,
    )
    .bind(model_name)
    .bind(model_keys)
    .fetch_all(pool)
    .await
}
