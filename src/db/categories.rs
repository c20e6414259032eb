use sqlx::PgPool;

use crate::common::PageBuilderError;
use crate::models::{Category, CategoryCreate, RecordKey};

pub async fn create_category(
    pool: &PgPool,
    data: &CategoryCreate,
) -> Result<Category, PageBuilderError> {
    if data.name.trim().is_empty() {
        return Err(PageBuilderError::InvalidArgument(
            "category name is empty".into(),
        ));
    }

    let category = sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO page_builder_categories (locale_code, name, path, description)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&data.locale)
    .bind(data.name.trim())
    .bind(data.path.trim())
    .bind(&data.description)
    .fetch_one(pool)
    .await?;

    Ok(category)
}

pub async fn get_category(
    pool: &PgPool,
    key: &RecordKey,
) -> Result<Category, PageBuilderError> {
    sqlx::query_as::<_, Category>(
        r#"
        SELECT *
        FROM page_builder_categories
        WHERE id = $1 AND locale_code = $2
        "#,
    )
    .bind(key.id)
    .bind(&key.locale)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| PageBuilderError::not_found(format!("category {} ({:?})", key.id, key.locale)))
}
