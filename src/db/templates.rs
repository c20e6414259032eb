use sqlx::PgPool;

use crate::common::PageBuilderError;
use crate::models::{RecordKey, Template, TemplateCreate};

pub async fn create_template(
    pool: &PgPool,
    data: &TemplateCreate,
) -> Result<Template, PageBuilderError> {
    if data.name.trim().is_empty() {
        return Err(PageBuilderError::InvalidArgument(
            "template name is empty".into(),
        ));
    }

    let template = sqlx::query_as::<_, Template>(
        r#"
        INSERT INTO page_builder_templates (locale_code, name, description)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(&data.locale)
    .bind(data.name.trim())
    .bind(&data.description)
    .fetch_one(pool)
    .await?;

    Ok(template)
}

pub async fn get_template(
    pool: &PgPool,
    key: &RecordKey,
) -> Result<Template, PageBuilderError> {
    sqlx::query_as::<_, Template>(
        r#"
        SELECT *
        FROM page_builder_templates
        WHERE id = $1 AND locale_code = $2
        "#,
    )
    .bind(key.id)
    .bind(&key.locale)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| PageBuilderError::not_found(format!("template {} ({:?})", key.id, key.locale)))
}
