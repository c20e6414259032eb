use sqlx::PgPool;

use crate::common::PageBuilderError;
use crate::models::DemoContainer;
use crate::services::ContainerRegistry;

/// Points the demo of `model_name` in `locale` at backing row `model_id`.
///
/// There is at most one demo per content type and locale; an existing one is
/// repointed rather than duplicated.
pub async fn set_demo_container(
    pool: &PgPool,
    registry: &ContainerRegistry,
    model_name: &str,
    model_id: i64,
    locale: &str,
) -> Result<DemoContainer, PageBuilderError> {
    registry.lookup(model_name)?;

    let demo = sqlx::query_as::<_, DemoContainer>(
        r#"
        INSERT INTO page_builder_demo_containers (locale_code, model_name, model_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (model_name, locale_code) DO UPDATE
        SET
            model_id = EXCLUDED.model_id,
            edited_at = now()
        RETURNING *
        "#,
    )
    .bind(locale)
    .bind(model_name)
    .bind(model_id)
    .fetch_one(pool)
    .await?;

    Ok(demo)
}

pub async fn get_demo_container(
    pool: &PgPool,
    model_name: &str,
    locale: &str,
) -> Result<Option<DemoContainer>, PageBuilderError> {
    let demo = sqlx::query_as::<_, DemoContainer>(
        r#"
        SELECT *
        FROM page_builder_demo_containers
        WHERE model_name = $1 AND locale_code = $2
        "#,
    )
    .bind(model_name)
    .bind(locale)
    .fetch_optional(pool)
    .await?;

    Ok(demo)
}
