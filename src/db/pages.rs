use chrono::{NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};

use crate::common::PageBuilderError;
use crate::db::fork::{copy_containers_in, localize_category_in, localize_containers_in};
use crate::db::scope::{begin_fork, ensure_editable, lock_page_versions, lock_scope};
use crate::models::{check_version_token, Page, PageCreate, PageKey, PageStatus, RecordKey, Scope};
use crate::services::ContainerRegistry;

/// Version token for the `seq`-th version created on `date`: `YYYY-MM-DD-vNN`.
pub fn version_token(date: NaiveDate, seq: u32) -> String {
    format!("{}-v{:02}", date.format("%Y-%m-%d"), seq)
}

/// Next free version token of page `page_id` for `date`.
pub async fn next_version_token(
    conn: &mut PgConnection,
    page_id: i64,
    date: NaiveDate,
) -> Result<String, PageBuilderError> {
    let prefix = format!("{}-v", date.format("%Y-%m-%d"));

    let versions = sqlx::query_scalar::<_, String>(
        r#"
        SELECT DISTINCT version
        FROM page_builder_pages
        WHERE id = $1 AND starts_with(version, $2)
        "#,
    )
    .bind(page_id)
    .bind(&prefix)
    .fetch_all(&mut *conn)
    .await?;

    let last = versions
        .iter()
        .filter_map(|v| v.strip_prefix(&prefix))
        .filter_map(|seq| seq.parse::<u32>().ok())
        .max()
        .unwrap_or(0);

    Ok(version_token(date, last.saturating_add(1)))
}

pub async fn create_page(
    pool: &PgPool,
    data: &PageCreate,
) -> Result<Page, PageBuilderError> {
    let title = data.title.trim();
    if title.is_empty() {
        return Err(PageBuilderError::InvalidArgument("page title is empty".into()));
    }

    let mut tx = pool.begin().await?;

    let id = sqlx::query_scalar::<_, i64>("SELECT nextval('page_builder_pages_id_seq')")
        .fetch_one(&mut *tx)
        .await?;

    let page = insert_page(&mut tx, id, &version_token(Utc::now().date_naive(), 1), data).await?;

    tx.commit().await?;
    Ok(page)
}

async fn insert_page(
    conn: &mut PgConnection,
    id: i64,
    version: &str,
    data: &PageCreate,
) -> Result<Page, PageBuilderError> {
    let page = sqlx::query_as::<_, Page>(
        r#"
        INSERT INTO page_builder_pages (id, version, locale_code, title, slug, category_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(version)
    .bind(&data.locale)
    .bind(data.title.trim())
    .bind(data.slug.trim())
    .bind(data.category_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(page)
}

pub async fn get_page(
    pool: &PgPool,
    key: &PageKey,
) -> Result<Page, PageBuilderError> {
    let mut conn = pool.acquire().await?;
    fetch_page(&mut conn, key).await
}

async fn fetch_page(
    conn: &mut PgConnection,
    key: &PageKey,
) -> Result<Page, PageBuilderError> {
    sqlx::query_as::<_, Page>(
        r#"
        SELECT *
        FROM page_builder_pages
        WHERE id = $1 AND version = $2 AND locale_code = $3
        "#,
    )
    .bind(key.id)
    .bind(&key.version)
    .bind(&key.locale)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| PageBuilderError::not_found(key.scope()))
}

/// Every version of a page in one locale, newest first.
pub async fn list_page_versions(
    pool: &PgPool,
    page_id: i64,
    locale: &str,
) -> Result<Vec<Page>, PageBuilderError> {
    let pages = sqlx::query_as::<_, Page>(
        r#"
        SELECT *
        FROM page_builder_pages
        WHERE id = $1 AND locale_code = $2
        ORDER BY created_at DESC, version DESC
        "#,
    )
    .bind(page_id)
    .bind(locale)
    .fetch_all(pool)
    .await?;

    Ok(pages)
}

/// The most recently created draft of a page, if any.
pub async fn current_draft(
    pool: &PgPool,
    page_id: i64,
    locale: &str,
) -> Result<Option<Page>, PageBuilderError> {
    let page = sqlx::query_as::<_, Page>(
        r#"
        SELECT *
        FROM page_builder_pages
        WHERE id = $1 AND locale_code = $2 AND status = 'draft'
        ORDER BY created_at DESC, version DESC
        LIMIT 1
        "#,
    )
    .bind(page_id)
    .bind(locale)
    .fetch_optional(pool)
    .await?;

    Ok(page)
}

pub async fn rename_version(
    pool: &PgPool,
    key: &PageKey,
    version_name: &str,
) -> Result<Page, PageBuilderError> {
    sqlx::query_as::<_, Page>(
        r#"
        UPDATE page_builder_pages
        SET
            version_name = $1,
            edited_at = now()
        WHERE id = $2 AND version = $3 AND locale_code = $4
        RETURNING *
        "#,
    )
    .bind(version_name.trim())
    .bind(key.id)
    .bind(&key.version)
    .bind(&key.locale)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| PageBuilderError::not_found(key.scope()))
}

pub async fn set_page_status(
    pool: &PgPool,
    key: &PageKey,
    status: PageStatus,
) -> Result<Page, PageBuilderError> {
    sqlx::query_as::<_, Page>(
        r#"
        UPDATE page_builder_pages
        SET
            status = $1,
            edited_at = now()
        WHERE id = $2 AND version = $3 AND locale_code = $4
        RETURNING *
        "#,
    )
    .bind(status)
    .bind(key.id)
    .bind(&key.version)
    .bind(&key.locale)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| PageBuilderError::not_found(key.scope()))
}

/// Branches a new draft version off `key` and copies its containers into it.
///
/// The new row points back at its source through `parent_version`.
pub async fn save_new_version(
    pool: &PgPool,
    registry: &ContainerRegistry,
    key: &PageKey,
    version_name: Option<&str>,
) -> Result<Page, PageBuilderError> {
    // Locks come before the first read so a queued caller sees committed versions.
    let mut tx = pool.begin().await?;
    lock_page_versions(&mut tx, key.id).await?;
    lock_scope(&mut tx, &key.scope()).await?;

    let source = fetch_page(&mut tx, key).await?;
    let version = next_version_token(&mut tx, key.id, Utc::now().date_naive()).await?;
    check_version_token(&version)?;

    let page = sqlx::query_as::<_, Page>(
        r#"
        INSERT INTO page_builder_pages (
            id,
            version,
            locale_code,
            version_name,
            parent_version,
            title,
            slug,
            category_id,
            status,
            scheduled_start_at,
            scheduled_end_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'draft', $9, $10)
        RETURNING *
        "#,
    )
    .bind(source.id)
    .bind(&version)
    .bind(&source.locale_code)
    .bind(version_name.map(str::trim).unwrap_or_default())
    .bind(&source.version)
    .bind(&source.title)
    .bind(&source.slug)
    .bind(source.category_id)
    .bind(source.scheduled_start_at)
    .bind(source.scheduled_end_at)
    .fetch_one(&mut *tx)
    .await?;

    let to = page.scope();
    lock_scope(&mut tx, &to).await?;
    copy_containers_in(&mut tx, registry, &source.scope(), &to).await?;

    tx.commit().await?;

    log::info!("Saved {} as new version {}", source.scope(), page.version);
    Ok(page)
}

/// Forks one page version into `to_locale`: the page row, its category and
/// its containers. Running it again refreshes the same rows.
pub async fn localize_page(
    pool: &PgPool,
    registry: &ContainerRegistry,
    key: &PageKey,
    to_locale: &str,
) -> Result<Page, PageBuilderError> {
    if key.locale == to_locale {
        return Err(PageBuilderError::InvalidArgument(format!(
            "page {} version {} is already in locale {:?}",
            key.id, key.version, to_locale
        )));
    }

    let to = Scope::new(key.id, key.version.clone(), to_locale);
    let mut tx = begin_fork(pool, &[key.scope(), to.clone()]).await?;

    let source = fetch_page(&mut tx, key).await?;

    sqlx::query(
        r#"
        INSERT INTO page_builder_pages (
            id,
            version,
            locale_code,
            version_name,
            parent_version,
            title,
            slug,
            category_id,
            status,
            scheduled_start_at,
            scheduled_end_at
        )
        SELECT
            id,
            version,
            $4,
            version_name,
            parent_version,
            title,
            slug,
            category_id,
            'draft',
            scheduled_start_at,
            scheduled_end_at
        FROM page_builder_pages
        WHERE id = $1 AND version = $2 AND locale_code = $3
        ON CONFLICT (id, version, locale_code) DO NOTHING
        "#,
    )
    .bind(key.id)
    .bind(&key.version)
    .bind(&key.locale)
    .bind(to_locale)
    .execute(&mut *tx)
    .await?;

    ensure_editable(&mut tx, &to).await?;

    localize_category_in(&mut tx, source.category_id, &key.locale, to_locale).await?;
    localize_containers_in(&mut tx, registry, &source.scope(), &to).await?;

    let page = fetch_page(
        &mut tx,
        &PageKey {
            id: key.id,
            version: key.version.clone(),
            locale: to_locale.to_string(),
        },
    )
    .await?;

    tx.commit().await?;

    log::info!("Localized {} into {:?}", source.scope(), to_locale);
    Ok(page)
}

/// Creates a page and fills its first version with copies of the template's containers.
pub async fn create_page_from_template(
    pool: &PgPool,
    registry: &ContainerRegistry,
    data: &PageCreate,
    template: &RecordKey,
) -> Result<Page, PageBuilderError> {
    let title = data.title.trim();
    if title.is_empty() {
        return Err(PageBuilderError::InvalidArgument("page title is empty".into()));
    }

    let template_scope = Scope::template(template.id, template.locale.clone());
    let mut tx = begin_fork(pool, std::slice::from_ref(&template_scope)).await?;

    ensure_editable(&mut tx, &template_scope).await?;

    let id = sqlx::query_scalar::<_, i64>("SELECT nextval('page_builder_pages_id_seq')")
        .fetch_one(&mut *tx)
        .await?;

    let page = insert_page(&mut tx, id, &version_token(Utc::now().date_naive(), 1), data).await?;

    let to = page.scope();
    lock_scope(&mut tx, &to).await?;
    copy_containers_in(&mut tx, registry, &template_scope, &to).await?;

    tx.commit().await?;
    Ok(page)
}

