use sqlx::{PgConnection, PgPool};

use crate::common::PageBuilderError;
use crate::db::containers::{insert_container, list_containers_in, ContainerInsert};
use crate::db::scope::{begin_fork, ensure_editable};
use crate::models::{Category, Container, DemoContainer, PageKey, RecordKey, Scope, SharedContainer};
use crate::services::ContainerRegistry;

/// Result of looking for a shared backing row already localized from a source row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvenanceLookup {
    Found(SharedContainer),
    NotFound,
}

/// Copies every container of `from` into `to`.
///
/// Non-shared containers get a duplicated backing row; shared ones keep
/// pointing at the same row. Display orders are carried over unchanged.
pub async fn copy_containers(
    pool: &PgPool,
    registry: &ContainerRegistry,
    from: &Scope,
    to: &Scope,
) -> Result<Vec<Container>, PageBuilderError> {
    if from == to {
        return Err(PageBuilderError::InvalidArgument(format!(
            "cannot copy {} onto itself",
            from
        )));
    }

    let mut tx = begin_fork(pool, &[from.clone(), to.clone()]).await?;
    ensure_editable(&mut tx, to).await?;

    let copied = copy_containers_in(&mut tx, registry, from, to).await?;

    tx.commit().await?;
    Ok(copied)
}

pub async fn copy_containers_to_new_version(
    pool: &PgPool,
    registry: &ContainerRegistry,
    page: &PageKey,
    new_version: &str,
) -> Result<Vec<Container>, PageBuilderError> {
    let to = Scope::new(page.id, new_version, page.locale.clone());
    copy_containers(pool, registry, &page.scope(), &to).await
}

pub(crate) async fn copy_containers_in(
    conn: &mut PgConnection,
    registry: &ContainerRegistry,
    from: &Scope,
    to: &Scope,
) -> Result<Vec<Container>, PageBuilderError> {
    let sources = list_containers_in(conn, from).await?;
    let mut copied = Vec::with_capacity(sources.len());

    for c in &sources {
        let model_id = if c.shared {
            c.model_id
        } else {
            registry
                .lookup(&c.model_name)?
                .duplicate(conn, c.model_id)
                .await?
        };

        let container = insert_container(
            conn,
            &ContainerInsert {
                id: None,
                scope: to,
                model_name: &c.model_name,
                model_id,
                display_order: c.display_order,
                shared: c.shared,
                hidden: c.is_hidden(),
                display_name: &c.display_name,
                localized_from_model_id: c.localized_from_model_id,
            },
        )
        .await?;

        copied.push(container);
    }

    log::debug!("Copied {} containers from {} to {}", copied.len(), from, to);
    Ok(copied)
}

/// Looks for the shared row of `model_name` already localized from
/// `source_model_id` into `locale`.
pub async fn find_localized_shared(
    conn: &mut PgConnection,
    model_name: &str,
    source_model_id: i64,
    locale: &str,
) -> Result<ProvenanceLookup, PageBuilderError> {
    let found = sqlx::query_as::<_, SharedContainer>(
        r#"
        SELECT model_name, model_id, display_name
        FROM page_builder_containers
        WHERE model_name = $1
          AND localized_from_model_id = $2
          AND locale_code = $3
          AND shared = TRUE
        ORDER BY id ASC
        LIMIT 1
        "#,
    )
    .bind(model_name)
    .bind(source_model_id)
    .bind(locale)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(match found {
        Some(shared) => ProvenanceLookup::Found(shared),
        None => ProvenanceLookup::NotFound,
    })
}

/// Forks the containers of `from` into the locale of `to`.
///
/// Containers keep their id under the target locale and remember the backing
/// row they were localized from, so running the fork again updates the same
/// rows and reuses shared rows instead of duplicating them.
pub async fn localize_containers(
    pool: &PgPool,
    registry: &ContainerRegistry,
    from: &Scope,
    to: &Scope,
) -> Result<Vec<Container>, PageBuilderError> {
    let mut tx = begin_fork(pool, &[from.clone(), to.clone()]).await?;
    ensure_editable(&mut tx, to).await?;

    let localized = localize_containers_in(&mut tx, registry, from, to).await?;

    tx.commit().await?;
    Ok(localized)
}

pub(crate) async fn localize_containers_in(
    conn: &mut PgConnection,
    registry: &ContainerRegistry,
    from: &Scope,
    to: &Scope,
) -> Result<Vec<Container>, PageBuilderError> {
    if from.locale == to.locale {
        return Err(PageBuilderError::InvalidArgument(format!(
            "cannot localize {} into its own locale",
            from
        )));
    }

    let sources = list_containers_in(conn, from).await?;
    make_room_for_sources(conn, to, &sources).await?;

    let mut localized = Vec::with_capacity(sources.len());

    for c in &sources {
        let (model_id, display_name) = if c.shared {
            match find_localized_shared(conn, &c.model_name, c.model_id, &to.locale).await? {
                ProvenanceLookup::Found(shared) => (shared.model_id, shared.display_name),
                ProvenanceLookup::NotFound => {
                    let id = registry
                        .lookup(&c.model_name)?
                        .duplicate(conn, c.model_id)
                        .await?;
                    (id, c.display_name.clone())
                }
            }
        } else {
            let id = registry
                .lookup(&c.model_name)?
                .duplicate(conn, c.model_id)
                .await?;
            (id, c.display_name.clone())
        };

        let container = sqlx::query_as::<_, Container>(
            r#"
            INSERT INTO page_builder_containers (
                id,
                locale_code,
                page_id,
                page_version,
                model_name,
                model_id,
                display_order,
                shared,
                hidden,
                display_name,
                localized_from_model_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id, locale_code) DO UPDATE
            SET
                page_id = EXCLUDED.page_id,
                page_version = EXCLUDED.page_version,
                model_name = EXCLUDED.model_name,
                model_id = EXCLUDED.model_id,
                display_order = EXCLUDED.display_order,
                shared = EXCLUDED.shared,
                hidden = EXCLUDED.hidden,
                display_name = EXCLUDED.display_name,
                localized_from_model_id = EXCLUDED.localized_from_model_id,
                edited_at = now()
            RETURNING *
            "#,
        )
        .bind(c.id)
        .bind(&to.locale)
        .bind(to.page_id)
        .bind(&to.page_version)
        .bind(&c.model_name)
        .bind(model_id)
        .bind(c.display_order)
        .bind(c.shared)
        .bind(c.is_hidden())
        .bind(&display_name)
        .bind(c.model_id)
        .fetch_one(&mut *conn)
        .await?;

        localized.push(container);
    }

    log::debug!("Localized {} containers from {} to {}", localized.len(), from, to);
    Ok(localized)
}

/// Moves containers that exist only in `to` behind the orders the sources
/// will take, keeping their relative order.
async fn make_room_for_sources(
    conn: &mut PgConnection,
    to: &Scope,
    sources: &[Container],
) -> Result<(), PageBuilderError> {
    let source_ids: Vec<i64> = sources.iter().map(|c| c.id).collect();
    let last = sources
        .iter()
        .map(|c| c.display_order)
        .fold(0.0_f64, f64::max);

    let moved = sqlx::query(
        r#"
        WITH target_only AS (
            SELECT
                id,
                ROW_NUMBER() OVER (ORDER BY display_order ASC, id ASC) AS rank
            FROM page_builder_containers
            WHERE page_id = $1
              AND page_version = $2
              AND locale_code = $3
              AND NOT (id = ANY($4))
        )
        UPDATE page_builder_containers c
        SET
            display_order = $5 + target_only.rank,
            edited_at = now()
        FROM target_only
        WHERE c.id = target_only.id AND c.locale_code = $3
        "#,
    )
    .bind(to.page_id)
    .bind(&to.page_version)
    .bind(&to.locale)
    .bind(&source_ids)
    .bind(last)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if moved > 0 {
        log::debug!("Moved {} containers of {} behind the localized ones", moved, to);
    }
    Ok(())
}

/// Makes category `category_id` available in `to_locale`.
///
/// Nothing happens when there is no category, when the source row is
/// missing, or when the target locale already has it.
pub async fn localize_category(
    pool: &PgPool,
    category_id: Option<i64>,
    from_locale: &str,
    to_locale: &str,
) -> Result<Option<Category>, PageBuilderError> {
    let mut tx = pool.begin().await?;
    let category = localize_category_in(&mut tx, category_id, from_locale, to_locale).await?;
    tx.commit().await?;
    Ok(category)
}

pub(crate) async fn localize_category_in(
    conn: &mut PgConnection,
    category_id: Option<i64>,
    from_locale: &str,
    to_locale: &str,
) -> Result<Option<Category>, PageBuilderError> {
    let Some(category_id) = category_id else {
        return Ok(None);
    };

    let existing = sqlx::query_as::<_, Category>(
        r#"
        SELECT *
        FROM page_builder_categories
        WHERE id = $1 AND locale_code = $2
        "#,
    )
    .bind(category_id)
    .bind(to_locale)
    .fetch_optional(&mut *conn)
    .await?;

    if existing.is_some() {
        return Ok(existing);
    }

    let created = sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO page_builder_categories (id, locale_code, name, path, description)
        SELECT id, $3, name, path, description
        FROM page_builder_categories
        WHERE id = $1 AND locale_code = $2
        ON CONFLICT (id, locale_code) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(category_id)
    .bind(from_locale)
    .bind(to_locale)
    .fetch_optional(&mut *conn)
    .await?;

    if created.is_none() {
        log::debug!(
            "Category {} has no {:?} row to localize from",
            category_id,
            from_locale
        );
    }

    Ok(created)
}

/// Copies a demo container and its backing row into `to_locale`.
/// An existing demo for the same type in that locale is returned as is.
pub async fn localize_demo_container(
    pool: &PgPool,
    registry: &ContainerRegistry,
    key: &RecordKey,
    to_locale: &str,
) -> Result<DemoContainer, PageBuilderError> {
    let mut tx = pool.begin().await?;

    let source = sqlx::query_as::<_, DemoContainer>(
        r#"
        SELECT *
        FROM page_builder_demo_containers
        WHERE id = $1 AND locale_code = $2
        "#,
    )
    .bind(key.id)
    .bind(&key.locale)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| {
        PageBuilderError::not_found(format!("demo container {} ({:?})", key.id, key.locale))
    })?;

    let existing = sqlx::query_as::<_, DemoContainer>(
        r#"
        SELECT *
        FROM page_builder_demo_containers
        WHERE model_name = $1 AND locale_code = $2
        "#,
    )
    .bind(&source.model_name)
    .bind(to_locale)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(existing) = existing {
        return Ok(existing);
    }

    let model_id = registry
        .lookup(&source.model_name)?
        .duplicate(&mut tx, source.model_id)
        .await?;

    let demo = sqlx::query_as::<_, DemoContainer>(
        r#"
        INSERT INTO page_builder_demo_containers (id, locale_code, model_name, model_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(source.id)
    .bind(to_locale)
    .bind(&source.model_name)
    .bind(model_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(demo)
}
