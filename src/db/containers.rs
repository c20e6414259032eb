use sqlx::{PgConnection, PgPool};

use crate::common::PageBuilderError;
use crate::db::scope::{ensure_editable, lock_scope, lock_scopes};
use crate::models::{
    Container, MoveDirection, RecordKey, ReorderItem, Scope, SharedContainer,
};
use crate::services::{ContainerBuilder, ContainerRegistry};

/// Column values of a container row about to be written.
pub(crate) struct ContainerInsert<'a> {
    pub id: Option<i64>,
    pub scope: &'a Scope,
    pub model_name: &'a str,
    pub model_id: i64,
    pub display_order: f64,
    pub shared: bool,
    pub hidden: bool,
    pub display_name: &'a str,
    pub localized_from_model_id: Option<i64>,
}

pub async fn list_containers(
    pool: &PgPool,
    scope: &Scope,
) -> Result<Vec<Container>, PageBuilderError> {
    let mut conn = pool.acquire().await?;
    list_containers_in(&mut conn, scope).await
}

pub(crate) async fn list_containers_in(
    conn: &mut PgConnection,
    scope: &Scope,
) -> Result<Vec<Container>, PageBuilderError> {
    let containers = sqlx::query_as::<_, Container>(
        r#"
        SELECT *
        FROM page_builder_containers
        WHERE page_id = $1 AND page_version = $2 AND locale_code = $3
        ORDER BY display_order ASC, id ASC
        "#,
    )
    .bind(scope.page_id)
    .bind(&scope.page_version)
    .bind(&scope.locale)
    .fetch_all(&mut *conn)
    .await?;

    Ok(containers)
}

pub async fn get_container(
    pool: &PgPool,
    key: &RecordKey,
) -> Result<Container, PageBuilderError> {
    let mut conn = pool.acquire().await?;
    fetch_container(&mut conn, key).await
}

async fn fetch_container(
    conn: &mut PgConnection,
    key: &RecordKey,
) -> Result<Container, PageBuilderError> {
    sqlx::query_as::<_, Container>(
        r#"
        SELECT *
        FROM page_builder_containers
        WHERE id = $1 AND locale_code = $2
        "#,
    )
    .bind(key.id)
    .bind(&key.locale)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| container_not_found(key))
}

/// Reads a container, locks its scope, then re-reads it under the lock.
async fn lock_container(
    conn: &mut PgConnection,
    key: &RecordKey,
) -> Result<Container, PageBuilderError> {
    let container = fetch_container(conn, key).await?;
    lock_scope(conn, &container.scope()).await?;
    fetch_container(conn, key).await
}

/// Adds a new container of `model_name` to the scope, placed after
/// container `after` or at the end.
///
/// The backing row is seeded from the demo container of the same type and
/// locale when one exists, and starts blank otherwise.
pub async fn add_container(
    pool: &PgPool,
    registry: &ContainerRegistry,
    scope: &Scope,
    model_name: &str,
    after: Option<i64>,
) -> Result<Container, PageBuilderError> {
    let builder = registry.lookup(model_name)?;

    let mut tx = pool.begin().await?;
    lock_scope(&mut tx, scope).await?;
    ensure_editable(&mut tx, scope).await?;

    let model_id = seed_model_row(&mut tx, builder, &scope.locale).await?;
    let display_order = claim_display_order(&mut tx, scope, after).await?;

    let container = insert_container(
        &mut tx,
        &ContainerInsert {
            id: None,
            scope,
            model_name,
            model_id,
            display_order,
            shared: false,
            hidden: false,
            display_name: model_name,
            localized_from_model_id: None,
        },
    )
    .await?;

    tx.commit().await?;
    Ok(container)
}

/// Places an existing shared backing row on the scope. No backing row is created.
pub async fn add_shared_container(
    pool: &PgPool,
    registry: &ContainerRegistry,
    scope: &Scope,
    model_name: &str,
    model_id: i64,
    after: Option<i64>,
) -> Result<Container, PageBuilderError> {
    registry.lookup(model_name)?;

    let mut tx = pool.begin().await?;
    lock_scope(&mut tx, scope).await?;
    ensure_editable(&mut tx, scope).await?;

    let display_name = sqlx::query_scalar::<_, String>(
        r#"
        SELECT display_name
        FROM page_builder_containers
        WHERE model_name = $1 AND model_id = $2 AND shared = TRUE
        ORDER BY edited_at DESC
        LIMIT 1
        "#,
    )
    .bind(model_name)
    .bind(model_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| {
        PageBuilderError::not_found(format!("shared {} row {}", model_name, model_id))
    })?;

    let display_order = claim_display_order(&mut tx, scope, after).await?;

    let container = insert_container(
        &mut tx,
        &ContainerInsert {
            id: None,
            scope,
            model_name,
            model_id,
            display_order,
            shared: true,
            hidden: false,
            display_name: &display_name,
            localized_from_model_id: None,
        },
    )
    .await?;

    tx.commit().await?;
    Ok(container)
}

async fn seed_model_row(
    conn: &mut PgConnection,
    builder: &ContainerBuilder,
    locale: &str,
) -> Result<i64, PageBuilderError> {
    let demo_model_id = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT model_id
        FROM page_builder_demo_containers
        WHERE model_name = $1 AND locale_code = $2 AND model_id <> 0
        "#,
    )
    .bind(builder.name())
    .bind(locale)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(demo_model_id) = demo_model_id {
        // A demo pointing at a vanished row falls back to a blank one.
        if let Some(id) = builder.try_duplicate(conn, demo_model_id).await? {
            return Ok(id);
        }
        log::warn!(
            "Demo container {} ({:?}) points at missing row {}",
            builder.name(),
            locale,
            demo_model_id
        );
    }

    builder.create_blank(conn).await
}

/// Returns the display order for a new container and opens a slot for it.
///
/// Without an anchor the container goes last. With one, every container
/// ordered after the anchor is shifted down by one.
async fn claim_display_order(
    conn: &mut PgConnection,
    scope: &Scope,
    after: Option<i64>,
) -> Result<f64, PageBuilderError> {
    let Some(anchor_id) = after else {
        let next = sqlx::query_scalar::<_, f64>(
            r#"
            SELECT COALESCE(MAX(display_order), 0) + 1
            FROM page_builder_containers
            WHERE page_id = $1 AND page_version = $2 AND locale_code = $3
            "#,
        )
        .bind(scope.page_id)
        .bind(&scope.page_version)
        .bind(&scope.locale)
        .fetch_one(&mut *conn)
        .await?;

        return Ok(next);
    };

    let anchor_order = sqlx::query_scalar::<_, f64>(
        r#"
        SELECT display_order
        FROM page_builder_containers
        WHERE id = $1
          AND locale_code = $2
          AND page_id = $3
          AND page_version = $4
        "#,
    )
    .bind(anchor_id)
    .bind(&scope.locale)
    .bind(scope.page_id)
    .bind(&scope.page_version)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        PageBuilderError::not_found(format!("anchor container {} in {}", anchor_id, scope))
    })?;

    sqlx::query(
        r#"
        UPDATE page_builder_containers
        SET
            display_order = display_order + 1,
            edited_at = now()
        WHERE page_id = $1
          AND page_version = $2
          AND locale_code = $3
          AND display_order > $4
        "#,
    )
    .bind(scope.page_id)
    .bind(&scope.page_version)
    .bind(&scope.locale)
    .bind(anchor_order)
    .execute(&mut *conn)
    .await?;

    Ok(anchor_order + 1.0)
}

pub(crate) async fn insert_container(
    conn: &mut PgConnection,
    data: &ContainerInsert<'_>,
) -> Result<Container, PageBuilderError> {
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
        VALUES (
            COALESCE($1, nextval('page_builder_containers_id_seq')),
            $2, $3, $4, $5, $6, $7, $8, $9, $10, $11
        )
        RETURNING *
        "#,
    )
    .bind(data.id)
    .bind(&data.scope.locale)
    .bind(data.scope.page_id)
    .bind(&data.scope.page_version)
    .bind(data.model_name)
    .bind(data.model_id)
    .bind(data.display_order)
    .bind(data.shared)
    .bind(data.hidden)
    .bind(data.display_name)
    .bind(data.localized_from_model_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(container)
}

/// Swaps the container with its nearest neighbor in `direction`.
///
/// Returns `false` without touching anything when the container is already
/// first (up) or last (down).
pub async fn move_container(
    pool: &PgPool,
    key: &RecordKey,
    direction: MoveDirection,
) -> Result<bool, PageBuilderError> {
    let mut tx = pool.begin().await?;

    let container = lock_container(&mut tx, key).await?;
    let scope = container.scope();
    ensure_editable(&mut tx, &scope).await?;

    let neighbor_sql = match direction {
        MoveDirection::Up => {
            r#"
            SELECT id, display_order
            FROM page_builder_containers
            WHERE page_id = $1
              AND page_version = $2
              AND locale_code = $3
              AND display_order < $4
            ORDER BY display_order DESC
            LIMIT 1
            "#
        }
        MoveDirection::Down => {
            r#"
            SELECT id, display_order
            FROM page_builder_containers
            WHERE page_id = $1
              AND page_version = $2
              AND locale_code = $3
              AND display_order > $4
            ORDER BY display_order ASC
            LIMIT 1
            "#
        }
    };

    let neighbor = sqlx::query_as::<_, (i64, f64)>(neighbor_sql)
        .bind(scope.page_id)
        .bind(&scope.page_version)
        .bind(&scope.locale)
        .bind(container.display_order)
        .fetch_optional(&mut *tx)
        .await?;

    let Some((neighbor_id, neighbor_order)) = neighbor else {
        return Ok(false);
    };

    set_display_order(&mut tx, container.id, &scope.locale, neighbor_order).await?;
    set_display_order(&mut tx, neighbor_id, &scope.locale, container.display_order).await?;

    tx.commit().await?;
    Ok(true)
}

/// Applies a drag-and-drop result: item `i` gets display order `i + 1`.
///
/// Each update is scoped by the item's own locale. An item that matches no
/// container aborts the whole reorder.
pub async fn reorder_containers(
    pool: &PgPool,
    items: &[ReorderItem],
) -> Result<(), PageBuilderError> {
    if items.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    let mut scopes: Vec<Scope> = Vec::new();
    for item in items {
        let scope = sqlx::query_as::<_, (i64, String)>(
            r#"
            SELECT page_id, page_version
            FROM page_builder_containers
            WHERE id = $1 AND locale_code = $2
            "#,
        )
        .bind(item.container_id)
        .bind(&item.locale)
        .fetch_optional(&mut *tx)
        .await?
        .map(|(page_id, page_version)| Scope::new(page_id, page_version, item.locale.clone()))
        .ok_or_else(|| container_not_found(&RecordKey::new(item.container_id, item.locale.clone())))?;

        if !scopes.contains(&scope) {
            scopes.push(scope);
        }
    }

    lock_scopes(&mut tx, &scopes).await?;
    for scope in &scopes {
        ensure_editable(&mut tx, scope).await?;
    }

    for (i, item) in items.iter().enumerate() {
        let order = (i + 1) as f64;
        let updated = set_display_order(&mut tx, item.container_id, &item.locale, order).await?;

        if !updated {
            return Err(container_not_found(&RecordKey::new(
                item.container_id,
                item.locale.clone(),
            )));
        }
    }

    tx.commit().await?;
    Ok(())
}

async fn set_display_order(
    conn: &mut PgConnection,
    id: i64,
    locale: &str,
    display_order: f64,
) -> Result<bool, PageBuilderError> {
    let result = sqlx::query(
        r#"
        UPDATE page_builder_containers
        SET
            display_order = $1,
            edited_at = now()
        WHERE id = $2 AND locale_code = $3
        "#,
    )
    .bind(display_order)
    .bind(id)
    .bind(locale)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn toggle_container_visibility(
    pool: &PgPool,
    key: &RecordKey,
) -> Result<Container, PageBuilderError> {
    let mut tx = pool.begin().await?;

    let container = fetch_container(&mut tx, key).await?;
    ensure_editable(&mut tx, &container.scope()).await?;

    let container = sqlx::query_as::<_, Container>(
        r#"
        UPDATE page_builder_containers
        SET
            hidden = NOT(COALESCE(hidden, FALSE)),
            edited_at = now()
        WHERE id = $1 AND locale_code = $2
        RETURNING *
        "#,
    )
    .bind(key.id)
    .bind(&key.locale)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(container)
}

/// Removes the container row. The backing row is left in place.
pub async fn delete_container(
    pool: &PgPool,
    key: &RecordKey,
) -> Result<Container, PageBuilderError> {
    let mut tx = pool.begin().await?;

    let container = lock_container(&mut tx, key).await?;
    ensure_editable(&mut tx, &container.scope()).await?;

    let deleted = sqlx::query_as::<_, Container>(
        r#"
        DELETE FROM page_builder_containers
        WHERE id = $1 AND locale_code = $2
        RETURNING *
        "#,
    )
    .bind(key.id)
    .bind(&key.locale)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(deleted)
}

/// Renames a container and returns every row that changed.
///
/// A shared container's name is kept identical on every container that
/// references the same backing row in the same locale.
pub async fn rename_container(
    pool: &PgPool,
    key: &RecordKey,
    display_name: &str,
) -> Result<Vec<Container>, PageBuilderError> {
    let display_name = display_name.trim();
    if display_name.is_empty() {
        return Err(PageBuilderError::InvalidArgument(
            "display name is empty".into(),
        ));
    }

    let mut tx = pool.begin().await?;

    let container = fetch_container(&mut tx, key).await?;
    ensure_editable(&mut tx, &container.scope()).await?;

    let renamed = if container.shared {
        sqlx::query_as::<_, Container>(
            r#"
            UPDATE page_builder_containers
            SET
                display_name = $1,
                edited_at = now()
            WHERE model_name = $2 AND model_id = $3 AND locale_code = $4
            RETURNING *
            "#,
        )
        .bind(display_name)
        .bind(&container.model_name)
        .bind(container.model_id)
        .bind(&key.locale)
        .fetch_all(&mut *tx)
        .await?
    } else {
        sqlx::query_as::<_, Container>(
            r#"
            UPDATE page_builder_containers
            SET
                display_name = $1,
                edited_at = now()
            WHERE id = $2 AND locale_code = $3
            RETURNING *
            "#,
        )
        .bind(display_name)
        .bind(key.id)
        .bind(&key.locale)
        .fetch_all(&mut *tx)
        .await?
    };

    tx.commit().await?;
    Ok(renamed)
}

pub async fn mark_container_shared(
    pool: &PgPool,
    key: &RecordKey,
) -> Result<Container, PageBuilderError> {
    let mut tx = pool.begin().await?;

    let container = fetch_container(&mut tx, key).await?;
    ensure_editable(&mut tx, &container.scope()).await?;

    let container = sqlx::query_as::<_, Container>(
        r#"
        UPDATE page_builder_containers
        SET
            shared = TRUE,
            edited_at = now()
        WHERE id = $1 AND locale_code = $2
        RETURNING *
        "#,
    )
    .bind(key.id)
    .bind(&key.locale)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(container)
}

pub async fn list_shared_containers(
    pool: &PgPool,
    locale: &str,
) -> Result<Vec<SharedContainer>, PageBuilderError> {
    let shared = sqlx::query_as::<_, SharedContainer>(
        r#"
        SELECT DISTINCT ON (model_name, model_id)
            model_name,
            model_id,
            display_name
        FROM page_builder_containers
        WHERE shared = TRUE AND locale_code = $1
        ORDER BY model_name, model_id, edited_at DESC
        "#,
    )
    .bind(locale)
    .fetch_all(pool)
    .await?;

    Ok(shared)
}

/// Renumbers the scope to `1..=n`, keeping the current order.
pub async fn compact_display_orders(
    pool: &PgPool,
    scope: &Scope,
) -> Result<Vec<Container>, PageBuilderError> {
    let mut tx = pool.begin().await?;
    lock_scope(&mut tx, scope).await?;
    ensure_editable(&mut tx, scope).await?;

    sqlx::query(
        r#"
        UPDATE page_builder_containers c
        SET
            display_order = ranked.new_order,
            edited_at = now()
        FROM (
            SELECT
                id,
                locale_code,
                ROW_NUMBER() OVER (ORDER BY display_order ASC, id ASC) AS new_order
            FROM page_builder_containers
            WHERE page_id = $1 AND page_version = $2 AND locale_code = $3
        ) ranked
        WHERE c.id = ranked.id
          AND c.locale_code = ranked.locale_code
          AND c.display_order <> ranked.new_order
        "#,
    )
    .bind(scope.page_id)
    .bind(&scope.page_version)
    .bind(&scope.locale)
    .execute(&mut *tx)
    .await?;

    let containers = list_containers_in(&mut tx, scope).await?;

    tx.commit().await?;
    Ok(containers)
}

fn container_not_found(key: &RecordKey) -> PageBuilderError {
    PageBuilderError::not_found(format!("container {} ({:?})", key.id, key.locale))
}
