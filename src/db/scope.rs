use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::common::PageBuilderError;
use crate::models::{PageStatus, Scope};

/// Serializes structural edits of one scope until the transaction ends.
pub(crate) async fn lock_scope(
    conn: &mut PgConnection,
    scope: &Scope,
) -> Result<(), PageBuilderError> {
    lock_name(conn, &scope.lock_name()).await
}

/// Locks several scopes in a stable order so concurrent callers cannot deadlock.
pub(crate) async fn lock_scopes(
    conn: &mut PgConnection,
    scopes: &[Scope],
) -> Result<(), PageBuilderError> {
    let mut names: Vec<String> = scopes.iter().map(Scope::lock_name).collect();
    names.sort();
    names.dedup();

    for name in &names {
        lock_name(conn, name).await?;
    }
    Ok(())
}

/// Serializes version-token allocation for one logical page.
pub(crate) async fn lock_page_versions(
    conn: &mut PgConnection,
    page_id: i64,
) -> Result<(), PageBuilderError> {
    lock_name(conn, &format!("page_builder_pages:{}", page_id)).await
}

async fn lock_name(
    conn: &mut PgConnection,
    name: &str,
) -> Result<(), PageBuilderError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Opens a fork transaction holding the locks of every scope it reads or writes.
///
/// Runs at READ COMMITTED: each statement after the locks sees every edit
/// committed before they were granted, and the locked scopes stay still.
pub(crate) async fn begin_fork(
    pool: &PgPool,
    scopes: &[Scope],
) -> Result<Transaction<'static, Postgres>, PageBuilderError> {
    let mut tx = pool.begin().await?;
    lock_scopes(&mut tx, scopes).await?;

    Ok(tx)
}

/// Fails unless the scope's owner exists and still accepts container edits.
pub(crate) async fn ensure_editable(
    conn: &mut PgConnection,
    scope: &Scope,
) -> Result<(), PageBuilderError> {
    if scope.is_template() {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM page_builder_templates
                WHERE id = $1 AND locale_code = $2
            )
            "#,
        )
        .bind(scope.page_id)
        .bind(&scope.locale)
        .fetch_one(&mut *conn)
        .await?;

        if !exists {
            return Err(PageBuilderError::not_found(format!(
                "template {} ({:?})",
                scope.page_id, scope.locale
            )));
        }
        return Ok(());
    }

    let status = sqlx::query_scalar::<_, PageStatus>(
        r#"
        SELECT status
        FROM page_builder_pages
        WHERE id = $1 AND version = $2 AND locale_code = $3
        "#,
    )
    .bind(scope.page_id)
    .bind(&scope.page_version)
    .bind(&scope.locale)
    .fetch_optional(&mut *conn)
    .await?;

    match status {
        None => Err(PageBuilderError::not_found(scope)),
        Some(status) if !status.is_editable() => Err(PageBuilderError::Precondition(
            format!("{} is {} and no longer editable", scope, status),
        )),
        Some(_) => Ok(()),
    }
}
