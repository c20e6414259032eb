use indexmap::IndexMap;
use sqlx::PgConnection;

use crate::common::PageBuilderError;

/// Describes the backing table of one content type.
///
/// Rows are addressed by a `BIGINT id` column with a default; `columns`
/// lists everything copied when a row is duplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerBuilder {
    name: String,
    table: String,
    columns: Vec<String>,
    label: Option<String>,
}

impl ContainerBuilder {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: Vec::new(),
            label: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    fn validate(&self) -> Result<(), PageBuilderError> {
        if self.name.trim().is_empty() {
            return Err(PageBuilderError::InvalidArgument(
                "container name is empty".into(),
            ));
        }

        for ident in std::iter::once(&self.table).chain(self.columns.iter()) {
            if !is_plain_identifier(ident) {
                return Err(PageBuilderError::InvalidArgument(format!(
                    "{:?} is not a plain SQL identifier (container {})",
                    ident, self.name
                )));
            }
        }

        if self.columns.iter().any(|c| c == "id") {
            return Err(PageBuilderError::InvalidArgument(format!(
                "container {} lists its id among copied columns",
                self.name
            )));
        }

        Ok(())
    }

    /// Inserts a zero-value row and returns its id.
    pub async fn create_blank(
        &self,
        conn: &mut PgConnection,
    ) -> Result<i64, PageBuilderError> {
        let sql = format!(
            r#"INSERT INTO "{}" DEFAULT VALUES RETURNING id"#,
            self.table
        );

        let id = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&mut *conn)
            .await?;

        Ok(id)
    }

    /// Copies row `id` under a fresh id, or `None` when the source row is gone.
    pub async fn try_duplicate(
        &self,
        conn: &mut PgConnection,
        id: i64,
    ) -> Result<Option<i64>, PageBuilderError> {
        if self.columns.is_empty() {
            let exists = sqlx::query_scalar::<_, bool>(&format!(
                r#"SELECT EXISTS(SELECT 1 FROM "{}" WHERE id = $1)"#,
                self.table
            ))
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;

            if !exists {
                return Ok(None);
            }
            return self.create_blank(conn).await.map(Some);
        }

        let cols = self
            .columns
            .iter()
            .map(|c| format!(r#""{}""#, c))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            r#"INSERT INTO "{table}" ({cols}) SELECT {cols} FROM "{table}" WHERE id = $1 RETURNING id"#,
            table = self.table,
            cols = cols,
        );

        let new_id = sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(new_id)
    }

    pub async fn duplicate(
        &self,
        conn: &mut PgConnection,
        id: i64,
    ) -> Result<i64, PageBuilderError> {
        self.try_duplicate(conn, id).await?.ok_or_else(|| {
            PageBuilderError::not_found(format!("{} row {}", self.name, id))
        })
    }

    /// Loads row `id` as a JSON object.
    pub async fn load(
        &self,
        conn: &mut PgConnection,
        id: i64,
    ) -> Result<serde_json::Value, PageBuilderError> {
        let sql = format!(
            r#"SELECT to_jsonb(t) FROM "{}" t WHERE t.id = $1"#,
            self.table
        );

        sqlx::query_scalar::<_, serde_json::Value>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| PageBuilderError::not_found(format!("{} row {}", self.name, id)))
    }
}

/// Content-type name to backing-table builder, populated once at wiring time.
#[derive(Debug, Default, Clone)]
pub struct ContainerRegistry {
    builders: IndexMap<String, ContainerBuilder>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        builder: ContainerBuilder,
    ) -> Result<&ContainerBuilder, PageBuilderError> {
        builder.validate()?;

        if self.builders.contains_key(builder.name()) {
            return Err(PageBuilderError::InvalidArgument(format!(
                "container {} is already registered",
                builder.name()
            )));
        }

        let name = builder.name().to_string();
        let (index, _) = self.builders.insert_full(name, builder);
        Ok(&self.builders[index])
    }

    pub fn lookup(&self, name: &str) -> Result<&ContainerBuilder, PageBuilderError> {
        self.builders
            .get(name)
            .ok_or_else(|| PageBuilderError::not_found(format!("container type {}", name)))
    }

    /// Builders in registration order.
    pub fn builders(&self) -> impl Iterator<Item = &ContainerBuilder> {
        self.builders.values()
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    s.len() <= 63
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
