use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;

use crate::common::PageBuilderError;
use crate::db;
use crate::log_err;
use crate::models::{
    ActivityAction, Container, DemoContainer, FieldDiff, KeyShape, MoveDirection, Page, PageCreate,
    PageKey, RecordKey, ReorderItem, Scope, SharedContainer,
};
use crate::services::{diff, ActivityEntry, ActivitySink, ContainerRegistry};

const CONTAINER_MODEL: &str = "container";
const PAGE_MODEL: &str = "page";

/// Editor-facing entry point: the ordering and fork engines plus activity
/// recording and error persistence.
#[derive(Clone)]
pub struct PageBuilder {
    pool: PgPool,
    registry: Arc<ContainerRegistry>,
    shape: KeyShape,
    activity: Arc<dyn ActivitySink>,
}

impl PageBuilder {
    pub fn new(
        pool: PgPool,
        registry: ContainerRegistry,
        shape: KeyShape,
        activity: Arc<dyn ActivitySink>,
    ) -> Self {
        Self {
            pool,
            registry: Arc::new(registry),
            shape,
            activity,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn registry(&self) -> &ContainerRegistry {
        &self.registry
    }

    pub fn shape(&self) -> KeyShape {
        self.shape
    }

    pub async fn list_containers(
        &self,
        page: &PageKey,
    ) -> Result<Vec<Container>, PageBuilderError> {
        let result = db::list_containers(&self.pool, &page.scope()).await;
        self.checked(result, page)
    }

    pub async fn add_container(
        &self,
        page: &PageKey,
        model_name: &str,
        after: Option<i64>,
        creator: Option<&str>,
    ) -> Result<Container, PageBuilderError> {
        let result =
            db::add_container(&self.pool, &self.registry, &page.scope(), model_name, after).await;
        let container = self.checked(result, (page, model_name, after))?;

        let diffs = self.backing_snapshot(&container).await;
        self.record_container(ActivityAction::Create, &container, creator, diffs);
        Ok(container)
    }

    pub async fn add_shared_container(
        &self,
        page: &PageKey,
        model_name: &str,
        model_id: i64,
        after: Option<i64>,
        creator: Option<&str>,
    ) -> Result<Container, PageBuilderError> {
        let result = db::add_shared_container(
            &self.pool,
            &self.registry,
            &page.scope(),
            model_name,
            model_id,
            after,
        )
        .await;
        let container = self.checked(result, (page, model_name, model_id, after))?;

        let diffs = self.backing_snapshot(&container).await;
        self.record_container(ActivityAction::Create, &container, creator, diffs);
        Ok(container)
    }

    pub async fn move_container(
        &self,
        key: &RecordKey,
        direction: MoveDirection,
        creator: Option<&str>,
    ) -> Result<bool, PageBuilderError> {
        let result = db::move_container(&self.pool, key, direction).await;
        let moved = self.checked(result, (key, direction))?;

        if moved {
            self.activity.record(
                ActivityEntry::new(ActivityAction::Edit, CONTAINER_MODEL, key.encode(self.shape))
                    .creator(creator.map(str::to_string))
                    .label(format!("moved {:?}", direction).to_lowercase()),
            );
        }
        Ok(moved)
    }

    pub async fn reorder_containers(
        &self,
        items: &[ReorderItem],
        creator: Option<&str>,
    ) -> Result<(), PageBuilderError> {
        let result = db::reorder_containers(&self.pool, items).await;
        self.checked(result, items)?;

        for item in items {
            let key = RecordKey::new(item.container_id, item.locale.clone());
            self.activity.record(
                ActivityEntry::new(ActivityAction::Edit, CONTAINER_MODEL, key.encode(self.shape))
                    .creator(creator.map(str::to_string))
                    .label("reordered"),
            );
        }
        Ok(())
    }

    pub async fn toggle_container_visibility(
        &self,
        key: &RecordKey,
        creator: Option<&str>,
    ) -> Result<Container, PageBuilderError> {
        let before = self.checked(db::get_container(&self.pool, key).await, key)?;
        let result = db::toggle_container_visibility(&self.pool, key).await;
        let after = self.checked(result, key)?;

        self.record_change(&before, &after, creator);
        Ok(after)
    }

    pub async fn delete_container(
        &self,
        key: &RecordKey,
        creator: Option<&str>,
    ) -> Result<Container, PageBuilderError> {
        let result = db::delete_container(&self.pool, key).await;
        let deleted = self.checked(result, key)?;

        self.record_container(ActivityAction::Delete, &deleted, creator, Vec::new());
        Ok(deleted)
    }

    pub async fn rename_container(
        &self,
        key: &RecordKey,
        display_name: &str,
        creator: Option<&str>,
    ) -> Result<Vec<Container>, PageBuilderError> {
        let before = self.checked(db::get_container(&self.pool, key).await, key)?;
        let result = db::rename_container(&self.pool, key, display_name).await;
        let renamed = self.checked(result, (key, display_name))?;

        // Rows sharing a backing row in one locale carry the same name.
        for after in &renamed {
            let prior = if after.id == key.id {
                before.clone()
            } else {
                Container {
                    display_name: before.display_name.clone(),
                    ..after.clone()
                }
            };
            self.record_change(&prior, after, creator);
        }
        Ok(renamed)
    }

    pub async fn mark_container_shared(
        &self,
        key: &RecordKey,
        creator: Option<&str>,
    ) -> Result<Container, PageBuilderError> {
        let before = self.checked(db::get_container(&self.pool, key).await, key)?;
        let result = db::mark_container_shared(&self.pool, key).await;
        let after = self.checked(result, key)?;

        self.record_change(&before, &after, creator);
        Ok(after)
    }

    pub async fn list_shared_containers(
        &self,
        locale: &str,
    ) -> Result<Vec<SharedContainer>, PageBuilderError> {
        let result = db::list_shared_containers(&self.pool, locale).await;
        self.checked(result, locale)
    }

    pub async fn compact_display_orders(
        &self,
        page: &PageKey,
    ) -> Result<Vec<Container>, PageBuilderError> {
        let result = db::compact_display_orders(&self.pool, &page.scope()).await;
        self.checked(result, page)
    }

    pub async fn copy_containers(
        &self,
        from: &Scope,
        to: &Scope,
        creator: Option<&str>,
    ) -> Result<Vec<Container>, PageBuilderError> {
        let result = db::copy_containers(&self.pool, &self.registry, from, to).await;
        let copied = self.checked(result, (from, to))?;

        for container in &copied {
            self.record_container(ActivityAction::Create, container, creator, Vec::new());
        }
        Ok(copied)
    }

    pub async fn save_new_version(
        &self,
        page: &PageKey,
        version_name: Option<&str>,
        creator: Option<&str>,
    ) -> Result<Page, PageBuilderError> {
        let result = db::save_new_version(&self.pool, &self.registry, page, version_name).await;
        let saved = self.checked(result, (page, version_name))?;

        self.record_page(ActivityAction::Create, &saved, creator);
        Ok(saved)
    }

    pub async fn localize_page(
        &self,
        page: &PageKey,
        to_locale: &str,
        creator: Option<&str>,
    ) -> Result<Page, PageBuilderError> {
        let result = db::localize_page(&self.pool, &self.registry, page, to_locale).await;
        let localized = self.checked(result, (page, to_locale))?;

        self.record_page(ActivityAction::Create, &localized, creator);
        Ok(localized)
    }

    pub async fn create_page_from_template(
        &self,
        data: &PageCreate,
        template: &RecordKey,
        creator: Option<&str>,
    ) -> Result<Page, PageBuilderError> {
        let result =
            db::create_page_from_template(&self.pool, &self.registry, data, template).await;
        let page = self.checked(result, (data, template))?;

        self.record_page(ActivityAction::Create, &page, creator);
        Ok(page)
    }

    pub async fn localize_demo_container(
        &self,
        key: &RecordKey,
        to_locale: &str,
    ) -> Result<DemoContainer, PageBuilderError> {
        let result = db::localize_demo_container(&self.pool, &self.registry, key, to_locale).await;
        self.checked(result, (key, to_locale))
    }

    /// Persists storage failures to `error_logs` before handing the result back.
    fn checked<T, P: Serialize>(
        &self,
        result: Result<T, PageBuilderError>,
        params: P,
    ) -> Result<T, PageBuilderError> {
        if let Err(e) = &result {
            if e.is_storage() {
                log_err!(&self.pool, e, &params);
            } else {
                log::debug!("Rejected editor request: {}", e);
            }
        }
        result
    }

    /// Backing row content of a new container, as field diffs from nothing.
    async fn backing_snapshot(&self, container: &Container) -> Vec<FieldDiff> {
        let Ok(builder) = self.registry.lookup(&container.model_name) else {
            return Vec::new();
        };

        let row = match self.pool.acquire().await {
            Ok(mut conn) => builder.load(&mut conn, container.model_id).await,
            Err(e) => Err(e.into()),
        };

        match row {
            Ok(row) => diff(&serde_json::Value::Object(Default::default()), &row)
                .into_iter()
                .filter(|d| d.field != "id")
                .collect(),
            Err(e) => {
                log::warn!(
                    "Failed to snapshot {} row {}: {}",
                    container.model_name,
                    container.model_id,
                    e
                );
                Vec::new()
            }
        }
    }

    fn record_container(
        &self,
        action: ActivityAction,
        container: &Container,
        creator: Option<&str>,
        diffs: Vec<FieldDiff>,
    ) {
        self.activity.record(
            ActivityEntry::new(action, CONTAINER_MODEL, container.key().encode(self.shape))
                .creator(creator.map(str::to_string))
                .label(container.display_name.clone())
                .diffs(diffs),
        );
    }

    fn record_change(&self, before: &Container, after: &Container, creator: Option<&str>) {
        let diffs = match (serde_json::to_value(before), serde_json::to_value(after)) {
            (Ok(old), Ok(new)) => diff(&old, &new),
            _ => Vec::new(),
        };
        self.record_container(ActivityAction::Edit, after, creator, diffs);
    }

    fn record_page(&self, action: ActivityAction, page: &Page, creator: Option<&str>) {
        self.activity.record(
            ActivityEntry::new(action, PAGE_MODEL, page.key().encode(self.shape))
                .creator(creator.map(str::to_string))
                .label(page.title.clone()),
        );
    }
}
