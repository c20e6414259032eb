#![allow(dead_code)]

use std::sync::Mutex;

use sqlx::PgPool;

use pagebuilder::models::*;
use pagebuilder::services::*;

pub const LOCALE: &str = "en";
pub const OTHER_LOCALE: &str = "fr";
pub const SEED_VERSION: &str = "2026-01-10-v01";

pub fn test_registry() -> ContainerRegistry {
    let mut registry = ContainerRegistry::new();
    registry
        .register(
            ContainerBuilder::new("Header", "page_builder_headers")
                .columns(["heading", "subheading", "background_color"]),
        )
        .expect("Failed to register Header");
    registry
        .register(
            ContainerBuilder::new("TextBlock", "page_builder_text_blocks")
                .columns(["body", "alignment"]),
        )
        .expect("Failed to register TextBlock");
    registry
}

/// Draft page with a hero, an intro and a shared banner.
pub fn seed_home() -> PageKey {
    PageKey::new(1, SEED_VERSION, LOCALE).expect("Invalid seed key")
}

/// Online page, closed to container edits.
pub fn seed_about() -> PageKey {
    PageKey::new(2, SEED_VERSION, LOCALE).expect("Invalid seed key")
}

/// Draft page without containers.
pub fn seed_blank() -> PageKey {
    PageKey::new(3, SEED_VERSION, LOCALE).expect("Invalid seed key")
}

pub fn seed_template() -> RecordKey {
    RecordKey::new(1, LOCALE)
}

pub fn container(id: i64) -> RecordKey {
    RecordKey::new(id, LOCALE)
}

/// `(container id, display order)` of a scope in listing order.
pub async fn orders(pool: &PgPool, scope: &Scope) -> Vec<(i64, f64)> {
    sqlx::query_as::<_, (i64, f64)>(
        r#"
        SELECT id, display_order
        FROM page_builder_containers
        WHERE page_id = $1 AND page_version = $2 AND locale_code = $3
        ORDER BY display_order ASC, id ASC
        "#,
    )
    .bind(scope.page_id)
    .bind(&scope.page_version)
    .bind(&scope.locale)
    .fetch_all(pool)
    .await
    .expect("Failed to read display orders")
}

/// Keeps every recorded entry for later inspection.
#[derive(Default)]
pub struct CollectingSink {
    pub entries: Mutex<Vec<ActivityEntry>>,
}

impl CollectingSink {
    pub fn take(&self) -> Vec<ActivityEntry> {
        std::mem::take(&mut *self.entries.lock().expect("Poisoned sink"))
    }
}

impl ActivitySink for CollectingSink {
    fn record(&self, entry: ActivityEntry) {
        self.entries.lock().expect("Poisoned sink").push(entry);
    }
}
