mod common;

#[cfg(test)]
pub mod activity_tests {
    use std::sync::Arc;

    use serde_json::json;
    use sqlx::PgPool;

    use super::common::*;

    use pagebuilder::common::*;
    use pagebuilder::db::*;
    use pagebuilder::models::*;
    use pagebuilder::services::*;

    fn builder(pool: PgPool, sink: Arc<CollectingSink>) -> PageBuilder {
        PageBuilder::new(pool, test_registry(), KeyShape::LOCALIZED, sink)
    }

    #[test]
    fn test_diff_reports_changed_fields() {
        let old = json!({ "display_name": "Hero", "hidden": null, "edited_at": "a" });
        let new = json!({ "display_name": "Big hero", "hidden": true, "edited_at": "b" });

        let diffs = diff(&old, &new);
        assert_eq!(
            diffs,
            vec![
                FieldDiff {
                    field: "display_name".into(),
                    old: json!("Hero"),
                    new: json!("Big hero"),
                },
                FieldDiff {
                    field: "hidden".into(),
                    old: json!(null),
                    new: json!(true),
                },
            ]
        );
    }

    #[test]
    fn test_diff_handles_added_and_removed_fields() {
        let old = json!({ "a": 1, "b": 2 });
        let new = json!({ "b": 2, "c": 3 });

        let diffs = diff(&old, &new);
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].field, "a");
        assert_eq!(diffs[0].new, json!(null));
        assert_eq!(diffs[1].field, "c");
        assert_eq!(diffs[1].old, json!(null));

        assert!(diff(&json!([1]), &json!({ "a": 1 })).is_empty());
        assert!(diff(&old, &old).is_empty());
    }

    #[test]
    fn test_log_activity_accepts_entries() {
        let sink: Arc<dyn ActivitySink> = Arc::new(LogActivity);
        sink.record(
            ActivityEntry::new(ActivityAction::View, "page", "1_2026-01-10-v01_en")
                .label("Home"),
        );
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_editor_records_create_and_edit(pool: PgPool) {
        let sink = Arc::new(CollectingSink::default());
        let editor = builder(pool, sink.clone());

        let added = editor
            .add_container(&seed_home(), "TextBlock", None, Some("alice"))
            .await
            .expect("Failed to add container");

        let entries = sink.take();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ActivityAction::Create);
        assert_eq!(entries[0].model_keys, format!("{}_{}", added.id, LOCALE));
        assert_eq!(entries[0].creator.as_deref(), Some("alice"));

        editor
            .rename_container(&container(1), "Big hero", None)
            .await
            .expect("Failed to rename");

        let entries = sink.take();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ActivityAction::Edit);
        assert_eq!(entries[0].model_label, "Big hero");
        assert_eq!(
            entries[0].diffs,
            vec![FieldDiff {
                field: "display_name".into(),
                old: json!("Hero"),
                new: json!("Big hero"),
            }]
        );
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_editor_create_records_backing_row(pool: PgPool) {
        let sink = Arc::new(CollectingSink::default());
        let editor = builder(pool, sink.clone());

        editor
            .add_container(&seed_blank(), "Header", None, None)
            .await
            .expect("Failed to add container");

        let entries = sink.take();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].diffs.contains(&FieldDiff {
            field: "heading".into(),
            old: json!(null),
            new: json!("Demo heading"),
        }));
        assert!(entries[0].diffs.iter().all(|d| d.field != "id"));
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_editor_shared_rename_records_every_row(pool: PgPool) {
        let sink = Arc::new(CollectingSink::default());
        let editor = builder(pool, sink.clone());

        let renamed = editor
            .rename_container(&container(3), "Promo banner", Some("alice"))
            .await
            .expect("Failed to rename");
        assert_eq!(renamed.len(), 2);

        let entries = sink.take();
        let mut keys: Vec<&str> = entries.iter().map(|e| e.model_keys.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["3_en", "6_en"]);
        for entry in &entries {
            assert_eq!(entry.action, ActivityAction::Edit);
            assert_eq!(
                entry.diffs,
                vec![FieldDiff {
                    field: "display_name".into(),
                    old: json!("Banner"),
                    new: json!("Promo banner"),
                }]
            );
        }
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_editor_skips_activity_on_failure(pool: PgPool) {
        let sink = Arc::new(CollectingSink::default());
        let editor = builder(pool, sink.clone());

        let result = editor
            .add_container(&seed_about(), "Header", None, Some("alice"))
            .await;
        assert!(matches!(result, Err(PageBuilderError::Precondition(_))));

        let moved = editor
            .move_container(&container(1), MoveDirection::Up, None)
            .await
            .expect("Boundary move should succeed");
        assert!(!moved);

        assert!(sink.take().is_empty());
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_pg_activity_log_persists_entries(pool: PgPool) {
        let sink = PgActivityLog::new(pool.clone());
        let entry = ActivityEntry::new(ActivityAction::Delete, "container", "2_en")
            .creator(Some("bob".into()))
            .label("Intro");
        let id = entry.id;

        sink.record(entry);

        let mut logs = Vec::new();
        for _ in 0..50 {
            logs = list_activity_logs(&pool, "container", "2_en")
                .await
                .expect("Failed to list activity");
            if !logs.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].id, id);
        assert_eq!(logs[0].action, ActivityAction::Delete);
        assert_eq!(logs[0].creator.as_deref(), Some("bob"));
        assert!(logs[0].model_diffs.0.is_empty());
    }
}
