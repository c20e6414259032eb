mod common;

#[cfg(test)]
pub mod fork_tests {
    use chrono::Utc;
    use sqlx::PgPool;

    use super::common::*;

    use pagebuilder::common::*;
    use pagebuilder::db::*;
    use pagebuilder::models::*;

    async fn count_localized_shared(pool: &PgPool, source_model_id: i64, locale: &str) -> i64 {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM page_builder_containers
            WHERE localized_from_model_id = $1 AND locale_code = $2 AND shared = TRUE
            "#,
        )
        .bind(source_model_id)
        .bind(locale)
        .fetch_one(pool)
        .await
        .expect("Failed to count localized shared containers")
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_copy_keeps_shared_identity(pool: PgPool) {
        let registry = test_registry();
        let from = seed_home().scope();
        let to = seed_blank().scope();

        let copied = copy_containers(&pool, &registry, &from, &to)
            .await
            .expect("Failed to copy containers");
        assert_eq!(copied.len(), 3);

        let source = list_containers(&pool, &from)
            .await
            .expect("Failed to list source");

        for (src, dst) in source.iter().zip(copied.iter()) {
            assert_ne!(src.id, dst.id);
            assert_eq!(dst.scope(), to);
            assert_eq!(src.display_order, dst.display_order);
            assert_eq!(src.display_name, dst.display_name);
            assert_eq!(src.shared, dst.shared);
            assert_eq!(src.is_hidden(), dst.is_hidden());

            if src.shared {
                assert_eq!(src.model_id, dst.model_id, "Shared rows are referenced, not cloned");
            } else {
                assert_ne!(src.model_id, dst.model_id, "Plain rows are cloned");
            }
        }

        let (heading,): (String,) =
            sqlx::query_as("SELECT heading FROM page_builder_headers WHERE id = $1")
                .bind(copied[0].model_id)
                .fetch_one(&pool)
                .await
                .expect("Failed to load cloned header");
        assert_eq!(heading, "Welcome");
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_copy_fails_on_invalid_destination(pool: PgPool) {
        let registry = test_registry();
        let from = seed_home().scope();

        let result = copy_containers(&pool, &registry, &from, &from).await;
        assert!(matches!(result, Err(PageBuilderError::InvalidArgument(_))));

        let result = copy_containers(&pool, &registry, &from, &seed_about().scope()).await;
        assert!(matches!(result, Err(PageBuilderError::Precondition(_))));

        let result = copy_containers_to_new_version(&pool, &registry, &seed_home(), "2026-02-01-v01").await;
        assert!(
            matches!(result, Err(PageBuilderError::NotFound(_))),
            "The destination version has no page row"
        );

        assert_eq!(orders(&pool, &seed_about().scope()).await.len(), 1);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_copy_aborts_on_missing_backing_row(pool: PgPool) {
        let registry = test_registry();

        sqlx::query("DELETE FROM page_builder_text_blocks WHERE id = 1")
            .execute(&pool)
            .await
            .expect("Failed to delete backing row");

        let result = copy_containers(
            &pool,
            &registry,
            &seed_home().scope(),
            &seed_blank().scope(),
        )
        .await;
        assert!(matches!(result, Err(PageBuilderError::NotFound(_))));

        assert!(
            orders(&pool, &seed_blank().scope()).await.is_empty(),
            "A failed fork leaves nothing behind"
        );
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_save_new_version_branches_draft(pool: PgPool) {
        let registry = test_registry();
        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();

        set_page_status(&pool, &seed_home(), PageStatus::Online)
            .await
            .expect("Failed to publish");

        let saved = save_new_version(&pool, &registry, &seed_home(), Some("Spring"))
            .await
            .expect("Failed to save new version");

        assert_eq!(saved.id, 1);
        assert!(saved.version.starts_with(&today), "Unexpected token {}", saved.version);
        assert_eq!(saved.parent_version.as_deref(), Some(SEED_VERSION));
        assert_eq!(saved.version_name, "Spring");
        assert_eq!(saved.status, PageStatus::Draft);
        assert_eq!(saved.category_id, Some(1));

        let containers = list_containers(&pool, &saved.scope())
            .await
            .expect("Failed to list new version");
        assert_eq!(containers.len(), 3);

        let again = save_new_version(&pool, &registry, &seed_home(), None)
            .await
            .expect("Failed to save second version");
        assert_ne!(again.version, saved.version);

        let versions = list_page_versions(&pool, 1, LOCALE)
            .await
            .expect("Failed to list versions");
        assert_eq!(versions.len(), 3);

        let draft = current_draft(&pool, 1, LOCALE)
            .await
            .expect("Failed to load draft")
            .expect("A draft should exist");
        assert_eq!(draft.version, again.version);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_localize_page_forks_everything(pool: PgPool) {
        let registry = test_registry();

        let page = localize_page(&pool, &registry, &seed_home(), OTHER_LOCALE)
            .await
            .expect("Failed to localize page");
        assert_eq!(page.locale_code, OTHER_LOCALE);
        assert_eq!(page.version, SEED_VERSION);
        assert_eq!(page.title, "Home");
        assert_eq!(page.status, PageStatus::Draft);

        let category = get_category(&pool, &RecordKey::new(1, OTHER_LOCALE))
            .await
            .expect("Category should be localized");
        assert_eq!(category.name, "News");

        let containers = list_containers(&pool, &page.scope())
            .await
            .expect("Failed to list localized containers");
        let ids: Vec<i64> = containers.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3], "Localized containers keep their ids");
        assert!(containers
            .iter()
            .all(|c| c.localized_from_model_id.is_some()));

        let banner = &containers[2];
        assert!(banner.shared);
        assert_ne!(banner.model_id, 2);
        assert_eq!(banner.localized_from_model_id, Some(2));
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_localize_twice_keeps_one_shared_row(pool: PgPool) {
        let registry = test_registry();

        let first = localize_page(&pool, &registry, &seed_home(), OTHER_LOCALE)
            .await
            .expect("Failed first localization");
        let first_containers = list_containers(&pool, &first.scope())
            .await
            .expect("Failed to list");

        let second = localize_page(&pool, &registry, &seed_home(), OTHER_LOCALE)
            .await
            .expect("Failed second localization");
        let second_containers = list_containers(&pool, &second.scope())
            .await
            .expect("Failed to list");

        assert_eq!(count_localized_shared(&pool, 2, OTHER_LOCALE).await, 1);
        assert_eq!(second_containers.len(), 3);
        assert_eq!(first_containers[2].model_id, second_containers[2].model_id);

        let pages: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM page_builder_pages WHERE id = 1 AND locale_code = $1",
        )
        .bind(OTHER_LOCALE)
        .fetch_one(&pool)
        .await
        .expect("Failed to count pages");
        assert_eq!(pages, 1);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_localize_again_keeps_target_only_containers(pool: PgPool) {
        let registry = test_registry();
        let fr = Scope::new(1, SEED_VERSION, OTHER_LOCALE);

        localize_page(&pool, &registry, &seed_home(), OTHER_LOCALE)
            .await
            .expect("Failed first localization");

        let fr_only = add_container(&pool, &registry, &fr, "TextBlock", None)
            .await
            .expect("Failed to add to localized scope");
        let en_new = add_container(&pool, &registry, &seed_home().scope(), "TextBlock", None)
            .await
            .expect("Failed to add to source scope");
        assert_eq!(fr_only.display_order, en_new.display_order);

        localize_page(&pool, &registry, &seed_home(), OTHER_LOCALE)
            .await
            .expect("Failed second localization");

        assert_eq!(
            orders(&pool, &fr).await,
            vec![(1, 1.0), (2, 2.0), (3, 3.0), (en_new.id, 4.0), (fr_only.id, 5.0)]
        );
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_localize_again_refreshes_visibility(pool: PgPool) {
        let registry = test_registry();

        let page = localize_page(&pool, &registry, &seed_home(), OTHER_LOCALE)
            .await
            .expect("Failed first localization");

        toggle_container_visibility(&pool, &container(2))
            .await
            .expect("Failed to hide source container");

        localize_page(&pool, &registry, &seed_home(), OTHER_LOCALE)
            .await
            .expect("Failed second localization");

        let containers = list_containers(&pool, &page.scope())
            .await
            .expect("Failed to list localized containers");
        let intro = containers
            .iter()
            .find(|c| c.id == 2)
            .expect("Intro should be localized");
        assert!(intro.is_hidden());
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_concurrent_save_new_version_allocates_distinct_tokens(pool: PgPool) {
        let registry = test_registry();
        let today = Utc::now().date_naive();

        let home_a = seed_home();
        let home_b = seed_home();
        let (a, b) = tokio::join!(
            save_new_version(&pool, &registry, &home_a, None),
            save_new_version(&pool, &registry, &home_b, None),
        );
        let a = a.expect("First save failed");
        let b = b.expect("Second save failed");

        let mut versions = vec![a.version, b.version];
        versions.sort();
        assert_eq!(versions, vec![version_token(today, 1), version_token(today, 2)]);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_save_new_version_waits_for_version_lock(pool: PgPool) {
        let today = Utc::now().date_naive();

        let mut holder = pool.begin().await.expect("Failed to begin");
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended('page_builder_pages:1', 0))")
            .execute(&mut *holder)
            .await
            .expect("Failed to take version lock");

        let task_pool = pool.clone();
        let waiting = tokio::spawn(async move {
            let registry = test_registry();
            save_new_version(&task_pool, &registry, &seed_home(), None).await
        });

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        sqlx::query(
            r#"
            INSERT INTO page_builder_pages (id, version, locale_code, title, slug)
            VALUES (1, $1, $2, 'Home', 'home')
            "#,
        )
        .bind(version_token(today, 1))
        .bind(LOCALE)
        .execute(&mut *holder)
        .await
        .expect("Failed to insert competing version");
        holder.commit().await.expect("Failed to commit");

        let saved = waiting
            .await
            .expect("Save task panicked")
            .expect("Queued save should see the committed version");
        assert_eq!(saved.version, version_token(today, 2));
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_localize_reuses_shared_row_across_scopes(pool: PgPool) {
        let registry = test_registry();

        localize_page(&pool, &registry, &seed_home(), OTHER_LOCALE)
            .await
            .expect("Failed to localize page");

        let template = localize_containers(
            &pool,
            &registry,
            &Scope::template(1, LOCALE),
            &Scope::template(1, OTHER_LOCALE),
        )
        .await
        .expect("Failed to localize template containers");

        let page_banner = get_container(&pool, &RecordKey::new(3, OTHER_LOCALE))
            .await
            .expect("Failed to load page banner");
        let template_banner = template
            .iter()
            .find(|c| c.id == 6)
            .expect("Template banner should be localized");

        assert_eq!(page_banner.model_id, template_banner.model_id);
        assert_eq!(template_banner.display_name, page_banner.display_name);

        let distinct: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT model_id)
            FROM page_builder_containers
            WHERE localized_from_model_id = 2 AND locale_code = $1 AND shared = TRUE
            "#,
        )
        .bind(OTHER_LOCALE)
        .fetch_one(&pool)
        .await
        .expect("Failed to count backing rows");
        assert_eq!(distinct, 1);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_find_localized_shared(pool: PgPool) {
        let registry = test_registry();
        let mut conn = pool.acquire().await.expect("Failed to acquire");

        let lookup = find_localized_shared(&mut conn, "Header", 2, OTHER_LOCALE)
            .await
            .expect("Failed lookup");
        assert_eq!(lookup, ProvenanceLookup::NotFound);

        localize_page(&pool, &registry, &seed_home(), OTHER_LOCALE)
            .await
            .expect("Failed to localize page");

        let lookup = find_localized_shared(&mut conn, "Header", 2, OTHER_LOCALE)
            .await
            .expect("Failed lookup");
        assert!(matches!(
            lookup,
            ProvenanceLookup::Found(SharedContainer { ref display_name, .. }) if display_name == "Banner"
        ));
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_localize_fails_on_same_locale(pool: PgPool) {
        let registry = test_registry();

        let result = localize_page(&pool, &registry, &seed_home(), LOCALE).await;
        assert!(matches!(result, Err(PageBuilderError::InvalidArgument(_))));

        let result = localize_containers(
            &pool,
            &registry,
            &Scope::template(1, LOCALE),
            &Scope::template(1, LOCALE),
        )
        .await;
        assert!(matches!(result, Err(PageBuilderError::InvalidArgument(_))));
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_localize_category_is_idempotent(pool: PgPool) {
        let first = localize_category(&pool, Some(1), LOCALE, OTHER_LOCALE)
            .await
            .expect("Failed to localize category")
            .expect("Category should exist in target");
        let second = localize_category(&pool, Some(1), LOCALE, OTHER_LOCALE)
            .await
            .expect("Failed to localize category")
            .expect("Category should exist in target");
        assert_eq!(first, second);

        let none = localize_category(&pool, None, LOCALE, OTHER_LOCALE)
            .await
            .expect("No category is not an error");
        assert!(none.is_none());

        let missing = localize_category(&pool, Some(99), LOCALE, OTHER_LOCALE)
            .await
            .expect("Missing source is not an error");
        assert!(missing.is_none());
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_create_page_from_template(pool: PgPool) {
        let registry = test_registry();

        let data = PageCreate {
            title: "Spring campaign".into(),
            slug: "spring".into(),
            category_id: None,
            locale: LOCALE.into(),
        };

        let page = create_page_from_template(&pool, &registry, &data, &seed_template())
            .await
            .expect("Failed to create page from template");
        assert_eq!(page.id, 4);
        assert_eq!(page.status, PageStatus::Draft);

        let containers = list_containers(&pool, &page.scope())
            .await
            .expect("Failed to list containers");
        assert_eq!(containers.len(), 2);
        assert_ne!(containers[0].model_id, 3);
        assert_eq!(containers[1].model_id, 2);

        let result =
            create_page_from_template(&pool, &registry, &data, &RecordKey::new(9, LOCALE)).await;
        assert!(matches!(result, Err(PageBuilderError::NotFound(_))));
    }

    #[sqlx::test(migrations = "./migrations", fixtures("seed"))]
    async fn test_localize_demo_container(pool: PgPool) {
        let registry = test_registry();

        let demo = localize_demo_container(&pool, &registry, &RecordKey::new(1, LOCALE), OTHER_LOCALE)
            .await
            .expect("Failed to localize demo");
        assert_eq!(demo.id, 1);
        assert_eq!(demo.locale_code, OTHER_LOCALE);
        assert_ne!(demo.model_id, 4);

        let again = localize_demo_container(&pool, &registry, &RecordKey::new(1, LOCALE), OTHER_LOCALE)
            .await
            .expect("Failed to localize demo again");
        assert_eq!(again, demo);

        let found = get_demo_container(&pool, "Header", OTHER_LOCALE)
            .await
            .expect("Failed to load demo");
        assert_eq!(found, Some(demo));
    }
}
