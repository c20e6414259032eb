mod web;

use std::io;
use std::sync::Arc;

use actix_web::web::Data;
use actix_web::{App, HttpServer};
use env_logger::Env;
use log::info;

use pagebuilder::common::{Config, PageBuilderError};
use pagebuilder::db::Database;
use pagebuilder::services::{ContainerBuilder, ContainerRegistry, PageBuilder, PgActivityLog};

/// Content types shipped with the binary.
fn content_types() -> Result<ContainerRegistry, PageBuilderError> {
    let mut registry = ContainerRegistry::new();

    registry.register(
        ContainerBuilder::new("Header", "page_builder_headers")
            .columns(["heading", "subheading", "background_color"])
            .label("Header"),
    )?;
    registry.register(
        ContainerBuilder::new("TextBlock", "page_builder_text_blocks")
            .columns(["body", "alignment"])
            .label("Text block"),
    )?;

    Ok(registry)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(io::Error::other)?;
    let db = Database::connect(&config).await.map_err(io::Error::other)?;
    let registry = content_types().map_err(io::Error::other)?;

    info!(
        "Registered {} content types; locales: {:?}",
        registry.len(),
        config.locales
    );

    let activity = Arc::new(PgActivityLog::new(db.pool.clone()));
    let builder = PageBuilder::new(db.pool, registry, config.key_shape(), activity);

    let state = Data::new(web::AppState {
        builder,
        default_locale: config.default_locale().to_string(),
    });

    info!("Listening on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(web::handlers::configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
