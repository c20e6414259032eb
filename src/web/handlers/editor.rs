use actix_web::{delete, get, post, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use pagebuilder::models::{MoveDirection, ReorderItem};

use crate::web::helpers::{current_editor, error_response, json_result, page_key, record_key};
use crate::web::state::AppState;

#[derive(Deserialize)]
pub struct AddContainerForm {
    pub model_name: String,
    /// Place after this container instead of at the end.
    pub after: Option<i64>,
    /// Attach an existing shared backing row instead of creating one.
    pub shared_model_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct MoveForm {
    pub direction: MoveDirection,
}

#[derive(Deserialize)]
pub struct ReorderForm {
    pub items: Vec<ReorderItem>,
}

#[derive(Deserialize)]
pub struct RenameForm {
    pub display_name: String,
}

#[get("/editors/{page}/containers")]
pub async fn list_containers(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let page = match page_key(&path, state.shape(), &state.default_locale) {
        Ok(key) => key,
        Err(resp) => return resp,
    };

    json_result(state.builder.list_containers(&page).await)
}

#[post("/editors/{page}/containers")]
pub async fn add_container(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    form: web::Json<AddContainerForm>,
) -> impl Responder {
    let page = match page_key(&path, state.shape(), &state.default_locale) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let editor = current_editor(&req);
    let form = form.into_inner();

    let result = match form.shared_model_id {
        Some(model_id) => {
            state
                .builder
                .add_shared_container(&page, &form.model_name, model_id, form.after, editor.as_deref())
                .await
        }
        None => {
            state
                .builder
                .add_container(&page, &form.model_name, form.after, editor.as_deref())
                .await
        }
    };

    match result {
        Ok(container) => HttpResponse::Created().json(container),
        Err(e) => error_response(&e),
    }
}

#[post("/editors/containers/reorder")]
pub async fn reorder_containers(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Json<ReorderForm>,
) -> impl Responder {
    let editor = current_editor(&req);

    match state
        .builder
        .reorder_containers(&form.items, editor.as_deref())
        .await
    {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(&e),
    }
}

#[post("/editors/containers/{container}/move")]
pub async fn move_container(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    form: web::Json<MoveForm>,
) -> impl Responder {
    let key = match record_key(&path, state.shape(), &state.default_locale) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let editor = current_editor(&req);

    json_result(
        state
            .builder
            .move_container(&key, form.direction, editor.as_deref())
            .await
            .map(|moved| serde_json::json!({ "moved": moved })),
    )
}

#[post("/editors/containers/{container}/toggle-visibility")]
pub async fn toggle_visibility(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let key = match record_key(&path, state.shape(), &state.default_locale) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let editor = current_editor(&req);

    json_result(
        state
            .builder
            .toggle_container_visibility(&key, editor.as_deref())
            .await,
    )
}

#[delete("/editors/containers/{container}")]
pub async fn delete_container(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let key = match record_key(&path, state.shape(), &state.default_locale) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let editor = current_editor(&req);

    json_result(state.builder.delete_container(&key, editor.as_deref()).await)
}

#[post("/editors/containers/{container}/rename")]
pub async fn rename_container(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    form: web::Json<RenameForm>,
) -> impl Responder {
    let key = match record_key(&path, state.shape(), &state.default_locale) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let editor = current_editor(&req);

    json_result(
        state
            .builder
            .rename_container(&key, &form.display_name, editor.as_deref())
            .await,
    )
}

#[post("/editors/containers/{container}/share")]
pub async fn share_container(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let key = match record_key(&path, state.shape(), &state.default_locale) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let editor = current_editor(&req);

    json_result(state.builder.mark_container_shared(&key, editor.as_deref()).await)
}

#[post("/editors/{page}/compact")]
pub async fn compact_containers(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let page = match page_key(&path, state.shape(), &state.default_locale) {
        Ok(key) => key,
        Err(resp) => return resp,
    };

    json_result(state.builder.compact_display_orders(&page).await)
}

#[get("/editors/shared/{locale}")]
pub async fn list_shared(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    json_result(state.builder.list_shared_containers(&path).await)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Literal segments first so they win over `{page}`.
    cfg.service(reorder_containers)
        .service(move_container)
        .service(toggle_visibility)
        .service(delete_container)
        .service(rename_container)
        .service(share_container)
        .service(list_shared)
        .service(list_containers)
        .service(add_container)
        .service(compact_containers);
}
