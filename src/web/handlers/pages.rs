use actix_web::{post, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use pagebuilder::models::PageCreate;

use crate::web::helpers::{current_editor, error_response, page_key, record_key};
use crate::web::state::AppState;

#[derive(Deserialize)]
pub struct SaveVersionForm {
    pub version_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LocalizeForm {
    pub locale: String,
}

#[derive(Deserialize)]
pub struct FromTemplateForm {
    pub title: String,
    #[serde(default)]
    pub slug: String,
    pub category_id: Option<i64>,
    pub locale: Option<String>,
}

#[post("/pages/{page}/versions")]
pub async fn save_new_version(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    form: web::Json<SaveVersionForm>,
) -> impl Responder {
    let page = match page_key(&path, state.shape(), &state.default_locale) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let editor = current_editor(&req);

    match state
        .builder
        .save_new_version(&page, form.version_name.as_deref(), editor.as_deref())
        .await
    {
        Ok(saved) => HttpResponse::Created().json(saved),
        Err(e) => error_response(&e),
    }
}

#[post("/pages/{page}/localize")]
pub async fn localize_page(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    form: web::Json<LocalizeForm>,
) -> impl Responder {
    let page = match page_key(&path, state.shape(), &state.default_locale) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let editor = current_editor(&req);

    match state
        .builder
        .localize_page(&page, form.locale.trim(), editor.as_deref())
        .await
    {
        Ok(localized) => HttpResponse::Created().json(localized),
        Err(e) => error_response(&e),
    }
}

#[post("/templates/{template}/pages")]
pub async fn create_page_from_template(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    form: web::Json<FromTemplateForm>,
) -> impl Responder {
    let template = match record_key(&path, state.shape(), &state.default_locale) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let editor = current_editor(&req);
    let form = form.into_inner();

    let data = PageCreate {
        title: form.title,
        slug: form.slug,
        category_id: form.category_id,
        locale: form.locale.unwrap_or_else(|| template.locale.clone()),
    };

    match state
        .builder
        .create_page_from_template(&data, &template, editor.as_deref())
        .await
    {
        Ok(page) => HttpResponse::Created().json(page),
        Err(e) => error_response(&e),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(save_new_version)
        .service(localize_page)
        .service(create_page_from_template);
}
