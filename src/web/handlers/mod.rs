pub mod editor;
pub mod pages;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    editor::configure(cfg);
    pages::configure(cfg);
}
