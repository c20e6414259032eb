use actix_web::{HttpRequest, HttpResponse};
use serde::Serialize;

use pagebuilder::common::PageBuilderError;
use pagebuilder::models::{KeyShape, PageKey, RecordKey};

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn error_response(e: &PageBuilderError) -> HttpResponse {
    let body = ErrorBody {
        error: e.to_string(),
    };

    match e {
        PageBuilderError::InvalidArgument(_) => HttpResponse::BadRequest().json(body),
        PageBuilderError::NotFound(_) => HttpResponse::NotFound().json(body),
        PageBuilderError::Precondition(_) => HttpResponse::Forbidden().json(body),
        PageBuilderError::Conflict(_) => HttpResponse::Conflict().json(body),
        // Details already went to the log and error_logs.
        PageBuilderError::Storage(_) => HttpResponse::InternalServerError().json(ErrorBody {
            error: "storage failure".to_string(),
        }),
    }
}

pub fn json_result<T: Serialize>(result: Result<T, PageBuilderError>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(e) => error_response(&e),
    }
}

/// Decodes a page slug, filling in the default locale for plain keys.
pub fn page_key(slug: &str, shape: KeyShape, default_locale: &str) -> Result<PageKey, HttpResponse> {
    let mut key = PageKey::decode(slug, shape).map_err(|e| error_response(&e))?;
    if !shape.localized {
        key.locale = default_locale.to_string();
    }
    Ok(key)
}

pub fn record_key(slug: &str, shape: KeyShape, default_locale: &str) -> Result<RecordKey, HttpResponse> {
    let mut key = RecordKey::decode(slug, shape).map_err(|e| error_response(&e))?;
    if !shape.localized {
        key.locale = default_locale.to_string();
    }
    Ok(key)
}

/// Editor identity recorded on activity entries, when the caller supplies one.
pub fn current_editor(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("X-Page-Builder-User")
        .or_else(|| req.headers().get("X-User-Id"))
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
