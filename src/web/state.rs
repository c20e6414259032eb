use pagebuilder::models::KeyShape;
use pagebuilder::services::PageBuilder;

#[derive(Clone)]
pub struct AppState {
    pub builder: PageBuilder,
    /// Locale used when a request does not name one.
    pub default_locale: String,
}

impl AppState {
    pub fn shape(&self) -> KeyShape {
        self.builder.shape()
    }
}
