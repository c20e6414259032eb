use serde::{Deserialize, Serialize};

use std::fmt;

use crate::common::PageBuilderError;

pub const KEY_SEPARATOR: char = '_';

/// Version marker under which template containers are stored.
pub const TEMPLATE_VERSION: &str = "tpl";

/// Whether composite keys carry a trailing locale segment.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyShape {
    pub localized: bool,
}

impl KeyShape {
    pub const PLAIN: Self = Self { localized: false };
    pub const LOCALIZED: Self = Self { localized: true };
}

/// Identifies one page row: `id_version` or `id_version_locale`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PageKey {
    pub id: i64,
    pub version: String,
    pub locale: String,
}

/// Identifies a locale-scoped record (container, category, template,
/// demo container): `id` or `id_locale`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub id: i64,
    pub locale: String,
}

/// The (page, version, locale) tuple that bounds one container ordering.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub page_id: i64,
    pub page_version: String,
    pub locale: String,
}

impl PageKey {
    /// Builds a key, rejecting version tokens that would break slug decoding.
    pub fn new(
        id: i64,
        version: impl Into<String>,
        locale: impl Into<String>,
    ) -> Result<Self, PageBuilderError> {
        let version = version.into();
        check_version_token(&version)?;

        Ok(Self {
            id,
            version,
            locale: locale.into(),
        })
    }

    pub fn encode(&self, shape: KeyShape) -> String {
        if shape.localized {
            format!("{}_{}_{}", self.id, self.version, self.locale)
        } else {
            format!("{}_{}", self.id, self.version)
        }
    }

    pub fn decode(slug: &str, shape: KeyShape) -> Result<Self, PageBuilderError> {
        let segs = split_segments(slug, if shape.localized { 3 } else { 2 })?;

        Ok(Self {
            id: parse_id(slug, segs[0])?,
            version: segs[1].to_string(),
            locale: segs.get(2).map(|s| s.to_string()).unwrap_or_default(),
        })
    }

    pub fn scope(&self) -> Scope {
        Scope {
            page_id: self.id,
            page_version: self.version.clone(),
            locale: self.locale.clone(),
        }
    }

    /// Segments used for permission resource names.
    pub fn resource_name(&self, shape: KeyShape) -> Vec<String> {
        let mut rn = vec!["pages".to_string(), self.id.to_string(), self.version.clone()];
        if shape.localized {
            rn.push(self.locale.clone());
        }
        rn
    }
}

impl RecordKey {
    pub fn new(id: i64, locale: impl Into<String>) -> Self {
        Self {
            id,
            locale: locale.into(),
        }
    }

    pub fn encode(&self, shape: KeyShape) -> String {
        if shape.localized {
            format!("{}_{}", self.id, self.locale)
        } else {
            self.id.to_string()
        }
    }

    pub fn decode(slug: &str, shape: KeyShape) -> Result<Self, PageBuilderError> {
        let segs = split_segments(slug, if shape.localized { 2 } else { 1 })?;

        Ok(Self {
            id: parse_id(slug, segs[0])?,
            locale: segs.get(1).map(|s| s.to_string()).unwrap_or_default(),
        })
    }
}

impl Scope {
    pub fn new(page_id: i64, page_version: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            page_id,
            page_version: page_version.into(),
            locale: locale.into(),
        }
    }

    pub fn template(template_id: i64, locale: impl Into<String>) -> Self {
        Self::new(template_id, TEMPLATE_VERSION, locale)
    }

    pub fn is_template(&self) -> bool {
        self.page_version == TEMPLATE_VERSION
    }

    /// Name of the advisory lock that serializes structural edits of this scope.
    pub fn lock_name(&self) -> String {
        format!(
            "page_builder_containers:{}:{}:{}",
            self.page_id, self.page_version, self.locale
        )
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page {} version {} locale {:?}",
            self.page_id, self.page_version, self.locale
        )
    }
}

pub fn check_version_token(version: &str) -> Result<(), PageBuilderError> {
    if version.is_empty() {
        return Err(PageBuilderError::InvalidArgument(
            "version token is empty".into(),
        ));
    }
    if version.contains(KEY_SEPARATOR) {
        return Err(PageBuilderError::InvalidArgument(format!(
            "version token {:?} contains '{}'",
            version, KEY_SEPARATOR
        )));
    }
    Ok(())
}

fn split_segments(slug: &str, expected: usize) -> Result<Vec<&str>, PageBuilderError> {
    let segs: Vec<&str> = slug.split(KEY_SEPARATOR).collect();

    if segs.len() != expected {
        return Err(PageBuilderError::InvalidArgument(format!(
            "slug {:?} has {} segments, expected {}",
            slug,
            segs.len(),
            expected
        )));
    }

    if segs.iter().any(|s| s.is_empty()) {
        return Err(PageBuilderError::InvalidArgument(format!(
            "slug {:?} has an empty segment",
            slug
        )));
    }

    Ok(segs)
}

fn parse_id(slug: &str, raw: &str) -> Result<i64, PageBuilderError> {
    raw.parse::<i64>().map_err(|_| {
        PageBuilderError::InvalidArgument(format!("slug {:?} has a non-numeric id", slug))
    })
}
