use serde::Serialize;

/// One item as read off a remote list page. Lives only for the duration of a
/// sync and is never persisted as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawRecord {
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub release_year: Option<i64>,
    pub genre: Option<String>,
    pub runtime_minutes: Option<i64>,
    pub director: Option<String>,
    pub source_rating: Option<f64>,
    pub external_rating: Option<f64>,
    pub image_url: Option<String>,
    pub source_link: Option<String>,
    pub personal_rating: Option<i64>,
}

impl RawRecord {
    pub fn natural_key(&self) -> Option<NaturalKey> {
        self.title.as_ref().map(|title| NaturalKey {
            title: title.clone(),
            release_year: self.release_year,
        })
    }
}

/// `(title, release_year)`; an unknown year is a value of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NaturalKey {
    pub title: String,
    pub release_year: Option<i64>,
}

impl NaturalKey {
    pub fn new<S: Into<String>>(title: S, release_year: Option<i64>) -> Self {
        NaturalKey {
            title: title.into(),
            release_year,
        }
    }
}

/// A record whose title is known, ready to be merged into the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedRecord {
    pub key: NaturalKey,
    pub record: RawRecord,
}

impl KeyedRecord {
    pub fn from_raw(record: RawRecord) -> Option<Self> {
        record.natural_key().map(|key| KeyedRecord { key, record })
    }
}
