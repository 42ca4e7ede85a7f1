use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Place type reported by the location directory. Only countries are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationKind {
    Country,
    Other,
}

impl LocationKind {
    /// The provider spells countries exactly `"Country"`; anything else is `Other`.
    pub fn from_provider(raw: &str) -> Self {
        if raw == "Country" {
            Self::Country
        } else {
            Self::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Country => "Country",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Opaque provider id (`place_id`); may be a large signed number rendered as text.
    pub id: String,
    pub name: String,
    pub kind: LocationKind,
}

/// One trending topic for a location. Unique per (`name`, `location_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendRecord {
    pub name: String,
    pub position: i32,
    pub description: String,
    pub domain_context: String,
    pub url: String,
    pub impression_id: String,
    pub related_terms: Vec<String>,
    pub location_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashflagRecord {
    pub hashtag: String,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub asset_url: Option<String>,
    pub hashfetti_enabled: bool,
}

/// One general-web-trends response unit plus its keywords. Append-only history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoTrendRecord {
    pub success: bool,
    pub message: String,
    pub country: String,
    pub last_update: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    pub keywords: Vec<String>,
}

/// Ids produced by one parent+children geo-trend insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GeoBatchInsert {
    pub batch_id: i64,
    pub keywords_inserted: u64,
}
