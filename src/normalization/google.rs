use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

use super::path::{bool_or_default, lookup_any, str_or_default};
use super::Normalized;
use crate::models::GeoTrendRecord;
use crate::providers::ProviderError;

/// `lastUpdate` layout, e.g. `15-03-2024 , 10:30:00`. No offset; read as UTC.
const LAST_UPDATE_FORMAT: &str = "%d-%m-%Y , %H:%M:%S";

pub fn parse_last_update(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), LAST_UPDATE_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// ISO-8601 `scrapedAt`; a trailing `Z` is rewritten to `+00:00` before parsing.
pub fn parse_scraped_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let normalized = match raw.strip_suffix('Z') {
        Some(prefix) => format!("{prefix}+00:00"),
        None => raw.to_string(),
    };
    DateTime::parse_from_rfc3339(&normalized)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn blocks(raw: &Value) -> Result<&[Value], ProviderError> {
    if let Some(items) = raw.as_array() {
        return Ok(items);
    }
    if let Some(items) = raw.get("data").and_then(Value::as_array) {
        return Ok(items);
    }
    if raw.get("country").is_some() {
        return Ok(std::slice::from_ref(raw));
    }
    Err(ProviderError::parse(
        "google trends: expected an array of country blocks",
    ))
}

/// Keywords arrive either as plain strings or as objects with a `keyword`/`title`/`query` field.
fn keyword_of(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.as_str(),
        Value::Object(_) => lookup_any(v, &[&["keyword"], &["title"], &["query"]])?.as_str()?,
        _ => return None,
    };
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// General-web-trends payload → one batch per country block.
///
/// A block whose timestamps do not parse is dropped with a warning; the rest still load.
pub fn normalize_geo_trends(raw: &Value) -> Result<Normalized<GeoTrendRecord>, ProviderError> {
    let mut out = Normalized::default();
    for block in blocks(raw)? {
        let country = str_or_default(block, &["country"]);
        let last_update_raw = str_or_default(block, &["lastUpdate"]);
        let scraped_at_raw = str_or_default(block, &["scrapedAt"]);
        let last_update = parse_last_update(&last_update_raw);
        let scraped_at = parse_scraped_at(&scraped_at_raw);

        let (Some(last_update), Some(scraped_at)) = (last_update, scraped_at) else {
            warn!(
                country = %country,
                last_update = %last_update_raw,
                scraped_at = %scraped_at_raw,
                "dropping geo-trend block with unparsable timestamp"
            );
            out.dropped += 1;
            continue;
        };
        if country.trim().is_empty() {
            warn!("dropping geo-trend block without country");
            out.dropped += 1;
            continue;
        }

        let keywords = lookup_any(block, &[&["keywords"], &["trends"]])
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(keyword_of).collect())
            .unwrap_or_default();

        out.records.push(GeoTrendRecord {
            success: bool_or_default(block, &["success"]),
            message: str_or_default(block, &["message"]),
            country: country.trim().to_string(),
            last_update,
            scraped_at,
            keywords,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn last_update_parses_to_fixed_instant() {
        let a = parse_last_update("15-03-2024 , 10:30:00").unwrap();
        let b = parse_last_update("15-03-2024 , 10:30:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn scraped_at_z_and_offset_forms_agree() {
        let z = parse_scraped_at("2024-03-15T10:30:00Z").unwrap();
        let offset = parse_scraped_at("2024-03-15T10:30:00+00:00").unwrap();
        assert_eq!(z, offset);
        assert!(parse_scraped_at("2024-03-15T10:30:00.123Z").is_some());
    }

    #[test]
    fn rejects_malformed_timestamps() {
        assert!(parse_last_update("2024-03-15 10:30:00").is_none());
        assert!(parse_scraped_at("yesterday").is_none());
    }

    #[test]
    fn normalizes_blocks_and_drops_bad_timestamps() {
        let raw = json!([
            {
                "success": true, "message": "ok", "country": "Kenya",
                "keywords": ["Harambee Stars", {"keyword": "Safaricom"}, "", 3],
                "lastUpdate": "15-03-2024 , 10:30:00", "scrapedAt": "2024-03-15T10:31:00Z"
            },
            {
                "success": true, "message": "ok", "country": "Ghana",
                "keywords": ["Jollof"],
                "lastUpdate": "not a date", "scrapedAt": "2024-03-15T10:31:00Z"
            }
        ]);
        let out = normalize_geo_trends(&raw).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.dropped, 1);
        let kenya = &out.records[0];
        assert!(kenya.success);
        assert_eq!(kenya.country, "Kenya");
        assert_eq!(kenya.keywords, vec!["Harambee Stars", "Safaricom"]);
    }

    #[test]
    fn accepts_wrapped_and_single_block_shapes() {
        let block = json!({
            "country": "India", "keywords": [],
            "lastUpdate": "01-01-2025 , 00:00:00", "scrapedAt": "2025-01-01T00:00:05Z"
        });
        assert_eq!(normalize_geo_trends(&json!({"data": [block.clone()]})).unwrap().records.len(), 1);
        assert_eq!(normalize_geo_trends(&block).unwrap().records.len(), 1);
        assert!(normalize_geo_trends(&json!("nope")).is_err());
    }
}
