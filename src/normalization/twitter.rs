use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use super::path::{
    array_or_empty, as_i64_lenient, bool_or_default, lookup, lookup_any, scalar_string,
    str_or_default,
};
use super::Normalized;
use crate::models::{HashflagRecord, LocationKind, LocationRecord, TrendRecord};
use crate::providers::ProviderError;

const TRENDING_SUFFIX: &str = " . Trending";

/// Where the trend timeline tucks per-trend metadata (position, impression id, related terms).
const TREND_METADATA: &[&str] = &[
    "clientEventInfo",
    "details",
    "guideDetails",
    "transparentGuideDetails",
    "trendMetadata",
];

/// Drop one trailing `" . Trending"`; strings without it pass through unchanged.
pub fn strip_trending_suffix(domain_context: &str) -> &str {
    domain_context
        .strip_suffix(TRENDING_SUFFIX)
        .unwrap_or(domain_context)
}

fn top_level_array<'a>(raw: &'a Value, what: &str) -> Result<&'a [Value], ProviderError> {
    raw.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| ProviderError::parse(format!("{what}: expected a JSON array")))
}

/// Location directory → countries only. Non-country places are excluded without counting
/// as drops; entries missing an id or name are dropped.
pub fn normalize_locations(raw: &Value) -> Result<Normalized<LocationRecord>, ProviderError> {
    let mut out = Normalized::default();
    for item in top_level_array(raw, "locations")? {
        let kind = lookup_any(
            item,
            &[
                &["placeType", "name"],
                &["place_type", "name"],
                &["placeType"],
                &["place_type"],
                &["type"],
            ],
        )
        .and_then(Value::as_str)
        .map(LocationKind::from_provider)
        .unwrap_or(LocationKind::Other);
        if kind != LocationKind::Country {
            continue;
        }

        let id = lookup_any(item, &[&["place_id"], &["woeid"]]).and_then(scalar_string);
        let name = str_or_default(item, &["name"]);
        match id {
            Some(id) if !name.trim().is_empty() => out.records.push(LocationRecord {
                id,
                name: name.trim().to_string(),
                kind,
            }),
            _ => {
                warn!(entry = %item, "dropping location without id or name");
                out.dropped += 1;
            }
        }
    }
    Ok(out)
}

/// Per-item metadata may sit on the trend itself or on the wrapping timeline item.
fn trend_meta<'a>(trend: &'a Value, item: &'a Value, field: &str) -> Option<&'a Value> {
    let on_item = lookup(item, &["item"]).and_then(|i| lookup(i, TREND_METADATA));
    lookup(trend, TREND_METADATA)
        .and_then(|meta| meta.get(field))
        .filter(|v| !v.is_null())
        .or_else(|| on_item.and_then(|meta| meta.get(field)))
}

/// Trend timeline for one location → trend records in timeline order.
///
/// Only the first `addEntries` instruction is read. A payload without a `timeline`
/// object is a parse failure; everything below it is optional.
pub fn normalize_trends(
    raw: &Value,
    location_id: &str,
) -> Result<Normalized<TrendRecord>, ProviderError> {
    let Some(timeline) = raw.get("timeline").filter(|t| t.is_object()) else {
        return Err(ProviderError::parse(format!(
            "trends for location {location_id}: missing timeline object"
        )));
    };

    let entries = array_or_empty(timeline, &["instructions"])
        .iter()
        .find(|instr| instr.get("addEntries").is_some())
        .map(|instr| array_or_empty(instr, &["addEntries", "entries"]))
        .unwrap_or(&[]);

    let mut out = Normalized::default();
    for entry in entries {
        for item in array_or_empty(entry, &["content", "timelineModule", "items"]) {
            let Some(trend) = lookup(item, &["item", "content", "trend"])
                .filter(|t| t.as_object().is_some_and(|o| !o.is_empty()))
            else {
                continue;
            };

            let name = str_or_default(trend, &["name"]);
            if name.trim().is_empty() {
                warn!(location_id, "dropping trend item without a name");
                out.dropped += 1;
                continue;
            }

            let position = trend_meta(trend, item, "position")
                .and_then(as_i64_lenient)
                .unwrap_or(0)
                .clamp(0, i32::MAX as i64) as i32;
            let impression_id = trend_meta(trend, item, "impressionId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let related_terms = trend_meta(trend, item, "relatedTerms")
                .and_then(Value::as_array)
                .map(|terms| {
                    terms
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            out.records.push(TrendRecord {
                name,
                position,
                description: str_or_default(trend, &["trendMetadata", "metaDescription"]),
                domain_context: strip_trending_suffix(&str_or_default(
                    trend,
                    &["trendMetadata", "domainContext"],
                ))
                .to_string(),
                url: str_or_default(trend, &["url", "url"]),
                impression_id,
                related_terms,
                location_id: location_id.to_string(),
            });
        }
    }
    debug!(location_id, trends = out.records.len(), dropped = out.dropped, "normalized trends");
    Ok(out)
}

fn millis_to_instant(v: Option<&Value>) -> Option<DateTime<Utc>> {
    v.and_then(as_i64_lenient)
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

/// Hashflag list → records. Start/end arrive as epoch milliseconds.
pub fn normalize_hashflags(raw: &Value) -> Result<Normalized<HashflagRecord>, ProviderError> {
    let mut out = Normalized::default();
    for item in top_level_array(raw, "hashflags")? {
        let hashtag = str_or_default(item, &["hashtag"]);
        let start = millis_to_instant(lookup(item, &["starting_timestamp_ms"]));
        let end = millis_to_instant(lookup(item, &["ending_timestamp_ms"]));
        let (false, Some(start_timestamp), Some(end_timestamp)) =
            (hashtag.trim().is_empty(), start, end)
        else {
            warn!(entry = %item, "dropping hashflag with missing hashtag or timestamps");
            out.dropped += 1;
            continue;
        };
        let asset_url = Some(str_or_default(item, &["asset_url"])).filter(|s| !s.is_empty());
        out.records.push(HashflagRecord {
            hashtag,
            start_timestamp,
            end_timestamp,
            asset_url,
            hashfetti_enabled: bool_or_default(item, &["is_hashfetti_enabled"]),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn timeline(items: Vec<Value>) -> Value {
        json!({
            "timeline": {
                "instructions": [
                    {"clearCache": {}},
                    {"addEntries": {"entries": [
                        {"content": {"timelineModule": {"items": items}}}
                    ]}}
                ]
            }
        })
    }

    fn full_item(name: &str, position: i64) -> Value {
        json!({
            "item": {
                "clientEventInfo": {"details": {"guideDetails": {"transparentGuideDetails": {
                    "trendMetadata": {"position": position}
                }}}},
                "content": {"trend": {
                    "name": name,
                    "url": {"url": format!("twitter://search?query={name}")},
                    "trendMetadata": {
                        "metaDescription": "12.3K posts",
                        "domainContext": "Sports . Trending"
                    },
                    "clientEventInfo": {"details": {"guideDetails": {"transparentGuideDetails": {
                        "trendMetadata": {
                            "impressionId": "imp-1",
                            "relatedTerms": ["second", "first"]
                        }
                    }}}}
                }}
            }
        })
    }

    #[test]
    fn trend_suffix_strip_is_idempotent() {
        let once = strip_trending_suffix("Politics . Trending");
        assert_eq!(once, "Politics");
        assert_eq!(strip_trending_suffix(once), once);
        assert_eq!(strip_trending_suffix("Trending in Kenya"), "Trending in Kenya");
        assert_eq!(strip_trending_suffix("Music . trending"), "Music . trending");
        assert_eq!(strip_trending_suffix("Music  . Trending"), "Music ");
    }

    #[test]
    fn extracts_nested_trend_fields() {
        let raw = timeline(vec![full_item("#Python", 3)]);
        let out = normalize_trends(&raw, "loc1").unwrap();
        assert_eq!(out.dropped, 0);
        let t = &out.records[0];
        assert_eq!(t.name, "#Python");
        assert_eq!(t.position, 3);
        assert_eq!(t.description, "12.3K posts");
        assert_eq!(t.domain_context, "Sports");
        assert_eq!(t.url, "twitter://search?query=#Python");
        assert_eq!(t.impression_id, "imp-1");
        assert_eq!(t.related_terms, vec!["second", "first"]);
        assert_eq!(t.location_id, "loc1");
    }

    #[test]
    fn missing_optional_fields_default() {
        let raw = timeline(vec![json!({"item": {"content": {"trend": {"name": "#Bare"}}}})]);
        let out = normalize_trends(&raw, "loc1").unwrap();
        let t = &out.records[0];
        assert_eq!(t.position, 0);
        assert!(t.related_terms.is_empty());
        assert_eq!(t.description, "");
        assert_eq!(t.domain_context, "");
        assert_eq!(t.url, "");
        assert_eq!(t.impression_id, "");
    }

    #[test]
    fn nameless_items_are_dropped_without_failing_siblings() {
        let raw = timeline(vec![
            json!({"item": {"content": {"trend": {"url": {"url": "x"}}}}}),
            full_item("#Kept", 1),
            json!({"item": {"content": {}}}),
        ]);
        let out = normalize_trends(&raw, "loc1").unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].name, "#Kept");
        assert_eq!(out.dropped, 1);
    }

    #[test]
    fn missing_add_entries_yields_no_trends() {
        let raw = json!({"timeline": {"instructions": [{"clearCache": {}}]}});
        assert!(normalize_trends(&raw, "loc1").unwrap().records.is_empty());
    }

    #[test]
    fn missing_timeline_is_parse_failure() {
        let err = normalize_trends(&json!({"errors": []}), "loc1").unwrap_err();
        assert_eq!(err.kind, crate::providers::FailureKind::Parse);
    }

    #[test]
    fn only_countries_are_kept() {
        let raw = json!([
            {"name": "Nairobi", "place_id": "1", "placeType": {"code": 7, "name": "Town"}},
            {"name": "Kenya", "place_id": "-7608764736147602991", "placeType": {"code": 12, "name": "Country"}},
            {"name": "Worldwide", "woeid": 1, "type": "Supername"},
            {"name": "Ghana", "woeid": 23424824, "type": "Country"},
            {"name": "", "place_id": "9", "type": "Country"}
        ]);
        let out = normalize_locations(&raw).unwrap();
        let ids: Vec<_> = out.records.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["-7608764736147602991", "23424824"]);
        assert!(out.records.iter().all(|l| l.kind == LocationKind::Country));
        assert_eq!(out.dropped, 1);
    }

    #[test]
    fn locations_must_be_an_array() {
        assert!(normalize_locations(&json!({"message": "quota"})).is_err());
    }

    #[test]
    fn hashflags_convert_millis_and_defaults() {
        let raw = json!([
            {"hashtag": "#Test", "starting_timestamp_ms": 1609459200000i64, "ending_timestamp_ms": 1609545600000i64},
            {"hashtag": "#Art", "starting_timestamp_ms": 1609459200000i64, "ending_timestamp_ms": 1609545600000i64,
             "asset_url": "https://abs.twimg.com/hashflags/a.png", "is_hashfetti_enabled": true},
            {"hashtag": "#NoEnd", "starting_timestamp_ms": 1609459200000i64}
        ]);
        let out = normalize_hashflags(&raw).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.dropped, 1);
        let first = &out.records[0];
        assert_eq!(first.start_timestamp.timestamp(), 1609459200);
        assert_eq!(first.end_timestamp.timestamp(), 1609545600);
        assert_eq!(first.asset_url, None);
        assert!(!first.hashfetti_enabled);
        assert!(out.records[1].hashfetti_enabled);
        assert!(out.records[1].asset_url.is_some());
    }
}
