use chrono::{DateTime, NaiveDate, Utc};
use dataforseo_client::{GraphPoint, ResultItem, TrendsResult};

use crate::types::{normalize_keyword, RisingEntry, SeriesPoint};

/// Pull the interest-over-time series for one keyword out of a result.
///
/// Only graph items are considered; an item matches when its keyword list
/// is empty or contains the normalized target. Points without a usable
/// timestamp or value are dropped. Pure; malformed input yields an empty
/// series rather than an error.
pub fn extract_series(result: &TrendsResult, keyword: &str) -> Vec<SeriesPoint> {
    let target = normalize_keyword(keyword);
    let mut series = Vec::new();

    for item in &result.items {
        let (keywords, data) = match item {
            ResultItem::Graph { keywords, data } => (keywords, data),
            _ => continue,
        };

        let normalized: Vec<String> = keywords.iter().map(|k| normalize_keyword(k)).collect();
        if !normalized.is_empty() && !normalized.iter().any(|k| k == &target) {
            continue;
        }

        // Multi-keyword graphs carry one value per keyword; use the target's
        // column when the item pins it, else the first.
        let value_index = normalized.iter().position(|k| k == &target).unwrap_or(0);

        for point in data {
            let Some(timestamp) = point_timestamp(point) else {
                continue;
            };
            let Some(value) = point.values.get(value_index).copied().flatten() else {
                continue;
            };
            series.push(SeriesPoint { timestamp, value });
        }
    }

    series.sort_by_key(|p| p.timestamp);
    series
}

fn point_timestamp(point: &GraphPoint) -> Option<DateTime<Utc>> {
    if let Some(ts) = point.timestamp {
        if let Some(dt) = DateTime::from_timestamp(ts, 0) {
            return Some(dt);
        }
    }
    let date = point.date_from.as_deref()?;
    let naive = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(naive.and_hms_opt(0, 0, 0)?.and_utc())
}

/// Extract ranked rising query/topic candidates with their relative scores.
///
/// Queries contribute their query text, topics their title (falling back to
/// the topic type). Blank keywords are dropped; a missing value normalizes
/// to 0. Pure and tolerant of absent or malformed sections.
pub fn extract_rising(result: &TrendsResult) -> Vec<RisingEntry> {
    let mut entries = Vec::new();

    for item in &result.items {
        match item {
            ResultItem::Queries { rising, .. } => {
                for entry in rising {
                    let Some(query) = entry.query.as_deref() else {
                        continue;
                    };
                    push_entry(&mut entries, query, entry.value);
                }
            }
            ResultItem::Topics { rising, .. } => {
                for entry in rising {
                    let keyword = entry
                        .topic_title
                        .as_deref()
                        .filter(|t| !t.trim().is_empty())
                        .or(entry.topic_type.as_deref());
                    let Some(keyword) = keyword else {
                        continue;
                    };
                    push_entry(&mut entries, keyword, entry.value);
                }
            }
            _ => {}
        }
    }

    entries
}

fn push_entry(entries: &mut Vec<RisingEntry>, keyword: &str, value: Option<f64>) {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return;
    }
    entries.push(RisingEntry {
        keyword: keyword.to_string(),
        value: value.unwrap_or(0.0),
    });
}

/// Geo id of the top-ranked market in the result's map data, if any.
/// Used to correct the effective locale before expansion.
pub fn extract_top_market(result: &TrendsResult) -> Option<String> {
    let mut best: Option<(f64, String)> = None;

    for item in &result.items {
        let ResultItem::Map { data, .. } = item else {
            continue;
        };
        for point in data {
            let Some(geo_id) = point.geo_id.as_deref() else {
                continue;
            };
            let value = point.values.first().copied().flatten().unwrap_or(0.0);
            if best.as_ref().map(|(v, _)| value > *v).unwrap_or(true) {
                best = Some((value, geo_id.to_string()));
            }
        }
    }

    best.map(|(_, geo)| geo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result_from(value: serde_json::Value) -> TrendsResult {
        serde_json::from_value(value).unwrap()
    }

    fn graph_result() -> TrendsResult {
        result_from(json!({
            "keywords": ["agent crm"],
            "items": [{
                "type": "google_trends_graph",
                "keywords": ["agent crm"],
                "data": [
                    {"timestamp": 1755900000, "values": [40]},
                    {"timestamp": 1755600000, "values": [5]},
                    {"timestamp": 1755700000, "values": [null]},
                    {"values": [99]}
                ]
            }]
        }))
    }

    #[test]
    fn extracts_sorted_series_dropping_unusable_points() {
        let series = extract_series(&graph_result(), "Agent CRM");
        assert_eq!(series.len(), 2);
        assert!(series[0].timestamp < series[1].timestamp);
        assert_eq!(series[0].value, 5.0);
        assert_eq!(series[1].value, 40.0);
    }

    #[test]
    fn ignores_graphs_for_other_keywords() {
        let series = extract_series(&graph_result(), "other keyword");
        assert!(series.is_empty());
    }

    #[test]
    fn empty_keyword_list_matches_any_target() {
        let result = result_from(json!({
            "items": [{
                "type": "google_trends_graph",
                "data": [{"timestamp": 1755900000, "values": [12]}]
            }]
        }));
        let series = extract_series(&result, "anything");
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].value, 12.0);
    }

    #[test]
    fn multi_keyword_graph_uses_target_column() {
        let result = result_from(json!({
            "items": [{
                "type": "google_trends_graph",
                "keywords": ["first kw", "second kw"],
                "data": [{"timestamp": 1755900000, "values": [10, 77]}]
            }]
        }));
        let series = extract_series(&result, "second kw");
        assert_eq!(series[0].value, 77.0);
    }

    #[test]
    fn extract_series_is_idempotent() {
        let result = graph_result();
        assert_eq!(extract_series(&result, "agent crm"), extract_series(&result, "agent crm"));
    }

    fn rising_result() -> TrendsResult {
        result_from(json!({
            "items": [
                {
                    "type": "google_trends_queries_list",
                    "data": {
                        "rising": [
                            {"query": "ai crm tool", "value": 300},
                            {"query": "  ", "value": 10},
                            {"query": "cheap crm"}
                        ]
                    }
                },
                {
                    "type": "google_trends_topics_list",
                    "data": {
                        "rising": [
                            {"topic_title": "Customer relationship management", "topic_type": "Software", "value": 120},
                            {"topic_title": "", "topic_type": "Field of study", "value": 80}
                        ]
                    }
                }
            ]
        }))
    }

    #[test]
    fn rising_entries_from_queries_and_topics() {
        let result = rising_result();

        let entries = extract_rising(&result);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0], RisingEntry { keyword: "ai crm tool".into(), value: 300.0 });
        assert_eq!(entries[1].value, 0.0);
        assert_eq!(entries[2].keyword, "Customer relationship management");
        // blank title falls back to topic type
        assert_eq!(entries[3].keyword, "Field of study");
    }

    #[test]
    fn extract_rising_is_idempotent() {
        let result = rising_result();
        assert_eq!(extract_rising(&result), extract_rising(&result));
    }

    #[test]
    fn rising_is_empty_on_malformed_result() {
        let result = result_from(json!({"items": [{"type": "google_trends_queries_list", "data": 5}]}));
        assert!(extract_rising(&result).is_empty());
    }

    fn map_result() -> TrendsResult {
        result_from(json!({
            "items": [{
                "type": "google_trends_map",
                "data": [
                    {"geo_id": "GB", "geo_name": "United Kingdom", "values": [55]},
                    {"geo_id": "US", "geo_name": "United States", "values": [100]},
                    {"geo_name": "Nowhere", "values": [200]}
                ]
            }]
        }))
    }

    #[test]
    fn top_market_picks_highest_value() {
        let result = map_result();
        assert_eq!(extract_top_market(&result).as_deref(), Some("US"));
    }

    #[test]
    fn extract_top_market_is_idempotent() {
        let result = map_result();
        assert_eq!(extract_top_market(&result), extract_top_market(&result));
    }

    #[test]
    fn top_market_is_none_without_map_items() {
        let result = result_from(json!({"items": []}));
        assert_eq!(extract_top_market(&result), None);
    }
}
