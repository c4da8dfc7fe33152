use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

use super::extract::{EntityFilter, PartySize};
use crate::catalog::{BudgetPredicate, SearchPredicates, TourCatalog, TourRecord};

/// Display-ready projection of a catalog row: promotion folded into one
/// optional annotation, itinerary flattened to ordered text.
#[derive(Debug, Clone, PartialEq)]
pub struct TourSummary {
    pub tour_id: i64,
    pub title: String,
    pub duration: Option<String>,
    pub destination: Vec<String>,
    pub departure_date: Option<NaiveDate>,
    pub price_adult: Option<f64>,
    pub price_child_120_140: Option<f64>,
    pub price_child_100_120: Option<f64>,
    pub promotion: Option<PromotionSummary>,
    pub itinerary: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromotionSummary {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub discount: f64,
}

/// Executes the search branch for one extracted filter. An empty filter
/// short-circuits to an empty result set, and a catalog failure degrades
/// to the same: the orchestrator never sees an error from this path.
pub async fn search_tours(catalog: &dyn TourCatalog, filter: &EntityFilter) -> Vec<TourSummary> {
    if filter.is_empty() {
        return Vec::new();
    }

    let predicates = build_predicates(filter);
    match catalog.search_tours(&predicates).await {
        Ok(records) => records.into_iter().map(summarize_record).collect(),
        Err(err) => {
            warn!("catalog search failed, degrading to empty results: {err}");
            Vec::new()
        }
    }
}

/// Normalizes the extracted filter into catalog predicates. Unparseable
/// budget strings are dropped (logged, not fatal); a party-size floor is
/// only applied when it exceeds one.
pub fn build_predicates(filter: &EntityFilter) -> SearchPredicates {
    let budget = filter.budget.as_deref().and_then(|raw| {
        let parsed = parse_budget(raw);
        if parsed.is_none() {
            warn!("could not parse budget, ignoring: {raw}");
        }
        parsed
    });

    SearchPredicates {
        region: filter.region,
        destinations: filter
            .destination
            .as_ref()
            .map(|destination| destination.as_slice().to_vec())
            .unwrap_or_default(),
        duration_fragment: filter.duration.clone(),
        time_windows: filter
            .time
            .as_ref()
            .map(|time| time.as_slice().to_vec())
            .unwrap_or_default(),
        budget,
        min_party_size: filter.number_of_people.as_ref().and_then(party_size_floor),
    }
}

/// "5000000" is a ceiling, "3000000-5000000" an inclusive range.
pub fn parse_budget(raw: &str) -> Option<BudgetPredicate> {
    let raw = raw.trim();
    if let Some((low, high)) = raw.split_once('-') {
        let min = low.trim().parse::<f64>().ok()?;
        let max = high.trim().parse::<f64>().ok()?;
        return Some(BudgetPredicate::Range(min, max));
    }

    raw.parse::<f64>().ok().map(BudgetPredicate::Ceiling)
}

/// Minimum-capacity floor from the textual party-size forms: ">2" means
/// at least 3, "2-5" takes the lower bound, a plain integer stands as is.
/// Floors of one or less carry no constraint.
pub fn party_size_floor(party: &PartySize) -> Option<i32> {
    let floor = match party {
        PartySize::Count(count) => i32::try_from(*count).ok()?,
        PartySize::Text(text) => {
            let text = text.trim();
            if let Some(rest) = text.strip_prefix('>') {
                rest.trim().parse::<i32>().ok()?.checked_add(1)?
            } else if let Some((low, _)) = text.split_once('-') {
                low.trim().parse::<i32>().ok()?
            } else {
                text.parse::<i32>().ok()?
            }
        }
    };

    (floor > 1).then_some(floor)
}

/// Projects a raw catalog row to its display shape, flattening a
/// day-entry itinerary array into stripped-HTML ordered text.
pub fn summarize_record(record: TourRecord) -> TourSummary {
    let promotion = match (record.promotion_id, record.promotion_name) {
        (Some(id), Some(name)) => Some(PromotionSummary {
            id,
            name,
            kind: record.promotion_type.unwrap_or_else(|| "amount".to_string()),
            discount: record.promotion_discount.unwrap_or(0.0),
        }),
        _ => None,
    };

    TourSummary {
        tour_id: record.tour_id,
        title: record.title,
        duration: record.duration,
        destination: record.destination,
        departure_date: record.start_date,
        price_adult: record.price_adult,
        price_child_120_140: record.price_child_120_140,
        price_child_100_120: record.price_child_100_120,
        promotion,
        itinerary: record.itinerary.and_then(flatten_itinerary),
    }
}

fn flatten_itinerary(value: Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        }
        Value::Array(entries) => {
            let mut days: Vec<&Value> = entries.iter().collect();
            days.sort_by_key(|day| day.get("day_number").and_then(Value::as_i64).unwrap_or(0));

            let mut flattened = String::new();
            for day in days {
                let number = day
                    .get("day_number")
                    .and_then(Value::as_i64)
                    .map(|n| n.to_string())
                    .unwrap_or_default();
                let title = day.get("title").and_then(Value::as_str).unwrap_or_default();
                let description = day
                    .get("description")
                    .and_then(Value::as_str)
                    .map(strip_html)
                    .unwrap_or_default();
                flattened.push_str(&format!("Ngày {number}: {title}\n{description}\n\n"));
            }

            let trimmed = flattened.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        }
        _ => None,
    }
}

/// Drops tags, decodes the common entities, and collapses whitespace.
/// Descriptions carry simple presentation markup only.
fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{build_predicates, parse_budget, party_size_floor, search_tours, summarize_record};
    use crate::catalog::{
        BudgetPredicate, CatalogError, CatalogFuture, SearchPredicates, TourCatalog, TourRecord,
    };
    use crate::dialogue::extract::{EntityFilter, PartySize, parse_entity_filter};

    struct FailingCatalog;

    impl TourCatalog for FailingCatalog {
        fn search_tours<'a>(
            &'a self,
            _predicates: &'a SearchPredicates,
        ) -> CatalogFuture<'a, Vec<TourRecord>> {
            Box::pin(async { Err(CatalogError::Backend("connection refused".to_string())) })
        }

        fn tour_by_id(&self, _tour_id: i64) -> CatalogFuture<'_, Option<TourRecord>> {
            Box::pin(async { Err(CatalogError::Backend("connection refused".to_string())) })
        }

        fn available_locations(&self) -> CatalogFuture<'_, Vec<String>> {
            Box::pin(async { Err(CatalogError::Backend("connection refused".to_string())) })
        }
    }

    fn record_with_itinerary(itinerary: serde_json::Value) -> TourRecord {
        TourRecord {
            tour_id: 7,
            title: "Đà Nẵng 3N2Đ".to_string(),
            duration: Some("3 ngày 2 đêm".to_string()),
            departure_location: None,
            destination: vec!["Đà Nẵng".to_string()],
            region: Some(2),
            itinerary: Some(itinerary),
            max_participants: Some(30),
            start_date: None,
            price_adult: Some(4_500_000.0),
            price_child_120_140: None,
            price_child_100_120: None,
            promotion_id: None,
            promotion_name: None,
            promotion_type: None,
            promotion_discount: None,
        }
    }

    #[test]
    fn budget_range_parses_inclusively() {
        assert_eq!(
            parse_budget("3000000-5000000"),
            Some(BudgetPredicate::Range(3_000_000.0, 5_000_000.0))
        );
    }

    #[test]
    fn budget_single_value_is_a_ceiling() {
        assert_eq!(
            parse_budget("5000000"),
            Some(BudgetPredicate::Ceiling(5_000_000.0))
        );
    }

    #[test]
    fn non_numeric_budget_is_ignored_without_raising() {
        assert_eq!(parse_budget("khoảng năm triệu"), None);

        let filter = parse_entity_filter(r#"{"budget": "khoảng năm triệu"}"#).expect("parses");
        let predicates = build_predicates(&filter);
        assert!(predicates.budget.is_none());
    }

    #[test]
    fn party_size_open_bound_floors_one_above() {
        assert_eq!(party_size_floor(&PartySize::Text(">2".to_string())), Some(3));
    }

    #[test]
    fn party_size_range_uses_the_lower_bound() {
        assert_eq!(
            party_size_floor(&PartySize::Text("2-5".to_string())),
            Some(2)
        );
    }

    #[test]
    fn party_size_of_one_applies_no_floor() {
        assert_eq!(party_size_floor(&PartySize::Count(1)), None);
        assert_eq!(party_size_floor(&PartySize::Text("1".to_string())), None);
    }

    #[test]
    fn empty_filter_builds_empty_predicates() {
        let predicates = build_predicates(&EntityFilter::default());
        assert!(predicates.is_empty());
    }

    #[test]
    fn day_entry_itinerary_flattens_to_ordered_stripped_text() {
        let summary = summarize_record(record_with_itinerary(json!([
            {
                "day_number": 2,
                "title": "Bà Nà Hills",
                "description": "<p>Tham quan <b>Cầu Vàng</b> &amp; vườn hoa</p>"
            },
            {
                "day_number": 1,
                "title": "Ngũ Hành Sơn",
                "description": "<div>Leo núi buổi sáng</div>"
            }
        ])));

        let itinerary = summary.itinerary.expect("itinerary should flatten");
        let first = itinerary.find("Ngày 1").expect("day 1 present");
        let second = itinerary.find("Ngày 2").expect("day 2 present");
        assert!(first < second, "days must be ordered by day_number");
        assert!(itinerary.contains("Tham quan Cầu Vàng & vườn hoa"));
        assert!(!itinerary.contains('<'));
    }

    #[test]
    fn already_flat_itinerary_passes_through() {
        let summary =
            summarize_record(record_with_itinerary(json!("Ngày 1: tự do khám phá")));
        assert_eq!(summary.itinerary.as_deref(), Some("Ngày 1: tự do khám phá"));
    }

    #[tokio::test]
    async fn backend_failure_degrades_to_empty_results() {
        let filter = parse_entity_filter(r#"{"destination": ["Đà Nẵng"]}"#).expect("parses");
        let results = search_tours(&FailingCatalog, &filter).await;
        assert!(results.is_empty());
    }

    #[test]
    fn scenario_filter_produces_expected_predicates() {
        let filter = parse_entity_filter(
            r#"{"destination": ["Đà Nẵng"], "budget": "5000000", "number_of_people": 2}"#,
        )
        .expect("parses");

        let predicates = build_predicates(&filter);
        assert_eq!(predicates.destinations, vec!["Đà Nẵng".to_string()]);
        assert_eq!(predicates.budget, Some(BudgetPredicate::Ceiling(5_000_000.0)));
        assert_eq!(predicates.min_party_size, Some(2));
    }
}
