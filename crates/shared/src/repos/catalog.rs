use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};

use super::{Store, StoreError};
use crate::catalog::{
    BudgetPredicate, CatalogError, CatalogFuture, SearchPredicates, TimeWindow, TourCatalog,
    TourRecord,
};

/// One row per tour/departure pair, with at most one active promotion
/// folded in via the left joins. Promotion rows are active only while
/// the departure date falls inside the promotion window.
const SEARCH_SELECT: &str = "\
    SELECT
        t.tour_id, t.title, t.duration, t.departure_location, t.destination,
        t.region, t.itinerary, t.max_participants,
        d.start_date, d.price_adult, d.price_child_120_140, d.price_child_100_120,
        p.promotion_id, p.name AS promotion_name, p.type AS promotion_type,
        p.discount AS promotion_discount
    FROM tour t
    JOIN departure d ON d.tour_id = t.tour_id
    LEFT JOIN tour_promotion tp ON tp.tour_id = t.tour_id
    LEFT JOIN promotion p
        ON p.promotion_id = tp.promotion_id
        AND p.status = 'active'
        AND d.start_date BETWEEN p.start_date AND p.end_date
    WHERE t.availability = TRUE
        AND d.availability = TRUE";

/// The by-id path has no departure in hand yet, so the promotion window
/// is anchored to the query date instead of a departure date. Disabled
/// tours never resolve, not even by direct id.
const TOUR_BY_ID_SELECT: &str = "\
    SELECT
        t.tour_id, t.title, t.duration, t.departure_location, t.destination,
        t.region, t.itinerary, t.max_participants,
        d.start_date, d.price_adult, d.price_child_120_140, d.price_child_100_120,
        p.promotion_id, p.name AS promotion_name, p.type AS promotion_type,
        p.discount AS promotion_discount
    FROM tour t
    LEFT JOIN departure d
        ON d.tour_id = t.tour_id
        AND d.availability = TRUE
        AND d.start_date >= CURRENT_DATE
    LEFT JOIN tour_promotion tp ON tp.tour_id = t.tour_id
    LEFT JOIN promotion p
        ON p.promotion_id = tp.promotion_id
        AND p.status = 'active'
        AND CURRENT_DATE BETWEEN p.start_date AND p.end_date
    WHERE t.tour_id = $1
        AND t.availability = TRUE
    ORDER BY d.start_date ASC NULLS LAST
    LIMIT 1";

impl Store {
    async fn query_tours(&self, predicates: &SearchPredicates) -> Result<Vec<TourRecord>, StoreError> {
        let mut builder = search_query(predicates);

        let rows = builder.build().fetch_all(&self.pool).await?;
        let records = rows
            .into_iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(dedupe_departures(records))
    }

    async fn query_tour_by_id(&self, tour_id: i64) -> Result<Option<TourRecord>, StoreError> {
        let row = sqlx::query(TOUR_BY_ID_SELECT)
            .bind(tour_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(record_from_row).transpose().map_err(Into::into)
    }

    async fn query_available_locations(&self) -> Result<Vec<String>, StoreError> {
        let locations: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT unnest(destination) AS location
             FROM tour
             WHERE availability = TRUE
             ORDER BY location",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(locations)
    }
}

/// Appends one SQL predicate per populated filter field. Destinations
/// use array overlap against the normalized vocabulary values; the one
/// fuzzy match is duration, which is free text on both sides.
fn search_query(predicates: &SearchPredicates) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SEARCH_SELECT);

    if let Some(region) = predicates.region {
        builder.push(" AND t.region = ").push_bind(region);
    }

    if !predicates.destinations.is_empty() {
        builder
            .push(" AND t.destination && ")
            .push_bind(predicates.destinations.clone());
    }

    if let Some(fragment) = &predicates.duration_fragment {
        builder
            .push(" AND t.duration ILIKE ")
            .push_bind(format!("%{fragment}%"));
    }

    if !predicates.time_windows.is_empty() {
        builder.push(" AND (");
        for (index, window) in predicates.time_windows.iter().enumerate() {
            if index > 0 {
                builder.push(" OR ");
            }
            match window {
                TimeWindow::Departure { departure_date } => {
                    builder.push("d.start_date = ").push_bind(*departure_date);
                }
                TimeWindow::Range {
                    start_date,
                    end_date,
                } => {
                    builder
                        .push("d.start_date BETWEEN ")
                        .push_bind(*start_date)
                        .push(" AND ")
                        .push_bind(*end_date);
                }
            }
        }
        builder.push(")");
    }

    match predicates.budget {
        Some(BudgetPredicate::Ceiling(ceiling)) => {
            builder.push(" AND d.price_adult <= ").push_bind(ceiling);
        }
        Some(BudgetPredicate::Range(min, max)) => {
            builder
                .push(" AND d.price_adult BETWEEN ")
                .push_bind(min)
                .push(" AND ")
                .push_bind(max);
        }
        None => {}
    }

    if let Some(min_party_size) = predicates.min_party_size {
        builder
            .push(" AND t.max_participants >= ")
            .push_bind(min_party_size);
    }

    builder.push(" ORDER BY d.start_date ASC, t.title ASC");
    builder
}

impl TourCatalog for Store {
    fn search_tours<'a>(
        &'a self,
        predicates: &'a SearchPredicates,
    ) -> CatalogFuture<'a, Vec<TourRecord>> {
        Box::pin(async move {
            self.query_tours(predicates)
                .await
                .map_err(|err| CatalogError::Backend(err.to_string()))
        })
    }

    fn tour_by_id(&self, tour_id: i64) -> CatalogFuture<'_, Option<TourRecord>> {
        Box::pin(async move {
            self.query_tour_by_id(tour_id)
                .await
                .map_err(|err| CatalogError::Backend(err.to_string()))
        })
    }

    fn available_locations(&self) -> CatalogFuture<'_, Vec<String>> {
        Box::pin(async move {
            self.query_available_locations()
                .await
                .map_err(|err| CatalogError::Backend(err.to_string()))
        })
    }
}

fn record_from_row(row: PgRow) -> Result<TourRecord, sqlx::Error> {
    Ok(TourRecord {
        tour_id: row.try_get("tour_id")?,
        title: row.try_get("title")?,
        duration: row.try_get("duration")?,
        departure_location: row.try_get("departure_location")?,
        destination: row.try_get("destination")?,
        region: row.try_get("region")?,
        itinerary: row.try_get("itinerary")?,
        max_participants: row.try_get("max_participants")?,
        start_date: row.try_get("start_date")?,
        price_adult: row.try_get("price_adult")?,
        price_child_120_140: row.try_get("price_child_120_140")?,
        price_child_100_120: row.try_get("price_child_100_120")?,
        promotion_id: row.try_get("promotion_id")?,
        promotion_name: row.try_get("promotion_name")?,
        promotion_type: row.try_get("promotion_type")?,
        promotion_discount: row.try_get("promotion_discount")?,
    })
}

/// A tour with overlapping promotion windows would otherwise repeat per
/// joined promotion row; the first row per tour/departure wins.
fn dedupe_departures(records: Vec<TourRecord>) -> Vec<TourRecord> {
    let mut deduped: Vec<TourRecord> = Vec::with_capacity(records.len());
    for record in records {
        let duplicate = deduped
            .last()
            .is_some_and(|kept| kept.tour_id == record.tour_id && kept.start_date == record.start_date);
        if !duplicate {
            deduped.push(record);
        }
    }
    deduped
}

#[cfg(test)]
mod tests {
    use super::{TOUR_BY_ID_SELECT, dedupe_departures, search_query};
    use crate::catalog::{SearchPredicates, TourRecord};

    fn record(tour_id: i64, day: u32, promotion_id: Option<i64>) -> TourRecord {
        TourRecord {
            tour_id,
            title: format!("Tour {tour_id}"),
            duration: None,
            departure_location: None,
            destination: Vec::new(),
            region: None,
            itinerary: None,
            max_participants: None,
            start_date: chrono::NaiveDate::from_ymd_opt(2025, 7, day),
            price_adult: None,
            price_child_120_140: None,
            price_child_100_120: None,
            promotion_id,
            promotion_name: promotion_id.map(|id| format!("KM {id}")),
            promotion_type: None,
            promotion_discount: None,
        }
    }

    #[test]
    fn overlapping_promotions_keep_the_first_row_per_departure() {
        let deduped = dedupe_departures(vec![
            record(1, 10, Some(1)),
            record(1, 10, Some(2)),
            record(1, 12, Some(1)),
            record(2, 10, None),
        ]);

        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped[0].promotion_id, Some(1));
        assert_eq!(deduped[1].start_date, chrono::NaiveDate::from_ymd_opt(2025, 7, 12));
        assert_eq!(deduped[2].tour_id, 2);
    }

    #[test]
    fn destinations_filter_by_array_overlap_not_substring() {
        let predicates = SearchPredicates {
            destinations: vec!["Đà Nẵng".to_string(), "Huế".to_string()],
            ..SearchPredicates::default()
        };

        let sql = search_query(&predicates).into_sql();
        assert!(sql.contains("t.destination && "));
        assert!(!sql.contains("dest ILIKE"));
    }

    #[test]
    fn by_id_promotion_window_is_anchored_to_the_query_date() {
        assert!(TOUR_BY_ID_SELECT.contains("CURRENT_DATE BETWEEN p.start_date AND p.end_date"));
    }

    #[test]
    fn by_id_lookup_excludes_disabled_tours() {
        assert!(TOUR_BY_ID_SELECT.contains("t.availability = TRUE"));
    }
}
