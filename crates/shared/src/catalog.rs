use std::future::Future;
use std::pin::Pin;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub type CatalogFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, CatalogError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog backend error: {0}")]
    Backend(String),
}

/// A departure window the user asked about: either a single departure day
/// or an inclusive date range. The extractor may produce several; they
/// combine as alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeWindow {
    Departure {
        departure_date: NaiveDate,
    },
    Range {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetPredicate {
    Ceiling(f64),
    Range(f64, f64),
}

/// Normalized, catalog-facing search criteria. Built by the search
/// adapter from an extracted entity filter; every field already has its
/// textual forms resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPredicates {
    pub region: Option<i32>,
    pub destinations: Vec<String>,
    pub duration_fragment: Option<String>,
    pub time_windows: Vec<TimeWindow>,
    pub budget: Option<BudgetPredicate>,
    pub min_party_size: Option<i32>,
}

impl SearchPredicates {
    pub fn is_empty(&self) -> bool {
        self.region.is_none()
            && self.destinations.is_empty()
            && self.duration_fragment.is_none()
            && self.time_windows.is_empty()
            && self.budget.is_none()
            && self.min_party_size.is_none()
    }
}

/// Denormalized catalog row: a tour joined with its next available
/// departure and at most one active promotion. The itinerary is carried
/// raw (either a JSON array of day entries or already-flattened text) and
/// normalized by the search adapter.
#[derive(Debug, Clone)]
pub struct TourRecord {
    pub tour_id: i64,
    pub title: String,
    pub duration: Option<String>,
    pub departure_location: Option<String>,
    pub destination: Vec<String>,
    pub region: Option<i32>,
    pub itinerary: Option<Value>,
    pub max_participants: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub price_adult: Option<f64>,
    pub price_child_120_140: Option<f64>,
    pub price_child_100_120: Option<f64>,
    pub promotion_id: Option<i64>,
    pub promotion_name: Option<String>,
    pub promotion_type: Option<String>,
    pub promotion_discount: Option<f64>,
}

/// Capability boundary to the tour catalog. Implemented by the Postgres
/// store; the dialogue engine only ever sees this trait so tests can
/// substitute a canned catalog.
pub trait TourCatalog: Send + Sync {
    fn search_tours<'a>(
        &'a self,
        predicates: &'a SearchPredicates,
    ) -> CatalogFuture<'a, Vec<TourRecord>>;

    fn tour_by_id(&self, tour_id: i64) -> CatalogFuture<'_, Option<TourRecord>>;

    fn available_locations(&self) -> CatalogFuture<'_, Vec<String>>;
}
