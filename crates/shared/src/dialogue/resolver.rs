use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use super::search::{TourSummary, summarize_record};
use crate::catalog::TourCatalog;
use crate::models::{ChatMessage, MessageRole};

/// Phrases that mark a turn as an itinerary request. Matched on the
/// lowercased query so the deterministic path can bypass the model.
const ITINERARY_KEYWORDS: [&str; 5] = [
    "lịch trình",
    "hành trình",
    "lộ trình",
    "chương trình du lịch",
    "kế hoạch du lịch",
];

static ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)tour\s*(?:thứ|số)?\s*(\d+|một|hai|ba|bốn|năm|đầu tiên)"));

static NAME_ID_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)tour ([^(\n]+) \(ID: (\d+)\)"));

static ID_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)\(ID: (\d+)\)"));

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)tour ([^(\n]+)"));

fn pattern(source: &str) -> Regex {
    Regex::new(source).unwrap_or_else(|err| panic!("invalid reference pattern: {err}"))
}

/// Which tour a follow-up question points at, in decreasing specificity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TourReference {
    Index(usize),
    Id(i64),
    Name(String),
}

pub fn is_itinerary_request(query: &str) -> bool {
    let lowered = query.to_lowercase();
    ITINERARY_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Reference resolution cascade: an ordinal in the current query wins,
/// then the newest assistant message that names a tour. Within one
/// message a name+id pair beats a bare id beats a bare name beats an
/// ordinal.
pub fn resolve_reference(query: &str, prior_messages: &[ChatMessage]) -> Option<TourReference> {
    if let Some(reference) = ordinal_reference(query) {
        return Some(reference);
    }
    history_reference(prior_messages)
}

fn ordinal_reference(text: &str) -> Option<TourReference> {
    let captures = ORDINAL_RE.captures(text)?;
    let token = captures.get(1)?.as_str().to_lowercase();
    let ordinal = match token.as_str() {
        "một" | "đầu tiên" => 1,
        "hai" => 2,
        "ba" => 3,
        "bốn" => 4,
        "năm" => 5,
        digits => digits.parse::<usize>().ok()?,
    };
    (ordinal >= 1).then(|| TourReference::Index(ordinal - 1))
}

fn history_reference(prior_messages: &[ChatMessage]) -> Option<TourReference> {
    for message in prior_messages.iter().rev() {
        if message.role != MessageRole::Assistant {
            continue;
        }
        if let Some(captures) = NAME_ID_RE.captures(&message.content)
            && let Some(id) = captures.get(2).and_then(|m| m.as_str().parse::<i64>().ok())
        {
            return Some(TourReference::Id(id));
        }
        if let Some(captures) = ID_RE.captures(&message.content)
            && let Some(id) = captures.get(1).and_then(|m| m.as_str().parse::<i64>().ok())
        {
            return Some(TourReference::Id(id));
        }
        if let Some(captures) = NAME_RE.captures(&message.content) {
            let name = captures
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .filter(|name| !name.is_empty());
            if let Some(name) = name {
                return Some(TourReference::Name(name));
            }
        }
        if let Some(reference) = ordinal_reference(&message.content) {
            return Some(reference);
        }
    }
    None
}

/// Deterministic itinerary reply. Resolves the referenced tour against
/// the turn's search results, falling back to a direct catalog lookup
/// when an id is known but no results are in hand. Always returns a
/// non-empty Vietnamese reply; every miss has an apology shape.
pub async fn resolve_itinerary_response(
    catalog: &dyn TourCatalog,
    query: &str,
    prior_messages: &[ChatMessage],
    results: &[TourSummary],
) -> String {
    let reference = resolve_reference(query, prior_messages);
    let mut pool: Vec<TourSummary> = results.to_vec();

    if pool.is_empty()
        && let Some(TourReference::Id(id)) = reference
    {
        match catalog.tour_by_id(id).await {
            Ok(Some(record)) => pool.push(summarize_record(record)),
            Ok(None) => {}
            Err(err) => warn!("tour lookup failed for id {id}: {err}"),
        }
    }

    let resolved = match &reference {
        Some(TourReference::Index(index)) => pool.get(*index),
        Some(TourReference::Id(id)) => pool.iter().find(|tour| tour.tour_id == *id),
        Some(TourReference::Name(name)) => {
            let needle = name.to_lowercase();
            pool.iter()
                .find(|tour| tour.title.to_lowercase().contains(&needle))
        }
        None => None,
    };

    let resolved = match resolved {
        Some(tour) => Some(tour),
        None if !pool.is_empty() => {
            warn!("itinerary reference unresolved, falling back to first result");
            pool.first()
        }
        None => None,
    };

    match resolved {
        Some(tour) => match &tour.itinerary {
            Some(itinerary) => format!(
                "Lịch trình chi tiết của tour {} (ID: {}):\n\n{}",
                tour.title, tour.tour_id, itinerary
            ),
            None => format!(
                "Xin lỗi, hiện tại tôi chưa có thông tin chi tiết về lịch trình của tour {} (ID: {}).",
                tour.title, tour.tour_id
            ),
        },
        None => match reference {
            Some(TourReference::Id(id)) => format!(
                "Xin lỗi, tôi không tìm thấy thông tin chi tiết cho tour có ID {id}. Vui lòng thử lại sau."
            ),
            _ => "Xin lỗi, tôi không tìm thấy thông tin lịch trình cho tour bạn quan tâm. \
                  Bạn có thể cung cấp tên tour hoặc ID tour không?"
                .to_string(),
        },
    }
}
