use tracing::warn;

use super::search::TourSummary;
use super::state::DialogueState;
use crate::llm::{LlmGateway, render_response_prompt};

const MAX_LISTED_RESULTS: usize = 5;

const NO_MATCH_NOTICE: &str =
    "Xin lỗi, tôi không tìm thấy tour nào phù hợp với yêu cầu của bạn.";

const NO_CONTEXT_NOTICE: &str = "Không có thông tin tìm kiếm liên quan.";

const SYNTHESIS_FAILURE_NOTICE: &str = "Xin lỗi, tôi gặp sự cố khi tạo câu trả lời.";

const INFANT_PRICE_DISCLAIMER: &str = "\n\nLưu ý: Giá vé này chưa bao gồm vé cho em bé dưới \
    100cm (thường được miễn phí vé dịch vụ tour, chỉ tính vé máy bay/tàu nếu có và chi phí \
    phát sinh nếu sử dụng dịch vụ riêng).";

/// Builds the final conversational reply. The search context (or its
/// absence) is folded into the response prompt; a gateway failure
/// degrades to a fixed apology and records the error on the state.
pub async fn generate_response(gateway: &dyn LlmGateway, state: &mut DialogueState) {
    let context = response_context(state);
    let prompt = render_response_prompt(state.prior_messages(), &context, &state.user_query);

    match gateway.generate(prompt).await {
        Ok(response) if !response.trim().is_empty() => {
            state.final_response = response.trim().to_string();
        }
        Ok(_) => {
            warn!("response synthesis returned empty text");
            state.error = Some("empty synthesis output".to_string());
            state.final_response = SYNTHESIS_FAILURE_NOTICE.to_string();
        }
        Err(err) => {
            warn!("response synthesis failed: {err}");
            state.error = Some(err.to_string());
            state.final_response = SYNTHESIS_FAILURE_NOTICE.to_string();
        }
    }
}

/// Selects the search-context block the response prompt sees. A recorded
/// upstream error takes priority so the model can acknowledge it.
fn response_context(state: &DialogueState) -> String {
    if let Some(error) = &state.error {
        return format!("An error occurred in a previous step: {error}");
    }

    match &state.search_results {
        Some(results) if !results.is_empty() => summarize_results(results),
        Some(_) => NO_MATCH_NOTICE.to_string(),
        None if state.extracted_entities.is_some() => NO_MATCH_NOTICE.to_string(),
        None => NO_CONTEXT_NOTICE.to_string(),
    }
}

/// Numbered digest of the top results with prices, promotion
/// annotations, and the infant-pricing disclaimer.
pub fn summarize_results(results: &[TourSummary]) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(results.len().min(MAX_LISTED_RESULTS) + 1);

    for (position, tour) in results.iter().take(MAX_LISTED_RESULTS).enumerate() {
        let departure = tour
            .departure_date
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let duration = tour.duration.clone().unwrap_or_else(|| "N/A".to_string());
        let promotion = tour
            .promotion
            .as_ref()
            .map(|promo| {
                format!(
                    " (KM: {} - Giảm {})",
                    promo.name,
                    format_discount(&promo.kind, promo.discount)
                )
            })
            .unwrap_or_default();

        lines.push(format!(
            "{}. Tour: {} (ID: {})\n   Khởi hành: {}\n   Thời gian: {}\n   \
             Giá người lớn: {}{}\n   Giá trẻ em (1m2-1m4): {}\n   Giá trẻ em (1m-1m2): {}",
            position + 1,
            tour.title,
            tour.tour_id,
            departure,
            duration,
            format_price(tour.price_adult),
            promotion,
            format_price(tour.price_child_120_140),
            format_price(tour.price_child_100_120),
        ));
    }

    if results.len() > MAX_LISTED_RESULTS {
        lines.push(format!(
            "... và {} kết quả khác.",
            results.len() - MAX_LISTED_RESULTS
        ));
    }

    let mut summary = lines.join("\n");
    summary.push_str(INFANT_PRICE_DISCLAIMER);
    summary
}

fn format_price(price: Option<f64>) -> String {
    match price {
        Some(price) => format!("{} VND", format_vnd(price)),
        None => "N/A".to_string(),
    }
}

/// Percent promotions render "25%", fixed-amount ones a grouped VND sum.
fn format_discount(kind: &str, discount: f64) -> String {
    if kind.eq_ignore_ascii_case("percent") || kind.eq_ignore_ascii_case("percentage") {
        let rendered = format!("{discount}");
        let trimmed = rendered.strip_suffix(".0").unwrap_or(&rendered);
        format!("{trimmed}%")
    } else {
        format!("{} VND", format_vnd(discount))
    }
}

/// Thousands-grouped integer rendering, "4,500,000".
fn format_vnd(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (index, ch) in digits.chars().enumerate() {
        if index != 0 && (index + 3 - offset) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if whole < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::{format_vnd, summarize_results};
    use crate::dialogue::search::{PromotionSummary, TourSummary};

    fn tour(id: i64, title: &str, price_adult: Option<f64>) -> TourSummary {
        TourSummary {
            tour_id: id,
            title: title.to_string(),
            duration: Some("3 ngày 2 đêm".to_string()),
            destination: vec!["Đà Nẵng".to_string()],
            departure_date: chrono::NaiveDate::from_ymd_opt(2025, 7, 10),
            price_adult,
            price_child_120_140: Some(3_000_000.0),
            price_child_100_120: None,
            promotion: None,
            itinerary: None,
        }
    }

    #[test]
    fn vnd_amounts_are_thousands_grouped() {
        assert_eq!(format_vnd(4_500_000.0), "4,500,000");
        assert_eq!(format_vnd(950.0), "950");
        assert_eq!(format_vnd(1_000.0), "1,000");
    }

    #[test]
    fn summary_lists_prices_and_defaults_missing_ones() {
        let summary = summarize_results(&[tour(1, "Tour Đà Nẵng", Some(4_500_000.0))]);
        assert!(summary.contains("1. Tour: Tour Đà Nẵng (ID: 1)"));
        assert!(summary.contains("Khởi hành: 2025-07-10"));
        assert!(summary.contains("Giá người lớn: 4,500,000 VND"));
        assert!(summary.contains("Giá trẻ em (1m-1m2): N/A"));
    }

    #[test]
    fn percent_promotion_renders_as_percentage() {
        let mut promoted = tour(2, "Tour Huế", Some(5_000_000.0));
        promoted.promotion = Some(PromotionSummary {
            id: 1,
            name: "Hè rực rỡ".to_string(),
            kind: "percent".to_string(),
            discount: 25.0,
        });

        let summary = summarize_results(&[promoted]);
        assert!(summary.contains("(KM: Hè rực rỡ - Giảm 25%)"));
    }

    #[test]
    fn amount_promotion_renders_in_vnd() {
        let mut promoted = tour(3, "Tour Sapa", Some(6_000_000.0));
        promoted.promotion = Some(PromotionSummary {
            id: 2,
            name: "Đặt sớm".to_string(),
            kind: "amount".to_string(),
            discount: 500_000.0,
        });

        let summary = summarize_results(&[promoted]);
        assert!(summary.contains("(KM: Đặt sớm - Giảm 500,000 VND)"));
    }

    #[test]
    fn overflow_beyond_five_results_is_counted_not_listed() {
        let results: Vec<_> = (1..=8)
            .map(|id| tour(id, &format!("Tour {id}"), Some(1_000_000.0)))
            .collect();

        let summary = summarize_results(&results);
        assert!(summary.contains("5. Tour: Tour 5"));
        assert!(!summary.contains("6. Tour: Tour 6"));
        assert!(summary.contains("... và 3 kết quả khác."));
    }

    #[test]
    fn non_empty_results_carry_the_infant_disclaimer() {
        let summary = summarize_results(&[tour(1, "Tour Đà Nẵng", None)]);
        assert!(summary.contains("em bé dưới 100cm"));
    }
}
