use chrono::NaiveDate;

use super::extract::EntityFilter;
use super::search::TourSummary;
use crate::models::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    Search,
    Respond,
    ErrorState,
}

impl RoutingDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Respond => "respond",
            Self::ErrorState => "error_state",
        }
    }

    /// Lenient mapping of free-text classifier output. Anything outside
    /// the three valid tags coerces to `Respond`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "search" => Self::Search,
            "error_state" => Self::ErrorState,
            _ => Self::Respond,
        }
    }
}

/// Per-turn working record threaded through every orchestration step.
/// Created fresh from the session transcript, discarded once the reply is
/// appended; `None` means a step has not produced the value yet, which is
/// distinct from an empty result.
#[derive(Debug, Clone)]
pub struct DialogueState {
    pub messages: Vec<ChatMessage>,
    pub user_query: String,
    pub current_date: NaiveDate,
    pub available_locations: Vec<String>,
    pub extracted_entities: Option<EntityFilter>,
    pub search_results: Option<Vec<TourSummary>>,
    pub final_response: String,
    pub error: Option<String>,
    pub routing_decision: Option<RoutingDecision>,
}

impl DialogueState {
    pub fn new(messages: Vec<ChatMessage>, current_date: NaiveDate) -> Self {
        Self {
            messages,
            user_query: String::new(),
            current_date,
            available_locations: Vec::new(),
            extracted_entities: None,
            search_results: None,
            final_response: String::new(),
            error: None,
            routing_decision: None,
        }
    }

    /// Transcript up to but excluding the newest human turn; what the
    /// routing and response prompts see as "history".
    pub fn prior_messages(&self) -> &[ChatMessage] {
        match self.messages.len() {
            0 => &[],
            len => &self.messages[..len - 1],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RoutingDecision;

    #[test]
    fn parse_accepts_the_three_valid_tags() {
        assert_eq!(RoutingDecision::parse("search"), RoutingDecision::Search);
        assert_eq!(RoutingDecision::parse("respond"), RoutingDecision::Respond);
        assert_eq!(
            RoutingDecision::parse("error_state"),
            RoutingDecision::ErrorState
        );
    }

    #[test]
    fn parse_is_lenient_about_case_and_whitespace() {
        assert_eq!(
            RoutingDecision::parse("  SEARCH\n"),
            RoutingDecision::Search
        );
    }

    #[test]
    fn parse_coerces_unknown_output_to_respond() {
        assert_eq!(
            RoutingDecision::parse("tôi nghĩ là search"),
            RoutingDecision::Respond
        );
        assert_eq!(RoutingDecision::parse(""), RoutingDecision::Respond);
    }
}
