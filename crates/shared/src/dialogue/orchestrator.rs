use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use super::extract::extract_entities;
use super::resolver::{is_itinerary_request, resolve_itinerary_response};
use super::search::search_tours;
use super::state::{DialogueState, RoutingDecision};
use super::synthesis::generate_response;
use crate::catalog::TourCatalog;
use crate::llm::{LlmGateway, render_routing_prompt};
use crate::locations::LocationCache;
use crate::models::{ChatMessage, MessageRole};

/// Drives one conversation turn through routing, optional search, and
/// response synthesis. Fail-soft throughout: every step degrades to a
/// recorded error plus a usable reply, and a completed turn always grows
/// the transcript by exactly one assistant message.
pub struct DialogueEngine {
    gateway: Arc<dyn LlmGateway>,
    catalog: Arc<dyn TourCatalog>,
    locations: LocationCache,
}

impl DialogueEngine {
    pub fn new(gateway: Arc<dyn LlmGateway>, catalog: Arc<dyn TourCatalog>) -> Self {
        Self {
            gateway,
            catalog,
            locations: LocationCache::new(),
        }
    }

    pub async fn run_turn(&self, messages: Vec<ChatMessage>) -> DialogueState {
        self.run_turn_at(messages, Utc::now().date_naive()).await
    }

    pub async fn run_turn_at(
        &self,
        messages: Vec<ChatMessage>,
        current_date: NaiveDate,
    ) -> DialogueState {
        let mut state = DialogueState::new(messages, current_date);
        self.fetch_context(&mut state).await;
        self.route_query(&mut state).await;

        match state.routing_decision {
            Some(RoutingDecision::Search) => {
                self.extract_and_search(&mut state).await;
                self.generate_response(&mut state).await;
            }
            Some(RoutingDecision::Respond) | None => {
                self.generate_response(&mut state).await;
            }
            Some(RoutingDecision::ErrorState) => {
                handle_error(&mut state);
            }
        }

        state.messages.push(ChatMessage::assistant(&state.final_response));
        info!(
            route = state
                .routing_decision
                .map(|decision| decision.as_str())
                .unwrap_or("none"),
            results = state
                .search_results
                .as_ref()
                .map(Vec::len)
                .unwrap_or_default(),
            degraded = state.error.is_some(),
            "dialogue turn completed"
        );
        state
    }

    async fn fetch_context(&self, state: &mut DialogueState) {
        state.available_locations = self
            .locations
            .vocabulary_for(self.catalog.as_ref(), state.current_date)
            .await;
        state.user_query = match state.messages.last() {
            Some(message) if message.role == MessageRole::Human => message.content.clone(),
            _ => String::new(),
        };
    }

    async fn route_query(&self, state: &mut DialogueState) {
        if state.user_query.trim().is_empty() {
            state.error = Some("empty user query".to_string());
            state.routing_decision = Some(RoutingDecision::ErrorState);
            return;
        }

        let prompt = render_routing_prompt(state.prior_messages(), &state.user_query);
        match self.gateway.generate(prompt).await {
            Ok(raw) => {
                state.routing_decision = Some(RoutingDecision::parse(&raw));
            }
            Err(err) => {
                // Routing is advisory; a failed classifier still gets a reply.
                warn!("routing failed, defaulting to a direct response: {err}");
                state.error = Some(err.to_string());
                state.routing_decision = Some(RoutingDecision::Respond);
            }
        }
    }

    async fn extract_and_search(&self, state: &mut DialogueState) {
        match extract_entities(
            self.gateway.as_ref(),
            &state.user_query,
            state.current_date,
            &state.available_locations,
        )
        .await
        {
            Ok(filter) => {
                state.error = None;
                let results = search_tours(self.catalog.as_ref(), &filter).await;
                state.extracted_entities = Some(filter);
                state.search_results = Some(results);
            }
            Err(err) => {
                warn!("entity extraction failed: {err}");
                state.error = Some(err.to_string());
                state.extracted_entities = None;
                state.search_results = Some(Vec::new());
            }
        }
    }

    async fn generate_response(&self, state: &mut DialogueState) {
        if is_itinerary_request(&state.user_query) {
            let results = state.search_results.clone().unwrap_or_default();
            state.final_response = resolve_itinerary_response(
                self.catalog.as_ref(),
                &state.user_query,
                state.prior_messages(),
                &results,
            )
            .await;
            return;
        }

        generate_response(self.gateway.as_ref(), state).await;
    }
}

fn handle_error(state: &mut DialogueState) {
    let detail = state
        .error
        .clone()
        .unwrap_or_else(|| "Lỗi không xác định.".to_string());
    state.final_response =
        format!("Xin lỗi, đã có lỗi xảy ra: {detail}. Vui lòng thử lại hoặc hỏi khác đi.");
}
