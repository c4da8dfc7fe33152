use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::catalog::TimeWindow;
use crate::llm::{LlmGateway, LlmGatewayError, render_extraction_prompt};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("llm invocation failed during extraction: {0}")]
    Gateway(#[from] LlmGatewayError),
    #[error("extraction output is not valid json")]
    InvalidJson { raw_output: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values.as_slice(),
        }
    }
}

/// Party size as the extractor emits it: a plain integer, or a textual
/// form such as "2-5" or ">2".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartySize {
    Count(i64),
    Text(String),
}

/// Structured travel-search criteria. A missing field means the user did
/// not mention it: unconstrained, never "zero". Keys the model did not
/// emit deserialize to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityFilter {
    #[serde(default, deserialize_with = "lenient_region")]
    pub region: Option<i32>,
    #[serde(default)]
    pub destination: Option<OneOrMany<String>>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub time: Option<OneOrMany<TimeWindow>>,
    #[serde(default, deserialize_with = "lenient_numeric_string")]
    pub budget: Option<String>,
    #[serde(default)]
    pub number_of_people: Option<PartySize>,
}

impl EntityFilter {
    pub fn is_empty(&self) -> bool {
        self.region.is_none()
            && self.destination.is_none()
            && self.duration.is_none()
            && self.time.is_none()
            && self.budget.is_none()
            && self.number_of_people.is_none()
    }
}

/// Runs the extraction prompt and parses the model output into a filter.
/// Relative date phrases are resolved to concrete dates by the prompt
/// itself; this side only guards against malformed JSON.
pub async fn extract_entities(
    gateway: &dyn LlmGateway,
    query: &str,
    reference_date: NaiveDate,
    vocabulary: &[String],
) -> Result<EntityFilter, ExtractionError> {
    let prompt = render_extraction_prompt(query, reference_date, vocabulary);
    let raw = gateway.generate(prompt).await?;
    parse_entity_filter(&raw)
}

/// Strict parse with a recovery pass: models occasionally wrap the object
/// in code fences or prose, so after stripping fences we retry on the
/// first balanced brace-delimited span before giving up.
pub fn parse_entity_filter(raw: &str) -> Result<EntityFilter, ExtractionError> {
    let stripped = strip_code_fence(raw);

    if let Ok(filter) = serde_json::from_str::<EntityFilter>(stripped) {
        return Ok(filter);
    }

    if let Some(span) = balanced_json_span(stripped)
        && let Ok(filter) = serde_json::from_str::<EntityFilter>(span)
    {
        return Ok(filter);
    }

    Err(ExtractionError::InvalidJson {
        raw_output: raw.to_string(),
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// First balanced `{ ... }` span, respecting string literals and escapes.
fn balanced_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

fn lenient_region<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        serde_json::Value::Number(number) => number.as_i64().map(|n| n as i32),
        serde_json::Value::String(text) => text.trim().parse::<i32>().ok(),
        _ => None,
    }))
}

fn lenient_numeric_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::String(text) => Some(text),
        _ => None,
    }))
}
