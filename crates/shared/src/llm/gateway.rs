use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub type LlmGatewayFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, LlmGatewayError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum LlmGatewayError {
    #[error("llm provider request timed out")]
    Timeout,
    #[error("llm provider request failed: {0}")]
    ProviderFailure(String),
    #[error("llm provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
}

/// Capability boundary to the language model. Every failure behind this
/// trait is recoverable for the caller: the dialogue engine degrades to a
/// templated response rather than aborting the turn.
pub trait LlmGateway: Send + Sync {
    fn generate<'a>(&'a self, prompt: String) -> LlmGatewayFuture<'a>;
}
