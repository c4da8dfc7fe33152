pub mod gateway;
pub mod gemini;
pub mod prompts;

pub use gateway::{LlmGateway, LlmGatewayError, LlmGatewayFuture};
pub use gemini::{GeminiConfigError, GeminiGateway, GeminiGatewayConfig};
pub use prompts::{render_extraction_prompt, render_response_prompt, render_routing_prompt};
