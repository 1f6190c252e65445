//! Gleaner LLM - provider abstraction for the model calls the engine makes.
//!
//! Selector inference and article summarization both go through the
//! [`LlmProvider`] trait, so the backend can be swapped between a hosted
//! Gemini model and a local Ollama instance from configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use gleaner_llm::{CompletionRequest, LlmProvider, OllamaProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ollama = OllamaProvider::new()?;
//!
//! let request = CompletionRequest::new("Summarize: ...").with_temperature(0.0);
//! let response = ollama.complete(request).await?;
//!
//! println!("Response: {}", response.content);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod provider;
pub mod providers;

// Re-export commonly used types
pub use error::{LlmError, Result};
pub use provider::{
    CompletionRequest, CompletionResponse, LlmProvider, Message, Role, Usage,
};
pub use providers::{provider_from_config, GeminiProvider, OllamaProvider};
