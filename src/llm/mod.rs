//! LLM integration for biography generation.
//!
//! Provides a provider abstraction over OpenAI-compatible chat backends
//! (Groq by default), the prompts used to ask about a figure, and the
//! parsing that turns a free-form answer into a description and picture.

pub mod openai;
pub mod parse;
pub mod prompt;
pub mod provider;
pub mod retry;

pub use openai::OpenAiCompatProvider;
pub use parse::{extract_json_snippet, parse_biography, ParsedBiography, ResponseFormat};
pub use provider::{resolve_env_var, LlmProvider, LlmRequest, LlmResponse};
