//! # condense-providers
//!
//! Text-generation provider abstraction for Condense.
//!
//! This crate provides:
//! - Provider trait for abstracting text-generation backends
//! - Implementations for Anthropic and OpenAI-compatible APIs
//! - A registry that selects providers from configuration

pub mod anthropic;
pub mod openai;
pub mod registry;
pub mod traits;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAIProvider;
pub use registry::ProviderRegistry;
pub use traits::{CompletionRequest, CompletionResponse, FinishReason, Provider, Usage};
