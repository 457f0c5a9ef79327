//! Embedding provider abstraction and the Voyage AI backend.

pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod provider;
pub mod voyage;

pub use error::LlmError;
pub use provider::EmbeddingProvider;
