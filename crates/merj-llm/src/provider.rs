use std::future::Future;

use crate::error::LlmError;

/// Maps text to fixed-length vectors.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed every text in one round trip.
    ///
    /// The returned vectors are in the same order as `texts`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Configuration`] when no credential is available,
    /// before any network traffic. Other variants report transport or
    /// response failures.
    fn embed(&self, texts: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send;

    /// Check that the provider can be called at all.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Configuration`] when a required credential is missing.
    fn ensure_configured(&self) -> Result<(), LlmError> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}
