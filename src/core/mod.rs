//! Core annotation modules
//!
//! Request building, the outbound API client, and normalization of the
//! service's loosely shaped responses.

pub mod client;
pub mod normalizer;
pub mod request;

pub use client::{ApiClient, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use normalizer::Normalized;
pub use request::RequestFormat;

/// Non-empty, trimmed text to annotate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText(String);

impl SourceText {
    /// Trim `text`, returning `None` if nothing is left
    pub fn new(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
