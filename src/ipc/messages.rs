//! Message Types
//!
//! Wire shapes for background ↔ page communication.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Identifies one page (browser tab)
pub type PageId = u32;

/// How hard a page message is pushed through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryGuarantee {
    /// One attempt; failure is tolerated
    BestEffort,
    /// Inject the agent once and retry once when no receiver is present
    Remedial,
}

/// Messages sent from the background to a page agent. No reply payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageMessage {
    /// Snapshot the live selection before the network round trip
    #[serde(rename = "furigana:cache-selection")]
    CacheSelection,

    /// Splice a result into the cached selection, or show its error
    #[serde(rename = "furigana:apply-result")]
    ApplyResult(AnnotationResult),
}

impl PageMessage {
    pub fn tag(&self) -> &'static str {
        match self {
            PageMessage::CacheSelection => "furigana:cache-selection",
            PageMessage::ApplyResult(_) => "furigana:apply-result",
        }
    }

    pub fn guarantee(&self) -> DeliveryGuarantee {
        match self {
            PageMessage::CacheSelection => DeliveryGuarantee::BestEffort,
            PageMessage::ApplyResult(_) => DeliveryGuarantee::Remedial,
        }
    }
}

/// Messages sent from a page agent to the background
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackgroundMessage {
    /// Annotate `text`; the reply is an [`AnnotationResult`]
    #[serde(rename = "furigana:analyze")]
    Analyze { text: String },
}

impl BackgroundMessage {
    pub fn tag(&self) -> &'static str {
        match self {
            BackgroundMessage::Analyze { .. } => "furigana:analyze",
        }
    }
}

/// A background message in flight, with the channel its reply goes back on
#[derive(Debug)]
pub struct BackgroundRequest {
    pub sender: PageId,
    pub message: BackgroundMessage,
    pub reply: oneshot::Sender<AnnotationResult>,
}

/// Outcome of one annotation job. Exactly one variant is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ResultPayload", from = "ResultPayload")]
pub enum AnnotationResult {
    Annotated { html: String },
    Failed { error: String },
}

impl AnnotationResult {
    pub fn annotated(html: impl Into<String>) -> Self {
        AnnotationResult::Annotated { html: html.into() }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        AnnotationResult::Failed {
            error: error.into(),
        }
    }
}

/// `{ ok: true, data: { html } } | { ok: false, error }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPayload {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResultData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub furigana: Option<String>,
}

impl From<AnnotationResult> for ResultPayload {
    fn from(result: AnnotationResult) -> Self {
        match result {
            AnnotationResult::Annotated { html } => ResultPayload {
                ok: true,
                data: Some(ResultData {
                    html: Some(html),
                    furigana: None,
                }),
                error: None,
            },
            AnnotationResult::Failed { error } => ResultPayload {
                ok: false,
                data: None,
                error: Some(error),
            },
        }
    }
}

impl From<ResultPayload> for AnnotationResult {
    fn from(payload: ResultPayload) -> Self {
        if !payload.ok {
            let error = payload.error.unwrap_or_else(|| "Unknown error.".to_string());
            return AnnotationResult::failed(error);
        }
        match payload.data.and_then(|data| data.html.or(data.furigana)) {
            Some(html) => AnnotationResult::Annotated { html },
            None => AnnotationResult::failed("Result contained no HTML."),
        }
    }
}
