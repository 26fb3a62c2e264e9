//! Delivery Coordinator
//!
//! Runs one annotation job end to end: snapshot the page's selection, call the
//! annotation service, deliver the result back into the originating page.
//! Also serves analyze requests coming from page agents.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::audit;
use crate::core::{ApiClient, SourceText};
use crate::ipc::{
    deliver, AnnotationResult, BackgroundMessage, BackgroundRequest, DeliveryOutcome,
    PageChannel, PageId, PageMessage,
};

/// Id of the selection context-menu entry
pub const CONTEXT_MENU_ID: &str = "furigana-maker";
pub const CONTEXT_MENU_TITLE: &str = "Add furigana";
pub const NO_TEXT_SELECTED_MESSAGE: &str = "No text selected.";

/// Terminal status of a job, independent of whether its result was delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Idle,
    SnapshotRequested,
    AwaitingApi,
    Delivering,
    Done(JobStatus),
}

/// What a finished job went through
#[derive(Debug, Clone)]
pub struct JobReport {
    pub page: PageId,
    /// Every state entered, in order, starting at `Idle`
    pub states: Vec<JobState>,
    pub result: AnnotationResult,
    pub delivery: DeliveryOutcome,
}

impl JobReport {
    pub fn status(&self) -> Option<&JobStatus> {
        match self.states.last() {
            Some(JobState::Done(status)) => Some(status),
            _ => None,
        }
    }
}

/// A click on a context-menu entry
#[derive(Debug, Clone)]
pub struct ContextMenuClick {
    pub menu_item_id: String,
    /// The tab the click happened in, if any
    pub page: Option<PageId>,
    /// Selection text the menu captured at click time
    pub selection_text: Option<String>,
}

pub struct Coordinator {
    client: ApiClient,
    channel: Arc<dyn PageChannel>,
    audit_log: Option<PathBuf>,
}

impl Coordinator {
    pub fn new(client: ApiClient, channel: Arc<dyn PageChannel>) -> Self {
        Self {
            client,
            channel,
            audit_log: None,
        }
    }

    /// Record undeliverable results in the file at `path`
    pub fn with_audit_log(mut self, path: PathBuf) -> Self {
        self.audit_log = Some(path);
        self
    }

    /// Entry point for the selection context menu. Clicks on other entries,
    /// or outside any tab, are ignored.
    pub async fn handle_context_menu(&self, click: ContextMenuClick) -> Option<JobReport> {
        if click.menu_item_id != CONTEXT_MENU_ID {
            return None;
        }
        let Some(page) = click.page else {
            debug!("Context menu click without a tab, ignoring");
            return None;
        };
        Some(self.run_job(page, click.selection_text.as_deref()).await)
    }

    /// Run one job for `page` with the trigger's captured selection text
    pub async fn run_job(&self, page: PageId, selection_text: Option<&str>) -> JobReport {
        let mut states = vec![JobState::Idle];

        let result = match selection_text.and_then(SourceText::new) {
            None => {
                debug!("Job for page {}: no text selected", page);
                AnnotationResult::failed(NO_TEXT_SELECTED_MESSAGE)
            }
            Some(source) => {
                states.push(JobState::SnapshotRequested);
                // Must land before the API call so the page keeps the range the
                // user saw, whatever happens to its live selection meanwhile.
                let snapshot = PageMessage::CacheSelection;
                let cached = deliver(self.channel.as_ref(), page, &snapshot).await;
                if !cached.is_delivered() {
                    debug!("Job for page {}: selection snapshot not delivered", page);
                }

                states.push(JobState::AwaitingApi);
                self.analyze(&source).await
            }
        };

        states.push(JobState::Delivering);
        let message = PageMessage::ApplyResult(result.clone());
        let delivery = deliver(self.channel.as_ref(), page, &message).await;
        if let DeliveryOutcome::Undeliverable(ref reason) = delivery {
            self.record_undeliverable(page, &message, &reason.to_string());
        }

        let status = match &result {
            AnnotationResult::Annotated { .. } => JobStatus::Success,
            AnnotationResult::Failed { error } => JobStatus::Failure(error.clone()),
        };
        info!(
            "🏁 Job for page {} done: {:?} (delivered: {})",
            page,
            status,
            delivery.is_delivered()
        );
        states.push(JobState::Done(status));

        JobReport {
            page,
            states,
            result,
            delivery,
        }
    }

    /// Call the service, folding every error into a failure result
    pub async fn analyze(&self, source: &SourceText) -> AnnotationResult {
        match self.client.annotate(source).await {
            Ok(html) => AnnotationResult::annotated(html),
            Err(e) => {
                info!("Annotation failed: {}", e);
                AnnotationResult::failed(e.to_string())
            }
        }
    }

    /// Serve analyze requests from page agents until every sender is gone.
    /// Each request is handled on its own task, so a slow call doesn't hold
    /// up other pages.
    pub async fn serve(self: Arc<Self>, mut requests: mpsc::UnboundedReceiver<BackgroundRequest>) {
        debug!("🎧 Background listening for analyze requests");
        while let Some(request) = requests.recv().await {
            let coordinator = self.clone();
            tokio::spawn(async move {
                let BackgroundRequest {
                    sender,
                    message,
                    reply,
                } = request;
                debug!("📥 {} from page {}", message.tag(), sender);

                let BackgroundMessage::Analyze { text } = message;
                let result = match SourceText::new(&text) {
                    Some(source) => coordinator.analyze(&source).await,
                    None => AnnotationResult::failed(NO_TEXT_SELECTED_MESSAGE),
                };
                if reply.send(result).is_err() {
                    debug!("Page {} stopped waiting for its analyze reply", sender);
                }
            });
        }
        debug!("Background request queue closed");
    }

    fn record_undeliverable(&self, page: PageId, message: &PageMessage, reason: &str) {
        let Some(path) = &self.audit_log else {
            return;
        };
        if let Err(e) = audit::log_undeliverable(path, page, message.tag(), reason) {
            warn!("Could not write delivery log {}: {}", path.display(), e);
        }
    }
}
