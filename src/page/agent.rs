//! Selection Agent
//!
//! One instance per loaded page. Owns the cached selection snapshot, splices
//! annotated HTML into the page, drives the annotation highlight, and reports
//! to the status surface.

use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::dom::{Document, NodeId, SelectionRange};
use super::fragment::Fragment;
use super::status::{StatusKind, StatusSnapshot, StatusSurface};
use super::{
    ACTIVE_CLASS, ANNOTATION_CLASS, APPLIED_MESSAGE, BACKGROUND_UNAVAILABLE_MESSAGE,
    NO_PAGE_TEXT_MESSAGE,
};
use crate::core::SourceText;
use crate::error::AgentError;
use crate::ipc::{AnnotationResult, BackgroundMessage, BackgroundRequest, PageId, PageMessage};

/// Work handed to a running agent
#[derive(Debug)]
pub enum AgentCommand {
    /// A message from the background; `ack` fires once it has been handled
    Deliver {
        message: PageMessage,
        ack: oneshot::Sender<()>,
    },
    /// The user pressed the in-page action
    PageAction {
        done: oneshot::Sender<Result<ApplyOutcome, AgentError>>,
    },
    /// The user clicked a node
    Click {
        node: NodeId,
        done: oneshot::Sender<Result<bool, AgentError>>,
    },
}

/// What applying a result did to the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// HTML spliced in; counts of top-level nodes and annotations inserted
    Applied { inserted: usize, annotations: usize },
    /// A failure result was shown on the status surface
    ShowedError,
    /// The page had no text to send
    NothingToAnnotate,
}

pub struct SelectionAgent {
    page: PageId,
    document: Arc<Mutex<Document>>,
    cached: Option<SelectionRange>,
    status: StatusSurface,
    background: Option<mpsc::UnboundedSender<BackgroundRequest>>,
}

impl SelectionAgent {
    pub fn new(
        page: PageId,
        document: Arc<Mutex<Document>>,
        status: Arc<Mutex<StatusSnapshot>>,
        background: Option<mpsc::UnboundedSender<BackgroundRequest>>,
    ) -> Self {
        Self {
            page,
            document,
            cached: None,
            status: StatusSurface::with_state(status),
            background,
        }
    }

    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn status(&self) -> &StatusSurface {
        &self.status
    }

    pub fn has_cached_selection(&self) -> bool {
        self.cached.is_some()
    }

    /// Snapshot the live selection, or clear the cache if there is none.
    /// Returns whether a selection was cached.
    pub fn cache_selection(&mut self) -> Result<bool, AgentError> {
        let doc = self.document.lock()?;
        self.cached = doc.live_range();
        debug!(
            "Page {}: selection {}",
            self.page,
            if self.cached.is_some() { "cached" } else { "cleared" }
        );
        Ok(self.cached.is_some())
    }

    /// Splice a successful result into the page, or show a failure
    pub fn apply_result(&mut self, result: AnnotationResult) -> Result<ApplyOutcome, AgentError> {
        let html = match result {
            AnnotationResult::Failed { error } => {
                self.status.show(StatusKind::Error, error);
                return Ok(ApplyOutcome::ShowedError);
            }
            AnnotationResult::Annotated { html } => html,
        };

        let mut doc = self.document.lock()?;

        // The user may have re-selected while the request was in flight.
        let target = match doc.live_range() {
            Some(live) => Some(live),
            None => self.cached.take().filter(|range| doc.is_valid(range)),
        };

        let Some(target) = target else {
            self.cached = None;
            self.status
                .show(StatusKind::Error, AgentError::NoSelection.to_string());
            return Err(AgentError::NoSelection);
        };

        let mut fragment = Fragment::parse(&html);
        let annotations = fragment.mark_annotations();
        let inserted = doc.replace_range(target, fragment)?;
        doc.clear_selection();
        self.cached = None;

        info!(
            "✅ Page {}: spliced {} node(s), {} annotation(s)",
            self.page,
            inserted.len(),
            annotations
        );
        self.status.show(StatusKind::Success, APPLIED_MESSAGE);
        Ok(ApplyOutcome::Applied {
            inserted: inserted.len(),
            annotations,
        })
    }

    /// Toggle the highlight on the annotation containing `node`, clearing it
    /// from every other annotation. Returns whether it is now highlighted.
    pub fn click_annotation(&mut self, node: NodeId) -> Result<bool, AgentError> {
        let mut doc = self.document.lock()?;
        let Some(target) = doc.closest_with_class(node, ANNOTATION_CLASS) else {
            return Ok(false);
        };

        let was_active = doc.has_class(target, ACTIVE_CLASS);
        for other in doc.elements_with_class(ACTIVE_CLASS) {
            doc.remove_class(other, ACTIVE_CLASS);
        }
        if !was_active {
            doc.add_class(target, ACTIVE_CLASS);
        }
        Ok(!was_active)
    }

    /// Source text for the in-page action: the selection, else the whole page
    pub fn extract_text(&self) -> Result<String, AgentError> {
        let doc = self.document.lock()?;
        let selected = doc.selection_text();
        if !selected.trim().is_empty() {
            return Ok(selected.trim().to_string());
        }
        Ok(doc.body_text().trim().to_string())
    }

    /// In-page trigger: ask the background to annotate, then apply the reply
    pub async fn run_page_action(&mut self) -> Result<ApplyOutcome, AgentError> {
        match self.begin_page_action()? {
            ActionStep::Finished(outcome) => Ok(outcome),
            ActionStep::Awaiting(reply) => {
                let result = reply.wait().await;
                self.apply_result(result)
            }
        }
    }

    /// Everything the in-page action does before the background answers
    fn begin_page_action(&mut self) -> Result<ActionStep, AgentError> {
        let text = self.extract_text()?;
        let Some(source) = SourceText::new(&text) else {
            self.status.show(StatusKind::Error, NO_PAGE_TEXT_MESSAGE);
            return Ok(ActionStep::Finished(ApplyOutcome::NothingToAnnotate));
        };

        self.cache_selection()?;
        self.status.show(StatusKind::Info, "Adding furigana…");
        Ok(ActionStep::Awaiting(self.request_analysis(source)))
    }

    fn request_analysis(&self, source: SourceText) -> PendingAnalysis {
        let Some(background) = self.background.as_ref() else {
            return PendingAnalysis(None);
        };
        let (reply, response) = oneshot::channel();
        let request = BackgroundRequest {
            sender: self.page,
            message: BackgroundMessage::Analyze {
                text: source.as_str().to_string(),
            },
            reply,
        };
        match background.send(request) {
            Ok(()) => PendingAnalysis(Some(response)),
            Err(_) => PendingAnalysis(None),
        }
    }

    pub fn handle_message(&mut self, message: PageMessage) {
        debug!("📨 Page {} received {}", self.page, message.tag());
        match message {
            PageMessage::CacheSelection => {
                if let Err(e) = self.cache_selection() {
                    warn!("Page {}: could not cache selection: {}", self.page, e);
                }
            }
            PageMessage::ApplyResult(result) => match self.apply_result(result) {
                Ok(_) => {}
                Err(AgentError::NoSelection) => {
                    info!("Page {}: no selection to apply result to", self.page)
                }
                Err(e) => warn!("Page {}: could not apply result: {}", self.page, e),
            },
        }
    }

    /// Serve commands until every sender is gone (the page unloaded the agent).
    /// A pending in-page action never holds up delivered messages: its reply
    /// comes back through the loop once the background answers.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<AgentCommand>) {
        debug!("📄 Agent running in page {}", self.page);
        let (replies_tx, mut replies) = mpsc::unbounded_channel::<AnalysisReply>();
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command, &replies_tx),
                    None => break,
                },
                Some(reply) = replies.recv() => {
                    let outcome = self.apply_result(reply.result);
                    let _ = reply.done.send(outcome);
                }
            }
        }
        debug!("Agent in page {} stopped", self.page);
    }

    fn handle_command(
        &mut self,
        command: AgentCommand,
        replies: &mpsc::UnboundedSender<AnalysisReply>,
    ) {
        match command {
            AgentCommand::Deliver { message, ack } => {
                self.handle_message(message);
                let _ = ack.send(());
            }
            AgentCommand::PageAction { done } => match self.begin_page_action() {
                Ok(ActionStep::Finished(outcome)) => {
                    let _ = done.send(Ok(outcome));
                }
                Ok(ActionStep::Awaiting(pending)) => {
                    let replies = replies.clone();
                    tokio::spawn(async move {
                        let result = pending.wait().await;
                        let _ = replies.send(AnalysisReply { result, done });
                    });
                }
                Err(e) => {
                    let _ = done.send(Err(e));
                }
            },
            AgentCommand::Click { node, done } => {
                let _ = done.send(self.click_annotation(node));
            }
        }
    }
}

enum ActionStep {
    Finished(ApplyOutcome),
    Awaiting(PendingAnalysis),
}

/// An analyze request the background has yet to answer
struct PendingAnalysis(Option<oneshot::Receiver<AnnotationResult>>);

impl PendingAnalysis {
    async fn wait(self) -> AnnotationResult {
        let reply = match self.0 {
            Some(response) => response.await.ok(),
            None => None,
        };
        reply.unwrap_or_else(|| AnnotationResult::failed(BACKGROUND_UNAVAILABLE_MESSAGE))
    }
}

/// The background's answer, on its way back into the agent loop
struct AnalysisReply {
    result: AnnotationResult,
    done: oneshot::Sender<Result<ApplyOutcome, AgentError>>,
}
