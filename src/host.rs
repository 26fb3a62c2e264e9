//! Tab Host
//!
//! The set of open pages and the agents loaded into them. Each page owns a
//! document and a status panel; its agent, when present, runs as its own
//! task and is reached only through messages. Pages opened without an agent
//! model tabs that were loaded before the extension was installed.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{AgentError, DeliveryError, FuriganaResult};
use crate::ipc::{BackgroundRequest, PageChannel, PageId, PageMessage, SendError};
use crate::page::{AgentCommand, ApplyOutcome, Document, NodeId, SelectionAgent, StatusSnapshot};

struct AgentHandle {
    commands: mpsc::UnboundedSender<AgentCommand>,
    task: JoinHandle<()>,
}

struct Tab {
    document: Arc<Mutex<Document>>,
    status: Arc<Mutex<StatusSnapshot>>,
    agent: Option<AgentHandle>,
    injectable: bool,
}

pub struct TabHost {
    tabs: Mutex<HashMap<PageId, Tab>>,
    next_id: AtomicU32,
    background: Option<mpsc::UnboundedSender<BackgroundRequest>>,
    sends: AtomicUsize,
    injections: AtomicUsize,
}

impl TabHost {
    /// `background` is where agents send their analyze requests
    pub fn new(background: Option<mpsc::UnboundedSender<BackgroundRequest>>) -> Self {
        Self {
            tabs: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            background,
            sends: AtomicUsize::new(0),
            injections: AtomicUsize::new(0),
        }
    }

    /// Open a page with no agent loaded
    pub fn open_page(&self, html: &str) -> PageId {
        let page = self.next_id.fetch_add(1, Ordering::SeqCst);
        let tab = Tab {
            document: Arc::new(Mutex::new(Document::from_html(html))),
            status: Arc::new(Mutex::new(StatusSnapshot::default())),
            agent: None,
            injectable: true,
        };
        if let Ok(mut tabs) = self.tabs.lock() {
            tabs.insert(page, tab);
        }
        debug!("🗂️ Opened page {}", page);
        page
    }

    /// Open a page and load its agent, as a page loaded after install would be
    pub fn open_page_with_agent(&self, html: &str) -> Result<PageId, SendError> {
        let page = self.open_page(html);
        self.load_agent(page)?;
        Ok(page)
    }

    /// Start an agent in `page`, replacing any running one
    pub fn load_agent(&self, page: PageId) -> Result<(), SendError> {
        let mut tabs = self
            .tabs
            .lock()
            .map_err(|e| SendError::Failed(e.to_string()))?;
        let tab = tabs.get_mut(&page).ok_or_else(|| no_tab(page))?;
        if !tab.injectable {
            return Err(SendError::Failed(
                "Cannot access contents of the page.".to_string(),
            ));
        }

        if let Some(old) = tab.agent.take() {
            old.task.abort();
        }

        let (commands, receiver) = mpsc::unbounded_channel();
        let agent = SelectionAgent::new(
            page,
            tab.document.clone(),
            tab.status.clone(),
            self.background.clone(),
        );
        let task = tokio::spawn(agent.run(receiver));
        tab.agent = Some(AgentHandle { commands, task });
        Ok(())
    }

    /// Tear down the page's agent. Returns whether one was running.
    pub fn unload_agent(&self, page: PageId) -> bool {
        let Ok(mut tabs) = self.tabs.lock() else {
            return false;
        };
        match tabs.get_mut(&page).and_then(|tab| tab.agent.take()) {
            Some(agent) => {
                agent.task.abort();
                debug!("Agent unloaded from page {}", page);
                true
            }
            None => false,
        }
    }

    pub fn close_page(&self, page: PageId) -> bool {
        let Ok(mut tabs) = self.tabs.lock() else {
            return false;
        };
        match tabs.remove(&page) {
            Some(tab) => {
                if let Some(agent) = tab.agent {
                    agent.task.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Privileged pages refuse script injection
    pub fn set_injectable(&self, page: PageId, injectable: bool) {
        if let Ok(mut tabs) = self.tabs.lock() {
            if let Some(tab) = tabs.get_mut(&page) {
                tab.injectable = injectable;
            }
        }
    }

    pub fn has_agent(&self, page: PageId) -> bool {
        self.tabs
            .lock()
            .map(|tabs| {
                tabs.get(&page)
                    .and_then(|tab| tab.agent.as_ref())
                    .is_some_and(|agent| !agent.commands.is_closed())
            })
            .unwrap_or(false)
    }

    pub fn document(&self, page: PageId) -> Option<Arc<Mutex<Document>>> {
        let tabs = self.tabs.lock().ok()?;
        tabs.get(&page).map(|tab| tab.document.clone())
    }

    pub fn status(&self, page: PageId) -> Option<StatusSnapshot> {
        let tabs = self.tabs.lock().ok()?;
        let tab = tabs.get(&page)?;
        let status = tab.status.lock().ok()?;
        Some(status.clone())
    }

    pub fn page_html(&self, page: PageId) -> Option<String> {
        let document = self.document(page)?;
        let doc = document.lock().ok()?;
        Some(doc.to_html())
    }

    /// Make `needle` the page's live selection
    pub fn select_text(&self, page: PageId, needle: &str) -> FuriganaResult<()> {
        let document = self
            .document(page)
            .ok_or(DeliveryError::SendFailed(format!("No tab with id: {}.", page)))?;
        let mut doc = document.lock().map_err(AgentError::from)?;
        doc.select_text(needle)?;
        Ok(())
    }

    /// The user pressed the in-page action
    pub async fn page_action(&self, page: PageId) -> FuriganaResult<ApplyOutcome> {
        let commands = self.agent_commands(page).map_err(DeliveryError::from)?;
        let (done, outcome) = oneshot::channel();
        commands
            .send(AgentCommand::PageAction { done })
            .map_err(|_| DeliveryError::NoReceiver)?;
        let outcome = outcome.await.map_err(|_| DeliveryError::NoReceiver)?;
        Ok(outcome?)
    }

    /// The user clicked `node`. Returns whether an annotation is now highlighted.
    pub async fn click(&self, page: PageId, node: NodeId) -> FuriganaResult<bool> {
        let commands = self.agent_commands(page).map_err(DeliveryError::from)?;
        let (done, outcome) = oneshot::channel();
        commands
            .send(AgentCommand::Click { node, done })
            .map_err(|_| DeliveryError::NoReceiver)?;
        let outcome = outcome.await.map_err(|_| DeliveryError::NoReceiver)?;
        Ok(outcome?)
    }

    /// Total send attempts made through this host
    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// Total injection attempts made through this host
    pub fn injection_count(&self) -> usize {
        self.injections.load(Ordering::SeqCst)
    }

    fn agent_commands(
        &self,
        page: PageId,
    ) -> Result<mpsc::UnboundedSender<AgentCommand>, SendError> {
        let tabs = self
            .tabs
            .lock()
            .map_err(|e| SendError::Failed(e.to_string()))?;
        let tab = tabs.get(&page).ok_or_else(|| no_tab(page))?;
        tab.agent
            .as_ref()
            .map(|agent| agent.commands.clone())
            .ok_or(SendError::NoReceiver)
    }
}

fn no_tab(page: PageId) -> SendError {
    SendError::Failed(format!("No tab with id: {}.", page))
}

#[async_trait]
impl PageChannel for TabHost {
    async fn send(&self, page: PageId, message: &PageMessage) -> Result<(), SendError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        let commands = self.agent_commands(page)?;

        let (ack, handled) = oneshot::channel();
        commands
            .send(AgentCommand::Deliver {
                message: message.clone(),
                ack,
            })
            .map_err(|_| SendError::NoReceiver)?;
        handled.await.map_err(|_| SendError::NoReceiver)
    }

    async fn inject_agent(&self, page: PageId) -> Result<(), SendError> {
        self.injections.fetch_add(1, Ordering::SeqCst);
        self.load_agent(page)?;
        info!("💉 Injected agent into page {}", page);
        Ok(())
    }
}
