//! Status surface
//!
//! The transient panel the agent reports to. A message stays fully visible
//! for a fixed time, fades, then hides. Every new message re-arms the timer
//! instead of stacking another one.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

pub const STATUS_VISIBLE_FOR: Duration = Duration::from_secs(4);
pub const STATUS_FADE_FOR: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Hidden,
    Visible,
    Fading,
}

/// What the panel currently shows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub message: Option<String>,
    pub kind: Option<StatusKind>,
    pub visibility: Visibility,
}

#[derive(Debug, Default)]
pub struct StatusSurface {
    state: Arc<Mutex<StatusSnapshot>>,
    timer: Option<JoinHandle<()>>,
}

impl StatusSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface drawing into an existing panel, so a re-injected agent
    /// reuses the page's panel instead of adding a second one
    pub fn with_state(state: Arc<Mutex<StatusSnapshot>>) -> Self {
        Self {
            state,
            timer: None,
        }
    }

    /// Show `message` and restart the dismiss timer. Needs a tokio runtime.
    pub fn show(&mut self, kind: StatusKind, message: impl Into<String>) {
        let message = message.into();
        debug!("🪧 Status ({:?}): {}", kind, message);

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        if let Ok(mut state) = self.state.lock() {
            *state = StatusSnapshot {
                message: Some(message),
                kind: Some(kind),
                visibility: Visibility::Visible,
            };
        }

        let state = self.state.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(STATUS_VISIBLE_FOR).await;
            if let Ok(mut s) = state.lock() {
                s.visibility = Visibility::Fading;
            }
            tokio::time::sleep(STATUS_FADE_FOR).await;
            if let Ok(mut s) = state.lock() {
                *s = StatusSnapshot::default();
            }
        }));
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl Drop for StatusSurface {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
