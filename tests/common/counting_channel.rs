//! Counting Page Channel for Testing
//!
//! Wraps a real channel and records every send and injection attempt.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use furigana::ipc::{PageChannel, PageId, PageMessage, SendError};

#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Send(PageId, &'static str),
    Inject(PageId),
}

pub struct CountingChannel {
    inner: Arc<dyn PageChannel>,
    pub attempts: Arc<Mutex<Vec<Attempt>>>,
}

impl CountingChannel {
    pub fn new(inner: Arc<dyn PageChannel>) -> Self {
        Self {
            inner,
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn get_attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    /// Send attempts carrying the message tagged `tag`
    pub fn sends_of(&self, tag: &str) -> usize {
        self.get_attempts()
            .iter()
            .filter(|a| matches!(a, Attempt::Send(_, t) if *t == tag))
            .count()
    }

    pub fn injections(&self) -> usize {
        self.get_attempts()
            .iter()
            .filter(|a| matches!(a, Attempt::Inject(_)))
            .count()
    }

    pub fn reset(&self) {
        self.attempts.lock().unwrap().clear();
    }
}

#[async_trait]
impl PageChannel for CountingChannel {
    async fn send(&self, page: PageId, message: &PageMessage) -> Result<(), SendError> {
        self.attempts
            .lock()
            .unwrap()
            .push(Attempt::Send(page, message.tag()));
        self.inner.send(page, message).await
    }

    async fn inject_agent(&self, page: PageId) -> Result<(), SendError> {
        self.attempts.lock().unwrap().push(Attempt::Inject(page));
        self.inner.inject_agent(page).await
    }
}
