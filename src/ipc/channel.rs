//! Page channel
//!
//! The background's view of the pages it can talk to.

use async_trait::async_trait;
use thiserror::Error;

use super::{PageId, PageMessage};
use crate::error::DeliveryError;

/// Why a single send attempt failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The page has no active agent (never loaded, or torn down)
    #[error("Could not establish connection. Receiving end does not exist.")]
    NoReceiver,

    #[error("{0}")]
    Failed(String),
}

impl From<SendError> for DeliveryError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::NoReceiver => DeliveryError::NoReceiver,
            SendError::Failed(reason) => DeliveryError::SendFailed(reason),
        }
    }
}

#[async_trait]
pub trait PageChannel: Send + Sync {
    /// Send one message and wait until the page agent has handled it
    async fn send(&self, page: PageId, message: &PageMessage) -> Result<(), SendError>;

    /// Load a fresh agent into the page
    async fn inject_agent(&self, page: PageId) -> Result<(), SendError>;
}
