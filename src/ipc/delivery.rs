//! Delivery protocol
//!
//! Gets a message into a specific page. When the page has no receiver the
//! agent is injected once and the send retried once; anything else is
//! reported as undeliverable.

use tracing::{debug, info, warn};

use super::{DeliveryGuarantee, PageChannel, PageId, PageMessage, SendError};
use crate::error::DeliveryError;

/// How a delivery attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Delivered on the retry after injecting the agent
    DeliveredAfterInjection,
    Undeliverable(DeliveryError),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        !matches!(self, DeliveryOutcome::Undeliverable(_))
    }
}

/// Deliver `message` to `page`, honouring the message's delivery guarantee
pub async fn deliver(
    channel: &dyn PageChannel,
    page: PageId,
    message: &PageMessage,
) -> DeliveryOutcome {
    let outcome = match message.guarantee() {
        DeliveryGuarantee::BestEffort => send_best_effort(channel, page, message).await,
        DeliveryGuarantee::Remedial => send_with_remedy(channel, page, message).await,
    };

    if let DeliveryOutcome::Undeliverable(ref reason) = outcome {
        warn!("📭 {} undeliverable to page {}: {}", message.tag(), page, reason);
    }
    outcome
}

/// One attempt, no remedy
pub async fn send_best_effort(
    channel: &dyn PageChannel,
    page: PageId,
    message: &PageMessage,
) -> DeliveryOutcome {
    match channel.send(page, message).await {
        Ok(()) => DeliveryOutcome::Delivered,
        Err(e) => DeliveryOutcome::Undeliverable(e.into()),
    }
}

async fn send_with_remedy(
    channel: &dyn PageChannel,
    page: PageId,
    message: &PageMessage,
) -> DeliveryOutcome {
    match channel.send(page, message).await {
        Ok(()) => return DeliveryOutcome::Delivered,
        Err(SendError::Failed(reason)) => {
            return DeliveryOutcome::Undeliverable(DeliveryError::SendFailed(reason));
        }
        Err(SendError::NoReceiver) => {
            debug!("No agent in page {}, injecting", page);
        }
    }

    if let Err(e) = channel.inject_agent(page).await {
        return DeliveryOutcome::Undeliverable(DeliveryError::InjectionFailed(e.to_string()));
    }
    info!("💉 Agent injected into page {}", page);

    match channel.send(page, message).await {
        Ok(()) => DeliveryOutcome::DeliveredAfterInjection,
        Err(e) => DeliveryOutcome::Undeliverable(DeliveryError::RetryFailed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::AnnotationResult;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted send results and counts calls
    struct ScriptedChannel {
        sends: Mutex<VecDeque<Result<(), SendError>>>,
        inject: Result<(), SendError>,
        send_count: Mutex<usize>,
        inject_count: Mutex<usize>,
    }

    impl ScriptedChannel {
        fn new(sends: Vec<Result<(), SendError>>, inject: Result<(), SendError>) -> Self {
            Self {
                sends: Mutex::new(sends.into()),
                inject,
                send_count: Mutex::new(0),
                inject_count: Mutex::new(0),
            }
        }

        fn counts(&self) -> (usize, usize) {
            (*self.send_count.lock().unwrap(), *self.inject_count.lock().unwrap())
        }
    }

    #[async_trait]
    impl PageChannel for ScriptedChannel {
        async fn send(&self, _page: PageId, _message: &PageMessage) -> Result<(), SendError> {
            *self.send_count.lock().unwrap() += 1;
            self.sends.lock().unwrap().pop_front().unwrap_or(Err(SendError::NoReceiver))
        }

        async fn inject_agent(&self, _page: PageId) -> Result<(), SendError> {
            *self.inject_count.lock().unwrap() += 1;
            self.inject.clone()
        }
    }

    fn apply() -> PageMessage {
        PageMessage::ApplyResult(AnnotationResult::annotated("x"))
    }

    #[tokio::test]
    async fn test_present_agent_single_send() {
        let channel = ScriptedChannel::new(vec![Ok(())], Ok(()));
        let outcome = deliver(&channel, 1, &apply()).await;
        assert_eq!(outcome, DeliveryOutcome::Delivered);
        assert_eq!(channel.counts(), (1, 0));
    }

    #[tokio::test]
    async fn test_missing_agent_injects_once_and_retries_once() {
        let channel = ScriptedChannel::new(vec![Err(SendError::NoReceiver), Ok(())], Ok(()));
        let outcome = deliver(&channel, 1, &apply()).await;
        assert_eq!(outcome, DeliveryOutcome::DeliveredAfterInjection);
        assert_eq!(channel.counts(), (2, 1));
    }

    #[tokio::test]
    async fn test_second_failure_gives_up() {
        let channel = ScriptedChannel::new(
            vec![Err(SendError::NoReceiver), Err(SendError::NoReceiver)],
            Ok(()),
        );
        let outcome = deliver(&channel, 1, &apply()).await;
        assert!(matches!(outcome, DeliveryOutcome::Undeliverable(DeliveryError::RetryFailed(_))));
        assert_eq!(channel.counts(), (2, 1));
    }

    #[tokio::test]
    async fn test_injection_failure_skips_retry() {
        let channel = ScriptedChannel::new(
            vec![Err(SendError::NoReceiver)],
            Err(SendError::Failed("Cannot access contents of the page".to_string())),
        );
        let outcome = deliver(&channel, 1, &apply()).await;
        assert!(matches!(outcome, DeliveryOutcome::Undeliverable(DeliveryError::InjectionFailed(_))));
        assert_eq!(channel.counts(), (1, 1));
    }

    #[tokio::test]
    async fn test_other_failure_is_not_remedied() {
        let channel = ScriptedChannel::new(vec![Err(SendError::Failed("No tab with id: 7".to_string()))], Ok(()));
        let outcome = deliver(&channel, 7, &apply()).await;
        assert_eq!(
            outcome,
            DeliveryOutcome::Undeliverable(DeliveryError::SendFailed("No tab with id: 7".to_string()))
        );
        assert_eq!(channel.counts(), (1, 0));
    }

    #[tokio::test]
    async fn test_best_effort_never_injects() {
        let channel = ScriptedChannel::new(vec![Err(SendError::NoReceiver)], Ok(()));
        let outcome = deliver(&channel, 1, &PageMessage::CacheSelection).await;
        assert_eq!(outcome, DeliveryOutcome::Undeliverable(DeliveryError::NoReceiver));
        assert_eq!(channel.counts(), (1, 0));
    }
}
