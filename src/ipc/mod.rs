//! Cross-context messaging
//!
//! The background coordinator and the page agents share no memory; they talk
//! only through tagged JSON-shaped messages. Page messages carry a delivery
//! guarantee: best-effort sends are tried once, remedial sends get one agent
//! injection and one retry when the page has no receiver.

pub mod channel;
pub mod delivery;
pub mod messages;

pub use channel::{PageChannel, SendError};
pub use delivery::{deliver, send_best_effort, DeliveryOutcome};
pub use messages::*;
