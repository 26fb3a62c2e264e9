//! Page context
//!
//! Everything that lives inside one loaded page: the document model, HTML
//! fragments, the status surface, and the selection agent that owns the
//! page's volatile selection state.

pub mod agent;
pub mod dom;
pub mod fragment;
pub mod status;

pub use agent::{AgentCommand, ApplyOutcome, SelectionAgent};
pub use dom::{Boundary, Document, NodeId, SelectionRange};
pub use fragment::Fragment;
pub use status::{StatusKind, StatusSnapshot, StatusSurface, Visibility};

/// Class carried by every annotation spliced into the page
pub const ANNOTATION_CLASS: &str = "furigana-annotation";

/// Class of the one annotation currently highlighted
pub const ACTIVE_CLASS: &str = "furigana-active";

pub const APPLIED_MESSAGE: &str = "Furigana applied to the selected text.";
pub const NO_PAGE_TEXT_MESSAGE: &str = "No text found on the page.";
pub const BACKGROUND_UNAVAILABLE_MESSAGE: &str = "Background service unavailable.";
