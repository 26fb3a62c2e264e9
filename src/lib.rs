//! Furigana Maker Library
//!
//! Selection capture, cross-context delivery and response normalization for
//! adding furigana to Japanese text in a page.

pub mod audit;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod error;
pub mod host;
pub mod ipc;
pub mod page;
