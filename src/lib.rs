//! LLM Council client
//!
//! Talks to a council backend that fans a question out to several models,
//! has them rank each other anonymously, and lets a chairman model write
//! the final answer. Conversations are driven by a pure state machine; the
//! runtime applies its effects and the terminal front-end renders
//! projections of the shared workspace.

pub mod api;
pub mod config;
pub mod conversation;
pub mod council;
pub mod render;
pub mod runtime;
pub mod state_machine;
pub mod tui;
