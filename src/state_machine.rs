//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! the controller feeds events in, applies the returned effects, and never
//! decides stage ordering itself.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, Notice};
pub use event::Event;
pub use state::{ConvContext, ConvState};
pub use transition::{transition, TransitionError, TransitionResult};
