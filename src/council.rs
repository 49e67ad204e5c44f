//! Council pipeline vocabulary
//!
//! Typed payloads for the three deliberation stages and the events a
//! council pipeline emits while it works through them.

mod error;
mod event;
mod payload;

pub use error::{PayloadError, PipelineError, PipelineErrorKind};
pub use event::PipelineEvent;
pub use payload::*;
