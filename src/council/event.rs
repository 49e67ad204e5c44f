//! Events emitted by a running council pipeline

use super::{Stage, StageUpdate};

/// One item of the ordered stream returned by a council run
///
/// A well-behaved pipeline emits each stage at most once, in stage order,
/// and terminates with `Complete` or `Failed`. The controller does not rely
/// on this: out-of-order items are rejected by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// The pipeline began working on a stage
    StageStarted(Stage),
    /// A stage produced its result
    StageCompleted(StageUpdate),
    /// A title was generated for the conversation
    TitleGenerated(String),
    /// The council reported an error for the outstanding stage
    Failed { message: String },
    /// The run is finished
    Complete,
}
