//! Stage 3: the chairman's final answer

use super::{short_model_name, RichText};
use crate::council::Stage3Payload;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage3View {
    /// Short name of the chairman model, when reported
    pub chairman: Option<String>,
    pub answer: RichText,
}

#[must_use]
pub fn project_stage3(payload: &Stage3Payload) -> Stage3View {
    Stage3View {
        chairman: payload
            .model
            .as_deref()
            .map(|m| short_model_name(m).to_string()),
        answer: RichText::from_markdown(payload.response.as_str()),
    }
}
