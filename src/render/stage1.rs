//! Stage 1: one card per council member, in arrival order

use super::{short_model_name, RichText};
use crate::council::Stage1Payload;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseCard {
    pub label: String,
    /// Tab caption
    pub tab: String,
    pub content: RichText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage1View {
    pub cards: Vec<ResponseCard>,
}

#[must_use]
pub fn project_stage1(payload: &Stage1Payload) -> Stage1View {
    Stage1View {
        cards: payload
            .responses()
            .iter()
            .map(|r| ResponseCard {
                label: r.label.clone(),
                tab: short_model_name(&r.label).to_string(),
                content: RichText::from_markdown(r.response.as_str()),
            })
            .collect(),
    }
}
