//! Stage payload types
//!
//! Each stage has an explicit schema. Stage 1 labels are validated on
//! decode so a malformed pipeline answer is rejected instead of rendered.

use super::PayloadError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

// ============================================================================
// Stage
// ============================================================================

/// One of the three deliberation stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    /// Independent responses from every council member
    #[serde(rename = "stage1")]
    Responses,
    /// Peer rankings of the stage 1 responses
    #[serde(rename = "stage2")]
    Rankings,
    /// Final answer synthesized by the chairman
    #[serde(rename = "stage3")]
    Synthesis,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Responses, Stage::Rankings, Stage::Synthesis];

    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Stage::Responses => 1,
            Stage::Rankings => 2,
            Stage::Synthesis => 3,
        }
    }

    #[must_use]
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Responses => Some(Stage::Rankings),
            Stage::Rankings => Some(Stage::Synthesis),
            Stage::Synthesis => None,
        }
    }

    #[must_use]
    pub fn previous(self) -> Option<Stage> {
        match self {
            Stage::Responses => None,
            Stage::Rankings => Some(Stage::Responses),
            Stage::Synthesis => Some(Stage::Rankings),
        }
    }

    /// Caption shown while the stage is outstanding
    #[must_use]
    pub fn loading_caption(self) -> &'static str {
        match self {
            Stage::Responses => "Running Stage 1: Collecting individual responses...",
            Stage::Rankings => "Running Stage 2: Peer rankings...",
            Stage::Synthesis => "Running Stage 3: Final synthesis...",
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Stage::Responses => "Stage 1: Individual Responses",
            Stage::Rankings => "Stage 2: Peer Rankings",
            Stage::Synthesis => "Stage 3: Final Council Answer",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage{}", self.number())
    }
}

// ============================================================================
// Stage 1
// ============================================================================

/// A single council member's answer, keyed by its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledResponse {
    #[serde(alias = "model")]
    pub label: String,
    pub response: String,
}

impl LabeledResponse {
    #[must_use]
    pub fn new(label: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            response: response.into(),
        }
    }
}

/// Label → response mapping, kept in arrival order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<LabeledResponse>",
    into = "Vec<LabeledResponse>"
)]
pub struct Stage1Payload {
    responses: Vec<LabeledResponse>,
}

impl Stage1Payload {
    /// Build a payload, rejecting empty or repeated labels
    ///
    /// # Errors
    ///
    /// `PayloadError` for an empty or repeated label.
    pub fn new(responses: Vec<LabeledResponse>) -> Result<Self, PayloadError> {
        let mut seen = HashSet::new();
        for response in &responses {
            if response.label.trim().is_empty() {
                return Err(PayloadError::EmptyLabel);
            }
            if !seen.insert(response.label.as_str()) {
                return Err(PayloadError::DuplicateLabel(response.label.clone()));
            }
        }
        Ok(Self { responses })
    }

    /// # Errors
    ///
    /// Same as [`Stage1Payload::new`].
    pub fn from_pairs<L, R>(pairs: impl IntoIterator<Item = (L, R)>) -> Result<Self, PayloadError>
    where
        L: Into<String>,
        R: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(label, response)| LabeledResponse::new(label, response))
                .collect(),
        )
    }

    #[must_use]
    pub fn responses(&self) -> &[LabeledResponse] {
        &self.responses
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<&str> {
        self.responses
            .iter()
            .find(|r| r.label == label)
            .map(|r| r.response.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl TryFrom<Vec<LabeledResponse>> for Stage1Payload {
    type Error = PayloadError;

    fn try_from(responses: Vec<LabeledResponse>) -> Result<Self, Self::Error> {
        Self::new(responses)
    }
}

impl From<Stage1Payload> for Vec<LabeledResponse> {
    fn from(payload: Stage1Payload) -> Self {
        payload.responses
    }
}

// ============================================================================
// Stage 2
// ============================================================================

/// One council member's evaluation of the anonymized responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRanking {
    /// Label of the evaluator
    #[serde(alias = "model")]
    pub label: String,
    /// Free-form evaluation text, referring to responses by label
    #[serde(default, alias = "ranking")]
    pub evaluation: String,
    /// Labels in the order the evaluator ranked them, best first
    #[serde(default)]
    pub parsed_ranking: Vec<String>,
}

impl PeerRanking {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            evaluation: String::new(),
            parsed_ranking: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_evaluation(mut self, evaluation: impl Into<String>) -> Self {
        self.evaluation = evaluation.into();
        self
    }

    #[must_use]
    pub fn with_parsed_ranking<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parsed_ranking = labels.into_iter().map(Into::into).collect();
        self
    }
}

/// Raw peer rankings for a turn
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stage2Payload {
    pub rankings: Vec<PeerRanking>,
}

impl Stage2Payload {
    #[must_use]
    pub fn new(rankings: Vec<PeerRanking>) -> Self {
        Self { rankings }
    }
}

/// Aggregate position of one model across all peer rankings, computed upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRanking {
    pub model: String,
    pub average_rank: f64,
    #[serde(default)]
    pub rankings_count: u32,
}

/// Label resolution and aggregate scores delivered alongside stage 2
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Stage2Metadata {
    #[serde(default)]
    pub label_to_model: BTreeMap<String, String>,
    #[serde(default)]
    pub aggregate_rankings: Vec<AggregateRanking>,
}

impl Stage2Metadata {
    /// Resolve a label to its model identifier, falling back to the label itself
    #[must_use]
    pub fn resolve<'a>(&'a self, label: &'a str) -> &'a str {
        self.label_to_model
            .get(label)
            .map_or(label, String::as_str)
    }
}

/// Stage 2 as stored on a message: rankings plus their metadata
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RankingsResult {
    pub rankings: Stage2Payload,
    pub metadata: Stage2Metadata,
}

// ============================================================================
// Stage 3
// ============================================================================

/// The chairman's synthesized answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage3Payload {
    /// Model that produced the synthesis, when the pipeline reports it
    #[serde(default)]
    pub model: Option<String>,
    pub response: String,
}

impl Stage3Payload {
    #[must_use]
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            model: None,
            response: response.into(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

// ============================================================================
// Stage Update
// ============================================================================

/// A resolved stage result, tagged with the stage it belongs to
#[derive(Debug, Clone, PartialEq)]
pub enum StageUpdate {
    Responses(Stage1Payload),
    Rankings(RankingsResult),
    Synthesis(Stage3Payload),
}

impl StageUpdate {
    #[must_use]
    pub fn rankings(rankings: Stage2Payload, metadata: Stage2Metadata) -> Self {
        StageUpdate::Rankings(RankingsResult { rankings, metadata })
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            StageUpdate::Responses(_) => Stage::Responses,
            StageUpdate::Rankings(_) => Stage::Rankings,
            StageUpdate::Synthesis(_) => Stage::Synthesis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::Responses.next(), Some(Stage::Rankings));
        assert_eq!(Stage::Synthesis.next(), None);
        assert_eq!(Stage::Rankings.previous(), Some(Stage::Responses));
        assert!(Stage::Responses < Stage::Synthesis);
        assert_eq!(Stage::Rankings.to_string(), "stage2");
    }

    #[test]
    fn test_stage1_preserves_arrival_order() {
        let payload = Stage1Payload::from_pairs([("B", "four"), ("A", "4")]).unwrap();
        let labels: Vec<_> = payload.responses().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["B", "A"]);
        assert_eq!(payload.get("A"), Some("4"));
    }

    #[test]
    fn test_stage1_rejects_duplicate_labels() {
        let result = Stage1Payload::from_pairs([("A", "4"), ("A", "four")]);
        assert_eq!(result, Err(PayloadError::DuplicateLabel("A".to_string())));
    }

    #[test]
    fn test_stage1_decode_rejects_empty_label() {
        let json = r#"[{"label": " ", "response": "4"}]"#;
        assert!(serde_json::from_str::<Stage1Payload>(json).is_err());
    }

    #[test]
    fn test_stage1_decodes_model_keyed_entries() {
        let json = r#"[{"model": "openai/gpt-5", "response": "4"}]"#;
        let payload: Stage1Payload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.get("openai/gpt-5"), Some("4"));
    }

    #[test]
    fn test_stage2_decodes_backend_field_names() {
        let json = r#"[{"model": "x/a", "ranking": "Response A is best", "parsed_ranking": ["Response A"]}]"#;
        let payload: Stage2Payload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.rankings[0].label, "x/a");
        assert_eq!(payload.rankings[0].evaluation, "Response A is best");
        assert_eq!(payload.rankings[0].parsed_ranking, vec!["Response A"]);
    }

    #[test]
    fn test_metadata_resolve_falls_back_to_label() {
        let metadata = Stage2Metadata::default();
        assert_eq!(metadata.resolve("A"), "A");

        let mut metadata = Stage2Metadata::default();
        metadata.label_to_model.insert("A".into(), "gpt".into());
        assert_eq!(metadata.resolve("A"), "gpt");
    }
}
