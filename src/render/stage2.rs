//! Stage 2: peer evaluations with labels resolved to models
//!
//! Aggregate scores are displayed as delivered; nothing is recomputed here.

use super::{short_model_name, RichText};
use crate::council::{AggregateRanking, RankingsResult, Stage2Metadata};
use serde::Serialize;

/// One row of the aggregate table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    /// 1-based position as delivered
    pub position: usize,
    pub model: String,
    pub short_name: String,
    pub average_rank: f64,
    pub rankings_count: u32,
}

impl AggregateRow {
    fn new(position: usize, aggregate: &AggregateRanking) -> Self {
        Self {
            position,
            model: aggregate.model.clone(),
            short_name: short_model_name(&aggregate.model).to_string(),
            average_rank: aggregate.average_rank,
            rankings_count: aggregate.rankings_count,
        }
    }

    #[must_use]
    pub fn average_caption(&self) -> String {
        format!("Avg: {:.2}", self.average_rank)
    }

    #[must_use]
    pub fn votes_caption(&self) -> String {
        format!("({} votes)", self.rankings_count)
    }
}

/// An entry of an evaluator's extracted ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub label: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationView {
    pub label: String,
    /// Resolved evaluator, or the literal label when unknown
    pub evaluator: String,
    pub tab: String,
    /// Evaluation text with labels replaced by model names
    pub text: RichText,
    pub parsed_ranking: Vec<RankedEntry>,
    /// Aggregate score of the evaluator's model, if one was delivered
    pub aggregate: Option<AggregateRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage2View {
    pub evaluations: Vec<EvaluationView>,
    pub aggregate: Vec<AggregateRow>,
}

#[must_use]
pub fn project_stage2(result: &RankingsResult) -> Stage2View {
    let metadata = &result.metadata;
    let aggregate: Vec<AggregateRow> = metadata
        .aggregate_rankings
        .iter()
        .enumerate()
        .map(|(i, a)| AggregateRow::new(i + 1, a))
        .collect();

    let evaluations = result
        .rankings
        .rankings
        .iter()
        .map(|ranking| {
            let evaluator = metadata.resolve(&ranking.label);
            EvaluationView {
                label: ranking.label.clone(),
                evaluator: evaluator.to_string(),
                tab: short_model_name(evaluator).to_string(),
                text: RichText::from_markdown(deanonymize(&ranking.evaluation, metadata)),
                parsed_ranking: ranking
                    .parsed_ranking
                    .iter()
                    .map(|label| RankedEntry {
                        label: label.clone(),
                        model: metadata.resolve(label).to_string(),
                    })
                    .collect(),
                aggregate: aggregate.iter().find(|row| row.model == evaluator).cloned(),
            }
        })
        .collect();

    Stage2View {
        evaluations,
        aggregate,
    }
}

/// Replace every label occurrence with the bold short model name.
///
/// Longer labels win over labels they contain ("Response AB" before
/// "Response A"), and replaced text is never matched again.
#[must_use]
pub fn deanonymize(text: &str, metadata: &Stage2Metadata) -> String {
    let mut labels: Vec<(&str, String)> = metadata
        .label_to_model
        .iter()
        .filter(|(label, _)| !label.is_empty())
        .map(|(label, model)| (label.as_str(), format!("**{}**", short_model_name(model))))
        .collect();
    if labels.is_empty() {
        return text.to_string();
    }
    labels.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'scan: while !rest.is_empty() {
        for (label, replacement) in &labels {
            if let Some(tail) = rest.strip_prefix(*label) {
                out.push_str(replacement);
                rest = tail;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}
