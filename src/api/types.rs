//! Wire types of the council backend

use crate::conversation::{AssistantTurn, Conversation, ConversationSummary, MessageRecord};
use crate::council::{
    PipelineEvent, RankingsResult, Stage, Stage1Payload, Stage2Metadata, Stage2Payload,
    Stage3Payload, StageUpdate,
};
use crate::runtime::StoreError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to send a message
#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub content: &'a str,
}

/// Request to create a conversation (the backend takes no fields)
#[derive(Debug, Default, Serialize)]
pub struct CreateConversationRequest {}

// ============================================================================
// Stream Frames
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TitleData {
    pub title: String,
}

/// One `data:` frame of the message stream
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum WireEvent {
    #[serde(rename = "stage1_start")]
    Stage1Start,
    #[serde(rename = "stage1_complete")]
    Stage1Complete { data: Stage1Payload },
    #[serde(rename = "stage2_start")]
    Stage2Start,
    #[serde(rename = "stage2_complete")]
    Stage2Complete {
        data: Stage2Payload,
        #[serde(default)]
        metadata: Stage2Metadata,
    },
    #[serde(rename = "stage3_start")]
    Stage3Start,
    #[serde(rename = "stage3_complete")]
    Stage3Complete { data: Stage3Payload },
    #[serde(rename = "title_complete")]
    TitleComplete { data: TitleData },
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Unknown,
}

impl WireEvent {
    /// Pipeline event for this frame; `None` for frame types we do not handle
    #[must_use]
    pub fn into_pipeline_event(self) -> Option<PipelineEvent> {
        let event = match self {
            WireEvent::Stage1Start => PipelineEvent::StageStarted(Stage::Responses),
            WireEvent::Stage2Start => PipelineEvent::StageStarted(Stage::Rankings),
            WireEvent::Stage3Start => PipelineEvent::StageStarted(Stage::Synthesis),
            WireEvent::Stage1Complete { data } => {
                PipelineEvent::StageCompleted(StageUpdate::Responses(data))
            }
            WireEvent::Stage2Complete { data, metadata } => {
                PipelineEvent::StageCompleted(StageUpdate::rankings(data, metadata))
            }
            WireEvent::Stage3Complete { data } => {
                PipelineEvent::StageCompleted(StageUpdate::Synthesis(data))
            }
            WireEvent::TitleComplete { data } => PipelineEvent::TitleGenerated(data.title),
            WireEvent::Complete => PipelineEvent::Complete,
            WireEvent::Error { message } => PipelineEvent::Failed {
                message: if message.is_empty() {
                    "Council reported an error".to_string()
                } else {
                    message
                },
            },
            WireEvent::Unknown => return None,
        };
        Some(event)
    }
}

// ============================================================================
// Stored Conversations
// ============================================================================

/// Listing entry
#[derive(Debug, Deserialize)]
pub struct StoredSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub message_count: usize,
}

impl From<StoredSummary> for ConversationSummary {
    fn from(stored: StoredSummary) -> Self {
        ConversationSummary {
            created_at: parse_timestamp(&stored.created_at),
            id: stored.id,
            title: stored.title,
            message_count: stored.message_count,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum StoredMessage {
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        stage1: Option<Stage1Payload>,
        #[serde(default)]
        stage2: Option<Stage2Payload>,
        #[serde(default)]
        stage3: Option<Stage3Payload>,
        /// Stored turns usually lack it; labels then render literally
        #[serde(default)]
        metadata: Option<Stage2Metadata>,
    },
}

impl StoredMessage {
    fn into_record(self) -> Result<MessageRecord, StoreError> {
        match self {
            StoredMessage::User { content } => Ok(MessageRecord::User { content }),
            StoredMessage::Assistant {
                stage1,
                stage2,
                stage3,
                metadata,
            } => {
                let stage2 = stage2.map(|rankings| RankingsResult {
                    rankings,
                    metadata: metadata.unwrap_or_default(),
                });
                AssistantTurn::restore(stage1, stage2, stage3)
                    .map(MessageRecord::Assistant)
                    .map_err(|e| StoreError::Malformed(e.to_string()))
            }
        }
    }
}

/// A conversation with its full history
#[derive(Debug, Deserialize)]
pub struct StoredConversation {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

impl StoredConversation {
    #[must_use]
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: parse_timestamp(&self.created_at),
            message_count: self.messages.len(),
        }
    }

    /// # Errors
    ///
    /// `StoreError::Malformed` when a stored assistant message has stages out of order.
    pub fn into_conversation(self) -> Result<Conversation, StoreError> {
        let created_at = parse_timestamp(&self.created_at);
        let messages = self
            .messages
            .into_iter()
            .map(StoredMessage::into_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Conversation::with_messages(
            self.id, self.title, created_at, messages,
        ))
    }
}

/// Parse an RFC 3339 or naive ISO-8601 timestamp; naive values are UTC
fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc()))
        .unwrap_or_else(|_| {
            tracing::warn!(value = %s, "Unparseable timestamp, using now");
            Utc::now()
        })
}
