//! Conversation batch validator.
//!
//! Checks the shape of a whole message array before any per-message
//! screening: it must be an array, non-empty, within the message count,
//! each message within the per-message length, the total within the
//! conversation budget, and every role from the closed vocabulary. Any
//! violation rejects the entire batch.

use serde_json::Value;
use thiserror::Error;
use tollgate_core::config::SafetyConfig;
use tollgate_core::{BatchVerdict, ChatMessage, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_messages: usize,
    pub max_message_chars: usize,
    pub max_conversation_chars: usize,
}

impl From<&SafetyConfig> for BatchLimits {
    fn from(config: &SafetyConfig) -> Self {
        Self {
            max_messages: config.max_messages,
            max_message_chars: config.max_message_chars,
            max_conversation_chars: config.max_conversation_chars,
        }
    }
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self::from(&SafetyConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchRejection {
    #[error("Messages must be an array.")]
    NotArray,

    #[error("The conversation is empty.")]
    Empty,

    #[error("The conversation has too many messages (max {max}). Please start a new conversation.")]
    TooManyMessages { max: usize },

    #[error("Message {index} is malformed.")]
    Malformed { index: usize },

    #[error("Message {index} has an unsupported role.")]
    InvalidRole { index: usize },

    #[error("Message {index} is too long (max {max} characters).")]
    MessageTooLong { index: usize, max: usize },

    #[error("The conversation is too long (max {max} characters). Please start a new conversation.")]
    ConversationTooLong { max: usize },
}

/// Parse and validate a conversation array.
pub fn parse_batch(value: &Value, limits: &BatchLimits) -> Result<Vec<ChatMessage>, BatchRejection> {
    let items = value.as_array().ok_or(BatchRejection::NotArray)?;
    if items.is_empty() {
        return Err(BatchRejection::Empty);
    }
    if items.len() > limits.max_messages {
        return Err(BatchRejection::TooManyMessages {
            max: limits.max_messages,
        });
    }

    let mut parsed = Vec::with_capacity(items.len());
    let mut total_chars = 0usize;
    for (index, item) in items.iter().enumerate() {
        let obj = item.as_object().ok_or(BatchRejection::Malformed { index })?;
        let role = obj
            .get("role")
            .and_then(Value::as_str)
            .ok_or(BatchRejection::Malformed { index })?;
        let role = Role::parse(role).ok_or(BatchRejection::InvalidRole { index })?;
        let content = obj
            .get("content")
            .and_then(Value::as_str)
            .ok_or(BatchRejection::Malformed { index })?;

        let chars = content.chars().count();
        if chars > limits.max_message_chars {
            return Err(BatchRejection::MessageTooLong {
                index,
                max: limits.max_message_chars,
            });
        }
        total_chars += chars;
        if total_chars > limits.max_conversation_chars {
            return Err(BatchRejection::ConversationTooLong {
                max: limits.max_conversation_chars,
            });
        }

        parsed.push(ChatMessage {
            role,
            content: content.to_string(),
        });
    }
    Ok(parsed)
}

pub fn validate_batch(value: &Value, limits: &BatchLimits) -> BatchVerdict {
    match parse_batch(value, limits) {
        Ok(parsed) => BatchVerdict::pass(parsed),
        Err(rejection) => BatchVerdict::reject(rejection.to_string()),
    }
}
