//! Topic error types

use std::fmt;

/// Error type for topic operations
#[derive(Debug)]
pub enum TopicError {
    /// Channel or subscription closed
    ChannelClosed,
    /// Serialization/deserialization error
    Serialization(String),
    /// Stream operation error
    Stream(String),
    /// Consumer group error
    ConsumerGroup(String),
}

impl std::error::Error for TopicError {}

impl fmt::Display for TopicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicError::ChannelClosed => write!(f, "channel closed"),
            TopicError::Serialization(msg) => write!(f, "serialization error: {}", msg),
            TopicError::Stream(msg) => write!(f, "stream error: {}", msg),
            TopicError::ConsumerGroup(msg) => write!(f, "consumer group error: {}", msg),
        }
    }
}
