//! Error types for the event queue client.

use thiserror::Error;

use crate::event_queue::{EventQueueRole, EventQueueState};

/// Problem while invoking a capability.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// HTTP request failed.
    #[error("HTTP request error: {0}")]
    Request(String),

    /// Server returned an unexpected status code.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// The HTTP status code.
        status: u16,
        /// The response body as a string.
        body: String,
    },

    /// The request payload could not be encoded.
    #[error("payload encode error: {0}")]
    Encode(serde_json::Error),

    /// The response body is not valid JSON.
    #[error("response decode error: {0}")]
    Decode(serde_json::Error),
}

/// Lifecycle and configuration errors reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventQueueError {
    /// The capability does not belong to this queue's role.
    #[error("{role} event queue requires capability {expected}, got {found}")]
    RoleMismatch {
        /// The role the queue was built for.
        role: EventQueueRole,
        /// The capability name that role polls.
        expected: &'static str,
        /// The capability name actually bound.
        found: String,
    },

    /// `start` was called on a queue that already left `Idle`.
    #[error("event queue already started (state: {0:?})")]
    AlreadyStarted(EventQueueState),

    /// `stop` was called on a queue that never started.
    #[error("event queue not running")]
    NotRunning,
}

/// Problem decoding one event-queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The response's `events` field is not a list.
    #[error("events field is not a list")]
    EventsNotList,

    /// The entry has no string `message` field.
    #[error("event has no message name")]
    MissingMessageName,

    /// The entry's `body` is not an object.
    #[error("body of {message} is not an object")]
    BodyNotObject {
        /// The message being decoded.
        message: String,
    },

    /// A templated block is not a list of repetitions.
    #[error("block {block} of {message} is not a list")]
    BlockNotList {
        /// The message being decoded.
        message: String,
        /// The offending block.
        block: String,
    },

    /// A repetition of a templated block is not an object.
    #[error("repetition {index} of block {block} in {message} is not an object")]
    RepetitionNotObject {
        /// The message being decoded.
        message: String,
        /// The offending block.
        block: String,
        /// Index of the repetition.
        index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_mismatch_displays() {
        let err = EventQueueError::RoleMismatch {
            role: EventQueueRole::Region,
            expected: "EventQueueGet",
            found: "event_queue".into(),
        };
        assert_eq!(
            err.to_string(),
            "region event queue requires capability EventQueueGet, got event_queue"
        );
    }

    #[test]
    fn decode_error_displays() {
        let err = DecodeError::RepetitionNotObject {
            message: "AgentGroupDataUpdate".into(),
            block: "GroupData".into(),
            index: 2,
        };
        assert_eq!(
            err.to_string(),
            "repetition 2 of block GroupData in AgentGroupDataUpdate is not an object"
        );
    }

    #[test]
    fn unexpected_status_displays() {
        let err = CapabilityError::UnexpectedStatus {
            status: 404,
            body: "gone".into(),
        };
        assert_eq!(err.to_string(), "unexpected status 404: gone");
    }
}
