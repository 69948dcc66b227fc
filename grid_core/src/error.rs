//! Error types for the core message layer.

use thiserror::Error;

/// Problem while handing a message to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The dispatcher refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// The dispatcher has been shut down.
    #[error("dispatcher closed")]
    Closed,
}

/// Problem while parsing a home location string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HomeParseError {
    /// A field name outside the allowed set.
    #[error("unknown home field: {0}")]
    UnknownField(String),

    /// A required field is absent.
    #[error("missing home field: {0}")]
    MissingField(&'static str),

    /// A field appears more than once.
    #[error("duplicate home field: {0}")]
    DuplicateField(&'static str),

    /// The value is not one of the accepted literal forms.
    #[error("invalid literal for {field}: {literal}")]
    InvalidLiteral {
        /// The field being parsed.
        field: String,

        /// The offending text.
        literal: String,
    },

    /// The value has the wrong number of components.
    #[error("{field} expects {expected} components, found {found}")]
    WrongArity {
        /// The field being parsed.
        field: &'static str,

        /// Components required.
        expected: usize,

        /// Components present.
        found: usize,
    },

    /// The input does not have the `{'name':value, ...}` shape.
    #[error("malformed home location: {0}")]
    Malformed(String),
}
