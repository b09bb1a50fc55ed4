//! Error types for protocol processing
//!
//! - Declarative protocols fail with [`DeclarativeError`]; individual
//!   validation messages are kept on the processor.
//! - Scripted protocols fail with a [`ScriptFault`] that carries the
//!   offending line of the protocol source.

use std::fmt::{self, Display, Formatter};

/// Errors while processing a declarative protocol
#[derive(Debug, thiserror::Error)]
pub enum DeclarativeError {
    /// Text is not JSON at all
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Document parsed but failed validation
    #[error("protocol failed validation with {0} error(s)")]
    Validation(usize),
}

impl DeclarativeError {
    /// Check if the input was not parseable
    #[inline]
    #[must_use]
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::InvalidJson(_))
    }
}

/// Failure of a scripted protocol, located in its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFault {
    /// 1-based line in the protocol, 0 when the fault is not inside it
    pub line: usize,
    pub message: String,
    /// Trimmed source line, suppressed for faults outside the protocol
    pub snippet: Option<String>,
}

impl ScriptFault {
    /// Fault raised by the interpreter harness rather than protocol code
    #[must_use]
    pub fn harness(message: impl Into<String>) -> Self {
        Self {
            line: 0,
            message: message.into(),
            snippet: None,
        }
    }

    /// Check if the fault points into protocol source
    #[inline]
    #[must_use]
    pub fn in_protocol(&self) -> bool {
        self.line > 0
    }
}

impl Display for ScriptFault {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error in protocol file line {} : {}\n{}",
            self.line,
            self.message,
            self.snippet.as_deref().unwrap_or_default()
        )
    }
}

impl std::error::Error for ScriptFault {}
