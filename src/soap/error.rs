//! Error types for the SOAP parser, compiler and interpreter.

use thiserror::Error;

/// An error raised while parsing, compiling or querying a score.
///
/// Parse and compile errors carry the canonical source line they were
/// detected on so callers can surface it next to the message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SoapError {
    /// Malformed line, signature, duration or command arguments.
    #[error("syntax error: {message} (in `{line}`)")]
    Syntax { message: String, line: String },

    /// A command keyword the notation does not define.
    #[error("unknown command `{command}` (in `{line}`)")]
    UnknownCommand { command: String, line: String },

    /// A tempo curve with no following tempo to end on.
    #[error("tempo curve is never closed by a following TEMPO (in `{line}`)")]
    UnterminatedCurve { line: String },

    /// An event declared after `END`.
    #[error("event declared after END (in `{line}`)")]
    PostEndEvent { line: String },

    /// A structurally valid line that breaks a score invariant.
    #[error("invalid score: {message} (in `{line}`)")]
    InvariantViolation { message: String, line: String },

    /// A query made with an out-of-range argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl SoapError {
    pub fn syntax(message: impl Into<String>, line: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
            line: line.into(),
        }
    }

    pub fn unknown_command(command: impl Into<String>, line: impl Into<String>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
            line: line.into(),
        }
    }

    pub fn unterminated_curve(line: impl Into<String>) -> Self {
        Self::UnterminatedCurve { line: line.into() }
    }

    pub fn post_end(line: impl Into<String>) -> Self {
        Self::PostEndEvent { line: line.into() }
    }

    pub fn invariant(message: impl Into<String>, line: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
            line: line.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Replace the attached source line, e.g. when a literal parser's error
    /// surfaces from inside a whole score line.
    pub fn at_line(self, source: &str) -> Self {
        let source = source.to_string();
        match self {
            Self::Syntax { message, .. } => Self::Syntax {
                message,
                line: source,
            },
            Self::UnknownCommand { command, .. } => Self::UnknownCommand {
                command,
                line: source,
            },
            Self::UnterminatedCurve { .. } => Self::UnterminatedCurve { line: source },
            Self::PostEndEvent { .. } => Self::PostEndEvent { line: source },
            Self::InvariantViolation { message, .. } => Self::InvariantViolation {
                message,
                line: source,
            },
            other @ Self::InvalidArgument(_) => other,
        }
    }

    /// The source line attached to the error, if any.
    pub fn source_line(&self) -> Option<&str> {
        match self {
            Self::Syntax { line, .. }
            | Self::UnknownCommand { line, .. }
            | Self::UnterminatedCurve { line }
            | Self::PostEndEvent { line }
            | Self::InvariantViolation { line, .. } => Some(line),
            Self::InvalidArgument(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_source_line() {
        let err = SoapError::syntax("bad signature", "BAR 1 [4/x]");
        let msg = err.to_string();
        assert!(msg.contains("bad signature"));
        assert!(msg.contains("BAR 1 [4/x]"));
    }

    #[test]
    fn invalid_argument_has_no_line() {
        let err = SoapError::invalid_argument("negative position");
        assert_eq!(err.source_line(), None);
        assert_eq!(
            SoapError::post_end("BAR 3 |1 LABEL \"x\"").source_line(),
            Some("BAR 3 |1 LABEL \"x\"")
        );
    }
}
