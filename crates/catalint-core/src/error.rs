//! Error types for rule loading, catalog reading and message evaluation

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for catalint operations
#[derive(Debug, Error)]
pub enum CatalintError {
    /// Malformed rule file line (bad quoting, unknown directive, ...)
    #[error("{path}:{line}: {message}")]
    RuleSyntax {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A rule whose trigger or exception cannot be compiled, or that misses a required field
    #[error("Rule '{rule_id}' failed to compile ({field}): {message}")]
    RuleCompile {
        rule_id: String,
        field: String,
        message: String,
    },

    /// Two rules with the same id in the same environment
    #[error("Duplicate rule id '{rule_id}' (first defined at {first}, again at {second})")]
    DuplicateRuleId {
        rule_id: String,
        first: String,
        second: String,
    },

    /// A single catalog entry could not be read
    #[error("Cannot read entry {entry} of '{source_name}': {message}")]
    CatalogParse {
        source_name: String,
        entry: usize,
        message: String,
    },

    /// A rule references a lexicon no provider was registered for
    #[error("Lexicon '{name}' is not available")]
    LexiconUnavailable { name: String },

    /// Evaluating one message failed; the run continues with the next one
    #[error("Evaluation of message '{message_id}' failed: {message}")]
    Evaluation { message_id: String, message: String },

    /// Configuration loading or validation errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// File system I/O errors
    #[error("IO error for path '{path}': {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    InternalError { message: String },
}

/// Error kind enumeration for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RuleSyntax,
    RuleCompile,
    CatalogParse,
    Lexicon,
    Evaluation,
    Config,
    Io,
    Internal,
}

impl CatalintError {
    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalintError::RuleSyntax { .. } => ErrorKind::RuleSyntax,
            CatalintError::RuleCompile { .. } | CatalintError::DuplicateRuleId { .. } => {
                ErrorKind::RuleCompile
            }
            CatalintError::CatalogParse { .. } => ErrorKind::CatalogParse,
            CatalintError::LexiconUnavailable { .. } => ErrorKind::Lexicon,
            CatalintError::Evaluation { .. } => ErrorKind::Evaluation,
            CatalintError::ConfigError { .. } => ErrorKind::Config,
            CatalintError::IoError { .. } => ErrorKind::Io,
            CatalintError::InternalError { .. } => ErrorKind::Internal,
        }
    }

    /// Check if this error only affects a single item, so processing can go on
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::CatalogParse | ErrorKind::Lexicon | ErrorKind::Evaluation
        )
    }

    /// Create a rule file syntax error
    pub fn syntax_error(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::RuleSyntax {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a rule compile error
    pub fn compile_error(
        rule_id: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RuleCompile {
            rule_id: rule_id.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a catalog entry error
    pub fn catalog_error(
        source_name: impl Into<String>,
        entry: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::CatalogParse {
            source_name: source_name.into(),
            entry,
            message: message.into(),
        }
    }

    /// Create an evaluation error attributed to one message
    pub fn evaluation_error(message_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Evaluation {
            message_id: message_id.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create an IO error with path context
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }

    /// Create an internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for CatalintError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            path: PathBuf::new(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_names_rule_and_field() {
        let err = CatalintError::compile_error("punctuation-colon", "trigger", "unclosed group");
        let text = err.to_string();
        assert!(text.contains("punctuation-colon"));
        assert!(text.contains("trigger"));
        assert_eq!(err.kind(), ErrorKind::RuleCompile);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_item_errors_are_recoverable() {
        assert!(CatalintError::catalog_error("ca.po", 3, "bad string").is_recoverable());
        assert!(CatalintError::evaluation_error("12", "backtrack limit").is_recoverable());
        assert!(
            CatalintError::LexiconUnavailable {
                name: "words".into()
            }
            .is_recoverable()
        );
        assert!(!CatalintError::config_error("nope").is_recoverable());
    }

    #[test]
    fn test_syntax_error_display() {
        let err = CatalintError::syntax_error("rules/ca.rules", 7, "unterminated quote");
        assert_eq!(err.to_string(), "rules/ca.rules:7: unterminated quote");
    }
}
