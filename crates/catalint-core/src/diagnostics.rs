//! Diagnostics emitted when a rule fires on a message

use crate::message::{MessagePair, MessagePart};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity attached to a diagnostic.
///
/// Rule files do not carry a severity, so every rule starts at
/// [`Severity::Warning`]; configuration can remap individual rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    /// Informational messages
    Info,
    /// Hints for improvements
    Hint,
    /// Warnings that should be addressed
    #[default]
    Warning,
    /// Errors that must be fixed
    Error,
    /// Any other label a caller wants to carry through
    Custom(String),
}

impl Severity {
    /// Get the slug for this severity
    pub fn slug(&self) -> &str {
        match self {
            Severity::Info => "info",
            Severity::Hint => "hint",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Custom(name) => name.as_str(),
        }
    }

    /// Parse a severity, mapping unknown slugs to custom severities
    pub fn from_slug(slug: &str) -> Self {
        match slug {
            "info" => Severity::Info,
            "hint" => Severity::Hint,
            "warn" | "warning" => Severity::Warning,
            "error" => Severity::Error,
            other => Severity::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl Serialize for Severity {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.slug())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let slug = String::deserialize(deserializer)?;
        Ok(Severity::from_slug(&slug))
    }
}

/// Where in a message the trigger matched.
///
/// Offsets are byte offsets into the text of `part`; `item` is the target
/// form index for plural targets and 0 otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedSpan {
    pub part: MessagePart,
    pub item: usize,
    pub start: usize,
    pub end: usize,
}

impl MatchedSpan {
    pub fn new(part: MessagePart, item: usize, start: usize, end: usize) -> Self {
        Self {
            part,
            item,
            start,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A rule violation found in one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub rule_id: String,
    pub message_id: String,
    /// Catalog position of the message, used to order output
    pub position: usize,
    pub catalog: String,
    pub locale: String,
    pub severity: Severity,
    pub hint: String,
    pub span: MatchedSpan,
    pub matched_text: String,
}

impl Diagnostic {
    /// Create a diagnostic for `message` with an empty hint
    pub fn new(rule_id: impl Into<String>, message: &MessagePair, span: MatchedSpan) -> Self {
        Self {
            rule_id: rule_id.into(),
            message_id: message.id.clone(),
            position: message.position,
            catalog: message.catalog.clone(),
            locale: message.locale.clone(),
            severity: Severity::default(),
            hint: String::new(),
            span,
            matched_text: String::new(),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_matched_text(mut self, text: impl Into<String>) -> Self {
        self.matched_text = text.into();
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: [{}] {}",
            self.catalog, self.message_id, self.rule_id, self.hint
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_slugs() {
        assert_eq!(Severity::from_slug("warn"), Severity::Warning);
        assert_eq!(Severity::from_slug("error").to_string(), "error");
        assert_eq!(
            Severity::from_slug("typography"),
            Severity::Custom("typography".to_string())
        );
        assert_eq!(Severity::default(), Severity::Warning);
    }

    #[test]
    fn test_diagnostic_display() {
        let message = MessagePair::new(3, "ca", "Select folder", "Trieu la carpeta:")
            .with_catalog("dolphin")
            .with_id("17");
        let diagnostic = Diagnostic::new(
            "punctuation-colon-no",
            &message,
            MatchedSpan::new(MessagePart::Target, 0, 16, 17),
        )
        .with_hint("Colon in the translation but not in the original");

        assert_eq!(
            diagnostic.to_string(),
            "dolphin:17: [punctuation-colon-no] Colon in the translation but not in the original"
        );
        assert_eq!(diagnostic.position, 3);
        assert_eq!(diagnostic.span.len(), 1);
    }

    #[test]
    fn test_severity_serializes_as_slug() {
        let json = serde_json::to_string(&Severity::Custom("style".into())).unwrap();
        assert_eq!(json, "\"style\"");
        let back: Severity = serde_json::from_str("\"hint\"").unwrap();
        assert_eq!(back, Severity::Hint);
    }
}
