//! Compiled rules

use crate::definition::RuleOrigin;
use crate::exceptions::ValidEntry;
use crate::pattern::CompiledPattern;
use catalint_core::{MessagePart, Severity};
use serde::Serialize;

/// Compiled trigger: the pattern and the part it scans
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTrigger {
    pub part: MessagePart,
    pub pattern: CompiledPattern,
}

/// A rule ready for evaluation
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub trigger: CompiledTrigger,
    pub valid: Vec<ValidEntry>,
    pub hint: Option<String>,
    pub severity: Severity,
    pub environment: Option<String>,
    pub disabled: bool,
    /// Index of the message filter set in the owning rule set
    pub filter_set: Option<usize>,
    /// Lexicons consulted by the exceptions, sorted and deduplicated
    pub lexicons: Vec<String>,
    pub origin: RuleOrigin,
}

impl Rule {
    pub fn is_case_insensitive(&self) -> bool {
        self.trigger.pattern.is_case_insensitive()
    }

    /// Serializable overview for listings
    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            id: self.id.clone(),
            part: self.trigger.part.keyword().into_owned(),
            pattern: self.trigger.pattern.source().to_string(),
            case_insensitive: self.is_case_insensitive(),
            exceptions: self.valid.len(),
            hint: self.hint.clone(),
            severity: self.severity.slug().to_string(),
            environment: self.environment.clone(),
            disabled: self.disabled,
            lexicons: self.lexicons.clone(),
            origin: self.origin.to_string(),
        }
    }
}

/// What `rules list` and `rules explain` show about a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    pub id: String,
    pub part: String,
    pub pattern: String,
    pub case_insensitive: bool,
    pub exceptions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lexicons: Vec<String>,
    pub origin: String,
}
