//! Uncompiled rule definitions, as read from rule files or built in code

use catalint_core::MessagePart;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Where a rule was defined
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOrigin {
    pub path: PathBuf,
    pub line: usize,
}

impl RuleOrigin {
    pub fn new(path: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }
}

impl fmt::Display for RuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

/// The trigger pattern and the message part it is matched against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDefinition {
    pub part: MessagePart,
    pub pattern: String,
    /// The `i` modifier: every pattern of the rule ignores case
    pub case_insensitive: bool,
}

impl TriggerDefinition {
    pub fn new(part: MessagePart, pattern: impl Into<String>) -> Self {
        Self {
            part,
            pattern: pattern.into(),
            case_insensitive: false,
        }
    }

    /// Trigger on the source text (`{...}`)
    pub fn source(pattern: impl Into<String>) -> Self {
        Self::new(MessagePart::Source, pattern)
    }

    /// Trigger on the target text (`[...]`)
    pub fn target(pattern: impl Into<String>) -> Self {
        Self::new(MessagePart::Target, pattern)
    }

    pub fn ignore_case(mut self) -> Self {
        self.case_insensitive = true;
        self
    }
}

/// One `key=value` test of a `valid` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDefinition {
    pub name: String,
    pub negated: bool,
    pub value: String,
}

impl TestDefinition {
    /// Build from a field name that may carry a leading `!`
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        let (name, negated) = match name.strip_prefix('!') {
            Some(stripped) => (stripped, true),
            None => (name, false),
        };
        Self {
            name: name.to_string(),
            negated,
            value: value.into(),
        }
    }
}

/// A `valid` line: all tests must pass for it to suppress
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidDefinition {
    pub tests: Vec<TestDefinition>,
}

impl ValidDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn test(mut self, name: &str, value: impl Into<String>) -> Self {
        self.tests.push(TestDefinition::new(name, value));
        self
    }
}

/// What a regex filter rewrites
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterTargets {
    /// Source texts of the message (`msgid`, `pmsgid`)
    pub source: bool,
    /// Target texts of the message (`msgstr`, `pmsgstr`)
    pub target: bool,
    /// The rule's own patterns (`pattern`)
    pub pattern: bool,
}

impl FilterTargets {
    pub fn on_message(&self) -> bool {
        self.source || self.target
    }
}

/// An `addFilterRegex` directive in effect for a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDefinition {
    pub handles: BTreeSet<String>,
    /// Environments the filter applies in; `None` applies everywhere
    pub environments: Option<Vec<String>>,
    pub targets: FilterTargets,
    pub pattern: String,
    pub replacement: String,
    pub case_sensitive: bool,
}

impl FilterDefinition {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            handles: BTreeSet::new(),
            environments: None,
            targets: FilterTargets::default(),
            pattern: pattern.into(),
            replacement: replacement.into(),
            case_sensitive: false,
        }
    }

    pub fn on(mut self, targets: FilterTargets) -> Self {
        self.targets = targets;
        self
    }

    /// Whether the filter is active in the operating environment
    pub fn applies_in(&self, environment: Option<&str>) -> bool {
        match (&self.environments, environment) {
            (None, _) => true,
            (Some(envs), Some(env)) => envs.iter().any(|e| e == env),
            (Some(_), None) => false,
        }
    }
}

/// A rule as written, before its patterns are compiled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDefinition {
    pub id: Option<String>,
    pub trigger: TriggerDefinition,
    pub valid: Vec<ValidDefinition>,
    pub hint: Option<String>,
    pub environment: Option<String>,
    pub disabled: bool,
    pub filters: Vec<FilterDefinition>,
    pub origin: RuleOrigin,
}

impl RuleDefinition {
    pub fn new(id: impl Into<String>, trigger: TriggerDefinition) -> Self {
        Self {
            id: Some(id.into()),
            trigger,
            valid: Vec::new(),
            hint: None,
            environment: None,
            disabled: false,
            filters: Vec::new(),
            origin: RuleOrigin::default(),
        }
    }

    pub fn with_valid(mut self, valid: ValidDefinition) -> Self {
        self.valid.push(valid);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_filter(mut self, filter: FilterDefinition) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_origin(mut self, origin: RuleOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// The id, or the origin for rules that lack one
    pub fn display_id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("<rule at {}>", self.origin),
        }
    }
}
