//! Settings read from `.catalintrc.*` / `catalint.*` files

use crate::diagnostics::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-rule severity override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    /// Rule is suppressed entirely
    Off,
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl RuleSeverity {
    /// Diagnostic severity, or `None` when the rule is switched off
    pub fn to_severity(self) -> Option<Severity> {
        match self {
            RuleSeverity::Off => None,
            RuleSeverity::Info => Some(Severity::Info),
            RuleSeverity::Warn => Some(Severity::Warning),
            RuleSeverity::Error => Some(Severity::Error),
        }
    }
}

/// Project configuration.
///
/// Every field is optional; command line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CatalintConfig {
    /// Rule directories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<PathBuf>>,

    /// Locale assumed for catalogs that do not state one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Operating environment for environment-specific rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Only apply rules of the operating environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_only: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    /// Emit diagnostics in catalog order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordered: Option<bool>,

    /// Messages whose locale has no rules are errors instead of being skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_locale: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_on_diagnostic: Option<bool>,

    /// Also check fuzzy entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_fuzzy: Option<bool>,

    /// Word lists by lexicon name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lexicons: BTreeMap<String, PathBuf>,

    /// Severity overrides by rule id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub severity: BTreeMap<String, RuleSeverity>,
}

impl CatalintConfig {
    /// Load configuration from a file; the extension selects the format
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str());

        match ext {
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            _ if path.file_name().and_then(|n| n.to_str()) == Some(".catalintrc") => {
                Ok(toml::from_str(&content)?)
            }
            _ => Err("Unsupported file extension (expected .toml, .json, .yaml or .yml)".into()),
        }
    }

    /// Make relative paths relative to `base` (the config file's directory)
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        if let Some(dirs) = self.rules.as_mut() {
            for dir in dirs.iter_mut() {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        }
        for path in self.lexicons.values_mut() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }

    /// Severity overrides as diagnostic severities; `None` marks suppressed rules
    pub fn severity_overrides(&self) -> BTreeMap<String, Option<Severity>> {
        self.severity
            .iter()
            .map(|(id, level)| (id.clone(), level.to_severity()))
            .collect()
    }
}
