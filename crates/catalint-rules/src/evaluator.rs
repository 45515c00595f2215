//! Message evaluation against a compiled rule set

use crate::exceptions::{MatchContext, is_suppressed};
use crate::hint::{HintContext, expand};
use crate::pattern::PatternError;
use crate::rule::Rule;
use crate::rule_set::RuleSet;
use catalint_core::{
    CatalintError, Diagnostic, LexiconRegistry, MatchedSpan, MessagePair, Result, RuleEngine,
    Severity,
};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Evaluates every rule of a [`RuleSet`] against single messages.
///
/// Holds no mutable state, so one evaluator serves all worker threads.
pub struct MessageEvaluator {
    rules: Arc<RuleSet>,
    lexicons: LexiconRegistry,
    severity: BTreeMap<String, Option<Severity>>,
    unavailable: BTreeSet<String>,
}

impl MessageEvaluator {
    /// Rules that need a lexicon missing from `lexicons` are skipped; each
    /// missing name is warned about once here.
    pub fn new(rules: Arc<RuleSet>, lexicons: LexiconRegistry) -> Self {
        Self::with_reported_lexicons(rules, lexicons, &mut BTreeSet::new())
    }

    /// Like [`MessageEvaluator::new`], for several evaluators sharing one
    /// lexicon registry: names already in `reported` are not warned about
    /// again, and newly warned names are added to it.
    pub fn with_reported_lexicons(
        rules: Arc<RuleSet>,
        lexicons: LexiconRegistry,
        reported: &mut BTreeSet<String>,
    ) -> Self {
        let unavailable: BTreeSet<String> = rules
            .iter()
            .flat_map(|rule| rule.lexicons.iter())
            .filter(|name| !lexicons.contains(name))
            .cloned()
            .collect();

        for name in &unavailable {
            let skipped = rules
                .iter()
                .filter(|rule| rule.lexicons.contains(name))
                .count();
            if reported.insert(name.clone()) {
                warn!(
                    "{}; skipping the rules that need it",
                    CatalintError::LexiconUnavailable { name: name.clone() }
                );
            }
            debug!("Lexicon '{}' unavailable: {} rule(s) skipped", name, skipped);
        }

        Self {
            rules,
            lexicons,
            severity: BTreeMap::new(),
            unavailable,
        }
    }

    /// Per rule id severity; `None` switches the rule off
    pub fn with_severity_overrides(
        mut self,
        overrides: impl IntoIterator<Item = (String, Option<Severity>)>,
    ) -> Self {
        self.severity.extend(overrides);
        self
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rules
    }

    /// Lexicons referenced by rules but not supplied
    pub fn unavailable_lexicons(&self) -> impl Iterator<Item = &str> {
        self.unavailable.iter().map(String::as_str)
    }

    /// Severity the rule reports with, or `None` when it should not run
    fn effective_severity(&self, rule: &Rule) -> Option<Severity> {
        if rule.disabled {
            return None;
        }
        if rule.lexicons.iter().any(|name| self.unavailable.contains(name)) {
            return None;
        }
        match self.severity.get(&rule.id) {
            Some(level) => level.clone(),
            None => Some(rule.severity.clone()),
        }
    }

    /// First trigger match of `rule` that no exception suppresses
    fn first_violation(
        &self,
        rule: &Rule,
        original: &MessagePair,
        message: &MessagePair,
        severity: Severity,
    ) -> std::result::Result<Option<Diagnostic>, PatternError> {
        let part = rule.trigger.part;
        for (item, text) in message.part_texts(part) {
            for found in rule.trigger.pattern.find_all(text)? {
                let ctx = MatchContext {
                    message,
                    text,
                    found,
                    environment: self.rules.environment(),
                    lexicons: &self.lexicons,
                };
                if is_suppressed(&rule.valid, &ctx)? {
                    trace!("Rule '{}' suppressed at {}..{}", rule.id, found.start, found.end);
                    continue;
                }

                let matched = &text[found.start..found.end];
                let keyword = part.keyword();
                let hint = rule.hint.as_deref().map(|hint| {
                    expand(
                        hint,
                        &HintContext {
                            rule_id: &rule.id,
                            matched,
                            part: &keyword,
                            catalog: &message.catalog,
                            source: message.source_text(),
                        },
                    )
                    .into_owned()
                });

                let diagnostic = Diagnostic::new(
                    &rule.id,
                    original,
                    MatchedSpan::new(part, item, found.start, found.end),
                )
                .with_hint(hint.unwrap_or_default())
                .with_severity(severity)
                .with_matched_text(matched);
                return Ok(Some(diagnostic));
            }
        }
        Ok(None)
    }
}

impl RuleEngine for MessageEvaluator {
    fn evaluate(&self, message: &MessagePair) -> Result<Vec<Diagnostic>> {
        let filtered: Vec<Cow<'_, MessagePair>> = self
            .rules
            .filter_sets()
            .iter()
            .map(|set| set.apply(message))
            .collect();

        let mut diagnostics = Vec::new();
        for rule in self.rules.iter() {
            let Some(severity) = self.effective_severity(rule) else {
                continue;
            };
            let view: &MessagePair = match rule.filter_set {
                Some(slot) => &filtered[slot],
                None => message,
            };

            let found = self
                .first_violation(rule, message, view, severity)
                .map_err(|e| {
                    CatalintError::evaluation_error(&message.id, format!("rule '{}': {e}", rule.id))
                })?;
            diagnostics.extend(found);
        }
        Ok(diagnostics)
    }

    fn rule_count(&self) -> usize {
        self.rules
            .iter()
            .filter(|rule| self.effective_severity(rule).is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{
        FilterDefinition, FilterTargets, RuleDefinition, TriggerDefinition, ValidDefinition,
    };
    use crate::rule_set::RuleSetOptions;
    use catalint_core::{MessagePart, WordList};

    fn evaluator(defs: &[RuleDefinition]) -> MessageEvaluator {
        MessageEvaluator::new(
            Arc::new(RuleSet::build(defs).unwrap()),
            LexiconRegistry::new(),
        )
    }

    fn colon_rule() -> RuleDefinition {
        RuleDefinition::new("punctuation-colon", TriggerDefinition::target(r":\s*$"))
            .with_valid(ValidDefinition::new().test("msgid", r":\s*$"))
            .with_hint("Translation ends with '%(match)s' but the original does not")
    }

    #[test]
    fn test_colon_rule_fires() {
        let engine = evaluator(&[colon_rule()]);
        let message = MessagePair::new(0, "ca", "Select folder", "Trieu la carpeta:");
        let diagnostics = engine.evaluate(&message).unwrap();

        assert_eq!(diagnostics.len(), 1);
        let d = &diagnostics[0];
        assert_eq!(d.rule_id, "punctuation-colon");
        assert_eq!(d.span, MatchedSpan::new(MessagePart::Target, 0, 16, 17));
        assert_eq!(d.matched_text, ":");
        assert_eq!(d.hint, "Translation ends with ':' but the original does not");
        assert_eq!(d.severity, Severity::Warning);
    }

    #[test]
    fn test_exception_suppresses() {
        let engine = evaluator(&[colon_rule()]);
        let message = MessagePair::new(0, "ca", "Select folder:", "Trieu la carpeta:");
        assert!(engine.evaluate(&message).unwrap().is_empty());
    }

    #[test]
    fn test_first_unsuppressed_match_only() {
        let rule = RuleDefinition::new("apostrophe", TriggerDefinition::target("'"))
            .with_valid(ValidDefinition::new().test("after", r"\bl"));
        let engine = evaluator(&[rule]);
        let message = MessagePair::new(0, "ca", "x", "l'arxiu 'a' i 'b'");
        let diagnostics = engine.evaluate(&message).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].span.start, 8);
    }

    #[test]
    fn test_rules_reported_in_set_order() {
        let first = RuleDefinition::new("first", TriggerDefinition::target("b"));
        let second = RuleDefinition::new("second", TriggerDefinition::target("a"));
        let engine = evaluator(&[first, second]);
        let message = MessagePair::new(0, "ca", "x", "ab");
        let ids: Vec<_> = engine
            .evaluate(&message)
            .unwrap()
            .into_iter()
            .map(|d| d.rule_id)
            .collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn test_disabled_and_severity_overrides() {
        let off = RuleDefinition::new("off", TriggerDefinition::target("a"));
        let disabled = RuleDefinition::new("disabled", TriggerDefinition::target("a")).disabled();
        let error = RuleDefinition::new("error", TriggerDefinition::target("a"));
        let engine = evaluator(&[off, disabled, error]).with_severity_overrides([
            ("off".to_string(), None),
            ("error".to_string(), Some(Severity::Error)),
        ]);

        let diagnostics = engine.evaluate(&MessagePair::new(0, "ca", "x", "a")).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule_id, "error");
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(engine.rule_count(), 1);
    }

    #[test]
    fn test_message_filter_applied() {
        let strip = FilterDefinition::new("&", "").on(FilterTargets {
            source: true,
            target: true,
            pattern: false,
        });
        let rule = RuleDefinition::new("double-space", TriggerDefinition::target("a b"))
            .with_filter(strip);
        let engine = evaluator(&[rule]);
        let diagnostics = engine
            .evaluate(&MessagePair::new(0, "ca", "x", "&a b"))
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].span.start, 0);
        assert_eq!(diagnostics[0].matched_text, "a b");
    }

    #[test]
    fn test_missing_lexicon_skips_rule() {
        let rule = RuleDefinition::new("acronym", TriggerDefinition::target(r"\b[A-Z]{2,}\b"))
            .with_valid(ValidDefinition::new().test("lexicon", "acronyms"));
        let set = Arc::new(RuleSet::build(&[rule]).unwrap());
        let message = MessagePair::new(0, "ca", "Open KDE", "Obre KDE i XYZ");

        let without = MessageEvaluator::new(Arc::clone(&set), LexiconRegistry::new());
        assert_eq!(without.unavailable_lexicons().collect::<Vec<_>>(), vec!["acronyms"]);
        assert!(without.evaluate(&message).unwrap().is_empty());
        assert_eq!(without.rule_count(), 0);

        let lexicons = LexiconRegistry::new().with("acronyms", WordList::from_words(["KDE"]));
        let with = MessageEvaluator::new(set, lexicons);
        let diagnostics = with.evaluate(&message).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].matched_text, "XYZ");
    }

    #[test]
    fn test_reported_lexicons_shared_between_evaluators() {
        let rule = RuleDefinition::new("acronym", TriggerDefinition::target(r"\b[A-Z]{2,}\b"))
            .with_valid(ValidDefinition::new().test("lexicon", "acronyms"));
        let set = Arc::new(RuleSet::build(&[rule]).unwrap());

        let mut reported = BTreeSet::new();
        let first = MessageEvaluator::with_reported_lexicons(
            Arc::clone(&set),
            LexiconRegistry::new(),
            &mut reported,
        );
        assert_eq!(reported.iter().collect::<Vec<_>>(), vec!["acronyms"]);

        let second =
            MessageEvaluator::with_reported_lexicons(set, LexiconRegistry::new(), &mut reported);
        assert_eq!(reported.len(), 1);
        assert_eq!(first.rule_count(), 0);
        assert_eq!(
            second.unavailable_lexicons().collect::<Vec<_>>(),
            vec!["acronyms"]
        );
    }

    #[test]
    fn test_environment_test_uses_operating_environment() {
        let rule = RuleDefinition::new("r", TriggerDefinition::target("a"))
            .with_valid(ValidDefinition::new().test("env", "kde"));
        let message = MessagePair::new(0, "ca", "x", "a");

        let plain = evaluator(&[rule.clone()]);
        assert_eq!(plain.evaluate(&message).unwrap().len(), 1);

        let set = RuleSet::build_with(&[rule], &RuleSetOptions::new().with_environment("kde")).unwrap();
        let kde = MessageEvaluator::new(Arc::new(set), LexiconRegistry::new());
        assert!(kde.evaluate(&message).unwrap().is_empty());
    }
}
