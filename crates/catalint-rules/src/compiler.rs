//! Compilation of rule definitions

use crate::definition::{RuleDefinition, TestDefinition};
use crate::exceptions::{TestKind, ValidEntry, ValidTest};
use crate::filters::rewrite_pattern;
use crate::pattern::{CompiledPattern, PatternCache};
use crate::rule::{CompiledTrigger, Rule};
use catalint_core::{CatalintError, Result, Severity};

/// Compiles definitions against a shared pattern cache
pub struct RuleCompiler<'a> {
    cache: &'a PatternCache,
    environment: Option<&'a str>,
}

impl<'a> RuleCompiler<'a> {
    pub fn new(cache: &'a PatternCache, environment: Option<&'a str>) -> Self {
        Self { cache, environment }
    }

    /// Compile one definition.
    ///
    /// The returned rule has no filter set assigned; that is the rule set's
    /// job, since filter sets are shared between rules.
    pub fn compile(&self, definition: &RuleDefinition) -> Result<Rule> {
        let id = definition.id.clone().ok_or_else(|| {
            CatalintError::compile_error(definition.display_id(), "id", "missing required field")
        })?;
        if id.trim().is_empty() {
            return Err(CatalintError::compile_error(
                definition.display_id(),
                "id",
                "rule id is empty",
            ));
        }

        let trigger = self.pattern(definition, &id, "trigger", &definition.trigger.pattern)?;

        let valid = definition
            .valid
            .iter()
            .map(|entry| {
                let tests = entry
                    .tests
                    .iter()
                    .map(|test| self.test(definition, &id, test))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ValidEntry { tests })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut lexicons: Vec<String> = valid
            .iter()
            .flat_map(ValidEntry::lexicons)
            .map(str::to_string)
            .collect();
        lexicons.sort_unstable();
        lexicons.dedup();

        Ok(Rule {
            id,
            trigger: CompiledTrigger {
                part: definition.trigger.part,
                pattern: trigger,
            },
            valid,
            hint: definition.hint.clone(),
            severity: Severity::default(),
            environment: definition.environment.clone(),
            disabled: definition.disabled,
            filter_set: None,
            lexicons,
            origin: definition.origin.clone(),
        })
    }

    fn test(
        &self,
        definition: &RuleDefinition,
        id: &str,
        test: &TestDefinition,
    ) -> Result<ValidTest> {
        let field = format!("valid {}", test.name);
        let kind = match test.name.as_str() {
            "msgid" => TestKind::Source(self.pattern(definition, id, &field, &test.value)?),
            "msgstr" => TestKind::Target(self.pattern(definition, id, &field, &test.value)?),
            "ctx" => TestKind::Context(self.pattern(definition, id, &field, &test.value)?),
            "span" => TestKind::Span(self.pattern(definition, id, &field, &test.value)?),
            "before" => TestKind::Before(self.pattern(definition, id, &field, &test.value)?),
            "after" => TestKind::After(self.pattern(definition, id, &field, &test.value)?),
            "cat" => TestKind::Catalog(split_list(&test.value)),
            "env" => TestKind::Environment(split_list(&test.value)),
            "lexicon" => {
                let name = test.value.trim();
                if name.is_empty() {
                    return Err(CatalintError::compile_error(id, field, "empty lexicon name"));
                }
                TestKind::Lexicon(name.to_string())
            }
            other => {
                return Err(CatalintError::compile_error(
                    id,
                    field,
                    format!("unknown test '{other}'"),
                ));
            }
        };
        Ok(ValidTest {
            negated: test.negated,
            kind,
        })
    }

    fn pattern(
        &self,
        definition: &RuleDefinition,
        id: &str,
        field: &str,
        source: &str,
    ) -> Result<CompiledPattern> {
        let rewritten = rewrite_pattern(&definition.filters, self.environment, source)
            .map_err(|e| CatalintError::compile_error(id, "filter", e.to_string()))?;
        self.cache
            .compile(&rewritten, definition.trigger.case_insensitive)
            .map_err(|e| CatalintError::compile_error(id, field, e.to_string()))
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
