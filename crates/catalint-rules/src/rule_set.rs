//! Immutable, compiled rule sets

use crate::compiler::RuleCompiler;
use crate::definition::{FilterDefinition, RuleDefinition};
use crate::filters::{FilterSet, signature};
use crate::pattern::PatternCache;
use crate::rule::Rule;
use catalint_core::{CatalintError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Build options for a [`RuleSet`]
#[derive(Debug, Clone, Default)]
pub struct RuleSetOptions {
    /// Operating environment; rules bound to other environments are dropped
    pub environment: Option<String>,
    /// Drop rules that are not bound to any environment
    pub environment_only: bool,
    /// Pattern cache shared with other rule sets
    pub cache: Arc<PatternCache>,
}

impl RuleSetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn environment_only(mut self, environment_only: bool) -> Self {
        self.environment_only = environment_only;
        self
    }

    pub fn with_cache(mut self, cache: Arc<PatternCache>) -> Self {
        self.cache = cache;
        self
    }

    fn selects(&self, rule_environment: Option<&str>) -> bool {
        match rule_environment {
            None => !self.environment_only,
            Some(env) => self.environment.as_deref() == Some(env),
        }
    }
}

/// Ordered collection of compiled rules.
///
/// Built atomically: either every definition compiles or the build fails
/// with the first error. Never mutated afterwards, so it can be shared
/// between worker threads behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    filter_sets: Vec<FilterSet>,
    environment: Option<String>,
}

impl RuleSet {
    /// Build without an operating environment
    pub fn build(definitions: &[RuleDefinition]) -> Result<Self> {
        Self::build_with(definitions, &RuleSetOptions::default())
    }

    pub fn build_with(definitions: &[RuleDefinition], options: &RuleSetOptions) -> Result<Self> {
        check_duplicates(definitions)?;

        let environment = options.environment.as_deref();
        let compiler = RuleCompiler::new(&options.cache, environment);
        let compiled = definitions
            .iter()
            .map(|definition| compiler.compile(definition))
            .collect::<Result<Vec<_>>>()?;

        // Ids that have a rule bound to the operating environment
        let shadowing: Vec<&str> = match environment {
            Some(env) => compiled
                .iter()
                .filter(|rule| rule.environment.as_deref() == Some(env))
                .map(|rule| rule.id.as_str())
                .collect(),
            None => Vec::new(),
        };

        let mut selected = Vec::new();
        for (definition, rule) in definitions.iter().zip(&compiled) {
            if !options.selects(rule.environment.as_deref()) {
                debug!("Rule '{}' not selected for environment {:?}", rule.id, environment);
                continue;
            }
            if rule.environment.is_none() && shadowing.contains(&rule.id.as_str()) {
                debug!("Rule '{}' shadowed by an environment-specific rule", rule.id);
                continue;
            }
            selected.push((definition, rule.clone()));
        }

        let mut filter_sets: Vec<FilterSet> = Vec::new();
        let mut by_signature: HashMap<String, usize> = HashMap::new();
        let mut rules = Vec::with_capacity(selected.len());

        for (definition, mut rule) in selected {
            let message_filters: Vec<&FilterDefinition> = definition
                .filters
                .iter()
                .filter(|f| f.targets.on_message() && f.applies_in(environment))
                .collect();

            if !message_filters.is_empty() {
                let key = signature(message_filters.iter().copied());
                let slot = match by_signature.get(&key) {
                    Some(&slot) => slot,
                    None => {
                        let set = FilterSet::compile(message_filters.iter().copied())
                            .map_err(|e| CatalintError::compile_error(&rule.id, "filter", e.to_string()))?;
                        filter_sets.push(set);
                        by_signature.insert(key, filter_sets.len() - 1);
                        filter_sets.len() - 1
                    }
                };
                rule.filter_set = Some(slot);
            }
            rules.push(rule);
        }

        let index = rules
            .iter()
            .enumerate()
            .map(|(i, rule)| (rule.id.clone(), i))
            .collect();

        debug!(
            "Built rule set: {} of {} rules selected, {} filter sets, {} cached patterns",
            rules.len(),
            definitions.len(),
            filter_sets.len(),
            options.cache.len()
        );

        Ok(Self {
            rules,
            index,
            filter_sets,
            environment: options.environment.clone(),
        })
    }

    pub fn lookup_by_id(&self, id: &str) -> Option<&Rule> {
        self.index.get(id).map(|&i| &self.rules[i])
    }

    /// Rules in definition order
    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    pub fn filter_sets(&self) -> &[FilterSet] {
        &self.filter_sets
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn check_duplicates(definitions: &[RuleDefinition]) -> Result<()> {
    let mut seen: HashMap<(Option<&str>, &str), &RuleDefinition> = HashMap::new();
    for definition in definitions {
        let Some(id) = definition.id.as_deref() else {
            continue;
        };
        let key = (definition.environment.as_deref(), id);
        if let Some(first) = seen.insert(key, definition) {
            return Err(CatalintError::DuplicateRuleId {
                rule_id: id.to_string(),
                first: first.origin.to_string(),
                second: definition.origin.to_string(),
            });
        }
    }
    Ok(())
}
