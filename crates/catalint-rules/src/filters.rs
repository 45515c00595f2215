//! Regex filters applied to messages and rule patterns before matching
//!
//! Filters rewrite text with a regex replacement, for example to strip
//! accelerator markers before punctuation checks. Message filters run once
//! per message per distinct filter set; pattern filters are applied to a
//! rule's patterns when it is compiled.

use crate::definition::FilterDefinition;
use catalint_core::MessagePair;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static BACKREFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(\d+)|\\g<(\w+)>|\$").expect("backreference regex is valid")
});

/// Convert `\1` / `\g<name>` style replacements to `${1}` / `${name}`
fn replacement_template(replacement: &str) -> String {
    BACKREFERENCE
        .replace_all(replacement, |caps: &regex::Captures<'_>| {
            match (caps.get(1), caps.get(2)) {
                (Some(group), _) | (None, Some(group)) => format!("${{{}}}", group.as_str()),
                (None, None) => "$$".to_string(),
            }
        })
        .into_owned()
}

/// One compiled filter
#[derive(Debug, Clone)]
struct CompiledFilter {
    regex: Regex,
    template: String,
    source: bool,
    target: bool,
}

impl CompiledFilter {
    fn compile(definition: &FilterDefinition) -> Result<Self, regex::Error> {
        let pattern = if definition.case_sensitive {
            definition.pattern.clone()
        } else {
            format!("(?i){}", definition.pattern)
        };
        Ok(Self {
            regex: Regex::new(&pattern)?,
            template: replacement_template(&definition.replacement),
            source: definition.targets.source,
            target: definition.targets.target,
        })
    }

    fn rewrite<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.regex.replace_all(text, self.template.as_str())
    }
}

/// Identity of a list of filters; equal signatures filter identically
pub fn signature<'a>(filters: impl IntoIterator<Item = &'a FilterDefinition>) -> String {
    filters
        .into_iter()
        .map(|filter| {
            format!(
                "{}\u{4}{}\u{4}{}\u{4}{:?}",
                filter.pattern, filter.replacement, filter.case_sensitive, filter.targets
            )
        })
        .collect::<Vec<_>>()
        .join("\u{5}")
}

/// Ordered message filters shared by one or more rules
#[derive(Debug, Clone)]
pub struct FilterSet {
    signature: String,
    filters: Vec<CompiledFilter>,
}

impl FilterSet {
    pub fn compile<'a>(
        definitions: impl IntoIterator<Item = &'a FilterDefinition> + Clone,
    ) -> Result<Self, regex::Error> {
        let filters = definitions
            .clone()
            .into_iter()
            .map(CompiledFilter::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            signature: signature(definitions),
            filters,
        })
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Filtered view of `message`; borrowed when no filter changed anything
    pub fn apply<'m>(&self, message: &'m MessagePair) -> Cow<'m, MessagePair> {
        let mut filtered: Option<MessagePair> = None;

        for filter in &self.filters {
            let base = filtered.as_ref().unwrap_or(message);
            let next = match base.map_texts(
                |text| {
                    if filter.source {
                        filter.rewrite(text)
                    } else {
                        Cow::Borrowed(text)
                    }
                },
                |text| {
                    if filter.target {
                        filter.rewrite(text)
                    } else {
                        Cow::Borrowed(text)
                    }
                },
            ) {
                Cow::Owned(next) => Some(next),
                Cow::Borrowed(_) => None,
            };
            if next.is_some() {
                filtered = next;
            }
        }

        match filtered {
            Some(message) => Cow::Owned(message),
            None => Cow::Borrowed(message),
        }
    }
}

/// Apply the pattern filters active in `environment` to a rule pattern
pub fn rewrite_pattern(
    filters: &[FilterDefinition],
    environment: Option<&str>,
    pattern: &str,
) -> Result<String, regex::Error> {
    let mut current = pattern.to_string();
    for definition in filters
        .iter()
        .filter(|f| f.targets.pattern && f.applies_in(environment))
    {
        let filter = CompiledFilter::compile(definition)?;
        current = filter.rewrite(&current).into_owned();
    }
    Ok(current)
}
