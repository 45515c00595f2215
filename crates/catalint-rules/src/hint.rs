//! `%(name)s` placeholder expansion in rule hints

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%\((\w+)\)s").expect("placeholder regex is valid"));

/// Values available to a hint
#[derive(Debug, Clone, Copy)]
pub struct HintContext<'a> {
    pub rule_id: &'a str,
    pub matched: &'a str,
    pub part: &'a str,
    pub catalog: &'a str,
    pub source: &'a str,
}

impl HintContext<'_> {
    fn value(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(self.rule_id),
            "match" => Some(self.matched),
            "part" => Some(self.part),
            "catalog" => Some(self.catalog),
            "msgid" => Some(self.source),
            _ => None,
        }
    }
}

/// Expand known placeholders; unknown ones stay as written
pub fn expand<'h>(hint: &'h str, ctx: &HintContext<'_>) -> Cow<'h, str> {
    if !hint.contains("%(") {
        return Cow::Borrowed(hint);
    }
    PLACEHOLDER.replace_all(hint, |caps: &Captures<'_>| match ctx.value(&caps[1]) {
        Some(value) => value.to_string(),
        None => caps[0].to_string(),
    })
}
