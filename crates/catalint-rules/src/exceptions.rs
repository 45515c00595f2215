//! Exception ("valid") clauses
//!
//! A rule carries an ordered list of [`ValidEntry`]s. Tests inside an entry
//! are AND-ed and short-circuit; entries are OR-ed. The first entry whose
//! tests all pass suppresses the trigger match.

use crate::pattern::{CompiledPattern, PatternError, PatternMatch};
use catalint_core::{LexiconRegistry, MessagePair, MessagePart};
use std::fmt;

/// What a single test inspects
#[derive(Debug, Clone, PartialEq)]
pub enum TestKind {
    /// `msgid=`: source singular or plural
    Source(CompiledPattern),
    /// `msgstr=`: any target form
    Target(CompiledPattern),
    /// `ctx=`: message context
    Context(CompiledPattern),
    /// `span=`: the text matched by the trigger
    Span(CompiledPattern),
    /// `before=`: a match starting where the trigger match ends
    Before(CompiledPattern),
    /// `after=`: a match ending where the trigger match starts
    After(CompiledPattern),
    /// `cat=`: catalog name is listed
    Catalog(Vec<String>),
    /// `env=`: operating environment is listed
    Environment(Vec<String>),
    /// `lexicon=`: the matched text is a word of the named lexicon
    Lexicon(String),
}

impl TestKind {
    /// Keyword used in rule files
    pub fn keyword(&self) -> &'static str {
        match self {
            TestKind::Source(_) => "msgid",
            TestKind::Target(_) => "msgstr",
            TestKind::Context(_) => "ctx",
            TestKind::Span(_) => "span",
            TestKind::Before(_) => "before",
            TestKind::After(_) => "after",
            TestKind::Catalog(_) => "cat",
            TestKind::Environment(_) => "env",
            TestKind::Lexicon(_) => "lexicon",
        }
    }
}

/// One possibly negated test
#[derive(Debug, Clone, PartialEq)]
pub struct ValidTest {
    pub negated: bool,
    pub kind: TestKind,
}

/// Everything a test may look at for one trigger match
#[derive(Clone, Copy)]
pub struct MatchContext<'a> {
    /// Message after the rule's filters
    pub message: &'a MessagePair,
    /// Text the trigger matched in
    pub text: &'a str,
    pub found: PatternMatch,
    pub environment: Option<&'a str>,
    pub lexicons: &'a LexiconRegistry,
}

impl MatchContext<'_> {
    fn matched_text(&self) -> &str {
        &self.text[self.found.start..self.found.end]
    }
}

/// Rule file form, e.g. `!msgid="foo"`
impl fmt::Display for ValidTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match &self.kind {
            TestKind::Source(p)
            | TestKind::Target(p)
            | TestKind::Context(p)
            | TestKind::Span(p)
            | TestKind::Before(p)
            | TestKind::After(p) => p.source().to_string(),
            TestKind::Catalog(names) | TestKind::Environment(names) => names.join(","),
            TestKind::Lexicon(name) => name.clone(),
        };
        let bang = if self.negated { "!" } else { "" };
        write!(f, "{bang}{}=\"{value}\"", self.kind.keyword())
    }
}

impl ValidTest {
    pub fn passes(&self, ctx: &MatchContext<'_>) -> Result<bool, PatternError> {
        let hit = match &self.kind {
            TestKind::Source(pattern) => any_match(pattern, ctx.message, MessagePart::Source)?,
            TestKind::Target(pattern) => any_match(pattern, ctx.message, MessagePart::Target)?,
            TestKind::Context(pattern) => any_match(pattern, ctx.message, MessagePart::Context)?,
            TestKind::Span(pattern) => pattern.is_match(ctx.matched_text())?,
            TestKind::Before(pattern) => pattern
                .find_from(ctx.text, ctx.found.end)?
                .is_some_and(|m| m.start == ctx.found.end),
            TestKind::After(pattern) => pattern
                .find_all(&ctx.text[..ctx.found.start])?
                .iter()
                .any(|m| m.end == ctx.found.start),
            TestKind::Catalog(names) => names.iter().any(|name| *name == ctx.message.catalog),
            TestKind::Environment(names) => ctx
                .environment
                .is_some_and(|env| names.iter().any(|name| name == env)),
            TestKind::Lexicon(name) => ctx
                .lexicons
                .get(name)
                .is_some_and(|lexicon| lexicon.contains(ctx.matched_text())),
        };
        Ok(hit != self.negated)
    }
}

fn any_match(
    pattern: &CompiledPattern,
    message: &MessagePair,
    part: MessagePart,
) -> Result<bool, PatternError> {
    for (_, text) in message.part_texts(part) {
        if pattern.is_match(text)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// One `valid` line
#[derive(Debug, Clone, PartialEq)]
pub struct ValidEntry {
    pub tests: Vec<ValidTest>,
}

impl ValidEntry {
    /// True when every test passes
    pub fn passes(&self, ctx: &MatchContext<'_>) -> Result<bool, PatternError> {
        for test in &self.tests {
            if !test.passes(ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Lexicon names this entry consults
    pub fn lexicons(&self) -> impl Iterator<Item = &str> {
        self.tests.iter().filter_map(|test| match &test.kind {
            TestKind::Lexicon(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Whether any entry suppresses the trigger match described by `ctx`
pub fn is_suppressed(entries: &[ValidEntry], ctx: &MatchContext<'_>) -> Result<bool, PatternError> {
    for entry in entries {
        if entry.passes(ctx)? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternCache;
    use catalint_core::WordList;

    struct Fixture {
        cache: PatternCache,
        lexicons: LexiconRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                cache: PatternCache::new(),
                lexicons: LexiconRegistry::new().with("terms", WordList::from_words(["KDE"])),
            }
        }

        fn pattern(&self, source: &str) -> CompiledPattern {
            self.cache.compile(source, false).unwrap()
        }

        fn test(&self, kind: TestKind) -> ValidTest {
            ValidTest {
                negated: false,
                kind,
            }
        }

        /// Context for the first match of `trigger` in the first target
        fn check(
            &self,
            message: &MessagePair,
            trigger: &str,
            entries: &[ValidEntry],
            environment: Option<&str>,
        ) -> bool {
            let text = message.target_text();
            let found = self.pattern(trigger).find_all(text).unwrap()[0];
            let ctx = MatchContext {
                message,
                text,
                found,
                environment,
                lexicons: &self.lexicons,
            };
            is_suppressed(entries, &ctx).unwrap()
        }
    }

    #[test]
    fn test_no_entries_never_suppress() {
        let f = Fixture::new();
        let message = MessagePair::new(0, "ca", "Select folder", "Trieu la carpeta:");
        assert!(!f.check(&message, ":", &[], None));
    }

    #[test]
    fn test_source_test_suppresses() {
        let f = Fixture::new();
        let entries = vec![ValidEntry {
            tests: vec![f.test(TestKind::Source(f.pattern(r":\s*$")))],
        }];

        let with_colon = MessagePair::new(0, "ca", "Folder:", "Carpeta:");
        assert!(f.check(&with_colon, ":", &entries, None));

        let without = MessagePair::new(1, "ca", "Select folder", "Trieu la carpeta:");
        assert!(!f.check(&without, ":", &entries, None));
    }

    #[test]
    fn test_tests_in_entry_are_and_ed_entries_or_ed() {
        let f = Fixture::new();
        let both = ValidEntry {
            tests: vec![
                f.test(TestKind::Target(f.pattern("«"))),
                f.test(TestKind::Target(f.pattern("»"))),
            ],
        };
        let message = MessagePair::new(0, "ca", "Failed '%s'", "Ha fallat «%s'");
        assert!(!f.check(&message, "'", &[both.clone()], None));

        let context = ValidEntry {
            tests: vec![f.test(TestKind::Catalog(vec!["kate".into()]))],
        };
        let in_kate = message.clone().with_catalog("kate");
        assert!(f.check(&in_kate, "'", &[both, context], None));
    }

    #[test]
    fn test_negation() {
        let f = Fixture::new();
        let entries = vec![ValidEntry {
            tests: vec![ValidTest {
                negated: true,
                kind: TestKind::Source(f.pattern("'")),
            }],
        }];
        let message = MessagePair::new(0, "ca", "Quote", "Cita 'x'");
        assert!(f.check(&message, "'", &entries, None));
        let quoted_source = MessagePair::new(0, "ca", "Quote 'x'", "Cita 'x'");
        assert!(!f.check(&quoted_source, "'", &entries, None));
    }

    #[test]
    fn test_span_before_after() {
        let f = Fixture::new();
        let message = MessagePair::new(0, "ca", "x", "l'ordinador");

        let span = vec![ValidEntry {
            tests: vec![f.test(TestKind::Span(f.pattern("^'$")))],
        }];
        assert!(f.check(&message, "'", &span, None));

        let after = vec![ValidEntry {
            tests: vec![f.test(TestKind::After(f.pattern(r"\bl")))],
        }];
        assert!(f.check(&message, "'", &after, None));

        let before = vec![ValidEntry {
            tests: vec![f.test(TestKind::Before(f.pattern("ord")))],
        }];
        assert!(f.check(&message, "'", &before, None));

        let not_adjacent = vec![ValidEntry {
            tests: vec![f.test(TestKind::Before(f.pattern("dor")))],
        }];
        assert!(!f.check(&message, "'", &not_adjacent, None));
    }

    #[test]
    fn test_environment_and_context() {
        let f = Fixture::new();
        let env = vec![ValidEntry {
            tests: vec![f.test(TestKind::Environment(vec!["kde".into()]))],
        }];
        let message = MessagePair::new(0, "ca", "x", "a:").with_context("@title");
        assert!(f.check(&message, ":", &env, Some("kde")));
        assert!(!f.check(&message, ":", &env, None));

        let ctx = vec![ValidEntry {
            tests: vec![f.test(TestKind::Context(f.pattern("^@title")))],
        }];
        assert!(f.check(&message, ":", &ctx, None));
    }

    #[test]
    fn test_lexicon_test() {
        let f = Fixture::new();
        let entries = vec![ValidEntry {
            tests: vec![f.test(TestKind::Lexicon("terms".into()))],
        }];
        let known = MessagePair::new(0, "ca", "x", "Obre KDE");
        assert!(f.check(&known, r"\b[A-Z]{2,}\b", &entries, None));
        assert_eq!(entries[0].lexicons().collect::<Vec<_>>(), vec!["terms"]);

        let unknown = MessagePair::new(0, "ca", "x", "Obre GTK");
        assert!(!f.check(&unknown, r"\b[A-Z]{2,}\b", &entries, None));
    }

    #[test]
    fn test_display_in_rule_file_form() {
        let f = Fixture::new();
        let negated = ValidTest {
            negated: true,
            kind: TestKind::Source(f.pattern(r":\s*$")),
        };
        assert_eq!(negated.to_string(), r#"!msgid=":\s*$""#);

        let catalogs = f.test(TestKind::Catalog(vec!["kate".into(), "dolphin".into()]));
        assert_eq!(catalogs.to_string(), r#"cat="kate,dolphin""#);
    }
}
