//! Compiled user patterns and the cache that shares them between rules

use dashmap::DashMap;
use fancy_regex::Regex;
use std::fmt;
use std::sync::Arc;

/// A compiled rule pattern.
///
/// Patterns support look-around, so matching can fail at run time (for
/// instance when the backtracking limit is hit); every matching method
/// returns a `Result` for that reason.
#[derive(Clone)]
pub struct CompiledPattern {
    source: String,
    case_insensitive: bool,
    regex: Arc<Regex>,
}

/// Error raised while compiling or running a pattern
pub type PatternError = fancy_regex::Error;

/// Byte range of one pattern match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    pub start: usize,
    pub end: usize,
}

impl CompiledPattern {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn is_match(&self, text: &str) -> Result<bool, PatternError> {
        self.regex.is_match(text)
    }

    /// All non-overlapping matches, left to right
    pub fn find_all(&self, text: &str) -> Result<Vec<PatternMatch>, PatternError> {
        self.regex
            .find_iter(text)
            .map(|found| {
                found.map(|m| PatternMatch {
                    start: m.start(),
                    end: m.end(),
                })
            })
            .collect()
    }

    /// First match starting at or after byte offset `pos`
    pub fn find_from(&self, text: &str, pos: usize) -> Result<Option<PatternMatch>, PatternError> {
        Ok(self
            .regex
            .find_from_pos(text, pos)?
            .map(|m| PatternMatch {
                start: m.start(),
                end: m.end(),
            }))
    }
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("source", &self.source)
            .field("case_insensitive", &self.case_insensitive)
            .finish()
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.case_insensitive == other.case_insensitive
    }
}

/// Concurrent cache of compiled patterns keyed by source and case flag.
///
/// Large rule sets repeat the same exception patterns many times; each
/// distinct pattern is compiled once.
#[derive(Default)]
pub struct PatternCache {
    entries: DashMap<(String, bool), Arc<Regex>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `source`, reusing an earlier compilation when possible
    pub fn compile(
        &self,
        source: &str,
        case_insensitive: bool,
    ) -> Result<CompiledPattern, PatternError> {
        let key = (source.to_string(), case_insensitive);
        if let Some(regex) = self.entries.get(&key) {
            return Ok(CompiledPattern {
                source: source.to_string(),
                case_insensitive,
                regex: Arc::clone(regex.value()),
            });
        }

        let effective = if case_insensitive {
            format!("(?i){source}")
        } else {
            source.to_string()
        };
        let regex = Arc::new(Regex::new(&effective)?);
        self.entries.insert(key, Arc::clone(&regex));

        Ok(CompiledPattern {
            source: source.to_string(),
            case_insensitive,
            regex,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for PatternCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}
