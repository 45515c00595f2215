//! Word lexicons rules can consult by name
//!
//! A lexicon is anything that can answer "is this a known word". Rule sets
//! only hold the lexicon *names*; providers are registered at evaluation
//! time, so the same compiled rules can run with or without them.

use crate::error::CatalintError;
use crate::result::Result;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Read-only word lookup shared across worker threads
pub trait LexiconProvider: Send + Sync {
    /// Check whether `word` belongs to the lexicon
    fn contains(&self, word: &str) -> bool;

    /// Number of entries, if known
    fn len(&self) -> Option<usize> {
        None
    }
}

/// Flat word list, one entry per line
#[derive(Debug, Clone, Default)]
pub struct WordList {
    words: HashSet<String>,
    case_insensitive: bool,
}

impl WordList {
    /// Build a word list from text; blank lines and `#` comments are skipped
    pub fn parse(text: &str, case_insensitive: bool) -> Self {
        let words = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                if case_insensitive {
                    line.to_lowercase()
                } else {
                    line.to_string()
                }
            })
            .collect();

        Self {
            words,
            case_insensitive,
        }
    }

    /// Load a newline-delimited word list file
    pub fn load(path: &Path, case_insensitive: bool) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| CatalintError::io_error(path, e))?;
        let list = Self::parse(&text, case_insensitive);
        tracing::debug!("Loaded {} words from {}", list.words.len(), path.display());
        Ok(list)
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
            case_insensitive: false,
        }
    }
}

impl LexiconProvider for WordList {
    fn contains(&self, word: &str) -> bool {
        if self.case_insensitive {
            self.words.contains(&word.to_lowercase())
        } else {
            self.words.contains(word)
        }
    }

    fn len(&self) -> Option<usize> {
        Some(self.words.len())
    }
}

/// Lexicon providers by name
#[derive(Clone, Default)]
pub struct LexiconRegistry {
    providers: BTreeMap<String, Arc<dyn LexiconProvider>>,
}

impl LexiconRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn LexiconProvider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn with(mut self, name: impl Into<String>, provider: impl LexiconProvider + 'static) -> Self {
        self.register(name, Arc::new(provider));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn LexiconProvider>> {
        self.providers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for LexiconRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LexiconRegistry")
            .field("names", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_word_list_skips_comments_and_blanks() {
        let list = WordList::parse("# technical terms\nKDE\n\n  widget  \n", false);
        assert!(list.contains("KDE"));
        assert!(list.contains("widget"));
        assert!(!list.contains("kde"));
        assert_eq!(LexiconProvider::len(&list), Some(2));
    }

    #[test]
    fn test_case_insensitive_word_list() {
        let list = WordList::parse("Qt\n", true);
        assert!(list.contains("QT"));
        assert!(list.contains("qt"));
    }

    #[test]
    fn test_load_word_list_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("terms.txt");
        fs::write(&path, "carpeta\nfitxer\n").unwrap();

        let list = WordList::load(&path, false).unwrap();
        assert!(list.contains("fitxer"));

        assert!(WordList::load(&dir.path().join("missing.txt"), false).is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = LexiconRegistry::new().with("terms", WordList::from_words(["KDE"]));
        assert!(registry.contains("terms"));
        assert!(registry.get("terms").unwrap().contains("KDE"));
        assert!(registry.get("other").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["terms"]);
    }
}
