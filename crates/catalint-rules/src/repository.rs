//! Per-locale rule sets loaded from a rule directory
//!
//! Layout:
//!
//! ```text
//! rules/
//!   punctuation.rules      # rule set of the default locale
//!   ca/
//!     typography.rules     # rule set of `ca`
//!   sr/
//!     rules/
//!       orthography.rules  # rule set of `sr`
//! ```

use crate::loader::{RuleLoader, rule_files_in};
use crate::pattern::PatternCache;
use crate::rule_set::{RuleSet, RuleSetOptions};
use catalint_core::{CatalintError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Compiled rule sets keyed by locale, sharing one pattern cache
#[derive(Debug, Default)]
pub struct RuleRepository {
    sets: BTreeMap<String, Arc<RuleSet>>,
    cache: Arc<PatternCache>,
}

impl RuleRepository {
    /// Load and compile every rule set under `dir`.
    ///
    /// Files directly in `dir` belong to `default_locale`, which must be
    /// given when such files exist.
    pub fn load(dir: &Path, default_locale: Option<&str>, options: &RuleSetOptions) -> Result<Self> {
        Self::load_all(&[dir.to_path_buf()], default_locale, options)
    }

    /// Like [`RuleRepository::load`], merging several rule directories.
    /// Rules of the same locale from different directories form one set.
    pub fn load_all(
        dirs: &[PathBuf],
        default_locale: Option<&str>,
        options: &RuleSetOptions,
    ) -> Result<Self> {
        let mut files: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for dir in dirs {
            collect_files(dir, default_locale, &mut files)?;
        }

        let loader = RuleLoader::new().with_environment(options.environment.clone());
        let mut sets = BTreeMap::new();
        for (locale, paths) in files {
            let definitions = loader.load_files(&paths)?;
            let set = RuleSet::build_with(&definitions, options)?;
            info!(
                "Locale '{}': {} rules from {} files",
                locale,
                set.len(),
                paths.len()
            );
            sets.insert(locale, Arc::new(set));
        }

        Ok(Self {
            sets,
            cache: Arc::clone(&options.cache),
        })
    }

    /// Register an already built rule set
    pub fn insert(&mut self, locale: impl Into<String>, set: RuleSet) {
        self.sets.insert(locale.into(), Arc::new(set));
    }

    pub fn get(&self, locale: &str) -> Option<&Arc<RuleSet>> {
        self.sets.get(locale)
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<RuleSet>)> {
        self.sets.iter().map(|(locale, set)| (locale.as_str(), set))
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn cache(&self) -> &Arc<PatternCache> {
        &self.cache
    }
}

/// Group the rule files under `dir` by locale
fn collect_files(
    dir: &Path,
    default_locale: Option<&str>,
    files: &mut BTreeMap<String, Vec<PathBuf>>,
) -> Result<()> {
    if !dir.is_dir() {
        return Err(CatalintError::config_error(format!(
            "Rule directory not found: {}",
            dir.display()
        )));
    }

    let top_level = rule_files_in(dir)?;
    if !top_level.is_empty() {
        let locale = default_locale.ok_or_else(|| {
            CatalintError::config_error(format!(
                "Rule files directly in {} need a locale",
                dir.display()
            ))
        })?;
        files.entry(locale.to_string()).or_default().extend(top_level);
    }

    for (locale, subdir) in locale_dirs(dir)? {
        let mut found = rule_files_in(&subdir)?;
        let nested = subdir.join("rules");
        if nested.is_dir() {
            found.extend(rule_files_in(&nested)?);
        }
        if found.is_empty() {
            debug!("No rule files in {}", subdir.display());
            continue;
        }
        files.entry(locale).or_default().extend(found);
    }
    Ok(())
}

/// Sub-directories of `dir`, named by locale
fn locale_dirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let pattern = format!("{}/*", glob::Pattern::escape(&dir.to_string_lossy()));
    let entries = glob::glob(&pattern)
        .map_err(|e| CatalintError::config_error(format!("Invalid rule path pattern: {e}")))?;

    let mut dirs: Vec<(String, PathBuf)> = entries
        .filter_map(std::result::Result::ok)
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            Some((name, path))
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}
