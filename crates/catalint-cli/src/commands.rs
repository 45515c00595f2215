//! Command implementations

use crate::OutputFormat;
use crate::output::{OutputFormatter, RunSummary};
use anyhow::{Context, Result, bail};
use catalint_core::{
    CatalintConfig, Catalog, CatalogRunner, ConfigLoader, LexiconRegistry, ReadOptions,
    LexiconProvider, ResultExt, RunnerConfig, WordList,
};
use catalint_rules::{MessageEvaluator, Rule, RuleRepository, RuleSetOptions, RuleSummary};
use colored::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, warn};

const EXIT_DIAGNOSTICS: u8 = 1;
const EXIT_ERROR: u8 = 2;

/// Everything `validate` takes from the command line
pub struct ValidateOptions {
    pub rules: Vec<PathBuf>,
    pub catalogs: Vec<PathBuf>,
    pub locale: Option<String>,
    pub jobs: Option<usize>,
    pub fail_on_diagnostic: bool,
    pub environment: Option<String>,
    pub environment_only: bool,
    pub lexicons: Vec<(String, PathBuf)>,
    pub format: OutputFormat,
    pub strict_locale: bool,
    pub unordered: bool,
    pub include_fuzzy: bool,
}

/// Where `rules` subcommands find their rules
pub struct RuleSource {
    pub rules: Vec<PathBuf>,
    pub locale: Option<String>,
    pub environment: Option<String>,
}

/// Exit code for configuration, rule and catalog errors
pub fn error_exit_code() -> ExitCode {
    ExitCode::from(EXIT_ERROR)
}

pub fn validate_command(options: ValidateOptions, config_path: Option<PathBuf>) -> Result<ExitCode> {
    debug!("Running validate on catalogs: {:?}", options.catalogs);

    let start_dir = options
        .catalogs
        .first()
        .and_then(|path| path.parent())
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let config = load_config(config_path.as_deref(), start_dir)?;

    // Command line flags take precedence over the configuration file
    let dirs = rule_dirs(&options.rules, &config)?;
    let locale = options.locale.clone().or_else(|| config.locale.clone());
    let environment = options
        .environment
        .clone()
        .or_else(|| config.environment.clone());
    let environment_only = options.environment_only || config.environment_only.unwrap_or(false);
    let runner_config = RunnerConfig {
        jobs: options
            .jobs
            .or(config.jobs)
            .unwrap_or_else(|| RunnerConfig::default().jobs)
            .max(1),
        ordered: !options.unordered && config.ordered.unwrap_or(true),
        strict_locale: options.strict_locale || config.strict_locale.unwrap_or(false),
    };
    let fail_on_diagnostic =
        options.fail_on_diagnostic || config.fail_on_diagnostic.unwrap_or(false);

    let read_options = ReadOptions {
        locale: locale.clone(),
        include_fuzzy: options.include_fuzzy || config.include_fuzzy.unwrap_or(false),
        include_untranslated: false,
    };

    let mut sources = Vec::with_capacity(options.catalogs.len());
    for path in &options.catalogs {
        let catalog = Catalog::open(path, read_options.clone())
            .with_context(|| format!("Cannot read catalog {}", path.display()))?;
        sources.push((path.clone(), catalog.into_messages().peekable()));
    }

    // Rule files directly in a rule directory belong to the catalog locale
    let default_locale = locale.or_else(|| {
        sources.iter_mut().find_map(|(_, messages)| {
            messages
                .peek()
                .and_then(|item| item.as_ref().ok())
                .map(|message| message.locale.clone())
        })
    });

    let rule_options = RuleSetOptions {
        environment,
        environment_only,
        ..RuleSetOptions::default()
    };
    let repository = RuleRepository::load_all(&dirs, default_locale.as_deref(), &rule_options)
        .context("Failed to load rules")?;
    if repository.is_empty() {
        warn!("No rules found in {:?}", dirs);
    }

    let lexicons = load_lexicons(&config, &options.lexicons);
    let overrides = config.severity_overrides();
    let mut runner = CatalogRunner::new(runner_config.clone());
    // Each missing lexicon is warned about once, whatever the number of locales
    let mut reported = BTreeSet::new();
    for (locale, set) in repository.iter() {
        let engine =
            MessageEvaluator::with_reported_lexicons(Arc::clone(set), lexicons.clone(), &mut reported)
                .with_severity_overrides(overrides.clone());
        runner = runner.with_engine(locale, Arc::new(engine));
    }

    let mut formatter = OutputFormatter::new(options.format);
    let mut summary = RunSummary::default();

    for (path, messages) in sources {
        let stats = if runner_config.ordered {
            let report = runner.run(messages)?;
            for diagnostic in &report.diagnostics {
                formatter.print_diagnostic(&path, diagnostic);
            }
            for error in &report.errors {
                formatter.print_item_error(&path, error);
            }
            report.stats
        } else {
            let mut stream = runner.stream(messages);
            for item in &mut stream {
                match item {
                    Ok(diagnostic) => formatter.print_diagnostic(&path, &diagnostic),
                    Err(error) if error.is_recoverable() => {
                        formatter.print_item_error(&path, &error)
                    }
                    Err(error) => return Err(error.into()),
                }
            }
            stream.finish()?
        };
        info!(
            "{}: {} messages, {} diagnostics",
            path.display(),
            stats.evaluated,
            stats.diagnostics
        );
        summary.add(&stats);
    }

    formatter.finish(&summary)?;

    Ok(if summary.errors > 0 {
        error_exit_code()
    } else if fail_on_diagnostic && summary.diagnostics > 0 {
        ExitCode::from(EXIT_DIAGNOSTICS)
    } else {
        ExitCode::SUCCESS
    })
}

pub fn rules_list_command(
    source: RuleSource,
    json: bool,
    config_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let (repository, _) = load_repository(&source, config_path.as_deref())?;

    if json {
        let listing: BTreeMap<&str, Vec<RuleSummary>> = repository
            .iter()
            .map(|(locale, set)| (locale, set.iter().map(Rule::summary).collect()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(ExitCode::SUCCESS);
    }

    if repository.is_empty() {
        println!("No rules found");
        return Ok(ExitCode::SUCCESS);
    }

    for (locale, set) in repository.iter() {
        println!("{} ({} rules)", locale.bold(), set.len());
        for rule in set.iter() {
            let id = if rule.disabled {
                format!("{} (disabled)", rule.id).dimmed()
            } else {
                rule.id.cyan()
            };
            println!("  {:<36} {}", id, rule.hint.as_deref().unwrap_or(""));
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub fn rules_explain_command(
    rule_id: &str,
    source: RuleSource,
    config_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let (repository, config) = load_repository(&source, config_path.as_deref())?;
    let overrides = config.severity_overrides();

    let matches: Vec<(&str, &Rule)> = repository
        .iter()
        .filter_map(|(locale, set)| set.lookup_by_id(rule_id).map(|rule| (locale, rule)))
        .collect();
    if matches.is_empty() {
        bail!("Unknown rule '{rule_id}'");
    }

    for (locale, rule) in matches {
        let severity = match overrides.get(&rule.id) {
            Some(Some(severity)) => severity.slug().to_string(),
            Some(None) => "off".to_string(),
            None => rule.severity.slug().to_string(),
        };
        let part = rule.trigger.part.keyword();

        println!("{} {}", "Rule:".bold(), rule.id.cyan().bold());
        println!("  Locale:      {locale}");
        println!("  Defined at:  {}", rule.origin);
        println!(
            "  Trigger:     {}/{}/{}",
            part,
            rule.trigger.pattern.source(),
            if rule.is_case_insensitive() { "i" } else { "" }
        );
        println!("  Severity:    {severity}");
        if let Some(environment) = &rule.environment {
            println!("  Environment: {environment}");
        }
        if rule.disabled {
            println!("  Disabled:    yes");
        }
        if let Some(hint) = &rule.hint {
            println!("  Hint:        {hint}");
        }
        if rule.valid.is_empty() {
            println!("  Exceptions:  none");
        } else {
            println!("  Exceptions:");
            for entry in &rule.valid {
                let tests: Vec<String> = entry.tests.iter().map(ToString::to_string).collect();
                println!("    valid {}", tests.join(" "));
            }
        }
        println!();
    }
    Ok(ExitCode::SUCCESS)
}

fn load_config(config_path: Option<&Path>, start_dir: &Path) -> Result<CatalintConfig> {
    ConfigLoader::load(config_path, Some(start_dir)).context("Failed to load configuration")
}

fn rule_dirs(cli: &[PathBuf], config: &CatalintConfig) -> Result<Vec<PathBuf>> {
    let dirs = if cli.is_empty() {
        config.rules.clone().unwrap_or_default()
    } else {
        cli.to_vec()
    };
    if dirs.is_empty() {
        bail!("No rule directory given; pass --rules or set 'rules' in the configuration file");
    }
    Ok(dirs)
}

fn load_repository(
    source: &RuleSource,
    config_path: Option<&Path>,
) -> Result<(RuleRepository, CatalintConfig)> {
    let config = load_config(config_path, Path::new("."))?;
    let dirs = rule_dirs(&source.rules, &config)?;
    let locale = source.locale.clone().or_else(|| config.locale.clone());
    let options = RuleSetOptions {
        environment: source
            .environment
            .clone()
            .or_else(|| config.environment.clone()),
        environment_only: config.environment_only.unwrap_or(false),
        ..RuleSetOptions::default()
    };
    let repository = RuleRepository::load_all(&dirs, locale.as_deref(), &options)
        .context("Failed to load rules")?;
    Ok((repository, config))
}

/// Word lists from the configuration, then from the command line
fn load_lexicons(config: &CatalintConfig, cli: &[(String, PathBuf)]) -> LexiconRegistry {
    let mut paths: BTreeMap<String, PathBuf> = config.lexicons.clone();
    paths.extend(cli.iter().cloned());

    let mut registry = LexiconRegistry::new();
    for (name, path) in paths {
        // A lexicon that cannot be read leaves its rules skipped, not the run failed
        if let Some(words) = WordList::load(&path, false).log_and_continue() {
            debug!("Lexicon '{}': {:?} words", name, words.len());
            registry.register(name, Arc::new(words));
        }
    }
    registry
}
