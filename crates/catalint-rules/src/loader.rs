//! Rule file loading
//!
//! Turns rule files into [`RuleDefinition`]s. A trigger line opens a rule,
//! a blank line or the next trigger closes it. Validity groups, the
//! environment switch and the filter list are file-scoped and are shared
//! with included files.

use crate::definition::{
    FilterDefinition, FilterTargets, RuleDefinition, RuleOrigin, TestDefinition,
    TriggerDefinition, ValidDefinition,
};
use crate::syntax::{Field, ParsedLine, logical_lines, parse_line};
use catalint_core::{CatalintError, MessagePart, Result};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Loads rule definitions from rule files
#[derive(Debug, Clone, Default)]
pub struct RuleLoader {
    environment: Option<String>,
}

impl RuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operating environment, consulted by environment-bound `removeFilter`
    pub fn with_environment(mut self, environment: Option<String>) -> Self {
        self.environment = environment;
        self
    }

    /// Load all `*.rules` files directly inside `dir`, in file name order
    pub fn load_directory(&self, dir: &Path) -> Result<Vec<RuleDefinition>> {
        let files = rule_files_in(dir)?;
        let definitions = self.load_files(&files)?;
        info!(
            "Loaded {} rules from {} files in {}",
            definitions.len(),
            files.len(),
            dir.display()
        );
        Ok(definitions)
    }

    pub fn load_files(&self, paths: &[PathBuf]) -> Result<Vec<RuleDefinition>> {
        let mut definitions = Vec::new();
        for path in paths {
            definitions.extend(self.load_file(path)?);
        }
        Ok(definitions)
    }

    pub fn load_file(&self, path: &Path) -> Result<Vec<RuleDefinition>> {
        let text = fs::read_to_string(path).map_err(|e| CatalintError::io_error(path, e))?;
        let rules = self.load_str(path, &text)?;
        debug!("Loaded {} rules from {}", rules.len(), path.display());
        Ok(rules)
    }

    /// Load rules from text; `path` names the source in errors and anchors
    /// relative `include` paths
    pub fn load_str(&self, path: &Path, text: &str) -> Result<Vec<RuleDefinition>> {
        let mut state = FileState::new(self.environment.as_deref());
        state.process(path, text)?;
        Ok(state.rules)
    }
}

/// Sorted `*.rules` files directly in `dir`
pub fn rule_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.rules", glob::Pattern::escape(&dir.to_string_lossy()));
    let entries = glob::glob(&pattern)
        .map_err(|e| CatalintError::config_error(format!("Invalid rule path pattern: {e}")))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Skipping unreadable rule path: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Rule being assembled
struct PendingRule {
    trigger: TriggerDefinition,
    origin: RuleOrigin,
    valid: Vec<ValidDefinition>,
    id: Option<String>,
    hint: Option<String>,
    environment: Option<String>,
    disabled: bool,
    /// Rule-local copy of the filter list, made on the first filter directive
    filters: Option<Vec<FilterDefinition>>,
}

struct FileState<'a> {
    operating_environment: Option<&'a str>,
    rules: Vec<RuleDefinition>,
    current: Option<PendingRule>,
    group: Option<(String, Vec<ValidDefinition>)>,
    groups: HashMap<String, Vec<ValidDefinition>>,
    environment: Option<String>,
    filters: Vec<FilterDefinition>,
    include_stack: Vec<PathBuf>,
}

impl<'a> FileState<'a> {
    fn new(operating_environment: Option<&'a str>) -> Self {
        Self {
            operating_environment,
            rules: Vec::new(),
            current: None,
            group: None,
            groups: HashMap::new(),
            environment: None,
            filters: Vec::new(),
            include_stack: Vec::new(),
        }
    }

    fn process(&mut self, path: &Path, text: &str) -> Result<()> {
        self.include_stack.push(path.to_path_buf());

        for line in logical_lines(text) {
            let parsed = parse_line(&line.text)
                .map_err(|message| CatalintError::syntax_error(path, line.number, message))?;
            self.handle(path, line.number, parsed)
                .map_err(|message| match message {
                    LineError::Message(message) => {
                        CatalintError::syntax_error(path, line.number, message)
                    }
                    LineError::Fatal(error) => error,
                })?;
        }
        self.close_block();

        self.include_stack.pop();
        Ok(())
    }

    fn handle(&mut self, path: &Path, lno: usize, line: ParsedLine) -> LineResult {
        match line {
            ParsedLine::Comment => Ok(()),
            ParsedLine::Blank => {
                self.close_block();
                Ok(())
            }
            ParsedLine::Trigger {
                part,
                pattern,
                modifiers,
            } => {
                self.close_block();
                let part = MessagePart::from_keyword(&part)
                    .ok_or_else(|| format!("Unknown keyword '{part}' in trigger pattern"))?;
                if let Some(bad) = modifiers.chars().find(|&c| c != 'i') {
                    return Err(
                        format!("Unknown match modifier '{bad}' in trigger pattern").into(),
                    );
                }
                let mut trigger = TriggerDefinition::new(part, pattern);
                trigger.case_insensitive = modifiers.contains('i');

                self.current = Some(PendingRule {
                    trigger,
                    origin: RuleOrigin::new(path, lno),
                    valid: Vec::new(),
                    id: None,
                    hint: None,
                    environment: None,
                    disabled: false,
                    filters: None,
                });
                Ok(())
            }
            ParsedLine::Directive(fields) => self.directive(path, fields),
        }
    }

    fn directive(&mut self, path: &Path, fields: Vec<Field>) -> LineResult {
        let Some(head) = fields.first() else {
            return Ok(());
        };
        let name = head.name.as_str();

        match name {
            "valid" => {
                let entry = valid_entry(&fields[1..])?;
                if let Some(rule) = self.current.as_mut() {
                    rule.valid.push(entry);
                } else if let Some((_, entries)) = self.group.as_mut() {
                    entries.push(entry);
                } else {
                    return Err("'valid' directive outside of rule or validity group".into());
                }
            }
            "hint" | "id" => {
                let value = single_value(&fields)?;
                let rule = self
                    .current
                    .as_mut()
                    .ok_or_else(|| format!("'{name}' directive outside of rule"))?;
                if name == "hint" {
                    rule.hint = Some(value);
                } else {
                    rule.id = Some(value);
                }
            }
            "disabled" => {
                expect_fields(&fields, 1)?;
                self.current
                    .as_mut()
                    .ok_or("'disabled' directive outside of rule")?
                    .disabled = true;
            }
            "validGroup" => {
                let group_name = bare_argument(&fields)?;
                if self.group.is_some() {
                    return Err("'validGroup' directive inside validity group".into());
                }
                if let Some(rule) = self.current.as_mut() {
                    let entries = self
                        .groups
                        .get(&group_name)
                        .ok_or_else(|| format!("Unknown validity group '{group_name}'"))?;
                    rule.valid.extend(entries.iter().cloned());
                } else {
                    self.group = Some((group_name, Vec::new()));
                }
            }
            "environment" => {
                let environment = bare_argument(&fields)?;
                if self.group.is_some() {
                    return Err("'environment' directive inside validity group".into());
                }
                match self.current.as_mut() {
                    Some(rule) => rule.environment = Some(environment),
                    None => self.environment = Some(environment),
                }
            }
            "addFilterRegex" => {
                let environment = self.effective_environment();
                let filter = regex_filter(&fields[1..], environment)?;
                self.filter_list().push(filter);
            }
            "removeFilter" => {
                let operating = self.operating_environment;
                remove_filters(&fields[1..], self.filter_list(), operating)?;
            }
            "clearFilters" => {
                expect_fields(&fields, 1)?;
                self.filter_list().clear();
            }
            "include" => {
                if self.current.is_some() || self.group.is_some() {
                    return Err("'include' directive inside a rule or group".into());
                }
                self.include(path, &fields[1..])?;
            }
            other if other.starts_with("addFilter") => {
                return Err(format!("Unsupported filter directive '{other}'").into());
            }
            other => return Err(format!("Unknown directive '{other}'").into()),
        }
        Ok(())
    }

    fn include(&mut self, including: &Path, fields: &[Field]) -> LineResult {
        check_fields("include", fields, &["file"], &["file"])?;
        let file = field_value(fields, "file").unwrap_or_default();
        let target = if Path::new(&file).is_absolute() {
            PathBuf::from(&file)
        } else {
            including
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(&file)
        };

        if self.include_stack.contains(&target) {
            return Err(format!("Recursive include of '{}'", target.display()).into());
        }
        if target.extension().and_then(|e| e.to_str()) == Some("rules") {
            warn!(
                "Including one rules file into another, '{}' from '{}'",
                target.display(),
                including.display()
            );
        }

        let text = fs::read_to_string(&target)
            .map_err(|e| LineError::Fatal(CatalintError::io_error(&target, e)))?;
        self.process(&target, &text).map_err(LineError::Fatal)
    }

    /// Environment new filters default to
    fn effective_environment(&self) -> Option<String> {
        self.current
            .as_ref()
            .and_then(|rule| rule.environment.clone())
            .or_else(|| self.environment.clone())
    }

    /// The filter list directives currently act on
    fn filter_list(&mut self) -> &mut Vec<FilterDefinition> {
        match self.current.as_mut() {
            Some(rule) => rule.filters.get_or_insert_with(|| self.filters.clone()),
            None => &mut self.filters,
        }
    }

    /// Finish the open rule or validity group, if any
    fn close_block(&mut self) {
        if let Some(rule) = self.current.take() {
            self.rules.push(RuleDefinition {
                id: rule.id,
                trigger: rule.trigger,
                valid: rule.valid,
                hint: rule.hint,
                environment: rule.environment.or_else(|| self.environment.clone()),
                disabled: rule.disabled,
                filters: rule.filters.unwrap_or_else(|| self.filters.clone()),
                origin: rule.origin,
            });
        } else if let Some((name, entries)) = self.group.take() {
            self.groups.insert(name, entries);
        }
    }
}

/// Line-level failure: a message to be located at the current line, or an
/// error that already carries its own location (from an included file)
enum LineError {
    Message(String),
    Fatal(CatalintError),
}

impl From<String> for LineError {
    fn from(message: String) -> Self {
        LineError::Message(message)
    }
}

impl From<&str> for LineError {
    fn from(message: &str) -> Self {
        LineError::Message(message.to_string())
    }
}

type LineResult = std::result::Result<(), LineError>;

fn valid_entry(fields: &[Field]) -> std::result::Result<ValidDefinition, String> {
    if fields.is_empty() {
        return Err("'valid' directive without tests".to_string());
    }
    let tests = fields
        .iter()
        .map(|field| match &field.value {
            Some(value) => Ok(TestDefinition::new(&field.name, value.clone())),
            None => Err(format!("Test '{}' in 'valid' directive needs a value", field.name)),
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ValidDefinition { tests })
}

fn single_value(fields: &[Field]) -> std::result::Result<String, String> {
    expect_fields(fields, 1)?;
    fields[0]
        .value
        .clone()
        .ok_or_else(|| format!("'{}' directive needs a value", fields[0].name))
}

fn bare_argument(fields: &[Field]) -> std::result::Result<String, String> {
    expect_fields(fields, 2)?;
    if fields[0].value.is_some() || fields[1].value.is_some() {
        return Err(format!(
            "'{}' directive takes a single bare name",
            fields[0].name
        ));
    }
    Ok(fields[1].name.clone())
}

fn expect_fields(fields: &[Field], count: usize) -> std::result::Result<(), String> {
    if fields.len() != count {
        return Err(format!(
            "'{}' directive expects {} field(s), found {}",
            fields[0].name,
            count,
            fields.len()
        ));
    }
    Ok(())
}

fn field_value(fields: &[Field], name: &str) -> Option<String> {
    fields
        .iter()
        .find(|field| field.name == name)
        .and_then(|field| field.value.clone())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn check_fields(
    directive: &str,
    fields: &[Field],
    known: &[&str],
    mandatory: &[&str],
) -> std::result::Result<(), String> {
    let mut seen = BTreeSet::new();
    for field in fields {
        if !seen.insert(field.name.as_str()) {
            return Err(format!("Duplicate field '{}' in '{directive}' directive", field.name));
        }
        if !known.contains(&field.name.as_str()) {
            return Err(format!("Unknown field '{}' in '{directive}' directive", field.name));
        }
        if field.value.is_none() {
            return Err(format!("Field '{}' in '{directive}' directive needs a value", field.name));
        }
    }
    for name in mandatory {
        if !seen.contains(name) {
            return Err(format!("Mandatory field '{name}' missing in '{directive}' directive"));
        }
    }
    Ok(())
}

fn regex_filter(
    fields: &[Field],
    environment: Option<String>,
) -> std::result::Result<FilterDefinition, String> {
    check_fields(
        "addFilterRegex",
        fields,
        &["match", "repl", "case", "on", "handle", "env"],
        &["match", "on"],
    )?;

    let mut targets = FilterTargets::default();
    for part in split_list(&field_value(fields, "on").unwrap_or_default()) {
        match part.as_str() {
            "msgid" | "pmsgid" => targets.source = true,
            "msgstr" | "pmsgstr" => targets.target = true,
            "pattern" => targets.pattern = true,
            "msg" => return Err("Filter part 'msg' needs a hook filter".to_string()),
            other => return Err(format!("Unknown part for filter to act on: {other}")),
        }
    }
    if targets == FilterTargets::default() {
        return Err("No parts specified for the filter to act on".to_string());
    }

    let case_sensitive = match field_value(fields, "case").as_deref() {
        None => false,
        Some(value) => parse_bool(value)
            .ok_or_else(|| format!("Cannot ascribe boolean value to '{value}'"))?,
    };

    let pattern = field_value(fields, "match").unwrap_or_default();
    regex::Regex::new(&pattern).map_err(|e| format!("Invalid filter regex '{pattern}': {e}"))?;

    Ok(FilterDefinition {
        handles: field_value(fields, "handle")
            .map(|value| split_list(&value).into_iter().collect())
            .unwrap_or_default(),
        environments: field_value(fields, "env")
            .map(|value| split_list(&value))
            .or_else(|| environment.map(|env| vec![env])),
        targets,
        pattern,
        replacement: field_value(fields, "repl").unwrap_or_default(),
        case_sensitive,
    })
}

fn remove_filters(
    fields: &[Field],
    filters: &mut Vec<FilterDefinition>,
    operating_environment: Option<&str>,
) -> std::result::Result<(), String> {
    check_fields("removeFilter", fields, &["handle", "env"], &["handle"])?;

    if let Some(envs) = field_value(fields, "env") {
        let envs = split_list(&envs);
        // Removal bound to environments other than the operating one is a no-op.
        if !operating_environment.is_some_and(|env| envs.iter().any(|e| e == env)) {
            return Ok(());
        }
    }

    let handles: BTreeSet<String> = split_list(&field_value(fields, "handle").unwrap_or_default())
        .into_iter()
        .collect();
    let mut seen = BTreeSet::new();
    filters.retain(|filter| {
        let common: Vec<&String> = filter.handles.intersection(&handles).collect();
        if common.is_empty() {
            true
        } else {
            seen.extend(common.into_iter().cloned());
            false
        }
    });

    let unseen: Vec<&String> = handles.difference(&seen).collect();
    if !unseen.is_empty() {
        return Err(format!(
            "No filters with these handles to remove: {}",
            unseen
                .iter()
                .map(|h| h.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load(text: &str) -> Result<Vec<RuleDefinition>> {
        RuleLoader::new().load_str(Path::new("test.rules"), text)
    }

    #[test]
    fn test_rule_blocks() {
        let rules = load(
            r#"
# Colons
[:\s*$]
id="punctuation-colon-no"
valid msgid=":\s*$"
hint="Colon in the translation but not in the original"

{'}i
id="quotes"
valid msgstr="«" msgstr="»"
valid cat="dolphin"
"#,
        )
        .unwrap();

        assert_eq!(rules.len(), 2);
        let colon = &rules[0];
        assert_eq!(colon.id.as_deref(), Some("punctuation-colon-no"));
        assert_eq!(colon.trigger.part, MessagePart::Target);
        assert_eq!(colon.trigger.pattern, r":\s*$");
        assert_eq!(colon.valid.len(), 1);
        assert_eq!(colon.origin.line, 3);
        assert!(colon.hint.as_deref().unwrap().starts_with("Colon"));

        let quotes = &rules[1];
        assert_eq!(quotes.trigger.part, MessagePart::Source);
        assert!(quotes.trigger.case_insensitive);
        assert_eq!(quotes.valid.len(), 2);
        assert_eq!(quotes.valid[0].tests.len(), 2);
    }

    #[test]
    fn test_next_trigger_closes_rule() {
        let rules = load("[a]\nid=\"a\"\n[b]\nid=\"b\"\n").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].id.as_deref(), Some("b"));
    }

    #[test]
    fn test_trigger_line_comment() {
        let rules = load("[abc] # note\nid=\"a\"\n\n{x}i  # case\nid=\"b\"\n").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].trigger.pattern, "abc");
        assert!(!rules[0].trigger.case_insensitive);
        assert!(rules[1].trigger.case_insensitive);
    }

    #[test]
    fn test_comment_does_not_close_rule() {
        let rules = load("[a]\n# note\nid=\"a\"\n").unwrap();
        assert_eq!(rules[0].id.as_deref(), Some("a"));
    }

    #[test]
    fn test_validity_groups() {
        let rules = load(
            r#"
validGroup quotes
valid msgstr="«.*»"
valid !msgid="'"

[']
id="q"
validGroup quotes
valid ctx="code"
"#,
        )
        .unwrap();

        let valid = &rules[0].valid;
        assert_eq!(valid.len(), 3);
        assert!(valid[1].tests[0].negated);
        assert_eq!(valid[1].tests[0].name, "msgid");
        assert_eq!(valid[2].tests[0].name, "ctx");
    }

    #[test]
    fn test_unknown_group_is_error() {
        let err = load("[a]\nid=\"a\"\nvalidGroup missing\n").unwrap_err();
        assert!(err.to_string().contains("Unknown validity group 'missing'"));
        assert!(err.to_string().contains("test.rules:3"));
    }

    #[test]
    fn test_environment_switch() {
        let rules = load(
            "[a]\nid=\"a\"\n\nenvironment kde\n\n[b]\nid=\"b\"\n\n[c]\nid=\"c\"\nenvironment gnome\n",
        )
        .unwrap();
        assert_eq!(rules[0].environment, None);
        assert_eq!(rules[1].environment.as_deref(), Some("kde"));
        assert_eq!(rules[2].environment.as_deref(), Some("gnome"));
    }

    #[test]
    fn test_directives_outside_rule() {
        assert!(load("hint=\"x\"\n").is_err());
        assert!(load("valid msgid=\"x\"\n").is_err());
        assert!(load("disabled\n").is_err());
        assert!(load("[a]\nfrobnicate\n").is_err());
        assert!(load("[a]\nvalid\n").is_err());
        assert!(load("[a]\nvalid msgid\n").is_err());
        assert!(load("[a]x\n").is_err());
        assert!(load("*comment/x/\n").is_err());
    }

    #[test]
    fn test_blank_line_closes_rule() {
        let err = load("[a]\nid=\"a\"\n\nhint=\"late\"\n").unwrap_err();
        assert!(err.to_string().contains("outside of rule"));
    }

    #[test]
    fn test_filters_global_and_local() {
        let rules = load(
            r#"
addFilterRegex match="&" repl="" on="pmsgid,pmsgstr" handle="accel"

[a]
id="a"

[b]
id="b"
removeFilter handle="accel"
addFilterRegex match="~" on="pattern" case="yes"

clearFilters

[c]
id="c"
"#,
        )
        .unwrap();

        assert_eq!(rules[0].filters.len(), 1);
        assert!(rules[0].filters[0].targets.source);
        assert!(rules[0].filters[0].targets.target);
        assert!(!rules[0].filters[0].case_sensitive);

        assert_eq!(rules[1].filters.len(), 1);
        assert!(rules[1].filters[0].targets.pattern);
        assert!(rules[1].filters[0].case_sensitive);

        assert!(rules[2].filters.is_empty());
    }

    #[test]
    fn test_filter_errors() {
        assert!(load("addFilterRegex match=\"x\"\n").is_err());
        assert!(load("addFilterRegex match=\"(\" on=\"pmsgstr\"\n").is_err());
        assert!(load("addFilterRegex match=\"x\" on=\"msg\"\n").is_err());
        assert!(load("addFilterHook name=\"x\" on=\"msg\"\n").is_err());
        assert!(load("removeFilter handle=\"nope\"\n").is_err());
        assert!(load("clearFilters now\n").is_err());
    }

    #[test]
    fn test_environment_bound_filter_removal() {
        let text = "addFilterRegex match=\"&\" on=\"pmsgstr\" handle=\"accel\"\n\
                    removeFilter handle=\"accel\" env=\"kde\"\n\n[a]\nid=\"a\"\n";

        let anywhere = load(text).unwrap();
        assert_eq!(anywhere[0].filters.len(), 1);

        let in_kde = RuleLoader::new()
            .with_environment(Some("kde".into()))
            .load_str(Path::new("test.rules"), text)
            .unwrap();
        assert!(in_kde[0].filters.is_empty());
    }

    #[test]
    fn test_filter_takes_rule_environment() {
        let rules = load("environment kde\n\n[a]\nid=\"a\"\naddFilterRegex match=\"&\" on=\"pmsgstr\"\n")
            .unwrap();
        assert_eq!(
            rules[0].filters[0].environments,
            Some(vec!["kde".to_string()])
        );
    }

    #[test]
    fn test_include_and_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("groups.inc"),
            "validGroup code\nvalid ctx=\"code\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("b.rules"),
            "include file=\"groups.inc\"\n\n[x]\nid=\"x\"\nvalidGroup code\n",
        )
        .unwrap();
        fs::write(dir.path().join("a.rules"), "[y]\nid=\"y\"\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "[z]\n").unwrap();

        let rules = RuleLoader::new().load_directory(dir.path()).unwrap();
        let ids: Vec<_> = rules.iter().map(|r| r.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["y", "x"]);
        assert_eq!(rules[1].valid.len(), 1);
    }

    #[test]
    fn test_recursive_include_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("self.inc");
        fs::write(&path, "include file=\"self.inc\"\n").unwrap();
        let err = RuleLoader::new().load_file(&path).unwrap_err();
        assert!(err.to_string().contains("Recursive include"));
    }

    #[test]
    fn test_missing_id_is_kept_for_compiler() {
        let rules = load("[a]\nhint=\"no id\"\n").unwrap();
        assert_eq!(rules[0].id, None);
        assert!(rules[0].display_id().starts_with("<rule at test.rules:1"));
    }
}
