//! Integration tests for the catalint CLI
//!
//! These tests run the binary against the bundled rule directory and
//! small catalogs written to a temporary directory.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HEADER: &str = r#"msgid ""
msgstr ""
"Language: ca\n"

"#;

#[allow(deprecated)]
fn cli() -> Command {
    let mut cmd = Command::cargo_bin("catalint").unwrap();
    cmd.env_remove("RUST_LOG").arg("--no-color");
    cmd
}

fn rules_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../rules")
}

fn lexicon_arg() -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../lexicons/ca-acronyms.txt");
    format!("acronyms={}", path.display())
}

/// Write a PO catalog with the Catalan header followed by `entries`
fn write_catalog(dir: &TempDir, name: &str, entries: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, format!("{HEADER}{entries}")).unwrap();
    path
}

fn validate(catalog: &Path) -> Command {
    let mut cmd = cli();
    cmd.arg("validate")
        .arg("--rules")
        .arg(rules_dir())
        .arg("--catalog")
        .arg(catalog);
    cmd
}

#[test]
fn test_help_command() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rule-based checks"))
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("rules"));
}

#[test]
fn test_version_command() {
    cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(VERSION));
}

#[test]
fn test_clean_catalog_succeeds() {
    let temp = TempDir::new().unwrap();
    let catalog = write_catalog(
        &temp,
        "clean.po",
        "msgid \"Select folder:\"\nmsgstr \"Trieu la carpeta:\"\n",
    );

    validate(&catalog)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("no issues found"));
}

#[test]
fn test_diagnostic_line_format() {
    let temp = TempDir::new().unwrap();
    let catalog = write_catalog(
        &temp,
        "dolphin.po",
        "msgid \"Select folder\"\nmsgstr \"Trieu la carpeta:\"\n",
    );

    let expected = format!(
        "{}:5: [punctuation-colon-no] The translation ends with a colon but the original does not",
        catalog.display()
    );
    validate(&catalog)
        .args(["--format", "compact"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains(expected));
}

#[test]
fn test_fail_on_diagnostic_exit_code() {
    let temp = TempDir::new().unwrap();
    let catalog = write_catalog(
        &temp,
        "dolphin.po",
        "msgid \"Failed '%s'\"\nmsgstr \"Ha fallat '%s'\"\n",
    );

    validate(&catalog)
        .arg("--fail-on-diagnostic")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[punctuation-simple-quotes]"));
}

#[test]
fn test_json_output() {
    let temp = TempDir::new().unwrap();
    let catalog = write_catalog(
        &temp,
        "dolphin.po",
        "msgid \"Move folder to XYZ\"\nmsgstr \"Mou el directori a XYZ\"\n",
    );

    let output = validate(&catalog)
        .args(["--format", "json"])
        .arg("--lexicon")
        .arg(lexicon_arg())
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rules: Vec<&str> = report["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["rule_id"].as_str().unwrap())
        .collect();
    assert_eq!(rules, vec!["term-folder", "acronym-unknown"]);
    assert_eq!(report["summary"]["messages"], 1);
    assert_eq!(report["summary"]["errors"], 0);
}

#[test]
fn test_lexicon_rule_skipped_without_word_list() {
    let temp = TempDir::new().unwrap();
    let catalog = write_catalog(
        &temp,
        "dolphin.po",
        "msgid \"Open XYZ\"\nmsgstr \"Obre XYZ\"\n",
    );

    validate(&catalog)
        .args(["--format", "compact"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("acronym-unknown").not());
}

#[test]
fn test_malformed_catalog_entry_exits_with_error() {
    let temp = TempDir::new().unwrap();
    let catalog = write_catalog(
        &temp,
        "broken.po",
        "msgid \"Select folder\"\nmsgstr \"Trieu la carpeta:\"\n\nmsgid \"unterminated\nmsgstr \"x\"\n",
    );

    validate(&catalog)
        .args(["--format", "compact"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("[punctuation-colon-no]"))
        .stderr(predicate::str::contains("warning:"));
}

#[test]
fn test_malformed_rule_file_exits_with_error() {
    let temp = TempDir::new().unwrap();
    let rules = temp.path().join("rules");
    fs::create_dir_all(rules.join("ca")).unwrap();
    fs::write(
        rules.join("ca/broken.rules"),
        "[(unclosed]\nid=\"broken\"\n",
    )
    .unwrap();
    let catalog = write_catalog(&temp, "x.po", "msgid \"a\"\nmsgstr \"b\"\n");

    cli()
        .arg("validate")
        .arg("--rules")
        .arg(&rules)
        .arg("--catalog")
        .arg(&catalog)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error:"))
        .stderr(predicate::str::contains("broken"));
}

#[test]
fn test_missing_rules_directory() {
    let temp = TempDir::new().unwrap();
    let catalog = write_catalog(&temp, "x.po", "msgid \"a\"\nmsgstr \"b\"\n");

    cli()
        .arg("validate")
        .arg("--rules")
        .arg(temp.path().join("nope"))
        .arg("--catalog")
        .arg(&catalog)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Rule directory not found"));
}

#[test]
fn test_config_file_severity_override() {
    let temp = TempDir::new().unwrap();
    let catalog = write_catalog(
        &temp,
        "dolphin.po",
        "msgid \"Failed '%s'\"\nmsgstr \"Ha fallat '%s'\"\n",
    );
    let config = temp.path().join(".catalintrc.toml");
    fs::write(
        &config,
        format!(
            "rules = [{:?}]\nfailOnDiagnostic = true\n\n[severity]\n\"punctuation-simple-quotes\" = \"off\"\n",
            rules_dir().display().to_string()
        ),
    )
    .unwrap();

    cli()
        .arg("--config")
        .arg(&config)
        .arg("validate")
        .arg("--catalog")
        .arg(&catalog)
        .assert()
        .code(0);
}

#[test]
fn test_environment_flag() {
    let temp = TempDir::new().unwrap();
    let catalog = write_catalog(
        &temp,
        "dolphin.po",
        "msgid \"Open file\"\nmsgstr \"Obre el fitxer\"\n",
    );

    validate(&catalog)
        .args(["--format", "compact"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("term-file").not());

    validate(&catalog)
        .args(["--format", "compact", "--env", "kde"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains(
            "[term-file] Prefer 'arxiu' over 'fitxer' in KDE translations",
        ));
}

#[test]
fn test_unordered_parallel_run() {
    let temp = TempDir::new().unwrap();
    let entries: String = (0..40)
        .map(|i| format!("msgid \"Select folder {i}\"\nmsgstr \"Trieu la carpeta {i}:\"\n\n"))
        .collect();
    let catalog = write_catalog(&temp, "dolphin.po", &entries);

    let output = validate(&catalog)
        .args(["--format", "compact", "--unordered", "-j", "4"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.matches("[punctuation-colon-no]").count(), 40);
}

#[test]
fn test_rules_list() {
    cli()
        .args(["rules", "list", "--rules"])
        .arg(rules_dir())
        .assert()
        .success()
        .stdout(predicate::str::contains("ca ("))
        .stdout(predicate::str::contains("punctuation-colon"))
        .stdout(predicate::str::contains("term-folder"))
        .stdout(predicate::str::contains("term-file").not());
}

#[test]
fn test_rules_list_json() {
    let output = cli()
        .args(["rules", "list", "--json", "--env", "kde", "--rules"])
        .arg(rules_dir())
        .output()
        .unwrap();
    assert!(output.status.success());

    let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = listing["ca"]
        .as_array()
        .unwrap()
        .iter()
        .map(|rule| rule["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"term-file"));
    assert!(ids.contains(&"acronym-unknown"));
}

#[test]
fn test_rules_explain() {
    cli()
        .args(["rules", "explain", "punctuation-colon-no", "--rules"])
        .arg(rules_dir())
        .assert()
        .success()
        .stdout(predicate::str::contains("punctuation-colon-no"))
        .stdout(predicate::str::contains("punctuation.rules"))
        .stdout(predicate::str::contains(r#"valid msgid=":\s*$""#));
}

#[test]
fn test_rules_explain_unknown_rule() {
    cli()
        .args(["rules", "explain", "no-such-rule", "--rules"])
        .arg(rules_dir())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown rule 'no-such-rule'"));
}

#[test]
fn test_missing_lexicon_warned_once_across_locales() {
    let temp = TempDir::new().unwrap();
    let rules = temp.path().join("rules");
    let rule = "[\\b[A-Z]{2,}\\b]\nid=\"acronym-unknown\"\nvalid lexicon=\"acronyms\"\n";
    for locale in ["ca", "sr"] {
        fs::create_dir_all(rules.join(locale)).unwrap();
        fs::write(rules.join(locale).join("acronyms.rules"), rule).unwrap();
    }
    let catalog = write_catalog(&temp, "x.po", "msgid \"Open XYZ\"\nmsgstr \"Obre XYZ\"\n");

    let output = cli()
        .arg("validate")
        .arg("--rules")
        .arg(&rules)
        .arg("--catalog")
        .arg(&catalog)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_eq!(
        stderr.matches("Lexicon 'acronyms' is not available").count(),
        1,
        "{stderr}"
    );
}
