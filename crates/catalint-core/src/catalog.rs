//! Catalog readers feeding the runner
//!
//! Supports gettext PO files and JSON record files. Readers are lazy
//! iterators of `Result<MessagePair>`: an entry that cannot be read becomes
//! an item error and reading resumes at the next entry.

use crate::error::CatalintError;
use crate::message::MessagePair;
use crate::result::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

static MSGSTR_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^msgstr\[(\d+)\]$").expect("msgstr form regex is valid")
});

static HEADER_LANGUAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^Language:\s*([^\s\\]+)").expect("language header regex is valid")
});

/// Catalog file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    Po,
    Json,
}

impl CatalogFormat {
    /// Detect the format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("po") | Some("pot") => Some(Self::Po),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Which entries a reader passes on
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Locale for every message, overriding what the file says
    pub locale: Option<String>,
    /// Also yield fuzzy entries
    pub include_fuzzy: bool,
    /// Also yield entries without any translation
    pub include_untranslated: bool,
}

/// An opened catalog
#[derive(Debug)]
pub struct Catalog {
    pub path: PathBuf,
    /// Catalog name (file stem), what `cat` exception tests compare against
    pub name: String,
    pub format: CatalogFormat,
    text: String,
    options: ReadOptions,
}

impl Catalog {
    /// Open a catalog file, detecting its format from the extension
    pub fn open(path: &Path, options: ReadOptions) -> Result<Self> {
        let format = CatalogFormat::from_path(path).ok_or_else(|| {
            CatalintError::config_error(format!(
                "Unsupported catalog format: {} (expected .po, .pot or .json)",
                path.display()
            ))
        })?;
        let text = fs::read_to_string(path).map_err(|e| CatalintError::io_error(path, e))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            name,
            format,
            text,
            options,
        })
    }

    /// Build a catalog from in-memory text
    pub fn from_text(
        name: impl Into<String>,
        format: CatalogFormat,
        text: impl Into<String>,
        options: ReadOptions,
    ) -> Self {
        let name = name.into();
        Self {
            path: PathBuf::from(&name),
            name,
            format,
            text: text.into(),
            options,
        }
    }

    /// Lazily read the catalog's messages
    pub fn into_messages(self) -> Box<dyn Iterator<Item = Result<MessagePair>> + Send> {
        match self.format {
            CatalogFormat::Po => Box::new(PoReader::new(self.name, self.text, self.options)),
            CatalogFormat::Json => Box::new(JsonReader::new(self.name, &self.text, self.options)),
        }
    }
}

/// Entry being assembled by the PO reader
#[derive(Debug, Default)]
struct PoEntry {
    line: usize,
    fuzzy: bool,
    obsolete: bool,
    context: Option<String>,
    msgid: Option<String>,
    msgid_plural: Option<String>,
    msgstr: Vec<(usize, String)>,
    error: Option<String>,
}

/// Field a continuation string line appends to
#[derive(Debug, Clone, Copy)]
enum PoField {
    Context,
    Msgid,
    MsgidPlural,
    Msgstr(usize),
}

impl PoEntry {
    fn is_empty(&self) -> bool {
        self.error.is_none()
            && self.msgid.is_none()
            && self.context.is_none()
            && self.msgstr.is_empty()
    }

    fn append(&mut self, field: PoField, text: &str) {
        let slot = match field {
            PoField::Context => self.context.get_or_insert_with(String::new),
            PoField::Msgid => self.msgid.get_or_insert_with(String::new),
            PoField::MsgidPlural => self.msgid_plural.get_or_insert_with(String::new),
            PoField::Msgstr(n) => {
                let index = match self.msgstr.iter().position(|(i, _)| *i == n) {
                    Some(index) => index,
                    None => {
                        self.msgstr.push((n, String::new()));
                        self.msgstr.len() - 1
                    }
                };
                &mut self.msgstr[index].1
            }
        };
        slot.push_str(text);
    }
}

/// Lazy gettext PO reader
pub struct PoReader {
    name: String,
    lines: Vec<String>,
    cursor: usize,
    entry_index: usize,
    position: usize,
    locale: Option<String>,
    options: ReadOptions,
}

impl PoReader {
    pub fn new(name: impl Into<String>, text: String, options: ReadOptions) -> Self {
        Self {
            name: name.into(),
            lines: text.lines().map(str::to_string).collect(),
            cursor: 0,
            entry_index: 0,
            position: 0,
            locale: options.locale.clone(),
            options,
        }
    }

    /// Read the next raw entry, or `None` at end of input
    fn next_entry(&mut self) -> Option<PoEntry> {
        let mut entry = PoEntry::default();
        let mut field: Option<PoField> = None;
        let mut seen_msgstr = false;

        while self.cursor < self.lines.len() {
            let lno = self.cursor + 1;
            let raw = self.lines[self.cursor].trim();

            if raw.is_empty() {
                self.cursor += 1;
                if entry.is_empty() && !entry.obsolete {
                    continue;
                }
                break;
            }

            // A new entry starts once the previous one has its msgstr.
            let starts_entry = raw.starts_with('#')
                || raw.starts_with("msgctxt")
                || (raw.starts_with("msgid") && !raw.starts_with("msgid_plural"));
            if seen_msgstr && starts_entry {
                break;
            }
            self.cursor += 1;

            if let Some(comment) = raw.strip_prefix('#') {
                if comment.starts_with('~') {
                    entry.obsolete = true;
                } else if let Some(flags) = comment.strip_prefix(',') {
                    entry.fuzzy |= flags.split(',').any(|flag| flag.trim() == "fuzzy");
                }
                continue;
            }

            if entry.error.is_some() {
                continue;
            }

            let (keyword, rest) = match raw.find(char::is_whitespace) {
                Some(split) if !raw.starts_with('"') => (&raw[..split], raw[split..].trim()),
                _ => ("", raw),
            };

            let next_field = match keyword {
                "" => field,
                "msgctxt" => Some(PoField::Context),
                "msgid" => {
                    entry.line = lno;
                    Some(PoField::Msgid)
                }
                "msgid_plural" => Some(PoField::MsgidPlural),
                "msgstr" => Some(PoField::Msgstr(0)),
                other => MSGSTR_FORM
                    .captures(other)
                    .and_then(|caps| caps[1].parse().ok())
                    .map(PoField::Msgstr),
            };

            let Some(current) = next_field else {
                entry.error = Some(format!("line {lno}: unexpected '{raw}'"));
                continue;
            };
            if matches!(current, PoField::Msgstr(_)) {
                seen_msgstr = true;
            }
            field = Some(current);

            match unquote_po(rest) {
                Ok(text) => entry.append(current, &text),
                Err(message) => entry.error = Some(format!("line {lno}: {message}")),
            }
        }

        if entry.is_empty() && !entry.obsolete {
            None
        } else {
            Some(entry)
        }
    }

    fn header_locale(msgstr: &str) -> Option<String> {
        HEADER_LANGUAGE
            .captures(msgstr)
            .map(|caps| caps[1].to_string())
    }
}

impl Iterator for PoReader {
    type Item = Result<MessagePair>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = self.next_entry()?;
            self.entry_index += 1;

            if let Some(message) = entry.error {
                return Some(Err(CatalintError::catalog_error(
                    &self.name,
                    self.entry_index,
                    message,
                )));
            }
            if entry.obsolete {
                continue;
            }

            let Some(msgid) = entry.msgid else {
                return Some(Err(CatalintError::catalog_error(
                    &self.name,
                    self.entry_index,
                    "entry has no msgid",
                )));
            };

            let mut forms = entry.msgstr;
            forms.sort_by_key(|(n, _)| *n);
            let targets: Vec<String> = forms.into_iter().map(|(_, text)| text).collect();

            if msgid.is_empty() && entry.context.is_none() {
                if self.locale.is_none() {
                    self.locale = targets.first().and_then(|h| Self::header_locale(h));
                }
                continue;
            }

            if entry.fuzzy && !self.options.include_fuzzy {
                continue;
            }
            if targets.iter().all(String::is_empty) && !self.options.include_untranslated {
                continue;
            }

            let position = self.position;
            self.position += 1;

            return Some(Ok(MessagePair {
                position,
                id: entry.line.to_string(),
                locale: self.locale.clone().unwrap_or_else(|| self.name.clone()),
                catalog: self.name.clone(),
                context: entry.context,
                source: msgid,
                source_plural: entry.msgid_plural,
                targets,
            }));
        }
    }
}

/// Strip the quotes of a PO string and resolve its C escapes
pub fn unquote_po(quoted: &str) -> std::result::Result<String, String> {
    let inner = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| format!("expected a quoted string, found '{quoted}'"))?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('a') => '\u{07}',
            Some('b') => '\u{08}',
            Some('f') => '\u{0c}',
            Some('v') => '\u{0b}',
            Some('\\') => '\\',
            Some('"') => '"',
            Some(other) => return Err(format!("invalid escape sequence '\\{other}'")),
            None => return Err("dangling backslash".to_string()),
        };
        out.push(escaped);
    }
    Ok(out)
}

/// One record of a JSON catalog
#[derive(Debug, Deserialize)]
struct JsonRecord {
    id: Option<String>,
    locale: Option<String>,
    context: Option<String>,
    source: String,
    source_plural: Option<String>,
    target: Option<String>,
    #[serde(default)]
    targets: Vec<String>,
}

/// Reader for a JSON array of message records
pub struct JsonReader {
    name: String,
    records: std::vec::IntoIter<(usize, std::result::Result<JsonRecord, String>)>,
    options: ReadOptions,
    position: usize,
}

impl JsonReader {
    pub fn new(name: impl Into<String>, text: &str, options: ReadOptions) -> Self {
        let name = name.into();
        // Records are decoded one by one so a bad record only costs itself.
        let records = match serde_json::from_str::<Vec<serde_json::Value>>(text) {
            Ok(values) => values
                .into_iter()
                .enumerate()
                .map(|(index, value)| {
                    (
                        index + 1,
                        serde_json::from_value::<JsonRecord>(value).map_err(|e| e.to_string()),
                    )
                })
                .collect(),
            Err(e) => vec![(0, Err(format!("not a JSON array of records: {e}")))],
        };

        Self {
            name,
            records: records.into_iter(),
            options,
            position: 0,
        }
    }
}

impl Iterator for JsonReader {
    type Item = Result<MessagePair>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (entry, record) = self.records.next()?;
            let record = match record {
                Ok(record) => record,
                Err(message) => {
                    return Some(Err(CatalintError::catalog_error(
                        &self.name, entry, message,
                    )));
                }
            };

            let mut targets = record.targets;
            if let Some(target) = record.target {
                targets.insert(0, target);
            }
            if targets.iter().all(String::is_empty) && !self.options.include_untranslated {
                continue;
            }

            let locale = self
                .options
                .locale
                .clone()
                .or(record.locale)
                .unwrap_or_else(|| self.name.clone());

            let position = self.position;
            self.position += 1;

            return Some(Ok(MessagePair {
                position,
                id: record.id.unwrap_or_else(|| entry.to_string()),
                locale,
                catalog: self.name.clone(),
                context: record.context,
                source: record.source,
                source_plural: record.source_plural,
                targets,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PO: &str = r#"# Catalan translation
msgid ""
msgstr ""
"Project-Id-Version: dolphin\n"
"Language: ca\n"

#: src/main.cpp:10
msgid "Select folder"
msgstr "Trieu la carpeta:"

#, fuzzy
msgid "Open"
msgstr "Obre"

msgctxt "@action"
msgid "Failed '%s'"
msgstr ""
"Ha fallat "
"'%s'"

msgid "%d file"
msgid_plural "%d files"
msgstr[0] "%d fitxer"
msgstr[1] "%d fitxers"

msgid "Untranslated"
msgstr ""

#~ msgid "Old"
#~ msgstr "Vell"
"#;

    fn read(text: &str, options: ReadOptions) -> Vec<Result<MessagePair>> {
        Catalog::from_text("dolphin", CatalogFormat::Po, text, options)
            .into_messages()
            .collect()
    }

    #[test]
    fn test_po_reader_yields_translated_entries() {
        let messages: Vec<MessagePair> = read(SAMPLE_PO, ReadOptions::default())
            .into_iter()
            .map(|item| item.unwrap())
            .collect();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].source, "Select folder");
        assert_eq!(messages[0].target_text(), "Trieu la carpeta:");
        assert_eq!(messages[0].locale, "ca");
        assert_eq!(messages[0].catalog, "dolphin");
        assert_eq!(messages[0].id, "8");

        assert_eq!(messages[1].context.as_deref(), Some("@action"));
        assert_eq!(messages[1].target_text(), "Ha fallat '%s'");

        assert_eq!(messages[2].source_plural.as_deref(), Some("%d files"));
        assert_eq!(messages[2].targets, vec!["%d fitxer", "%d fitxers"]);
        assert_eq!(
            messages.iter().map(|m| m.position).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_po_reader_options() {
        let options = ReadOptions {
            locale: Some("ca@valencia".to_string()),
            include_fuzzy: true,
            include_untranslated: true,
        };
        let messages: Vec<MessagePair> = read(SAMPLE_PO, options)
            .into_iter()
            .map(|item| item.unwrap())
            .collect();

        assert_eq!(messages.len(), 5);
        assert!(messages.iter().all(|m| m.locale == "ca@valencia"));
    }

    #[test]
    fn test_po_reader_skips_bad_entry_and_continues() {
        let text = "msgid \"Bad\nmsgstr \"Dolent\"\n\nmsgid \"Good\"\nmsgstr \"Bo\"\n";
        let items = read(text, ReadOptions::default());

        assert_eq!(items.len(), 2);
        assert!(matches!(
            items[0],
            Err(CatalintError::CatalogParse { entry: 1, .. })
        ));
        assert_eq!(items[1].as_ref().unwrap().target_text(), "Bo");
    }

    #[test]
    fn test_unquote_po_escapes() {
        assert_eq!(unquote_po(r#""a\tb\n\"c\"""#).unwrap(), "a\tb\n\"c\"");
        assert!(unquote_po(r#""bad \q""#).is_err());
        assert!(unquote_po("unquoted").is_err());
    }

    #[test]
    fn test_json_reader() {
        let text = r#"[
            {"id": "a1", "locale": "ca", "source": "Select folder", "target": "Trieu la carpeta:"},
            {"source": 42},
            {"source": "File", "targets": ["Fitxer"], "context": "menu"}
        ]"#;
        let items: Vec<_> = Catalog::from_text("app", CatalogFormat::Json, text, ReadOptions::default())
            .into_messages()
            .collect();

        assert_eq!(items.len(), 3);
        let first = items[0].as_ref().unwrap();
        assert_eq!(first.id, "a1");
        assert_eq!(first.locale, "ca");
        assert!(items[1].is_err());
        let third = items[2].as_ref().unwrap();
        assert_eq!(third.id, "3");
        assert_eq!(third.position, 1);
        assert_eq!(third.context.as_deref(), Some("menu"));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(CatalogFormat::from_path(Path::new("ca.po")), Some(CatalogFormat::Po));
        assert_eq!(CatalogFormat::from_path(Path::new("x.pot")), Some(CatalogFormat::Po));
        assert_eq!(CatalogFormat::from_path(Path::new("x.json")), Some(CatalogFormat::Json));
        assert_eq!(CatalogFormat::from_path(Path::new("x.xliff")), None);
    }
}
