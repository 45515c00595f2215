//! Line-level syntax of rule files
//!
//! A rule file is line oriented. A trailing backslash joins a line with the
//! next one, lines starting with `#` are comments. Every other non-blank
//! line is either a trigger (`{...}`, `[...]` or `*part/.../`) followed by
//! match modifiers, or a directive made of `name` / `name="value"` fields.

use once_cell::sync::Lazy;
use regex::Regex;

static FIELD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^!?[a-z][\w-]*$").expect("field name regex is valid"));

/// A joined logical line and the number of its first physical line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub number: usize,
    pub text: String,
}

/// Join backslash-continued physical lines.
pub fn logical_lines(text: &str) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut pending: Option<LogicalLine> = None;

    for (index, raw) in text.lines().enumerate() {
        let (body, continued) = match raw.strip_suffix('\\') {
            Some(body) => (body, true),
            None => (raw, false),
        };

        let line = pending.get_or_insert_with(|| LogicalLine {
            number: index + 1,
            text: String::new(),
        });
        line.text.push_str(body);

        if !continued {
            lines.extend(pending.take());
        }
    }
    lines.extend(pending);
    lines
}

/// One `name` or `name=value` field of a directive line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            name: name.into(),
            value: value.map(str::to_string),
        }
    }
}

/// Parsed content of a logical line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Empty or whitespace-only; ends the current rule or group
    Blank,
    /// Comment line; ignored everywhere
    Comment,
    Trigger {
        /// Message part keyword (`msgid`, `msgstr`, `msgstr_1`, ...)
        part: String,
        pattern: String,
        modifiers: String,
    },
    Directive(Vec<Field>),
}

/// Split a logical line into its fields
pub fn parse_line(line: &str) -> Result<ParsedLine, String> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return Ok(ParsedLine::Blank);
    }
    if trimmed.starts_with('#') {
        return Ok(ParsedLine::Comment);
    }

    let mut cursor = Cursor::new(line);
    cursor.skip_whitespace();

    match cursor.peek() {
        Some(open @ ('{' | '[')) => {
            let part = if open == '{' { "msgid" } else { "msgstr" };
            let pattern = cursor.balanced(open)?;
            let modifiers = cursor.modifiers();
            Ok(ParsedLine::Trigger {
                part: part.to_string(),
                pattern,
                modifiers,
            })
        }
        Some('*') => {
            cursor.bump();
            cursor.skip_whitespace();
            let part = cursor.take_while(|c| c.is_alphanumeric() || c == '_');
            if part.is_empty() {
                return Err("Missing match keyword in trigger pattern".to_string());
            }
            cursor.skip_whitespace();
            if cursor.peek().is_none() {
                return Err("No pattern after the trigger keyword".to_string());
            }
            let pattern = cursor.quoted()?;
            let modifiers = cursor.modifiers();
            Ok(ParsedLine::Trigger {
                part,
                pattern,
                modifiers,
            })
        }
        _ => parse_fields(&mut cursor).map(ParsedLine::Directive),
    }
}

fn parse_fields(cursor: &mut Cursor<'_>) -> Result<Vec<Field>, String> {
    let mut fields = Vec::new();

    loop {
        cursor.skip_whitespace();
        match cursor.peek() {
            None | Some('#') => break,
            Some(_) => {}
        }

        let name = cursor.take_while(|c| !c.is_whitespace() && c != '=');
        if !FIELD_NAME.is_match(&name) {
            return Err(format!("Invalid field name: {name}"));
        }

        if cursor.peek() != Some('=') {
            fields.push(Field { name, value: None });
            continue;
        }
        cursor.bump();

        let value = match cursor.peek() {
            None => String::new(),
            Some(c) if c.is_whitespace() => String::new(),
            Some(_) => cursor.quoted()?,
        };
        fields.push(Field {
            name,
            value: Some(value),
        });
    }

    Ok(fields)
}

/// Character cursor over one line
struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            chars: line.chars().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !keep(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    /// Match modifiers after a trigger, up to a trailing `# comment`
    fn modifiers(&mut self) -> String {
        let mut out = String::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None | Some('#') => return out,
                Some(_) => out.push_str(&self.take_while(|c| !c.is_whitespace())),
            }
        }
    }

    /// Text up to the bracket closing the one at the cursor
    fn balanced(&mut self, open: char) -> Result<String, String> {
        let close = if open == '{' { '}' } else { ']' };
        self.bump();

        let mut depth = 1;
        let mut out = String::new();
        while let Some(c) = self.bump() {
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(out);
                }
            }
            out.push(c);
        }
        Err(format!("Unbalanced '{open}' in shorthand trigger pattern"))
    }

    /// Value delimited by the quote character at the cursor.
    ///
    /// A backslash before the quote character escapes it; any other
    /// backslash is kept as is.
    fn quoted(&mut self) -> Result<String, String> {
        let quote = self
            .bump()
            .ok_or_else(|| "Expected a quoted value".to_string())?;

        let mut out = String::new();
        while let Some(c) = self.bump() {
            if c == quote {
                return Ok(out);
            }
            if c == '\\' && self.peek() == Some(quote) {
                out.push(quote);
                self.bump();
                continue;
            }
            out.push(c);
        }
        Err(format!("Unterminated value quoted with '{quote}'"))
    }
}
