//! Message pairs and the named parts rules look at

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// One translated message: a source text and its target form(s).
///
/// `position` is the message's place in its catalog and is the ordering key
/// for deterministic output; `id` is only used to attribute diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePair {
    pub position: usize,
    pub id: String,
    pub locale: String,
    #[serde(default)]
    pub catalog: String,
    #[serde(default)]
    pub context: Option<String>,
    pub source: String,
    #[serde(default)]
    pub source_plural: Option<String>,
    pub targets: Vec<String>,
}

impl MessagePair {
    /// Create a single-form message whose id is its position
    pub fn new(
        position: usize,
        locale: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            position,
            id: position.to_string(),
            locale: locale.into(),
            catalog: String::new(),
            context: None,
            source: source.into(),
            source_plural: None,
            targets: vec![target.into()],
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = catalog.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Turn this into a plural message with the given source plural and target forms
    pub fn with_plural(mut self, source_plural: impl Into<String>, targets: Vec<String>) -> Self {
        self.source_plural = Some(source_plural.into());
        self.targets = targets;
        self
    }

    pub fn source_text(&self) -> &str {
        &self.source
    }

    /// First target form, or an empty string for untranslated entries
    pub fn target_text(&self) -> &str {
        self.targets.first().map(String::as_str).unwrap_or("")
    }

    pub fn is_plural(&self) -> bool {
        self.source_plural.is_some()
    }

    /// Texts of the given part, in the order rules scan them.
    ///
    /// Each item carries the target form index (0 for non-target parts).
    pub fn part_texts(&self, part: MessagePart) -> Vec<(usize, &str)> {
        match part {
            MessagePart::Context => vec![(0, self.context.as_deref().unwrap_or(""))],
            MessagePart::Source => {
                let mut texts = vec![(0, self.source.as_str())];
                if let Some(plural) = &self.source_plural {
                    texts.push((0, plural.as_str()));
                }
                texts
            }
            MessagePart::SourceSingular => vec![(0, self.source.as_str())],
            MessagePart::SourcePlural => vec![(0, self.source_plural.as_deref().unwrap_or(""))],
            MessagePart::Target => self
                .targets
                .iter()
                .enumerate()
                .map(|(index, text)| (index, text.as_str()))
                .collect(),
            MessagePart::TargetForm(n) => self
                .targets
                .get(n)
                .map(|text| vec![(n, text.as_str())])
                .unwrap_or_default(),
        }
    }

    /// Apply a text transformation to the source and target texts.
    ///
    /// Returns the message unchanged (borrowed) when nothing was altered.
    pub fn map_texts<F, G>(&self, mut on_source: F, mut on_target: G) -> Cow<'_, MessagePair>
    where
        F: FnMut(&str) -> Cow<'_, str>,
        G: FnMut(&str) -> Cow<'_, str>,
    {
        let source = on_source(&self.source).into_owned();
        let source_plural = self
            .source_plural
            .as_deref()
            .map(|text| on_source(text).into_owned());
        let targets: Vec<String> = self
            .targets
            .iter()
            .map(|text| on_target(text).into_owned())
            .collect();

        if source == self.source && source_plural == self.source_plural && targets == self.targets
        {
            return Cow::Borrowed(self);
        }

        Cow::Owned(MessagePair {
            source,
            source_plural,
            targets,
            ..self.clone()
        })
    }
}

/// Named text of a message that a trigger or exception test inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePart {
    /// `msgctxt`
    Context,
    /// `msgid`: singular and plural source
    Source,
    /// `msgid_singular`
    SourceSingular,
    /// `msgid_plural`
    SourcePlural,
    /// `msgstr`: every target form
    Target,
    /// `msgstr_N`
    TargetForm(usize),
}

impl MessagePart {
    /// Parse a rule file keyword (`msgid`, `msgstr_1`, ...)
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "msgctxt" => Some(Self::Context),
            "msgid" => Some(Self::Source),
            "msgid_singular" => Some(Self::SourceSingular),
            "msgid_plural" => Some(Self::SourcePlural),
            "msgstr" => Some(Self::Target),
            other => other
                .strip_prefix("msgstr_")
                .and_then(|n| n.parse().ok())
                .map(Self::TargetForm),
        }
    }

    /// Rule file keyword for this part
    pub fn keyword(&self) -> Cow<'static, str> {
        match self {
            Self::Context => Cow::Borrowed("msgctxt"),
            Self::Source => Cow::Borrowed("msgid"),
            Self::SourceSingular => Cow::Borrowed("msgid_singular"),
            Self::SourcePlural => Cow::Borrowed("msgid_plural"),
            Self::Target => Cow::Borrowed("msgstr"),
            Self::TargetForm(n) => Cow::Owned(format!("msgstr_{n}")),
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(
            self,
            Self::Source | Self::SourceSingular | Self::SourcePlural
        )
    }
}

impl fmt::Display for MessagePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keyword())
    }
}
