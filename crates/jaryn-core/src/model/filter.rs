//! Filter rules.
//!
//! The server stores a rule as flat fields (`property`, `matcher`, `value`,
//! `action`, `newFolder`, `forwardedTo`). A rule with several conditions is
//! stored as `property: "composite"`, `matcher: "complex"` with `value`
//! holding `field:value` pairs joined by `;`; every composite condition is a
//! case-insensitive substring match. [`Filter`] converts to and from that
//! shape through serde.

use serde::{Deserialize, Serialize};

use super::Email;

const COMPOSITE_PROPERTY: &str = "composite";
const COMPOSITE_MATCHER: &str = "complex";

/// Message field a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchField {
    /// Subject line.
    Subject,
    /// Body text.
    Body,
    /// Sender address.
    From,
    /// Any recipient address.
    To,
}

impl MatchField {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Body => "body",
            Self::From => "from",
            Self::To => "to",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subject" => Some(Self::Subject),
            "body" => Some(Self::Body),
            "from" | "sender" => Some(Self::From),
            "to" | "receiver" => Some(Self::To),
            _ => None,
        }
    }
}

/// How a condition compares text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Matcher {
    /// Substring.
    #[default]
    Contains,
    /// Prefix.
    StartsWith,
    /// Suffix.
    EndsWith,
    /// Whole value.
    Exactly,
}

impl Matcher {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::Exactly => "exactly",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "contains" => Some(Self::Contains),
            "startswith" => Some(Self::StartsWith),
            "endswith" => Some(Self::EndsWith),
            "exactly" | "isexactly" => Some(Self::Exactly),
            _ => None,
        }
    }

    fn test(self, text: &str, query: &str) -> bool {
        let text = text.to_lowercase();
        let query = query.to_lowercase();
        match self {
            Self::Contains => text.contains(&query),
            Self::StartsWith => text.starts_with(&query),
            Self::EndsWith => text.ends_with(&query),
            Self::Exactly => text == query,
        }
    }
}

/// A single test against a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Field inspected.
    pub field: MatchField,
    /// Comparison.
    pub matcher: Matcher,
    /// Value compared against.
    pub value: String,
}

impl Condition {
    /// Creates a condition.
    #[must_use]
    pub fn new(field: MatchField, matcher: Matcher, value: impl Into<String>) -> Self {
        Self {
            field,
            matcher,
            value: value.into(),
        }
    }

    /// Evaluates the condition against a message.
    #[must_use]
    pub fn matches(&self, email: &Email) -> bool {
        let value = self.value.trim();
        match self.field {
            MatchField::Subject => self.matcher.test(&email.subject, value),
            MatchField::Body => self.matcher.test(&email.body, value),
            MatchField::From => self.matcher.test(&email.from, value),
            MatchField::To => email.to.iter().any(|to| self.matcher.test(to, value)),
        }
    }
}

/// What a matching rule does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterAction {
    /// Move to a folder.
    Move {
        /// Target folder.
        folder: String,
    },
    /// Star.
    Star,
    /// Move to trash.
    Delete,
    /// Mark as read.
    MarkRead,
    /// Forward to another address.
    Forward {
        /// Forwarding address.
        to: String,
    },
}

impl FilterAction {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Star => "star",
            Self::Delete => "delete",
            Self::MarkRead => "markread",
            Self::Forward { .. } => "forward",
        }
    }
}

/// A filter rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "FilterWire", try_from = "FilterWire")]
pub struct Filter {
    /// Server id; absent until saved.
    pub id: Option<String>,
    /// Optional label.
    pub name: Option<String>,
    /// Conditions, all of which must hold.
    pub conditions: Vec<Condition>,
    /// Action applied on match.
    pub action: FilterAction,
}

impl Filter {
    /// Creates a single-condition rule.
    #[must_use]
    pub fn new(condition: Condition, action: FilterAction) -> Self {
        Self {
            id: None,
            name: None,
            conditions: vec![condition],
            action,
        }
    }

    /// Creates a multi-condition rule. Composite conditions always use
    /// substring matching.
    #[must_use]
    pub fn composite<I, S>(conditions: I, action: FilterAction) -> Self
    where
        I: IntoIterator<Item = (MatchField, S)>,
        S: Into<String>,
    {
        Self {
            id: None,
            name: None,
            conditions: conditions
                .into_iter()
                .map(|(field, value)| Condition::new(field, Matcher::Contains, value))
                .collect(),
            action,
        }
    }

    /// Sets the label.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns true if the rule has more than one condition.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.conditions.len() > 1
    }

    /// Evaluates the rule against a message.
    #[must_use]
    pub fn matches(&self, email: &Email) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.matches(email))
    }
}

/// Flat server representation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    property: String,
    #[serde(default)]
    matcher: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    new_folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    forwarded_to: Option<String>,
}

impl From<Filter> for FilterWire {
    fn from(filter: Filter) -> Self {
        let (property, matcher, value) = match filter.conditions.as_slice() {
            [single] => (
                single.field.as_str().to_string(),
                single.matcher.as_str().to_string(),
                single.value.clone(),
            ),
            conditions => (
                COMPOSITE_PROPERTY.to_string(),
                COMPOSITE_MATCHER.to_string(),
                conditions
                    .iter()
                    .map(|c| format!("{}:{}", c.field.as_str(), c.value.trim()))
                    .collect::<Vec<_>>()
                    .join(";"),
            ),
        };

        let action = filter.action.as_str().to_string();
        let (new_folder, forwarded_to) = match filter.action {
            FilterAction::Move { folder } => (Some(folder), None),
            FilterAction::Forward { to } => (None, Some(to)),
            _ => (None, None),
        };

        Self {
            id: filter.id,
            name: filter.name,
            property,
            matcher,
            value,
            action,
            new_folder,
            forwarded_to,
        }
    }
}

impl TryFrom<FilterWire> for Filter {
    type Error = String;

    fn try_from(wire: FilterWire) -> Result<Self, Self::Error> {
        let conditions = if wire.property.eq_ignore_ascii_case(COMPOSITE_PROPERTY) {
            decode_composite(&wire.value)?
        } else {
            let field = MatchField::parse(&wire.property)
                .ok_or_else(|| format!("unknown filter property: {}", wire.property))?;
            let matcher = Matcher::parse(&wire.matcher)
                .ok_or_else(|| format!("unknown filter matcher: {}", wire.matcher))?;
            vec![Condition::new(field, matcher, wire.value)]
        };

        let action = match wire.action.trim().to_ascii_lowercase().as_str() {
            "move" => FilterAction::Move {
                folder: wire.new_folder.unwrap_or_default(),
            },
            "star" => FilterAction::Star,
            "delete" => FilterAction::Delete,
            "markread" => FilterAction::MarkRead,
            "forward" => FilterAction::Forward {
                to: wire.forwarded_to.unwrap_or_default(),
            },
            other => return Err(format!("unknown filter action: {other}")),
        };

        Ok(Self {
            id: wire.id,
            name: wire.name,
            conditions,
            action,
        })
    }
}

fn decode_composite(value: &str) -> Result<Vec<Condition>, String> {
    let mut conditions = Vec::new();
    for pair in value.split(';').filter(|p| !p.trim().is_empty()) {
        let Some((key, val)) = pair.split_once(':') else {
            return Err(format!("malformed composite condition: {pair}"));
        };
        let field = MatchField::parse(key)
            .ok_or_else(|| format!("unknown filter property: {}", key.trim()))?;
        conditions.push(Condition::new(field, Matcher::Contains, val.trim()));
    }
    Ok(conditions)
}
