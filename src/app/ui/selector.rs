//! Declarative element predicates.
//!
//! A [`Selector`] is plain data: a list of attribute rules plus optional boolean flags, all of
//! which must hold for an element to match. Relative placement (`right_of`) and the choice
//! between the first and last match are resolved against a whole screen in
//! [`Screen::find`](super::hierarchy::Screen::find).

use regex::Regex;
use std::fmt;

use super::hierarchy::UiNode;
use crate::app::error::AppError;

/// A full-match regular expression. Equality compares the source pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Option<Regex>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let regex = Regex::new(&format!("^(?:{source})$")).ok();
        Self { source, regex }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex
            .as_ref()
            .map(|regex| regex.is_match(value))
            .unwrap_or(false)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextRule {
    Exact(String),
    StartsWith(String),
    Contains(String),
    Matches(Pattern),
}

impl TextRule {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            TextRule::Exact(expected) => value == expected,
            TextRule::StartsWith(prefix) => value.starts_with(prefix.as_str()),
            TextRule::Contains(needle) => value.contains(needle.as_str()),
            TextRule::Matches(pattern) => pattern.is_match(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Text,
    Description,
    ClassName,
    ResourceId,
}

impl Attribute {
    fn value<'a>(&self, node: &'a UiNode) -> &'a str {
        match self {
            Attribute::Text => &node.text,
            Attribute::Description => &node.content_desc,
            Attribute::ClassName => &node.class_name,
            Attribute::ResourceId => &node.resource_id,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Attribute::Text => "text",
            Attribute::Description => "description",
            Attribute::ClassName => "className",
            Attribute::ResourceId => "resourceId",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub attribute: Attribute,
    pub matcher: TextRule,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pick {
    #[default]
    First,
    Last,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    rules: Vec<Rule>,
    clickable: Option<bool>,
    scrollable: Option<bool>,
    checked: Option<bool>,
    right_of: Option<Box<Selector>>,
    pick: Pick,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    fn rule(mut self, attribute: Attribute, matcher: TextRule) -> Self {
        self.rules.push(Rule { attribute, matcher });
        self
    }

    pub fn text(self, value: impl Into<String>) -> Self {
        self.rule(Attribute::Text, TextRule::Exact(value.into()))
    }

    pub fn text_starts_with(self, value: impl Into<String>) -> Self {
        self.rule(Attribute::Text, TextRule::StartsWith(value.into()))
    }

    pub fn text_contains(self, value: impl Into<String>) -> Self {
        self.rule(Attribute::Text, TextRule::Contains(value.into()))
    }

    pub fn text_matches(self, pattern: impl Into<String>) -> Self {
        self.rule(Attribute::Text, TextRule::Matches(Pattern::new(pattern)))
    }

    pub fn description(self, value: impl Into<String>) -> Self {
        self.rule(Attribute::Description, TextRule::Exact(value.into()))
    }

    pub fn description_starts_with(self, value: impl Into<String>) -> Self {
        self.rule(Attribute::Description, TextRule::StartsWith(value.into()))
    }

    pub fn description_contains(self, value: impl Into<String>) -> Self {
        self.rule(Attribute::Description, TextRule::Contains(value.into()))
    }

    pub fn description_matches(self, pattern: impl Into<String>) -> Self {
        self.rule(Attribute::Description, TextRule::Matches(Pattern::new(pattern)))
    }

    pub fn class_name(self, value: impl Into<String>) -> Self {
        self.rule(Attribute::ClassName, TextRule::Exact(value.into()))
    }

    pub fn class_matches(self, pattern: impl Into<String>) -> Self {
        self.rule(Attribute::ClassName, TextRule::Matches(Pattern::new(pattern)))
    }

    pub fn resource_id_matches(self, pattern: impl Into<String>) -> Self {
        self.rule(Attribute::ResourceId, TextRule::Matches(Pattern::new(pattern)))
    }

    pub fn clickable(mut self, value: bool) -> Self {
        self.clickable = Some(value);
        self
    }

    pub fn scrollable(mut self, value: bool) -> Self {
        self.scrollable = Some(value);
        self
    }

    pub fn checked(mut self, value: bool) -> Self {
        self.checked = Some(value);
        self
    }

    /// Nearest match to the right of the first element matching `anchor`.
    pub fn right_of(mut self, anchor: Selector) -> Self {
        self.right_of = Some(Box::new(anchor));
        self
    }

    /// Resolve to the last match in document order instead of the first.
    pub fn last(mut self) -> Self {
        self.pick = Pick::Last;
        self
    }

    pub fn anchor(&self) -> Option<&Selector> {
        self.right_of.as_deref()
    }

    pub fn pick(&self) -> Pick {
        self.pick
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
            && self.clickable.is_none()
            && self.scrollable.is_none()
            && self.checked.is_none()
    }

    pub fn validate(&self, trace_id: &str) -> Result<(), AppError> {
        if self.is_empty() {
            return Err(AppError::validation(
                "selector must constrain at least one field",
                trace_id,
            ));
        }
        for rule in &self.rules {
            if let TextRule::Matches(pattern) = &rule.matcher {
                if !pattern.is_valid() {
                    return Err(AppError::validation(
                        format!("invalid selector pattern: {}", pattern.source()),
                        trace_id,
                    ));
                }
            }
        }
        match &self.right_of {
            Some(anchor) => anchor.validate(trace_id),
            None => Ok(()),
        }
    }

    /// Attribute-level match of a single node. Placement and pick are screen-level concerns.
    pub fn matches(&self, node: &UiNode) -> bool {
        let flags = [
            (self.clickable, node.clickable),
            (self.scrollable, node.scrollable),
            (self.checked, node.checked),
        ];
        flags
            .iter()
            .all(|(expected, actual)| expected.map_or(true, |value| value == *actual))
            && self
                .rules
                .iter()
                .all(|rule| rule.matcher.matches(rule.attribute.value(node)))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for rule in &self.rules {
            let label = rule.attribute.label();
            parts.push(match &rule.matcher {
                TextRule::Exact(value) => format!("{label}={value:?}"),
                TextRule::StartsWith(value) => format!("{label}^={value:?}"),
                TextRule::Contains(value) => format!("{label}*={value:?}"),
                TextRule::Matches(pattern) => format!("{label}~={:?}", pattern.source()),
            });
        }
        for (label, flag) in [
            ("clickable", self.clickable),
            ("scrollable", self.scrollable),
            ("checked", self.checked),
        ] {
            if let Some(value) = flag {
                parts.push(format!("{label}={value}"));
            }
        }
        if let Some(anchor) = &self.right_of {
            parts.push(format!("rightOf({anchor})"));
        }
        if self.pick == Pick::Last {
            parts.push("last".to_string());
        }
        write!(f, "[{}]", parts.join(" "))
    }
}
