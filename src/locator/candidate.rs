use crate::dom::{Document, NodeId};
use crate::forms::extract::resolve_label;
use crate::dom::inspect::is_fillable;
use serde::Serialize;
use std::fmt;

/// Which attribute or tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    Selector,
    ExactText,
    ContainsText,
    AriaLabel,
    Title,
    Placeholder,
    TestId,
    Id,
    Class,
    Name,
    Value,
    Alt,
    LabelText,
    TextContent,
    FallbackText,
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchReason::Selector => "selector",
            MatchReason::ExactText => "exact_text",
            MatchReason::ContainsText => "contains_text",
            MatchReason::AriaLabel => "aria_label",
            MatchReason::Title => "title",
            MatchReason::Placeholder => "placeholder",
            MatchReason::TestId => "test_id",
            MatchReason::Id => "id",
            MatchReason::Class => "class",
            MatchReason::Name => "name",
            MatchReason::Value => "value",
            MatchReason::Alt => "alt",
            MatchReason::LabelText => "label_text",
            MatchReason::TextContent => "text_content",
            MatchReason::FallbackText => "fallback_text",
        };
        f.write_str(name)
    }
}

pub const TEST_ID_ATTRS: &[&str] = &["data-testid", "data-test", "data-test-id", "data-cy", "data-qa"];

/// Attribute "contains" queries, in the order they are tried.
pub const ATTRIBUTE_QUERIES: &[(&str, MatchReason)] = &[
    ("aria-label", MatchReason::AriaLabel),
    ("title", MatchReason::Title),
    ("placeholder", MatchReason::Placeholder),
    ("data-testid", MatchReason::TestId),
    ("data-test", MatchReason::TestId),
    ("data-test-id", MatchReason::TestId),
    ("data-cy", MatchReason::TestId),
    ("data-qa", MatchReason::TestId),
    ("id", MatchReason::Id),
    ("class", MatchReason::Class),
];

/// One scored element inside a single resolution call.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub node: NodeId,
    pub score: f64,
    pub reason: MatchReason,
}

/// Diagnostic view of a candidate carried by `ELEMENT_NOT_FOUND`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSummary {
    pub selector: String,
    pub tag: String,
    pub text: String,
    pub score: f64,
    pub reason: MatchReason,
}

const SUMMARY_TEXT_LEN: usize = 80;

impl CandidateSummary {
    pub fn from_candidate(doc: &Document, candidate: &MatchCandidate) -> Self {
        let text: String = doc.text_content(candidate.node).chars().take(SUMMARY_TEXT_LEN).collect();
        Self {
            selector: doc.unique_selector(candidate.node),
            tag: doc.tag(candidate.node).unwrap_or_default().to_string(),
            text,
            score: (candidate.score * 1000.0).round() / 1000.0,
            reason: candidate.reason,
        }
    }
}

fn identifier_words(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect()
}

/// Every text-bearing source of `node` the sweep scores against.
pub fn text_sources(doc: &Document, node: NodeId) -> Vec<(MatchReason, String)> {
    let mut sources = Vec::new();

    let text = doc.text_content(node);
    if !text.is_empty() {
        sources.push((MatchReason::TextContent, text));
    }
    for (attr, reason) in [
        ("aria-label", MatchReason::AriaLabel),
        ("title", MatchReason::Title),
        ("placeholder", MatchReason::Placeholder),
        ("alt", MatchReason::Alt),
    ] {
        if let Some(value) = doc.attr_nonempty(node, attr) {
            sources.push((reason, value.to_string()));
        }
    }
    for attr in TEST_ID_ATTRS {
        if let Some(value) = doc.attr_nonempty(node, attr) {
            sources.push((MatchReason::TestId, identifier_words(value)));
        }
    }
    if let Some(id) = doc.attr_nonempty(node, "id") {
        sources.push((MatchReason::Id, identifier_words(id)));
    }
    if let Some(name) = doc.attr_nonempty(node, "name") {
        sources.push((MatchReason::Name, identifier_words(name)));
    }
    if doc.is_tag(node, "input") {
        if let Some(value) = doc.attr_nonempty(node, "value") {
            sources.push((MatchReason::Value, value.to_string()));
        }
    }
    if is_fillable(doc, node) {
        if let Some(label) = resolve_label(doc, node, node) {
            sources.push((MatchReason::LabelText, label));
        }
    }
    sources
}
