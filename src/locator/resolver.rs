//! Tiered element resolution: selector, exact text, substring text, attribute queries,
//! scored sweep, clickable/fillable substitution, plain-text fallback.

use crate::core::ElementHandle;
use crate::dom::inspect::{
    candidate_elements, has_interactive_marker, is_clickable, is_fillable, is_native_interactive,
    is_skipped, is_visible,
};
use crate::dom::{Document, NodeId, SelectorList};
use crate::errors::{AutomationError, Result};
use crate::locator::candidate::{
    text_sources, CandidateSummary, MatchCandidate, MatchReason, ATTRIBUTE_QUERIES, TEST_ID_ATTRS,
};
use crate::matching::similarity;
use tracing::{debug, trace};

/// Adjusted score a sweep candidate must exceed.
pub const MIN_ACCEPT_SCORE: f64 = 0.3;
/// Sweep stops at the first candidate scoring at least this much.
pub const EARLY_EXIT_SCORE: f64 = 0.95;
/// Text length bands and the multiplier applied past each.
pub const LENGTH_PENALTIES: &[(usize, f64)] = &[(1000, 0.1), (300, 0.4), (150, 0.7)];
pub const NATIVE_BONUS: f64 = 1.3;
pub const MARKER_BONUS: f64 = 1.15;
/// Text length bound of the plain-text fallback.
pub const FALLBACK_MAX_TEXT: usize = 200;
const REPORTED_CANDIDATES: usize = 5;

/// HTML element names accepted as bare type selectors in the selector slot.
const HTML_TAGS: &[&str] = &[
    "a", "abbr", "address", "area", "article", "aside", "audio", "b", "bdi", "bdo",
    "blockquote", "body", "br", "button", "canvas", "caption", "cite", "code", "col",
    "colgroup", "data", "datalist", "dd", "del", "details", "dfn", "dialog", "div", "dl", "dt",
    "em", "embed", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4",
    "h5", "h6", "head", "header", "hgroup", "hr", "html", "i", "iframe", "img", "input", "ins",
    "kbd", "label", "legend", "li", "main", "map", "mark", "menu", "meter", "nav", "object",
    "ol", "optgroup", "option", "output", "p", "picture", "pre", "progress", "q", "s", "samp",
    "section", "select", "slot", "small", "source", "span", "strong", "sub", "summary", "sup",
    "svg", "table", "tbody", "td", "template", "textarea", "tfoot", "th", "thead", "time",
    "title", "tr", "u", "ul", "var", "video",
];

/// What the caller intends to do with the element; drives substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Purpose {
    #[default]
    Any,
    Click,
    Fill,
}

impl Purpose {
    fn prefers(&self, doc: &Document, node: NodeId) -> bool {
        match self {
            Purpose::Any => false,
            Purpose::Click => is_clickable(doc, node),
            Purpose::Fill => is_fillable(doc, node),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    pub description: Option<String>,
    pub selector: Option<String>,
    pub purpose: Purpose,
}

impl ResolveRequest {
    pub fn new(description: Option<&str>, selector: Option<&str>, purpose: Purpose) -> Self {
        let clean = |s: Option<&str>| s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        Self {
            description: clean(description),
            selector: clean(selector),
            purpose,
        }
    }

    pub fn description(description: &str) -> Self {
        Self::new(Some(description), None, Purpose::Any)
    }

    pub fn with_purpose(mut self, purpose: Purpose) -> Self {
        self.purpose = purpose;
        self
    }
}

/// A resolved element and how it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub node: NodeId,
    pub handle: ElementHandle,
    pub reason: MatchReason,
    pub score: f64,
    /// Tier that produced the match, 1-based.
    pub tier: u8,
    /// Set when a container was swapped for a clickable/fillable descendant.
    pub substituted_from: Option<NodeId>,
}

/// Whether a caller-supplied selector string should be queried as CSS rather than read as
/// text. Anything carrying id/class/attribute/pseudo syntax or a child combinator counts;
/// otherwise it must parse and every compound must be an HTML (or custom element) tag, so
/// `form input` and `h1 + p` are selectors while `Buy now` is text.
pub fn is_selector_like(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.is_empty() {
        return false;
    }
    if raw.starts_with(['#', '.', '[']) || raw.contains(['>', '[', ']', '=', ':']) {
        return true;
    }
    if SelectorList::parse(raw).is_err() {
        return false;
    }
    raw.split(|c: char| c.is_whitespace() || matches!(c, ',' | '+' | '~'))
        .filter(|token| !token.is_empty())
        .all(|token| {
            let tag = token.split(['.', '#']).next().unwrap_or_default().to_ascii_lowercase();
            tag == "*" || tag.contains('-') || HTML_TAGS.contains(&tag.as_str())
        })
}

#[derive(Debug, Clone, Default)]
pub struct ElementResolver;

impl ElementResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, doc: &Document, request: &ResolveRequest) -> Result<Resolution> {
        let query = request
            .description
            .clone()
            .or_else(|| request.selector.clone().filter(|s| !is_selector_like(s)))
            .unwrap_or_default();

        if let Some(selector) = request.selector.as_deref().filter(|s| is_selector_like(s)) {
            match doc.select(selector) {
                Ok(nodes) => {
                    if let Some(node) = nodes.into_iter().find(|n| doc.is_attached(*n)) {
                        debug!("resolved {:?} by selector", selector);
                        return Ok(self.finish(doc, request.purpose, node, MatchReason::Selector, 1.0, 1));
                    }
                }
                Err(err) if query.is_empty() => return Err(err),
                Err(err) => debug!("selector {:?} rejected ({}), falling back to description", selector, err),
            }
            if query.is_empty() {
                return Err(AutomationError::ElementNotFound {
                    query: selector.to_string(),
                    candidates: Vec::new(),
                });
            }
        }

        if query.is_empty() {
            return Err(AutomationError::ValidationFailed(
                "a description or selector is required".to_string(),
            ));
        }

        let candidates: Vec<NodeId> = candidate_elements(doc)
            .into_iter()
            .filter(|n| is_visible(doc, *n))
            .collect();

        if let Some(node) = self.text_tier(doc, &candidates, request.purpose, |text| text == query.trim()) {
            return Ok(self.finish(doc, request.purpose, node, MatchReason::ExactText, 1.0, 2));
        }

        let lowered = query.trim().to_lowercase();
        if let Some(node) = self.text_tier(doc, &candidates, request.purpose, |text| {
            text.to_lowercase().contains(&lowered)
        }) {
            let score = similarity(&query, &doc.text_content(node));
            return Ok(self.finish(doc, request.purpose, node, MatchReason::ContainsText, score, 3));
        }

        if let Some((node, reason)) = self.attribute_tier(doc, &lowered) {
            return Ok(self.finish(doc, request.purpose, node, reason, 0.9, 4));
        }

        let scored = self.sweep(doc, &candidates, &query);
        if let Some(best) = scored.accepted.as_ref() {
            return Ok(self.finish(doc, request.purpose, best.node, best.reason, best.score, 5));
        }

        if let Some(node) = self.fallback_tier(doc, &lowered) {
            return Ok(self.finish(doc, request.purpose, node, MatchReason::FallbackText, 0.0, 7));
        }

        let mut ranked = scored.all;
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let summaries = ranked
            .iter()
            .take(REPORTED_CANDIDATES)
            .map(|c| CandidateSummary::from_candidate(doc, c))
            .collect();
        debug!("no element matched {:?}", query);
        Err(AutomationError::ElementNotFound {
            query,
            candidates: summaries,
        })
    }

    /// Tiers 2 and 3: text predicate over the candidate set, innermost match, DOM order.
    fn text_tier<F>(&self, doc: &Document, candidates: &[NodeId], purpose: Purpose, matches: F) -> Option<NodeId>
    where
        F: Fn(&str) -> bool,
    {
        let hits: Vec<NodeId> = candidates
            .iter()
            .copied()
            .filter(|n| matches(&doc.text_content(*n)))
            .collect();
        innermost(doc, &hits, purpose).into_iter().next()
    }

    /// Tier 4: case-insensitive "contains" per attribute, attributes in fixed order.
    fn attribute_tier(&self, doc: &Document, lowered: &str) -> Option<(NodeId, MatchReason)> {
        let elements: Vec<NodeId> = doc
            .elements()
            .into_iter()
            .filter(|n| !is_skipped(doc, *n) && is_visible(doc, *n))
            .collect();
        ATTRIBUTE_QUERIES.iter().find_map(|(attr, reason)| {
            elements
                .iter()
                .copied()
                .find(|n| {
                    doc.attr(*n, attr)
                        .map(|v| v.to_lowercase().contains(lowered))
                        .unwrap_or(false)
                })
                .map(|n| (n, *reason))
        })
    }

    /// Tier 5: score every candidate, keep the first strictly-better one above threshold.
    fn sweep(&self, doc: &Document, candidates: &[NodeId], query: &str) -> Sweep {
        let mut sweep = Sweep::default();
        for node in candidates {
            let Some(candidate) = score_element(doc, *node, query) else {
                continue;
            };
            trace!("sweep {} scored {:.3} via {}", node, candidate.score, candidate.reason);

            let best = sweep.accepted.as_ref().map(|b| b.score).unwrap_or(MIN_ACCEPT_SCORE);
            let early_exit = candidate.score >= EARLY_EXIT_SCORE;
            if candidate.score > best {
                sweep.accepted = Some(candidate.clone());
            }
            sweep.all.push(candidate);
            if early_exit {
                break;
            }
        }
        sweep
    }

    /// Tier 7: any element whose text contains the query and stays short.
    fn fallback_tier(&self, doc: &Document, lowered: &str) -> Option<NodeId> {
        doc.elements().into_iter().find(|n| {
            if is_skipped(doc, *n) {
                return false;
            }
            let text = doc.text_content(*n);
            text.chars().count() < FALLBACK_MAX_TEXT && text.to_lowercase().contains(lowered)
        })
    }

    fn finish(
        &self,
        doc: &Document,
        purpose: Purpose,
        node: NodeId,
        reason: MatchReason,
        score: f64,
        tier: u8,
    ) -> Resolution {
        let substitute = match purpose {
            Purpose::Click if !is_clickable(doc, node) => clickable_descendant(doc, node),
            Purpose::Fill if !is_fillable(doc, node) => fillable_substitute(doc, node),
            _ => None,
        };
        let (target, substituted_from) = match substitute {
            Some(sub) => {
                debug!("substituted {} for {}", doc.unique_selector(sub), doc.unique_selector(node));
                (sub, Some(node))
            }
            None => (node, None),
        };
        Resolution {
            node: target,
            handle: ElementHandle::new(doc, target),
            reason,
            score,
            tier,
            substituted_from,
        }
    }
}

#[derive(Debug, Default)]
struct Sweep {
    accepted: Option<MatchCandidate>,
    all: Vec<MatchCandidate>,
}

/// Highest source score of `node`, with length penalty and interactivity bonus applied.
pub fn score_element(doc: &Document, node: NodeId, query: &str) -> Option<MatchCandidate> {
    let (reason, raw) = text_sources(doc, node)
        .into_iter()
        .map(|(reason, text)| (reason, similarity(query, &text)))
        .fold(None, |best: Option<(MatchReason, f64)>, (reason, score)| match best {
            Some((_, b)) if b >= score => best,
            _ => Some((reason, score)),
        })?;
    if raw <= 0.0 {
        return None;
    }

    let length = doc.text_content(node).chars().count();
    let penalty = LENGTH_PENALTIES
        .iter()
        .find(|(band, _)| length > *band)
        .map(|(_, factor)| *factor)
        .unwrap_or(1.0);
    let bonus = if is_native_interactive(doc, node) {
        NATIVE_BONUS
    } else if has_interactive_marker(doc, node) {
        MARKER_BONUS
    } else {
        1.0
    };

    Some(MatchCandidate {
        node,
        score: raw * penalty * bonus,
        reason,
    })
}

/// Drop every hit that contains another hit, unless the container suits `purpose` and the
/// inner hit does not.
fn innermost(doc: &Document, hits: &[NodeId], purpose: Purpose) -> Vec<NodeId> {
    hits.iter()
        .copied()
        .filter(|outer| {
            !hits.iter().any(|inner| {
                inner != outer
                    && doc.is_ancestor(*outer, *inner)
                    && (purpose.prefers(doc, *inner) || !purpose.prefers(doc, *outer))
            })
        })
        .collect()
}

fn is_button_like_input(doc: &Document, node: NodeId) -> bool {
    doc.is_tag(node, "input")
        && doc
            .attr(node, "type")
            .map(|t| matches!(t.to_ascii_lowercase().as_str(), "button" | "submit" | "reset" | "image"))
            .unwrap_or(false)
}

fn is_test_id_button(doc: &Document, node: NodeId) -> bool {
    TEST_ID_ATTRS.iter().any(|a| {
        doc.attr(node, a)
            .map(|v| {
                let v = v.to_ascii_lowercase();
                v.contains("button") || v.contains("btn")
            })
            .unwrap_or(false)
    })
}

fn is_link(doc: &Document, node: NodeId) -> bool {
    doc.is_tag(node, "a") && doc.has_attr(node, "href")
}

fn is_button(doc: &Document, node: NodeId) -> bool {
    doc.is_tag(node, "button")
}

fn has_button_role(doc: &Document, node: NodeId) -> bool {
    doc.attr(node, "role")
        .map(|r| r.eq_ignore_ascii_case("button"))
        .unwrap_or(false)
}

fn has_click_handler(doc: &Document, node: NodeId) -> bool {
    doc.has_attr(node, "onclick")
}

type DescendantTest = fn(&Document, NodeId) -> bool;

/// Preference order for click substitution.
const CLICKABLE_DESCENDANTS: &[DescendantTest] = &[
    is_link,
    is_button,
    is_button_like_input,
    has_button_role,
    has_click_handler,
    is_test_id_button,
];

fn clickable_descendant(doc: &Document, node: NodeId) -> Option<NodeId> {
    let descendants: Vec<NodeId> = doc
        .descendants(node)
        .into_iter()
        .filter(|n| is_visible(doc, *n))
        .collect();
    CLICKABLE_DESCENDANTS
        .iter()
        .find_map(|test| descendants.iter().copied().find(|n| test(doc, *n)))
}

/// `label[for]` → its control; otherwise the first fillable descendant; otherwise the
/// control of an enclosing `<label>`.
fn fillable_substitute(doc: &Document, node: NodeId) -> Option<NodeId> {
    if doc.is_tag(node, "label") {
        if let Some(target) = doc.attr_nonempty(node, "for") {
            let control = doc.find_first(doc.root(), |d, n| d.attr(n, "id") == Some(target) && is_fillable(d, n));
            if control.is_some() {
                return control;
            }
        }
    }
    doc.descendants(node)
        .into_iter()
        .find(|n| is_fillable(doc, *n))
        .or_else(|| {
            let label = doc.ancestors(node).find(|a| doc.is_tag(*a, "label"))?;
            doc.descendants(label).into_iter().find(|n| is_fillable(doc, *n))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(html: &str, request: ResolveRequest) -> Result<(Document, Resolution)> {
        let doc = Document::parse(html);
        let resolution = ElementResolver::new().resolve(&doc, &request)?;
        Ok((doc, resolution))
    }

    #[test]
    fn selector_tier_and_invalid_selector() {
        let (doc, found) = resolve(
            r#"<button id="a">One</button><button id="b">Two</button>"#,
            ResolveRequest::new(None, Some("#b"), Purpose::Click),
        )
        .unwrap();
        assert_eq!(found.tier, 1);
        assert_eq!(doc.attr(found.node, "id"), Some("b"));

        let err = resolve("<p>x</p>", ResolveRequest::new(None, Some("a:hover"), Purpose::Any)).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::ValidationFailed);
    }

    #[test]
    fn selector_slot_reads_plain_tag_combinators_as_css() {
        let html = r#"<h1>Title</h1><p>first</p><p>second</p>
                      <form><p>Search the form input</p><input name="q"></form>
                      <ul><li>one</li></ul>"#;
        for (selector, tag, text) in [("form input", "input", ""), ("ul li", "li", "one"), ("h1 + p", "p", "first")] {
            let (doc, found) = resolve(html, ResolveRequest::new(None, Some(selector), Purpose::Any)).unwrap();
            assert_eq!(found.tier, 1, "{}", selector);
            assert_eq!(found.reason, MatchReason::Selector);
            assert_eq!(doc.tag(found.node), Some(tag));
            assert_eq!(doc.text_content(found.node), text);
        }

        assert!(is_selector_like("h1 ~ p"));
        assert!(is_selector_like("button.primary"));
        assert!(is_selector_like("my-widget span"));
        assert!(!is_selector_like("Buy now"));
        assert!(!is_selector_like("Add to cart + checkout"));
    }

    #[test]
    fn exact_text_prefers_innermost() {
        let (doc, found) = resolve(
            r#"<div><span>Save</span></div><div class="panel"><p>Save</p></div>"#,
            ResolveRequest::description("Save"),
        )
        .unwrap();
        assert_eq!(found.tier, 2);
        assert_eq!(doc.tag(found.node), Some("span"));
    }

    #[test]
    fn click_keeps_clickable_container_over_inner_span() {
        let (doc, found) = resolve(
            r#"<button id="go"><span>Continue</span></button>"#,
            ResolveRequest::description("Continue").with_purpose(Purpose::Click),
        )
        .unwrap();
        assert_eq!(doc.attr(found.node, "id"), Some("go"));
    }

    #[test]
    fn nested_button_is_substituted_for_container() {
        let (doc, found) = resolve(
            r#"<div class="card" aria-label="Submit"><h3>Apply</h3><button>Send</button></div>"#,
            ResolveRequest::description("Submit").with_purpose(Purpose::Click),
        )
        .unwrap();
        assert_eq!(found.tier, 4);
        assert_eq!(doc.tag(found.node), Some("button"));
        assert!(found.substituted_from.is_some());
    }

    #[test]
    fn attribute_order_is_fixed() {
        let (doc, found) = resolve(
            r#"<input id="email-field"><input placeholder="Your email">"#,
            ResolveRequest::description("email"),
        )
        .unwrap();
        assert_eq!(found.reason, MatchReason::Placeholder);
        assert_eq!(doc.attr(found.node, "placeholder"), Some("Your email"));
    }

    #[test]
    fn sweep_uses_word_overlap() {
        let (doc, found) = resolve(
            r#"<a href="/x">Read the docs</a><button>Submit Your Application</button>"#,
            ResolveRequest::description("submit application").with_purpose(Purpose::Click),
        )
        .unwrap();
        assert_eq!(found.tier, 5);
        assert_eq!(doc.tag(found.node), Some("button"));
    }

    #[test]
    fn sweep_ties_keep_the_earliest_candidate() {
        let (doc, found) = resolve(
            r#"<ul><li id="first">order status</li><li id="second">order status</li></ul>"#,
            ResolveRequest::description("status order"),
        )
        .unwrap();
        assert_eq!(found.tier, 5);
        assert_eq!(doc.attr(found.node, "id"), Some("first"));
    }

    #[test]
    fn sweep_stops_at_a_near_perfect_score() {
        let html = r#"<img alt="open menu" src="m.png"><button name="open_menu">x</button>"#;
        let (doc, found) = resolve(html, ResolveRequest::description("open menu")).unwrap();
        assert_eq!(found.tier, 5);
        assert_eq!(found.reason, MatchReason::Alt);
        assert_eq!(doc.tag(found.node), Some("img"));

        let button = doc.select_first("button").unwrap().unwrap();
        assert!(score_element(&doc, button, "open menu").unwrap().score > found.score);
    }

    #[test]
    fn absolute_fallback_takes_short_text_outside_the_candidate_set() {
        let (doc, found) = resolve("<strong>Order 4521 shipped</strong>", ResolveRequest::description("4521")).unwrap();
        assert_eq!(found.tier, 7);
        assert_eq!(found.reason, MatchReason::FallbackText);
        assert_eq!(doc.tag(found.node), Some("strong"));

        let long = format!("<em>{} 4521</em>", "x".repeat(FALLBACK_MAX_TEXT));
        let err = resolve(&long, ResolveRequest::description("4521")).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::ElementNotFound);
    }

    #[test]
    fn fill_substitutes_label_control() {
        let (doc, found) = resolve(
            r#"<label for="n">Full name</label><input id="n">"#,
            ResolveRequest::description("Full name").with_purpose(Purpose::Fill),
        )
        .unwrap();
        assert_eq!(doc.attr(found.node, "id"), Some("n"));
    }

    #[test]
    fn failure_carries_ranked_candidates() {
        let err = resolve(
            r#"<button>Alpha beta</button><button>Gamma</button>"#,
            ResolveRequest::description("zeta omega"),
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::ElementNotFound);
        match err {
            AutomationError::ElementNotFound { query, candidates } => {
                assert_eq!(query, "zeta omega");
                assert!(candidates.len() <= 5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn resolution_is_idempotent() {
        let doc = Document::parse(r##"<div><button>Next</button><a href="#">Next page</a></div>"##);
        let resolver = ElementResolver::new();
        let request = ResolveRequest::description("next").with_purpose(Purpose::Click);
        let first = resolver.resolve(&doc, &request).unwrap();
        let second = resolver.resolve(&doc, &request).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn length_penalty_demotes_page_wrappers() {
        let filler = "lorem ipsum ".repeat(40);
        let html = format!(r#"<div id="wrap">{} checkout flow</div><button>Checkout now</button>"#, filler);
        let doc = Document::parse(&html);
        let wrap = doc.select_first("#wrap").unwrap().unwrap();
        let button = doc.select_first("button").unwrap().unwrap();
        let wrap_score = score_element(&doc, wrap, "checkout flow now").unwrap().score;
        let button_score = score_element(&doc, button, "checkout flow now").unwrap().score;
        assert!(button_score > wrap_score);
    }
}
