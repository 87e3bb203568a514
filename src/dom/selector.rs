//! CSS selectors evaluated against the arena [`Document`].
//!
//! Parsing goes through scraper's selector grammar, matching through the `selectors`
//! engine, so anything scraper accepts (`:not()`, `:nth-child(2n+1)`, sibling
//! combinators, ...) works here too.

use crate::dom::document::{Document, NodeId};
use crate::errors::{AutomationError, Result};
use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, PseudoElement, Simple};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{self, ElementSelectorFlags, MatchingContext};
use selectors::parser::{ParseRelative, SelectorImpl};
use selectors::{Element, OpaqueElement};

type Namespace = <Simple as SelectorImpl>::NamespaceUrl;

const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A parsed, comma-separated selector group.
#[derive(Debug, Clone)]
pub struct SelectorList {
    source: String,
    selectors: selectors::SelectorList<Simple>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser_input = cssparser::ParserInput::new(input);
        let mut parser = cssparser::Parser::new(&mut parser_input);
        let selectors = selectors::SelectorList::parse(&scraper::selector::Parser, &mut parser, ParseRelative::No)
            .map_err(|e| {
                AutomationError::InvalidSelector(format!(
                    "{}: {}",
                    input,
                    scraper::error::SelectorErrorKind::from(e)
                ))
            })?;
        Ok(Self {
            source: input.to_string(),
            selectors,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if !doc.is_element(node) {
            return false;
        }
        let element = ArenaElement { doc, id: node };
        let mut nth_index_cache = Default::default();
        let mut context = MatchingContext::new(
            matching::MatchingMode::Normal,
            None,
            &mut nth_index_cache,
            matching::QuirksMode::NoQuirks,
            matching::NeedsSelectorFlags::No,
            matching::IgnoreNthChildForInvalidation::No,
        );
        self.selectors
            .0
            .iter()
            .any(|s| matching::matches_selector(s, 0, None, &element, &mut context))
    }
}

/// Element handle the `selectors` engine walks.
#[derive(Debug, Clone, Copy)]
struct ArenaElement<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> ArenaElement<'a> {
    fn wrap(&self, id: NodeId) -> Self {
        Self { doc: self.doc, id }
    }

    fn sibling_element(&self, step: isize) -> Option<Self> {
        let parent = self.doc.parent(self.id)?;
        let siblings = self.doc.children(parent);
        let mut index = siblings.iter().position(|c| *c == self.id)? as isize;
        loop {
            index += step;
            if index < 0 {
                return None;
            }
            let candidate = *siblings.get(index as usize)?;
            if self.doc.is_element(candidate) {
                return Some(self.wrap(candidate));
            }
        }
    }
}

impl<'a> Element for ArenaElement<'a> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        match self.doc.node(self.id) {
            Some(node) => OpaqueElement::new(node),
            None => OpaqueElement::new(self.doc),
        }
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc.parent_element(self.id).map(|p| self.wrap(p))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.sibling_element(-1)
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.sibling_element(1)
    }

    fn first_element_child(&self) -> Option<Self> {
        self.doc.element_children(self.id).next().map(|c| self.wrap(c))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &CssLocalName) -> bool {
        self.doc.tag(self.id) == Some(&*name.0)
    }

    fn has_namespace(&self, namespace: &Namespace) -> bool {
        namespace.is_empty() || &**namespace == XHTML_NAMESPACE
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.doc.tag(self.id) == other.doc.tag(other.id)
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&Namespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        if let NamespaceConstraint::Specific(url) = ns {
            if !url.is_empty() {
                return false;
            }
        }
        self.doc
            .attrs(self.id)
            .iter()
            .any(|(key, value)| key.as_str() == &*local_name.0 && operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        _pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn match_pseudo_element(&self, _pe: &PseudoElement, _context: &mut MatchingContext<'_, Self::Impl>) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        matches!(self.doc.tag(self.id), Some("a") | Some("area") | Some("link")) && self.doc.has_attr(self.id, "href")
    }

    fn is_html_slot_element(&self) -> bool {
        self.doc.is_tag(self.id, "slot")
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        match self.doc.attr(self.id, "id") {
            Some(value) => case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()),
            None => false,
        }
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.doc
            .classes(self.id)
            .any(|c| case_sensitivity.eq(c.as_bytes(), name.0.as_bytes()))
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.doc.children(self.id).iter().all(|c| match self.doc.text_node(*c) {
            Some(text) => text.is_empty(),
            None => !self.doc.is_element(*c),
        })
    }

    fn is_root(&self) -> bool {
        self.doc.parent(self.id) == Some(self.doc.root())
    }
}
