use crate::dom::document::{Document, NodeId};

/// Tags that are interactive without any extra markup.
pub const NATIVE_INTERACTIVE_TAGS: &[&str] = &[
    "a", "button", "input", "select", "textarea", "summary", "area", "option", "label",
    "details", "menuitem",
];

/// Structural tags swept when nothing interactive matches.
pub const STRUCTURAL_FALLBACK_TAGS: &[&str] = &[
    "div", "span", "li", "p", "h1", "h2", "h3", "h4", "h5", "h6", "img", "section", "article",
    "nav", "header", "footer",
];

const SKIPPED_TAGS: &[&str] = &[
    "html", "head", "body", "script", "style", "noscript", "template", "meta", "link", "title",
    "br", "hr",
];

const CLICKABLE_ROLES: &[&str] = &[
    "button", "link", "checkbox", "radio", "tab", "menuitem", "option", "switch", "slider",
    "menuitemcheckbox", "menuitemradio", "treeitem",
];

const INPUT_ROLES: &[&str] = &[
    "textbox", "searchbox", "combobox", "listbox", "slider", "spinbutton", "switch",
];

const CLICK_HANDLER_ATTRS: &[&str] = &["onclick", "onmousedown", "onpointerdown", "jsaction", "ng-click", "@click", "v-on:click"];

/// Explicit interactive markers: click handlers, roles, tabindex and friends.
pub fn has_interactive_marker(doc: &Document, node: NodeId) -> bool {
    CLICK_HANDLER_ATTRS.iter().any(|a| doc.has_attr(node, a))
        || doc
            .attr(node, "role")
            .map(|r| CLICKABLE_ROLES.contains(&r) || INPUT_ROLES.contains(&r))
            .unwrap_or(false)
        || doc.attr(node, "tabindex").map(|t| t.trim() != "-1").unwrap_or(false)
        || doc.has_attr(node, "aria-haspopup")
        || doc.has_attr(node, "aria-expanded")
        || doc.attr(node, "contenteditable") == Some("true")
}

pub fn is_native_interactive(doc: &Document, node: NodeId) -> bool {
    match doc.tag(node) {
        Some("input") => !is_hidden_input(doc, node),
        Some("a") => doc.has_attr(node, "href"),
        Some(tag) => NATIVE_INTERACTIVE_TAGS.contains(&tag),
        None => false,
    }
}

pub fn is_hidden_input(doc: &Document, node: NodeId) -> bool {
    doc.is_tag(node, "input")
        && doc
            .attr(node, "type")
            .map(|t| t.eq_ignore_ascii_case("hidden"))
            .unwrap_or(false)
}

pub fn is_clickable(doc: &Document, node: NodeId) -> bool {
    let Some(tag) = doc.tag(node) else {
        return false;
    };

    if matches!(tag, "button" | "summary" | "area" | "menuitem" | "option") {
        return true;
    }
    if tag == "a" {
        return doc.has_attr(node, "href") || has_interactive_marker(doc, node);
    }
    if tag == "input" {
        return !is_hidden_input(doc, node);
    }
    if tag == "label" && doc.has_attr(node, "for") {
        return true;
    }
    if CLICK_HANDLER_ATTRS.iter().any(|a| doc.has_attr(node, a)) {
        return true;
    }
    if let Some(role) = doc.attr(node, "role") {
        if CLICKABLE_ROLES.contains(&role) {
            return true;
        }
    }
    doc.attr(node, "tabindex").map(|t| t.trim() != "-1").unwrap_or(false)
        || doc.has_attr(node, "aria-haspopup")
        || doc.has_attr(node, "aria-expanded")
        || doc.attr(node, "draggable") == Some("true")
}

/// Elements that accept typed or selected input.
pub fn is_fillable(doc: &Document, node: NodeId) -> bool {
    match doc.tag(node) {
        Some("input") => {
            let kind = doc.attr(node, "type").unwrap_or("text").to_ascii_lowercase();
            !matches!(kind.as_str(), "hidden" | "submit" | "button" | "reset" | "image")
        }
        Some("textarea") | Some("select") => true,
        Some(_) => {
            doc.attr(node, "contenteditable") == Some("true")
                || doc
                    .attr(node, "role")
                    .map(|r| INPUT_ROLES.contains(&r))
                    .unwrap_or(false)
        }
        None => false,
    }
}

pub fn is_interactable(doc: &Document, node: NodeId) -> bool {
    is_fillable(doc, node)
        || doc.is_tag(node, "button")
        || ["onfocus", "onblur", "onkeydown", "onkeyup"]
            .iter()
            .any(|a| doc.has_attr(node, a))
        || doc.attr(node, "tabindex").map(|t| t.trim() != "-1").unwrap_or(false)
}

/// Hidden by its own markup (not by an ancestor).
pub fn is_self_hidden(doc: &Document, node: NodeId) -> bool {
    if is_hidden_input(doc, node) || doc.has_attr(node, "hidden") {
        return true;
    }
    if doc.attr(node, "aria-hidden") == Some("true") {
        return true;
    }
    if let Some(style) = doc.attr(node, "style") {
        let style = style.to_ascii_lowercase().replace(' ', "");
        if style.contains("display:none") || style.contains("visibility:hidden") {
            return true;
        }
    }
    doc.classes(node).any(|c| {
        matches!(
            c.to_ascii_lowercase().as_str(),
            "hidden" | "invisible" | "d-none" | "sr-only" | "visually-hidden"
        )
    })
}

pub fn is_visible(doc: &Document, node: NodeId) -> bool {
    doc.is_attached(node)
        && !is_self_hidden(doc, node)
        && !doc.ancestors(node).any(|a| is_self_hidden(doc, a))
}

pub fn is_skipped(doc: &Document, node: NodeId) -> bool {
    doc.tag(node).map(|t| SKIPPED_TAGS.contains(&t)).unwrap_or(true)
}

/// Plausibly-interactive elements in document order: native interactive tags, explicit
/// markers, then the structural fallback set.
pub fn candidate_elements(doc: &Document) -> Vec<NodeId> {
    doc.elements()
        .into_iter()
        .filter(|n| !is_skipped(doc, *n))
        .filter(|n| {
            is_native_interactive(doc, *n)
                || has_interactive_marker(doc, *n)
                || doc
                    .tag(*n)
                    .map(|t| STRUCTURAL_FALLBACK_TAGS.contains(&t))
                    .unwrap_or(false)
        })
        .collect()
}
