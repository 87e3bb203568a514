//! Shared value/label/option/flag extraction used by the classifier detectors.

use crate::dom::inspect::is_hidden_input;
use crate::dom::{Document, NodeId};

const OPTION_CLASSES: &[&str] = &[
    "option", "select-option", "dropdown-option", "dropdown-item", "menu-item", "list-option",
    "select__option", "listbox-option",
];
const SELECTED_CLASSES: &[&str] = &["selected", "is-selected", "active", "is-active", "checked", "is-checked"];
const CHIP_FRAGMENTS: &[&str] = &["chip", "tag", "token", "pill", "badge"];
const REMOVE_GLYPHS: &[&str] = &["×", "✕", "x", "X"];

pub fn is_native_control(doc: &Document, node: NodeId) -> bool {
    match doc.tag(node) {
        Some("select") | Some("textarea") => true,
        Some("input") => !is_hidden_input(doc, node),
        _ => false,
    }
}

pub fn native_controls(doc: &Document, scope: NodeId) -> Vec<NodeId> {
    doc.find_all(scope, is_native_control)
}

pub fn input_type(doc: &Document, node: NodeId) -> String {
    doc.attr(node, "type").unwrap_or("text").trim().to_ascii_lowercase()
}

pub fn is_input_of(doc: &Document, node: NodeId, types: &[&str]) -> bool {
    doc.is_tag(node, "input") && types.contains(&input_type(doc, node).as_str())
}

/// Design-system type marker (`data-type`, `data-field-type`, `data-component`).
pub fn type_marker(doc: &Document, node: NodeId) -> Option<String> {
    ["data-field-type", "data-type", "data-component", "data-input-type"]
        .iter()
        .find_map(|a| doc.attr_nonempty(node, a))
        .map(|v| v.to_ascii_lowercase())
}

pub fn has_type_marker(doc: &Document, node: NodeId, values: &[&str]) -> bool {
    type_marker(doc, node)
        .map(|m| values.contains(&m.as_str()))
        .unwrap_or(false)
}

pub fn role_is(doc: &Document, node: NodeId, roles: &[&str]) -> bool {
    doc.attr(node, "role")
        .map(|r| roles.contains(&r.trim().to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn class_has_any(doc: &Document, node: NodeId, fragments: &[&str]) -> bool {
    fragments.iter().any(|f| doc.class_contains(node, f))
}

/// Explicit value-bearing attribute, in preference order.
pub fn explicit_value(doc: &Document, node: NodeId) -> Option<String> {
    ["value", "data-value", "aria-valuetext", "aria-valuenow"]
        .iter()
        .find_map(|a| doc.attr(node, a))
        .map(|v| v.trim().to_string())
}

fn is_option_like(doc: &Document, node: NodeId) -> bool {
    doc.is_tag(node, "option")
        || role_is(doc, node, &["option", "menuitemradio", "menuitemcheckbox"])
        || doc.has_attr(node, "data-option")
        || doc
            .classes(node)
            .any(|c| OPTION_CLASSES.contains(&c.to_ascii_lowercase().as_str()))
}

/// Option-like leaves under `scope`, document order.
pub fn option_nodes(doc: &Document, scope: NodeId) -> Vec<NodeId> {
    let candidates: Vec<NodeId> = doc
        .descendants(scope)
        .into_iter()
        .filter(|n| is_option_like(doc, *n))
        .collect();
    candidates
        .iter()
        .copied()
        .filter(|n| !candidates.iter().any(|o| o != n && doc.is_ancestor(*n, *o)))
        .collect()
}

pub fn option_text(doc: &Document, node: NodeId) -> String {
    if let Some(label) = doc.attr_nonempty(node, "data-label").or_else(|| doc.attr_nonempty(node, "label")) {
        return label.to_string();
    }
    let text = doc.text_content(node);
    if !text.is_empty() {
        return text;
    }
    option_value(doc, node)
}

pub fn option_value(doc: &Document, node: NodeId) -> String {
    doc.attr(node, "value")
        .or_else(|| doc.attr(node, "data-value"))
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| doc.text_content(node))
}

pub fn is_selected(doc: &Document, node: NodeId) -> bool {
    doc.has_attr(node, "selected")
        || doc.attr_is_true(node, "aria-selected")
        || doc.attr_is_true(node, "aria-checked")
        || doc.attr_is_true(node, "aria-pressed")
        || doc.attr_is_true(node, "data-selected")
        || matches!(
            doc.attr(node, "data-state").map(|s| s.to_ascii_lowercase()),
            Some(ref s) if s == "on" || s == "checked" || s == "active" || s == "selected"
        )
        || doc
            .classes(node)
            .any(|c| SELECTED_CLASSES.contains(&c.to_ascii_lowercase().as_str()))
}

/// Trimmed, non-empty, first-occurrence-wins list.
pub fn dedupe_texts<I>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for text in texts {
        let trimmed = text.trim();
        if !trimmed.is_empty() && !out.iter().any(|o| o == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}

pub fn option_texts(doc: &Document, options: &[NodeId]) -> Vec<String> {
    dedupe_texts(options.iter().map(|o| option_text(doc, *o)))
}

/// Display text of the selected option(s) of a native `<select>`. Single selects fall back
/// to the first option, as browsers do.
pub fn native_select_value(doc: &Document, select: NodeId) -> Vec<String> {
    let options = doc.find_all(select, |d, n| d.is_tag(n, "option"));
    let selected: Vec<String> = options
        .iter()
        .filter(|o| doc.has_attr(**o, "selected"))
        .map(|o| option_text(doc, *o))
        .collect();
    if !selected.is_empty() || doc.has_attr(select, "multiple") {
        return selected;
    }
    options.first().map(|o| vec![option_text(doc, *o)]).unwrap_or_default()
}

fn is_chip_like(doc: &Document, node: NodeId) -> bool {
    doc.has_attr(node, "data-chip")
        || doc.has_attr(node, "data-tag")
        || doc.classes(node).any(|c| {
            let c = c.to_ascii_lowercase();
            CHIP_FRAGMENTS.iter().any(|f| {
                c == *f || c.ends_with(&format!("-{}", f)) || c.ends_with(&format!("__{}", f))
            })
        })
}

/// Texts of chip/tag nodes under `scope`, without their remove buttons.
pub fn chip_texts(doc: &Document, scope: NodeId) -> Vec<String> {
    let chips: Vec<NodeId> = doc
        .descendants(scope)
        .into_iter()
        .filter(|n| is_chip_like(doc, *n))
        .collect();
    let leaves = chips
        .iter()
        .copied()
        .filter(|n| !chips.iter().any(|o| o != n && doc.is_ancestor(*n, *o)));
    dedupe_texts(leaves.map(|chip| {
        let text = doc.text_content_excluding(chip, |d, n| {
            d.is_tag(n, "button") || role_is(d, n, &["button"]) || class_has_any(d, n, &["remove", "close", "delete"])
        });
        strip_remove_glyph(&text)
    }))
}

fn strip_remove_glyph(text: &str) -> String {
    let mut trimmed = text.trim();
    for glyph in REMOVE_GLYPHS {
        if let Some(rest) = trimmed.strip_suffix(glyph) {
            if rest.ends_with(' ') || rest.is_empty() || !glyph.is_ascii() {
                trimmed = rest.trim_end();
            }
        }
    }
    trimmed.to_string()
}

fn label_skip(doc: &Document, node: NodeId) -> bool {
    matches!(doc.tag(node), Some("select") | Some("textarea") | Some("option") | Some("input"))
}

fn label_text(doc: &Document, label: NodeId) -> Option<String> {
    let text = doc.text_content_excluding(label, label_skip);
    let text = text.trim().trim_end_matches('*').trim_end_matches(':').trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// `label[for=id]` → ancestor `<label>` → `aria-label` → none.
pub fn resolve_label(doc: &Document, root: NodeId, control: NodeId) -> Option<String> {
    for node in [control, root] {
        if let Some(id) = doc.attr_nonempty(node, "id") {
            let label = doc.find_first(doc.root(), |d, n| {
                d.is_tag(n, "label") && d.attr(n, "for").map(str::trim) == Some(id)
            });
            if let Some(text) = label.and_then(|l| label_text(doc, l)) {
                return Some(text);
            }
        }
    }

    let mut chain = vec![control];
    chain.extend(doc.ancestors(control));
    if let Some(text) = chain
        .into_iter()
        .find(|n| doc.is_tag(*n, "label"))
        .and_then(|l| label_text(doc, l))
    {
        return Some(text);
    }

    [control, root]
        .iter()
        .find_map(|n| doc.attr_nonempty(*n, "aria-label"))
        .map(str::to_string)
}

pub fn resolve_placeholder(doc: &Document, root: NodeId, control: NodeId) -> Option<String> {
    [control, root]
        .iter()
        .find_map(|n| {
            doc.attr_nonempty(*n, "placeholder")
                .or_else(|| doc.attr_nonempty(*n, "data-placeholder"))
        })
        .map(str::to_string)
}

fn flag_on(doc: &Document, node: NodeId, attr: &str, classes: &[&str]) -> bool {
    doc.has_attr(node, attr)
        || doc.attr_is_true(node, &format!("aria-{}", attr))
        || doc.attr_is_true(node, &format!("data-{}", attr))
        || doc
            .classes(node)
            .any(|c| classes.contains(&c.to_ascii_lowercase().as_str()))
}

/// Any one indicator on the root, the control, or a nested control marks the field required.
pub fn is_required(doc: &Document, root: NodeId, control: NodeId) -> bool {
    let classes = ["required", "is-required", "field-required"];
    flag_on(doc, root, "required", &classes)
        || flag_on(doc, control, "required", &classes)
        || doc
            .descendants(root)
            .into_iter()
            .any(|n| doc.has_attr(n, "required") || doc.attr_is_true(n, "aria-required"))
}

pub fn is_disabled(doc: &Document, root: NodeId, control: NodeId) -> bool {
    let classes = ["disabled", "is-disabled", "field-disabled"];
    flag_on(doc, root, "disabled", &classes)
        || flag_on(doc, control, "disabled", &classes)
        || doc
            .descendants(root)
            .into_iter()
            .filter(|n| is_native_control(doc, *n))
            .any(|n| doc.has_attr(n, "disabled"))
        || doc
            .ancestors(root)
            .any(|a| doc.is_tag(a, "fieldset") && doc.has_attr(a, "disabled"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_resolution_order() {
        let doc = Document::parse(
            r#"<label for="a">Email *</label><input id="a">
               <label>Phone <input id="b"></label>
               <input id="c" aria-label="Zip">
               <input id="d">"#,
        );
        let id = |s: &str| doc.select_first(&format!("#{}", s)).unwrap().unwrap();
        assert_eq!(resolve_label(&doc, id("a"), id("a")).as_deref(), Some("Email"));
        assert_eq!(resolve_label(&doc, id("b"), id("b")).as_deref(), Some("Phone"));
        assert_eq!(resolve_label(&doc, id("c"), id("c")).as_deref(), Some("Zip"));
        assert_eq!(resolve_label(&doc, id("d"), id("d")), None);
    }

    #[test]
    fn options_dedupe_and_select_value() {
        let doc = Document::parse(
            r#"<select id="s"><option value="us">US</option><option value="ca" selected>CA</option><option>CA</option></select>"#,
        );
        let select = doc.select_first("#s").unwrap().unwrap();
        let options = option_nodes(&doc, select);
        assert_eq!(option_texts(&doc, &options), vec!["US", "CA"]);
        assert_eq!(native_select_value(&doc, select), vec!["CA"]);
    }

    #[test]
    fn chips_exclude_remove_buttons() {
        let doc = Document::parse(
            r#"<div id="t"><span class="chip">Rust <button>×</button></span><span class="chip">Go ×</span></div>"#,
        );
        let scope = doc.select_first("#t").unwrap().unwrap();
        assert_eq!(chip_texts(&doc, scope), vec!["Rust", "Go"]);
    }

    #[test]
    fn flags_are_or_of_indicators() {
        let doc = Document::parse(
            r#"<div id="w" class="is-required"><input id="i"></div>
               <fieldset disabled><div id="x"><input id="j"></div></fieldset>"#,
        );
        let id = |s: &str| doc.select_first(&format!("#{}", s)).unwrap().unwrap();
        assert!(is_required(&doc, id("w"), id("i")));
        assert!(!is_disabled(&doc, id("w"), id("i")));
        assert!(is_disabled(&doc, id("x"), id("j")));
    }
}
