use crate::dom::{Document, NodeId};
use crate::forms::classifier::{
    classify, classify_radio_group, detect_kind, has_field_marker, is_custom_control,
    is_generic_wrapper,
};
use crate::forms::extract::{input_type, is_input_of, is_native_control, native_controls};
use crate::forms::field::{FieldDescriptor, FieldKind};
use crate::forms::naming::same_field;
use tracing::debug;

/// Id of the virtual form collecting fields that live outside every form container.
pub const PAGE_FIELDS_FORM_ID: &str = "page_fields";

/// A form container found on the page, with its freshly extracted field inventory.
#[derive(Debug, Clone)]
pub struct DetectedForm {
    pub id: String,
    pub node: NodeId,
    pub fields: Vec<FieldDescriptor>,
    pub has_submit_button: bool,
    pub action: Option<String>,
    pub method: Option<String>,
}

pub fn is_form_container(doc: &Document, node: NodeId) -> bool {
    doc.is_tag(node, "form")
        || doc.attr(node, "role").map(|r| r.eq_ignore_ascii_case("form")).unwrap_or(false)
        || doc.has_attr(node, "data-form")
        || doc.has_attr(node, "data-form-id")
}

/// Outermost form containers in document order.
pub fn form_nodes(doc: &Document) -> Vec<NodeId> {
    doc.elements()
        .into_iter()
        .filter(|n| doc.is_attached(*n) && is_form_container(doc, *n))
        .filter(|n| !doc.ancestors(*n).any(|a| is_form_container(doc, a)))
        .collect()
}

/// Every form container plus, when standalone fields exist, the virtual `page_fields` form
/// anchored at `<body>`.
pub fn detect_forms(doc: &Document) -> Vec<DetectedForm> {
    let containers = form_nodes(doc);
    let mut used_ids: Vec<String> = Vec::new();
    let mut forms = Vec::new();

    for (index, node) in containers.iter().enumerate() {
        let id = unique_form_id(&base_form_id(doc, *node, index), &used_ids);
        used_ids.push(id.clone());
        forms.push(DetectedForm {
            fields: extract_fields(doc, *node, &[]),
            has_submit_button: has_submit_button(doc, *node, &[]),
            action: doc.attr_nonempty(*node, "action").map(str::to_string),
            method: doc.attr_nonempty(*node, "method").map(|m| m.to_ascii_lowercase()),
            id,
            node: *node,
        });
    }

    let anchor = doc.body().unwrap_or_else(|| doc.root());
    let standalone = extract_fields(doc, anchor, &containers);
    if !standalone.is_empty() {
        forms.push(DetectedForm {
            id: unique_form_id(PAGE_FIELDS_FORM_ID, &used_ids),
            node: anchor,
            has_submit_button: has_submit_button(doc, anchor, &containers),
            fields: standalone,
            action: None,
            method: None,
        });
    }

    debug!("detected {} forms", forms.len());
    forms
}

/// `id` → `name` → `data-form-id` → `data-form` → `form_<index>`.
fn base_form_id(doc: &Document, node: NodeId, index: usize) -> String {
    ["id", "name", "data-form-id", "data-form"]
        .iter()
        .find_map(|a| doc.attr_nonempty(node, a))
        .map(str::to_string)
        .unwrap_or_else(|| format!("form_{}", index))
}

fn unique_form_id(base: &str, used: &[String]) -> String {
    if !used.iter().any(|u| u == base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !used.iter().any(|u| u == candidate))
        .unwrap_or_else(|| base.to_string())
}

fn inside_any(doc: &Document, node: NodeId, roots: &[NodeId]) -> bool {
    roots.iter().any(|r| *r == node || doc.is_ancestor(*r, node))
}

fn is_field_root(doc: &Document, node: NodeId) -> bool {
    has_field_marker(doc, node)
        || is_custom_control(doc, node)
        || (is_generic_wrapper(doc, node) && native_controls(doc, node).len() <= 1)
}

fn is_native_radio(doc: &Document, node: NodeId) -> bool {
    is_input_of(doc, node, &["radio"])
}

/// Field inventory of `scope`, skipping the subtrees in `exclude`. Radios are grouped by
/// `name` across the whole scope; later descriptors naming an already seen field are dropped.
pub fn extract_fields(doc: &Document, scope: NodeId, exclude: &[NodeId]) -> Vec<FieldDescriptor> {
    let mut fields: Vec<FieldDescriptor> = Vec::new();
    let mut claimed: Vec<NodeId> = Vec::new();

    for node in doc.descendants(scope) {
        if inside_any(doc, node, exclude) || inside_any(doc, node, &claimed) {
            continue;
        }

        if is_field_root(doc, node) {
            let radio = detect_kind(doc, node)
                .filter(|(_, control, kind, _)| {
                    matches!(kind, FieldKind::Radio { .. }) && is_native_radio(doc, *control)
                })
                .map(|(_, control, _, _)| control);
            let descriptor = match radio {
                Some(first_radio) => radio_group(doc, scope, exclude, first_radio, fields.len(), &mut claimed),
                None => classify(doc, node, fields.len()),
            };
            if let Some(descriptor) = descriptor {
                claimed.push(node);
                push_unique(&mut fields, descriptor);
            }
            continue;
        }

        if !is_native_control(doc, node) {
            continue;
        }
        let descriptor = if is_native_radio(doc, node) {
            radio_group(doc, scope, exclude, node, fields.len(), &mut claimed)
        } else {
            claimed.push(node);
            classify(doc, node, fields.len())
        };
        if let Some(descriptor) = descriptor {
            push_unique(&mut fields, descriptor);
        }
    }

    fields
}

fn radio_group(
    doc: &Document,
    scope: NodeId,
    exclude: &[NodeId],
    first: NodeId,
    index: usize,
    claimed: &mut Vec<NodeId>,
) -> Option<FieldDescriptor> {
    let radios: Vec<NodeId> = match doc.attr_nonempty(first, "name") {
        Some(name) => doc
            .descendants(scope)
            .into_iter()
            .filter(|n| is_native_radio(doc, *n) && !inside_any(doc, *n, exclude))
            .filter(|n| doc.attr_nonempty(*n, "name") == Some(name))
            .collect(),
        None => vec![first],
    };
    claimed.extend(radios.iter().copied());
    let group_scope = common_ancestor(doc, &radios).unwrap_or(scope);
    classify_radio_group(doc, group_scope, &radios, index)
}

/// Nearest element containing every node in `nodes`.
fn common_ancestor(doc: &Document, nodes: &[NodeId]) -> Option<NodeId> {
    let first = *nodes.first()?;
    doc.ancestors(first)
        .find(|a| nodes.iter().all(|n| doc.is_ancestor(*a, *n)))
}

fn push_unique(fields: &mut Vec<FieldDescriptor>, descriptor: FieldDescriptor) {
    if fields.iter().any(|f| same_field(f.name(), descriptor.name())) {
        debug!("dropping duplicate field {}", descriptor.name());
        return;
    }
    fields.push(descriptor);
}

fn is_submit_control(doc: &Document, node: NodeId) -> bool {
    if doc.is_tag(node, "button") {
        return doc
            .attr(node, "type")
            .map(|t| t.trim().eq_ignore_ascii_case("submit"))
            .unwrap_or(true);
    }
    if doc.is_tag(node, "input") {
        return matches!(input_type(doc, node).as_str(), "submit" | "image");
    }
    doc.has_attr(node, "data-submit")
        || doc
            .attr(node, "data-action")
            .map(|a| a.eq_ignore_ascii_case("submit"))
            .unwrap_or(false)
}

pub fn submit_controls(doc: &Document, scope: NodeId, exclude: &[NodeId]) -> Vec<NodeId> {
    doc.find_all(scope, is_submit_control)
        .into_iter()
        .filter(|n| !inside_any(doc, *n, exclude))
        .collect()
}

pub fn has_submit_button(doc: &Document, scope: NodeId, exclude: &[NodeId]) -> bool {
    !submit_controls(doc, scope, exclude).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::field::FieldValue;

    #[test]
    fn native_form_inventory() {
        let doc = Document::parse(
            r#"<form id="signup" action="/join" method="POST">
                 <label for="e">Email</label><input id="e" name="email" type="email">
                 <select name="country"><option>US</option><option selected>CA</option></select>
                 <input type="hidden" name="csrf" value="t">
                 <button>Join</button>
               </form>"#,
        );
        let forms = detect_forms(&doc);
        assert_eq!(forms.len(), 1);
        let form = &forms[0];
        assert_eq!(form.id, "signup");
        assert_eq!(form.method.as_deref(), Some("post"));
        assert!(form.has_submit_button);
        let names: Vec<&str> = form.fields.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["email", "country"]);
        assert_eq!(form.fields[0].label(), Some("Email"));
    }

    #[test]
    fn radios_group_across_wrappers() {
        let doc = Document::parse(
            r#"<form>
                 <div class="form-group"><label><input type="radio" name="size" value="s"> Small</label></div>
                 <div class="form-group"><label><input type="radio" name="size" value="l" checked> Large</label></div>
               </form>"#,
        );
        let forms = detect_forms(&doc);
        assert_eq!(forms[0].id, "form_0");
        assert_eq!(forms[0].fields.len(), 1);
        let size = &forms[0].fields[0];
        assert_eq!(size.options().unwrap(), ["Small", "Large"]);
        assert_eq!(size.value(), &FieldValue::Text("Large".into()));
    }

    #[test]
    fn duplicate_names_first_wins() {
        let doc = Document::parse(
            r#"<form id="f">
                 <div data-field="field_email"><input type="text" placeholder="first"></div>
                 <input name="email" placeholder="second">
               </form>"#,
        );
        let forms = detect_forms(&doc);
        assert_eq!(forms[0].fields.len(), 1);
        assert_eq!(forms[0].fields[0].placeholder(), Some("first"));
    }

    #[test]
    fn standalone_fields_form_virtual_page_form() {
        let doc = Document::parse(
            r#"<form id="a"><input name="q"></form>
               <div class="form-group"><label>Phone</label><input name="phone"></div>
               <div role="form" id="a"><input name="x"></div>"#,
        );
        let forms = detect_forms(&doc);
        let ids: Vec<&str> = forms.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a_2", PAGE_FIELDS_FORM_ID]);
        assert_eq!(forms[2].fields[0].name(), "phone");
        assert!(!forms[2].has_submit_button);
    }

    #[test]
    fn nested_form_containers_are_skipped() {
        let doc = Document::parse(r#"<form id="outer"><div data-form="inner"><input name="a"></div></form>"#);
        let forms = detect_forms(&doc);
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].fields.len(), 1);
    }

    #[test]
    fn submit_detection_variants() {
        let doc = Document::parse(
            r#"<form id="a"><button type="button">x</button></form>
               <form id="b"><div data-action="submit">Send</div></form>
               <form id="c"><input type="image" src="go.png"></form>"#,
        );
        let forms = detect_forms(&doc);
        let flags: Vec<bool> = forms.iter().map(|f| f.has_submit_button).collect();
        assert_eq!(flags, vec![false, true, true]);
    }
}
