//! Field type classification as an ordered strategy chain.
//!
//! Each [`Detector`] pairs a locator (does this subtree hold my kind of control, and which
//! node carries the value?) with an extractor (kind + current value). Detectors are tried
//! in [`DETECTORS`] order and the first one that locates *and* extracts wins. Names,
//! labels, placeholders and flags are resolved the same way for every detector.

use crate::dom::{Document, NodeId};
use crate::forms::extract::{
    chip_texts, class_has_any, dedupe_texts, explicit_value, has_type_marker, input_type,
    is_disabled, is_input_of, is_native_control, is_required, is_selected, native_controls,
    native_select_value, option_nodes, option_text, option_texts, resolve_label,
    resolve_placeholder, role_is, type_marker,
};
use crate::forms::field::{FieldDescriptor, FieldKind, FieldValue};
use crate::forms::naming::{name_from_text, strip_wrapper_prefix};
use tracing::debug;

const SELECT_MARKERS: &[&str] = &["select", "dropdown", "combobox", "single-select"];
const MULTI_MARKERS: &[&str] = &["multiselect", "multi-select", "multi_select", "chips-select"];
const TEXT_MARKERS: &[&str] = &[
    "text", "input", "textfield", "text-field", "email", "password", "tel", "phone", "url",
    "search",
];
const NUMBER_MARKERS: &[&str] = &["number", "numeric", "integer", "currency", "amount"];
const TEXTAREA_MARKERS: &[&str] = &["textarea", "multiline", "richtext", "rich-text"];
const DATE_MARKERS: &[&str] = &["date", "datepicker", "date-picker", "datetime", "time"];
const DATE_RANGE_MARKERS: &[&str] = &["daterange", "date-range", "date_range"];
const FILE_MARKERS: &[&str] = &["file", "upload", "file-upload", "dropzone"];
const CHECK_MARKERS: &[&str] = &["checkbox", "switch", "toggle"];
const RADIO_MARKERS: &[&str] = &["radio", "radio-group", "radiogroup"];
const BUTTON_GROUP_MARKERS: &[&str] = &["button-group", "buttongroup", "segmented", "toggle-group"];
const RANGE_MARKERS: &[&str] = &["range", "slider"];
const COLOR_MARKERS: &[&str] = &["color", "colour", "color-picker", "colorpicker"];
const TAG_MARKERS: &[&str] = &["tags", "tag-input", "tags-input", "chips", "chip-input"];

const MARKER_SETS: &[&[&str]] = &[
    SELECT_MARKERS, MULTI_MARKERS, TEXT_MARKERS, NUMBER_MARKERS, TEXTAREA_MARKERS,
    DATE_MARKERS, DATE_RANGE_MARKERS, FILE_MARKERS, CHECK_MARKERS, RADIO_MARKERS,
    BUTTON_GROUP_MARKERS, RANGE_MARKERS, COLOR_MARKERS, TAG_MARKERS,
];

const SELECT_CLASSES: &[&str] = &["select", "dropdown", "custom-select", "select-field", "dropdown-field"];
const MULTI_CLASSES: &[&str] = &["multiselect", "multi-select", "chip-select", "chips-select"];
const DATE_CLASSES: &[&str] = &["datepicker", "date-picker", "date-input"];
const DATE_RANGE_CLASSES: &[&str] = &["daterange", "date-range", "daterangepicker"];
const FILE_CLASSES: &[&str] = &["dropzone", "file-upload", "upload", "file-input"];
const BUTTON_GROUP_CLASSES: &[&str] = &["btn-group", "button-group", "segmented-control", "toggle-group"];
const TAG_CLASSES: &[&str] = &["tags-input", "tag-input", "chips", "chip-input", "tagify"];

const TEXT_INPUT_TYPES: &[&str] = &["text", "email", "password", "tel", "url", "search", ""];
const DATE_INPUT_TYPES: &[&str] = &["date", "datetime-local", "month", "week", "time"];

/// Explicit field-name attributes on the field root.
const NAME_ATTRS: &[&str] = &["data-field-name", "data-name", "name"];
const WRAPPER_ID_ATTRS: &[&str] = &["data-field", "data-field-id", "data-testid", "data-test-id", "id"];

type Locate = fn(&Document, NodeId) -> Option<NodeId>;
type Extract = fn(&Document, NodeId, NodeId) -> Option<(FieldKind, FieldValue)>;

/// One heuristic: `locate` finds the value-bearing node under a root, `extract` reads it.
pub struct Detector {
    pub name: &'static str,
    locate: Locate,
    extract: Extract,
}

impl Detector {
    pub fn detect(&self, doc: &Document, root: NodeId) -> Option<(NodeId, FieldKind, FieldValue)> {
        let control = (self.locate)(doc, root)?;
        let (kind, value) = (self.extract)(doc, root, control)?;
        Some((control, kind, value))
    }
}

/// The chain, most specific first.
pub const DETECTORS: &[Detector] = &[
    Detector { name: "select", locate: locate_select, extract: extract_select },
    Detector { name: "multiselect", locate: locate_multiselect, extract: extract_multiselect },
    Detector { name: "text", locate: locate_text, extract: extract_text },
    Detector { name: "number", locate: locate_number, extract: extract_plain_value },
    Detector { name: "textarea", locate: locate_textarea, extract: extract_textarea },
    Detector { name: "date", locate: locate_date, extract: extract_date },
    Detector { name: "file", locate: locate_file, extract: extract_file },
    Detector { name: "checkable", locate: locate_checkable, extract: extract_checkable },
    Detector { name: "button-group", locate: locate_button_group, extract: extract_button_group },
    Detector { name: "range", locate: locate_range, extract: extract_range },
    Detector { name: "color", locate: locate_color, extract: extract_plain_value },
    Detector { name: "tags", locate: locate_tags, extract: extract_tags },
    Detector { name: "button-value", locate: locate_value_button, extract: extract_value_button },
];

/// Kind and current value of whatever control lives under `root`, with the node holding it.
pub fn detect_kind(doc: &Document, root: NodeId) -> Option<(&'static str, NodeId, FieldKind, FieldValue)> {
    DETECTORS.iter().find_map(|detector| {
        detector
            .detect(doc, root)
            .map(|(control, kind, value)| (detector.name, control, kind, value))
    })
}

/// Normalized descriptor for the control under `root`, or `None` when the subtree holds no
/// recognizable control. `index` is the position used for the degraded `<type>_<n>` name.
pub fn classify(doc: &Document, root: NodeId, index: usize) -> Option<FieldDescriptor> {
    let (detector, control, kind, value) = detect_kind(doc, root)?;
    debug!("{} classified as {} by {}", doc.unique_selector(root), kind, detector);

    let label = match kind {
        FieldKind::Radio { .. } | FieldKind::ButtonGroup { .. } => group_label(doc, root),
        _ => resolve_label(doc, root, control),
    };
    let placeholder = resolve_placeholder(doc, root, control);
    let name = resolve_name(doc, root, control, &kind, index, label.as_deref(), placeholder.as_deref());

    let descriptor = FieldDescriptor::new(name, kind, value, root, control).ok()?;
    Some(
        descriptor
            .with_label(label)
            .with_placeholder(placeholder)
            .with_flags(is_required(doc, root, control), is_disabled(doc, root, control)),
    )
}

/// Descriptor for native radios sharing a name, possibly spread over several wrappers.
/// `scope` is the nearest element containing all of them.
pub fn classify_radio_group(
    doc: &Document,
    scope: NodeId,
    radios: &[NodeId],
    index: usize,
) -> Option<FieldDescriptor> {
    let first = *radios.first()?;
    let (kind, value) = radio_kind_and_value(doc, radios);
    let label = group_label(doc, scope);
    let name = doc
        .attr_nonempty(first, "name")
        .map(str::to_string)
        .unwrap_or_else(|| resolve_name(doc, scope, first, &kind, index, label.as_deref(), None));

    let required = radios.iter().any(|r| is_required(doc, *r, *r));
    let disabled = radios.iter().all(|r| is_disabled(doc, *r, *r));
    let descriptor = FieldDescriptor::new(name, kind, value, scope, first).ok()?;
    Some(descriptor.with_label(label).with_flags(required, disabled))
}

fn resolve_name(
    doc: &Document,
    root: NodeId,
    control: NodeId,
    kind: &FieldKind,
    index: usize,
    label: Option<&str>,
    placeholder: Option<&str>,
) -> String {
    let explicit = NAME_ATTRS
        .iter()
        .find_map(|a| doc.attr_nonempty(root, a))
        .or_else(|| doc.attr_nonempty(control, "name"))
        .or_else(|| doc.attr_nonempty(control, "id"))
        .or_else(|| {
            native_controls(doc, root)
                .into_iter()
                .find_map(|n| doc.attr_nonempty(n, "name").or_else(|| doc.attr_nonempty(n, "id")))
        });
    if let Some(name) = explicit {
        return name.trim().to_string();
    }

    if let Some(name) = WRAPPER_ID_ATTRS
        .iter()
        .find_map(|a| doc.attr_nonempty(root, a))
        .and_then(strip_wrapper_prefix)
    {
        return name;
    }

    let aria = doc
        .attr_nonempty(control, "aria-label")
        .or_else(|| doc.attr_nonempty(root, "aria-label"));
    [label, aria, placeholder]
        .into_iter()
        .flatten()
        .find_map(name_from_text)
        .unwrap_or_else(|| format!("{}_{}", kind.tag(), index))
}

fn group_label(doc: &Document, root: NodeId) -> Option<String> {
    if doc.is_tag(root, "fieldset") {
        let legend = doc
            .element_children(root)
            .find(|c| doc.is_tag(*c, "legend"))
            .map(|l| doc.text_content(l))
            .filter(|t| !t.is_empty());
        if legend.is_some() {
            return legend;
        }
    }
    if let Some(label) = doc.attr_nonempty(root, "aria-label").or_else(|| doc.attr_nonempty(root, "data-label")) {
        return Some(label.to_string());
    }
    if let Some(target) = doc.attr_nonempty(root, "aria-labelledby") {
        let text = doc
            .find_first(doc.root(), |d, n| d.attr(n, "id") == Some(target))
            .map(|n| doc.text_content(n))
            .filter(|t| !t.is_empty());
        if text.is_some() {
            return text;
        }
    }
    doc.attr_nonempty(root, "id").and_then(|id| {
        doc.find_first(doc.root(), |d, n| d.is_tag(n, "label") && d.attr(n, "for") == Some(id))
            .map(|l| doc.text_content(l))
            .filter(|t| !t.is_empty())
    })
}

fn first_in<F>(doc: &Document, root: NodeId, predicate: F) -> Option<NodeId>
where
    F: Fn(&Document, NodeId) -> bool,
{
    doc.find_first(root, predicate)
}

fn class_is(doc: &Document, node: NodeId, classes: &[&str]) -> bool {
    doc.classes(node)
        .any(|c| classes.contains(&c.to_ascii_lowercase().as_str()))
}

/// `true` when `root` carries a known marker that belongs to a different detector.
fn foreign_marker(doc: &Document, root: NodeId, own: &[&[&str]]) -> bool {
    match type_marker(doc, root) {
        Some(marker) => {
            let known = MARKER_SETS.iter().any(|set| set.contains(&marker.as_str()));
            known && !own.iter().any(|set| set.contains(&marker.as_str()))
        }
        None => false,
    }
}

fn is_multi(doc: &Document, node: NodeId) -> bool {
    (doc.is_tag(node, "select") && doc.has_attr(node, "multiple"))
        || doc.attr_is_true(node, "aria-multiselectable")
        || doc.has_attr(node, "data-multiple")
        || doc.has_attr(node, "data-multiselect")
        || has_type_marker(doc, node, MULTI_MARKERS)
        || class_is(doc, node, MULTI_CLASSES)
}

fn is_select_like(doc: &Document, node: NodeId) -> bool {
    doc.is_tag(node, "select")
        || role_is(doc, node, &["combobox", "listbox"])
        || has_type_marker(doc, node, SELECT_MARKERS)
        || class_is(doc, node, SELECT_CLASSES)
}

fn locate_select(doc: &Document, root: NodeId) -> Option<NodeId> {
    if foreign_marker(doc, root, &[SELECT_MARKERS]) || first_in(doc, root, is_multi).is_some() {
        return None;
    }
    first_in(doc, root, is_select_like)
}

fn select_display_value(doc: &Document, control: NodeId) -> String {
    let options = option_nodes(doc, control);
    if let Some(selected) = options.iter().find(|o| is_selected(doc, **o)) {
        return option_text(doc, *selected);
    }
    if let Some(display) = first_in(doc, control, |d, n| {
        d.has_attr(n, "data-selected-value") || class_is(d, n, &["select-value", "selected-value", "dropdown-value"])
    }) {
        let text = doc.text_content(display);
        if !text.is_empty() {
            return text;
        }
    }
    explicit_value(doc, control).unwrap_or_default()
}

fn extract_select(doc: &Document, _root: NodeId, control: NodeId) -> Option<(FieldKind, FieldValue)> {
    let options = option_texts(doc, &option_nodes(doc, control));
    let value = if doc.is_tag(control, "select") {
        native_select_value(doc, control).into_iter().next().unwrap_or_default()
    } else {
        select_display_value(doc, control)
    };
    Some((FieldKind::Select { options }, FieldValue::Text(value)))
}

fn locate_multiselect(doc: &Document, root: NodeId) -> Option<NodeId> {
    if foreign_marker(doc, root, &[MULTI_MARKERS, SELECT_MARKERS]) {
        return None;
    }
    first_in(doc, root, is_multi)
}

fn extract_multiselect(doc: &Document, _root: NodeId, control: NodeId) -> Option<(FieldKind, FieldValue)> {
    let option_list = option_nodes(doc, control);
    let options = option_texts(doc, &option_list);
    let value = if doc.is_tag(control, "select") {
        native_select_value(doc, control)
    } else {
        let selected = option_list
            .iter()
            .filter(|o| is_selected(doc, **o))
            .map(|o| option_text(doc, *o));
        dedupe_texts(selected.chain(chip_texts(doc, control)))
    };
    Some((FieldKind::MultiSelect { options }, FieldValue::List(value)))
}

fn is_multiline(doc: &Document, node: NodeId) -> bool {
    doc.attr_is_true(node, "aria-multiline")
}

fn is_editable_box(doc: &Document, node: NodeId) -> bool {
    (doc.attr(node, "contenteditable") == Some("true") || role_is(doc, node, &["textbox", "searchbox"]))
        && !doc.is_tag(node, "input")
        && !doc.is_tag(node, "textarea")
}

fn locate_text(doc: &Document, root: NodeId) -> Option<NodeId> {
    if foreign_marker(doc, root, &[TEXT_MARKERS]) {
        return None;
    }
    first_in(doc, root, |d, n| {
        is_input_of(d, n, TEXT_INPUT_TYPES) || (is_editable_box(d, n) && !is_multiline(d, n))
    })
}

fn text_kind(doc: &Document, root: NodeId, control: NodeId) -> FieldKind {
    if doc.is_tag(control, "input") {
        return FieldKind::from_input_type(&input_type(doc, control)).unwrap_or(FieldKind::Text);
    }
    match type_marker(doc, root).as_deref() {
        Some("phone") => FieldKind::Tel,
        Some(marker) => FieldKind::from_input_type(marker).unwrap_or(FieldKind::Text),
        None => FieldKind::Text,
    }
}

fn extract_text(doc: &Document, root: NodeId, control: NodeId) -> Option<(FieldKind, FieldValue)> {
    let value = if doc.is_tag(control, "input") {
        doc.attr(control, "value").unwrap_or_default().to_string()
    } else {
        explicit_value(doc, control).unwrap_or_else(|| doc.text_content(control))
    };
    Some((text_kind(doc, root, control), FieldValue::Text(value)))
}

fn locate_number(doc: &Document, root: NodeId) -> Option<NodeId> {
    if foreign_marker(doc, root, &[NUMBER_MARKERS]) {
        return None;
    }
    first_in(doc, root, |d, n| is_input_of(d, n, &["number"]) || role_is(d, n, &["spinbutton"]))
        .or_else(|| has_type_marker(doc, root, NUMBER_MARKERS).then_some(root))
}

/// Kind picked by the locator's detector name; value straight from attributes.
fn extract_plain_value(doc: &Document, root: NodeId, control: NodeId) -> Option<(FieldKind, FieldValue)> {
    let value = explicit_value(doc, control).unwrap_or_default();
    let kind = if is_input_of(doc, control, &["color"]) || has_type_marker(doc, root, COLOR_MARKERS) {
        FieldKind::Color
    } else {
        FieldKind::Number
    };
    Some((kind, FieldValue::Text(value)))
}

fn locate_textarea(doc: &Document, root: NodeId) -> Option<NodeId> {
    if foreign_marker(doc, root, &[TEXTAREA_MARKERS]) {
        return None;
    }
    first_in(doc, root, |d, n| d.is_tag(n, "textarea") || (is_editable_box(d, n) && is_multiline(d, n)))
        .or_else(|| has_type_marker(doc, root, TEXTAREA_MARKERS).then_some(root))
}

fn extract_textarea(doc: &Document, _root: NodeId, control: NodeId) -> Option<(FieldKind, FieldValue)> {
    let value = doc
        .attr(control, "value")
        .map(str::to_string)
        .unwrap_or_else(|| doc.text_content(control));
    Some((FieldKind::Textarea, FieldValue::Text(value)))
}

fn is_date_range_root(doc: &Document, root: NodeId) -> bool {
    has_type_marker(doc, root, DATE_RANGE_MARKERS)
        || class_is(doc, root, DATE_RANGE_CLASSES)
        || doc.has_attr(root, "data-range")
}

fn locate_date(doc: &Document, root: NodeId) -> Option<NodeId> {
    if foreign_marker(doc, root, &[DATE_MARKERS, DATE_RANGE_MARKERS]) {
        return None;
    }
    if is_date_range_root(doc, root) {
        return Some(root);
    }
    let marked = has_type_marker(doc, root, DATE_MARKERS) || class_is(doc, root, DATE_CLASSES);
    first_in(doc, root, |d, n| is_input_of(d, n, DATE_INPUT_TYPES))
        .or_else(|| {
            marked
                .then(|| first_in(doc, root, |d, n| d.is_tag(n, "input") && is_native_control(d, n)))
                .flatten()
        })
        .or_else(|| marked.then_some(root))
}

fn extract_date(doc: &Document, root: NodeId, control: NodeId) -> Option<(FieldKind, FieldValue)> {
    if control == root && is_date_range_root(doc, root) {
        let bounds: Vec<String> = native_controls(doc, root)
            .into_iter()
            .filter_map(|n| doc.attr(n, "value").map(|v| v.trim().to_string()))
            .filter(|v| !v.is_empty())
            .collect();
        let bounds = if bounds.is_empty() {
            ["data-start", "data-end"]
                .iter()
                .filter_map(|a| doc.attr_nonempty(root, a))
                .map(str::to_string)
                .collect()
        } else {
            bounds
        };
        return Some((FieldKind::DateRange, FieldValue::List(bounds)));
    }
    Some((FieldKind::Date, FieldValue::Text(explicit_value(doc, control).unwrap_or_default())))
}

fn locate_file(doc: &Document, root: NodeId) -> Option<NodeId> {
    if foreign_marker(doc, root, &[FILE_MARKERS]) {
        return None;
    }
    first_in(doc, root, |d, n| is_input_of(d, n, &["file"]))
        .or_else(|| (has_type_marker(doc, root, FILE_MARKERS) || class_is(doc, root, FILE_CLASSES)).then_some(root))
}

fn extract_file(doc: &Document, root: NodeId, _control: NodeId) -> Option<(FieldKind, FieldValue)> {
    let value = ["data-file-name", "data-filename", "data-value"]
        .iter()
        .find_map(|a| doc.attr_nonempty(root, a))
        .map(str::to_string)
        .unwrap_or_default();
    Some((FieldKind::File, FieldValue::Text(value)))
}

fn is_radio(doc: &Document, node: NodeId) -> bool {
    is_input_of(doc, node, &["radio"]) || role_is(doc, node, &["radio"])
}

fn is_checkbox(doc: &Document, node: NodeId) -> bool {
    is_input_of(doc, node, &["checkbox"]) || role_is(doc, node, &["checkbox", "switch"])
}

fn locate_checkable(doc: &Document, root: NodeId) -> Option<NodeId> {
    if foreign_marker(doc, root, &[CHECK_MARKERS, RADIO_MARKERS]) {
        return None;
    }
    first_in(doc, root, |d, n| is_checkbox(d, n) || is_radio(d, n)).or_else(|| {
        (has_type_marker(doc, root, CHECK_MARKERS) || has_type_marker(doc, root, RADIO_MARKERS)).then_some(root)
    })
}

fn radio_option_text(doc: &Document, radio: NodeId) -> String {
    resolve_label(doc, radio, radio)
        .or_else(|| {
            let text = doc.text_content(radio);
            (!text.is_empty()).then_some(text)
        })
        .or_else(|| doc.attr_nonempty(radio, "value").map(str::to_string))
        .unwrap_or_else(|| "on".to_string())
}

fn is_checked(doc: &Document, node: NodeId) -> bool {
    if doc.is_tag(node, "input") {
        doc.has_attr(node, "checked")
    } else {
        is_selected(doc, node)
    }
}

fn radio_kind_and_value(doc: &Document, radios: &[NodeId]) -> (FieldKind, FieldValue) {
    let options = dedupe_texts(radios.iter().map(|r| radio_option_text(doc, *r)));
    let value = radios
        .iter()
        .find(|r| is_checked(doc, **r))
        .map(|r| radio_option_text(doc, *r))
        .unwrap_or_default();
    (FieldKind::Radio { options }, FieldValue::Text(value))
}

fn extract_checkable(doc: &Document, root: NodeId, control: NodeId) -> Option<(FieldKind, FieldValue)> {
    let radio = is_radio(doc, control) || (control == root && has_type_marker(doc, root, RADIO_MARKERS));
    if !radio {
        return Some((FieldKind::Checkbox, FieldValue::Bool(is_checked(doc, control))));
    }

    let group_name = doc.attr_nonempty(control, "name");
    let radios: Vec<NodeId> = doc
        .find_all(root, is_radio)
        .into_iter()
        .filter(|r| group_name.is_none() || doc.attr_nonempty(*r, "name") == group_name)
        .collect();
    if radios.is_empty() {
        return None;
    }
    Some(radio_kind_and_value(doc, &radios))
}

fn locate_button_group(doc: &Document, root: NodeId) -> Option<NodeId> {
    if foreign_marker(doc, root, &[BUTTON_GROUP_MARKERS]) {
        return None;
    }
    first_in(doc, root, |d, n| {
        has_type_marker(d, n, BUTTON_GROUP_MARKERS)
            || class_is(d, n, BUTTON_GROUP_CLASSES)
            || (role_is(d, n, &["group", "toolbar"]) && d.descendants(n).into_iter().any(|c| is_group_button(d, c)))
    })
}

fn is_group_button(doc: &Document, node: NodeId) -> bool {
    doc.is_tag(node, "button") || role_is(doc, node, &["button", "option", "tab"]) || is_input_of(doc, node, &["button"])
}

fn extract_button_group(doc: &Document, _root: NodeId, control: NodeId) -> Option<(FieldKind, FieldValue)> {
    let buttons = doc.find_all(control, |d, n| n != control && is_group_button(d, n));
    if buttons.is_empty() {
        return None;
    }
    let label_of = |b: NodeId| {
        let text = doc.text_content(b);
        if text.is_empty() {
            doc.attr(b, "value").unwrap_or_default().to_string()
        } else {
            text
        }
    };
    let options = dedupe_texts(buttons.iter().map(|b| label_of(*b)));
    let value = buttons
        .iter()
        .find(|b| is_selected(doc, **b))
        .map(|b| label_of(*b))
        .unwrap_or_default();
    Some((FieldKind::ButtonGroup { options }, FieldValue::Text(value)))
}

fn locate_range(doc: &Document, root: NodeId) -> Option<NodeId> {
    if foreign_marker(doc, root, &[RANGE_MARKERS]) {
        return None;
    }
    first_in(doc, root, |d, n| is_input_of(d, n, &["range"]) || role_is(d, n, &["slider"]))
        .or_else(|| has_type_marker(doc, root, RANGE_MARKERS).then_some(root))
}

fn parse_bound(doc: &Document, node: NodeId, attrs: &[&str]) -> Option<f64> {
    attrs
        .iter()
        .find_map(|a| doc.attr(node, a))
        .and_then(|v| v.trim().parse::<f64>().ok())
}

fn extract_range(doc: &Document, _root: NodeId, control: NodeId) -> Option<(FieldKind, FieldValue)> {
    let kind = FieldKind::Range {
        min: parse_bound(doc, control, &["min", "aria-valuemin", "data-min"]),
        max: parse_bound(doc, control, &["max", "aria-valuemax", "data-max"]),
    };
    Some((kind, FieldValue::Text(explicit_value(doc, control).unwrap_or_default())))
}

fn locate_color(doc: &Document, root: NodeId) -> Option<NodeId> {
    if foreign_marker(doc, root, &[COLOR_MARKERS]) {
        return None;
    }
    first_in(doc, root, |d, n| is_input_of(d, n, &["color"]))
        .or_else(|| has_type_marker(doc, root, COLOR_MARKERS).then_some(root))
}

fn locate_tags(doc: &Document, root: NodeId) -> Option<NodeId> {
    if foreign_marker(doc, root, &[TAG_MARKERS]) {
        return None;
    }
    first_in(doc, root, |d, n| {
        has_type_marker(d, n, TAG_MARKERS) || class_is(d, n, TAG_CLASSES) || d.has_attr(n, "data-tags")
    })
}

fn extract_tags(doc: &Document, _root: NodeId, control: NodeId) -> Option<(FieldKind, FieldValue)> {
    let mut tags = chip_texts(doc, control);
    if tags.is_empty() {
        if let Some(raw) = doc.attr_nonempty(control, "data-tags").or_else(|| doc.attr_nonempty(control, "data-value")) {
            tags = dedupe_texts(raw.split(',').map(str::to_string));
        }
    }
    Some((FieldKind::Tags, FieldValue::List(tags)))
}

fn locate_value_button(doc: &Document, root: NodeId) -> Option<NodeId> {
    first_in(doc, root, |d, n| {
        let button = d.is_tag(n, "button") || role_is(d, n, &["button"]);
        let kind = d.attr(n, "type").map(|t| t.to_ascii_lowercase());
        button
            && (d.has_attr(n, "value") || d.has_attr(n, "data-value"))
            && !matches!(kind.as_deref(), Some("submit") | Some("reset"))
    })
}

fn extract_value_button(doc: &Document, _root: NodeId, control: NodeId) -> Option<(FieldKind, FieldValue)> {
    let value = doc
        .attr(control, "data-value")
        .or_else(|| doc.attr(control, "value"))
        .unwrap_or_default()
        .trim()
        .to_string();
    Some((FieldKind::Button, FieldValue::Text(value)))
}

/// Design-system marker naming a field: a type marker or a `data-field*` attribute.
pub fn has_field_marker(doc: &Document, node: NodeId) -> bool {
    type_marker(doc, node).is_some()
        || doc.has_attr(node, "data-field")
        || doc.has_attr(node, "data-field-name")
        || doc.has_attr(node, "data-field-id")
}

/// Generic layout wrapper around a label and its control.
pub fn is_generic_wrapper(doc: &Document, node: NodeId) -> bool {
    class_has_any(
        doc,
        node,
        &["form-field", "form-group", "field-wrapper", "input-wrapper", "form-item", "form-row"],
    )
}

/// Non-native element that behaves as a control on its own (ARIA role or component class).
pub fn is_custom_control(doc: &Document, node: NodeId) -> bool {
    if is_native_control(doc, node) || doc.is_tag(node, "option") {
        return false;
    }
    role_is(doc, node, &["combobox", "listbox", "radiogroup", "slider", "switch", "checkbox", "spinbutton", "textbox"])
        || doc.attr(node, "contenteditable") == Some("true")
        || [
            SELECT_CLASSES, MULTI_CLASSES, DATE_CLASSES, DATE_RANGE_CLASSES, FILE_CLASSES,
            BUTTON_GROUP_CLASSES, TAG_CLASSES,
        ]
        .iter()
        .any(|classes| class_is(doc, node, classes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_first(html: &str) -> Option<FieldDescriptor> {
        let doc = Document::parse(html);
        let root = doc.select_first("[data-sample]").unwrap().unwrap();
        classify(&doc, root, 0)
    }

    #[test]
    fn native_select_prefers_selected_display_text() {
        let field = classify_first(
            r#"<select data-sample name="country"><option value="us">US</option><option value="ca" selected>CA</option></select>"#,
        )
        .unwrap();
        assert_eq!(field.name(), "country");
        assert_eq!(field.type_tag(), "select");
        assert_eq!(field.value(), &FieldValue::Text("CA".into()));
        assert_eq!(field.options().unwrap(), ["US", "CA"]);
        assert_eq!(field.multiselect(), Some(false));
    }

    #[test]
    fn select_marker_wins_over_nested_text_input() {
        let field = classify_first(
            r#"<div data-sample data-type="select" data-field-name="city">
                 <input type="text" placeholder="Search">
                 <ul><li role="option">Oslo</li><li role="option" aria-selected="true">Bergen</li></ul>
               </div>"#,
        )
        .unwrap();
        assert_eq!(field.type_tag(), "select");
        assert_eq!(field.name(), "city");
        assert_eq!(field.value(), &FieldValue::Text("Bergen".into()));
    }

    #[test]
    fn multiselect_collects_selected_and_chips() {
        let field = classify_first(
            r#"<div data-sample data-type="multiselect" data-name="langs">
                 <span class="chip">Rust <button>x</button></span>
                 <div class="option selected">Go</div><div class="option">Zig</div>
               </div>"#,
        )
        .unwrap();
        assert_eq!(field.type_tag(), "multiselect");
        assert_eq!(field.value(), &FieldValue::List(vec!["Go".into(), "Rust".into()]));
        assert_eq!(field.multiselect(), Some(true));
    }

    #[test]
    fn text_kinds_follow_input_type() {
        let field = classify_first(r#"<input data-sample type="email" name="email" value="a@b.c" required>"#).unwrap();
        assert_eq!(field.type_tag(), "email");
        assert_eq!(field.value(), &FieldValue::Text("a@b.c".into()));
        assert!(field.required());
        assert!(field.options().is_none());
    }

    #[test]
    fn date_marker_claims_text_input() {
        let field = classify_first(
            r#"<div data-sample data-type="datepicker"><input type="text" name="dob" value="2024-01-02"></div>"#,
        )
        .unwrap();
        assert_eq!(field.type_tag(), "date");
        assert_eq!(field.name(), "dob");
        assert_eq!(field.value(), &FieldValue::Text("2024-01-02".into()));
    }

    #[test]
    fn date_range_reads_both_bounds() {
        let field = classify_first(
            r#"<div data-sample class="date-range" data-field="field-stay">
                 <input type="date" value="2024-01-01"><input type="date" value="2024-01-05">
               </div>"#,
        )
        .unwrap();
        assert_eq!(field.type_tag(), "daterange");
        assert_eq!(field.name(), "stay");
        assert_eq!(
            field.value(),
            &FieldValue::List(vec!["2024-01-01".into(), "2024-01-05".into()])
        );
    }

    #[test]
    fn checkbox_and_radio() {
        let check = classify_first(r#"<label data-sample><input type="checkbox" name="agree" checked> I agree</label>"#).unwrap();
        assert_eq!(check.type_tag(), "checkbox");
        assert_eq!(check.value(), &FieldValue::Bool(true));
        assert_eq!(check.label(), Some("I agree"));

        let radio = classify_first(
            r#"<fieldset data-sample><legend>Plan</legend>
                 <label><input type="radio" name="plan" value="free"> Free</label>
                 <label><input type="radio" name="plan" value="pro" checked> Pro</label>
               </fieldset>"#,
        )
        .unwrap();
        assert_eq!(radio.type_tag(), "radio");
        assert_eq!(radio.name(), "plan");
        assert_eq!(radio.label(), Some("Plan"));
        assert_eq!(radio.value(), &FieldValue::Text("Pro".into()));
        assert_eq!(radio.options().unwrap(), ["Free", "Pro"]);
    }

    #[test]
    fn button_group_range_color_tags() {
        let group = classify_first(
            r#"<div data-sample class="btn-group" aria-label="Size"><button>S</button><button aria-pressed="true">M</button></div>"#,
        )
        .unwrap();
        assert_eq!(group.type_tag(), "buttongroup");
        assert_eq!(group.name(), "size");
        assert_eq!(group.value(), &FieldValue::Text("M".into()));

        let range = classify_first(r#"<input data-sample type="range" name="vol" min="0" max="10" value="3">"#).unwrap();
        assert_eq!(range.kind(), &FieldKind::Range { min: Some(0.0), max: Some(10.0) });

        let color = classify_first(r##"<input data-sample type="color" name="bg" value="#ff0000">"##).unwrap();
        assert_eq!(color.type_tag(), "color");

        let tags = classify_first(
            r#"<div data-sample class="tags-input" data-name="skills"><span class="tag">rust</span><span class="tag">sql</span></div>"#,
        )
        .unwrap();
        assert_eq!(tags.value(), &FieldValue::List(vec!["rust".into(), "sql".into()]));
    }

    #[test]
    fn name_precedence() {
        let wrapper = classify_first(r#"<div data-sample data-field="field-email"><input type="text"></div>"#).unwrap();
        assert_eq!(wrapper.name(), "email");

        let labelled = classify_first(r#"<div data-sample><label>E-mail Address *<input type="text"></label></div>"#).unwrap();
        assert_eq!(labelled.name(), "email_address");

        let placeholder = classify_first(r#"<div class="x"><span data-sample><input placeholder="Your city"></span></div>"#).unwrap();
        assert_eq!(placeholder.name(), "your_city");

        let fallback = classify_first(r#"<span data-sample><input type="number"></span>"#).unwrap();
        assert_eq!(fallback.name(), "number_0");
    }

    #[test]
    fn no_control_yields_none() {
        assert!(classify_first(r#"<div data-sample><p>Just text</p><button type="submit">Go</button></div>"#).is_none());
    }

    #[test]
    fn chain_order_is_declared() {
        let names: Vec<&str> = DETECTORS.iter().map(|d| d.name).collect();
        assert_eq!(names.first(), Some(&"select"));
        assert_eq!(names.last(), Some(&"button-value"));
        assert_eq!(names.len(), 13);
    }
}
