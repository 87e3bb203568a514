//! Turns a requested value into the DOM writes that set it on a classified field.

use crate::core::{DomWrite, ElementHandle};
use crate::dom::{Document, NodeId};
use crate::errors::{AutomationError, Result};
use crate::forms::classifier::classify;
use crate::forms::extract::{is_input_of, is_selected, native_controls, option_nodes, option_text, option_value, role_is};
use crate::forms::field::{FieldDescriptor, FieldKind};
use serde_json::Value;

pub fn value_as_text(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(AutomationError::ValidationFailed(format!(
            "expected a scalar value, got {}",
            other
        ))),
    }
}

pub fn value_as_bool(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" | "checked" => Ok(true),
            "false" | "no" | "off" | "0" | "" | "unchecked" => Ok(false),
            _ => Err(AutomationError::ValidationFailed(format!(
                "{:?} is not a boolean",
                s
            ))),
        },
        other => Err(AutomationError::ValidationFailed(format!(
            "expected a boolean, got {}",
            other
        ))),
    }
}

/// Arrays as-is; strings split on commas.
pub fn value_as_list(value: &Value) -> Result<Vec<String>> {
    match value {
        Value::Array(items) => items.iter().map(value_as_text).collect(),
        Value::String(s) => Ok(s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![value_as_text(other)?]),
    }
}

fn handle(doc: &Document, node: NodeId) -> ElementHandle {
    ElementHandle::new(doc, node)
}

fn matches_choice(doc: &Document, node: NodeId, wanted: &str, text: &str) -> bool {
    let wanted = wanted.trim();
    text.trim().eq_ignore_ascii_case(wanted)
        || doc
            .attr(node, "value")
            .map(|v| v.trim().eq_ignore_ascii_case(wanted))
            .unwrap_or(false)
        || doc
            .attr(node, "data-value")
            .map(|v| v.trim().eq_ignore_ascii_case(wanted))
            .unwrap_or(false)
}

fn find_option(doc: &Document, options: &[NodeId], wanted: &str) -> Result<NodeId> {
    options
        .iter()
        .copied()
        .find(|o| matches_choice(doc, *o, wanted, &option_text(doc, *o)))
        .ok_or_else(|| AutomationError::ValidationFailed(format!("no option matching {:?}", wanted)))
}

fn accepts_value(doc: &Document, node: NodeId) -> bool {
    doc.is_tag(node, "input")
        || doc.is_tag(node, "textarea")
        || doc.attr(node, "contenteditable") == Some("true")
        || role_is(doc, node, &["textbox", "searchbox", "combobox", "spinbutton"])
}

fn set_value(doc: &Document, node: NodeId, value: String) -> DomWrite {
    if accepts_value(doc, node) {
        DomWrite::SetValue {
            target: handle(doc, node),
            value,
        }
    } else {
        DomWrite::SetAttribute {
            target: handle(doc, node),
            name: "data-value".to_string(),
            value,
        }
    }
}

fn radio_nodes(doc: &Document, field: &FieldDescriptor) -> Vec<NodeId> {
    let name = doc.attr_nonempty(field.control(), "name");
    doc.find_all(field.root(), |d, n| is_input_of(d, n, &["radio"]) || role_is(d, n, &["radio"]))
        .into_iter()
        .filter(|r| name.is_none() || doc.attr_nonempty(*r, "name") == name)
        .collect()
}

fn radio_text(doc: &Document, radio: NodeId) -> String {
    crate::forms::extract::resolve_label(doc, radio, radio).unwrap_or_else(|| doc.text_content(radio))
}

/// DOM writes that put `value` into `field`, read from `doc`.
pub fn plan_writes(doc: &Document, field: &FieldDescriptor, value: &Value) -> Result<Vec<DomWrite>> {
    if field.disabled() {
        return Err(AutomationError::ExecutionFailed(format!(
            "field {} is disabled",
            field.name()
        )));
    }
    let control = field.control();

    match field.kind() {
        FieldKind::Text
        | FieldKind::Email
        | FieldKind::Password
        | FieldKind::Tel
        | FieldKind::Url
        | FieldKind::Search
        | FieldKind::Number
        | FieldKind::Textarea
        | FieldKind::Date
        | FieldKind::Color
        | FieldKind::Range { .. } => Ok(vec![set_value(doc, control, value_as_text(value)?)]),

        FieldKind::Checkbox => {
            let checked = value_as_bool(value)?;
            if doc.is_tag(control, "input") {
                Ok(vec![DomWrite::SetChecked {
                    target: handle(doc, control),
                    checked,
                }])
            } else if is_selected(doc, control) != checked {
                Ok(vec![DomWrite::Click {
                    target: handle(doc, control),
                }])
            } else {
                Ok(Vec::new())
            }
        }

        FieldKind::Radio { .. } => {
            let wanted = value_as_text(value)?;
            let radios = radio_nodes(doc, field);
            let radio = radios
                .iter()
                .copied()
                .find(|r| matches_choice(doc, *r, &wanted, &radio_text(doc, *r)))
                .ok_or_else(|| AutomationError::ValidationFailed(format!("no option matching {:?}", wanted)))?;
            if doc.is_tag(radio, "input") {
                Ok(vec![DomWrite::SetChecked {
                    target: handle(doc, radio),
                    checked: true,
                }])
            } else {
                Ok(vec![DomWrite::Click {
                    target: handle(doc, radio),
                }])
            }
        }

        FieldKind::Select { .. } => {
            let wanted = value_as_text(value)?;
            let option = find_option(doc, &option_nodes(doc, control), &wanted)?;
            if doc.is_tag(control, "select") {
                Ok(vec![DomWrite::SelectOptions {
                    target: handle(doc, control),
                    values: vec![option_value(doc, option)],
                }])
            } else {
                Ok(vec![DomWrite::Click {
                    target: handle(doc, option),
                }])
            }
        }

        FieldKind::MultiSelect { .. } => {
            let options = option_nodes(doc, control);
            let chosen = value_as_list(value)?
                .iter()
                .map(|wanted| find_option(doc, &options, wanted))
                .collect::<Result<Vec<_>>>()?;
            if doc.is_tag(control, "select") {
                return Ok(vec![DomWrite::SelectOptions {
                    target: handle(doc, control),
                    values: chosen.iter().map(|o| option_value(doc, *o)).collect(),
                }]);
            }
            // Custom lists toggle on click: flip every option whose state differs.
            Ok(options
                .iter()
                .filter(|o| is_selected(doc, **o) != chosen.contains(*o))
                .map(|o| DomWrite::Click { target: handle(doc, *o) })
                .collect())
        }

        FieldKind::ButtonGroup { .. } => {
            let wanted = value_as_text(value)?;
            let button = doc
                .find_all(control, |d, n| {
                    n != control && (d.is_tag(n, "button") || role_is(d, n, &["button", "option", "tab"]))
                })
                .into_iter()
                .find(|b| matches_choice(doc, *b, &wanted, &doc.text_content(*b)))
                .ok_or_else(|| AutomationError::ValidationFailed(format!("no button matching {:?}", wanted)))?;
            Ok(vec![DomWrite::Click {
                target: handle(doc, button),
            }])
        }

        FieldKind::DateRange => {
            let bounds = value_as_list(value)?;
            if bounds.len() != 2 {
                return Err(AutomationError::ValidationFailed(format!(
                    "date range expects two dates, got {}",
                    bounds.len()
                )));
            }
            let inputs = native_controls(doc, field.root());
            if inputs.len() >= 2 {
                Ok(inputs
                    .iter()
                    .zip(bounds)
                    .map(|(input, bound)| set_value(doc, *input, bound))
                    .collect())
            } else {
                Ok(["data-start", "data-end"]
                    .iter()
                    .zip(bounds)
                    .map(|(name, bound)| DomWrite::SetAttribute {
                        target: handle(doc, field.root()),
                        name: name.to_string(),
                        value: bound,
                    })
                    .collect())
            }
        }

        FieldKind::Tags => {
            let tags = value_as_list(value)?;
            let mut writes = vec![DomWrite::SetAttribute {
                target: handle(doc, control),
                name: "data-tags".to_string(),
                value: tags.join(","),
            }];
            if let Some(input) = native_controls(doc, field.root()).into_iter().next() {
                writes.push(set_value(doc, input, tags.join(", ")));
            }
            Ok(writes)
        }

        FieldKind::File => Err(AutomationError::PermissionDenied(format!(
            "file input {} cannot be set from a script",
            field.name()
        ))),

        FieldKind::Button => Ok(vec![DomWrite::Click {
            target: handle(doc, control),
        }]),
    }
}

/// Writes for an arbitrary resolved element: classified when it is (or wraps) a known
/// control, a plain value write otherwise.
pub fn plan_for_element(doc: &Document, node: NodeId, value: &Value) -> Result<Vec<DomWrite>> {
    match classify(doc, node, 0) {
        Some(field) => plan_writes(doc, &field, value),
        None => Ok(vec![set_value(doc, node, value_as_text(value)?)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(doc: &Document, selector: &str) -> FieldDescriptor {
        let node = doc.select_first(selector).unwrap().unwrap();
        classify(doc, node, 0).unwrap()
    }

    #[test]
    fn select_maps_display_text_to_option_value() {
        let doc = Document::parse(r#"<select name="country"><option value="us">US</option><option value="ca" selected>CA</option></select>"#);
        let writes = plan_writes(&doc, &field(&doc, "select"), &json!("US")).unwrap();
        match &writes[..] {
            [DomWrite::SelectOptions { values, .. }] => assert_eq!(values, &vec!["us".to_string()]),
            other => panic!("unexpected writes {:?}", other),
        }
    }

    #[test]
    fn unknown_option_is_a_validation_error() {
        let doc = Document::parse(r#"<select name="country"><option>US</option></select>"#);
        let err = plan_writes(&doc, &field(&doc, "select"), &json!("FR")).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::ValidationFailed);
    }

    #[test]
    fn checkbox_coerces_strings() {
        let doc = Document::parse(r#"<input type="checkbox" name="agree">"#);
        let writes = plan_writes(&doc, &field(&doc, "input"), &json!("yes")).unwrap();
        assert!(matches!(&writes[..], [DomWrite::SetChecked { checked: true, .. }]));
        assert!(plan_writes(&doc, &field(&doc, "input"), &json!("maybe")).is_err());
    }

    #[test]
    fn radio_matches_label_or_value() {
        let doc = Document::parse(
            r#"<fieldset><label><input type="radio" name="plan" value="free"> Free</label>
               <label><input type="radio" name="plan" value="pro"> Pro</label></fieldset>"#,
        );
        let plan = field(&doc, "fieldset");
        for wanted in ["pro", "Pro"] {
            let writes = plan_writes(&doc, &plan, &json!(wanted)).unwrap();
            let target = writes[0].target();
            assert_eq!(doc.attr(target.node, "value"), Some("pro"));
        }
    }

    #[test]
    fn custom_multiselect_toggles_differences() {
        let doc = Document::parse(
            r#"<div data-type="multiselect" data-name="langs">
                 <div role="option" aria-selected="true">Go</div><div role="option">Rust</div>
               </div>"#,
        );
        let writes = plan_writes(&doc, &field(&doc, "div"), &json!(["Rust"])).unwrap();
        let texts: Vec<String> = writes.iter().map(|w| doc.text_content(w.target().node)).collect();
        assert_eq!(texts, vec!["Go", "Rust"]);
    }

    #[test]
    fn file_and_disabled_fields_fail() {
        let doc = Document::parse(r#"<input type="file" name="cv"><input name="x" disabled>"#);
        let cv = plan_writes(&doc, &field(&doc, "input[type=file]"), &json!("a.pdf")).unwrap_err();
        assert_eq!(cv.kind(), crate::errors::ErrorKind::PermissionDenied);
        assert!(plan_writes(&doc, &field(&doc, "input[name=x]"), &json!("v")).is_err());
    }

    #[test]
    fn unclassified_elements_get_a_value_write() {
        let doc = Document::parse(r#"<div id="note">hi</div>"#);
        let node = doc.select_first("#note").unwrap().unwrap();
        let writes = plan_for_element(&doc, node, &json!(5)).unwrap();
        assert!(matches!(&writes[..], [DomWrite::SetAttribute { value, .. }] if value == "5"));
    }
}
