use crate::dom::inspect::{is_clickable, is_fillable, is_visible};
use crate::dom::{Document, NodeId};
use crate::forms::extract::resolve_label;
use serde::Serialize;
use std::collections::BTreeMap;

const MAX_TEXT_LEN: usize = 100;

const REPORTED_ATTRIBUTES: &[&str] = &[
    "id", "name", "type", "placeholder", "aria-label", "title", "href", "role", "value",
    "data-testid",
];

/// One interactive element as exposed to the decision-maker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementContext {
    pub index: usize,
    pub tag: String,
    pub element_type: String,
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub clickable: bool,
    pub fillable: bool,
    pub visible: bool,
    pub ai_label: String,
}

impl ElementContext {
    pub fn from_node(doc: &Document, node: NodeId, index: usize) -> Self {
        let tag = doc.tag(node).unwrap_or_default().to_string();
        let attributes: BTreeMap<String, String> = REPORTED_ATTRIBUTES
            .iter()
            .filter_map(|a| doc.attr_nonempty(node, a).map(|v| (a.to_string(), v.to_string())))
            .collect();
        let text = Some(doc.text_content(node))
            .filter(|t| !t.is_empty())
            .map(|t| truncate(&t, MAX_TEXT_LEN));
        let clickable = is_clickable(doc, node);
        let fillable = is_fillable(doc, node);

        let mut context = Self {
            index,
            element_type: element_type(&tag, &attributes, clickable),
            selector: doc.unique_selector(node),
            text,
            label: None,
            attributes,
            clickable,
            fillable,
            visible: is_visible(doc, node),
            ai_label: String::new(),
            tag,
        };
        context.label = if fillable {
            resolve_label(doc, node, node)
        } else {
            None
        }
        .or_else(|| context.attribute_label());
        context.ai_label = context.generate_ai_label();
        context
    }

    fn attribute_label(&self) -> Option<String> {
        ["aria-label", "title", "placeholder", "name"]
            .iter()
            .find_map(|a| self.attributes.get(*a).cloned())
    }

    /// One-line human readable description, e.g.
    /// `email input field named 'email' labeled 'Email' (can type here)`.
    pub fn generate_ai_label(&self) -> String {
        let mut label_parts = vec![];

        match self.tag.as_str() {
            "input" => {
                let input_type = self.attributes.get("type").map(String::as_str).unwrap_or("text");
                label_parts.push(format!("{} input field", input_type));
            }
            "button" => label_parts.push("button".to_string()),
            "a" => label_parts.push("link".to_string()),
            "select" => label_parts.push("dropdown menu".to_string()),
            "textarea" => label_parts.push("text area".to_string()),
            _ => label_parts.push(format!("{} element", self.tag)),
        }

        if let Some(name) = self.attributes.get("name") {
            label_parts.push(format!("named '{}'", name));
        }
        if let Some(id) = self.attributes.get("id") {
            label_parts.push(format!("with ID '{}'", id));
        }
        if let Some(label) = &self.label {
            label_parts.push(format!("labeled '{}'", label));
        }
        if let Some(placeholder) = self.attributes.get("placeholder") {
            label_parts.push(format!("placeholder '{}'", placeholder));
        }
        if let Some(text) = &self.text {
            if self.label.as_deref() != Some(text.as_str()) {
                label_parts.push(format!("containing '{}'", text));
            }
        }

        if self.fillable {
            label_parts.push("(can type here)".to_string());
        } else if self.clickable {
            label_parts.push("(clickable)".to_string());
        }
        if self.attributes.get("role").map(String::as_str) == Some("searchbox") {
            label_parts.push("(search box)".to_string());
        }

        label_parts.join(" ")
    }
}

fn element_type(tag: &str, attributes: &BTreeMap<String, String>, clickable: bool) -> String {
    match tag {
        "input" => {
            let input_type = attributes.get("type").map(String::as_str).unwrap_or("text");
            match input_type {
                "text" | "email" | "password" | "search" | "url" | "tel" => "text_input".to_string(),
                "checkbox" => "checkbox".to_string(),
                "radio" => "radio_button".to_string(),
                "submit" | "button" => "button".to_string(),
                "file" => "file_upload".to_string(),
                other => format!("input_{}", other),
            }
        }
        "textarea" => "text_area".to_string(),
        "select" => "dropdown".to_string(),
        "button" => "button".to_string(),
        "a" => "link".to_string(),
        _ if clickable => "clickable_element".to_string(),
        _ => "text_element".to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_describe_inputs() {
        let doc = Document::parse(r#"<label for="e">Email</label><input id="e" type="email" name="email">"#);
        let node = doc.select_first("#e").unwrap().unwrap();
        let context = ElementContext::from_node(&doc, node, 0);
        assert_eq!(context.element_type, "text_input");
        assert_eq!(context.label.as_deref(), Some("Email"));
        assert_eq!(
            context.ai_label,
            "email input field named 'email' with ID 'e' labeled 'Email' (can type here)"
        );
    }

    #[test]
    fn long_text_is_truncated() {
        let long = "x".repeat(150);
        let doc = Document::parse(&format!("<button id='b'>{}</button>", long));
        let node = doc.select_first("#b").unwrap().unwrap();
        let context = ElementContext::from_node(&doc, node, 3);
        assert_eq!(context.text.as_ref().map(|t| t.chars().count()), Some(101));
        assert!(context.clickable);
        assert_eq!(context.index, 3);
    }
}
