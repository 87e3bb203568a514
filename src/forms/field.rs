use crate::dom::NodeId;
use crate::errors::{AutomationError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized control kind. Option-bearing kinds carry their option list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Password,
    Tel,
    Url,
    Search,
    Number,
    Textarea,
    Select { options: Vec<String> },
    MultiSelect { options: Vec<String> },
    Checkbox,
    Radio { options: Vec<String> },
    Date,
    DateRange,
    File,
    ButtonGroup { options: Vec<String> },
    Range { min: Option<f64>, max: Option<f64> },
    Color,
    Tags,
    Button,
}

impl FieldKind {
    pub fn tag(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Email => "email",
            FieldKind::Password => "password",
            FieldKind::Tel => "tel",
            FieldKind::Url => "url",
            FieldKind::Search => "search",
            FieldKind::Number => "number",
            FieldKind::Textarea => "textarea",
            FieldKind::Select { .. } => "select",
            FieldKind::MultiSelect { .. } => "multiselect",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Radio { .. } => "radio",
            FieldKind::Date => "date",
            FieldKind::DateRange => "daterange",
            FieldKind::File => "file",
            FieldKind::ButtonGroup { .. } => "buttongroup",
            FieldKind::Range { .. } => "range",
            FieldKind::Color => "color",
            FieldKind::Tags => "tags",
            FieldKind::Button => "button",
        }
    }

    /// Text-entry kinds keyed by an `<input type>` value.
    pub fn from_input_type(input_type: &str) -> Option<FieldKind> {
        match input_type.to_ascii_lowercase().as_str() {
            "" | "text" => Some(FieldKind::Text),
            "email" => Some(FieldKind::Email),
            "password" => Some(FieldKind::Password),
            "tel" => Some(FieldKind::Tel),
            "url" => Some(FieldKind::Url),
            "search" => Some(FieldKind::Search),
            _ => None,
        }
    }

    pub fn options(&self) -> Option<&[String]> {
        match self {
            FieldKind::Select { options }
            | FieldKind::MultiSelect { options }
            | FieldKind::Radio { options }
            | FieldKind::ButtonGroup { options } => Some(options),
            _ => None,
        }
    }

    pub fn is_multiselect(&self) -> bool {
        matches!(self, FieldKind::MultiSelect { .. })
    }

    fn expects_list(&self) -> bool {
        matches!(
            self,
            FieldKind::MultiSelect { .. } | FieldKind::Tags | FieldKind::DateRange
        )
    }

    fn expects_bool(&self) -> bool {
        matches!(self, FieldKind::Checkbox)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    List(Vec<String>),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// One form control, normalized regardless of its markup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    name: String,
    kind: FieldKind,
    value: FieldValue,
    placeholder: Option<String>,
    required: bool,
    disabled: bool,
    label: Option<String>,
    /// Root of the subtree the descriptor was read from.
    #[serde(skip)]
    root: NodeId,
    /// Element that holds the value (the native control when there is one).
    #[serde(skip)]
    control: NodeId,
}

impl FieldDescriptor {
    /// Validates that the name is non-empty and the value shape fits the kind.
    pub fn new(
        name: impl Into<String>,
        kind: FieldKind,
        value: FieldValue,
        root: NodeId,
        control: NodeId,
    ) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(AutomationError::ValidationFailed(format!(
                "{} field without a name",
                kind
            )));
        }

        let shape_ok = match &value {
            FieldValue::Bool(_) => kind.expects_bool(),
            FieldValue::List(_) => kind.expects_list(),
            FieldValue::Text(_) => !kind.expects_bool() && !kind.expects_list(),
        };
        if !shape_ok {
            return Err(AutomationError::ValidationFailed(format!(
                "value {:?} does not fit a {} field",
                value, kind
            )));
        }

        Ok(Self {
            name,
            kind,
            value,
            placeholder: None,
            required: false,
            disabled: false,
            label: None,
            root,
            control,
        })
    }

    pub fn with_placeholder(mut self, placeholder: Option<String>) -> Self {
        self.placeholder = placeholder.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label.filter(|l| !l.trim().is_empty());
        self
    }

    pub fn with_flags(mut self, required: bool, disabled: bool) -> Self {
        self.required = required;
        self.disabled = disabled;
        self
    }

    pub(crate) fn with_kind_and_value(mut self, kind: FieldKind, value: FieldValue) -> Result<Self> {
        let rebuilt = FieldDescriptor::new(self.name.clone(), kind, value, self.root, self.control)?;
        self.kind = rebuilt.kind;
        self.value = rebuilt.value;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn type_tag(&self) -> &'static str {
        self.kind.tag()
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn options(&self) -> Option<&[String]> {
        self.kind.options()
    }

    pub fn multiselect(&self) -> Option<bool> {
        match self.kind {
            FieldKind::Select { .. } | FieldKind::MultiSelect { .. } => {
                Some(self.kind.is_multiselect())
            }
            _ => None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn control(&self) -> NodeId {
        self.control
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeId {
        NodeId(1)
    }

    #[test]
    fn empty_names_are_rejected() {
        let err = FieldDescriptor::new("  ", FieldKind::Text, FieldValue::Text(String::new()), node(), node());
        assert!(err.is_err());
    }

    #[test]
    fn value_shape_must_fit_kind() {
        assert!(FieldDescriptor::new("agree", FieldKind::Checkbox, FieldValue::Bool(true), node(), node()).is_ok());
        assert!(FieldDescriptor::new("agree", FieldKind::Checkbox, FieldValue::Text("on".into()), node(), node()).is_err());
        assert!(FieldDescriptor::new(
            "langs",
            FieldKind::MultiSelect { options: vec![] },
            FieldValue::List(vec!["rust".into()]),
            node(),
            node()
        )
        .is_ok());
    }

    #[test]
    fn options_only_for_option_bearing_kinds() {
        let select = FieldKind::Select {
            options: vec!["US".into(), "CA".into()],
        };
        assert_eq!(select.options().map(|o| o.len()), Some(2));
        assert!(FieldKind::Text.options().is_none());
    }

    #[test]
    fn serializes_type_tag() {
        let field = FieldDescriptor::new(
            "country",
            FieldKind::Select { options: vec!["US".into()] },
            FieldValue::Text("US".into()),
            node(),
            node(),
        )
        .unwrap();
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["kind"]["type"], "select");
        assert_eq!(json["value"], "US");
    }
}
