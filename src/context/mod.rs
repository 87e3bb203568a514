//! Read-only page snapshots for the external decision-maker.
//!
//! Every call builds a fresh [`PageContext`]; nothing here is cached or mutates the page.

pub mod element;

pub use element::ElementContext;

use crate::core::PageDriver;
use crate::dom::inspect::{candidate_elements, is_clickable, is_fillable, is_visible};
use crate::errors::Result;
use crate::forms::{FieldDescriptor, FieldValue, FormOrigin, FormRecord, FormRegistry};
use crate::types::Viewport;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldContext {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub value: FieldValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub required: bool,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiselect: Option<bool>,
}

impl From<&FieldDescriptor> for FieldContext {
    fn from(field: &FieldDescriptor) -> Self {
        Self {
            name: field.name().to_string(),
            field_type: field.type_tag().to_string(),
            value: field.value().clone(),
            placeholder: field.placeholder().map(str::to_string),
            required: field.required(),
            disabled: field.disabled(),
            label: field.label().map(str::to_string),
            options: field.options().map(<[String]>::to_vec),
            multiselect: field.multiselect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormContext {
    pub form_id: String,
    pub origin: FormOrigin,
    pub selector: String,
    /// Whether the backing element was still in the page when the context was built.
    pub attached: bool,
    pub has_submit_button: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub field_count: usize,
    pub fields: Vec<FieldContext>,
}

impl FormContext {
    pub fn from_record(record: &FormRecord, attached: bool) -> Self {
        Self {
            form_id: record.id().to_string(),
            origin: record.origin(),
            selector: record.anchor().selector().to_string(),
            attached,
            has_submit_button: record.has_submit_button(),
            action: record.action().map(str::to_string),
            method: record.method().map(str::to_string),
            field_count: record.fields().len(),
            fields: record.fields().iter().map(FieldContext::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    pub url: String,
    pub title: String,
    pub timestamp: i64,
    pub total_forms_found: usize,
    pub forms: Vec<FormContext>,
    /// Visible interactive elements, at most `max_context_elements` of them.
    pub elements: Vec<ElementContext>,
    pub total_elements_found: usize,
    pub viewport: Viewport,
}

/// Build a context from the live page and the registry's current records.
pub async fn capture_page_context(
    page: &mut dyn PageDriver,
    forms: &FormRegistry,
    max_elements: usize,
) -> Result<PageContext> {
    let doc = page.snapshot().await?;
    let form_contexts = forms.form_context(&doc)?;

    let interactive: Vec<_> = candidate_elements(&doc)
        .into_iter()
        .filter(|n| is_visible(&doc, *n) && (is_clickable(&doc, *n) || is_fillable(&doc, *n)))
        .collect();
    let elements = interactive
        .iter()
        .take(max_elements)
        .enumerate()
        .map(|(index, node)| ElementContext::from_node(&doc, *node, index))
        .collect();

    Ok(PageContext {
        url: page.url().await?,
        title: page.title().await?,
        timestamp: chrono::Utc::now().timestamp_millis(),
        total_forms_found: form_contexts.len(),
        forms: form_contexts,
        elements,
        total_elements_found: interactive.len(),
        viewport: page.viewport().await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MemoryPage;

    #[tokio::test]
    async fn context_lists_forms_and_bounded_elements() {
        let mut page = MemoryPage::from_html(
            r#"<title>Signup</title>
               <form id="signup"><input name="email" placeholder="Email">
                 <select name="plan"><option>Free</option><option selected>Pro</option></select>
                 <button>Join</button></form>
               <a href="/a">A</a><a href="/b">B</a><div hidden><button>Ghost</button></div>"#,
        );
        let mut forms = FormRegistry::new(4);
        forms.initialize().unwrap();
        let doc = page.document().clone();
        forms.sync_detected(&doc).unwrap();

        let context = capture_page_context(&mut page, &forms, 3).await.unwrap();
        assert_eq!(context.title, "Signup");
        assert_eq!(context.total_forms_found, 1);
        assert_eq!(context.elements.len(), 3);
        // input, select, both options, button and the two links; the hidden button is dropped
        assert_eq!(context.total_elements_found, 7);

        let form = &context.forms[0];
        assert!(form.attached);
        assert!(form.has_submit_button);
        let plan = form.fields.iter().find(|f| f.name == "plan").unwrap();
        assert_eq!(plan.field_type, "select");
        assert_eq!(plan.value, FieldValue::Text("Pro".into()));
        assert_eq!(plan.options.as_deref(), Some(&["Free".to_string(), "Pro".to_string()][..]));

        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["totalFormsFound"], 1);
        assert_eq!(json["forms"][0]["formId"], "signup");
        assert_eq!(json["forms"][0]["fields"][0]["type"], "text");
    }

    #[tokio::test]
    async fn uninitialized_registry_is_rejected() {
        let mut page = MemoryPage::from_html("<p>x</p>");
        let forms = FormRegistry::new(4);
        assert!(capture_page_context(&mut page, &forms, 10).await.is_err());
    }
}
