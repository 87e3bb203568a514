use crate::context::FormContext;
use crate::core::{ElementHandle, FieldWrite, PageDriver};
use crate::dom::{Document, NodeId};
use crate::errors::{AutomationError, Result};
use crate::forms::detect::{
    detect_forms, extract_fields, form_nodes, has_submit_button, submit_controls, DetectedForm,
    PAGE_FIELDS_FORM_ID,
};
use crate::forms::field::FieldDescriptor;
use crate::forms::fill::plan_writes;
use crate::forms::naming::{canonical_name, name_from_text, same_field};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormOrigin {
    Explicit,
    Detected,
}

/// Non-owning reference to a form element.
///
/// Upgrading re-finds the element by identity (`id`, or tag plus the stable `name`,
/// `action` and `class` attributes) and by the names of the fields it holds. The
/// positional `selector` only breaks ties between equally good candidates, so removing an
/// earlier sibling never re-binds the anchor to a different form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementAnchor {
    selector: String,
    tag: String,
    element_id: Option<String>,
    name: Option<String>,
    action: Option<String>,
    class: Option<String>,
    field_names: Vec<String>,
}

impl ElementAnchor {
    pub fn new(doc: &Document, node: NodeId) -> Self {
        Self {
            selector: doc.unique_selector(node),
            tag: doc.tag(node).unwrap_or_default().to_string(),
            element_id: doc.attr_nonempty(node, "id").map(str::to_string),
            name: doc.attr_nonempty(node, "name").map(str::to_string),
            action: doc.attr_nonempty(node, "action").map(str::to_string),
            class: doc.attr_nonempty(node, "class").map(str::to_string),
            field_names: field_names(doc, node),
        }
    }

    pub fn upgrade(&self, doc: &Document) -> Option<NodeId> {
        self.upgrade_excluding(doc, &[])
    }

    /// Like [`upgrade`](Self::upgrade), skipping nodes already bound to other records.
    pub fn upgrade_excluding(&self, doc: &Document, taken: &[NodeId]) -> Option<NodeId> {
        if let Some(element_id) = &self.element_id {
            return doc
                .find_first(doc.root(), |d, n| {
                    d.is_tag(n, &self.tag) && d.attr_nonempty(n, "id") == Some(element_id.as_str())
                })
                .filter(|n| !taken.contains(n));
        }

        let positional = doc.select_first(&self.selector).ok().flatten();
        let mut best: Option<(NodeId, usize, bool)> = None;
        for node in doc.find_all(doc.root(), |d, n| self.same_identity(d, n)) {
            if taken.contains(&node) {
                continue;
            }
            let shared = self.shared_fields(&field_names(doc, node));
            if !self.field_names.is_empty() && shared == 0 {
                continue;
            }
            let at_position = positional == Some(node);
            let better = match best {
                None => true,
                Some((_, best_shared, best_at_position)) => {
                    shared > best_shared || (shared == best_shared && at_position && !best_at_position)
                }
            };
            if better {
                best = Some((node, shared, at_position));
            }
        }
        best.map(|(node, _, _)| node)
    }

    fn same_identity(&self, doc: &Document, node: NodeId) -> bool {
        doc.is_tag(node, &self.tag)
            && doc.attr_nonempty(node, "id").is_none()
            && doc.attr_nonempty(node, "name") == self.name.as_deref()
            && doc.attr_nonempty(node, "action") == self.action.as_deref()
            && doc.attr_nonempty(node, "class") == self.class.as_deref()
    }

    fn shared_fields(&self, names: &[String]) -> usize {
        names.iter().filter(|n| self.field_names.contains(n)).count()
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }
}

fn field_names(doc: &Document, node: NodeId) -> Vec<String> {
    let mut names: Vec<String> = extract_fields(doc, node, &[])
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}

#[derive(Debug, Clone)]
pub struct FormRecord {
    id: String,
    anchor: ElementAnchor,
    fields: Vec<FieldDescriptor>,
    has_submit_button: bool,
    action: Option<String>,
    method: Option<String>,
    origin: FormOrigin,
}

impl FormRecord {
    fn from_detected(doc: &Document, form: &DetectedForm, origin: FormOrigin) -> Self {
        Self {
            id: form.id.clone(),
            anchor: ElementAnchor::new(doc, form.node),
            fields: form.fields.clone(),
            has_submit_button: form.has_submit_button,
            action: form.action.clone(),
            method: form.method.clone(),
            origin,
        }
    }

    fn explicit(doc: &Document, id: &str, node: NodeId) -> Self {
        Self {
            id: id.to_string(),
            anchor: ElementAnchor::new(doc, node),
            fields: extract_fields(doc, node, &[]),
            has_submit_button: has_submit_button(doc, node, &[]),
            action: doc.attr_nonempty(node, "action").map(str::to_string),
            method: doc.attr_nonempty(node, "method").map(|m| m.to_ascii_lowercase()),
            origin: FormOrigin::Explicit,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn anchor(&self) -> &ElementAnchor {
        &self.anchor
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn has_submit_button(&self) -> bool {
        self.has_submit_button
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn origin(&self) -> FormOrigin {
        self.origin
    }

    fn is_page_fields(&self) -> bool {
        self.origin == FormOrigin::Detected && self.id == PAGE_FIELDS_FORM_ID
    }

    /// Subtrees that belong to other forms and must not count toward this one.
    fn exclusions(&self, doc: &Document) -> Vec<NodeId> {
        if self.is_page_fields() {
            form_nodes(doc)
        } else {
            Vec::new()
        }
    }

    fn refresh(&mut self, doc: &Document, node: NodeId) {
        self.anchor = ElementAnchor::new(doc, node);
        let exclude = self.exclusions(doc);
        self.fields = extract_fields(doc, node, &exclude);
        self.has_submit_button = has_submit_button(doc, node, &exclude);
    }

    /// Field targeted by a caller-supplied key: exact name, then normalized name, then label.
    pub fn find_field(&self, key: &str) -> Option<&FieldDescriptor> {
        find_field(&self.fields, key)
    }
}

fn find_field<'a>(fields: &'a [FieldDescriptor], key: &str) -> Option<&'a FieldDescriptor> {
    let key = key.trim();
    fields
        .iter()
        .find(|f| f.name() == key)
        .or_else(|| fields.iter().find(|f| same_field(f.name(), key)))
        .or_else(|| {
            let wanted = name_from_text(key).unwrap_or_else(|| canonical_name(key));
            fields.iter().find(|f| {
                f.label()
                    .and_then(name_from_text)
                    .map(|label| label == wanted)
                    .unwrap_or(false)
            })
        })
}

/// Outcome of a fill or submit; `success` holds exactly when `failed_fields` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFillResult {
    pub success: bool,
    pub fields_count: usize,
    pub filled_fields: Vec<String>,
    pub failed_fields: Vec<String>,
    pub form_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

impl FormFillResult {
    fn new(form_id: &str, fields_count: usize) -> Self {
        Self {
            success: true,
            fields_count,
            filled_fields: Vec::new(),
            failed_fields: Vec::new(),
            form_id: form_id.to_string(),
            errors: BTreeMap::new(),
        }
    }

    fn fail(&mut self, field: &str, error: impl Into<String>) {
        self.failed_fields.push(field.to_string());
        self.errors.insert(field.to_string(), error.into());
        self.success = false;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<String>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Uninitialized,
    Initialized,
    Disposed,
}

/// Catalogue of known forms in insertion order.
#[derive(Debug)]
pub struct FormRegistry {
    state: RegistryState,
    forms: Vec<FormRecord>,
    max_forms: usize,
}

impl FormRegistry {
    pub fn new(max_forms: usize) -> Self {
        Self {
            state: RegistryState::Uninitialized,
            forms: Vec::new(),
            max_forms,
        }
    }

    pub fn state(&self) -> RegistryState {
        self.state
    }

    pub fn initialize(&mut self) -> Result<()> {
        match self.state {
            RegistryState::Uninitialized => {
                self.state = RegistryState::Initialized;
                debug!("form registry initialized (capacity {})", self.max_forms);
                Ok(())
            }
            RegistryState::Initialized => Err(AutomationError::AlreadyInitialized("form registry")),
            RegistryState::Disposed => Err(AutomationError::Disposed("form registry")),
        }
    }

    /// Drops every record. Disposing twice is a no-op.
    pub fn dispose(&mut self) -> Result<()> {
        match self.state {
            RegistryState::Uninitialized => Err(AutomationError::NotInitialized("form registry")),
            RegistryState::Initialized => {
                self.forms.clear();
                self.state = RegistryState::Disposed;
                debug!("form registry disposed");
                Ok(())
            }
            RegistryState::Disposed => Ok(()),
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            RegistryState::Initialized => Ok(()),
            RegistryState::Uninitialized => Err(AutomationError::NotInitialized("form registry")),
            RegistryState::Disposed => Err(AutomationError::Disposed("form registry")),
        }
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&FormRecord> {
        self.forms.iter().find(|f| f.id == id)
    }

    pub fn records(&self) -> &[FormRecord] {
        &self.forms
    }

    pub fn ids(&self) -> Vec<String> {
        self.forms.iter().map(|f| f.id.clone()).collect()
    }

    fn check_insert(&self, id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(AutomationError::ValidationFailed("form id must not be empty".to_string()));
        }
        if self.get(id).is_some() {
            return Err(AutomationError::DuplicateForm(id.to_string()));
        }
        if self.forms.len() >= self.max_forms {
            return Err(AutomationError::RegistryFull(self.max_forms));
        }
        Ok(())
    }

    /// Register `node` of `doc` under `id`. Fails without touching the catalogue on a
    /// duplicate id or when the registry is full.
    pub fn register_form(&mut self, id: &str, doc: &Document, node: NodeId) -> Result<&FormRecord> {
        self.ensure_ready()?;
        self.check_insert(id)?;
        if !doc.is_attached(node) || !doc.is_element(node) {
            return Err(AutomationError::ValidationFailed(format!(
                "form {} is not backed by an attached element",
                id
            )));
        }
        let record = FormRecord::explicit(doc, id, node);
        info!("registered form {} with {} fields", id, record.fields.len());
        self.forms.push(record);
        Ok(&self.forms[self.forms.len() - 1])
    }

    pub fn unregister_form(&mut self, id: &str) -> Result<FormRecord> {
        self.ensure_ready()?;
        let position = self
            .forms
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| AutomationError::FormNotFound(id.to_string()))?;
        info!("unregistered form {}", id);
        Ok(self.forms.remove(position))
    }

    /// Reconcile the catalogue with `doc`: evict records whose element is gone, refresh
    /// inventories of the rest, and register newly detected forms.
    pub fn sync_detected(&mut self, doc: &Document) -> Result<SyncReport> {
        self.ensure_ready()?;
        let mut report = SyncReport::default();

        let mut kept = Vec::with_capacity(self.forms.len());
        let mut anchored = Vec::new();
        for mut record in std::mem::take(&mut self.forms) {
            match record.anchor.upgrade_excluding(doc, &anchored) {
                Some(node) => {
                    let before = record.fields.clone();
                    record.refresh(doc, node);
                    if record.fields != before {
                        report.updated.push(record.id.clone());
                    }
                    anchored.push(node);
                    kept.push(record);
                }
                None => {
                    debug!("evicting form {}: element removed", record.id);
                    report.removed.push(record.id);
                }
            }
        }
        self.forms = kept;

        for form in detect_forms(doc) {
            let known = self.get(&form.id).is_some() || anchored.contains(&form.node);
            if known {
                continue;
            }
            if self.forms.len() >= self.max_forms {
                warn!("form registry full, skipping detected form {}", form.id);
                break;
            }
            report.added.push(form.id.clone());
            self.forms.push(FormRecord::from_detected(doc, &form, FormOrigin::Detected));
        }

        if !report.is_empty() {
            info!(
                "form sync: {} added, {} removed, {} updated",
                report.added.len(),
                report.removed.len(),
                report.updated.len()
            );
        }
        Ok(report)
    }

    fn attached_record(&mut self, id: &str, doc: &Document) -> Result<(usize, NodeId)> {
        let position = self
            .forms
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| AutomationError::FormNotFound(id.to_string()))?;
        match self.forms[position].anchor.upgrade(doc) {
            Some(node) => Ok((position, node)),
            None => {
                self.forms.remove(position);
                warn!("form {} was removed from the page; evicted", id);
                Err(AutomationError::FormNotFound(format!("{} (no longer attached)", id)))
            }
        }
    }

    /// Fill `values` into form `id` as one batch. Per-field problems land in
    /// `failed_fields`; only precondition failures are returned as errors.
    pub async fn fill_form(
        &mut self,
        page: &mut dyn PageDriver,
        id: &str,
        values: &Map<String, Value>,
    ) -> Result<FormFillResult> {
        self.ensure_ready()?;
        if self.get(id).is_none() {
            return Err(AutomationError::FormNotFound(id.to_string()));
        }
        let doc = page.snapshot().await?;
        let (position, node) = self.attached_record(id, &doc)?;
        let record = &mut self.forms[position];
        record.refresh(&doc, node);

        let mut result = FormFillResult::new(id, values.len());
        let mut batch = Vec::new();
        for (key, value) in values {
            let Some(field) = find_field(&record.fields, key) else {
                result.fail(key, AutomationError::FieldNotFound(key.clone()).to_string());
                continue;
            };
            match plan_writes(&doc, field, value) {
                Ok(writes) => batch.push(FieldWrite {
                    field: key.clone(),
                    writes,
                }),
                Err(err) => result.fail(key, err.to_string()),
            }
        }

        if !batch.is_empty() {
            let outcomes = page.apply_writes(&batch).await?;
            for write in &batch {
                let outcome = outcomes.iter().find(|o| o.field == write.field);
                match outcome.and_then(|o| o.error.clone()) {
                    None if outcome.is_some() => result.filled_fields.push(write.field.clone()),
                    None => result.fail(&write.field, "no outcome reported for field"),
                    Some(error) => result.fail(&write.field, error),
                }
            }
        }

        debug!(
            "filled form {}: {} ok, {} failed",
            id,
            result.filled_fields.len(),
            result.failed_fields.len()
        );
        Ok(result)
    }

    /// Number of supplied keys the record's fields answer to.
    fn overlap(record: &FormRecord, values: &Map<String, Value>) -> usize {
        values.keys().filter(|k| record.find_field(k).is_some()).count()
    }

    /// Id of the form with the strictly largest overlap; earliest registered wins ties.
    pub fn best_match(&self, values: &Map<String, Value>) -> Result<String> {
        self.ensure_ready()?;
        let mut best: Option<(&FormRecord, usize)> = None;
        for record in &self.forms {
            let score = Self::overlap(record, values);
            if score > best.map(|(_, s)| s).unwrap_or(0) {
                best = Some((record, score));
            }
        }
        best.map(|(record, _)| record.id.clone()).ok_or_else(|| {
            AutomationError::FormNotFound(format!(
                "no registered form has any of the fields {:?}",
                values.keys().collect::<Vec<_>>()
            ))
        })
    }

    pub async fn fill_any_form(
        &mut self,
        page: &mut dyn PageDriver,
        values: &Map<String, Value>,
    ) -> Result<FormFillResult> {
        let id = self.best_match(values)?;
        debug!("fill_any_form picked {}", id);
        self.fill_form(page, &id, values).await
    }

    pub async fn submit_form(&mut self, page: &mut dyn PageDriver, id: &str) -> Result<FormFillResult> {
        self.ensure_ready()?;
        if self.get(id).is_none() {
            return Err(AutomationError::FormNotFound(id.to_string()));
        }
        let doc = page.snapshot().await?;
        let (position, node) = self.attached_record(id, &doc)?;
        let record = &self.forms[position];

        if doc.is_tag(node, "form") {
            page.submit(&ElementHandle::new(&doc, node)).await?;
        } else {
            let exclude = record.exclusions(&doc);
            let control = submit_controls(&doc, node, &exclude)
                .into_iter()
                .next()
                .ok_or_else(|| AutomationError::ExecutionFailed(format!("form {} has no submit control", id)))?;
            page.click(&ElementHandle::new(&doc, control)).await?;
        }

        info!("submitted form {}", id);
        Ok(FormFillResult::new(id, record.fields.len()))
    }

    pub async fn submit_any_form(&mut self, page: &mut dyn PageDriver) -> Result<FormFillResult> {
        self.ensure_ready()?;
        let id = self
            .forms
            .first()
            .map(|f| f.id.clone())
            .ok_or_else(|| AutomationError::FormNotFound("no forms registered".to_string()))?;
        self.submit_form(page, &id).await
    }

    /// Read-only view of every record; `attached` is evaluated against `doc`.
    pub fn form_context(&self, doc: &Document) -> Result<Vec<FormContext>> {
        self.ensure_ready()?;
        Ok(self
            .forms
            .iter()
            .map(|record| FormContext::from_record(record, record.anchor.upgrade(doc).is_some()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MemoryPage;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn values(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    fn ready(max: usize) -> FormRegistry {
        let mut registry = FormRegistry::new(max);
        registry.initialize().unwrap();
        registry
    }

    #[test]
    fn lifecycle_preconditions() {
        let doc = Document::parse("<form id='f'><input name='a'></form>");
        let node = doc.select_first("#f").unwrap().unwrap();

        let mut registry = FormRegistry::new(4);
        let err = registry.register_form("f", &doc, node).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::InvalidConfiguration);
        assert_err!(registry.dispose());

        assert_ok!(registry.initialize());
        assert!(matches!(registry.initialize(), Err(AutomationError::AlreadyInitialized(_))));
        assert_ok!(registry.register_form("f", &doc, node));

        assert_ok!(registry.dispose());
        assert_ok!(registry.dispose());
        assert!(registry.is_empty());
        assert!(registry.get("f").is_none());
        assert_err!(registry.register_form("g", &doc, node));
    }

    #[test]
    fn duplicate_registration_leaves_one_record() {
        let doc = Document::parse("<form id='f1'><input name='a'></form>");
        let node = doc.select_first("#f1").unwrap().unwrap();
        let mut registry = ready(4);
        assert_ok!(registry.register_form("f1", &doc, node));
        let err = registry.register_form("f1", &doc, node).unwrap_err();
        assert!(matches!(err, AutomationError::DuplicateForm(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn capacity_is_enforced() {
        let doc = Document::parse("<form id='a'></form><form id='b'></form>");
        let a = doc.select_first("#a").unwrap().unwrap();
        let b = doc.select_first("#b").unwrap().unwrap();
        let mut registry = ready(1);
        assert_ok!(registry.register_form("a", &doc, a));
        assert!(matches!(
            registry.register_form("b", &doc, b),
            Err(AutomationError::RegistryFull(1))
        ));
        assert!(matches!(registry.unregister_form("zzz"), Err(AutomationError::FormNotFound(_))));
    }

    #[test]
    fn best_match_prefers_strict_maximum() {
        let doc = Document::parse(
            "<form id='one'><input name='email'></form>
             <form id='two'><input name='email'><input name='phone'></form>",
        );
        let mut registry = ready(4);
        for id in ["one", "two"] {
            let node = doc.select_first(&format!("#{}", id)).unwrap().unwrap();
            registry.register_form(id, &doc, node).unwrap();
        }
        assert_eq!(registry.best_match(&values(json!({"email": "x", "phone": "y"}))).unwrap(), "two");
        assert_eq!(registry.best_match(&values(json!({"email": "x"}))).unwrap(), "one");
        let err = registry.best_match(&values(json!({"zip": "1"}))).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::FormNotFound);
    }

    #[tokio::test]
    async fn fill_records_partial_failures() {
        let mut page = MemoryPage::from_html(
            "<form id='f'><input name='email'><input type='checkbox' name='agree'>
               <input type='file' name='cv'></form>",
        );
        let doc = page.document().clone();
        let node = doc.select_first("#f").unwrap().unwrap();
        let mut registry = ready(4);
        registry.register_form("f", &doc, node).unwrap();

        let result = registry
            .fill_form(
                &mut page,
                "f",
                &values(json!({"email": "a@b.c", "agree": true, "cv": "x.pdf", "nope": 1})),
            )
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.fields_count, 4);
        assert_eq!(result.filled_fields, vec!["email", "agree"]);
        assert_eq!(result.failed_fields, vec!["cv", "nope"]);

        let input = page.document().select_first("input[name=email]").unwrap().unwrap();
        assert_eq!(page.document().attr(input, "value"), Some("a@b.c"));
    }

    #[tokio::test]
    async fn removed_form_is_evicted_on_use() {
        let mut page = MemoryPage::from_html("<form id='f'><input name='a'></form>");
        let doc = page.document().clone();
        let node = doc.select_first("#f").unwrap().unwrap();
        let mut registry = ready(4);
        registry.register_form("f", &doc, node).unwrap();

        page.remove_matching("#f").unwrap();
        let err = registry.fill_form(&mut page, "f", &values(json!({"a": "1"}))).await.unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::FormNotFound);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn removing_an_earlier_sibling_keeps_later_forms_bound() {
        let mut page = MemoryPage::from_html(
            "<form class='login'><input name='user'><input name='pass'></form>
             <form><input name='card'></form>",
        );
        let doc = page.document().clone();
        let forms = doc.select("form").unwrap();
        let mut registry = ready(4);
        registry.register_form("login", &doc, forms[0]).unwrap();
        registry.register_form("checkout", &doc, forms[1]).unwrap();

        page.remove_matching(".login").unwrap();

        let result = registry
            .fill_form(&mut page, "checkout", &values(json!({"card": "4242"})))
            .await
            .unwrap();
        assert_eq!(result.filled_fields, vec!["card"]);

        let err = registry
            .fill_form(&mut page, "login", &values(json!({"card": "0000"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::FormNotFound);
        assert_eq!(registry.ids(), vec!["checkout"]);

        let card = page.document().select_first("input[name=card]").unwrap().unwrap();
        assert_eq!(page.document().attr(card, "value"), Some("4242"));
    }

    #[test]
    fn sync_follows_identity_not_position() {
        let mut doc = Document::parse("<form><input name='user'></form><form><input name='card'></form>");
        let forms = doc.select("form").unwrap();
        let mut registry = ready(4);
        registry.register_form("login", &doc, forms[0]).unwrap();
        registry.register_form("checkout", &doc, forms[1]).unwrap();

        doc.remove(forms[0]);
        let report = registry.sync_detected(&doc).unwrap();
        assert_eq!(report.removed, vec!["login"]);
        assert!(report.added.is_empty());
        assert_eq!(registry.ids(), vec!["checkout"]);
        assert_eq!(registry.get("checkout").unwrap().fields()[0].name(), "card");
        assert_eq!(registry.get("checkout").unwrap().anchor().upgrade(&doc), Some(forms[1]));
    }

    #[tokio::test]
    async fn submit_any_uses_first_registered() {
        let mut page = MemoryPage::from_html("<form id='a'><button>Go</button></form><form id='b'></form>");
        let doc = page.document().clone();
        let mut registry = ready(4);
        for id in ["a", "b"] {
            let node = doc.select_first(&format!("#{}", id)).unwrap().unwrap();
            registry.register_form(id, &doc, node).unwrap();
        }
        let result = registry.submit_any_form(&mut page).await.unwrap();
        assert_eq!(result.form_id, "a");
        assert_eq!(page.submissions(), &["#a".to_string()]);
    }

    #[test]
    fn sync_adds_and_evicts() {
        let before = Document::parse("<form id='a'><input name='x'></form>");
        let mut registry = ready(8);
        let report = registry.sync_detected(&before).unwrap();
        assert_eq!(report.added, vec!["a"]);

        let after = Document::parse("<form id='b'><input name='y'></form>");
        let report = registry.sync_detected(&after).unwrap();
        assert_eq!(report.removed, vec!["a"]);
        assert_eq!(report.added, vec!["b"]);
        assert_eq!(registry.ids(), vec!["b"]);
    }
}
