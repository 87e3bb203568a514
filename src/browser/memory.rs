//! Page driver over an in-memory [`Document`].
//!
//! Native controls behave the way a browser would for the writes the engine issues:
//! values land in the `value` attribute (or the text of a `<textarea>`/contenteditable),
//! checking a radio unchecks the rest of its group, and `<select>` keeps its `selected`
//! attributes in sync. Custom option-like elements toggle `aria-selected` on click.

use crate::core::{DomWrite, ElementHandle, FieldWrite, PageDriver, WriteOutcome};
use crate::dom::{Document, NodeId};
use crate::errors::{AutomationError, Result};
use crate::forms::extract::{input_type, is_input_of, option_value, role_is};
use crate::forms::{ChangeFeed, DomChange};
use crate::types::{PageCapabilities, ScreenshotRequest, Viewport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const BLANK_URL: &str = "about:blank";

#[derive(Debug)]
pub struct MemoryPage {
    doc: Document,
    url: String,
    routes: HashMap<String, String>,
    viewport: Viewport,
    clicks: Vec<String>,
    submissions: Vec<String>,
    feed: Option<ChangeFeed>,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::from_html("")
    }

    pub fn from_html(html: &str) -> Self {
        Self {
            doc: Document::parse(html),
            url: BLANK_URL.to_string(),
            routes: HashMap::new(),
            viewport: Viewport::default(),
            clicks: Vec::new(),
            submissions: Vec::new(),
            feed: None,
        }
    }

    /// Serve `html` when `url` is navigated to.
    pub fn with_route(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.add_route(url, html);
        self
    }

    pub fn add_route(&mut self, url: impl Into<String>, html: impl Into<String>) {
        self.routes.insert(url.into(), html.into());
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Selectors of every clicked element, in order.
    pub fn clicks(&self) -> &[String] {
        &self.clicks
    }

    /// Selectors of every submitted form, in order.
    pub fn submissions(&self) -> &[String] {
        &self.submissions
    }

    /// Detach every element matching `selector`, as a page script would.
    pub fn remove_matching(&mut self, selector: &str) -> Result<usize> {
        let nodes = self.doc.select(selector)?;
        let tags = self.tags_of(&nodes);
        for node in &nodes {
            self.doc.remove(*node);
        }
        if !nodes.is_empty() {
            self.notify(DomChange::NodesRemoved { tags });
        }
        Ok(nodes.len())
    }

    /// Append `html` under the first element matching `selector`.
    pub fn append_html(&mut self, selector: &str, html: &str) -> Result<usize> {
        let parent = self
            .doc
            .select_first(selector)?
            .ok_or_else(|| not_found(selector))?;
        let added = self.doc.append_html(parent, html);
        let tags = self.tags_of(&added);
        if !added.is_empty() {
            self.notify(DomChange::NodesAdded { tags });
        }
        Ok(added.len())
    }

    pub fn set_attribute(&mut self, selector: &str, name: &str, value: &str) -> Result<()> {
        let node = self
            .doc
            .select_first(selector)?
            .ok_or_else(|| not_found(selector))?;
        self.write_attr(node, name, value);
        Ok(())
    }

    fn tags_of(&self, nodes: &[NodeId]) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for node in nodes {
            for id in self.doc.subtree(*node) {
                if let Some(tag) = self.doc.tag(id) {
                    if !tags.iter().any(|t| t == tag) {
                        tags.push(tag.to_string());
                    }
                }
            }
        }
        tags
    }

    fn notify(&self, change: DomChange) {
        if let Some(feed) = &self.feed {
            feed.notify(change);
        }
    }

    fn write_attr(&mut self, node: NodeId, name: &str, value: &str) {
        self.doc.set_attr(node, name, value);
        self.attr_changed(node, name);
    }

    fn clear_attr(&mut self, node: NodeId, name: &str) {
        if self.doc.has_attr(node, name) {
            self.doc.remove_attr(node, name);
            self.attr_changed(node, name);
        }
    }

    fn attr_changed(&self, node: NodeId, name: &str) {
        self.notify(DomChange::AttributeChanged {
            tag: self.doc.tag(node).unwrap_or_default().to_string(),
            name: name.to_string(),
        });
    }

    /// The element a handle points at, provided it still exists.
    fn locate(&self, handle: &ElementHandle) -> Result<NodeId> {
        if self.doc.is_attached(handle.node)
            && self.doc.is_element(handle.node)
            && self.doc.unique_selector(handle.node) == handle.selector
        {
            return Ok(handle.node);
        }
        self.doc
            .select_first(&handle.selector)?
            .filter(|n| self.doc.is_attached(*n))
            .ok_or_else(|| not_found(&handle.selector))
    }

    fn ensure_enabled(&self, node: NodeId) -> Result<()> {
        if self.doc.has_attr(node, "disabled") || self.doc.attr_is_true(node, "aria-disabled") {
            return Err(AutomationError::ExecutionFailed(format!(
                "element {} is disabled",
                self.doc.unique_selector(node)
            )));
        }
        Ok(())
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> Result<()> {
        self.ensure_enabled(node)?;
        if self.doc.is_tag(node, "select") {
            return self.select_options(node, &[value.to_string()]);
        }
        if self.doc.is_tag(node, "input") {
            if input_type(&self.doc, node) == "file" {
                return Err(AutomationError::PermissionDenied(
                    "file inputs cannot be set from a script".to_string(),
                ));
            }
            self.write_attr(node, "value", value);
        } else {
            self.doc.set_text(node, value);
            self.attr_changed(node, "value");
        }
        Ok(())
    }

    fn set_checked(&mut self, node: NodeId, checked: bool) -> Result<()> {
        self.ensure_enabled(node)?;
        if !is_input_of(&self.doc, node, &["checkbox", "radio"]) {
            return Err(AutomationError::ExecutionFailed(format!(
                "element {} is not a checkbox or radio",
                self.doc.unique_selector(node)
            )));
        }
        if checked && is_input_of(&self.doc, node, &["radio"]) {
            for other in self.radio_group(node) {
                self.clear_attr(other, "checked");
            }
        }
        if checked {
            self.write_attr(node, "checked", "");
        } else {
            self.clear_attr(node, "checked");
        }
        Ok(())
    }

    /// Other radios sharing `radio`'s name inside the same form (or the document).
    fn radio_group(&self, radio: NodeId) -> Vec<NodeId> {
        let Some(name) = self.doc.attr_nonempty(radio, "name") else {
            return Vec::new();
        };
        let scope = self
            .doc
            .ancestors(radio)
            .find(|n| self.doc.is_tag(*n, "form"))
            .unwrap_or_else(|| self.doc.root());
        self.doc.find_all(scope, |d, n| {
            n != radio && is_input_of(d, n, &["radio"]) && d.attr_nonempty(n, "name") == Some(name)
        })
    }

    fn select_options(&mut self, select: NodeId, values: &[String]) -> Result<()> {
        self.ensure_enabled(select)?;
        if !self.doc.is_tag(select, "select") {
            return Err(AutomationError::ExecutionFailed(format!(
                "element {} is not a select",
                self.doc.unique_selector(select)
            )));
        }
        if values.len() > 1 && !self.doc.has_attr(select, "multiple") {
            return Err(AutomationError::ValidationFailed(
                "a single select accepts exactly one value".to_string(),
            ));
        }
        let options = self.doc.find_all(select, |d, n| d.is_tag(n, "option"));
        if let Some(missing) = values
            .iter()
            .find(|v| !options.iter().any(|o| option_value(&self.doc, *o) == **v))
        {
            return Err(AutomationError::ValidationFailed(format!(
                "select has no option with value {:?}",
                missing
            )));
        }
        for option in options {
            if values.contains(&option_value(&self.doc, option)) {
                self.write_attr(option, "selected", "");
            } else {
                self.clear_attr(option, "selected");
            }
        }
        Ok(())
    }

    fn is_submit_control(&self, node: NodeId) -> bool {
        let doc = &self.doc;
        (doc.is_tag(node, "button")
            && matches!(doc.attr(node, "type").map(str::to_ascii_lowercase).as_deref(), None | Some("submit")))
            || is_input_of(doc, node, &["submit", "image"])
    }

    fn enclosing_form(&self, node: NodeId) -> Option<NodeId> {
        self.doc.ancestors(node).find(|n| self.doc.is_tag(*n, "form"))
    }

    fn perform_click(&mut self, node: NodeId) -> Result<()> {
        self.ensure_enabled(node)?;
        self.clicks.push(self.doc.unique_selector(node));

        if is_input_of(&self.doc, node, &["checkbox"]) {
            let checked = self.doc.has_attr(node, "checked");
            return self.set_checked(node, !checked);
        }
        if is_input_of(&self.doc, node, &["radio"]) {
            return self.set_checked(node, true);
        }
        if self.doc.is_tag(node, "option") {
            let owner = self.doc.ancestors(node).find(|n| self.doc.is_tag(*n, "select"));
            if let Some(select) = owner {
                let value = option_value(&self.doc, node);
                return self.select_options(select, &[value]);
            }
        }
        if role_is(&self.doc, node, &["option", "menuitemradio", "menuitemcheckbox", "checkbox", "switch"])
            || self.doc.has_attr(node, "data-option")
        {
            let attr = if role_is(&self.doc, node, &["checkbox", "switch"]) {
                "aria-checked"
            } else {
                "aria-selected"
            };
            let next = if self.doc.attr_is_true(node, attr) { "false" } else { "true" };
            self.write_attr(node, attr, next);
            return Ok(());
        }
        if self.is_submit_control(node) {
            if let Some(form) = self.enclosing_form(node) {
                self.submissions.push(self.doc.unique_selector(form));
                debug!("submitted {} via {}", self.doc.unique_selector(form), self.doc.unique_selector(node));
            }
        }
        Ok(())
    }

    fn apply_write(&mut self, write: &DomWrite) -> Result<()> {
        let node = self.locate(write.target())?;
        match write {
            DomWrite::SetValue { value, .. } => self.set_value(node, value),
            DomWrite::SetChecked { checked, .. } => self.set_checked(node, *checked),
            DomWrite::SelectOptions { values, .. } => self.select_options(node, values),
            DomWrite::SetAttribute { name, value, .. } => {
                self.write_attr(node, name, value);
                Ok(())
            }
            DomWrite::Click { .. } => self.perform_click(node),
        }
    }
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(selector: &str) -> AutomationError {
    AutomationError::ElementNotFound {
        query: selector.to_string(),
        candidates: Vec::new(),
    }
}

#[async_trait]
impl PageDriver for MemoryPage {
    async fn snapshot(&mut self) -> Result<Document> {
        Ok(self.doc.clone())
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        let html = self
            .routes
            .get(url)
            .cloned()
            .ok_or_else(|| AutomationError::NavigationFailed(format!("no route for {}", url)))?;
        let old_root = self.doc.root();
        let removed = self.tags_of(&[old_root]);
        self.doc = Document::parse(&html);
        self.url = url.to_string();
        let added = self.tags_of(&[self.doc.root()]);
        self.notify(DomChange::NodesRemoved { tags: removed });
        self.notify(DomChange::NodesAdded { tags: added });
        debug!("memory page navigated to {}", url);
        Ok(())
    }

    async fn wait_for_load(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn click(&mut self, target: &ElementHandle) -> Result<()> {
        let node = self.locate(target)?;
        self.perform_click(node)
    }

    async fn apply_writes(&mut self, batch: &[FieldWrite]) -> Result<Vec<WriteOutcome>> {
        let mut outcomes = Vec::with_capacity(batch.len());
        for field in batch {
            let failure = field.writes.iter().find_map(|w| self.apply_write(w).err());
            outcomes.push(match failure {
                None => WriteOutcome::ok(&field.field),
                Some(err) => WriteOutcome::failed(&field.field, err.to_string()),
            });
        }
        Ok(outcomes)
    }

    async fn submit(&mut self, form: &ElementHandle) -> Result<()> {
        let node = self.locate(form)?;
        let form_node = if self.doc.is_tag(node, "form") {
            node
        } else {
            self.enclosing_form(node).ok_or_else(|| {
                AutomationError::ExecutionFailed(format!("{} is not inside a form", form.selector))
            })?
        };
        self.submissions.push(self.doc.unique_selector(form_node));
        Ok(())
    }

    async fn screenshot(&mut self, _request: &ScreenshotRequest) -> Result<Vec<u8>> {
        Err(AutomationError::BrowserNotSupported(
            "in-memory pages cannot be rasterized".to_string(),
        ))
    }

    async fn url(&mut self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn title(&mut self) -> Result<String> {
        Ok(self.doc.title())
    }

    async fn viewport(&mut self) -> Result<Viewport> {
        Ok(self.viewport)
    }

    async fn attach_change_feed(&mut self, feed: ChangeFeed) -> Result<()> {
        self.feed = Some(feed);
        Ok(())
    }

    fn capabilities(&self) -> PageCapabilities {
        PageCapabilities {
            supports_javascript: false,
            supports_screenshots: false,
            supports_change_tracking: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::ChangeQueue;
    use tokio_test::{assert_err, assert_ok};

    fn handle(page: &MemoryPage, selector: &str) -> ElementHandle {
        let node = page.document().select_first(selector).unwrap().unwrap();
        ElementHandle::new(page.document(), node)
    }

    fn write(field: &str, writes: Vec<DomWrite>) -> FieldWrite {
        FieldWrite {
            field: field.to_string(),
            writes,
        }
    }

    #[tokio::test]
    async fn radios_are_exclusive() {
        let mut page = MemoryPage::from_html(
            "<form><input type='radio' name='size' id='s' checked><input type='radio' name='size' id='m'></form>",
        );
        let target = handle(&page, "#m");
        let outcomes = page
            .apply_writes(&[write("size", vec![DomWrite::SetChecked { target, checked: true }])])
            .await
            .unwrap();
        assert!(outcomes[0].is_ok());
        let doc = page.document();
        assert!(!doc.has_attr(doc.select_first("#s").unwrap().unwrap(), "checked"));
        assert!(doc.has_attr(doc.select_first("#m").unwrap().unwrap(), "checked"));
    }

    #[tokio::test]
    async fn select_rejects_unknown_values_per_field() {
        let mut page = MemoryPage::from_html(
            "<select id='c'><option value='us'>US</option><option value='ca' selected>CA</option></select><input id='n'>",
        );
        let select = handle(&page, "#c");
        let input = handle(&page, "#n");
        let outcomes = page
            .apply_writes(&[
                write("country", vec![DomWrite::SelectOptions { target: select, values: vec!["mx".into()] }]),
                write("name", vec![DomWrite::SetValue { target: input, value: "Ada".into() }]),
            ])
            .await
            .unwrap();
        assert!(!outcomes[0].is_ok());
        assert!(outcomes[1].is_ok());

        let select = handle(&page, "#c");
        assert_ok!(page.apply_writes(&[write("country", vec![DomWrite::SelectOptions { target: select, values: vec!["us".into()] }])]).await);
        let doc = page.document();
        let us = doc.select_first("option[value=us]").unwrap().unwrap();
        let ca = doc.select_first("option[value=ca]").unwrap().unwrap();
        assert!(doc.has_attr(us, "selected"));
        assert!(!doc.has_attr(ca, "selected"));
    }

    #[tokio::test]
    async fn stale_handles_are_reported() {
        let mut page = MemoryPage::from_html("<button id='go'>Go</button>");
        let target = handle(&page, "#go");
        page.remove_matching("#go").unwrap();
        assert_err!(page.click(&target).await);
        assert!(page.clicks().is_empty());
    }

    #[tokio::test]
    async fn custom_options_toggle_on_click() {
        let mut page = MemoryPage::from_html("<ul role='listbox'><li role='option' id='a'>A</li></ul>");
        let target = handle(&page, "#a");
        page.click(&target).await.unwrap();
        let doc = page.document();
        assert_eq!(doc.attr(doc.select_first("#a").unwrap().unwrap(), "aria-selected"), Some("true"));
    }

    #[tokio::test]
    async fn navigation_follows_routes_and_notifies() {
        let (feed, mut queue) = ChangeQueue::channel(Duration::from_millis(5));
        let mut page = MemoryPage::new().with_route("https://example.test/", "<title>Home</title><form></form>");
        page.attach_change_feed(feed).await.unwrap();

        assert_err!(page.navigate("https://elsewhere.test/").await);
        assert_ok!(page.navigate("https://example.test/").await);
        assert_eq!(page.title().await.unwrap(), "Home");
        assert_eq!(page.url().await.unwrap(), "https://example.test/");
        assert!(queue.next_batch().await.is_some());
    }

    #[tokio::test]
    async fn submit_button_click_submits_enclosing_form() {
        let mut page = MemoryPage::from_html("<form id='f'><button id='b'>Send</button></form>");
        let target = handle(&page, "#b");
        page.click(&target).await.unwrap();
        assert_eq!(page.submissions(), &["#f".to_string()]);
    }
}
