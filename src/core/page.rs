use crate::dom::{Document, NodeId};
use crate::errors::Result;
use crate::forms::ChangeFeed;
use crate::types::{PageCapabilities, ScreenshotRequest, Viewport};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// An element of the latest snapshot, addressable both in that snapshot (`node`) and in
/// the live page (`selector`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementHandle {
    #[serde(skip)]
    pub node: NodeId,
    pub selector: String,
}

impl ElementHandle {
    pub fn new(doc: &Document, node: NodeId) -> Self {
        Self {
            node,
            selector: doc.unique_selector(node),
        }
    }
}

/// Primitive DOM mutation. Drivers apply these with native semantics and dispatch the
/// matching `input`/`change` events.
#[derive(Debug, Clone, PartialEq)]
pub enum DomWrite {
    /// Set the value of an input/textarea, or the text of a contenteditable element.
    SetValue { target: ElementHandle, value: String },
    SetChecked { target: ElementHandle, checked: bool },
    /// Select exactly these `<option>` values of a native `<select>`.
    SelectOptions { target: ElementHandle, values: Vec<String> },
    SetAttribute { target: ElementHandle, name: String, value: String },
    Click { target: ElementHandle },
}

impl DomWrite {
    pub fn target(&self) -> &ElementHandle {
        match self {
            DomWrite::SetValue { target, .. }
            | DomWrite::SetChecked { target, .. }
            | DomWrite::SelectOptions { target, .. }
            | DomWrite::SetAttribute { target, .. }
            | DomWrite::Click { target } => target,
        }
    }
}

/// All writes for one field. A field succeeds only if all of its writes do.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWrite {
    pub field: String,
    pub writes: Vec<DomWrite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub field: String,
    pub error: Option<String>,
}

impl WriteOutcome {
    pub fn ok(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            error: None,
        }
    }

    pub fn failed(field: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// The live page the engine drives.
///
/// Element addressing goes through snapshots: callers take a [`Document`] with
/// [`snapshot`](PageDriver::snapshot), resolve nodes in it and hand back
/// [`ElementHandle`]s. Handles from older snapshots may be stale; drivers report that as
/// an error instead of acting on a different element.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Fresh parse of the current DOM.
    async fn snapshot(&mut self) -> Result<Document>;

    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Wait for the load signal of the current document.
    async fn wait_for_load(&mut self, timeout: Duration) -> Result<()>;

    async fn click(&mut self, target: &ElementHandle) -> Result<()>;

    /// Apply a batch of field writes as one unit. Intermediate states are not observable
    /// by the page's own listeners; events fire once the whole batch is applied. Each field
    /// reports its own outcome.
    async fn apply_writes(&mut self, batch: &[FieldWrite]) -> Result<Vec<WriteOutcome>>;

    /// Submit the form containing (or being) `form`.
    async fn submit(&mut self, form: &ElementHandle) -> Result<()>;

    /// Encoded image bytes in the requested format.
    async fn screenshot(&mut self, request: &ScreenshotRequest) -> Result<Vec<u8>>;

    async fn url(&mut self) -> Result<String>;

    async fn title(&mut self) -> Result<String>;

    async fn viewport(&mut self) -> Result<Viewport>;

    /// Start forwarding structural changes to `feed`. Drivers without change tracking
    /// ignore the feed.
    async fn attach_change_feed(&mut self, _feed: ChangeFeed) -> Result<()> {
        Ok(())
    }

    /// Push pending change notifications into the attached feed.
    async fn flush_changes(&mut self) -> Result<()> {
        Ok(())
    }

    fn capabilities(&self) -> PageCapabilities;
}
