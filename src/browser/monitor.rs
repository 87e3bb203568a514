use crate::errors::Result;
use crate::forms::DomChange;
use crate::utils::javascript::JavaScriptRunner;
use headless_chrome::Tab;
use std::sync::Arc;
use tracing::debug;

/// Installs a MutationObserver that buffers structural and attribute changes in the page
/// until they are drained with [`ChangeMonitor::take_changes`].
#[derive(Debug, Default)]
pub struct ChangeMonitor {
    active: bool,
}

const OBSERVER_SCRIPT: &str = r#"
(function() {
    if (window.__pagepilotObserver) {
        window.__pagepilotObserver.disconnect();
    }
    window.__pagepilotChanges = [];

    const tagsOf = (nodes) => {
        const tags = new Set();
        nodes.forEach((node) => {
            if (node.nodeType !== 1) return;
            tags.add(node.tagName.toLowerCase());
            node.querySelectorAll('*').forEach((child) => tags.add(child.tagName.toLowerCase()));
        });
        return Array.from(tags);
    };

    window.__pagepilotObserver = new MutationObserver((mutations) => {
        mutations.forEach((mutation) => {
            if (mutation.type === 'childList') {
                const added = tagsOf(mutation.addedNodes);
                const removed = tagsOf(mutation.removedNodes);
                if (added.length) window.__pagepilotChanges.push({kind: 'nodes_added', tags: added});
                if (removed.length) window.__pagepilotChanges.push({kind: 'nodes_removed', tags: removed});
            } else if (mutation.type === 'attributes') {
                window.__pagepilotChanges.push({
                    kind: 'attribute_changed',
                    tag: mutation.target.tagName ? mutation.target.tagName.toLowerCase() : '',
                    name: mutation.attributeName
                });
            }
        });
    });

    window.__pagepilotObserver.observe(document.documentElement, {
        childList: true,
        subtree: true,
        attributes: true
    });
    return true;
})()
"#;

const TAKE_SCRIPT: &str = r#"
(function() {
    const changes = window.__pagepilotChanges || [];
    window.__pagepilotChanges = [];
    return changes;
})()
"#;

const STOP_SCRIPT: &str = r#"
(function() {
    if (window.__pagepilotObserver) {
        window.__pagepilotObserver.disconnect();
        delete window.__pagepilotObserver;
    }
    delete window.__pagepilotChanges;
    return true;
})()
"#;

impl ChangeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// (Re)install the observer. A new document discards the old one, so this runs again
    /// after every navigation.
    pub async fn start(&mut self, tab: &Arc<Tab>) -> Result<()> {
        JavaScriptRunner::execute(tab, OBSERVER_SCRIPT).await?;
        self.active = true;
        debug!("DOM change monitor installed");
        Ok(())
    }

    /// Drain buffered changes. Unknown entries are dropped.
    pub async fn take_changes(&self, tab: &Arc<Tab>) -> Result<Vec<DomChange>> {
        if !self.active {
            return Ok(Vec::new());
        }
        let raw: Vec<serde_json::Value> = JavaScriptRunner::execute_json(tab, TAKE_SCRIPT).await?;
        Ok(raw
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect())
    }

    pub async fn stop(&mut self, tab: &Arc<Tab>) -> Result<()> {
        if self.active {
            JavaScriptRunner::execute(tab, STOP_SCRIPT).await?;
            self.active = false;
            debug!("DOM change monitor stopped");
        }
        Ok(())
    }
}
