//! Debounced change notifications.
//!
//! Drivers push [`DomChange`]s into a [`ChangeFeed`]; the engine owns the single
//! [`ChangeQueue`] consumer, which hands out one batch once no relevant change arrived for
//! the quiescence window.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::trace;

const FORM_TAGS: &[&str] = &[
    "form", "input", "select", "textarea", "button", "option", "fieldset", "label", "datalist",
];

const TRACKED_ATTRIBUTES: &[&str] = &[
    "name", "id", "type", "value", "checked", "selected", "disabled", "required", "hidden",
    "class", "style", "data-value", "data-state",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomChange {
    NodesAdded { tags: Vec<String> },
    NodesRemoved { tags: Vec<String> },
    AttributeChanged { tag: String, name: String },
}

fn is_form_tag(tag: &str) -> bool {
    FORM_TAGS.contains(&tag.to_ascii_lowercase().as_str())
}

impl DomChange {
    /// Whether the change can alter a form inventory.
    pub fn is_relevant(&self) -> bool {
        match self {
            DomChange::NodesAdded { tags } | DomChange::NodesRemoved { tags } => {
                tags.iter().any(|t| is_form_tag(t))
            }
            DomChange::AttributeChanged { name, .. } => {
                let name = name.to_ascii_lowercase();
                TRACKED_ATTRIBUTES.contains(&name.as_str()) || name.starts_with("aria-")
            }
        }
    }
}

/// Producer side, cheap to clone into drivers and observers.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: mpsc::UnboundedSender<(Instant, DomChange)>,
}

impl ChangeFeed {
    /// Returns `false` once the consumer is gone.
    pub fn notify(&self, change: DomChange) -> bool {
        self.tx.send((Instant::now(), change)).is_ok()
    }
}

/// Single consumer collapsing bursts into one batch per quiescence window.
#[derive(Debug)]
pub struct ChangeQueue {
    rx: mpsc::UnboundedReceiver<(Instant, DomChange)>,
    window: Duration,
    pending: Vec<DomChange>,
    last_relevant: Option<Instant>,
}

impl ChangeQueue {
    pub fn channel(window: Duration) -> (ChangeFeed, ChangeQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ChangeFeed { tx },
            ChangeQueue {
                rx,
                window,
                pending: Vec::new(),
                last_relevant: None,
            },
        )
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn accept(&mut self, at: Instant, change: DomChange) {
        if !change.is_relevant() {
            trace!("ignoring change {:?}", change);
            return;
        }
        self.last_relevant = Some(match self.last_relevant {
            Some(last) if last > at => last,
            _ => at,
        });
        self.pending.push(change);
    }

    fn drain(&mut self) {
        while let Ok((at, change)) = self.rx.try_recv() {
            self.accept(at, change);
        }
    }

    fn take(&mut self) -> Vec<DomChange> {
        self.last_relevant = None;
        std::mem::take(&mut self.pending)
    }

    /// The pending batch if the window has elapsed since the last relevant change.
    pub fn poll_ready(&mut self) -> Option<Vec<DomChange>> {
        self.drain();
        let last = self.last_relevant?;
        if last.elapsed() >= self.window {
            Some(self.take())
        } else {
            None
        }
    }

    /// Wait for the next batch. `None` once every feed is dropped and nothing is pending.
    pub async fn next_batch(&mut self) -> Option<Vec<DomChange>> {
        loop {
            self.drain();
            match self.last_relevant {
                None => {
                    let (at, change) = self.rx.recv().await?;
                    self.accept(at, change);
                }
                Some(last) => match tokio::time::timeout_at(last + self.window, self.rx.recv()).await {
                    Ok(Some((at, change))) => self.accept(at, change),
                    Ok(None) | Err(_) => return Some(self.take()),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn added(tag: &str) -> DomChange {
        DomChange::NodesAdded {
            tags: vec![tag.to_string()],
        }
    }

    #[test]
    fn relevance_filter() {
        assert!(added("input").is_relevant());
        assert!(!added("span").is_relevant());
        assert!(DomChange::AttributeChanged {
            tag: "div".into(),
            name: "aria-expanded".into()
        }
        .is_relevant());
        assert!(!DomChange::AttributeChanged {
            tag: "div".into(),
            name: "data-tooltip".into()
        }
        .is_relevant());
    }

    #[tokio::test]
    async fn burst_collapses_into_one_batch() {
        let (feed, mut queue) = ChangeQueue::channel(Duration::from_millis(40));
        for _ in 0..5 {
            feed.notify(added("input"));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        feed.notify(added("span"));

        assert!(queue.poll_ready().is_none());
        let batch = queue.next_batch().await.unwrap();
        assert_eq!(batch.len(), 5);
        assert!(queue.poll_ready().is_none());
        assert!(!queue.has_pending());
    }

    #[tokio::test]
    async fn poll_ready_after_window() {
        let (feed, mut queue) = ChangeQueue::channel(Duration::from_millis(10));
        feed.notify(added("form"));
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(queue.poll_ready().map(|b| b.len()), Some(1));
    }

    #[tokio::test]
    async fn closed_feed_ends_the_stream() {
        let (feed, mut queue) = ChangeQueue::channel(Duration::from_millis(10));
        feed.notify(added("select"));
        drop(feed);
        assert_eq!(queue.next_batch().await.map(|b| b.len()), Some(1));
        assert!(queue.next_batch().await.is_none());
    }
}
