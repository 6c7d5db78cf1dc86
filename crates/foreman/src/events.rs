//! Workspace change notifications and the dependent view refresh.
//!
//! The scheduler does not own project lifecycle events; it consumes them. A
//! broadcast bus carries discrete change events, and a listener task reloads
//! a project view with fetch-if-absent semantics whenever the set of
//! projects changes. No synchronization is implied by an event itself.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::target::ProjectId;

/// A discrete workspace change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    /// A project was added to the workspace.
    ProjectCreated(ProjectId),
    /// A project was removed from the workspace.
    ProjectDeleted(ProjectId),
    /// An existing project became buildable (gained the managed nature).
    NatureAdded(ProjectId),
}

impl WorkspaceEvent {
    /// The project this event is about.
    pub fn project(&self) -> &ProjectId {
        match self {
            Self::ProjectCreated(id) | Self::ProjectDeleted(id) | Self::NatureAdded(id) => id,
        }
    }
}

/// How a view refresh fetches its backing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Fetch only what is not already cached.
    LoadIfNotCached,
    /// Discard cached data and fetch everything.
    ForceReload,
}

/// A view over the workspace's projects (a task list, a tree, a report).
pub trait ProjectView: Send + Sync {
    /// Reload the view's content.
    fn reload(&self, strategy: FetchStrategy);
}

/// Broadcast bus for workspace events. Cheap to clone; emitting with no
/// subscribers is a no-op.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WorkspaceEvent>,
}

impl EventBus {
    /// Create a bus holding up to `capacity` undelivered events per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event. Ignores the absence of receivers.
    pub fn emit(&self, event: WorkspaceEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Spawn a listener that reloads `view` whenever a project is created,
/// deleted, or gains the managed nature.
///
/// Regular events use [`FetchStrategy::LoadIfNotCached`]; if the receiver
/// lags and events were dropped, the view is force-reloaded once to
/// resynchronize. The task ends when the bus is dropped.
pub fn spawn_view_refresh(bus: &EventBus, view: Arc<dyn ProjectView>) -> JoinHandle<()> {
    let mut receiver = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    tracing::debug!(project = %event.project(), ?event, "workspace changed, refreshing view");
                    view.reload(FetchStrategy::LoadIfNotCached);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event receiver lagged, forcing view reload");
                    view.reload(FetchStrategy::ForceReload);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingView {
        reloads: Mutex<Vec<FetchStrategy>>,
    }

    impl RecordingView {
        fn reloads(&self) -> Vec<FetchStrategy> {
            self.reloads.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    impl ProjectView for RecordingView {
        fn reload(&self, strategy: FetchStrategy) {
            self.reloads
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(strategy);
        }
    }

    async fn settle() {
        // Give the listener task a chance to drain the bus.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn every_change_event_triggers_a_cached_reload() {
        let bus = EventBus::default();
        let view = Arc::new(RecordingView::default());
        let listener = spawn_view_refresh(&bus, Arc::clone(&view) as Arc<dyn ProjectView>);

        bus.emit(WorkspaceEvent::ProjectCreated(ProjectId::new("a")));
        bus.emit(WorkspaceEvent::ProjectDeleted(ProjectId::new("a")));
        bus.emit(WorkspaceEvent::NatureAdded(ProjectId::new("b")));
        settle().await;

        let reloads = view.reloads();
        assert_eq!(reloads.len(), 3);
        assert!(reloads.iter().all(|s| *s == FetchStrategy::LoadIfNotCached));

        drop(bus);
        let _ = tokio::time::timeout(Duration::from_secs(1), listener).await;
    }

    #[tokio::test]
    async fn emitting_without_subscribers_is_a_noop() {
        let bus = EventBus::default();
        // Must not panic or error.
        bus.emit(WorkspaceEvent::ProjectCreated(ProjectId::new("a")));
    }

    #[test]
    fn event_exposes_its_project() {
        let event = WorkspaceEvent::NatureAdded(ProjectId::new("app"));
        assert_eq!(event.project(), &ProjectId::new("app"));
    }
}
