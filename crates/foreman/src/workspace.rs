//! The workspace: an owned directory of synchronization targets.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use crate::events::{EventBus, WorkspaceEvent};
use crate::target::{ProjectId, SyncTarget};

/// Maps project ids to their synchronization targets.
///
/// Cheap to clone. When wired to an [`EventBus`], registration and removal
/// emit the corresponding workspace events so dependent views can refresh.
#[derive(Clone, Default)]
pub struct Workspace {
    inner: Arc<Mutex<IndexMap<ProjectId, Arc<dyn SyncTarget>>>>,
    events: Option<EventBus>,
}

impl Workspace {
    /// An empty workspace with no event wiring.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty workspace that announces project changes on `bus`.
    pub fn with_events(bus: EventBus) -> Self {
        Self {
            inner: Arc::default(),
            events: Some(bus),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<ProjectId, Arc<dyn SyncTarget>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a target. A duplicate id keeps the existing registration and
    /// emits no event. Returns whether the target was newly added.
    pub fn register(&self, target: Arc<dyn SyncTarget>) -> bool {
        let id = target.id().clone();
        let added = {
            let mut targets = self.lock();
            if targets.contains_key(&id) {
                false
            } else {
                targets.insert(id.clone(), target);
                true
            }
        };

        if added {
            if let Some(bus) = &self.events {
                bus.emit(WorkspaceEvent::ProjectCreated(id));
            }
        }
        added
    }

    /// Remove a target by id, returning it if it was present.
    pub fn deregister(&self, project: &ProjectId) -> Option<Arc<dyn SyncTarget>> {
        let removed = self.lock().shift_remove(project);
        if removed.is_some() {
            if let Some(bus) = &self.events {
                bus.emit(WorkspaceEvent::ProjectDeleted(project.clone()));
            }
        }
        removed
    }

    /// Look up the target for a project, if one is known.
    pub fn target_for(&self, project: &ProjectId) -> Option<Arc<dyn SyncTarget>> {
        self.lock().get(project).cloned()
    }

    /// All registered targets, in registration order.
    pub fn targets(&self) -> Vec<Arc<dyn SyncTarget>> {
        self.lock().values().cloned().collect()
    }

    /// Number of registered targets.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the workspace has no targets.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::job::sync::tests::TestTarget;

    #[test]
    fn register_deduplicates_by_id() {
        let workspace = Workspace::new();

        assert!(workspace.register(Arc::new(TestTarget::new("a"))));
        assert!(!workspace.register(Arc::new(TestTarget::new("a"))));
        assert_eq!(workspace.len(), 1);
    }

    #[test]
    fn lookup_and_removal() {
        let workspace = Workspace::new();
        workspace.register(Arc::new(TestTarget::new("a")));

        assert!(workspace.target_for(&ProjectId::new("a")).is_some());
        assert!(workspace.deregister(&ProjectId::new("a")).is_some());
        assert!(workspace.target_for(&ProjectId::new("a")).is_none());
        assert!(workspace.deregister(&ProjectId::new("a")).is_none());
        assert!(workspace.is_empty());
    }

    #[tokio::test]
    async fn registration_emits_workspace_events() {
        let bus = EventBus::default();
        let mut receiver = bus.subscribe();
        let workspace = Workspace::with_events(bus);

        workspace.register(Arc::new(TestTarget::new("a")));
        workspace.register(Arc::new(TestTarget::new("a"))); // duplicate, no event
        workspace.deregister(&ProjectId::new("a"));

        let first = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
            .await
            .expect("event in time")
            .expect("open channel");
        assert_eq!(first, WorkspaceEvent::ProjectCreated(ProjectId::new("a")));

        let second = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
            .await
            .expect("event in time")
            .expect("open channel");
        assert_eq!(second, WorkspaceEvent::ProjectDeleted(ProjectId::new("a")));
    }
}
