//! Per-activation session flags

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

/// Tools the user said no to during this session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclinedSet {
    pub install: BTreeSet<String>,
    pub update: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct SessionInner {
    declined: DeclinedSet,
    offered_install: BTreeSet<String>,
    important_offered: bool,
}

/// Session-scoped state shared by the prompt flows.
///
/// Created at activation and dropped at teardown; nothing here outlives the
/// process. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    inner: Arc<RwLock<SessionInner>>,
}

impl SessionState {
    pub fn begin() -> Self {
        debug!("Session state created");
        Self::default()
    }

    pub fn decline_install(&self, tool: &str) {
        self.inner.write().declined.install.insert(tool.to_string());
    }

    pub fn is_install_declined(&self, tool: &str) -> bool {
        self.inner.read().declined.install.contains(tool)
    }

    pub fn decline_update(&self, tool: &str) {
        self.inner.write().declined.update.insert(tool.to_string());
    }

    pub fn is_update_declined(&self, tool: &str) -> bool {
        self.inner.read().declined.update.contains(tool)
    }

    /// Record an install offer; false if `tool` was already offered
    pub fn mark_install_offered(&self, tool: &str) -> bool {
        self.inner.write().offered_install.insert(tool.to_string())
    }

    /// Record the activation-time offer; false if it already happened
    pub fn mark_important_offered(&self) -> bool {
        let mut inner = self.inner.write();
        !std::mem::replace(&mut inner.important_offered, true)
    }

    pub fn declined(&self) -> DeclinedSet {
        self.inner.read().declined.clone()
    }

    /// Tear the session down
    pub fn end(self) {
        debug!("Session state dropped");
    }
}
