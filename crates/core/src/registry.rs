use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

use crate::session::Session;
use crate::store::OrgId;

/// Process-wide mutable presence state (§3, §5): `org_id -> live sessions`,
/// insertion order preserved per org for deterministic tests.
///
/// All mutation and reads go through a single lock; `snapshot` clones the
/// `Arc<Session>` handles so broadcast can iterate and send without holding
/// the lock (§5) — a single slow recipient never blocks the rest of the org.
#[derive(Default)]
pub struct Registry {
    sessions: RwLock<AHashMap<OrgId, Vec<Arc<Session>>>>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A session is in the registry iff it has completed register (§3
    /// invariant); this is the only insertion point.
    pub fn add(&self, session: Arc<Session>) {
        self.sessions
            .write()
            .entry(session.org_id)
            .or_default()
            .push(session);
    }

    /// Removes a session by connection id. Idempotent: removing twice, or
    /// removing a session that was never added, is a silent no-op (P7).
    pub fn remove(&self, org_id: OrgId, connection_id: Uuid) {
        let mut sessions = self.sessions.write();
        if let Some(list) = sessions.get_mut(&org_id) {
            list.retain(|s| s.connection_id != connection_id);
            if list.is_empty() {
                sessions.remove(&org_id);
            }
        }
    }

    /// Stable copy of the live sessions for `org_id`, safe to iterate
    /// without holding the registry lock.
    pub fn snapshot(&self, org_id: OrgId) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .get(&org_id)
            .cloned()
            .unwrap_or_default()
    }
}
