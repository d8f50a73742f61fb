//
// Copyright 2017-2025 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Session registry
//!
//! The SessionRegistry is responsible for:
//! - Assigning session IDs (`Client1`, `Client2`, ...)
//! - Mapping session IDs to sessions and connections back to session IDs
//! - Producing point-in-time snapshots for the shutdown broadcast
//!
//! Every operation runs under a single mutex, so the two maps and the ID
//! counter always change together.

use crate::{ConnectionKey, LineConnection, Result, SessionId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// A registered session
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    connection: LineConnection,
    registered_at: Instant,
}

impl Session {
    /// The session's ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The session's connection
    pub fn connection(&self) -> &LineConnection {
        &self.connection
    }

    /// When the session was registered
    pub fn registered_at(&self) -> Instant {
        self.registered_at
    }

    /// Send the session ID as the connection's first line
    pub async fn announce(&self) -> Result<()> {
        self.connection.write_line(&self.id.to_string()).await
    }
}

#[derive(Default)]
struct RegistryInner {
    /// Last ID handed out (0 before the first registration)
    last_id: u64,
    sessions: BTreeMap<SessionId, Session>,
    by_connection: HashMap<ConnectionKey, SessionId>,
}

/// Thread-safe table of live sessions
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<RegistryInner>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the maps half-updated:
    // every mutation below is a single insert/remove pair with no await.
    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection under the next session ID
    pub fn register(&self, connection: LineConnection) -> Session {
        let mut inner = self.lock();
        inner.last_id += 1;
        let id = SessionId::new(inner.last_id);

        let session = Session {
            id,
            connection,
            registered_at: Instant::now(),
        };
        inner.by_connection.insert(session.connection.key(), id);
        inner.sessions.insert(id, session.clone());
        session
    }

    /// Remove a session
    ///
    /// Returns `None` if the session was already removed.
    pub fn unregister(&self, id: SessionId) -> Option<Session> {
        let mut inner = self.lock();
        let session = inner.sessions.remove(&id)?;
        inner.by_connection.remove(&session.connection.key());
        Some(session)
    }

    /// Find a session by ID
    pub fn lookup(&self, id: SessionId) -> Option<Session> {
        self.lock().sessions.get(&id).cloned()
    }

    /// Find the session ID registered for a connection
    pub fn lookup_by_connection(&self, connection: &LineConnection) -> Option<SessionId> {
        self.lock().by_connection.get(&connection.key()).copied()
    }

    /// Snapshot of every registered session, ordered by ID
    pub fn all_sessions(&self) -> Vec<Session> {
        self.lock().sessions.values().cloned().collect()
    }

    /// IDs of every registered session, ordered by ID
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.lock().sessions.keys().copied().collect()
    }

    /// Remove every session, returning what was removed
    ///
    /// The ID counter is not reset.
    pub fn clear(&self) -> Vec<Session> {
        let mut inner = self.lock();
        inner.by_connection.clear();
        std::mem::take(&mut inner.sessions).into_values().collect()
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Whether no sessions are registered
    pub fn is_empty(&self) -> bool {
        self.lock().sessions.is_empty()
    }

    /// Total sessions ever registered
    pub fn total_registered(&self) -> u64 {
        self.lock().last_id
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SessionRegistry")
            .field("session_count", &inner.sessions.len())
            .field("last_id", &inner.last_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectionConfig;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tokio::io::duplex;

    fn connection() -> LineConnection {
        let (local, _remote) = duplex(64);
        LineConnection::new(local, None, &ConnectionConfig::default())
    }

    #[tokio::test]
    async fn test_register_assigns_sequential_ids() {
        let registry = SessionRegistry::new();
        let first = registry.register(connection());
        let second = registry.register(connection());

        assert_eq!(first.id().to_string(), "Client1");
        assert_eq!(second.id().to_string(), "Client2");
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_ids_never_reused() {
        let registry = SessionRegistry::new();
        let first = registry.register(connection());
        registry.unregister(first.id());
        registry.clear();

        let next = registry.register(connection());
        assert_eq!(next.id(), SessionId::new(2));
        assert_eq!(registry.total_registered(), 2);
    }

    #[tokio::test]
    async fn test_unregister_twice_is_noop() {
        let registry = SessionRegistry::new();
        let session = registry.register(connection());

        assert!(registry.unregister(session.id()).is_some());
        assert!(registry.unregister(session.id()).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_both_directions() {
        let registry = SessionRegistry::new();
        let conn = connection();
        let session = registry.register(conn.clone());

        assert_eq!(registry.lookup(session.id()).unwrap().id(), session.id());
        assert_eq!(registry.lookup_by_connection(&conn), Some(session.id()));

        registry.unregister(session.id());
        assert!(registry.lookup(session.id()).is_none());
        assert!(registry.lookup_by_connection(&conn).is_none());
    }

    #[tokio::test]
    async fn test_snapshot_and_clear() {
        let registry = SessionRegistry::new();
        for _ in 0..3 {
            registry.register(connection());
        }

        let ids: Vec<_> = registry.all_sessions().iter().map(Session::id).collect();
        assert_eq!(ids, registry.session_ids());
        assert_eq!(ids.len(), 3);

        let removed = registry.clear();
        assert_eq!(removed.len(), 3);
        assert!(registry.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_unique_ids() {
        let registry = Arc::new(SessionRegistry::new());
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                (0..50)
                    .map(|_| registry.register(connection()).id())
                    .collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for task in tasks {
            let ids = task.await.unwrap();
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            for id in ids {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 400);
        assert_eq!(registry.len(), 400);
    }
}
