//! Concurrency tests for the connection registry.
//!
//! Many tasks register and unregister at once; afterwards every snapshot
//! must match exactly the connections still registered, with no
//! duplicates and no leftovers.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use std::collections::HashSet;
use std::sync::Arc;

use nbasim_core::SessionId;
use nbasim_server::{Connection, ConnectionId, ConnectionRegistry, Role};

const SESSIONS: usize = 4;
const CONNECTIONS: usize = 100;

fn session(index: usize) -> SessionId {
    SessionId::new(format!("game-{}", index % SESSIONS))
}

const fn role(index: usize) -> Role {
    if index % 3 == 0 {
        Role::Producer
    } else {
        Role::Consumer
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_register_and_unregister_stay_consistent() {
    let registry = Arc::new(ConnectionRegistry::new());
    let mut tasks = Vec::new();

    for index in 0..CONNECTIONS {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            let (connection, outbox) = Connection::new(role(index), 4);
            let id = connection.id();
            let session = session(index);
            registry.register(&session, connection).await;
            // Every fourth connection leaves again straight away.
            let kept = index % 4 != 0;
            if !kept {
                assert!(registry.unregister(&session, id).await.is_some());
            }
            tokio::task::yield_now().await;
            (index, id, kept, outbox)
        }));
    }

    let mut expected: Vec<HashSet<(ConnectionId, Role)>> = vec![HashSet::new(); SESSIONS];
    let mut outboxes = Vec::new();
    for task in tasks {
        let (index, id, kept, outbox) = task.await.unwrap();
        outboxes.push(outbox);
        if kept {
            if let Some(set) = expected.get_mut(index % SESSIONS) {
                set.insert((id, role(index)));
            }
        }
    }

    let mut total = 0;
    for (index, want) in expected.iter().enumerate() {
        let session = session(index);
        let mut got = HashSet::new();
        for role in [Role::Producer, Role::Consumer] {
            let snapshot = registry.snapshot(&session, role).await;
            for connection in snapshot {
                assert_eq!(connection.role(), role);
                assert!(
                    got.insert((connection.id(), role)),
                    "duplicate connection in snapshot"
                );
            }
        }
        assert_eq!(&got, want, "session {session} mismatch");
        total += got.len();
    }

    assert_eq!(total, CONNECTIONS - CONNECTIONS / 4);
    assert_eq!(registry.stats().await.total_connections(), total);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn draining_every_connection_empties_the_registry() {
    let registry = Arc::new(ConnectionRegistry::new());
    let mut handles = Vec::new();
    for index in 0..CONNECTIONS {
        let (connection, outbox) = Connection::new(role(index), 4);
        handles.push((session(index), connection.id(), outbox));
        registry.register(&session(index), connection).await;
    }
    assert_eq!(registry.stats().await.session_count(), SESSIONS);

    let mut tasks = Vec::new();
    for (session, id, _) in &handles {
        let registry = Arc::clone(&registry);
        let session = session.clone();
        let id = *id;
        tasks.push(tokio::spawn(async move {
            registry.unregister(&session, id).await.is_some()
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap());
    }

    let stats = registry.stats().await;
    assert_eq!(stats.session_count(), 0);
    assert_eq!(stats.total_connections(), 0);
}
