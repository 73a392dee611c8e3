//! Fan-in of every collection subscription into one live book
//!
//! Each collection pushes snapshots independently and in no particular
//! order. The live book waits until every collection has emitted once, then
//! yields a fresh `Book` per burst of changes. Sibling collections may be
//! momentarily stale relative to each other; calculators tolerate that.

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::debug;

use crate::book::Book;
use crate::constants;
use crate::store::{Snapshot, Store};

/// Collections that changed and the book rebuilt from the latest snapshots
#[derive(Debug)]
pub struct Change {
    pub collections: Vec<&'static str>,
    pub book: Book,
}

pub struct LiveBook {
    receivers: Vec<(&'static str, watch::Receiver<Option<Snapshot>>)>,
    changes: mpsc::UnboundedReceiver<&'static str>,
    /// Aborted on drop
    _forwarders: JoinSet<()>,
}

impl LiveBook {
    /// Subscribe to every collection in the store
    pub fn follow(store: &Store) -> Self {
        let (tx, changes) = mpsc::unbounded_channel();
        let mut forwarders = JoinSet::new();

        let receivers = constants::COLLECTIONS
            .iter()
            .map(|&collection| {
                let receiver = store.subscribe(collection);
                let mut watcher = receiver.clone();
                let tx = tx.clone();
                forwarders.spawn(async move {
                    while watcher.changed().await.is_ok() {
                        if tx.send(collection).is_err() {
                            break;
                        }
                    }
                });
                (collection, receiver)
            })
            .collect();

        Self {
            receivers,
            changes,
            _forwarders: forwarders,
        }
    }

    /// Wait until every collection has delivered its first snapshot
    pub async fn wait_ready(&mut self) -> Result<Book> {
        for (collection, receiver) in &mut self.receivers {
            receiver
                .wait_for(Option::is_some)
                .await
                .with_context(|| format!("Store closed before {} was loaded", collection))?;
        }
        while self.changes.try_recv().is_ok() {}

        debug!(collections = self.receivers.len(), "live book ready");
        Ok(self.snapshot())
    }

    /// Wait for the next change; changes that arrived meanwhile are folded
    /// into the same rebuild
    pub async fn next_change(&mut self) -> Result<Change> {
        let first = self
            .changes
            .recv()
            .await
            .context("All collection subscriptions ended")?;

        let mut collections = vec![first];
        while let Ok(collection) = self.changes.try_recv() {
            if !collections.contains(&collection) {
                collections.push(collection);
            }
        }

        debug!(?collections, "rebuilding book");
        Ok(Change {
            collections,
            book: self.snapshot(),
        })
    }

    /// Book built from whatever each collection last published
    pub fn snapshot(&self) -> Book {
        let snapshots: Vec<(&str, Snapshot)> = self
            .receivers
            .iter()
            .map(|(collection, receiver)| (*collection, receiver.borrow().clone().unwrap_or_default()))
            .collect();

        Book::decode(|collection| {
            snapshots
                .iter()
                .find(|(name, _)| *name == collection)
                .map(|(_, records)| records.as_slice())
                .unwrap_or(&[] as &[Value])
        })
    }
}
