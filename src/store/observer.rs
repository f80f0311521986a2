// SPDX-License-Identifier: GPL-3.0-only
//! Live change subscriptions over the local store.
//!
//! Every commit is published as a list of [`Change`]s. Each subscriber keeps
//! only the changes matching its [`RecordFilter`] and receives them as a single
//! [`ChangeSet`], so one commit never arrives split across several messages.

use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::trace;

use crate::store::models::{PhotoId, PinId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordId {
    Pin(PinId),
    Photo(PhotoId),
}

/// Which records an observer cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFilter {
    Pins,
    PhotosOf(PinId),
    AllPhotos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Delete,
    Update,
}

/// One record touched by a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Pin {
        kind: ChangeKind,
        id: PinId,
    },
    Photo {
        kind: ChangeKind,
        id: PhotoId,
        pin_id: PinId,
    },
}

impl Change {
    fn kind(&self) -> ChangeKind {
        match self {
            Change::Pin { kind, .. } | Change::Photo { kind, .. } => *kind,
        }
    }

    fn record(&self) -> RecordId {
        match self {
            Change::Pin { id, .. } => RecordId::Pin(*id),
            Change::Photo { id, .. } => RecordId::Photo(*id),
        }
    }
}

impl RecordFilter {
    pub fn matches(&self, change: &Change) -> bool {
        match (self, change) {
            (RecordFilter::Pins, Change::Pin { .. }) => true,
            (RecordFilter::PhotosOf(pin), Change::Photo { pin_id, .. }) => pin == pin_id,
            (RecordFilter::AllPhotos, Change::Photo { .. }) => true,
            _ => false,
        }
    }
}

/// Diff of one commit as seen through a filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub inserted: Vec<RecordId>,
    pub deleted: Vec<RecordId>,
    pub updated: Vec<RecordId>,
}

impl ChangeSet {
    fn from_changes<'a>(changes: impl Iterator<Item = &'a Change>) -> Self {
        let mut set = ChangeSet::default();
        for change in changes {
            let bucket = match change.kind() {
                ChangeKind::Insert => &mut set.inserted,
                ChangeKind::Delete => &mut set.deleted,
                ChangeKind::Update => &mut set.updated,
            };
            bucket.push(change.record());
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }
}

struct Subscriber {
    filter: RecordFilter,
    sender: mpsc::UnboundedSender<ChangeSet>,
}

#[derive(Default)]
pub struct ObserverRegistry {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, filter: RecordFilter) -> ChangeObserver {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { filter, sender });
        ChangeObserver { filter, receiver }
    }

    /// Fan a committed change list out to every live subscriber.
    /// Subscribers whose handle was dropped are pruned here.
    pub fn publish(&self, changes: &[Change]) {
        if changes.is_empty() {
            return;
        }

        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|subscriber| {
            let set = ChangeSet::from_changes(
                changes.iter().filter(|change| subscriber.filter.matches(change)),
            );
            if set.is_empty() {
                return !subscriber.sender.is_closed();
            }
            trace!(filter = ?subscriber.filter, ?set, "Publishing change set");
            subscriber.sender.send(set).is_ok()
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Handle returned by `observe`; dropping it ends the subscription
pub struct ChangeObserver {
    filter: RecordFilter,
    receiver: mpsc::UnboundedReceiver<ChangeSet>,
}

impl ChangeObserver {
    pub fn filter(&self) -> RecordFilter {
        self.filter
    }

    /// Wait for the next commit affecting the observed records
    pub async fn next(&mut self) -> Option<ChangeSet> {
        self.receiver.recv().await
    }

    /// Take an already-delivered change set without waiting
    pub fn try_next(&mut self) -> Option<ChangeSet> {
        self.receiver.try_recv().ok()
    }
}
