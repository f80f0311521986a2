// SPDX-License-Identifier: GPL-3.0-only
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SyncError};
use crate::store::models::PhotoId;

/// Logical display position owned by the presentation layer (e.g. a grid cell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
pub(crate) struct Slot {
    /// Token of the load currently bound to the slot. Cancelling and
    /// committing both happen under this lock so they cannot interleave.
    pub(crate) current: AsyncMutex<Option<CancellationToken>>,

    /// Held by a load for the whole duration of its fetch
    pub(crate) in_flight: AsyncMutex<()>,
}

#[derive(Default)]
pub(crate) struct SlotTable {
    slots: Mutex<HashMap<SlotId, Arc<Slot>>>,
}

impl SlotTable {
    pub(crate) fn get_or_create(&self, id: SlotId) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(id).or_default())
    }

    pub(crate) fn remove(&self, id: SlotId) -> Option<Arc<Slot>> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }
}

enum LoadState {
    Ready(Vec<u8>),
    Pending {
        token: CancellationToken,
        slot: Arc<Slot>,
        task: JoinHandle<Result<Vec<u8>>>,
    },
}

/// Handle to one image load bound to a slot.
///
/// Dropping the handle does not cancel the load; the bytes are still
/// stored when they arrive. Use [`ImageLoad::cancel`] or issue a new load
/// for the same slot to abandon it.
pub struct ImageLoad {
    slot_id: SlotId,
    photo_id: PhotoId,
    state: LoadState,
}

impl ImageLoad {
    pub(crate) fn ready(slot_id: SlotId, photo_id: PhotoId, bytes: Vec<u8>) -> Self {
        Self {
            slot_id,
            photo_id,
            state: LoadState::Ready(bytes),
        }
    }

    pub(crate) fn pending(
        slot_id: SlotId,
        photo_id: PhotoId,
        token: CancellationToken,
        slot: Arc<Slot>,
        task: JoinHandle<Result<Vec<u8>>>,
    ) -> Self {
        Self {
            slot_id,
            photo_id,
            state: LoadState::Pending { token, slot, task },
        }
    }

    pub fn slot(&self) -> SlotId {
        self.slot_id
    }

    pub fn photo_id(&self) -> PhotoId {
        self.photo_id
    }

    /// True when the bytes were already stored and no fetch was issued
    pub fn is_ready(&self) -> bool {
        matches!(self.state, LoadState::Ready(_))
    }

    pub fn is_cancelled(&self) -> bool {
        match &self.state {
            LoadState::Ready(_) => false,
            LoadState::Pending { token, .. } => token.is_cancelled(),
        }
    }

    /// Abandon the load. Once this returns the load can no longer write to the store.
    pub async fn cancel(&self) {
        if let LoadState::Pending { token, slot, .. } = &self.state {
            let _current = slot.current.lock().await;
            token.cancel();
        }
    }

    /// Wait for the image bytes
    pub async fn wait(self) -> Result<Vec<u8>> {
        match self.state {
            LoadState::Ready(bytes) => Ok(bytes),
            LoadState::Pending { task, .. } => match task.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(SyncError::Cancelled),
                Err(e) => Err(SyncError::fetch_failed(e)),
            },
        }
    }
}

impl fmt::Debug for ImageLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageLoad")
            .field("slot", &self.slot_id)
            .field("photo_id", &self.photo_id)
            .field("ready", &self.is_ready())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_table_reuses_slot() {
        let table = SlotTable::default();
        let a = table.get_or_create(SlotId(3));
        let b = table.get_or_create(SlotId(3));
        assert!(Arc::ptr_eq(&a, &b));

        let c = table.get_or_create(SlotId(4));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_slot_table_remove() {
        let table = SlotTable::default();
        let a = table.get_or_create(SlotId(1));
        let removed = table.remove(SlotId(1)).unwrap();
        assert!(Arc::ptr_eq(&a, &removed));
        assert!(table.remove(SlotId(1)).is_none());
    }

    #[tokio::test]
    async fn test_ready_load() {
        let load = ImageLoad::ready(SlotId(0), PhotoId(9), vec![1, 2, 3]);
        assert!(load.is_ready());
        assert!(!load.is_cancelled());
        load.cancel().await;
        assert_eq!(load.wait().await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_aborted_task_reports_cancelled() {
        let slot = Arc::new(Slot::default());
        let token = CancellationToken::new();
        let task = tokio::spawn(async {
            std::future::pending::<()>().await;
            Ok(Vec::new())
        });
        task.abort();

        let load = ImageLoad::pending(SlotId(0), PhotoId(1), token, slot, task);
        assert!(matches!(load.wait().await, Err(SyncError::Cancelled)));
    }
}
