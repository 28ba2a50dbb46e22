use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per veterinarian, serializing read-check-write sequences
/// that touch the same calendar.
///
/// Handles only live while someone holds or waits for them; releasing the
/// last guard drops the entry.
#[derive(Debug, Default)]
pub struct VeterinarianLocks {
    handles: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

/// Exclusive access to one veterinarian's calendar.
#[derive(Debug)]
pub struct VeterinarianGuard<'a> {
    locks: &'a VeterinarianLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl VeterinarianLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of veterinarians currently locked or waited on.
    pub fn tracked(&self) -> usize {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn handle(&self, veterinarian_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.entry(veterinarian_id).or_default().clone()
    }

    /// Drops every handle nobody holds. Waiters and guards own a clone, so an
    /// entry at strong count 1 is referenced by the map alone.
    fn prune(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|_, handle| Arc::strong_count(handle) > 1);
    }

    pub async fn acquire(&self, veterinarian_id: Uuid) -> VeterinarianGuard<'_> {
        let guard = self.handle(veterinarian_id).lock_owned().await;
        VeterinarianGuard {
            locks: self,
            guard: Some(guard),
        }
    }

    /// Locks every distinct id in ascending order so two callers locking the
    /// same pair cannot deadlock.
    pub async fn acquire_all(&self, veterinarian_ids: &[Uuid]) -> Vec<VeterinarianGuard<'_>> {
        let mut ids = veterinarian_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.acquire(id).await);
        }
        guards
    }
}

impl Drop for VeterinarianGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.prune();
    }
}
