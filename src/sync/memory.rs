use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use super::{RemoteCollection, RemoteError, SnapshotCallback, Unsubscribe};
use crate::core::appointment::{Appointment, AppointmentFields, AppointmentId};
use crate::core::status::Status;

/// In-process appointment collection.
///
/// Clones share the same documents, so two clones behave like two desks
/// looking at one collection. Subscribers are notified synchronously after
/// every mutation. Used for the offline board and in tests.
#[derive(Clone)]
pub struct MemoryCollection {
    inner: Arc<Mutex<Inner>>,
    calls: Arc<AtomicUsize>,
}

struct Inner {
    docs: Vec<Appointment>,
    subscribers: Vec<(u64, SnapshotCallback)>,
    next_subscriber: u64,
    offline: bool,
    batch_supported: bool,
    failing_deletes: HashSet<AppointmentId>,
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                docs: Vec::new(),
                subscribers: Vec::new(),
                next_subscriber: 0,
                offline: false,
                batch_supported: true,
                failing_deletes: HashSet::new(),
            })),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Collection without atomic batch deletes.
    pub fn without_batch_delete() -> Self {
        let collection = Self::new();
        collection.lock().batch_supported = false;
        collection
    }

    /// While offline every call fails with [`RemoteError::Offline`] and
    /// subscribers receive the error.
    pub fn set_offline(&self, offline: bool) {
        let subscribers = {
            let mut inner = self.lock();
            inner.offline = offline;
            inner.subscribers.clone()
        };
        if offline {
            for (_, callback) in subscribers {
                callback(Err(RemoteError::Offline));
            }
        }
    }

    /// Makes every later delete of `id` fail, batch or single.
    pub fn fail_deletes_for(&self, id: &AppointmentId) {
        self.lock().failing_deletes.insert(id.clone());
    }

    /// Number of remote calls made through any handle.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn documents(&self) -> Vec<Appointment> {
        self.lock().docs.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs a mutation, then notifies subscribers outside the lock.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Inner) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (value, docs, subscribers) = {
            let mut inner = self.lock();
            if inner.offline {
                return Err(RemoteError::Offline);
            }
            let value = f(&mut inner)?;
            (value, inner.docs.clone(), inner.subscribers.clone())
        };
        for (_, callback) in subscribers {
            callback(Ok(docs.clone()));
        }
        Ok(value)
    }
}

impl RemoteCollection for MemoryCollection {
    async fn add(&self, fields: &AppointmentFields, status: Status) -> Result<AppointmentId, RemoteError> {
        let id = AppointmentId::new(Uuid::new_v4().simple().to_string());
        let appointment = Appointment::with_status(id.clone(), fields.clone(), status);
        self.mutate(move |inner| {
            inner.docs.push(appointment);
            Ok(id)
        })
    }

    async fn update_status(&self, id: &AppointmentId, status: Status) -> Result<(), RemoteError> {
        self.mutate(|inner| {
            let doc = inner
                .docs
                .iter_mut()
                .find(|d| d.id == *id)
                .ok_or_else(|| RemoteError::NotFound(id.clone()))?;
            doc.status = status;
            Ok(())
        })
    }

    async fn delete(&self, id: &AppointmentId) -> Result<(), RemoteError> {
        self.mutate(|inner| {
            if inner.failing_deletes.contains(id) {
                return Err(RemoteError::PermissionDenied(format!("delete of {} rejected", id)));
            }
            let before = inner.docs.len();
            inner.docs.retain(|d| d.id != *id);
            if inner.docs.len() == before {
                return Err(RemoteError::NotFound(id.clone()));
            }
            Ok(())
        })
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let inner = self.lock();
        if inner.offline {
            return Err(RemoteError::Offline);
        }
        Ok(inner.docs.clone())
    }

    async fn batch_delete(&self, ids: &[AppointmentId]) -> Result<(), RemoteError> {
        self.mutate(|inner| {
            if !inner.batch_supported {
                return Err(RemoteError::Unsupported);
            }
            if let Some(id) = ids.iter().find(|id| inner.failing_deletes.contains(*id)) {
                return Err(RemoteError::PermissionDenied(format!("delete of {} rejected", id)));
            }
            inner.docs.retain(|d| !ids.contains(&d.id));
            Ok(())
        })
    }

    async fn subscribe(&self, on_change: SnapshotCallback) -> Result<Unsubscribe, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (key, docs) = {
            let mut inner = self.lock();
            if inner.offline {
                return Err(RemoteError::Offline);
            }
            let key = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner.subscribers.push((key, Arc::clone(&on_change)));
            (key, inner.docs.clone())
        };
        on_change(Ok(docs));

        let inner = Arc::clone(&self.inner);
        Ok(Unsubscribe::new(move || {
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.subscribers.retain(|(k, _)| *k != key);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(client: &str) -> AppointmentFields {
        AppointmentFields::new(client, "Porter", "Advisor", "9:00")
    }

    #[tokio::test]
    async fn clones_share_documents() {
        let desk_a = MemoryCollection::new();
        let desk_b = desk_a.clone();
        let id = desk_a.add(&fields("A"), Status::Pending).await.unwrap();
        let seen = desk_b.list_all().await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, id);
    }

    #[tokio::test]
    async fn list_keeps_insertion_order() {
        let c = MemoryCollection::new();
        for name in ["first", "second", "third"] {
            c.add(&fields(name), Status::Pending).await.unwrap();
        }
        let names: Vec<String> = c.list_all().await.unwrap().into_iter().map(|a| a.client).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn subscriber_gets_initial_and_later_snapshots() {
        let c = MemoryCollection::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = c
            .subscribe(Arc::new(move |snap: Result<Vec<Appointment>, RemoteError>| {
                sink.lock().unwrap().push(snap.map(|docs| docs.len()));
            }))
            .await
            .unwrap();
        c.add(&fields("A"), Status::Pending).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Ok(0), Ok(1)]);

        handle.unsubscribe();
        assert_eq!(c.subscriber_count(), 0);
        c.add(&fields("B"), Status::Pending).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn batch_delete_is_all_or_nothing() {
        let c = MemoryCollection::new();
        let a = c.add(&fields("A"), Status::Pending).await.unwrap();
        let b = c.add(&fields("B"), Status::Pending).await.unwrap();
        c.fail_deletes_for(&b);
        let err = c.batch_delete(&[a.clone(), b.clone()]).await.unwrap_err();
        assert!(matches!(err, RemoteError::PermissionDenied(_)));
        assert_eq!(c.documents().len(), 2);
    }

    #[tokio::test]
    async fn offline_rejects_calls() {
        let c = MemoryCollection::new();
        c.set_offline(true);
        assert_eq!(
            c.add(&fields("A"), Status::Pending).await,
            Err(RemoteError::Offline)
        );
        c.set_offline(false);
        assert!(c.add(&fields("A"), Status::Pending).await.is_ok());
    }

    #[tokio::test]
    async fn update_of_missing_document_is_not_found() {
        let c = MemoryCollection::new();
        let missing = AppointmentId::new("nope");
        assert_eq!(
            c.update_status(&missing, Status::Helped).await,
            Err(RemoteError::NotFound(missing))
        );
    }
}
