use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use super::BoardError;
use crate::core::appointment::{Appointment, AppointmentFields, AppointmentId};
use crate::core::status::Status;
use crate::sync::{RemoteCollection, RemoteError, SnapshotCallback, Unsubscribe};

/// How the local mirror follows the remote collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Read once; confirmed local writes are applied to the mirror directly.
    Once,
    /// Standing subscription; the mirror only changes when a snapshot arrives.
    #[default]
    Live,
}

/// Delivered to the `attach` callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUpdate {
    Snapshot(Vec<Appointment>),
    Failed(BoardError),
}

#[derive(Default)]
struct Mirror {
    rows: Vec<Appointment>,
    revision: u64,
}

impl Mirror {
    fn replace(&mut self, rows: Vec<Appointment>) {
        let mut seen = HashSet::new();
        self.rows = rows.into_iter().filter(|a| seen.insert(a.id.clone())).collect();
        self.revision += 1;
    }

    fn upsert(&mut self, appointment: Appointment) {
        match self.rows.iter_mut().find(|a| a.id == appointment.id) {
            Some(existing) => *existing = appointment,
            None => self.rows.push(appointment),
        }
        self.revision += 1;
    }

    fn set_status(&mut self, id: &AppointmentId, status: Status) {
        if let Some(row) = self.rows.iter_mut().find(|a| a.id == *id) {
            row.status = status;
            self.revision += 1;
        }
    }

    fn remove(&mut self, ids: &[AppointmentId]) {
        self.rows.retain(|a| !ids.contains(&a.id));
        self.revision += 1;
    }
}

/// Local mirror of the remote appointment collection.
///
/// Cloning is cheap and every clone shares the same mirror, so a clone can be
/// moved into a background task while the UI keeps reading from the original.
pub struct AppointmentStore<C> {
    client: Arc<C>,
    mode: SyncMode,
    mirror: Arc<Mutex<Mirror>>,
}

impl<C> Clone for AppointmentStore<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            mode: self.mode,
            mirror: Arc::clone(&self.mirror),
        }
    }
}

impl<C: RemoteCollection> AppointmentStore<C> {
    pub fn new(client: Arc<C>, mode: SyncMode) -> Self {
        Self {
            client,
            mode,
            mirror: Arc::new(Mutex::new(Mirror::default())),
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Current rows in remote order.
    pub fn rows(&self) -> Vec<Appointment> {
        self.lock().rows.clone()
    }

    pub fn get(&self, id: &AppointmentId) -> Option<Appointment> {
        self.lock().rows.iter().find(|a| a.id == *id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().rows.is_empty()
    }

    /// Bumped whenever the mirror changes.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    fn lock(&self) -> MutexGuard<'_, Mirror> {
        self.mirror.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the mirror with one full read of the collection.
    pub async fn load(&self) -> Result<Vec<Appointment>, BoardError> {
        let rows = self.client.list_all().await.map_err(|e| {
            log::error!("Failed to load appointments: {}", e);
            BoardError::RemoteRead(e)
        })?;
        log::info!("Loaded {} appointments", rows.len());
        let mut mirror = self.lock();
        mirror.replace(rows);
        Ok(mirror.rows.clone())
    }

    /// Subscribes to the collection. Every snapshot replaces the mirror and is
    /// passed to `on_update`; a failed snapshot keeps the last good mirror.
    ///
    /// Dropping or calling the returned handle detaches; callbacks that race
    /// with the detach are ignored.
    pub async fn attach<F>(&self, on_update: F) -> Result<Unsubscribe, BoardError>
    where
        F: Fn(StoreUpdate) + Send + Sync + 'static,
    {
        if self.mode != SyncMode::Live {
            return Err(BoardError::NotLive);
        }

        let listening = Arc::new(AtomicBool::new(true));
        let mirror = Arc::clone(&self.mirror);
        let flag = Arc::clone(&listening);
        let callback: SnapshotCallback = Arc::new(move |snapshot: Result<Vec<Appointment>, RemoteError>| {
            if !flag.load(Ordering::SeqCst) {
                return;
            }
            match snapshot {
                Ok(rows) => {
                    let rows = {
                        let mut mirror = mirror.lock().unwrap_or_else(PoisonError::into_inner);
                        mirror.replace(rows);
                        mirror.rows.clone()
                    };
                    log::debug!("Snapshot with {} appointments", rows.len());
                    on_update(StoreUpdate::Snapshot(rows));
                }
                Err(e) => {
                    log::error!("Appointment subscription failed: {}", e);
                    on_update(StoreUpdate::Failed(BoardError::RemoteRead(e)));
                }
            }
        });

        let subscription = self.client.subscribe(callback).await.map_err(|e| {
            log::error!("Failed to subscribe to appointments: {}", e);
            BoardError::RemoteRead(e)
        })?;
        log::info!("Attached live appointment subscription");

        Ok(Unsubscribe::new(move || {
            listening.store(false, Ordering::SeqCst);
            subscription.unsubscribe();
            log::info!("Detached live appointment subscription");
        }))
    }

    /// Validates and creates a pending appointment.
    pub async fn create(&self, fields: AppointmentFields) -> Result<Appointment, BoardError> {
        let fields = fields.validated()?;
        let id = self
            .client
            .add(&fields, Status::Pending)
            .await
            .map_err(|e| write_error("add appointment", e))?;
        let appointment = Appointment::new(id, fields);
        if self.mode == SyncMode::Once {
            self.lock().upsert(appointment.clone());
        }
        Ok(appointment)
    }

    pub async fn set_status(&self, id: &AppointmentId, status: Status) -> Result<(), BoardError> {
        self.client
            .update_status(id, status)
            .await
            .map_err(|e| write_error("update status", e))?;
        if self.mode == SyncMode::Once {
            self.lock().set_status(id, status);
        }
        Ok(())
    }

    pub async fn remove(&self, id: &AppointmentId) -> Result<(), BoardError> {
        self.client
            .delete(id)
            .await
            .map_err(|e| write_error("delete appointment", e))?;
        if self.mode == SyncMode::Once {
            self.lock().remove(std::slice::from_ref(id));
        }
        Ok(())
    }

    /// Deletes every appointment currently in the collection and returns how
    /// many were removed.
    ///
    /// Uses one atomic batch; the mirror is cleared only after it commits.
    /// Collections without batches get independent deletes, and any that fail
    /// stay on the board and are reported in [`BoardError::PartialClear`].
    pub async fn clear_all(&self) -> Result<usize, BoardError> {
        let ids: Vec<AppointmentId> = self
            .client
            .list_all()
            .await
            .map_err(|e| {
                log::error!("Failed to list appointments for end of day: {}", e);
                BoardError::RemoteRead(e)
            })?
            .into_iter()
            .map(|a| a.id)
            .collect();

        match self.client.batch_delete(&ids).await {
            Ok(()) => {
                if self.mode == SyncMode::Once {
                    self.lock().replace(Vec::new());
                }
                log::info!("End of day: removed {} appointments", ids.len());
                Ok(ids.len())
            }
            Err(RemoteError::Unsupported) => self.clear_each(ids).await,
            Err(e) => Err(write_error("end the day", e)),
        }
    }

    async fn clear_each(&self, ids: Vec<AppointmentId>) -> Result<usize, BoardError> {
        let results = join_all(ids.iter().map(|id| self.client.delete(id))).await;

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(()) => deleted.push(id.clone()),
                Err(e) => {
                    log::error!("End of day: failed to delete {}: {}", id, e);
                    failed.push(id.clone());
                }
            }
        }

        if self.mode == SyncMode::Once {
            self.lock().remove(&deleted);
        }

        if failed.is_empty() {
            log::info!("End of day: removed {} appointments", deleted.len());
            Ok(deleted.len())
        } else {
            Err(BoardError::PartialClear {
                failed,
                total: ids.len(),
            })
        }
    }
}

fn write_error(action: &str, e: RemoteError) -> BoardError {
    log::error!("Failed to {}: {}", action, e);
    BoardError::RemoteWrite(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::appointment::Field;
    use crate::sync::memory::MemoryCollection;

    fn fields(client: &str) -> AppointmentFields {
        AppointmentFields::new(client, "B", "C", "9:00")
    }

    fn once_store() -> (MemoryCollection, AppointmentStore<MemoryCollection>) {
        let remote = MemoryCollection::new();
        let store = AppointmentStore::new(Arc::new(remote.clone()), SyncMode::Once);
        (remote, store)
    }

    async fn live_store() -> (MemoryCollection, AppointmentStore<MemoryCollection>, Unsubscribe) {
        let remote = MemoryCollection::new();
        let store = AppointmentStore::new(Arc::new(remote.clone()), SyncMode::Live);
        let handle = store.attach(|_| {}).await.unwrap();
        (remote, store, handle)
    }

    #[tokio::test]
    async fn creates_are_pending_with_unique_ids() {
        let (_, store) = once_store();
        for name in ["A", "B", "C", "D"] {
            store.create(fields(name)).await.unwrap();
        }
        let rows = store.rows();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|a| a.status == Status::Pending));
        let ids: HashSet<_> = rows.iter().map(|a| a.id.clone()).collect();
        assert_eq!(ids.len(), 4);
    }

    #[tokio::test]
    async fn identical_creates_are_not_deduplicated() {
        let (_, store) = once_store();
        let a = store.create(fields("Same")).await.unwrap();
        let b = store.create(fields("Same")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn blank_field_makes_no_remote_call() {
        let (remote, store) = once_store();
        store.create(fields("A")).await.unwrap();
        let calls = remote.calls();

        let err = store
            .create(AppointmentFields::new("X", "  ", "C", "10:00"))
            .await
            .unwrap_err();
        match err {
            BoardError::Validation(v) => assert_eq!(v.blank, vec![Field::Porter]),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(remote.calls(), calls);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn once_mode_applies_confirmed_status() {
        let (_, store) = once_store();
        let a = store.create(fields("A")).await.unwrap();
        let b = store.create(fields("B")).await.unwrap();
        store.set_status(&a.id, Status::Helped).await.unwrap();
        assert_eq!(store.get(&a.id).unwrap().status, Status::Helped);
        assert_eq!(store.get(&b.id).unwrap().status, Status::Pending);
    }

    #[tokio::test]
    async fn failed_status_update_leaves_local_status() {
        let (remote, store) = once_store();
        let a = store.create(fields("A")).await.unwrap();
        remote.set_offline(true);
        let err = store.set_status(&a.id, Status::Shipped).await.unwrap_err();
        assert_eq!(err, BoardError::RemoteWrite(RemoteError::Offline));
        assert_eq!(store.get(&a.id).unwrap().status, Status::Pending);
    }

    #[tokio::test]
    async fn load_replaces_mirror_and_keeps_it_on_failure() {
        let remote = MemoryCollection::new();
        let other_desk = remote.clone();
        other_desk.add(&fields("A"), Status::Shipped).await.unwrap();
        let store = AppointmentStore::new(Arc::new(remote.clone()), SyncMode::Once);

        assert_eq!(store.load().await.unwrap().len(), 1);
        remote.set_offline(true);
        assert!(matches!(store.load().await, Err(BoardError::RemoteRead(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn attach_requires_live_mode() {
        let (_, store) = once_store();
        assert!(matches!(store.attach(|_| {}).await, Err(BoardError::NotLive)));
    }

    #[tokio::test]
    async fn live_mode_waits_for_snapshots() {
        let (remote, store, _handle) = live_store().await;
        let a = store.create(fields("A")).await.unwrap();
        // The in-memory collection notifies before `add` returns.
        assert_eq!(store.rows(), vec![a.clone()]);

        let other_desk = remote.clone();
        other_desk.update_status(&a.id, Status::Helped).await.unwrap();
        assert_eq!(store.get(&a.id).unwrap().status, Status::Helped);
    }

    #[tokio::test]
    async fn live_mirror_survives_subscription_failure() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        let remote = MemoryCollection::new();
        let store = AppointmentStore::new(Arc::new(remote.clone()), SyncMode::Live);
        let _handle = store
            .attach(move |update| sink.lock().unwrap().push(update))
            .await
            .unwrap();
        store.create(fields("A")).await.unwrap();

        remote.set_offline(true);
        assert_eq!(store.len(), 1);
        let last = updates.lock().unwrap().last().cloned();
        assert_eq!(
            last,
            Some(StoreUpdate::Failed(BoardError::RemoteRead(RemoteError::Offline)))
        );
    }

    #[tokio::test]
    async fn detached_store_stops_following() {
        let (remote, store, handle) = live_store().await;
        handle.unsubscribe();
        assert_eq!(remote.subscriber_count(), 0);
        remote.clone().add(&fields("A"), Status::Pending).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_locally_in_once_mode() {
        let (remote, store) = once_store();
        let a = store.create(fields("A")).await.unwrap();
        store.remove(&a.id).await.unwrap();
        assert!(store.is_empty());
        assert!(remote.documents().is_empty());
    }

    #[tokio::test]
    async fn clear_all_empties_mirror_and_remote() {
        let (remote, store) = once_store();
        for name in ["A", "B", "C"] {
            store.create(fields(name)).await.unwrap();
        }
        assert_eq!(store.clear_all().await.unwrap(), 3);
        assert!(store.is_empty());
        assert!(remote.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_batch_clears_nothing() {
        let (remote, store) = once_store();
        let a = store.create(fields("A")).await.unwrap();
        store.create(fields("B")).await.unwrap();
        remote.fail_deletes_for(&a.id);
        assert!(matches!(store.clear_all().await, Err(BoardError::RemoteWrite(_))));
        assert_eq!(store.len(), 2);
        assert_eq!(remote.documents().len(), 2);
    }

    #[tokio::test]
    async fn per_id_fallback_reports_failures_and_keeps_those_rows() {
        let remote = MemoryCollection::without_batch_delete();
        let store = AppointmentStore::new(Arc::new(remote.clone()), SyncMode::Once);
        let a = store.create(fields("A")).await.unwrap();
        let b = store.create(fields("B")).await.unwrap();
        remote.fail_deletes_for(&b.id);

        let err = store.clear_all().await.unwrap_err();
        assert_eq!(
            err,
            BoardError::PartialClear {
                failed: vec![b.id.clone()],
                total: 2
            }
        );
        assert!(store.get(&a.id).is_none());
        assert!(store.get(&b.id).is_some());
        assert_eq!(remote.documents().len(), 1);
    }

    #[tokio::test]
    async fn revision_moves_on_change() {
        let (_, store) = once_store();
        let before = store.revision();
        store.create(fields("A")).await.unwrap();
        assert!(store.revision() > before);
    }

    /// Serves the same listing every time, repeated ids included.
    struct RepeatingListing(Vec<Appointment>);

    impl RemoteCollection for RepeatingListing {
        async fn add(&self, _: &AppointmentFields, _: Status) -> Result<AppointmentId, RemoteError> {
            Err(RemoteError::Unsupported)
        }

        async fn update_status(&self, _: &AppointmentId, _: Status) -> Result<(), RemoteError> {
            Err(RemoteError::Unsupported)
        }

        async fn delete(&self, _: &AppointmentId) -> Result<(), RemoteError> {
            Err(RemoteError::Unsupported)
        }

        async fn list_all(&self) -> Result<Vec<Appointment>, RemoteError> {
            Ok(self.0.clone())
        }

        async fn subscribe(&self, on_change: SnapshotCallback) -> Result<Unsubscribe, RemoteError> {
            on_change(Ok(self.0.clone()));
            Ok(Unsubscribe::new(|| {}))
        }
    }

    fn repeated_listing() -> RepeatingListing {
        let first = Appointment::new(AppointmentId::new("a"), fields("First"));
        let again = Appointment::with_status(AppointmentId::new("a"), fields("Again"), Status::Helped);
        let other = Appointment::new(AppointmentId::new("b"), fields("Other"));
        RepeatingListing(vec![first, again, other])
    }

    #[tokio::test]
    async fn snapshot_with_repeated_id_keeps_one_row() {
        let store = AppointmentStore::new(Arc::new(repeated_listing()), SyncMode::Live);
        let _handle = store.attach(|_| {}).await.unwrap();

        let rows = store.rows();
        assert_eq!(rows.len(), 2);
        let a = store.get(&AppointmentId::new("a")).unwrap();
        assert_eq!(a.client, "First");
        assert_eq!(a.status, Status::Pending);
    }

    #[tokio::test]
    async fn load_with_repeated_id_keeps_one_row() {
        let store = AppointmentStore::new(Arc::new(repeated_listing()), SyncMode::Once);
        let rows = store.load().await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
