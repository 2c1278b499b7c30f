pub mod auth;
pub mod firestore;
pub mod keyring;
pub mod memory;

use std::future::Future;
use std::sync::Arc;

use crate::core::appointment::{Appointment, AppointmentFields, AppointmentId};
use crate::core::status::Status;
use firestore::FirestoreCollection;
use memory::MemoryCollection;

/// Failure reported by a remote collection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("no appointment with id {0}")]
    NotFound(AppointmentId),
    #[error("remote returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("operation not supported by this collection")]
    Unsupported,
    #[error("collection is offline")]
    Offline,
}

/// Receives the complete collection after every change, or the reason a
/// snapshot could not be read.
pub type SnapshotCallback = Arc<dyn Fn(Result<Vec<Appointment>, RemoteError>) + Send + Sync>;

/// Releases a subscription. Runs its release action exactly once, either on
/// [`Unsubscribe::unsubscribe`] or when dropped.
pub struct Unsubscribe {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Unsubscribe {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// A hosted collection of appointment documents.
pub trait RemoteCollection: Send + Sync + 'static {
    /// Creates one document and returns its generated id.
    fn add(
        &self,
        fields: &AppointmentFields,
        status: Status,
    ) -> impl Future<Output = Result<AppointmentId, RemoteError>> + Send;

    fn update_status(
        &self,
        id: &AppointmentId,
        status: Status,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn delete(&self, id: &AppointmentId) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Full snapshot read, in the collection's own order.
    fn list_all(&self) -> impl Future<Output = Result<Vec<Appointment>, RemoteError>> + Send;

    /// Deletes every id or none of them. Collections without atomic batches
    /// report [`RemoteError::Unsupported`].
    fn batch_delete(
        &self,
        ids: &[AppointmentId],
    ) -> impl Future<Output = Result<(), RemoteError>> + Send {
        let _ = ids;
        async { Err(RemoteError::Unsupported) }
    }

    /// Pushes the full collection to `on_change` on every change, starting
    /// with the current contents.
    fn subscribe(
        &self,
        on_change: SnapshotCallback,
    ) -> impl Future<Output = Result<Unsubscribe, RemoteError>> + Send;
}

/// Collection selected by configuration.
#[derive(Clone)]
pub enum AnyCollection {
    Firestore(FirestoreCollection),
    Memory(MemoryCollection),
}

impl AnyCollection {
    /// Hands a refreshed id token to the remote client. The in-process
    /// collection has no accounts.
    pub fn set_id_token(&self, id_token: &str) {
        if let Self::Firestore(c) = self {
            c.set_id_token(id_token);
        }
    }
}

impl RemoteCollection for AnyCollection {
    async fn add(&self, fields: &AppointmentFields, status: Status) -> Result<AppointmentId, RemoteError> {
        match self {
            Self::Firestore(c) => c.add(fields, status).await,
            Self::Memory(c) => c.add(fields, status).await,
        }
    }

    async fn update_status(&self, id: &AppointmentId, status: Status) -> Result<(), RemoteError> {
        match self {
            Self::Firestore(c) => c.update_status(id, status).await,
            Self::Memory(c) => c.update_status(id, status).await,
        }
    }

    async fn delete(&self, id: &AppointmentId) -> Result<(), RemoteError> {
        match self {
            Self::Firestore(c) => c.delete(id).await,
            Self::Memory(c) => c.delete(id).await,
        }
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, RemoteError> {
        match self {
            Self::Firestore(c) => c.list_all().await,
            Self::Memory(c) => c.list_all().await,
        }
    }

    async fn batch_delete(&self, ids: &[AppointmentId]) -> Result<(), RemoteError> {
        match self {
            Self::Firestore(c) => c.batch_delete(ids).await,
            Self::Memory(c) => c.batch_delete(ids).await,
        }
    }

    async fn subscribe(&self, on_change: SnapshotCallback) -> Result<Unsubscribe, RemoteError> {
        match self {
            Self::Firestore(c) => c.subscribe(on_change).await,
            Self::Memory(c) => c.subscribe(on_change).await,
        }
    }
}

/// Current sync status displayed in the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Syncing,
    Error(String),
    LastSynced(String), // formatted timestamp
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl SyncStatus {
    pub fn synced_now() -> Self {
        Self::LastSynced(chrono::Local::now().format("%H:%M:%S").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn unsubscribe_releases_once_when_called() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = Unsubscribe::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        handle.unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_releases_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        {
            let _handle = Unsubscribe::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remote_error_messages() {
        let err = RemoteError::Status {
            status: 429,
            message: "Quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "remote returned 429: Quota exceeded");
        assert_eq!(
            RemoteError::NotFound(AppointmentId::new("x1")).to_string(),
            "no appointment with id x1"
        );
    }
}
