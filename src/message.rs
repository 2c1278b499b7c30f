use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::board::BoardError;
use crate::board::popup::PointerTarget;
use crate::board::store::SyncMode;
use crate::config::Backend;
use crate::core::appointment::{Appointment, AppointmentId, Field};
use crate::core::status::{MenuAction, StatusSet};
use crate::sync::Unsubscribe;
use crate::sync::auth::{AuthError, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveView {
    Board,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    ProjectId,
    ApiKey,
    Collection,
    OrderBy,
    PollInterval,
}

/// Carries a live subscription handle from the attach task back to the app.
#[derive(Clone)]
pub struct Attached(Arc<Mutex<Option<Unsubscribe>>>);

impl Attached {
    pub fn new(handle: Unsubscribe) -> Self {
        Self(Arc::new(Mutex::new(Some(handle))))
    }

    pub fn take(&self) -> Option<Unsubscribe> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl fmt::Debug for Attached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Attached")
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    // Navigation
    ShowBoard,
    OpenSettings,

    // Account
    LoginEmailChanged(String),
    LoginPasswordChanged(String),
    SignIn,
    Register,
    SessionRestored(Result<Option<Session>, String>),
    SignedIn(Result<Session, String>),
    SignOut,
    SignedOut(Result<(), String>),
    /// Periodic look at the id token's expiry.
    CheckSession,
    SessionRefreshed(Result<Session, AuthError>),
    SessionSaved(Result<(), String>),

    // Board sync
    Reload,
    Loaded(u64, Result<usize, BoardError>),
    Attached(u64, Result<Attached, BoardError>),
    Tick,

    // Pointer routing
    /// A press on a surface that is not itself a button.
    Pressed(PointerTarget),
    RowPressed(AppointmentId),
    RowAction(AppointmentId, MenuAction),
    StatusApplied(AppointmentId, Result<(), BoardError>),
    RowRemoved(AppointmentId, Result<(), BoardError>),

    // End of day
    RequestEndDay,
    DecideEndDay(bool),
    EndDayCleared(Result<usize, BoardError>),

    // New appointment drawer
    OpenForm,
    CloseForm,
    FormField(Field, String),
    SubmitForm,
    Created(Result<Appointment, BoardError>),

    // Theme
    ToggleTheme,

    // Settings
    SetBackend(Backend),
    SetSettingsField(SettingsField, String),
    SetSyncMode(SyncMode),
    SetStatusSet(StatusSet),
    ToggleDebugLogging,
    ApplySettings,

    DismissNotice,
}
