pub mod end_day;
pub mod form;
pub mod popup;
pub mod store;

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::appointment::{Appointment, AppointmentId, ValidationError};
use crate::core::status::{MenuAction, Rgb, Status, StatusSet, Theme, palette};
use crate::sync::{RemoteCollection, RemoteError, Unsubscribe};
use end_day::EndDayController;
use form::AppointmentForm;
use popup::{PointerTarget, PopupController};
use store::{AppointmentStore, StoreUpdate, SyncMode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("could not save changes: {0}")]
    RemoteWrite(RemoteError),
    #[error("could not load appointments: {0}")]
    RemoteRead(RemoteError),
    #[error("{} of {total} appointments could not be deleted", count(.failed))]
    PartialClear {
        failed: Vec<AppointmentId>,
        total: usize,
    },
    #[error("store is not configured for live sync")]
    NotLive,
    #[error("status {0} is not offered on this board")]
    StatusNotOffered(Status),
    #[error("appointment {0} is still being saved")]
    RowBusy(AppointmentId),
}

fn count(ids: &[AppointmentId]) -> usize {
    ids.len()
}

/// Per-board settings taken from the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardOptions {
    pub sync_mode: SyncMode,
    pub status_set: StatusSet,
    pub theme: Theme,
}

/// One appointment board: the store plus the UI state around it.
///
/// The front end drives the same pieces message by message; this type runs
/// each user action end to end.
pub struct Board<C: RemoteCollection> {
    store: AppointmentStore<C>,
    status_set: StatusSet,
    theme: Theme,
    popup: PopupController,
    end_day: EndDayController,
    form: AppointmentForm,
    subscription: Option<Unsubscribe>,
    /// Rows with a status or delete request in flight.
    busy: HashSet<AppointmentId>,
}

impl<C: RemoteCollection> Board<C> {
    pub fn new(client: Arc<C>, options: BoardOptions) -> Self {
        Self {
            store: AppointmentStore::new(client, options.sync_mode),
            status_set: options.status_set,
            theme: options.theme,
            popup: PopupController::default(),
            end_day: EndDayController::default(),
            form: AppointmentForm::default(),
            subscription: None,
            busy: HashSet::new(),
        }
    }

    /// Fills the board: one read in once mode, a standing subscription in
    /// live mode. Opening an already open board is a no-op.
    pub async fn open(&mut self) -> Result<(), BoardError> {
        match self.store.mode() {
            SyncMode::Once => {
                self.store.load().await?;
            }
            SyncMode::Live => {
                if self.subscription.is_none() {
                    let handle = self.store.attach(|update: StoreUpdate| {
                        if let StoreUpdate::Failed(e) = update {
                            log::warn!("Board keeps last snapshot: {}", e);
                        }
                    })
                    .await?;
                    self.subscription = Some(handle);
                }
            }
        }
        Ok(())
    }

    /// Stops following the remote collection.
    pub fn close(&mut self) {
        if let Some(handle) = self.subscription.take() {
            handle.unsubscribe();
        }
    }

    /// Keeps a subscription started outside [`Board::open`], releasing any
    /// previous one.
    pub fn adopt_subscription(&mut self, handle: Unsubscribe) {
        self.close();
        self.subscription = Some(handle);
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn store(&self) -> &AppointmentStore<C> {
        &self.store
    }

    pub fn rows(&self) -> Vec<Appointment> {
        self.store.rows()
    }

    pub fn status_set(&self) -> StatusSet {
        self.status_set
    }

    pub fn menu_actions(&self) -> Vec<MenuAction> {
        self.status_set.menu_actions()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
    }

    pub fn row_color(&self, appointment: &Appointment) -> Rgb {
        palette(appointment.status, self.theme)
    }

    pub fn popup(&self) -> &PopupController {
        &self.popup
    }

    pub fn end_day(&self) -> &EndDayController {
        &self.end_day
    }

    pub fn form(&self) -> &AppointmentForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut AppointmentForm {
        &mut self.form
    }

    pub fn toggle_popup(&mut self, id: &AppointmentId) {
        self.popup.toggle(id);
    }

    /// Runs the outside-press check for the row menu and the end-of-day
    /// dialog independently.
    pub fn dismiss_if_outside(&mut self, target: &PointerTarget) {
        self.popup.dismiss_if_outside(target);
        self.end_day.dismiss_if_outside(target);
    }

    /// Drops UI state that points at rows no longer on the board.
    pub fn sync_ui_state(&mut self) {
        let rows = self.store.rows();
        self.popup.retain(&rows);
    }

    pub fn check_status(&self, status: Status) -> Result<(), BoardError> {
        if self.status_set.contains(status) {
            Ok(())
        } else {
            Err(BoardError::StatusNotOffered(status))
        }
    }

    /// Marks a row as having a request in flight. Other rows stay free; a
    /// second request for the same row is refused until the first settles.
    pub fn begin_row_action(&mut self, id: &AppointmentId) -> Result<(), BoardError> {
        if self.busy.insert(id.clone()) {
            Ok(())
        } else {
            Err(BoardError::RowBusy(id.clone()))
        }
    }

    pub fn is_row_busy(&self, id: &AppointmentId) -> bool {
        self.busy.contains(id)
    }

    /// Records the outcome of a status change. The menu closes only once the
    /// remote write is confirmed.
    pub fn status_applied(&mut self, id: &AppointmentId, result: &Result<(), BoardError>) {
        self.busy.remove(id);
        if result.is_ok() && self.popup.is_open(id) {
            self.popup.close();
        }
    }

    pub async fn apply_status(&mut self, id: &AppointmentId, status: Status) -> Result<(), BoardError> {
        self.check_status(status)?;
        self.begin_row_action(id)?;
        let result = self.store.set_status(id, status).await;
        self.status_applied(id, &result);
        result
    }

    pub async fn remove(&mut self, id: &AppointmentId) -> Result<(), BoardError> {
        self.begin_row_action(id)?;
        let result = self.store.remove(id).await;
        self.removed(id, &result);
        result
    }

    /// Records the outcome of a row delete.
    pub fn removed(&mut self, id: &AppointmentId, result: &Result<(), BoardError>) {
        self.busy.remove(id);
        if result.is_ok() && self.popup.is_open(id) {
            self.popup.close();
        }
    }

    /// Runs a menu entry against a row.
    pub async fn apply_action(&mut self, id: &AppointmentId, action: MenuAction) -> Result<(), BoardError> {
        match action {
            MenuAction::SetStatus(status) => self.apply_status(id, status).await,
            MenuAction::Delete => self.remove(id).await,
        }
    }

    pub fn request_end_day(&mut self) {
        self.popup.close();
        self.end_day.request();
    }

    /// Answers the end-of-day dialog. On accept the dialog stays up until the
    /// bulk delete settles. Returns how many appointments were removed.
    pub async fn confirm_end_day(&mut self, accept: bool) -> Result<usize, BoardError> {
        if !self.decide_end_day(accept) {
            return Ok(0);
        }
        let result = self.store.clear_all().await;
        self.end_day_settled();
        result
    }

    /// Answers the dialog without running the delete. Returns true when the
    /// caller must run [`AppointmentStore::clear_all`] and then call
    /// [`Board::end_day_settled`].
    pub fn decide_end_day(&mut self, accept: bool) -> bool {
        self.end_day.decide(accept)
    }

    pub fn end_day_settled(&mut self) {
        self.end_day.finish();
        self.sync_ui_state();
    }

    /// Validates the form and creates the appointment. Input is kept when the
    /// remote write fails.
    pub async fn submit_form(&mut self) -> Result<Appointment, BoardError> {
        let fields = self.form.validate()?;
        let appointment = self.store.create(fields).await?;
        self.form.complete();
        Ok(appointment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::appointment::{AppointmentFields, Field};
    use crate::sync::memory::MemoryCollection;

    fn new_board(remote: &MemoryCollection, sync_mode: SyncMode) -> Board<MemoryCollection> {
        Board::new(
            Arc::new(remote.clone()),
            BoardOptions {
                sync_mode,
                ..BoardOptions::default()
            },
        )
    }

    fn fill(board: &mut Board<MemoryCollection>, values: [&str; 4]) {
        board.form_mut().open();
        for (field, value) in Field::ALL.iter().zip(values) {
            board.form_mut().set_field(*field, value);
        }
    }

    #[tokio::test]
    async fn create_help_remove_scenario() {
        for mode in [SyncMode::Once, SyncMode::Live] {
            let remote = MemoryCollection::new();
            let mut board = new_board(&remote, mode);
            board.open().await.unwrap();

            fill(&mut board, ["A", "B", "C", "9:00"]);
            let appt = board.submit_form().await.unwrap();
            assert!(!board.form().is_visible());
            let rows = board.rows();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].status, Status::Pending);
            assert_eq!(rows[0].fields(), AppointmentFields::new("A", "B", "C", "9:00"));

            board.toggle_popup(&appt.id);
            board.apply_status(&appt.id, Status::Helped).await.unwrap();
            assert_eq!(board.store().get(&appt.id).unwrap().status, Status::Helped);
            assert_eq!(board.popup().open_id(), None);

            board.remove(&appt.id).await.unwrap();
            assert!(board.rows().is_empty());
        }
    }

    #[tokio::test]
    async fn failed_submit_keeps_input() {
        let remote = MemoryCollection::new();
        let mut board = new_board(&remote, SyncMode::Once);
        fill(&mut board, ["A", "B", "C", "9:00"]);
        remote.set_offline(true);

        assert!(matches!(board.submit_form().await, Err(BoardError::RemoteWrite(_))));
        assert!(board.form().is_visible());
        assert_eq!(board.form().value(Field::Time), "9:00");
    }

    #[tokio::test]
    async fn blank_submit_never_reaches_remote() {
        let remote = MemoryCollection::new();
        let mut board = new_board(&remote, SyncMode::Once);
        fill(&mut board, ["A", "", "C", "9:00"]);
        assert!(matches!(board.submit_form().await, Err(BoardError::Validation(_))));
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn failed_status_keeps_menu_open() {
        let remote = MemoryCollection::new();
        let mut board = new_board(&remote, SyncMode::Once);
        fill(&mut board, ["A", "B", "C", "9:00"]);
        let appt = board.submit_form().await.unwrap();
        board.toggle_popup(&appt.id);
        remote.set_offline(true);

        assert!(board.apply_status(&appt.id, Status::Shipped).await.is_err());
        assert!(board.popup().is_open(&appt.id));
        assert_eq!(board.store().get(&appt.id).unwrap().status, Status::Pending);
    }

    #[tokio::test]
    async fn status_outside_set_is_rejected_locally() {
        let remote = MemoryCollection::new();
        let mut board = new_board(&remote, SyncMode::Once);
        fill(&mut board, ["A", "B", "C", "9:00"]);
        let appt = board.submit_form().await.unwrap();
        let calls = remote.calls();
        assert_eq!(
            board.apply_status(&appt.id, Status::Escalated).await,
            Err(BoardError::StatusNotOffered(Status::Escalated))
        );
        assert_eq!(remote.calls(), calls);
    }

    #[tokio::test]
    async fn delete_action_removes_row() {
        let remote = MemoryCollection::new();
        let mut board = new_board(&remote, SyncMode::Live);
        board.open().await.unwrap();
        fill(&mut board, ["A", "B", "C", "9:00"]);
        let appt = board.submit_form().await.unwrap();
        board.toggle_popup(&appt.id);
        board.apply_action(&appt.id, MenuAction::Delete).await.unwrap();
        assert!(board.rows().is_empty());
        assert_eq!(board.popup().open_id(), None);
    }

    #[tokio::test]
    async fn confirmed_end_day_clears_everything() {
        let remote = MemoryCollection::new();
        let mut board = new_board(&remote, SyncMode::Live);
        board.open().await.unwrap();
        let mut prior = Vec::new();
        for client in ["A", "B", "C"] {
            fill(&mut board, [client, "P", "Adv", "9:00"]);
            prior.push(board.submit_form().await.unwrap().id);
        }

        board.request_end_day();
        assert!(board.end_day().is_confirming());
        assert_eq!(board.confirm_end_day(true).await.unwrap(), 3);
        assert!(!board.end_day().is_confirming());
        assert!(board.rows().is_empty());
        let remaining = remote.list_all().await.unwrap();
        assert!(remaining.iter().all(|a| !prior.contains(&a.id)));
    }

    #[tokio::test]
    async fn cancelled_end_day_changes_nothing() {
        let remote = MemoryCollection::new();
        let mut board = new_board(&remote, SyncMode::Once);
        fill(&mut board, ["A", "B", "C", "9:00"]);
        board.submit_form().await.unwrap();
        let rows_before = board.rows();
        let docs_before = remote.documents();
        let calls = remote.calls();

        board.request_end_day();
        assert_eq!(board.confirm_end_day(false).await.unwrap(), 0);
        assert_eq!(board.rows(), rows_before);
        assert_eq!(remote.documents(), docs_before);
        assert_eq!(remote.calls(), calls);
        assert!(!board.end_day().is_confirming());
    }

    #[tokio::test]
    async fn outside_press_closes_menu_and_dialog_independently() {
        let remote = MemoryCollection::new();
        let mut board = new_board(&remote, SyncMode::Once);
        let id = AppointmentId::new("a");

        board.request_end_day();
        board.toggle_popup(&id);
        board.dismiss_if_outside(&PointerTarget::EndDayDialog);
        // The dialog press is outside the row menu but inside the dialog.
        assert_eq!(board.popup().open_id(), None);
        assert!(board.end_day().is_confirming());

        board.toggle_popup(&id);
        board.dismiss_if_outside(&PointerTarget::RowMenu(id.clone()));
        assert!(board.popup().is_open(&id));
        assert!(!board.end_day().is_confirming());
    }

    #[tokio::test]
    async fn two_desks_converge_in_live_mode() {
        let remote = MemoryCollection::new();
        let mut front = new_board(&remote, SyncMode::Live);
        let mut back = new_board(&remote, SyncMode::Live);
        front.open().await.unwrap();
        back.open().await.unwrap();

        fill(&mut front, ["A", "B", "C", "9:00"]);
        let appt = front.submit_form().await.unwrap();
        assert_eq!(back.rows().len(), 1);

        front.apply_status(&appt.id, Status::Helped).await.unwrap();
        back.apply_status(&appt.id, Status::Shipped).await.unwrap();
        assert_eq!(front.store().get(&appt.id).unwrap().status, Status::Shipped);
        assert_eq!(back.store().get(&appt.id).unwrap().status, Status::Shipped);
    }

    #[tokio::test]
    async fn close_detaches_once() {
        let remote = MemoryCollection::new();
        let mut board = new_board(&remote, SyncMode::Live);
        board.open().await.unwrap();
        board.open().await.unwrap();
        assert_eq!(remote.subscriber_count(), 1);
        board.close();
        board.close();
        assert!(!board.is_attached());
        assert_eq!(remote.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn adopted_subscription_replaces_previous() {
        let remote = MemoryCollection::new();
        let mut board = new_board(&remote, SyncMode::Live);
        board.open().await.unwrap();
        let handle = board.store().attach(|_| {}).await.unwrap();
        assert_eq!(remote.subscriber_count(), 2);
        board.adopt_subscription(handle);
        assert_eq!(remote.subscriber_count(), 1);
        board.close();
        assert_eq!(remote.subscriber_count(), 0);
    }

    #[test]
    fn in_flight_row_only_blocks_itself() {
        let remote = MemoryCollection::new();
        let mut board = new_board(&remote, SyncMode::Once);
        let a = AppointmentId::new("a");
        let b = AppointmentId::new("b");

        board.begin_row_action(&a).unwrap();
        assert_eq!(board.begin_row_action(&b), Ok(()));
        assert_eq!(board.begin_row_action(&a), Err(BoardError::RowBusy(a.clone())));
        assert!(board.is_row_busy(&a));

        board.toggle_popup(&b);
        board.status_applied(&a, &Ok(()));
        assert!(!board.is_row_busy(&a));
        // Another row's confirmation leaves this menu alone.
        assert!(board.popup().is_open(&b));

        let failed = Err(BoardError::RemoteWrite(RemoteError::Offline));
        board.removed(&b, &failed);
        assert!(!board.is_row_busy(&b));
        assert!(board.popup().is_open(&b));
        assert_eq!(board.begin_row_action(&a), Ok(()));
    }

    #[test]
    fn theme_drives_row_color() {
        let remote = MemoryCollection::new();
        let mut board = new_board(&remote, SyncMode::Once);
        let appt = Appointment::new(AppointmentId::new("a"), AppointmentFields::new("A", "B", "C", "9"));
        let light = board.row_color(&appt);
        board.toggle_theme();
        assert_eq!(board.theme(), Theme::Dark);
        assert_ne!(board.row_color(&appt), light);
    }
}
