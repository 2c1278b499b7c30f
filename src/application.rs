use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cosmic::app::{Core, Task as CosmicTask, context_drawer};
use cosmic::iced::Length;
use cosmic::widget::{button, column, container, icon, mouse_area, row, scrollable, text, text_input};
use cosmic::{Application, Element, executor};

use crate::board::popup::PointerTarget;
use crate::board::store::{StoreUpdate, SyncMode};
use crate::board::{Board, BoardError};
use crate::config::{Backend, BoardConfig};
use crate::core::appointment::Field;
use crate::core::status::{MenuAction, Theme};
use crate::components::appointment_row::field_label;
use crate::fl;
use crate::message::{ActiveView, Attached, Message, SettingsField};
use crate::pages;
use crate::sync::auth::{AuthClient, AuthError, Session};
use crate::sync::firestore::FirestoreCollection;
use crate::sync::memory::MemoryCollection;
use crate::sync::{AnyCollection, SyncStatus};

/// How often the UI looks for snapshots delivered by a live subscription.
const REFRESH_INTERVAL: Duration = Duration::from_millis(250);
/// How often the id token's expiry is checked while signed in.
const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(60);

pub struct FrontDesk {
    core: Core,
    config: BoardConfig,
    cosmic_config: cosmic::cosmic_config::Config,
    active_view: ActiveView,

    // Board
    board: Board<AnyCollection>,
    /// Bumped whenever the board is rebuilt; results for an older board are dropped.
    generation: u64,
    seen_revision: u64,
    submitting: bool,
    form_error: Option<String>,
    notice: Option<String>,

    // Sync
    sync_status: SyncStatus,
    /// Last failure reported by the live subscription, picked up on the next tick.
    feed_error: Arc<Mutex<Option<String>>>,

    // Account
    session: Option<Session>,
    login_email: String,
    login_password: String,
    login_error: Option<String>,
    signing_in: bool,
    refreshing_session: bool,
}

pub struct Flags {
    pub config: BoardConfig,
    pub cosmic_config: cosmic::cosmic_config::Config,
}

fn collection(config: &BoardConfig, session: Option<&Session>) -> AnyCollection {
    if let Some(settings) = config.firestore_settings() {
        match FirestoreCollection::new(settings) {
            Ok(client) => {
                let client = match session {
                    Some(session) => client.with_id_token(session.id_token.clone()),
                    None => client,
                };
                return AnyCollection::Firestore(client);
            }
            Err(e) => log::error!("Failed to create Firestore client: {}", e),
        }
    }
    AnyCollection::Memory(MemoryCollection::new())
}

impl Application for FrontDesk {
    type Executor = executor::Default;
    type Flags = Flags;
    type Message = Message;

    const APP_ID: &'static str = crate::config::APP_ID;

    fn core(&self) -> &Core {
        &self.core
    }

    fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    fn init(core: Core, flags: Self::Flags) -> (Self, CosmicTask<Self::Message>) {
        let config = flags.config;
        let board = Board::new(Arc::new(collection(&config, None)), config.board_options());

        let active_view = if config.backend == Backend::Firestore && !config.firestore_ready() {
            ActiveView::Settings
        } else {
            ActiveView::Board
        };

        let mut app = Self {
            core,
            login_email: config.email.clone(),
            config,
            cosmic_config: flags.cosmic_config,
            active_view,
            board,
            generation: 0,
            seen_revision: 0,
            submitting: false,
            form_error: None,
            notice: None,
            sync_status: SyncStatus::default(),
            feed_error: Arc::new(Mutex::new(None)),
            session: None,
            login_password: String::new(),
            login_error: None,
            signing_in: false,
            refreshing_session: false,
        };

        let task = if app.config.firestore_ready() {
            let project_id = app.config.project_id.trim().to_string();
            CosmicTask::perform(
                async move { crate::sync::keyring::load_session(&project_id).await },
                |result| cosmic::Action::App(Message::SessionRestored(result)),
            )
        } else {
            app.connect()
        };

        (app, task)
    }

    fn header_end(&self) -> Vec<Element<'_, Message>> {
        let mut header_row = row().spacing(4);

        if self.active_view == ActiveView::Board && !self.needs_login() {
            let end_day = self.board.end_day();
            header_row = header_row
                .push(
                    button::icon(icon::from_name("list-add-symbolic"))
                        .on_press(Message::OpenForm),
                )
                .push(button::standard(match self.board.theme() {
                    Theme::Light => fl!("switch-to-dark"),
                    Theme::Dark => fl!("switch-to-light"),
                }).on_press(Message::ToggleTheme))
                .push(
                    button::destructive(fl!("end-day"))
                        .on_press_maybe((!end_day.is_confirming()).then_some(Message::RequestEndDay)),
                );

            if self.board.store().mode() == SyncMode::Once {
                header_row = header_row.push(
                    button::icon(icon::from_name("view-refresh-symbolic")).on_press(Message::Reload),
                );
            } else if let SyncStatus::Error(_) = self.sync_status {
                header_row = header_row.push(
                    button::icon(icon::from_name("dialog-warning-symbolic")).on_press(Message::Reload),
                );
            }
        }

        header_row = header_row.push(
            button::icon(icon::from_name("emblem-system-symbolic"))
                .on_press(Message::OpenSettings),
        );

        vec![header_row.into()]
    }

    fn context_drawer(&self) -> Option<context_drawer::ContextDrawer<'_, Message>> {
        if !self.board.form().is_visible() {
            return None;
        }
        Some(
            context_drawer::context_drawer(
                container(scrollable(self.form_view().padding(16))).width(Length::Fill),
                Message::CloseForm,
            )
            .title(fl!("new-appointment")),
        )
    }

    fn on_escape(&mut self) -> CosmicTask<Message> {
        if self.board.form().is_visible() {
            self.close_form();
        } else {
            self.board.dismiss_if_outside(&PointerTarget::Elsewhere);
        }
        CosmicTask::none()
    }

    fn subscription(&self) -> cosmic::iced::Subscription<Message> {
        let keys = cosmic::iced::event::listen_with(|event, _status, _id| match event {
            cosmic::iced::Event::Keyboard(cosmic::iced::keyboard::Event::KeyPressed {
                key: cosmic::iced::keyboard::Key::Character(ref c),
                modifiers,
                ..
            }) if c.as_str() == "n" && modifiers.control() => Some(Message::OpenForm),
            _ => None,
        });

        let mut subscriptions = vec![keys];
        if self.board.is_attached() {
            subscriptions.push(cosmic::iced::time::every(REFRESH_INTERVAL).map(|_| Message::Tick));
        }
        if self.session.is_some() {
            subscriptions.push(
                cosmic::iced::time::every(SESSION_CHECK_INTERVAL).map(|_| Message::CheckSession),
            );
        }
        cosmic::iced::Subscription::batch(subscriptions)
    }

    fn update(&mut self, message: Message) -> CosmicTask<Message> {
        match message {
            Message::ShowBoard => {
                self.active_view = ActiveView::Board;
            }

            Message::OpenSettings => {
                self.board.dismiss_if_outside(&PointerTarget::Elsewhere);
                self.active_view = ActiveView::Settings;
            }

            // --- Account ---
            Message::LoginEmailChanged(value) => {
                self.login_email = value;
            }

            Message::LoginPasswordChanged(value) => {
                self.login_password = value;
            }

            Message::SignIn | Message::Register => {
                if self.signing_in {
                    return CosmicTask::none();
                }
                let email = self.login_email.trim().to_string();
                let password = self.login_password.clone();
                if email.is_empty() || password.is_empty() {
                    self.login_error = Some(fl!("login-missing"));
                    return CosmicTask::none();
                }
                let register = matches!(message, Message::Register);
                let api_key = self.config.api_key.trim().to_string();
                let project_id = self.config.project_id.trim().to_string();
                self.signing_in = true;
                self.login_error = None;
                return CosmicTask::perform(
                    async move {
                        let client = AuthClient::new(&api_key).map_err(|e| e.to_string())?;
                        let session = if register {
                            client.register(&email, &password).await
                        } else {
                            client.sign_in(&email, &password).await
                        }
                        .map_err(|e| e.to_string())?;
                        if let Err(e) = crate::sync::keyring::store_session(&project_id, &session).await {
                            log::warn!("Session not saved: {}", e);
                        }
                        Ok(session)
                    },
                    |result| cosmic::Action::App(Message::SignedIn(result)),
                );
            }

            Message::SessionRestored(result) => match result {
                Ok(Some(session)) => {
                    let api_key = self.config.api_key.trim().to_string();
                    let project_id = self.config.project_id.trim().to_string();
                    self.signing_in = true;
                    return CosmicTask::perform(
                        async move {
                            let client = AuthClient::new(&api_key).map_err(|e| e.to_string())?;
                            let session = client.refresh(&session).await.map_err(|e| e.to_string())?;
                            if let Err(e) = crate::sync::keyring::store_session(&project_id, &session).await {
                                log::warn!("Refreshed session not saved: {}", e);
                            }
                            Ok(session)
                        },
                        |result| cosmic::Action::App(Message::SignedIn(result)),
                    );
                }
                Ok(None) => {
                    log::debug!("No saved session");
                    return self.connect();
                }
                Err(e) => {
                    log::warn!("Could not read saved session: {}", e);
                    return self.connect();
                }
            },

            Message::SignedIn(result) => {
                self.signing_in = false;
                match result {
                    Ok(session) => {
                        log::info!("Signed in as {}", session.email);
                        self.login_password.clear();
                        self.login_error = None;
                        self.config.email = session.email.clone();
                        self.session = Some(session);
                        self.save_config();
                        return self.connect();
                    }
                    Err(e) => {
                        log::warn!("Sign in failed: {}", e);
                        self.login_error = Some(e);
                    }
                }
            }

            Message::SignOut => {
                self.session = None;
                let project_id = self.config.project_id.trim().to_string();
                let connect = self.connect();
                return CosmicTask::batch([
                    connect,
                    CosmicTask::perform(
                        async move { crate::sync::keyring::delete_session(&project_id).await },
                        |result| cosmic::Action::App(Message::SignedOut(result)),
                    ),
                ]);
            }

            Message::SignedOut(result) => {
                if let Err(e) = result {
                    log::error!("Failed to forget session: {}", e);
                }
            }

            Message::CheckSession => {
                return self.check_session();
            }

            Message::SessionRefreshed(result) => {
                self.refreshing_session = false;
                match result {
                    // Signed out while the refresh was running.
                    Ok(_) if self.session.is_none() => {}
                    Ok(session) => {
                        log::info!("Renewed session for {}", session.email);
                        self.board.store().client().set_id_token(&session.id_token);
                        let project_id = self.config.project_id.trim().to_string();
                        let saved = session.clone();
                        self.session = Some(session);
                        return CosmicTask::perform(
                            async move { crate::sync::keyring::store_session(&project_id, &saved).await },
                            |result| cosmic::Action::App(Message::SessionSaved(result)),
                        );
                    }
                    Err(AuthError::Rejected(reason)) => {
                        log::warn!("Session can no longer be renewed: {}", reason);
                        let sign_out = self.update(Message::SignOut);
                        self.login_error = Some(fl!("session-expired"));
                        return sign_out;
                    }
                    Err(e) => log::warn!("Session renewal failed, retrying later: {}", e),
                }
            }

            Message::SessionSaved(result) => {
                if let Err(e) = result {
                    log::warn!("Renewed session not saved: {}", e);
                }
            }

            // --- Board sync ---
            Message::Reload => {
                return self.connect();
            }

            Message::Loaded(generation, result) => {
                if generation != self.generation {
                    return CosmicTask::none();
                }
                match result {
                    Ok(count) => {
                        log::debug!("Board loaded with {} appointments", count);
                        self.sync_status = SyncStatus::synced_now();
                        self.board.sync_ui_state();
                    }
                    Err(e) => self.sync_status = SyncStatus::Error(e.to_string()),
                }
            }

            Message::Attached(generation, result) => {
                let handle = match result {
                    Ok(attached) => attached.take(),
                    Err(e) => {
                        if generation == self.generation {
                            self.sync_status = SyncStatus::Error(e.to_string());
                        }
                        return CosmicTask::none();
                    }
                };
                // A stale handle is dropped here, which detaches it.
                if generation == self.generation {
                    if let Some(handle) = handle {
                        self.board.adopt_subscription(handle);
                        self.sync_status = SyncStatus::synced_now();
                    }
                }
            }

            Message::Tick => {
                let revision = self.board.store().revision();
                if revision != self.seen_revision {
                    self.seen_revision = revision;
                    self.board.sync_ui_state();
                    self.sync_status = SyncStatus::synced_now();
                }
                let failure = self.feed_error.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(e) = failure {
                    self.sync_status = SyncStatus::Error(e);
                    // The usual cause after a suspend is a lapsed id token.
                    return self.check_session();
                }
            }

            // --- Rows ---
            Message::Pressed(target) => {
                self.board.dismiss_if_outside(&target);
            }

            Message::RowPressed(id) => {
                self.board.dismiss_if_outside(&PointerTarget::Row(id.clone()));
                self.board.toggle_popup(&id);
            }

            Message::RowAction(id, action) => {
                self.board.dismiss_if_outside(&PointerTarget::RowMenu(id.clone()));
                if let MenuAction::SetStatus(status) = action {
                    if let Err(e) = self.board.check_status(status) {
                        self.notice = Some(e.to_string());
                        return CosmicTask::none();
                    }
                }
                if let Err(e) = self.board.begin_row_action(&id) {
                    log::debug!("Ignoring {:?}: {}", action, e);
                    return CosmicTask::none();
                }
                let store = self.board.store().clone();
                match action {
                    MenuAction::SetStatus(status) => {
                        let target = id.clone();
                        return CosmicTask::perform(
                            async move { store.set_status(&target, status).await },
                            move |result| cosmic::Action::App(Message::StatusApplied(id.clone(), result)),
                        );
                    }
                    MenuAction::Delete => {
                        let target = id.clone();
                        return CosmicTask::perform(
                            async move { store.remove(&target).await },
                            move |result| cosmic::Action::App(Message::RowRemoved(id.clone(), result)),
                        );
                    }
                }
            }

            Message::StatusApplied(id, result) => {
                self.board.status_applied(&id, &result);
                self.report(result);
            }

            Message::RowRemoved(id, result) => {
                self.board.removed(&id, &result);
                self.board.sync_ui_state();
                self.report(result);
            }

            // --- End of day ---
            Message::RequestEndDay => {
                self.board.dismiss_if_outside(&PointerTarget::EndDayButton);
                self.board.request_end_day();
            }

            Message::DecideEndDay(accept) => {
                self.board.dismiss_if_outside(&PointerTarget::EndDayDialog);
                if self.board.decide_end_day(accept) {
                    let store = self.board.store().clone();
                    return CosmicTask::perform(
                        async move { store.clear_all().await },
                        |result| cosmic::Action::App(Message::EndDayCleared(result)),
                    );
                }
            }

            Message::EndDayCleared(result) => {
                self.board.end_day_settled();
                match result {
                    Ok(count) => {
                        log::info!("Day ended, {} appointments cleared", count);
                        self.notice = Some(fl!("day-ended", count = count.to_string()));
                    }
                    Err(e) => self.notice = Some(e.to_string()),
                }
            }

            // --- New appointment drawer ---
            Message::OpenForm => {
                if self.needs_login() {
                    return CosmicTask::none();
                }
                self.board.dismiss_if_outside(&PointerTarget::Elsewhere);
                self.board.form_mut().open();
                self.core.window.show_context = true;
            }

            Message::CloseForm => {
                self.close_form();
            }

            Message::FormField(field, value) => {
                self.board.form_mut().set_field(field, value);
            }

            Message::SubmitForm => {
                if self.submitting {
                    return CosmicTask::none();
                }
                match self.board.form().validate() {
                    Ok(fields) => {
                        self.form_error = None;
                        self.submitting = true;
                        let store = self.board.store().clone();
                        return CosmicTask::perform(
                            async move { store.create(fields).await },
                            |result| cosmic::Action::App(Message::Created(result)),
                        );
                    }
                    Err(e) => self.form_error = Some(e.to_string()),
                }
            }

            Message::Created(result) => {
                self.submitting = false;
                match result {
                    Ok(appointment) => {
                        log::info!("Added appointment {} for {}", appointment.id, appointment.client);
                        self.board.form_mut().complete();
                        self.form_error = None;
                        self.core.window.show_context = false;
                    }
                    Err(e) => self.form_error = Some(e.to_string()),
                }
            }

            Message::ToggleTheme => {
                self.board.dismiss_if_outside(&PointerTarget::Elsewhere);
                self.board.toggle_theme();
                self.config.theme = self.board.theme();
                self.save_config();
            }

            // --- Settings ---
            Message::SetBackend(backend) => {
                self.config.backend = backend;
                self.save_config();
            }

            Message::SetSettingsField(field, value) => {
                match field {
                    SettingsField::ProjectId => self.config.project_id = value,
                    SettingsField::ApiKey => self.config.api_key = value,
                    SettingsField::Collection => self.config.collection = value,
                    SettingsField::OrderBy => self.config.order_by = value,
                    SettingsField::PollInterval => match value.trim().parse() {
                        Ok(secs) => self.config.poll_interval_secs = secs,
                        Err(_) => return CosmicTask::none(),
                    },
                }
                self.save_config();
            }

            Message::SetSyncMode(mode) => {
                self.config.sync_mode = mode;
                self.save_config();
            }

            Message::SetStatusSet(set) => {
                self.config.status_set = set;
                self.save_config();
            }

            Message::ToggleDebugLogging => {
                self.config.debug_logging = !self.config.debug_logging;
                frontdesk::set_debug_logging(self.config.debug_logging);
                self.save_config();
            }

            Message::ApplySettings => {
                self.active_view = ActiveView::Board;
                if self.session.is_none() && self.config.firestore_ready() {
                    let project_id = self.config.project_id.trim().to_string();
                    return CosmicTask::perform(
                        async move { crate::sync::keyring::load_session(&project_id).await },
                        |result| cosmic::Action::App(Message::SessionRestored(result)),
                    );
                }
                return self.connect();
            }

            Message::DismissNotice => {
                self.notice = None;
            }
        }

        CosmicTask::none()
    }

    fn view(&self) -> Element<'_, Message> {
        let page: Element<'_, Message> = match self.active_view {
            ActiveView::Settings => pages::settings::settings_view(&self.config, self.session.as_ref()),
            ActiveView::Board if self.needs_login() => pages::login::login_view(
                self.config.project_id.trim(),
                &self.login_email,
                &self.login_password,
                self.login_error.as_deref(),
                self.signing_in,
            ),
            ActiveView::Board => pages::board::board_view(
                &self.board,
                self.notice.as_deref(),
                &self.sync_status,
            ),
        };

        mouse_area(page)
            .on_press(Message::Pressed(PointerTarget::Elsewhere))
            .into()
    }
}

impl FrontDesk {
    /// The Firestore board is only reachable once signed in.
    fn needs_login(&self) -> bool {
        self.config.firestore_ready() && self.session.is_none()
    }

    /// Replaces the board with one built from the current config and session,
    /// then loads or attaches it.
    fn connect(&mut self) -> CosmicTask<Message> {
        self.board.close();
        let form = self.board.form().clone();
        self.board = Board::new(
            Arc::new(collection(&self.config, self.session.as_ref())),
            self.config.board_options(),
        );
        *self.board.form_mut() = form;
        self.generation += 1;
        self.seen_revision = 0;
        self.sync_status = SyncStatus::default();
        self.feed_error.lock().unwrap_or_else(PoisonError::into_inner).take();

        if self.needs_login() {
            return CosmicTask::none();
        }

        self.sync_status = SyncStatus::Syncing;
        let store = self.board.store().clone();
        let generation = self.generation;
        match store.mode() {
            SyncMode::Once => CosmicTask::perform(
                async move { store.load().await.map(|rows| rows.len()) },
                move |result| cosmic::Action::App(Message::Loaded(generation, result)),
            ),
            SyncMode::Live => {
                let feed_error = Arc::clone(&self.feed_error);
                CosmicTask::perform(
                    async move {
                        store
                            .attach(move |update| {
                                if let StoreUpdate::Failed(e) = update {
                                    *feed_error.lock().unwrap_or_else(PoisonError::into_inner) =
                                        Some(e.to_string());
                                }
                            })
                            .await
                            .map(Attached::new)
                    },
                    move |result| cosmic::Action::App(Message::Attached(generation, result)),
                )
            }
        }
    }

    fn close_form(&mut self) {
        self.board.form_mut().cancel();
        self.core.window.show_context = false;
    }

    /// Renews the id token when it is close to lapsing. The live client
    /// picks up the new token without rebuilding the board.
    fn check_session(&mut self) -> CosmicTask<Message> {
        let Some(session) = self.session.clone() else {
            return CosmicTask::none();
        };
        if self.refreshing_session || !session.needs_refresh(chrono::Utc::now().timestamp()) {
            return CosmicTask::none();
        }
        self.refreshing_session = true;
        let api_key = self.config.api_key.trim().to_string();
        CosmicTask::perform(
            async move { AuthClient::new(&api_key)?.refresh(&session).await },
            |result| cosmic::Action::App(Message::SessionRefreshed(result)),
        )
    }

    fn report(&mut self, result: Result<(), BoardError>) {
        if let Err(e) = result {
            self.notice = Some(e.to_string());
        }
    }

    fn form_view(&self) -> column::Column<'_, Message> {
        let form = self.board.form();
        let mut content = column().spacing(16);

        for field in Field::ALL {
            let field = *field;
            let label = field_label(field);
            content = content.push(text::title4(label.clone()));
            content = content.push(
                text_input::text_input(label, form.value(field))
                    .on_input(move |v| Message::FormField(field, v))
                    .on_submit(|_| Message::SubmitForm)
                    .width(Length::Fill),
            );
        }

        if let Some(ref error) = self.form_error {
            content = content.push(text::body(format!("✗ {}", error)));
        }

        content = content.push(
            button::suggested(if self.submitting { fl!("form-adding") } else { fl!("form-submit") })
                .on_press_maybe((!self.submitting).then_some(Message::SubmitForm))
                .width(Length::Fill),
        );

        content
    }

    fn save_config(&self) {
        use cosmic::cosmic_config::CosmicConfigEntry;
        if let Err(e) = self.config.write_entry(&self.cosmic_config) {
            log::error!("Failed to save config: {:?}", e);
        }
    }
}
