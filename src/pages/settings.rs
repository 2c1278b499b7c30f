use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, column, container, dropdown, row, scrollable, text, text_input, toggler};
use cosmic::Element;

use crate::board::store::SyncMode;
use crate::config::{Backend, BoardConfig};
use crate::core::status::StatusSet;
use crate::fl;
use crate::message::{Message, SettingsField};
use crate::sync::auth::Session;

const SYNC_MODES: &[SyncMode] = &[SyncMode::Live, SyncMode::Once];
const STATUS_SETS: &[StatusSet] = &[StatusSet::Basic, StatusSet::Extended];

fn sync_mode_label(mode: SyncMode) -> String {
    match mode {
        SyncMode::Live => fl!("sync-live"),
        SyncMode::Once => fl!("sync-once"),
    }
}

fn status_set_label(set: StatusSet) -> String {
    match set {
        StatusSet::Basic => fl!("status-set-basic"),
        StatusSet::Extended => fl!("status-set-extended"),
    }
}

fn backend_label(backend: Backend) -> String {
    match backend {
        Backend::Memory => fl!("backend-memory"),
        Backend::Firestore => fl!("backend-firestore"),
    }
}

fn labeled<'a>(label: String, control: impl Into<Element<'a, Message>>) -> Element<'a, Message> {
    row()
        .spacing(8)
        .align_y(Alignment::Center)
        .push(text::body(label).width(Length::Fill))
        .push(control)
        .into()
}

fn field_input<'a>(placeholder: String, value: &str, field: SettingsField) -> Element<'a, Message> {
    text_input::text_input(placeholder, value.to_string())
        .on_input(move |v| Message::SetSettingsField(field, v))
        .width(Length::Fill)
        .into()
}

pub fn settings_view<'a>(config: &BoardConfig, session: Option<&Session>) -> Element<'a, Message> {
    let mut content = column().spacing(12);

    // --- Board ---
    content = content.push(text::title4(fl!("settings-board")));

    let backend_labels: Vec<String> = Backend::ALL.iter().map(|b| backend_label(*b)).collect();
    let backend_selected = Backend::ALL.iter().position(|b| *b == config.backend);
    content = content.push(labeled(
        fl!("settings-storage"),
        dropdown(backend_labels, backend_selected, |idx| {
            Message::SetBackend(Backend::ALL.get(idx).copied().unwrap_or_default())
        })
        .width(Length::Fixed(200.0)),
    ));

    let status_labels: Vec<String> = STATUS_SETS.iter().map(|s| status_set_label(*s)).collect();
    let status_selected = STATUS_SETS.iter().position(|s| *s == config.status_set);
    content = content.push(labeled(
        fl!("settings-statuses"),
        dropdown(status_labels, status_selected, |idx| {
            Message::SetStatusSet(STATUS_SETS.get(idx).copied().unwrap_or_default())
        })
        .width(Length::Fixed(200.0)),
    ));

    // --- Firestore ---
    if config.backend == Backend::Firestore {
        content = content.push(text::title4(fl!("settings-firestore")));
        content = content.push(field_input(fl!("project-id"), &config.project_id, SettingsField::ProjectId));
        content = content.push(
            text_input::secure_input(fl!("api-key"), config.api_key.clone(), None::<Message>, true)
                .on_input(|v| Message::SetSettingsField(SettingsField::ApiKey, v))
                .width(Length::Fill),
        );
        content = content.push(field_input(fl!("collection"), &config.collection, SettingsField::Collection));
        content = content.push(field_input(
            fl!("order-by"),
            &config.order_by,
            SettingsField::OrderBy,
        ));

        let mode_labels: Vec<String> = SYNC_MODES.iter().map(|m| sync_mode_label(*m)).collect();
        let mode_selected = SYNC_MODES.iter().position(|m| *m == config.sync_mode);
        content = content.push(labeled(
            fl!("settings-updates"),
            dropdown(mode_labels, mode_selected, |idx| {
                Message::SetSyncMode(SYNC_MODES.get(idx).copied().unwrap_or_default())
            })
            .width(Length::Fixed(200.0)),
        ));

        if config.sync_mode == SyncMode::Live {
            content = content.push(labeled(
                fl!("poll-interval"),
                text_input::text_input("5", config.poll_interval_secs.to_string())
                    .on_input(|v| Message::SetSettingsField(SettingsField::PollInterval, v))
                    .width(Length::Fixed(80.0)),
            ));
        }

        if !config.firestore_ready() {
            content = content.push(text::caption(fl!("firestore-incomplete")));
        }

        // --- Account ---
        content = content.push(text::title4(fl!("settings-account")));
        match session {
            Some(session) => {
                content = content.push(labeled(
                    fl!("signed-in"),
                    row()
                        .spacing(8)
                        .align_y(Alignment::Center)
                        .push(text::body(session.email.clone()))
                        .push(button::standard(fl!("sign-out")).on_press(Message::SignOut)),
                ));
            }
            None => {
                content = content.push(text::caption(fl!("not-signed-in")));
            }
        }
    }

    content = content.push(
        row()
            .spacing(8)
            .push(button::suggested(fl!("apply")).on_press(Message::ApplySettings))
            .push(button::standard(fl!("back-to-board")).on_press(Message::ShowBoard)),
    );

    // --- Debug logging ---
    content = content.push(labeled(
        fl!("debug-logging"),
        toggler(config.debug_logging).on_toggle(|_| Message::ToggleDebugLogging),
    ));

    container(scrollable(content.padding(16).width(Length::Fill)))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}
