use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, column, container, icon, mouse_area, row, scrollable, text};
use cosmic::{Element, theme};

use crate::board::Board;
use crate::board::popup::PointerTarget;
use crate::components::appointment_row::{RowCtx, appointment_row, header_row};
use crate::fl;
use crate::message::Message;
use crate::sync::{RemoteCollection, SyncStatus};

fn sync_caption(status: &SyncStatus) -> Option<String> {
    match status {
        SyncStatus::Idle => None,
        SyncStatus::Syncing => Some(fl!("sync-connecting")),
        SyncStatus::Error(e) => Some(fl!("sync-error", error = e.clone())),
        SyncStatus::LastSynced(at) => Some(fl!("sync-up-to-date", time = at.clone())),
    }
}

fn end_day_dialog(count: usize, clearing: bool) -> Element<'static, Message> {
    let mut buttons = row().spacing(8).align_y(Alignment::Center);
    if clearing {
        buttons = buttons
            .push(text::caption(fl!("end-day-clearing")).width(Length::Fill))
            .push(button::standard(fl!("cancel")))
            .push(button::destructive(fl!("delete-all")));
    } else {
        buttons = buttons
            .push(text::caption(fl!("end-day-warning")).width(Length::Fill))
            .push(button::standard(fl!("cancel")).on_press(Message::DecideEndDay(false)))
            .push(button::destructive(fl!("delete-all")).on_press(Message::DecideEndDay(true)));
    }

    let card = container(
        column()
            .spacing(8)
            .push(text::title4(fl!("end-day-title")))
            .push(text::body(fl!("end-day-body", count = count.to_string())))
            .push(buttons),
    )
    .padding(16)
    .width(Length::Fill)
    .class(theme::Container::Card);

    mouse_area(card)
        .on_press(Message::Pressed(PointerTarget::EndDayDialog))
        .into()
}

pub fn board_view<C: RemoteCollection>(
    board: &Board<C>,
    notice: Option<&str>,
    sync_status: &SyncStatus,
) -> Element<'static, Message> {
    let rows = board.rows();
    let mut content = column().spacing(8);

    let mut title_row = row()
        .spacing(8)
        .align_y(Alignment::Center)
        .push(text::title4(fl!("appointments")))
        .push(text::caption(format!("{}", rows.len())).width(Length::Fill));
    if let Some(caption) = sync_caption(sync_status) {
        title_row = title_row.push(text::caption(caption));
    }
    content = content.push(title_row);

    if let Some(notice) = notice {
        content = content.push(
            container(
                row()
                    .spacing(8)
                    .align_y(Alignment::Center)
                    .push(text::body(notice.to_string()).width(Length::Fill))
                    .push(
                        button::icon(icon::from_name("window-close-symbolic"))
                            .on_press(Message::DismissNotice),
                    ),
            )
            .padding(8)
            .class(theme::Container::Card),
        );
    }

    let end_day = board.end_day();
    if end_day.is_confirming() {
        content = content.push(end_day_dialog(rows.len(), end_day.is_clearing()));
    }

    if rows.is_empty() {
        content = content.push(
            container(text::body(fl!("board-empty")))
                .padding(32)
                .center_x(Length::Fill)
                .width(Length::Fill),
        );
    } else {
        let actions = board.menu_actions();
        content = content.push(header_row());
        for appointment in &rows {
            let open = board.popup().is_open(&appointment.id);
            let ctx = RowCtx {
                palette: board.theme(),
                actions: &actions,
                busy: board.is_row_busy(&appointment.id),
            };
            content = content.push(appointment_row(
                appointment,
                board.row_color(appointment),
                open,
                &ctx,
            ));
        }
    }

    container(scrollable(content.padding(16).width(Length::Fill)))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}
