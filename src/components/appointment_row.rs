use cosmic::iced::widget::container as iced_container;
use cosmic::iced::{Alignment, Background, Color, Length};
use cosmic::widget::{button, column, container, flex_row, mouse_area, row, text};
use cosmic::{Element, theme};

use crate::board::popup::PointerTarget;
use crate::core::appointment::{Appointment, Field};
use crate::core::status::{MenuAction, Rgb, Status, Theme};
use crate::fl;
use crate::message::Message;

// Column widths for consistent alignment
const COL_NAME: f32 = 160.0;
const COL_TIME: f32 = 96.0;
const COL_STATUS: f32 = 120.0;

/// Everything a row needs besides the appointment itself.
pub struct RowCtx<'a> {
    pub palette: Theme,
    pub actions: &'a [MenuAction],
    /// A status or delete request is in flight for this row.
    pub busy: bool,
}

fn status_label(status: Status) -> String {
    match status {
        Status::Pending => fl!("status-pending"),
        Status::Helped => fl!("status-helped"),
        Status::Shipped => fl!("status-shipped"),
        Status::Left => fl!("status-left"),
        Status::NoShow => fl!("status-no-show"),
        Status::Reschedule => fl!("status-reschedule"),
        Status::Waiting => fl!("status-waiting"),
        Status::Escalated => fl!("status-escalated"),
        Status::Unrecognized => fl!("status-unrecognized"),
    }
}

/// Text on the menu button that applies `action`.
fn action_label(action: MenuAction) -> String {
    match action {
        MenuAction::Delete => fl!("action-delete"),
        MenuAction::SetStatus(status) => match status {
            Status::Pending => fl!("action-pending"),
            Status::Helped => fl!("action-helped"),
            Status::Shipped => fl!("action-shipped"),
            Status::Left => fl!("action-left"),
            Status::NoShow => fl!("action-no-show"),
            Status::Reschedule => fl!("action-reschedule"),
            Status::Waiting => fl!("action-waiting"),
            Status::Escalated => fl!("action-escalated"),
            Status::Unrecognized => fl!("status-unrecognized"),
        },
    }
}

pub fn field_label(field: Field) -> String {
    match field {
        Field::Client => fl!("column-client"),
        Field::Porter => fl!("column-porter"),
        Field::Advisor => fl!("column-advisor"),
        Field::Time => fl!("column-time"),
    }
}

fn col(width: f32, content: impl Into<Element<'static, Message>>) -> Element<'static, Message> {
    container(content).width(Length::Fixed(width)).into()
}

fn text_color(palette: Theme) -> Color {
    match palette {
        Theme::Light => Color::from_rgb8(0x21, 0x25, 0x29),
        Theme::Dark => Color::from_rgb8(0xf8, 0xf9, 0xfa),
    }
}

fn tinted(
    content: impl Into<Element<'static, Message>>,
    color: Rgb,
    palette: Theme,
) -> Element<'static, Message> {
    let background = Color::from_rgb8(color.0, color.1, color.2);
    let foreground = text_color(palette);
    container(content)
        .width(Length::Fill)
        .class(theme::Container::custom(move |_| iced_container::Style {
            background: Some(Background::Color(background)),
            text_color: Some(foreground),
            ..Default::default()
        }))
        .into()
}

/// Column captions above the rows.
pub fn header_row() -> Element<'static, Message> {
    row()
        .spacing(8)
        .padding([0, 12])
        .push(col(COL_NAME, text::heading(field_label(Field::Client))))
        .push(col(COL_NAME, text::heading(field_label(Field::Porter))))
        .push(col(COL_NAME, text::heading(field_label(Field::Advisor))))
        .push(col(COL_TIME, text::heading(field_label(Field::Time))))
        .push(col(COL_STATUS, text::heading(fl!("column-status"))))
        .into()
}

/// The action menu under an open row.
fn row_menu(appointment: &Appointment, ctx: &RowCtx) -> Element<'static, Message> {
    let items: Vec<Element<'static, Message>> = ctx
        .actions
        .iter()
        .map(|action| {
            let label = action_label(*action);
            let btn = match action {
                MenuAction::Delete => button::destructive(label),
                MenuAction::SetStatus(status) if *status == appointment.status => {
                    button::suggested(label)
                }
                MenuAction::SetStatus(_) => button::standard(label),
            };
            let msg = Message::RowAction(appointment.id.clone(), *action);
            btn.on_press_maybe((!ctx.busy).then_some(msg)).into()
        })
        .collect();

    let menu = container(flex_row(items).row_spacing(4).column_spacing(4))
        .padding(8)
        .width(Length::Fill)
        .class(theme::Container::Card);

    mouse_area(menu)
        .on_press(Message::Pressed(PointerTarget::RowMenu(appointment.id.clone())))
        .into()
}

pub fn appointment_row(
    appointment: &Appointment,
    color: Rgb,
    open: bool,
    ctx: &RowCtx,
) -> Element<'static, Message> {
    let cells = row()
        .spacing(8)
        .align_y(Alignment::Center)
        .push(col(COL_NAME, text::body(appointment.client.clone())))
        .push(col(COL_NAME, text::body(appointment.porter.clone())))
        .push(col(COL_NAME, text::body(appointment.advisor.clone())))
        .push(col(COL_TIME, text::body(appointment.time.clone())))
        .push(col(COL_STATUS, text::caption(status_label(appointment.status))));

    let trigger = button::custom(cells)
        .padding([8, 12])
        .width(Length::Fill)
        .class(theme::Button::Text)
        .on_press(Message::RowPressed(appointment.id.clone()));

    let mut body = column().spacing(4).push(trigger);
    if open {
        body = body.push(row_menu(appointment, ctx));
    }

    tinted(body, color, ctx.palette)
}
