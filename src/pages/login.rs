use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, column, container, row, text, text_input};
use cosmic::Element;

use crate::fl;
use crate::message::Message;

const FORM_WIDTH: f32 = 360.0;

pub fn login_view<'a>(
    project_id: &str,
    email: &str,
    password: &str,
    error: Option<&str>,
    busy: bool,
) -> Element<'a, Message> {
    let mut content = column()
        .spacing(12)
        .width(Length::Fixed(FORM_WIDTH))
        .push(text::title3(fl!("sign-in-title")))
        .push(text::caption(fl!("sign-in-board", project = project_id.to_string())));

    content = content.push(
        text_input::text_input(fl!("email"), email.to_string())
            .on_input(Message::LoginEmailChanged)
            .width(Length::Fill),
    );
    content = content.push(
        text_input::secure_input(fl!("password"), password.to_string(), None::<Message>, true)
            .on_input(Message::LoginPasswordChanged)
            .on_submit(|_| Message::SignIn)
            .width(Length::Fill),
    );

    let sign_in = button::suggested(fl!("sign-in")).on_press_maybe((!busy).then_some(Message::SignIn));
    let register = button::standard(fl!("register")).on_press_maybe((!busy).then_some(Message::Register));
    content = content.push(
        row()
            .spacing(8)
            .align_y(Alignment::Center)
            .push(sign_in)
            .push(register),
    );

    if busy {
        content = content.push(text::caption(fl!("signing-in")));
    } else if let Some(error) = error {
        content = content.push(text::body(format!("✗ {}", error)));
    }

    container(content)
        .padding(32)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}
