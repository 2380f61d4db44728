use iced::widget::{button, container, slider, text, text_input, Column, Row};
use iced::{Alignment, Element, Length};

use crate::player::{Readout, SEEK_RESOLUTION};

#[derive(Debug, Clone)]
pub enum ControlMessage {
    PlayPause,
    Seek(f32),
    UrlChanged(String),
    LoadUrl,
    OpenFile,
}

/// Build the transport controls view.
pub fn view_controls<'a>(readout: &'a Readout, url: &'a str) -> Element<'a, ControlMessage> {
    let open_btn = button(text("Open File")).on_press(ControlMessage::OpenFile);
    let url_input = text_input("Audio URL or path", url)
        .on_input(ControlMessage::UrlChanged)
        .on_submit(ControlMessage::LoadUrl)
        .width(Length::Fill);
    let load_btn = button(text("Load")).on_press(ControlMessage::LoadUrl);

    let source_row = Row::new()
        .spacing(10)
        .align_y(Alignment::Center)
        .push(open_btn)
        .push(url_input)
        .push(load_btn);

    let play_btn = button(text(readout.play_label)).on_press(ControlMessage::PlayPause);
    let timecode = text(readout.timecode.as_str()).size(16);
    let seek_slider = slider(
        0.0..=SEEK_RESOLUTION as f32,
        readout.seek as f32,
        ControlMessage::Seek,
    )
    .step(1.0)
    .width(Length::Fill);
    let status = text(readout.status.as_str()).size(14);

    let transport_row = Row::new()
        .spacing(10)
        .align_y(Alignment::Center)
        .push(play_btn)
        .push(timecode)
        .push(seek_slider)
        .push(status);

    container(Column::new().spacing(8).push(source_row).push(transport_row))
        .padding(10)
        .into()
}
