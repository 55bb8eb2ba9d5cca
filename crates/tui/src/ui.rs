use ratatui::prelude::*;

use crate::app::{App, AppMode};
use crate::components::{chat, footer, input_box, welcome};
use crate::spinner::SpinnerState;

pub fn draw(frame: &mut Frame, app: &App, spinner: &SpinnerState) {
    frame.render_widget(
        ratatui::widgets::Block::default().style(Style::default().bg(app.theme.bg_page)),
        frame.area(),
    );

    let input_lines = app.input.lines().count().max(1) as u16;
    let input_height = (input_lines + 2).clamp(3, 8);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(input_height),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let idle_and_empty =
        app.items.is_empty() && app.current_stream.is_empty() && matches!(app.mode, AppMode::Input);
    if idle_and_empty {
        welcome::draw(frame, chunks[0], app);
    } else {
        chat::draw(frame, chunks[0], app);
    }

    input_box::draw(frame, chunks[1], app, spinner);
    footer::draw(frame, chunks[2], app);
}
