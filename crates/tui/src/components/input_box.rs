use ratatui::prelude::*;
use ratatui::widgets::*;

use waymark_core::tutor::Phase;

use crate::app::{App, AppMode};
use crate::spinner::SpinnerState;

pub fn draw(frame: &mut Frame, area: Rect, app: &App, spinner: &SpinnerState) {
    let theme = &app.theme;

    let phase_badge = match app.phase {
        Phase::Materials => " study ",
        _ => " diagnostic ",
    };

    let title = if matches!(app.mode, AppMode::Streaming) {
        Line::from(vec![
            Span::styled(phase_badge, Style::default().fg(theme.accent).bold()),
            Span::styled(
                format!(" {} esc to cancel ", spinner.current_frame()),
                Style::default().fg(theme.warning),
            ),
        ])
    } else {
        Line::from(Span::styled(
            phase_badge,
            Style::default().fg(theme.accent).bold(),
        ))
    };

    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border_default))
        .title(title)
        .style(Style::default().bg(theme.bg_page));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let text = if app.input.is_empty() && matches!(app.mode, AppMode::Input) {
        Text::from(Span::styled(
            "type your answer...",
            Style::default().fg(theme.text_tertiary),
        ))
    } else {
        Text::from(app.input.as_str())
    };

    let paragraph = Paragraph::new(text).style(Style::default().fg(theme.text_primary));
    frame.render_widget(paragraph, inner);

    if matches!(app.mode, AppMode::Input) {
        let (row, col) = cursor_rowcol(&app.input, app.cursor_pos);
        frame.set_cursor_position((
            inner.x + (col as u16).min(inner.width.saturating_sub(1)),
            inner.y + (row as u16).min(inner.height.saturating_sub(1)),
        ));
    }
}

fn cursor_rowcol(input: &str, cursor_pos: usize) -> (usize, usize) {
    let mut row = 0;
    let mut col = 0;
    for c in input.chars().take(cursor_pos) {
        if c == '\n' {
            row += 1;
            col = 0;
        } else {
            col += 1;
        }
    }
    (row, col)
}
