use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::app::App;

pub fn draw(frame: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;

    let hint_style = Style::default().fg(theme.text_tertiary);
    let study_style = if app.report_ready {
        Style::default().fg(theme.accent).bold()
    } else {
        hint_style
    };

    let left = Line::from(vec![
        Span::styled(format!(" {}", app.status), Style::default().fg(theme.text_secondary)),
    ]);

    let right = Line::from(vec![
        Span::styled("enter", hint_style.bold()),
        Span::styled(" send  ", hint_style),
        Span::styled("ctrl+t", study_style),
        Span::styled(" study  ", study_style),
        Span::styled("ctrl+n", hint_style.bold()),
        Span::styled(" new  ", hint_style),
        Span::styled("ctrl+c", hint_style.bold()),
        Span::styled(" quit ", hint_style),
    ])
    .alignment(Alignment::Right);

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    frame.render_widget(Paragraph::new(left), halves[0]);
    frame.render_widget(Paragraph::new(right), halves[1]);
}
