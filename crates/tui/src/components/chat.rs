use ratatui::prelude::*;
use ratatui::widgets::*;

use waymark_provider::Role;

use crate::app::{App, DisplayItem};

pub fn draw(frame: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;

    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border_default))
        .title(Line::from(Span::styled(
            " waymark ",
            Style::default().fg(theme.accent).bold(),
        )))
        .title_alignment(Alignment::Center)
        .style(Style::default().bg(theme.bg_page));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();

    for item in &app.items {
        match item {
            DisplayItem::Message { role, content } => {
                lines.push(Line::from(""));
                match role {
                    Role::User => {
                        for (i, text_line) in content.lines().enumerate() {
                            let prefix = if i == 0 { "  › " } else { "    " };
                            lines.push(Line::from(Span::styled(
                                format!("{prefix}{text_line}"),
                                Style::default().fg(theme.text_primary).bold(),
                            )));
                        }
                    }
                    _ => {
                        lines.extend(app.renderer.render(content, theme));
                    }
                }
            }
            DisplayItem::PhaseBreak { label } => {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    format!("  ──────  {label}  ──────"),
                    Style::default().fg(theme.warning),
                )));
            }
        }
    }

    if !app.current_stream.is_empty() {
        lines.push(Line::from(""));
        lines.extend(app.renderer.render(&app.current_stream, theme));
        lines.push(Line::from(Span::styled(
            "  ▌",
            Style::default().fg(theme.accent),
        )));
    }

    let total_lines = lines.len() as u16;
    let visible = inner.height;
    let auto_scroll = total_lines.saturating_sub(visible);

    let scroll = if app.scroll_offset > 0 {
        auto_scroll.saturating_sub(app.scroll_offset)
    } else {
        auto_scroll
    };

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .style(Style::default().bg(theme.bg_page));

    frame.render_widget(paragraph, inner);
}
