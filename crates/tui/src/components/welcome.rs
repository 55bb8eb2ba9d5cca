use chrono::{DateTime, Utc};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use waymark_core::tutor::Phase;

use crate::app::App;

pub fn draw(frame: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let mut lines: Vec<Line> = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  waymark",
            Style::default().fg(theme.accent).bold(),
        )),
        Line::from(Span::styled(
            "  find your level, then climb from it",
            Style::default().fg(theme.text_secondary),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("  {} · {}", app.provider_name, app.model_name),
            Style::default().fg(theme.text_tertiary),
        )),
    ];

    if !app.recent.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "  recent sessions",
            Style::default().fg(theme.text_secondary).bold(),
        )));
        for meta in app.recent.iter().take(5) {
            let phase = match meta.phase {
                Phase::Materials => "studying",
                _ => "diagnosing",
            };
            let topic = if meta.topic.is_empty() {
                "(new session)"
            } else {
                &meta.topic
            };
            lines.push(Line::from(vec![
                Span::styled(
                    format!("  {topic}"),
                    Style::default().fg(theme.text_primary),
                ),
                Span::styled(
                    format!(
                        "  {phase} · {} messages · {}",
                        meta.message_count,
                        time_ago(meta.updated_at)
                    ),
                    Style::default().fg(theme.text_tertiary),
                ),
            ]));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "  resume one with: waymark --resume <id>  (see: waymark sessions list)",
            Style::default().fg(theme.text_tertiary),
        )));
    }

    frame.render_widget(
        Paragraph::new(lines).style(Style::default().bg(theme.bg_page)),
        area,
    );
}

fn time_ago(at: DateTime<Utc>) -> String {
    let elapsed = Utc::now().signed_duration_since(at);
    if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        format!("{} min ago", elapsed.num_minutes())
    } else if elapsed.num_days() < 1 {
        format!("{} h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 2 {
        "yesterday".to_string()
    } else {
        at.format("%b %-d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_ago_buckets() {
        let now = Utc::now();
        assert_eq!(time_ago(now), "just now");
        assert_eq!(time_ago(now - chrono::Duration::minutes(5)), "5 min ago");
        assert_eq!(time_ago(now - chrono::Duration::hours(3)), "3 h ago");
        assert_eq!(time_ago(now - chrono::Duration::hours(30)), "yesterday");
    }
}
