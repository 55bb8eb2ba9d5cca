use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, AppMode};

pub fn handle_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => app.should_quit = true,
            KeyCode::Char('t') => app.enter_materials(),
            KeyCode::Char('n') => app.new_session(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => {
            if matches!(app.mode, AppMode::Streaming) {
                app.cancel_streaming();
            }
        }
        KeyCode::Enter => {
            if key.modifiers.contains(KeyModifiers::ALT) {
                insert_char(app, '\n');
            } else {
                app.send_input();
            }
        }
        KeyCode::Char(c) => insert_char(app, c),
        KeyCode::Backspace => {
            if app.cursor_pos > 0 {
                let idx = byte_index(&app.input, app.cursor_pos - 1);
                app.input.remove(idx);
                app.cursor_pos -= 1;
            }
        }
        KeyCode::Delete => {
            if app.cursor_pos < app.input.chars().count() {
                let idx = byte_index(&app.input, app.cursor_pos);
                app.input.remove(idx);
            }
        }
        KeyCode::Left => {
            app.cursor_pos = app.cursor_pos.saturating_sub(1);
        }
        KeyCode::Right => {
            if app.cursor_pos < app.input.chars().count() {
                app.cursor_pos += 1;
            }
        }
        KeyCode::Home => app.cursor_pos = 0,
        KeyCode::End => app.cursor_pos = app.input.chars().count(),
        KeyCode::Up => app.scroll_offset = app.scroll_offset.saturating_add(1),
        KeyCode::Down => app.scroll_offset = app.scroll_offset.saturating_sub(1),
        KeyCode::PageUp => app.scroll_offset = app.scroll_offset.saturating_add(10),
        KeyCode::PageDown => app.scroll_offset = app.scroll_offset.saturating_sub(10),
        _ => {}
    }
}

fn insert_char(app: &mut App, c: char) {
    let idx = byte_index(&app.input, app.cursor_pos);
    app.input.insert(idx, c);
    app.cursor_pos += 1;
}

fn byte_index(s: &str, char_pos: usize) -> usize {
    s.char_indices()
        .nth(char_pos)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
