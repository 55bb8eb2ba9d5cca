use std::io;

use anyhow::Result;
use crossterm::event::{self, Event};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use waymark_config::Config;
use waymark_core::session::{self, Session, SessionMeta, TranscriptEntry};
use waymark_core::tutor::{Phase, Tutor, TutorConfig};
use waymark_provider::{Provider, Role};

use crate::engine::{Engine, EngineCommand, EngineEvent};
use crate::input::handle_key;
use crate::markdown::MarkdownRenderer;
use crate::spinner::SpinnerState;
use crate::theme::Theme;
use crate::ui::draw;

pub enum AppMode {
    Input,
    Streaming,
}

#[derive(Debug, Clone)]
pub enum DisplayItem {
    Message { role: Role, content: String },
    PhaseBreak { label: String },
}

pub struct App {
    pub mode: AppMode,
    pub input: String,
    pub cursor_pos: usize,
    pub items: Vec<DisplayItem>,
    pub current_stream: String,
    pub status: String,
    pub should_quit: bool,
    pub provider_name: String,
    pub model_name: String,
    pub phase: Phase,
    pub report_ready: bool,
    pub scroll_offset: u16,
    pub recent: Vec<SessionMeta>,
    pub renderer: MarkdownRenderer,
    pub theme: Theme,

    commands: mpsc::UnboundedSender<EngineCommand>,
    events: broadcast::Receiver<EngineEvent>,
    cancel: Option<CancellationToken>,
}

impl App {
    pub fn new(provider: Box<dyn Provider>, config: &Config, resume: Option<Session>) -> Self {
        let provider_name = provider.name().to_string();
        let model_name = resume
            .as_ref()
            .map(|s| s.meta.model.clone())
            .unwrap_or_else(|| provider.default_model().to_string());

        let mut tutor = Tutor::new(TutorConfig {
            model: model_name.clone(),
            temperature: Some(config.chat.temperature),
        });

        let (items, session) = match resume {
            Some(s) => {
                tutor.import_state(s.state.clone());
                (transcript_items(&s.transcript), s)
            }
            None => (
                Vec::new(),
                Session::new(&provider_name, &model_name, tutor.export_state()),
            ),
        };

        let phase = tutor.phase();
        let report_ready = tutor.report_ready();
        let recent = session::list_sessions().unwrap_or_default();

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = broadcast::channel(256);
        Engine::new(provider, tutor, session).spawn(cmd_rx, event_tx);

        let status = format!("{provider_name}/{model_name}");
        Self {
            mode: AppMode::Input,
            input: String::new(),
            cursor_pos: 0,
            items,
            current_stream: String::new(),
            status,
            should_quit: false,
            provider_name,
            model_name,
            phase,
            report_ready,
            scroll_offset: 0,
            recent,
            renderer: MarkdownRenderer::new(),
            theme: Theme::named(&config.tui.theme),
            commands: cmd_tx,
            events: event_rx,
            cancel: None,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        io::stdout().execute(EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        let mut spinner = SpinnerState::new();

        if self.phase == Phase::Idle {
            self.begin();
        }

        loop {
            spinner.tick();
            terminal.draw(|frame| draw(frame, self, &spinner))?;

            if event::poll(std::time::Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    handle_key(self, key);
                }
            }

            loop {
                match self.events.try_recv() {
                    Ok(engine_event) => self.apply_event(engine_event),
                    // Deltas carry the full text so far, so skipped ones are
                    // recovered by the next event.
                    Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }

            if self.should_quit {
                break;
            }
        }

        terminal::disable_raw_mode()?;
        io::stdout().execute(LeaveAlternateScreen)?;
        Ok(())
    }

    fn apply_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Delta { full, .. } => {
                self.current_stream = full;
            }
            EngineEvent::TurnComplete {
                full,
                phase,
                report_ready,
            } => {
                self.items.push(DisplayItem::Message {
                    role: Role::Assistant,
                    content: full,
                });
                self.current_stream.clear();
                self.phase = phase;
                self.report_ready = report_ready;
                self.cancel = None;
                self.mode = AppMode::Input;
                self.status = if report_ready {
                    "report ready: ctrl+t to start studying".to_string()
                } else {
                    self.default_status()
                };
            }
            EngineEvent::TurnCancelled => {
                self.current_stream.clear();
                self.cancel = None;
                self.mode = AppMode::Input;
                // An empty transcript means the opening exchange never
                // completed; the controller is back in Idle.
                if self.items.is_empty() {
                    self.phase = Phase::Idle;
                    self.status = "cancelled (enter retries)".to_string();
                } else {
                    self.status = "cancelled".to_string();
                }
            }
            EngineEvent::TurnFailed { message } => {
                self.current_stream.clear();
                self.cancel = None;
                self.mode = AppMode::Input;
                if self.items.is_empty() {
                    self.phase = Phase::Idle;
                    self.status = format!("{message} (enter retries)");
                } else {
                    self.status = message;
                }
            }
            EngineEvent::SessionReset => {
                self.items.clear();
                self.current_stream.clear();
                self.report_ready = false;
                self.phase = Phase::Diagnostic;
            }
        }
    }

    pub fn default_status(&self) -> String {
        format!("{}/{}", self.provider_name, self.model_name)
    }

    fn arm(&mut self) -> CancellationToken {
        // A new call invalidates any prior token.
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        self.mode = AppMode::Streaming;
        token
    }

    pub fn begin(&mut self) {
        let cancel = self.arm();
        self.phase = Phase::Diagnostic;
        self.status = "starting diagnostic...".to_string();
        let _ = self.commands.send(EngineCommand::Begin { cancel });
    }

    pub fn send_input(&mut self) {
        if matches!(self.mode, AppMode::Streaming) {
            return;
        }
        if self.phase == Phase::Idle {
            self.begin();
            return;
        }
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return;
        }
        self.input.clear();
        self.cursor_pos = 0;
        self.scroll_offset = 0;

        self.items.push(DisplayItem::Message {
            role: Role::User,
            content: text.clone(),
        });

        let cancel = self.arm();
        self.status = "thinking...".to_string();
        let _ = self.commands.send(EngineCommand::Send { text, cancel });
    }

    pub fn enter_materials(&mut self) {
        if !self.report_ready || !matches!(self.mode, AppMode::Input) {
            return;
        }
        self.items.push(DisplayItem::PhaseBreak {
            label: crate::engine::PHASE_BREAK_LABEL.to_string(),
        });
        self.report_ready = false;
        self.phase = Phase::Materials;

        let cancel = self.arm();
        self.status = "preparing study packet...".to_string();
        let _ = self.commands.send(EngineCommand::EnterMaterials { cancel });
    }

    pub fn new_session(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        let cancel = self.arm();
        self.status = "starting new session...".to_string();
        let _ = self.commands.send(EngineCommand::NewSession { cancel });
    }

    pub fn cancel_streaming(&mut self) {
        if let Some(token) = &self.cancel {
            token.cancel();
            self.status = "cancelling...".to_string();
        }
    }
}

fn transcript_items(transcript: &[TranscriptEntry]) -> Vec<DisplayItem> {
    transcript
        .iter()
        .map(|entry| match entry {
            TranscriptEntry::Message { role, content } => DisplayItem::Message {
                role: *role,
                content: content.clone(),
            },
            TranscriptEntry::PhaseBreak { label } => DisplayItem::PhaseBreak {
                label: label.clone(),
            },
        })
        .collect()
}
