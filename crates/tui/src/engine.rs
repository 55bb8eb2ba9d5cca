//! Background task that owns the tutor and the active session while the
//! draw loop stays responsive. Commands flow in over an mpsc channel,
//! display events flow back over a broadcast channel.

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use waymark_core::session::{self, Session, TranscriptEntry};
use waymark_core::tutor::{Phase, Tutor};
use waymark_provider::{Provider, ProviderError, Role};

pub const PHASE_BREAK_LABEL: &str = "🎓 Entering study mode";

#[derive(Debug)]
pub enum EngineCommand {
    /// Start the diagnostic dialogue for the current session.
    Begin { cancel: CancellationToken },
    /// One user turn in the current phase.
    Send {
        text: String,
        cancel: CancellationToken,
    },
    /// Confirmed handover to the materials phase.
    EnterMaterials { cancel: CancellationToken },
    /// Abandon the current session and start a fresh one.
    NewSession { cancel: CancellationToken },
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    Delta {
        delta: String,
        full: String,
    },
    TurnComplete {
        full: String,
        phase: Phase,
        report_ready: bool,
    },
    TurnCancelled,
    TurnFailed {
        message: String,
    },
    SessionReset,
}

pub struct Engine {
    provider: Box<dyn Provider>,
    tutor: Tutor,
    session: Session,
}

impl Engine {
    pub fn new(provider: Box<dyn Provider>, tutor: Tutor, session: Session) -> Self {
        Self {
            provider,
            tutor,
            session,
        }
    }

    pub fn spawn(
        mut self,
        mut commands: mpsc::UnboundedReceiver<EngineCommand>,
        events: broadcast::Sender<EngineEvent>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(command) = commands.recv().await {
                self.handle(command, &events).await;
            }
        })
    }

    async fn handle(&mut self, command: EngineCommand, events: &broadcast::Sender<EngineEvent>) {
        match command {
            EngineCommand::Begin { cancel } => {
                self.run_begin(cancel, events).await;
            }

            EngineCommand::Send { text, cancel } => {
                self.session.transcript.push(TranscriptEntry::Message {
                    role: Role::User,
                    content: text.clone(),
                });
                self.persist();

                let result = {
                    let mut on_chunk = chunk_forwarder(events);
                    self.tutor
                        .send(&*self.provider, &text, cancel, &mut on_chunk)
                        .await
                };
                self.finish_turn(result, events);
            }

            EngineCommand::EnterMaterials { cancel } => {
                self.session.transcript.push(TranscriptEntry::PhaseBreak {
                    label: PHASE_BREAK_LABEL.to_string(),
                });

                let result = {
                    let mut on_chunk = chunk_forwarder(events);
                    self.tutor
                        .enter_materials(&*self.provider, cancel, &mut on_chunk)
                        .await
                };
                self.finish_turn(result, events);
            }

            EngineCommand::NewSession { cancel } => {
                self.tutor = Tutor::new(self.tutor.config().clone());
                self.session = Session::new(
                    self.provider.name(),
                    self.tutor.model(),
                    self.tutor.export_state(),
                );
                let _ = events.send(EngineEvent::SessionReset);
                self.run_begin(cancel, events).await;
            }
        }
    }

    async fn run_begin(
        &mut self,
        cancel: CancellationToken,
        events: &broadcast::Sender<EngineEvent>,
    ) {
        let result = {
            let mut on_chunk = chunk_forwarder(events);
            self.tutor
                .begin(&*self.provider, cancel, &mut on_chunk)
                .await
        };
        self.finish_turn(result, events);
    }

    fn finish_turn(&mut self, result: Result<String>, events: &broadcast::Sender<EngineEvent>) {
        match result {
            Ok(full) => {
                self.session.transcript.push(TranscriptEntry::Message {
                    role: Role::Assistant,
                    content: full.clone(),
                });
                self.persist();
                let _ = events.send(EngineEvent::TurnComplete {
                    full,
                    phase: self.tutor.phase(),
                    report_ready: self.tutor.report_ready(),
                });
            }
            Err(err) => {
                let cancelled = err
                    .downcast_ref::<ProviderError>()
                    .is_some_and(ProviderError::is_cancelled);
                // The session keeps whatever the controller kept: the user
                // turn on cancellation, nothing new on failure.
                self.persist();
                if cancelled {
                    let _ = events.send(EngineEvent::TurnCancelled);
                } else {
                    let _ = events.send(EngineEvent::TurnFailed {
                        message: err.to_string(),
                    });
                }
            }
        }
    }

    fn persist(&mut self) {
        self.session.state = self.tutor.export_state();
        if let Err(err) = session::save_session(&mut self.session) {
            tracing::warn!(error = %err, "failed to save session");
        }
    }
}

fn chunk_forwarder(events: &broadcast::Sender<EngineEvent>) -> impl FnMut(&str, &str) + '_ {
    move |delta: &str, full: &str| {
        let _ = events.send(EngineEvent::Delta {
            delta: delta.to_string(),
            full: full.to_string(),
        });
    }
}
