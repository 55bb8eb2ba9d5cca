use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use waymark_provider::{ChatRequest, Message, Provider, ProviderError};

use crate::conversation::Thread;
use crate::prompt;
use crate::streaming;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Diagnostic,
    Materials,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Diagnostic => "diagnostic",
            Phase::Materials => "materials",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    #[error("session not started")]
    NotStarted,

    #[error("a request is already in flight")]
    Busy,

    #[error("cannot switch phase from {from}")]
    InvalidTransition { from: &'static str },

    #[error("no assistant report to hand over")]
    NoReport,
}

#[derive(Debug, Clone)]
pub struct TutorConfig {
    pub model: String,
    pub temperature: Option<f32>,
}

/// Serializable controller state, stored inside a session file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorState {
    pub phase: Phase,
    pub thread: Thread,
}

/// The conversation and phase controller.
///
/// Owns the message history for one session and walks the one-way phase
/// machine: Idle, then Diagnostic, then Materials. Each send pushes the
/// user turn, streams the reply, and appends the assistant turn; a failed
/// call rolls the user turn back, a cancelled call keeps it (the reply is
/// merely incomplete). At most one call is in flight per controller.
pub struct Tutor {
    config: TutorConfig,
    thread: Thread,
    phase: Phase,
    in_flight: Arc<AtomicBool>,
}

struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Tutor {
    pub fn new(config: TutorConfig) -> Self {
        Self {
            config,
            thread: Thread::new(),
            phase: Phase::Idle,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    pub fn config(&self) -> &TutorConfig {
        &self.config
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn system_prompt(&self) -> &'static str {
        match self.phase {
            Phase::Materials => prompt::MATERIALS_PROMPT,
            _ => prompt::DIAGNOSTIC_PROMPT,
        }
    }

    /// True once the latest assistant message carries a roadmap marker and
    /// the handover to the materials phase can be offered.
    pub fn report_ready(&self) -> bool {
        self.phase == Phase::Diagnostic
            && self
                .thread
                .last_assistant_text()
                .is_some_and(prompt::contains_report_marker)
    }

    pub fn export_state(&self) -> TutorState {
        TutorState {
            phase: self.phase,
            thread: self.thread.clone(),
        }
    }

    pub fn import_state(&mut self, state: TutorState) {
        self.phase = state.phase;
        self.thread = state.thread;
    }

    /// Start the diagnostic phase: clear history and send the bootstrap
    /// turn that elicits the model's first question. Nothing is kept if the
    /// opening exchange does not complete, so `begin` can be retried.
    pub async fn begin(
        &mut self,
        provider: &dyn Provider,
        cancel: CancellationToken,
        on_chunk: &mut (dyn FnMut(&str, &str) + Send),
    ) -> Result<String> {
        if self.phase != Phase::Idle {
            return Err(TutorError::InvalidTransition {
                from: self.phase.as_str(),
            }
            .into());
        }

        self.thread.clear();
        self.phase = Phase::Diagnostic;

        let result = self
            .run_send(provider, prompt::BOOTSTRAP_TURN, cancel, on_chunk)
            .await;

        if result.is_err() {
            self.thread.clear();
            self.phase = Phase::Idle;
        }
        result
    }

    /// One user turn in the current phase.
    pub async fn send(
        &mut self,
        provider: &dyn Provider,
        text: &str,
        cancel: CancellationToken,
        on_chunk: &mut (dyn FnMut(&str, &str) + Send),
    ) -> Result<String> {
        if self.phase == Phase::Idle {
            return Err(TutorError::NotStarted.into());
        }
        self.run_send(provider, text, cancel, on_chunk).await
    }

    /// The externally gated diagnostic-to-materials handover. History is
    /// replaced with a single synthetic user turn carrying the report, the
    /// active system prompt switches, and the kick-off turn requests the
    /// first study packet. One-way: the phase never reverts, even if the
    /// kick-off call fails.
    pub async fn enter_materials(
        &mut self,
        provider: &dyn Provider,
        cancel: CancellationToken,
        on_chunk: &mut (dyn FnMut(&str, &str) + Send),
    ) -> Result<String> {
        if self.phase != Phase::Diagnostic {
            return Err(TutorError::InvalidTransition {
                from: self.phase.as_str(),
            }
            .into());
        }
        let report = self
            .thread
            .last_assistant_text()
            .ok_or(TutorError::NoReport)?
            .to_string();

        tracing::debug!(thread = %self.thread.id, "entering materials phase");
        self.phase = Phase::Materials;
        self.thread.reseed(Message::user(report));

        self.run_send(provider, prompt::MATERIALS_KICKOFF_TURN, cancel, on_chunk)
            .await
    }

    async fn run_send(
        &mut self,
        provider: &dyn Provider,
        text: &str,
        cancel: CancellationToken,
        on_chunk: &mut (dyn FnMut(&str, &str) + Send),
    ) -> Result<String> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(TutorError::Busy.into());
        }
        let _guard = InFlightGuard(Arc::clone(&self.in_flight));

        self.thread.push_message(Message::user(text));

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: self.thread.messages().to_vec(),
            system: Some(self.system_prompt().to_string()),
            temperature: self.config.temperature,
        };

        let result = async {
            let stream = provider.chat_stream(&request).await?;
            streaming::aggregate_stream(stream, &cancel, on_chunk).await
        }
        .await;

        match result {
            Ok(full) => {
                self.thread.push_message(Message::assistant(full.clone()));
                Ok(full)
            }
            Err(err) => {
                let cancelled = err
                    .downcast_ref::<ProviderError>()
                    .is_some_and(ProviderError::is_cancelled);
                // A cancelled turn keeps the user message; only a failed
                // call rolls it back.
                if !cancelled {
                    self.thread.pop_message();
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use waymark_provider::{ModelInfo, Role, StreamEvent};

    enum Script {
        Deltas(Vec<&'static str>),
        Fail { status: u16, body: &'static str },
    }

    struct ScriptedProvider {
        script: Mutex<VecDeque<Script>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Script>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn last_request(&self) -> ChatRequest {
            self.requests.lock().unwrap().last().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn default_model(&self) -> &str {
            "test-model"
        }

        async fn chat_stream(
            &self,
            request: &ChatRequest,
        ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
            self.requests.lock().unwrap().push(request.clone());
            match self.script.lock().unwrap().pop_front() {
                Some(Script::Deltas(deltas)) => {
                    let events: Vec<Result<StreamEvent>> = deltas
                        .into_iter()
                        .map(|d| Ok(StreamEvent::TextDelta(d.to_string())))
                        .chain(std::iter::once(Ok(StreamEvent::Done)))
                        .collect();
                    Ok(Box::pin(futures::stream::iter(events)))
                }
                Some(Script::Fail { status, body }) => Err(ProviderError::Http {
                    status,
                    body: body.to_string(),
                }
                .into()),
                None => panic!("scripted provider exhausted"),
            }
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(vec![])
        }
    }

    fn tutor() -> Tutor {
        Tutor::new(TutorConfig {
            model: "test-model".to_string(),
            temperature: Some(0.7),
        })
    }

    const REPORT: &[&str] = &["### 2. Learning Roadmap\n", "📍 Level 2 (YOU ARE HERE)"];

    #[tokio::test]
    async fn begin_bootstraps_the_diagnostic_phase() {
        let provider = ScriptedProvider::new(vec![Script::Deltas(vec!["What topic", "?"])]);
        let mut t = tutor();

        let mut chunks = 0;
        let full = t
            .begin(&provider, CancellationToken::new(), &mut |_, _| chunks += 1)
            .await
            .unwrap();

        assert_eq!(full, "What topic?");
        assert_eq!(chunks, 2);
        assert_eq!(t.phase(), Phase::Diagnostic);

        let messages = t.thread().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, prompt::BOOTSTRAP_TURN);
        assert_eq!(messages[1].role, Role::Assistant);

        let request = provider.last_request();
        assert_eq!(request.system.as_deref(), Some(prompt::DIAGNOSTIC_PROMPT));
        assert_eq!(request.model, "test-model");
    }

    #[tokio::test]
    async fn begin_failure_resets_to_idle_for_retry() {
        let provider = ScriptedProvider::new(vec![
            Script::Fail {
                status: 500,
                body: "boom",
            },
            Script::Deltas(vec!["ok"]),
        ]);
        let mut t = tutor();

        let err = t
            .begin(&provider, CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProviderError>().and_then(ProviderError::status),
            Some(500)
        );
        assert_eq!(t.phase(), Phase::Idle);
        assert_eq!(t.thread().message_count(), 0);

        t.begin(&provider, CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap();
        assert_eq!(t.phase(), Phase::Diagnostic);
    }

    #[tokio::test]
    async fn send_appends_both_turns_on_success() {
        let provider = ScriptedProvider::new(vec![
            Script::Deltas(vec!["q1"]),
            Script::Deltas(vec!["a", "nswer"]),
        ]);
        let mut t = tutor();
        t.begin(&provider, CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap();

        let full = t
            .send(&provider, "my reply", CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap();

        assert_eq!(full, "answer");
        let messages = t.thread().messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].content, "my reply");
        assert_eq!(messages[3].content, "answer");
    }

    #[tokio::test]
    async fn send_in_idle_is_rejected() {
        let provider = ScriptedProvider::new(vec![]);
        let mut t = tutor();
        let err = t
            .send(&provider, "hello", CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TutorError>(),
            Some(TutorError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn failed_send_rolls_back_the_user_turn() {
        let provider = ScriptedProvider::new(vec![
            Script::Deltas(vec!["q1"]),
            Script::Fail {
                status: 429,
                body: r#"{"error":{"message":"quota exceeded"}}"#,
            },
        ]);
        let mut t = tutor();
        t.begin(&provider, CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap();
        let before: Vec<String> = t
            .thread()
            .messages()
            .iter()
            .map(|m| m.content.clone())
            .collect();

        let err = t
            .send(&provider, "reply", CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap_err();

        let status = err
            .downcast_ref::<ProviderError>()
            .and_then(ProviderError::status);
        assert_eq!(status, Some(429));
        assert!(err.to_string().contains("quota exceeded"));

        let after: Vec<String> = t
            .thread()
            .messages()
            .iter()
            .map(|m| m.content.clone())
            .collect();
        assert_eq!(before, after);
        assert_eq!(t.phase(), Phase::Diagnostic);
    }

    #[tokio::test]
    async fn cancelled_send_keeps_the_user_turn_without_a_reply() {
        let provider = ScriptedProvider::new(vec![
            Script::Deltas(vec!["q1"]),
            Script::Deltas(vec!["partial"]),
        ]);
        let mut t = tutor();
        t.begin(&provider, CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut chunks = 0;
        let err = t
            .send(&provider, "reply", cancel, &mut |_, _| chunks += 1)
            .await
            .unwrap_err();

        assert!(err
            .downcast_ref::<ProviderError>()
            .is_some_and(ProviderError::is_cancelled));
        assert_eq!(chunks, 0);

        let messages = t.thread().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].role, Role::User);
        assert_eq!(messages[2].content, "reply");
    }

    #[tokio::test]
    async fn report_marker_gates_the_handover() {
        let provider = ScriptedProvider::new(vec![
            Script::Deltas(vec!["q1"]),
            Script::Deltas(REPORT.to_vec()),
            Script::Deltas(vec!["packet"]),
        ]);
        let mut t = tutor();
        t.begin(&provider, CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap();
        assert!(!t.report_ready());

        let report = t
            .send(&provider, "my answer", CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap();
        assert!(t.report_ready());

        t.enter_materials(&provider, CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap();

        assert_eq!(t.phase(), Phase::Materials);
        assert!(!t.report_ready());

        // History was reseeded: report seed, kick-off turn, packet reply.
        let messages = t.thread().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, report);
        assert_eq!(messages[1].content, prompt::MATERIALS_KICKOFF_TURN);
        assert_eq!(messages[2].content, "packet");

        // The next send carries the materials prompt, not the diagnostic one.
        let request = provider.last_request();
        assert_eq!(request.system.as_deref(), Some(prompt::MATERIALS_PROMPT));
    }

    #[tokio::test]
    async fn handover_is_one_way() {
        let provider = ScriptedProvider::new(vec![
            Script::Deltas(vec!["q1"]),
            Script::Deltas(REPORT.to_vec()),
            Script::Deltas(vec!["packet"]),
        ]);
        let mut t = tutor();
        t.begin(&provider, CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap();
        t.send(&provider, "ans", CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap();
        t.enter_materials(&provider, CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap();

        let err = t
            .enter_materials(&provider, CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TutorError>(),
            Some(TutorError::InvalidTransition { from: "materials" })
        ));
    }

    #[tokio::test]
    async fn handover_without_a_report_is_rejected() {
        let provider = ScriptedProvider::new(vec![]);
        let mut t = tutor();
        // Force the phase without any assistant output.
        t.import_state(TutorState {
            phase: Phase::Diagnostic,
            thread: Thread::new(),
        });

        let err = t
            .enter_materials(&provider, CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TutorError>(),
            Some(TutorError::NoReport)
        ));
    }

    #[tokio::test]
    async fn state_round_trips_through_serde() {
        let provider = ScriptedProvider::new(vec![Script::Deltas(vec!["q1"])]);
        let mut t = tutor();
        t.begin(&provider, CancellationToken::new(), &mut |_, _| {})
            .await
            .unwrap();

        let json = serde_json::to_string(&t.export_state()).unwrap();
        let state: TutorState = serde_json::from_str(&json).unwrap();

        let mut restored = tutor();
        restored.import_state(state);
        assert_eq!(restored.phase(), Phase::Diagnostic);
        assert_eq!(restored.thread().message_count(), 2);
    }
}
