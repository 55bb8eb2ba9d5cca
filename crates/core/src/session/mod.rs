use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use waymark_provider::Role;

use crate::prompt;
use crate::tutor::{Phase, TutorState};

const TOPIC_MAX_CHARS: usize = 40;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: String,
    pub topic: String,
    pub phase: Phase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub message_count: usize,
}

/// What the chat surface displays: messages in order, with separator rows
/// marking the phase handover.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TranscriptEntry {
    Message { role: Role, content: String },
    PhaseBreak { label: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub meta: SessionMeta,
    pub transcript: Vec<TranscriptEntry>,
    pub state: TutorState,
}

impl Session {
    pub fn new(provider: &str, model: &str, state: TutorState) -> Self {
        let now = Utc::now();
        Self {
            meta: SessionMeta {
                id: state.thread.id.clone(),
                topic: String::new(),
                phase: state.phase,
                created_at: now,
                updated_at: now,
                provider: provider.to_string(),
                model: model.to_string(),
                message_count: 0,
            },
            transcript: Vec::new(),
            state,
        }
    }

    /// Refresh the derived meta fields from the transcript and state.
    fn refresh_meta(&mut self) {
        self.meta.phase = self.state.phase;
        self.meta.updated_at = Utc::now();
        self.meta.message_count = self
            .transcript
            .iter()
            .filter(|e| matches!(e, TranscriptEntry::Message { .. }))
            .count();
        if self.meta.topic.is_empty() {
            if let Some(topic) = extract_topic(&self.transcript) {
                self.meta.topic = topic;
            }
        }
    }
}

/// The session title: first line of the first user message that is not the
/// bootstrap greeting, truncated.
fn extract_topic(transcript: &[TranscriptEntry]) -> Option<String> {
    let content = transcript.iter().find_map(|e| match e {
        TranscriptEntry::Message {
            role: Role::User,
            content,
        } if content != prompt::BOOTSTRAP_TURN => Some(content),
        _ => None,
    })?;

    let line = content.lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        return None;
    }
    if line.chars().count() > TOPIC_MAX_CHARS {
        let truncated: String = line.chars().take(TOPIC_MAX_CHARS).collect();
        Some(format!("{truncated}…"))
    } else {
        Some(line.to_string())
    }
}

pub fn sessions_dir() -> Result<PathBuf> {
    let dir = waymark_config::Config::data_dir().join("sessions");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn save_session(session: &mut Session) -> Result<()> {
    save_session_in(&sessions_dir()?, session)
}

pub fn load_session(id: &str) -> Result<Session> {
    load_session_in(&sessions_dir()?, id)
}

pub fn list_sessions() -> Result<Vec<SessionMeta>> {
    list_sessions_in(&sessions_dir()?)
}

pub fn delete_session(id: &str) -> Result<()> {
    delete_session_in(&sessions_dir()?, id)
}

fn session_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.json"))
}

pub fn save_session_in(dir: &Path, session: &mut Session) -> Result<()> {
    session.refresh_meta();
    let path = session_path(dir, &session.meta.id);
    let json = serde_json::to_string(session)?;
    std::fs::write(path, json)?;
    tracing::debug!(id = %session.meta.id, "session saved");
    Ok(())
}

pub fn load_session_in(dir: &Path, id: &str) -> Result<Session> {
    let path = session_path(dir, id);
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

pub fn list_sessions_in(dir: &Path) -> Result<Vec<SessionMeta>> {
    let mut sessions = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let json = match std::fs::read_to_string(&path) {
            Ok(j) => j,
            Err(_) => continue,
        };
        let session: Session = match serde_json::from_str(&json) {
            Ok(s) => s,
            Err(_) => continue,
        };
        sessions.push(session.meta);
    }

    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(sessions)
}

pub fn delete_session_in(dir: &Path, id: &str) -> Result<()> {
    let path = session_path(dir, id);
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
