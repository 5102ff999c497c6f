use std::collections::VecDeque;

use sentinel_core::config::EngineConfig;
use serde::Serialize;

/// Mutable per-session state carried across turns.
///
/// Lives behind a `DashMap` entry in `ThreatEngine`, one per `session_id`:
/// cheap concurrent lookups, no global lock held across a turn.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub turn_count: u64,
    pub threat_score: f64,
    pub creative_mode: bool,
    pub creative_declared: bool,
    pub last_topics: VecDeque<String>,
    pub suspicious_turns: u64,
    pub last_updated: i64,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            turn_count: 0,
            threat_score: 0.0,
            creative_mode: false,
            creative_declared: false,
            last_topics: VecDeque::new(),
            suspicious_turns: 0,
            last_updated: chrono::Utc::now().timestamp(),
        }
    }

    /// Push a topic snippet onto the rolling window, evicting the oldest
    /// entry once `topic_buffer_size` is exceeded.
    pub fn push_topic(&mut self, snippet: String, config: &EngineConfig) {
        self.last_topics.push_back(snippet);
        while self.last_topics.len() > config.topic_buffer_size {
            self.last_topics.pop_front();
        }
    }
}

/// Public, read-only view of a session's state, exposed to the dashboard
/// surface without leaking the mutable `VecDeque` buffer directly.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub turn_count: u64,
    pub threat_score: f64,
    pub creative_mode: bool,
    pub suspicious_turns: u64,
    pub last_updated: i64,
}

impl From<&SessionState> for SessionSnapshot {
    fn from(state: &SessionState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            turn_count: state.turn_count,
            threat_score: state.threat_score,
            creative_mode: state.creative_mode,
            suspicious_turns: state.suspicious_turns,
            last_updated: state.last_updated,
        }
    }
}
