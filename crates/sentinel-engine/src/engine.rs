use dashmap::DashMap;
use sentinel_core::config::EngineConfig;
use sentinel_core::types::{KillChainStage, Message, Role, ThreatResult, Verdict};
use tracing::{debug, instrument, warn};

use crate::rules::{CREATIVE_PATTERN, RULES, TOPIC_DRIFT_RULE_NAME};
use crate::session::{SessionSnapshot, SessionState};

/// Multi-turn threat scoring engine.
///
/// One `SessionState` per `session_id`, held in a `DashMap` — independent
/// sessions never contend on the same shard lock.
pub struct ThreatEngine {
    sessions: DashMap<String, SessionState>,
    config: EngineConfig,
}

impl ThreatEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Score a single turn for `session_id` given the full message history
    /// (newest last), updating that session's rolling state.
    #[instrument(skip(self, messages), fields(session_id = %session_id))]
    pub fn analyze(&self, session_id: &str, messages: &[Message]) -> ThreatResult {
        let mut session = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionState::new(session_id));

        session.turn_count += 1;
        session.last_updated = chrono::Utc::now().timestamp();

        let text = extract_last_user_message(messages);
        let full_text = extract_full_text(messages);

        let mut triggered_rules = Vec::new();
        let mut rule_scores = Vec::new();
        let mut block_reasons = Vec::new();
        let mut highest_stage: u8 = 0;

        for rule in RULES.iter() {
            if rule.pattern.is_match(&text) {
                triggered_rules.push(rule.name.to_string());
                rule_scores.push(rule.weight);
                block_reasons.push(rule.description.to_string());
                highest_stage = highest_stage.max(rule.stage_index);
            }
        }

        if CREATIVE_PATTERN.is_match(&full_text) {
            session.creative_mode = true;
            session.creative_declared = true;
        }

        let drift = compute_topic_drift(&session, &text, &self.config);
        if drift > self.config.drift_threshold && session.turn_count > self.config.min_turns_for_drift {
            let drift_score = drift * 0.25;
            rule_scores.push(drift_score);
            triggered_rules.push(TOPIC_DRIFT_RULE_NAME.to_string());
            block_reasons.push(format!(
                "Significant topic drift detected across turns (drift={drift:.2}) — \
                 possible multi-turn grooming attack building toward a later-stage payload"
            ));
            highest_stage = highest_stage.max(1);
        }

        let mut base_score = if rule_scores.is_empty() {
            0.0
        } else {
            1.0 - rule_scores.iter().fold(1.0, |acc, s| acc * (1.0 - s))
        };

        if session.creative_mode && !triggered_rules.iter().any(|r| r == "MALICIOUS_PERSONA") {
            base_score *= self.config.creative_dampen;
        }

        if triggered_rules.is_empty() {
            session.threat_score = (session.threat_score * self.config.decay_factor).max(0.0);
        } else {
            session.suspicious_turns += 1;
            let escalation =
                (session.suspicious_turns as f64 * self.config.escalation_per_turn).min(1.0);
            session.threat_score = (base_score + escalation).min(1.0);
            debug!(score = session.threat_score, rules = ?triggered_rules, "turn flagged");
        }

        let snippet: String = text.chars().take(self.config.topic_snippet_chars).collect();
        session.push_topic(snippet, &self.config);

        let score = session.threat_score;
        let mut verdict = if score >= self.config.block_threshold && !session.creative_mode {
            Verdict::Block
        } else if score >= self.config.block_threshold && session.creative_mode && highest_stage >= 3 {
            Verdict::Block
        } else if score >= self.config.quarantine_threshold {
            Verdict::Quarantine
        } else {
            Verdict::Allow
        };

        if rule_scores
            .iter()
            .any(|s| *s >= self.config.high_confidence_override)
        {
            verdict = Verdict::Block;
            highest_stage = highest_stage.max(2);
        }

        if verdict == Verdict::Block {
            warn!(session_id, score, stage = highest_stage, "turn blocked");
        }

        let stage = KillChainStage::from_index(highest_stage);

        let block_reason = block_reasons.first().map(|first| {
            if block_reasons.len() > 1 {
                format!(
                    "{first} [+{} additional signal(s): {}]",
                    block_reasons.len() - 1,
                    triggered_rules[1..].join(", ")
                )
            } else {
                first.clone()
            }
        });

        ThreatResult {
            score: round3(score),
            stage: stage.name().to_string(),
            stage_index: highest_stage,
            verdict,
            triggered_rules,
            block_reason,
            creative_mode: session.creative_mode,
            session_id: session_id.to_string(),
        }
    }

    /// Drop a session's state entirely, as if it had never been seen.
    pub fn reset_session(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Clear all sessions, mirroring the dashboard's "reset" control.
    pub fn reset_all(&self) {
        self.sessions.clear();
    }

    /// Read-only snapshot of a session's current state, for the dashboard.
    pub fn session_snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.sessions.get(session_id).map(|s| SessionSnapshot::from(s.value()))
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn extract_last_user_message(messages: &[Message]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_text())
        .unwrap_or_default()
}

/// Join every message's content with a space, substituting the empty string
/// for typed-parts content rather than dropping that message's position —
/// only plain-string messages contribute actual text toward creative-mode
/// detection, but every message still occupies a slot in the join.
fn extract_full_text(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| m.content.as_str().unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Vocabulary-overlap drift heuristic: how much the current turn's wording
/// diverges from the last few turns. High drift across many turns is a
/// grooming signal — a slow pivot toward a payload the early turns wouldn't
/// have gotten past moderation.
fn compute_topic_drift(session: &SessionState, current_text: &str, config: &EngineConfig) -> f64 {
    if session.last_topics.len() < 2 {
        return 0.0;
    }
    let current_lower = current_text.to_lowercase();

    let mut recent_words = std::collections::HashSet::new();
    let lookback = config.drift_lookback.min(session.last_topics.len());
    let lowers: Vec<String> = session
        .last_topics
        .iter()
        .rev()
        .take(lookback)
        .map(|t| t.to_lowercase())
        .collect();
    for t in &lowers {
        recent_words.extend(t.split_whitespace());
    }
    if recent_words.is_empty() {
        return 0.0;
    }

    let current_set: std::collections::HashSet<&str> = current_lower.split_whitespace().collect();
    let overlap = current_set.intersection(&recent_words).count() as f64;
    let denom = current_set.len().max(1) as f64;
    (1.0 - (overlap / denom) - 0.2).max(0.0)
}
