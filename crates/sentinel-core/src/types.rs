use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a single message in a chat request, mirroring the OpenAI wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single typed content part, used when a message's `content` is a list
/// rather than a bare string (e.g. multimodal clients).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    /// Any other part type (image, audio, tool reference, ...). Carried
    /// through untouched but contributes nothing to extracted text.
    #[serde(other)]
    Other,
}

/// A message's `content` field: either a bare string or a list of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Join all `text` parts with a space; bare strings pass through as-is.
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Other => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// The content as a bare string, or `None` if it is a typed-parts list.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s),
            Content::Parts(_) => None,
        }
    }
}

/// A single message in an OpenAI-compatible chat request, newest last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Content::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(content.into()),
        }
    }
}

/// Kill-chain stage attributed to a turn, in increasing severity order.
///
/// Adapted from the Promptware kill chain: initial access precedes privilege
/// escalation precedes persistence precedes lateral movement precedes
/// exfiltration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum KillChainStage {
    Clean = 0,
    InitialAccess = 1,
    PrivilegeEscalation = 2,
    Persistence = 3,
    LateralMovement = 4,
    Exfiltration = 5,
}

impl KillChainStage {
    /// Fixed enumeration order; `index` must be in `0..=5`.
    pub fn from_index(index: u8) -> Self {
        match index {
            0 => KillChainStage::Clean,
            1 => KillChainStage::InitialAccess,
            2 => KillChainStage::PrivilegeEscalation,
            3 => KillChainStage::Persistence,
            4 => KillChainStage::LateralMovement,
            5 => KillChainStage::Exfiltration,
            other => panic!("stage index out of range: {other}"),
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            KillChainStage::Clean => "CLEAN",
            KillChainStage::InitialAccess => "INITIAL_ACCESS",
            KillChainStage::PrivilegeEscalation => "PRIVILEGE_ESCALATION",
            KillChainStage::Persistence => "PERSISTENCE",
            KillChainStage::LateralMovement => "LATERAL_MOVEMENT",
            KillChainStage::Exfiltration => "EXFILTRATION",
        }
    }
}

impl fmt::Display for KillChainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Verdict reached for a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Allow,
    Quarantine,
    Block,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allow => write!(f, "ALLOW"),
            Verdict::Quarantine => write!(f, "QUARANTINE"),
            Verdict::Block => write!(f, "BLOCK"),
        }
    }
}

/// Immutable result of a single `analyze` call, serialized to the dashboard
/// with field names preserved exactly (see §6 of the engine specification).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatResult {
    pub score: f64,
    pub stage: String,
    pub stage_index: u8,
    pub verdict: Verdict,
    pub triggered_rules: Vec<String>,
    pub block_reason: Option<String>,
    pub creative_mode: bool,
    pub session_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_as_text_joins_text_parts_with_space() {
        let content = Content::Parts(vec![
            ContentPart::Text {
                text: "hello".into(),
            },
            ContentPart::Other,
            ContentPart::Text {
                text: "world".into(),
            },
        ]);
        assert_eq!(content.as_text(), "hello world");
    }

    #[test]
    fn content_as_text_bare_string_passes_through() {
        let content = Content::Text("hi there".into());
        assert_eq!(content.as_text(), "hi there");
        assert_eq!(content.as_str(), Some("hi there"));
    }

    #[test]
    fn parts_content_has_no_bare_str() {
        let content = Content::Parts(vec![]);
        assert_eq!(content.as_str(), None);
    }

    #[test]
    fn kill_chain_stage_round_trips_through_index() {
        for i in 0..=5u8 {
            let stage = KillChainStage::from_index(i);
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn kill_chain_stage_names_match_the_fixed_enumeration() {
        assert_eq!(KillChainStage::Clean.name(), "CLEAN");
        assert_eq!(KillChainStage::Exfiltration.name(), "EXFILTRATION");
    }
}
