pub mod config;
pub mod error;
pub mod types;

pub use config::SentinelConfig;
pub use error::{Result, SentinelError};
pub use types::{Content, ContentPart, KillChainStage, Message, Role, ThreatResult, Verdict};
