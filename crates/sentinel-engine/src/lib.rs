pub mod engine;
pub mod rules;
pub mod session;

pub use engine::ThreatEngine;
pub use session::{SessionSnapshot, SessionState};
