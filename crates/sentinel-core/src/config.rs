use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Normative thresholds and constants — see SPEC_FULL.md §4 and §6.
pub const DEFAULT_QUARANTINE_THRESHOLD: f64 = 0.25;
pub const DEFAULT_BLOCK_THRESHOLD: f64 = 0.55;
pub const DEFAULT_HIGH_CONFIDENCE_OVERRIDE: f64 = 0.60;
pub const DEFAULT_DECAY_FACTOR: f64 = 0.75;
pub const DEFAULT_ESCALATION_PER_TURN: f64 = 0.08;
pub const DEFAULT_CREATIVE_DAMPEN: f64 = 0.4;
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.7;
pub const DEFAULT_DRIFT_LOOKBACK: usize = 3;
pub const DEFAULT_TOPIC_BUFFER_SIZE: usize = 6;
pub const DEFAULT_TOPIC_SNIPPET_CHARS: usize = 200;
pub const DEFAULT_MIN_TURNS_FOR_DRIFT: u64 = 3;
pub const DEFAULT_HARDEN_WRAP_THRESHOLD: f64 = 0.20;

/// Top-level config (sentinel.toml + SENTINEL_* env overrides).
///
/// Every field has a default matching the normative constants above, so the
/// engine and hardener behave per specification with zero configuration —
/// this only exists to let an operator retune scoring without a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SentinelConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub hardener: HardenerConfig,
}

/// Threat Engine tunables (SPEC_FULL.md §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_quarantine_threshold")]
    pub quarantine_threshold: f64,
    #[serde(default = "default_block_threshold")]
    pub block_threshold: f64,
    #[serde(default = "default_high_confidence_override")]
    pub high_confidence_override: f64,
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,
    #[serde(default = "default_escalation_per_turn")]
    pub escalation_per_turn: f64,
    #[serde(default = "default_creative_dampen")]
    pub creative_dampen: f64,
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,
    #[serde(default = "default_drift_lookback")]
    pub drift_lookback: usize,
    #[serde(default = "default_topic_buffer_size")]
    pub topic_buffer_size: usize,
    #[serde(default = "default_topic_snippet_chars")]
    pub topic_snippet_chars: usize,
    #[serde(default = "default_min_turns_for_drift")]
    pub min_turns_for_drift: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quarantine_threshold: default_quarantine_threshold(),
            block_threshold: default_block_threshold(),
            high_confidence_override: default_high_confidence_override(),
            decay_factor: default_decay_factor(),
            escalation_per_turn: default_escalation_per_turn(),
            creative_dampen: default_creative_dampen(),
            drift_threshold: default_drift_threshold(),
            drift_lookback: default_drift_lookback(),
            topic_buffer_size: default_topic_buffer_size(),
            topic_snippet_chars: default_topic_snippet_chars(),
            min_turns_for_drift: default_min_turns_for_drift(),
        }
    }
}

/// Prompt Hardener tunables (SPEC_FULL.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardenerConfig {
    #[serde(default = "default_harden_wrap_threshold")]
    pub wrap_threshold: f64,
}

impl Default for HardenerConfig {
    fn default() -> Self {
        Self {
            wrap_threshold: default_harden_wrap_threshold(),
        }
    }
}

fn default_quarantine_threshold() -> f64 {
    DEFAULT_QUARANTINE_THRESHOLD
}
fn default_block_threshold() -> f64 {
    DEFAULT_BLOCK_THRESHOLD
}
fn default_high_confidence_override() -> f64 {
    DEFAULT_HIGH_CONFIDENCE_OVERRIDE
}
fn default_decay_factor() -> f64 {
    DEFAULT_DECAY_FACTOR
}
fn default_escalation_per_turn() -> f64 {
    DEFAULT_ESCALATION_PER_TURN
}
fn default_creative_dampen() -> f64 {
    DEFAULT_CREATIVE_DAMPEN
}
fn default_drift_threshold() -> f64 {
    DEFAULT_DRIFT_THRESHOLD
}
fn default_drift_lookback() -> usize {
    DEFAULT_DRIFT_LOOKBACK
}
fn default_topic_buffer_size() -> usize {
    DEFAULT_TOPIC_BUFFER_SIZE
}
fn default_topic_snippet_chars() -> usize {
    DEFAULT_TOPIC_SNIPPET_CHARS
}
fn default_min_turns_for_drift() -> u64 {
    DEFAULT_MIN_TURNS_FOR_DRIFT
}
fn default_harden_wrap_threshold() -> f64 {
    DEFAULT_HARDEN_WRAP_THRESHOLD
}

impl SentinelConfig {
    /// Load config from a TOML file with SENTINEL_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `SENTINEL_CONFIG` env var
    ///   3. `./sentinel.toml`
    ///
    /// Falls back to defaults if no file is found at the resolved path —
    /// this config layer tunes the engine, it does not gate the engine's
    /// ability to run.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("SENTINEL_CONFIG").ok())
            .unwrap_or_else(|| "sentinel.toml".to_string());

        let config: SentinelConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SENTINEL_").split("_"))
            .extract()
            .map_err(|e| crate::error::SentinelError::Config(e.to_string()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_normative_constants() {
        let config = SentinelConfig::default();
        assert_eq!(config.engine.quarantine_threshold, 0.25);
        assert_eq!(config.engine.block_threshold, 0.55);
        assert_eq!(config.engine.high_confidence_override, 0.60);
        assert_eq!(config.engine.decay_factor, 0.75);
        assert_eq!(config.engine.escalation_per_turn, 0.08);
        assert_eq!(config.engine.creative_dampen, 0.4);
        assert_eq!(config.engine.drift_threshold, 0.7);
        assert_eq!(config.engine.drift_lookback, 3);
        assert_eq!(config.engine.topic_buffer_size, 6);
        assert_eq!(config.engine.topic_snippet_chars, 200);
        assert_eq!(config.engine.min_turns_for_drift, 3);
        assert_eq!(config.hardener.wrap_threshold, 0.20);
    }

    #[test]
    fn load_with_missing_file_falls_back_to_defaults() {
        let config = SentinelConfig::load(Some("/nonexistent/sentinel.toml"))
            .expect("missing file should not be fatal");
        assert_eq!(config.engine.block_threshold, 0.55);
    }
}
