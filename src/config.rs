use std::path::Path;

use serde::Deserialize;

use crate::error::EngineError;

/// Pass thresholds per assessment component, in raw marks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ComponentThresholds {
    pub question: f64,
    pub short_answer_set: f64,
    pub surprise_test: f64,
    pub assignment: f64,
    pub total: f64,
}

impl Default for ComponentThresholds {
    fn default() -> Self {
        Self {
            question: 3.5,
            short_answer_set: 3.0,
            surprise_test: 5.0,
            assignment: 5.0,
            total: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: ComponentThresholds,
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            toml::from_str(raw).map_err(|err| EngineError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| EngineError::Config(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let t = &self.thresholds;
        for (name, value) in [
            ("question", t.question),
            ("short_answer_set", t.short_answer_set),
            ("surprise_test", t.surprise_test),
            ("assignment", t.assignment),
            ("total", t.total),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::Config(format!(
                    "threshold `{name}` must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
