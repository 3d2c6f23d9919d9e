//! Resolves which LLM client and model the host is running under, so that
//! saved tokens can be priced.
//!
//! Detection runs at most once per [`LlmDetector`]; the caller owns the
//! detector and shares it (usually behind an `Arc`) for the session.

use crate::config::Config;
use crate::models::pricing::{CostSavings, DEFAULT_MODEL, PricingManager};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const CLIENT_CONFIG_OVERRIDE: &str = "config-override";
pub const CLIENT_UNKNOWN: &str = "unknown";

/// An environment variable that identifies a desktop/IDE host.
struct HostSignal {
    var: &'static str,
    /// Required value, or `None` when presence alone is enough.
    value: Option<&'static str>,
    client: &'static str,
    model: &'static str,
}

const HOST_SIGNALS: &[HostSignal] = &[
    HostSignal {
        var: "CLAUDECODE",
        value: Some("1"),
        client: "claude-code",
        model: "claude-sonnet-4",
    },
    HostSignal {
        var: "CLAUDE_CODE_ENTRYPOINT",
        value: None,
        client: "claude-code",
        model: "claude-sonnet-4",
    },
    HostSignal {
        var: "CURSOR_TRACE_ID",
        value: None,
        client: "cursor",
        model: "claude-sonnet-4",
    },
    HostSignal {
        var: "TERM_PROGRAM",
        value: Some("vscode"),
        client: "vscode",
        model: "gpt-4o",
    },
];

/// SDK-style variables naming a model directly: (variable, client tag).
const SDK_MODEL_VARS: &[(&str, &str)] = &[
    ("ANTHROPIC_MODEL", "anthropic-sdk"),
    ("OPENAI_MODEL", "openai-sdk"),
    ("GEMINI_MODEL", "gemini-sdk"),
];

/// Snapshot of the environment variables detection looks at.
#[derive(Debug, Clone, Default)]
pub struct HostSignals {
    vars: HashMap<String, String>,
}

impl HostSignals {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, var: &str) -> Option<&str> {
        self.vars.get(var).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub client: String,
    pub model: String,
}

impl Detection {
    fn new(client: &str, model: &str) -> Self {
        Self {
            client: client.to_string(),
            model: model.to_string(),
        }
    }
}

/// Prices saved tokens for the recorder.
///
/// An `Err` means no cost block is attached; the record is still written.
pub trait CostEstimator: Send + Sync {
    fn estimate(&self, tokens_saved: i64) -> anyhow::Result<CostSavings>;
}

#[derive(Debug)]
pub struct LlmDetector {
    config_path: Option<PathBuf>,
    signals: HostSignals,
    pricing: PricingManager,
    detected: OnceLock<Detection>,
}

impl LlmDetector {
    pub fn new(config_path: Option<PathBuf>, signals: HostSignals) -> Self {
        Self {
            config_path,
            signals,
            pricing: PricingManager::new(),
            detected: OnceLock::new(),
        }
    }

    /// Detector reading the default config file and the process environment.
    pub fn from_environment() -> Self {
        let config_path = match Config::default_path() {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Cannot locate config file, skipping model override: {e:#}");
                None
            }
        };
        Self::new(config_path, HostSignals::from_process())
    }

    pub fn pricing(&self) -> &PricingManager {
        &self.pricing
    }

    /// Resolve client and model. The first call does the work; later calls
    /// return the cached value without touching config or environment.
    pub fn detect(&self) -> &Detection {
        self.detected.get_or_init(|| {
            let detection = self.resolve();
            debug!(client = %detection.client, model = %detection.model, "LLM detected");
            detection
        })
    }

    fn resolve(&self) -> Detection {
        if let Some(model) = self.config_model() {
            if self.pricing.contains(&model) {
                return Detection::new(CLIENT_CONFIG_OVERRIDE, &model);
            }
            warn!("Configured model '{model}' has no pricing entry, ignoring override");
        }

        for signal in HOST_SIGNALS {
            let matched = match (self.signals.get(signal.var), signal.value) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
                (None, _) => false,
            };
            if matched {
                return Detection::new(signal.client, signal.model);
            }
        }

        for (var, client) in SDK_MODEL_VARS {
            if let Some(model) = self.signals.get(var) {
                if self.pricing.contains(model) {
                    return Detection::new(client, model);
                }
                debug!("{var}={model} has no pricing entry");
            }
        }

        Detection::new(CLIENT_UNKNOWN, DEFAULT_MODEL)
    }

    /// Model named in the config file, if the file exists and is readable.
    fn config_model(&self) -> Option<String> {
        let path = self.config_path.as_ref()?;
        if !path.exists() {
            return None;
        }

        match Config::load_from(path) {
            Ok(config) => config.pricing.model.filter(|m| !m.trim().is_empty()),
            Err(e) => {
                warn!("Ignoring unusable config for model detection: {e:#}");
                None
            }
        }
    }

    /// Price `tokens_saved` with `model`, or the detected model when `None`.
    pub fn calculate_cost_savings(&self, tokens_saved: f64, model: Option<&str>) -> CostSavings {
        let detection = self.detect();
        let model = model.unwrap_or(detection.model.as_str());
        self.pricing
            .calculate_cost_savings(tokens_saved, model, &detection.client)
    }
}

impl CostEstimator for LlmDetector {
    fn estimate(&self, tokens_saved: i64) -> anyhow::Result<CostSavings> {
        Ok(self.calculate_cost_savings(tokens_saved as f64, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn no_signals() -> HostSignals {
        HostSignals::default()
    }

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_fallback_is_unknown_default_model() {
        let detector = LlmDetector::new(None, no_signals());
        assert_eq!(detector.detect(), &Detection::new("unknown", DEFAULT_MODEL));
    }

    #[test]
    fn test_config_override_wins_over_host() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[pricing]\nmodel = \"claude-opus-4\"\n");
        let detector = LlmDetector::new(
            Some(path),
            HostSignals::from_pairs([("CLAUDECODE", "1")]),
        );
        assert_eq!(
            detector.detect(),
            &Detection::new("config-override", "claude-opus-4")
        );
    }

    #[test]
    fn test_unpriced_config_model_falls_through() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[pricing]\nmodel = \"not-a-model\"\n");
        let detector = LlmDetector::new(Some(path), no_signals());
        assert_eq!(detector.detect().client, "unknown");
    }

    #[test]
    fn test_malformed_config_degrades_silently() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "{ \"model\": not toml at all");
        let detector = LlmDetector::new(
            Some(path),
            HostSignals::from_pairs([("CURSOR_TRACE_ID", "abc")]),
        );
        assert_eq!(detector.detect(), &Detection::new("cursor", "claude-sonnet-4"));
    }

    #[test]
    fn test_missing_config_is_ignored() {
        let dir = TempDir::new().unwrap();
        let detector = LlmDetector::new(Some(dir.path().join("absent.toml")), no_signals());
        assert_eq!(detector.detect().client, "unknown");
    }

    #[test]
    fn test_host_signals() {
        let detector = LlmDetector::new(None, HostSignals::from_pairs([("CLAUDECODE", "1")]));
        assert_eq!(detector.detect().client, "claude-code");

        let detector = LlmDetector::new(None, HostSignals::from_pairs([("TERM_PROGRAM", "vscode")]));
        assert_eq!(detector.detect(), &Detection::new("vscode", "gpt-4o"));

        let detector = LlmDetector::new(None, HostSignals::from_pairs([("TERM_PROGRAM", "iTerm.app")]));
        assert_eq!(detector.detect().client, "unknown");
    }

    #[test]
    fn test_sdk_model_override() {
        let detector = LlmDetector::new(
            None,
            HostSignals::from_pairs([("ANTHROPIC_MODEL", "claude-haiku-4-5")]),
        );
        assert_eq!(
            detector.detect(),
            &Detection::new("anthropic-sdk", "claude-haiku-4-5")
        );

        let detector = LlmDetector::new(
            None,
            HostSignals::from_pairs([("OPENAI_MODEL", "some-private-finetune")]),
        );
        assert_eq!(detector.detect().client, "unknown");
    }

    #[test]
    fn test_detection_is_cached() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[pricing]\nmodel = \"claude-opus-4\"\n");
        let detector = LlmDetector::new(Some(path.clone()), no_signals());
        assert_eq!(detector.detect().model, "claude-opus-4");

        // Later config edits are not observed by the same detector.
        fs::write(&path, "[pricing]\nmodel = \"gpt-4o\"\n").unwrap();
        assert_eq!(detector.detect().model, "claude-opus-4");
        assert_eq!(LlmDetector::new(Some(path), no_signals()).detect().model, "gpt-4o");
    }

    #[test]
    fn test_calculate_cost_savings_uses_detection() {
        let detector = LlmDetector::new(None, HostSignals::from_pairs([("CLAUDECODE", "1")]));
        let result = detector.calculate_cost_savings(1_000_000.0, None);
        assert_eq!(result.model, "claude-sonnet-4");
        assert_eq!(result.client, "claude-code");
        assert_eq!(result.cost_savings_usd, 3.0);

        let zero = detector.calculate_cost_savings(-100.0, None);
        assert_eq!(zero.cost_savings_usd, 0.0);
        assert_eq!(zero.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_estimator_trait() {
        let detector = LlmDetector::new(None, no_signals());
        let cost = detector.estimate(12_345).unwrap();
        assert_eq!(cost.cost_savings_usd, 0.04);
    }
}
