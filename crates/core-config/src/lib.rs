//! Configuration loading and parsing.
//!
//! Parses `keyward.toml` (or an override path provided by the binary) into
//! engine tunables. Every field has a default so an absent or partial file is
//! valid. Unknown fields are ignored; a file that fails to parse falls back to
//! defaults with a warning rather than aborting startup.

use anyhow::Result;
use core_actions::EngineSettings;
use core_behavior::{RecommendationSettings, TrackerSettings};
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize, Clone)]
pub struct SequenceConfig {
    #[serde(default = "SequenceConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

impl SequenceConfig {
    const fn default_timeout_ms() -> u64 {
        500
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BehaviorConfig {
    #[serde(default = "BehaviorConfig::default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "BehaviorConfig::default_persisted_history")]
    pub persisted_history: usize,
    #[serde(default = "BehaviorConfig::default_persist_every")]
    pub persist_every: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            history_capacity: Self::default_history_capacity(),
            persisted_history: Self::default_persisted_history(),
            persist_every: Self::default_persist_every(),
        }
    }
}

impl BehaviorConfig {
    const fn default_history_capacity() -> usize {
        50
    }
    const fn default_persisted_history() -> usize {
        20
    }
    const fn default_persist_every() -> u32 {
        10
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecommendationConfig {
    #[serde(default = "RecommendationConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "RecommendationConfig::default_min_uses")]
    pub min_uses: u64,
    #[serde(default = "RecommendationConfig::default_score_threshold")]
    pub score_threshold: f64,
    #[serde(default = "RecommendationConfig::default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "RecommendationConfig::default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "RecommendationConfig::default_max_per_session")]
    pub max_per_session: u32,
    #[serde(default = "RecommendationConfig::default_auto_dismiss_ms")]
    pub auto_dismiss_ms: u64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            min_uses: Self::default_min_uses(),
            score_threshold: Self::default_score_threshold(),
            pool_size: Self::default_pool_size(),
            cooldown_ms: Self::default_cooldown_ms(),
            max_per_session: Self::default_max_per_session(),
            auto_dismiss_ms: Self::default_auto_dismiss_ms(),
        }
    }
}

impl RecommendationConfig {
    const fn default_enabled() -> bool {
        true
    }
    const fn default_min_uses() -> u64 {
        5
    }
    const fn default_score_threshold() -> f64 {
        0.3
    }
    const fn default_pool_size() -> usize {
        5
    }
    const fn default_cooldown_ms() -> u64 {
        60_000
    }
    const fn default_max_per_session() -> u32 {
        5
    }
    const fn default_auto_dismiss_ms() -> u64 {
        10_000
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct StorageConfig {
    /// FileStore directory override.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub sequence: SequenceConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub recommendation: RecommendationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub path: Option<PathBuf>,
    pub file: ConfigFile,
}

/// `./keyward.toml` when present, else the platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("keyward.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("keyward").join("keyward.toml");
    }
    PathBuf::from("keyward.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        info!(target: "config", path = %path.display(), "config_absent_using_defaults");
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(Config {
                raw: Some(content),
                path: Some(path),
                file,
            })
        }
        Err(e) => {
            warn!(
                target: "config",
                path = %path.display(),
                error = %e,
                "config_parse_failed_using_defaults"
            );
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Typed engine settings. Zero capacities and cadences are raised to 1.
    pub fn engine_settings(&self) -> EngineSettings {
        let b = &self.file.behavior;
        let r = &self.file.recommendation;
        let tracker = TrackerSettings {
            history_capacity: clamp_min_one(b.history_capacity, "behavior.history_capacity"),
            persisted_history: clamp_min_one(b.persisted_history, "behavior.persisted_history"),
            persist_every: clamp_min_one(b.persist_every as usize, "behavior.persist_every") as u32,
        };
        let recommendation = RecommendationSettings {
            enabled: r.enabled,
            min_uses: r.min_uses,
            score_threshold: r.score_threshold,
            pool_size: clamp_min_one(r.pool_size, "recommendation.pool_size"),
            cooldown_ms: r.cooldown_ms,
            max_per_session: r.max_per_session,
            auto_dismiss_ms: r.auto_dismiss_ms,
        };
        EngineSettings {
            sequence_timeout_ms: clamp_min_one(
                self.file.sequence.timeout_ms as usize,
                "sequence.timeout_ms",
            ) as u64,
            tracker,
            recommendation,
        }
    }

    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.file.storage.dir.clone()
    }
}

fn clamp_min_one(value: usize, field: &'static str) -> usize {
    if value == 0 {
        info!(target: "config", field, raw = value, clamped = 1, "config_value_clamped");
        1
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), body).unwrap();
        tmp
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.engine_settings(), EngineSettings::default());
    }

    #[test]
    fn parses_partial_sections() {
        let tmp =
            write_config("[sequence]\ntimeout_ms = 800\n\n[recommendation]\ncooldown_ms = 5000\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let settings = cfg.engine_settings();
        assert_eq!(settings.sequence_timeout_ms, 800);
        assert_eq!(settings.recommendation.cooldown_ms, 5000);
        assert_eq!(settings.recommendation.min_uses, 5);
        assert_eq!(settings.tracker.history_capacity, 50);
    }

    #[test]
    fn storage_dir_override() {
        let tmp = write_config("[storage]\ndir = \"/tmp/keyward-data\"\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.storage_dir(), Some(PathBuf::from("/tmp/keyward-data")));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let tmp = write_config(
            "[sequence]\ntimeout_ms = 300\nlegacy = true\n\n[theme]\nname = \"dark\"\n",
        );
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.engine_settings().sequence_timeout_ms, 300);
    }

    #[test]
    fn parse_error_falls_back_to_defaults() {
        let tmp = write_config("[sequence\ntimeout_ms = ");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.engine_settings().sequence_timeout_ms, 500);
    }

    #[test]
    fn zero_values_clamped_with_config_log() {
        let tmp = write_config("[behavior]\npersist_every = 0\nhistory_capacity = 0\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let settings = with_default(subscriber, || cfg.engine_settings());
        assert_eq!(settings.tracker.persist_every, 1);
        assert_eq!(settings.tracker.history_capacity, 1);

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("INFO config:"));
        assert!(log_output.contains("config_value_clamped"));
        assert!(log_output.contains("behavior.persist_every"));
    }
}
