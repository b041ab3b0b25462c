//! Engine configuration.
//!
//! Thresholds are read once at startup from TOML. The daemon layers a main
//! file and a drop-in directory:
//!
//! ```text
//! /etc/sensorfw/sensord.toml
//! /etc/sensorfw/sensord.conf.d/*.toml   (sorted by file name)
//! ```
//!
//! Later files override earlier ones key by key. Loading is lenient: a file
//! that cannot be read or parsed is skipped, and a key with a bad value keeps
//! its default. Both are logged with `warn!`.
//!
//! # Sections
//!
//! | Section         | Struct               |
//! |-----------------|----------------------|
//! | `[orientation]` | [`OrientationConfig`] |
//! | `[cover]`       | [`CoverageConfig`]    |
//! | `[context]`     | [`StabilityConfig`]   |

use std::env;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use toml::{Table, Value};

use crate::coverage::CoverageConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::orientation::OrientationConfig;
use crate::stability::{StabilityConfig, MAX_STABILITY_TIMEOUT_SECS};

/// Default main configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/sensorfw/sensord.toml";

/// Default drop-in directory.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/sensorfw/sensord.conf.d/";

const ORIENTATION_SECTION: &str = "orientation";
const COVER_SECTION: &str = "cover";
const CONTEXT_SECTION: &str = "context";

/// All engine thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub orientation: OrientationConfig,

    #[serde(default)]
    pub cover: CoverageConfig,

    #[serde(default)]
    pub context: StabilityConfig,
}

impl EngineConfig {
    /// Strictly load a single TOML file.
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - `ConfigError::Parse` if the TOML is malformed or a key has the wrong type
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = read(path)?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Strictly parse a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Load the main file followed by every `*.toml` in `dir`.
    ///
    /// Missing files are normal (all defaults). Never fails.
    pub fn load_layered(file: impl AsRef<Path>, dir: impl AsRef<Path>) -> Self {
        let mut merged = Table::new();

        let mut paths = vec![file.as_ref().to_path_buf()];
        paths.extend(drop_in_files(dir.as_ref()));

        for path in &paths {
            if !path.exists() {
                tracing::debug!(path = %path.display(), "config file not present");
                continue;
            }

            let table = match read(path).and_then(|contents| parse_table(path, &contents)) {
                Ok(table) => table,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping config file");
                    continue;
                }
            };

            tracing::debug!(path = %path.display(), "loaded config file");
            merge_tables(&mut merged, table);
        }

        Self::from_table_lenient(&merged)
    }

    /// Build a config from an already merged table, one key at a time.
    pub fn from_table_lenient(table: &Table) -> Self {
        for key in table.keys() {
            if ![ORIENTATION_SECTION, COVER_SECTION, CONTEXT_SECTION].contains(&key.as_str()) {
                tracing::warn!(section = %key, "ignoring unknown config section");
            }
        }

        let config = Self {
            orientation: lenient_section(ORIENTATION_SECTION, table.get(ORIENTATION_SECTION)),
            cover: lenient_section(COVER_SECTION, table.get(COVER_SECTION)),
            context: lenient_section(CONTEXT_SECTION, table.get(CONTEXT_SECTION)),
        };
        config.sanitized()
    }

    /// Apply `CONTEXTD_*` environment overrides.
    ///
    /// | Variable | Config Path |
    /// |----------|-------------|
    /// | `CONTEXTD_STABILITY_TIMEOUT` | `context.stability_timeout` |
    /// | `CONTEXTD_THRESHOLD_LANDSCAPE` | `orientation.threshold_landscape` |
    /// | `CONTEXTD_THRESHOLD_PORTRAIT` | `orientation.threshold_portrait` |
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(timeout) = env_value("CONTEXTD_STABILITY_TIMEOUT") {
            self.context.stability_timeout = timeout;
        }
        if let Some(threshold) = env_value("CONTEXTD_THRESHOLD_LANDSCAPE") {
            self.orientation.threshold_landscape = threshold;
        }
        if let Some(threshold) = env_value("CONTEXTD_THRESHOLD_PORTRAIT") {
            self.orientation.threshold_portrait = threshold;
        }
        self.sanitized()
    }

    /// Serialize to TOML, e.g. for `--dump-config`.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Replace values outside their meaningful range with defaults.
    fn sanitized(mut self) -> Self {
        let orientation = OrientationConfig::default();
        if !(0..=90).contains(&self.orientation.threshold_landscape) {
            tracing::warn!(
                value = self.orientation.threshold_landscape,
                "threshold_landscape out of range, using default"
            );
            self.orientation.threshold_landscape = orientation.threshold_landscape;
        }
        if !(0..=90).contains(&self.orientation.threshold_portrait) {
            tracing::warn!(
                value = self.orientation.threshold_portrait,
                "threshold_portrait out of range, using default"
            );
            self.orientation.threshold_portrait = orientation.threshold_portrait;
        }
        if self.orientation.overflow_min > self.orientation.overflow_max {
            tracing::warn!("overflow_min above overflow_max, using defaults");
            self.orientation.overflow_min = orientation.overflow_min;
            self.orientation.overflow_max = orientation.overflow_max;
        }

        let cover = CoverageConfig::default();
        if !(self.cover.ratio > 0.0 && self.cover.ratio < 1.0) {
            tracing::warn!(value = self.cover.ratio, "cover ratio out of range, using default");
            self.cover.ratio = cover.ratio;
        }
        if !(0.0..1.0).contains(&self.cover.hysteresis) {
            tracing::warn!(value = self.cover.hysteresis, "cover hysteresis out of range, using default");
            self.cover.hysteresis = cover.hysteresis;
        }

        let context = StabilityConfig::default();
        if self.context.stability_timeout <= 0 {
            // Non-positive means default, silently
            self.context.stability_timeout = context.stability_timeout;
        } else if self.context.stability_timeout > MAX_STABILITY_TIMEOUT_SECS {
            tracing::warn!(
                value = self.context.stability_timeout,
                max = MAX_STABILITY_TIMEOUT_SECS,
                "stability_timeout too large, capping"
            );
            self.context.stability_timeout = MAX_STABILITY_TIMEOUT_SECS;
        }
        if !(0.0..1.0).contains(&self.context.hysteresis) {
            tracing::warn!(value = self.context.hysteresis, "context hysteresis out of range, using default");
            self.context.hysteresis = context.hysteresis;
        }

        self
    }
}

fn read(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_table(path: &Path, contents: &str) -> ConfigResult<Table> {
    contents.parse::<Table>().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `*.toml` files in `dir`, sorted by name. A missing directory is empty.
fn drop_in_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    files.sort();
    files
}

/// Merge `overlay` into `base`. Nested tables merge key by key, anything
/// else is replaced.
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Deserialize a section, keeping the default for every key whose value
/// does not fit.
fn lenient_section<T>(name: &str, section: Option<&Value>) -> T
where
    T: Default + Serialize + DeserializeOwned,
{
    let section = match section {
        None => return T::default(),
        Some(Value::Table(section)) => section,
        Some(other) => {
            tracing::warn!(section = name, found = other.type_str(), "config section is not a table");
            return T::default();
        }
    };

    let mut accepted = match Value::try_from(T::default()) {
        Ok(Value::Table(defaults)) => defaults,
        _ => return T::default(),
    };

    for (key, value) in section {
        if !accepted.contains_key(key) {
            tracing::warn!(section = name, key = %key, "ignoring unknown config key");
            continue;
        }

        let mut candidate = accepted.clone();
        candidate.insert(key.clone(), value.clone());
        match T::deserialize(Value::Table(candidate.clone())) {
            Ok(_) => accepted = candidate,
            Err(e) => {
                tracing::warn!(section = name, key = %key, error = %e, "invalid config value, using default");
            }
        }
    }

    T::deserialize(Value::Table(accepted)).unwrap_or_default()
}

fn env_value<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring invalid environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.orientation.threshold_landscape, 25);
        assert_eq!(config.orientation.threshold_portrait, 20);
        assert_eq!(config.cover.ratio, 0.707);
        assert_eq!(config.context.stability_timeout, 60);
    }

    #[test]
    fn test_from_toml_str_partial() {
        let config = EngineConfig::from_toml_str(
            r#"
            [orientation]
            threshold_portrait = 30

            [context]
            stability_timeout = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.orientation.threshold_portrait, 30);
        assert_eq!(config.orientation.threshold_landscape, 25);
        assert_eq!(config.context.stability_timeout, 5);
        assert_eq!(config.cover, CoverageConfig::default());
    }

    #[test]
    fn test_from_file_errors() {
        let dir = TempDir::new().unwrap();

        let missing = EngineConfig::from_file(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[orientation\nthreshold_portrait = 1").unwrap();
        assert!(matches!(EngineConfig::from_file(&broken), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_layered_missing_everything_is_default() {
        let dir = TempDir::new().unwrap();
        let config =
            EngineConfig::load_layered(dir.path().join("sensord.toml"), dir.path().join("conf.d"));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_layered_drop_ins_override_in_name_order() {
        let dir = TempDir::new().unwrap();
        let main = dir.path().join("sensord.toml");
        let conf_d = dir.path().join("sensord.conf.d");
        fs::create_dir(&conf_d).unwrap();

        fs::write(
            &main,
            "[orientation]\nthreshold_landscape = 30\nthreshold_portrait = 15\n",
        )
        .unwrap();
        fs::write(conf_d.join("20-late.toml"), "[orientation]\nthreshold_landscape = 40\n").unwrap();
        fs::write(conf_d.join("10-early.toml"), "[orientation]\nthreshold_landscape = 35\n").unwrap();
        fs::write(conf_d.join("ignored.conf"), "[orientation]\nthreshold_landscape = 80\n").unwrap();

        let config = EngineConfig::load_layered(&main, &conf_d);
        assert_eq!(config.orientation.threshold_landscape, 40);
        // Not overridden by any drop-in
        assert_eq!(config.orientation.threshold_portrait, 15);
    }

    #[test]
    fn test_layered_skips_broken_file() {
        let dir = TempDir::new().unwrap();
        let main = dir.path().join("sensord.toml");
        let conf_d = dir.path().join("conf.d");
        fs::create_dir(&conf_d).unwrap();

        fs::write(&main, "[context]\nstability_timeout = 10\n").unwrap();
        fs::write(conf_d.join("50-broken.toml"), "[context\nstability_timeout = 99").unwrap();

        let config = EngineConfig::load_layered(&main, &conf_d);
        assert_eq!(config.context.stability_timeout, 10);
    }

    #[test]
    fn test_invalid_values_fall_back_per_key() {
        let table: Table = r#"
            [orientation]
            threshold_landscape = "steep"
            threshold_portrait = 22

            [context]
            stability_timeout = -3
            stable_variance = 9.5
            bogus = 1

            [cover]
            ratio = 7.0
        "#
        .parse()
        .unwrap();

        let config = EngineConfig::from_table_lenient(&table);
        assert_eq!(config.orientation.threshold_landscape, 25);
        assert_eq!(config.orientation.threshold_portrait, 22);
        assert_eq!(config.context.stability_timeout, 60);
        assert_eq!(config.context.stable_variance, 9.5);
        assert_eq!(config.cover.ratio, 0.707);
    }

    #[test]
    fn test_layered_caps_oversized_timeout() {
        let dir = TempDir::new().unwrap();
        let main = dir.path().join("sensord.toml");
        let conf_d = dir.path().join("conf.d");
        fs::create_dir(&conf_d).unwrap();

        fs::write(&main, "[context]\nstability_timeout = 30\n").unwrap();
        fs::write(
            conf_d.join("90-typo.toml"),
            "[context]\nstability_timeout = 100000000000\nsample_interval_ms = 0\n",
        )
        .unwrap();

        let config = EngineConfig::load_layered(&main, &conf_d);
        assert_eq!(config.context.stability_timeout, MAX_STABILITY_TIMEOUT_SECS);

        // Building the engine from it stays bounded
        let pipeline = crate::pipeline::ContextPipeline::new(&config);
        assert_eq!(pipeline.samples_processed(), 0);
        assert_eq!(
            config.context.window_capacity(),
            crate::stability::MAX_WINDOW_CAPACITY
        );
    }

    #[test]
    fn test_sanitize_caps_huge_timeout() {
        let config = EngineConfig {
            context: StabilityConfig {
                stability_timeout: i64::MAX,
                ..StabilityConfig::default()
            },
            ..EngineConfig::default()
        }
        .sanitized();
        assert_eq!(config.context.stability_timeout, MAX_STABILITY_TIMEOUT_SECS);
    }

    #[test]
    fn test_integer_accepted_for_float_key() {
        let table: Table = "[context]\nshaky_variance = 400\n".parse().unwrap();
        let config = EngineConfig::from_table_lenient(&table);
        assert_eq!(config.context.shaky_variance, 400.0);
    }

    #[test]
    fn test_out_of_range_threshold() {
        let table: Table = "[orientation]\nthreshold_portrait = 120\n".parse().unwrap();
        let config = EngineConfig::from_table_lenient(&table);
        assert_eq!(config.orientation.threshold_portrait, 20);
    }

    #[test]
    fn test_merge_tables_is_per_key() {
        let mut base: Table = "[a]\nx = 1\ny = 2\n".parse().unwrap();
        let overlay: Table = "[a]\ny = 3\n[b]\nz = 4\n".parse().unwrap();
        merge_tables(&mut base, overlay);

        let expected: Table = "[a]\nx = 1\ny = 3\n[b]\nz = 4\n".parse().unwrap();
        assert_eq!(base, expected);
    }

    #[test]
    fn test_env_overrides() {
        // Only this test touches these variables
        env::set_var("CONTEXTD_STABILITY_TIMEOUT", "15");
        env::set_var("CONTEXTD_THRESHOLD_PORTRAIT", "not-a-number");
        let config = EngineConfig::default().with_env_overrides();
        env::remove_var("CONTEXTD_STABILITY_TIMEOUT");
        env::remove_var("CONTEXTD_THRESHOLD_PORTRAIT");

        assert_eq!(config.context.stability_timeout, 15);
        assert_eq!(config.orientation.threshold_portrait, 20);
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let text = EngineConfig::default().to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), EngineConfig::default());
    }
}
