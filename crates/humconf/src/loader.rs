//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, HumConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/humscribe/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("humscribe/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        let path = expand_path(&path.to_string_lossy());
        if path.exists() {
            files.push(path);
            return files;
        }
    }

    let local = PathBuf::from("humscribe.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and check that it describes a valid config.
///
/// The raw table is returned so that only the keys actually present in the
/// file override earlier layers.
pub fn load_from_file(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

fn parse_toml(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    // Surface type errors against the file that caused them
    from_table(table.clone(), path)?;
    Ok(table)
}

/// Deserialize a (possibly merged) table into a full config.
pub fn from_table(table: toml::Table, path: &Path) -> Result<HumConfig, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Merge `overlay` into `base`, recursing into sub-tables. Overlay wins.
pub fn merge_tables(mut base: toml::Table, overlay: toml::Table) -> toml::Table {
    for (key, value) in overlay {
        let toml::Value::Table(incoming) = value else {
            base.insert(key, value);
            continue;
        };
        if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
            let merged = merge_tables(std::mem::take(existing), incoming);
            *existing = merged;
        } else {
            base.insert(key, toml::Value::Table(incoming));
        }
    }
    base
}

/// Apply `HUMSCRIBE_*` environment variable overrides to config.
pub fn apply_env_overrides(config: &mut HumConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, env::vars());
}

/// Apply overrides from an explicit set of variables.
///
/// Values that fail to parse are ignored and not recorded as sources.
pub fn apply_overrides_from<I>(config: &mut HumConfig, sources: &mut ConfigSources, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut rust_log = None;

    for (key, value) in vars {
        let applied = match key.as_str() {
            "HUMSCRIBE_LOG_LEVEL" => {
                config.logging.level = value;
                true
            }
            // RUST_LOG wins over HUMSCRIBE_LOG_LEVEL regardless of order
            "RUST_LOG" => {
                rust_log = Some(value);
                true
            }
            "HUMSCRIBE_SILENCE_DB" => set_parsed(&mut config.tracker.silence_db, &value),
            "HUMSCRIBE_CONFIDENCE_THRESHOLD" => {
                set_parsed(&mut config.segmenter.confidence_threshold, &value)
            }
            "HUMSCRIBE_QUANTIZE_STEP" => set_parsed(&mut config.quantizer.step, &value),
            "HUMSCRIBE_CHORDS" => set_flag(&mut config.accompaniment.chords, &value),
            "HUMSCRIBE_BASS" => set_flag(&mut config.accompaniment.bass, &value),
            "HUMSCRIBE_HARMONY" => set_flag(&mut config.accompaniment.harmony, &value),
            "HUMSCRIBE_BPM" => set_parsed(&mut config.export.bpm, &value),
            "HUMSCRIBE_PPQ" => set_parsed(&mut config.export.ppq, &value),
            _ => false,
        };
        if applied {
            sources.env_overrides.push(key);
        }
    }

    if let Some(level) = rust_log {
        config.logging.level = level;
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, value: &str) -> bool {
    match value.trim().parse() {
        Ok(parsed) => {
            *slot = parsed;
            true
        }
        Err(_) => false,
    }
}

fn set_flag(slot: &mut bool, value: &str) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => *slot = true,
        "0" | "false" | "no" | "off" => *slot = false,
        _ => return false,
    }
    true
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        let (var_name, rest) = match stripped.find('/') {
            Some(slash_pos) => (&stripped[..slash_pos], Some(&stripped[slash_pos + 1..])),
            None => (stripped, None),
        };
        if let Ok(var_value) = env::var(var_name) {
            let base = PathBuf::from(var_value);
            return match rest {
                Some(rest) => base.join(rest),
                None => base,
            };
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use melody_extract::{DegeneratePolicy, TrailingNotePolicy};

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        assert_eq!(expand_path("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[quantizer]
step = 0.25
"#;
        let table = parse_toml(toml, Path::new("test.toml")).unwrap();
        let config = from_table(table, Path::new("test.toml")).unwrap();
        assert_eq!(config.quantizer.step, 0.25);
        // Other values should be defaults
        assert_eq!(config.tracker.hop, 512);
        assert_eq!(config.segmenter.confidence_threshold, 0.8);
        assert!(config.accompaniment.bass);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[tracker]
window = 4096
hop = 256
fmin = 80.0
silence_db = -50.0

[segmenter]
confidence_threshold = 0.7
trailing = "drop"

[quantizer]
step = 0.0625
degenerate = "clamp"

[key]
weight_by_duration = true

[accompaniment]
harmony = false
bass_duration = 0.5

[export]
bpm = 90.0
ppq = 960

[logging]
level = "debug"
"#;
        let table = parse_toml(toml, Path::new("test.toml")).unwrap();
        let config = from_table(table, Path::new("test.toml")).unwrap();

        assert_eq!(config.tracker.window, 4096);
        assert_eq!(config.tracker.hop, 256);
        assert_eq!(config.tracker.fmin, 80.0);
        assert_eq!(config.tracker.fmax, 1600.0);
        assert_eq!(config.tracker.silence_db, -50.0);
        assert_eq!(config.segmenter.confidence_threshold, 0.7);
        assert_eq!(config.segmenter.trailing, TrailingNotePolicy::Drop);
        assert_eq!(config.quantizer.step, 0.0625);
        assert_eq!(config.quantizer.degenerate, DegeneratePolicy::Clamp);
        assert!(config.key.weight_by_duration);
        assert!(!config.accompaniment.harmony);
        assert!(config.accompaniment.chords);
        assert_eq!(config.accompaniment.bass_duration, 0.5);
        assert_eq!(config.export.bpm, 90.0);
        assert_eq!(config.export.ppq, 960);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_rejects_wrong_type() {
        let toml = r#"
[tracker]
hop = "lots"
"#;
        let err = parse_toml(toml, Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_parse_rejects_invalid_syntax() {
        let err = parse_toml("[tracker\nhop = 1", Path::new("broken.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_merge_later_wins_per_key() {
        let base: toml::Table = "[export]\nbpm = 90.0\nppq = 960\n".parse().unwrap();
        let overlay: toml::Table = "[export]\nbpm = 140.0\n".parse().unwrap();
        let merged = merge_tables(base, overlay);
        let config = from_table(merged, Path::new("merged")).unwrap();
        assert_eq!(config.export.bpm, 140.0);
        // Keys absent from the overlay survive
        assert_eq!(config.export.ppq, 960);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = HumConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(
            &mut config,
            &mut sources,
            vars(&[
                ("HUMSCRIBE_QUANTIZE_STEP", "0.25"),
                ("HUMSCRIBE_HARMONY", "off"),
                ("HUMSCRIBE_BPM", "not-a-number"),
                ("HOME", "/root"),
            ]),
        );
        assert_eq!(config.quantizer.step, 0.25);
        assert!(!config.accompaniment.harmony);
        assert_eq!(config.export.bpm, 120.0);
        assert_eq!(
            sources.env_overrides,
            vec!["HUMSCRIBE_QUANTIZE_STEP".to_string(), "HUMSCRIBE_HARMONY".to_string()]
        );
    }

    #[test]
    fn test_rust_log_beats_log_level() {
        let mut config = HumConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(
            &mut config,
            &mut sources,
            vars(&[("RUST_LOG", "humscribe=trace"), ("HUMSCRIBE_LOG_LEVEL", "warn")]),
        );
        assert_eq!(config.logging.level, "humscribe=trace");
        assert_eq!(sources.env_overrides.len(), 2);
    }
}
