//! Where log lines go and what they carry
//!
//! A [`LogConfig`] names up to two sinks: the console (stderr) and a
//! rotating file. Either can be switched off by leaving it `None`. File
//! output is always JSONL so runs can be replayed and grepped by `run_id`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or `quire_relay=debug`
    pub level: String,
    pub console: Option<ConsoleSink>,
    pub file: Option<FileSink>,
    /// Which extras a JSON line carries, for every JSON sink
    pub json: JsonFields,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: Some(ConsoleSink::default()),
            file: None,
            json: JsonFields::default(),
        }
    }
}

impl LogConfig {
    /// Colored, human-readable console output at `debug`
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            console: Some(ConsoleSink {
                format: LogFormat::Pretty,
                color: true,
                filter: None,
            }),
            ..Self::default()
        }
    }

    /// No console; JSONL files in `log_dir`, one per day
    pub fn production(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            console: None,
            file: Some(FileSink::in_directory(log_dir)),
            ..Self::default()
        }
    }

    /// Compact console lines, warnings and worse
    pub fn testing() -> Self {
        Self {
            level: "warn".to_string(),
            console: Some(ConsoleSink {
                format: LogFormat::Compact,
                color: false,
                filter: None,
            }),
            ..Self::default()
        }
    }
}

/// Console line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSink {
    pub format: LogFormat,
    /// ANSI colors; ignored for JSON
    pub color: bool,
    /// Extra filter for the console only, applied after the global one
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSink {
    pub directory: PathBuf,
    /// Files are named `<prefix>.<period>.log`, or `<prefix>.log` without rotation
    pub prefix: String,
    pub rotation: Rotation,
    /// Rotated files to keep; `None` keeps all of them
    pub keep: Option<usize>,
}

impl Default for FileSink {
    fn default() -> Self {
        Self::in_directory("./logs")
    }
}

impl FileSink {
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: "quire".to_string(),
            rotation: Rotation::Daily,
            keep: Some(7),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Extras on JSON lines. Event fields are always flattened to the top level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonFields {
    /// The innermost span, which carries `run_id` inside a publish run
    pub current_span: bool,
    /// Every enclosing span
    pub span_list: bool,
    pub source_location: bool,
    pub thread_ids: bool,
}

impl Default for JsonFields {
    fn default() -> Self {
        Self {
            current_span: true,
            span_list: false,
            source_location: false,
            thread_ids: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let default = LogConfig::default();
        assert_eq!(default.level, "info");
        assert_eq!(default.console.map(|c| c.format), Some(LogFormat::Json));
        assert!(default.file.is_none());

        let dev = LogConfig::development();
        assert_eq!(dev.level, "debug");
        assert!(dev.console.is_some_and(|c| c.color && c.format == LogFormat::Pretty));

        let prod = LogConfig::production("/var/log/quire");
        assert!(prod.console.is_none());
        assert_eq!(prod.file.map(|f| f.directory), Some(PathBuf::from("/var/log/quire")));

        assert_eq!(LogConfig::testing().level, "warn");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: LogConfig = toml::from_str(
            r#"
level = "quire_relay=trace"

[file]
directory = "/tmp/quire"
rotation = "never"
"#,
        )
        .unwrap();

        assert_eq!(config.level, "quire_relay=trace");
        assert_eq!(config.console, Some(ConsoleSink::default()));
        let file = config.file.unwrap();
        assert_eq!(file.prefix, "quire");
        assert_eq!(file.rotation, Rotation::Never);
        assert_eq!(file.keep, Some(7));
        assert!(config.json.current_span);
    }
}
