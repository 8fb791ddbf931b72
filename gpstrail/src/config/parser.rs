//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;

use super::defaults::clamp_writer_queue;
use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [tracking] section
    if let Some(section) = ini.section(Some("tracking")) {
        if let Some(v) = section.get("retention_secs") {
            config.tracking.retention_secs = parse_positive(v, "tracking", "retention_secs")?;
        }
        if let Some(v) = section.get("update_interval_ms") {
            config.tracking.update_interval_ms =
                parse_positive(v, "tracking", "update_interval_ms")?;
        }
        if let Some(v) = section.get("priority") {
            config.tracking.priority =
                v.parse()
                    .map_err(|reason: String| ConfigFileError::InvalidValue {
                        section: "tracking".to_string(),
                        key: "priority".to_string(),
                        value: v.to_string(),
                        reason: format!(
                            "{}; must be one of: high_accuracy, balanced, low_power, passive",
                            reason
                        ),
                    })?;
        }
        if let Some(v) = section.get("max_wait_ms") {
            config.tracking.max_wait_ms =
                v.trim()
                    .parse()
                    .map_err(|_| ConfigFileError::InvalidValue {
                        section: "tracking".to_string(),
                        key: "max_wait_ms".to_string(),
                        value: v.to_string(),
                        reason: "must be a non-negative integer (milliseconds)".to_string(),
                    })?;
        }
        if let Some(v) = section.get("eviction") {
            config.tracking.eviction =
                v.parse()
                    .map_err(|_| ConfigFileError::InvalidValue {
                        section: "tracking".to_string(),
                        key: "eviction".to_string(),
                        value: v.to_string(),
                        reason: "must be 'stop_at_first_fresh' or 'exhaustive'".to_string(),
                    })?;
        }
        if let Some(v) = section.get("event_buffer") {
            let buffer: u64 = parse_positive(v, "tracking", "event_buffer")?;
            config.tracking.event_buffer = usize::try_from(buffer).unwrap_or(usize::MAX);
        }
    }

    // [storage] section
    if let Some(section) = ini.section(Some("storage")) {
        if let Some(v) = section.get("database") {
            let v = v.trim();
            if !v.is_empty() {
                config.storage.database = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("writer_queue") {
            let requested: usize =
                v.trim()
                    .parse()
                    .map_err(|_| ConfigFileError::InvalidValue {
                        section: "storage".to_string(),
                        key: "writer_queue".to_string(),
                        value: v.to_string(),
                        reason: "must be a positive integer".to_string(),
                    })?;
            config.storage.writer_queue = clamp_writer_queue(requested);
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if v.is_empty() || v.contains(['/', '\\']) {
                return Err(ConfigFileError::InvalidValue {
                    section: "logging".to_string(),
                    key: "file".to_string(),
                    value: v.to_string(),
                    reason: "must be a plain file name".to_string(),
                });
            }
            config.logging.file = v.to_string();
        }
    }

    Ok(config)
}

fn parse_positive(value: &str, section: &str, key: &str) -> Result<u64, ConfigFileError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be a positive integer".to_string(),
        }),
    }
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use crate::provider::LocationPriority;
    use crate::window::EvictionScan;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_tracking_section() {
        let config = parse(
            "[tracking]\n\
             retention_secs = 600\n\
             update_interval_ms = 1000\n\
             priority = balanced\n\
             max_wait_ms = 5000\n\
             eviction = exhaustive\n\
             event_buffer = 64\n",
        )
        .unwrap();

        assert_eq!(config.tracking.retention_secs, 600);
        assert_eq!(config.tracking.update_interval_ms, 1000);
        assert_eq!(
            config.tracking.priority,
            LocationPriority::BalancedPowerAccuracy
        );
        assert_eq!(config.tracking.max_wait_ms, 5000);
        assert_eq!(config.tracking.eviction, EvictionScan::Exhaustive);
        assert_eq!(config.tracking.event_buffer, 64);
    }

    #[test]
    fn test_zero_retention_rejected() {
        let err = parse("[tracking]\nretention_secs = 0\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "tracking");
                assert_eq!(key, "retention_secs");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_priority_rejected() {
        let err = parse("[tracking]\npriority = fastest\n").unwrap_err();
        assert!(err.to_string().contains("tracking.priority"));
    }

    #[test]
    fn test_invalid_eviction_rejected() {
        assert!(parse("[tracking]\neviction = sometimes\n").is_err());
    }

    #[test]
    fn test_zero_event_buffer_rejected() {
        assert!(parse("[tracking]\nevent_buffer = 0\n").is_err());
    }

    #[test]
    fn test_storage_section() {
        let config = parse("[storage]\ndatabase = /var/lib/gpstrail/trail.db\nwriter_queue = 32\n")
            .unwrap();

        assert_eq!(
            config.storage.database,
            PathBuf::from("/var/lib/gpstrail/trail.db")
        );
        assert_eq!(config.storage.writer_queue, 32);
    }

    #[test]
    fn test_writer_queue_is_clamped() {
        let config = parse("[storage]\nwriter_queue = 0\n").unwrap();
        assert_eq!(config.storage.writer_queue, MIN_WRITER_QUEUE_SIZE);

        let config = parse("[storage]\nwriter_queue = 9999999\n").unwrap();
        assert_eq!(config.storage.writer_queue, MAX_WRITER_QUEUE_SIZE);
    }

    #[test]
    fn test_empty_database_keeps_default() {
        let config = parse("[storage]\ndatabase =\n").unwrap();
        assert_eq!(config.storage.database, default_database_path());
    }

    #[test]
    fn test_logging_section() {
        let config = parse("[logging]\ndirectory = /tmp/gpstrail-logs\nfile = trail.log\n").unwrap();

        assert_eq!(config.logging.directory, PathBuf::from("/tmp/gpstrail-logs"));
        assert_eq!(config.logging.file, "trail.log");
    }

    #[test]
    fn test_log_file_with_separator_rejected() {
        assert!(parse("[logging]\nfile = nested/trail.log\n").is_err());
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/trail.db"), home.join("trail.db"));
        }
        assert_eq!(expand_tilde("/abs/trail.db"), PathBuf::from("/abs/trail.db"));
    }
}
