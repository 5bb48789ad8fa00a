use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings, built once and handed to constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding `bookings.wal`.
    pub data_dir: PathBuf,
    /// Upper bound on any single store call.
    pub storage_timeout: Duration,
    /// Pause before the one retry of a timed-out read.
    pub retry_backoff: Duration,
    /// Compact the WAL once this many appends have accumulated.
    pub compact_threshold: u64,
    /// How often the compactor checks the threshold.
    pub compact_interval: Duration,
    /// Prometheus listener port. `None` disables the exporter.
    pub metrics_port: Option<u16>,
    /// `EnvFilter` directive for the log subscriber.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            storage_timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(100),
            compact_threshold: 1000,
            compact_interval: Duration::from_secs(30),
            metrics_port: None,
            log_filter: "info".into(),
        }
    }
}

impl Config {
    /// Read `INNKEEP_*` variables, keeping the default for anything absent or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|s| s.parse::<u64>().ok());

        Self {
            data_dir: lookup("INNKEEP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            storage_timeout: parse("INNKEEP_STORAGE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.storage_timeout),
            retry_backoff: parse("INNKEEP_RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_backoff),
            compact_threshold: parse("INNKEEP_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            compact_interval: parse("INNKEEP_COMPACT_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.compact_interval),
            metrics_port: lookup("INNKEEP_METRICS_PORT").and_then(|s| s.parse().ok()),
            log_filter: lookup("INNKEEP_LOG").unwrap_or(defaults.log_filter),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.wal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("INNKEEP_DATA_DIR", "/var/lib/innkeep"),
            ("INNKEEP_STORAGE_TIMEOUT_MS", "250"),
            ("INNKEEP_RETRY_BACKOFF_MS", "20"),
            ("INNKEEP_COMPACT_THRESHOLD", "50"),
            ("INNKEEP_COMPACT_INTERVAL_SECS", "2"),
            ("INNKEEP_METRICS_PORT", "9100"),
            ("INNKEEP_LOG", "innkeep=debug"),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/innkeep"));
        assert_eq!(config.storage_timeout, Duration::from_millis(250));
        assert_eq!(config.retry_backoff, Duration::from_millis(20));
        assert_eq!(config.compact_threshold, 50);
        assert_eq!(config.compact_interval, Duration::from_secs(2));
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.log_filter, "innkeep=debug");
        assert_eq!(config.wal_path(), PathBuf::from("/var/lib/innkeep/bookings.wal"));
    }

    #[test]
    fn unparsable_values_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("INNKEEP_STORAGE_TIMEOUT_MS", "soon"),
            ("INNKEEP_METRICS_PORT", "99999"),
        ]));
        assert_eq!(config.storage_timeout, Config::default().storage_timeout);
        assert_eq!(config.metrics_port, None);
    }
}
