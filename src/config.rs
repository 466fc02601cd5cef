use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::limits::MAX_STAY_NIGHTS;

/// Runtime settings, read from `STAYBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    /// WAL appends after which the compactor rewrites the log.
    pub compact_threshold: u64,
    pub compact_interval: Duration,
    pub max_stay_nights: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            compact_threshold: 1000,
            compact_interval: Duration::from_secs(30),
            max_stay_nights: MAX_STAY_NIGHTS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparsable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup("STAYBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            compact_threshold: parsed(&lookup, "STAYBOOK_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            compact_interval: parsed(&lookup, "STAYBOOK_COMPACT_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.compact_interval),
            max_stay_nights: parsed(&lookup, "STAYBOOK_MAX_STAY_NIGHTS")
                .filter(|n: &i64| *n >= 1)
                .unwrap_or(defaults.max_stay_nights),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("staybook.wal")
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.wal_path(), PathBuf::from("./data/staybook.wal"));
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("STAYBOOK_DATA_DIR", "/var/lib/staybook"),
            ("STAYBOOK_COMPACT_THRESHOLD", "50"),
            ("STAYBOOK_COMPACT_INTERVAL_SECS", "5"),
            ("STAYBOOK_MAX_STAY_NIGHTS", "28"),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/staybook"));
        assert_eq!(config.compact_threshold, 50);
        assert_eq!(config.compact_interval, Duration::from_secs(5));
        assert_eq!(config.max_stay_nights, 28);
    }

    #[test]
    fn bad_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("STAYBOOK_COMPACT_THRESHOLD", "lots"),
            ("STAYBOOK_MAX_STAY_NIGHTS", "0"),
        ]));
        assert_eq!(config.compact_threshold, 1000);
        assert_eq!(config.max_stay_nights, MAX_STAY_NIGHTS);
    }
}
