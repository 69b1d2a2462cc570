//! Layered configuration, deserialized from YAML. Every field has a default
//! and an out-of-range coercion so a config file only needs to override what
//! it cares about.

use serde::Deserialize;

fn default_workers() -> usize {
    2
}
fn default_queue_capacity() -> usize {
    64
}
fn default_depth() -> u32 {
    18
}
fn default_fanout() -> usize {
    10
}
fn default_archive_limit() -> usize {
    0
}
fn default_engine_path() -> String {
    "stockfish".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workers: usize,
    pub queue_capacity: usize,
    pub depth: u32,
    pub fanout: usize,
    /// 0 means unbounded: import every archive since the profile's last sync.
    pub archive_limit: usize,
    pub engine_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            depth: default_depth(),
            fanout: default_fanout(),
            archive_limit: default_archive_limit(),
            engine_path: default_engine_path(),
        }
    }
}

impl Config {
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        let mut config: Config = serde_yaml::from_str(raw)?;
        config.coerce();
        Ok(config)
    }

    /// Replaces non-positive values with their defaults, matching the
    /// worker-pool and job contracts' own coercion rules.
    fn coerce(&mut self) {
        if self.workers == 0 {
            self.workers = default_workers();
        }
        if self.queue_capacity == 0 {
            self.queue_capacity = default_queue_capacity();
        }
        if self.depth == 0 {
            self.depth = default_depth();
        }
        if self.fanout == 0 {
            self.fanout = default_fanout();
        }
        if self.engine_path.trim().is_empty() {
            self.engine_path = default_engine_path();
        }
        // archive_limit == 0 is a meaningful "unbounded" value, left as-is.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip() {
        let config = Config::default();
        assert_eq!(config.workers, 2);
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.depth, 18);
        assert_eq!(config.fanout, 10);
        assert_eq!(config.archive_limit, 0);
    }

    #[test]
    fn zero_fields_are_coerced_to_defaults() {
        let config = Config::from_yaml("workers: 0\nqueue_capacity: 0\ndepth: 0\nfanout: 0\n").unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.depth, 18);
        assert_eq!(config.fanout, 10);
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let config = Config::from_yaml("workers: 8\n").unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.queue_capacity, 64);
    }

    #[test]
    fn archive_limit_zero_means_unbounded() {
        let config = Config::from_yaml("archive_limit: 0\n").unwrap();
        assert_eq!(config.archive_limit, 0);
    }
}
