//! Server configuration.

use std::str::FromStr;
use std::time::Duration;

use companion_transport::DEFAULT_MAX_FRAME_LEN;

/// Port companion clients connect to unless told otherwise.
pub const DEFAULT_PORT: u16 = 7999;

/// Configuration for the companion server and its sessions.
///
/// Start from `ServerConfig::default()` and override what you need, or
/// read everything from the environment with [`from_env`](Self::from_env).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on. Default: `127.0.0.1:7999`.
    pub bind_addr: String,

    /// Largest frame payload accepted from a companion, in bytes. Outbound
    /// frames are not capped. Default: 1 MiB.
    pub max_frame_len: u32,

    /// How long a single frame write may take before the session is
    /// considered dead. Default: 5 seconds.
    pub write_timeout: Duration,

    /// How long a closing session may spend flushing queued packets
    /// before its writer is aborted. Default: 2 seconds.
    pub drain_timeout: Duration,

    /// How long shutdown waits for all sessions to close before aborting
    /// the stragglers. Default: 5 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{DEFAULT_PORT}"),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            write_timeout: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Reads overrides from `COMPANION_*` environment variables.
    ///
    /// | variable | field |
    /// |---|---|
    /// | `COMPANION_BIND_ADDR` | `bind_addr` |
    /// | `COMPANION_MAX_FRAME_LEN` | `max_frame_len` (bytes) |
    /// | `COMPANION_WRITE_TIMEOUT_MS` | `write_timeout` |
    /// | `COMPANION_DRAIN_TIMEOUT_MS` | `drain_timeout` |
    /// | `COMPANION_SHUTDOWN_TIMEOUT_MS` | `shutdown_timeout` |
    ///
    /// Unset variables keep their defaults. Unparsable ones are logged and
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but with a custom lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            setting(&lookup, key).map_or(default, Duration::from_millis)
        };
        Self {
            bind_addr: lookup("COMPANION_BIND_ADDR").unwrap_or(defaults.bind_addr),
            max_frame_len: setting(&lookup, "COMPANION_MAX_FRAME_LEN")
                .unwrap_or(defaults.max_frame_len),
            write_timeout: millis("COMPANION_WRITE_TIMEOUT_MS", defaults.write_timeout),
            drain_timeout: millis("COMPANION_DRAIN_TIMEOUT_MS", defaults.drain_timeout),
            shutdown_timeout: millis(
                "COMPANION_SHUTDOWN_TIMEOUT_MS",
                defaults.shutdown_timeout,
            ),
        }
    }
}

/// Parses one setting. `None` if unset or unparsable.
fn setting<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_listens_on_7999() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr, "127.0.0.1:7999");
        assert_eq!(cfg.max_frame_len, DEFAULT_MAX_FRAME_LEN);
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let cfg = ServerConfig::from_lookup(lookup_from(&[]));
        let def = ServerConfig::default();
        assert_eq!(cfg.bind_addr, def.bind_addr);
        assert_eq!(cfg.write_timeout, def.write_timeout);
        assert_eq!(cfg.shutdown_timeout, def.shutdown_timeout);
    }

    #[test]
    fn test_overrides_are_applied() {
        let cfg = ServerConfig::from_lookup(lookup_from(&[
            ("COMPANION_BIND_ADDR", "0.0.0.0:9000"),
            ("COMPANION_MAX_FRAME_LEN", "4096"),
            ("COMPANION_WRITE_TIMEOUT_MS", "250"),
            ("COMPANION_DRAIN_TIMEOUT_MS", " 100 "),
            ("COMPANION_SHUTDOWN_TIMEOUT_MS", "1500"),
        ]));
        assert_eq!(cfg.bind_addr, "0.0.0.0:9000");
        assert_eq!(cfg.max_frame_len, 4096);
        assert_eq!(cfg.write_timeout, Duration::from_millis(250));
        assert_eq!(cfg.drain_timeout, Duration::from_millis(100));
        assert_eq!(cfg.shutdown_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_garbage_values_fall_back_to_defaults() {
        let cfg = ServerConfig::from_lookup(lookup_from(&[
            ("COMPANION_MAX_FRAME_LEN", "huge"),
            ("COMPANION_WRITE_TIMEOUT_MS", "-5"),
        ]));
        assert_eq!(cfg.max_frame_len, DEFAULT_MAX_FRAME_LEN);
        assert_eq!(cfg.write_timeout, ServerConfig::default().write_timeout);
    }
}
