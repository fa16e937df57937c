//! Process-wide tunables (§6), read from the environment at construction
//! time, mirroring `examples/saworbit-orbit/src/config.rs`'s pattern of a
//! plain struct with `from_env()` and SDK-style defaults.

use std::env;
use std::time::Duration;

/// Row count per chunk, as a power of two. The final chunk of a vector may
/// run up to `2*CHUNK_SZ - 1` rows (the fat-tail rule, §3).
pub const LOG_CHK: u32 = 16;
pub const CHUNK_SZ: u64 = 1 << LOG_CHK;

/// Tunables for the object-store backing client (§6). Each is read from the
/// environment once, at client construction, the way an AWS SDK client reads
/// `AWS_MAX_ATTEMPTS` / `AWS_*_TIMEOUT` once at startup.
#[derive(Debug, Clone)]
pub struct ObjectStoreTunables {
    pub socket_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_error_retry: u32,
    pub max_http_connections: usize,
}

impl Default for ObjectStoreTunables {
    fn default() -> Self {
        Self {
            socket_timeout: Duration::from_secs(50),
            connect_timeout: Duration::from_secs(10),
            max_error_retry: 3,
            max_http_connections: 50,
        }
    }
}

impl ObjectStoreTunables {
    /// Read tunables from the environment, falling back to the SDK-style
    /// defaults above for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            socket_timeout: env_duration_secs("ORBIT_MR_SOCKET_TIMEOUT_SECS")
                .unwrap_or(defaults.socket_timeout),
            connect_timeout: env_duration_secs("ORBIT_MR_CONNECT_TIMEOUT_SECS")
                .unwrap_or(defaults.connect_timeout),
            max_error_retry: env_parse("ORBIT_MR_MAX_ERROR_RETRY").unwrap_or(defaults.max_error_retry),
            max_http_connections: env_parse("ORBIT_MR_MAX_HTTP_CONNECTIONS")
                .unwrap_or(defaults.max_http_connections),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_duration_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let t = ObjectStoreTunables::default();
        assert_eq!(t.max_error_retry, 3);
        assert!(t.max_http_connections > 0);
    }

    #[test]
    fn chunk_size_is_power_of_two() {
        assert_eq!(CHUNK_SZ, 1u64 << LOG_CHK);
        assert!(CHUNK_SZ.is_power_of_two());
    }
}
