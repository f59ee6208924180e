//! Environment configuration.

use std::env;

#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub base_url: Option<String>,
    pub log_filter: Option<String>,
    pub log_file: Option<String>,
    pub debug: bool,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_string_opt("PLAYGROUND_BASE_URL"),
            log_filter: env_string_opt("PLAYGROUND_LOG"),
            log_file: env_string_opt("PLAYGROUND_LOG_FILE"),
            debug: env_flag("PLAYGROUND_DEBUG"),
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::EnvConfig;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    #[test]
    fn env_defaults_are_empty() {
        let _lock = env_lock();
        let _g1 = set_env_guard("PLAYGROUND_BASE_URL", None);
        let _g2 = set_env_guard("PLAYGROUND_LOG", None);
        let _g3 = set_env_guard("PLAYGROUND_LOG_FILE", None);
        let _g4 = set_env_guard("PLAYGROUND_DEBUG", None);

        let config = EnvConfig::from_env();
        assert!(config.base_url.is_none());
        assert!(config.log_filter.is_none());
        assert!(config.log_file.is_none());
        assert!(!config.debug);
    }

    #[test]
    fn env_values_are_read() {
        let _lock = env_lock();
        let _g1 = set_env_guard("PLAYGROUND_BASE_URL", Some("http://sandbox:9000/api"));
        let _g2 = set_env_guard("PLAYGROUND_LOG", Some("sandbox_api=trace"));
        let _g3 = set_env_guard("PLAYGROUND_LOG_FILE", Some("/tmp/playground.log"));
        let _g4 = set_env_guard("PLAYGROUND_DEBUG", Some("1"));

        let config = EnvConfig::from_env();
        assert_eq!(config.base_url.as_deref(), Some("http://sandbox:9000/api"));
        assert_eq!(config.log_filter.as_deref(), Some("sandbox_api=trace"));
        assert_eq!(config.log_file.as_deref(), Some("/tmp/playground.log"));
        assert!(config.debug);
    }

    #[test]
    fn blank_values_and_other_flags_are_ignored() {
        let _lock = env_lock();
        let _g1 = set_env_guard("PLAYGROUND_LOG_FILE", Some("  "));
        let _g2 = set_env_guard("PLAYGROUND_DEBUG", Some("true"));
        let config = EnvConfig::from_env();
        assert!(config.log_file.is_none());
        assert!(!config.debug);
    }
}
