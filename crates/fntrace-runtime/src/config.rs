//! Runtime configuration. Ambient §6 "Configuration assembly".

use std::path::PathBuf;
use std::time::Duration;

/// Finalized runtime configuration, received pre-validated from an external collaborator
/// (TOML/env/CLI parsing is explicitly out of scope here). Construction never panics and never
/// fails: out-of-range combinations are normalized rather than rejected.
#[derive(Debug, Clone)]
pub struct Config {
    pub trace_file_path: PathBuf,
    pub session_id: u64,
    pub thread_event_buffer_capacity: usize,
    pub max_reserved_event_buffer_slice_capacity: usize,
    pub max_dynamic_event_buffer_slice_capacity: usize,
    pub reserved_event_pool_capacity: usize,
    pub dynamic_event_pool_capacity: usize,
    pub dynamic_event_slice_borrow_cas_attempts: usize,
    pub event_buffer_retention_duration: Duration,
    pub max_flush_buffer_to_file_attempts: i32,
    pub flush_all_events: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trace_file_path: PathBuf::from("/tmp/fntrace"),
            session_id: 0,
            thread_event_buffer_capacity: 4096,
            max_reserved_event_buffer_slice_capacity: 512,
            max_dynamic_event_buffer_slice_capacity: 512,
            reserved_event_pool_capacity: 1 << 16,
            dynamic_event_pool_capacity: 1 << 16,
            dynamic_event_slice_borrow_cas_attempts: 8,
            event_buffer_retention_duration: Duration::from_secs(10),
            max_flush_buffer_to_file_attempts: 3,
            flush_all_events: false,
        }
    }
}

impl Config {
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Small pools, immediate flush-all, short retention: suited to local development and tests.
    #[must_use]
    pub fn development() -> Self {
        Self {
            thread_event_buffer_capacity: 64,
            max_reserved_event_buffer_slice_capacity: 32,
            max_dynamic_event_buffer_slice_capacity: 32,
            reserved_event_pool_capacity: 256,
            dynamic_event_pool_capacity: 256,
            event_buffer_retention_duration: Duration::from_millis(100),
            flush_all_events: true,
            ..Self::default()
        }
    }

    /// Larger pools, retention-based dropping under sustained load: suited to production.
    #[must_use]
    pub fn production() -> Self {
        Self {
            thread_event_buffer_capacity: 1 << 14,
            max_reserved_event_buffer_slice_capacity: 1024,
            max_dynamic_event_buffer_slice_capacity: 1024,
            reserved_event_pool_capacity: 1 << 20,
            dynamic_event_pool_capacity: 1 << 20,
            event_buffer_retention_duration: Duration::from_secs(30),
            flush_all_events: false,
            ..Self::default()
        }
    }

    /// Normalizes combinations that would otherwise make a pool unusable: a zero max-slice
    /// capacity paired with a nonzero pool capacity is treated as "one slice spans the pool".
    fn normalized(mut self) -> Self {
        if self.max_reserved_event_buffer_slice_capacity == 0 && self.reserved_event_pool_capacity > 0 {
            self.max_reserved_event_buffer_slice_capacity = self.reserved_event_pool_capacity;
        }
        if self.max_dynamic_event_buffer_slice_capacity == 0 && self.dynamic_event_pool_capacity > 0 {
            self.max_dynamic_event_buffer_slice_capacity = self.dynamic_event_pool_capacity;
        }
        if self.dynamic_event_slice_borrow_cas_attempts == 0 {
            self.dynamic_event_slice_borrow_cas_attempts = 1;
        }
        self
    }
}

/// Builder for [`Config`]. Mirrors `StreamConfig`'s `with_*` chain.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

macro_rules! builder_setter {
    ($name:ident, $field:ident, $ty:ty) => {
        #[must_use]
        pub fn $name(mut self, value: $ty) -> Self {
            self.config.$field = value;
            self
        }
    };
}

impl ConfigBuilder {
    builder_setter!(trace_file_path, trace_file_path, PathBuf);
    builder_setter!(session_id, session_id, u64);
    builder_setter!(thread_event_buffer_capacity, thread_event_buffer_capacity, usize);
    builder_setter!(
        max_reserved_event_buffer_slice_capacity,
        max_reserved_event_buffer_slice_capacity,
        usize
    );
    builder_setter!(
        max_dynamic_event_buffer_slice_capacity,
        max_dynamic_event_buffer_slice_capacity,
        usize
    );
    builder_setter!(reserved_event_pool_capacity, reserved_event_pool_capacity, usize);
    builder_setter!(dynamic_event_pool_capacity, dynamic_event_pool_capacity, usize);
    builder_setter!(
        dynamic_event_slice_borrow_cas_attempts,
        dynamic_event_slice_borrow_cas_attempts,
        usize
    );
    builder_setter!(
        event_buffer_retention_duration,
        event_buffer_retention_duration,
        Duration
    );
    builder_setter!(
        max_flush_buffer_to_file_attempts,
        max_flush_buffer_to_file_attempts,
        i32
    );
    builder_setter!(flush_all_events, flush_all_events, bool);

    /// Starts from an existing `Config` rather than `Config::default()`.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn build(self) -> Config {
        self.config.normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_overrides_and_normalizes() {
        let config = Config::builder()
            .session_id(7)
            .reserved_event_pool_capacity(100)
            .max_reserved_event_buffer_slice_capacity(0)
            .build();
        assert_eq!(config.session_id, 7);
        assert_eq!(config.max_reserved_event_buffer_slice_capacity, 100);
    }

    #[test]
    fn development_preset_flushes_all_events() {
        assert!(Config::development().flush_all_events);
    }

    #[test]
    fn production_preset_uses_retention() {
        assert!(!Config::production().flush_all_events);
    }

    #[test]
    fn zero_borrow_attempts_normalizes_to_one() {
        let config = Config::builder().dynamic_event_slice_borrow_cas_attempts(0).build();
        assert_eq!(config.dynamic_event_slice_borrow_cas_attempts, 1);
    }
}
