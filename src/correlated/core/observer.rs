//! Progress reporting for construction, fitting and prediction.
//!
//! The model never calls the `log` macros directly; it reports through a
//! [`FitObserver`] held by the instance. [`LogObserver`] (the default)
//! forwards to the `log` facade under the `correlated_count` target, so a
//! binary picks the backend. [`NullObserver`] drops everything.
use log::Level;

/// Log target used by [`LogObserver`].
pub const LOG_TARGET: &str = "correlated_count";

/// Receives `(level, message)` pairs from the model.
pub trait FitObserver: Send + Sync {
    fn notify(&self, level: Level, message: &str);
}

/// Forwards every message to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl FitObserver for LogObserver {
    fn notify(&self, level: Level, message: &str) {
        log::log!(target: LOG_TARGET, level, "{message}");
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl FitObserver for NullObserver {
    fn notify(&self, _level: Level, _message: &str) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records messages for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingObserver {
        pub messages: Mutex<Vec<(Level, String)>>,
    }

    impl RecordingObserver {
        pub fn contains(&self, level: Level, needle: &str) -> bool {
            self.messages
                .lock()
                .map(|msgs| msgs.iter().any(|(l, m)| *l == level && m.contains(needle)))
                .unwrap_or(false)
        }
    }

    impl FitObserver for RecordingObserver {
        fn notify(&self, level: Level, message: &str) {
            if let Ok(mut msgs) = self.messages.lock() {
                msgs.push((level, message.to_string()));
            }
        }
    }
}
