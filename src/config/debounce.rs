use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::DEFAULT_WAIT_TIME;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Quiet period a change must survive before it is emitted
    /// (unit: milliseconds). Zero emits every change as soon as it is fetched.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl DebounceConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.debounce() >= DEFAULT_WAIT_TIME {
            return Err(Error::InvalidConfig(format!(
                "debounce.debounce_ms ({}) must be shorter than the long-poll wait time ({:?})",
                self.debounce_ms, DEFAULT_WAIT_TIME
            )));
        }
        Ok(())
    }
}

fn default_debounce_ms() -> u64 {
    250
}
