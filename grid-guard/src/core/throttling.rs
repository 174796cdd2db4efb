//! Throttling policy for rule set execution.

use crate::error::{GridError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Controls how eagerly and how concurrently a rule set is evaluated.
///
/// All fields are plain settings; cloning produces an independent copy.
///
/// By default an edit that arrives while the same cell is being evaluated
/// lets that evaluation finish; its report reaches the sink only if the
/// newer evaluation has not reported yet. Set `cancel_superseded` to abandon
/// the older evaluation instead, which also cancels any validator future it
/// is awaiting.
///
/// # Examples
///
/// ```rust
/// use grid_guard::core::ThrottlingConfig;
///
/// let config = ThrottlingConfig::default()
///     .with_debounce_ms(150)
///     .with_max_concurrent_validations(2);
///
/// assert_eq!(config.debounce_ms, 150);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottlingConfig {
    /// Quiet period after the last edit of a cell before it is validated
    pub debounce_ms: u64,
    /// Upper bound on simultaneously running cell or batch evaluations
    pub max_concurrent_validations: usize,
    /// When false, edits are validated immediately on the caller's task
    /// without debouncing or limiting
    pub enable_async: bool,
    /// When true, all-rows runs evaluate row batches concurrently
    pub enable_batch: bool,
    /// Rows per batch for all-rows runs
    pub batch_size: usize,
    /// When true, a newer edit of a cell abandons an older evaluation of the
    /// same cell that is still running
    pub cancel_superseded: bool,
}

impl Default for ThrottlingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            max_concurrent_validations: 5,
            enable_async: true,
            enable_batch: true,
            batch_size: 100,
            cancel_superseded: false,
        }
    }
}

impl ThrottlingConfig {
    /// Debounced, concurrent evaluation suitable for interactive editing.
    pub fn interactive() -> Self {
        Self::default()
    }

    /// Immediate, sequential evaluation on the caller's task.
    pub fn synchronous() -> Self {
        Self {
            debounce_ms: 0,
            max_concurrent_validations: 1,
            enable_async: false,
            enable_batch: false,
            ..Self::default()
        }
    }

    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn with_max_concurrent_validations(mut self, max: usize) -> Self {
        self.max_concurrent_validations = max;
        self
    }

    pub fn with_async(mut self, enabled: bool) -> Self {
        self.enable_async = enabled;
        self
    }

    pub fn with_batch(mut self, enabled: bool) -> Self {
        self.enable_batch = enabled;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_cancel_superseded(mut self, enabled: bool) -> Self {
        self.cancel_superseded = enabled;
        self
    }

    /// The debounce period as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Checks the settings for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_validations == 0 {
            return Err(GridError::configuration(
                "max_concurrent_validations must be at least 1",
            ));
        }
        if self.batch_size == 0 {
            return Err(GridError::configuration("batch_size must be at least 1"));
        }
        Ok(())
    }
}
