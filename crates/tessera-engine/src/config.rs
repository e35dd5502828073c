//! Pipeline configuration and validation.
//!
//! [`PipelineConfig`] is the builder input for
//! [`Pipeline::with_config`](crate::Pipeline::with_config).
//! [`validate()`](PipelineConfig::validate) checks it once, up front.

use tessera_core::ConfigError;

// ── StreamingConfig ────────────────────────────────────────────────

/// Default tiling for [`Pipeline::update_streamed`](crate::Pipeline::update_streamed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamingConfig {
    /// Number of tiles to split a request into. Default: 4.
    pub tiles: usize,
    /// Axis to split along. Default: 0 (the slowest-varying axis, so
    /// every tile is a contiguous block of rows).
    pub axis: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self { tiles: 4, axis: 0 }
    }
}

// ── PipelineConfig ─────────────────────────────────────────────────

/// Settings of a [`Pipeline`](crate::Pipeline).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Largest buffer, in indices, the engine will allocate for any one
    /// output. `None` = unlimited. Exceeding it fails the update with a
    /// resource error.
    pub max_buffer_cells: Option<usize>,
    /// Check `largest ⊇ buffered ⊇ requested` on every container the
    /// update touched before reporting success. Default: true.
    pub verify_invariants: bool,
    /// Tiling used when streaming without an explicit tile count.
    pub streaming: StreamingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_buffer_cells: None,
            verify_invariants: true,
            streaming: StreamingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Check structural constraints.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidConfig`] if the buffer ceiling or the tile
    /// count is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_buffer_cells == Some(0) {
            return Err(ConfigError::InvalidConfig {
                reason: "max_buffer_cells must be at least 1".into(),
            });
        }
        if self.streaming.tiles == 0 {
            return Err(ConfigError::InvalidConfig {
                reason: "streaming.tiles must be at least 1".into(),
            });
        }
        Ok(())
    }
}
