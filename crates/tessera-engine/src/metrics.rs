//! Per-update performance metrics.
//!
//! [`UpdateMetrics`] captures timing and memory data for a single
//! update, for telemetry and profiling.

/// Timing and memory metrics collected during a single update.
///
/// All durations are in microseconds. The pipeline fills these in after
/// each successful update; [`Pipeline::last_metrics`](crate::Pipeline::last_metrics)
/// returns the most recent set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateMetrics {
    /// Wall-clock time for the entire update.
    pub total_us: u64,
    /// Time spent computing largest possible regions.
    pub information_us: u64,
    /// Time spent propagating requested regions upstream.
    pub region_us: u64,
    /// Time spent evaluating staleness.
    pub staleness_us: u64,
    /// Time spent executing stale stages, including allocation.
    pub execution_us: u64,
    /// Per-stage execution times: `(name, microseconds)`, executed stages only.
    pub stage_us: Vec<(String, u64)>,
    /// Stages upstream of the terminal, inclusive.
    pub stages_considered: usize,
    /// Stages that actually executed.
    pub stages_executed: usize,
    /// Bytes of output buffers allocated by executed stages.
    pub bytes_allocated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = UpdateMetrics::default();
        assert_eq!(m.total_us, 0);
        assert!(m.stage_us.is_empty());
        assert_eq!(m.stages_executed, 0);
        assert_eq!(m.bytes_allocated, 0);
    }

    #[test]
    fn metrics_clone_independently() {
        let mut m = UpdateMetrics {
            stage_us: vec![("blur".to_string(), 12)],
            stages_considered: 3,
            stages_executed: 1,
            ..UpdateMetrics::default()
        };
        let snapshot = m.clone();
        m.stage_us.clear();
        assert_eq!(snapshot.stage_us.len(), 1);
        assert_eq!(snapshot.stages_considered, 3);
    }
}
