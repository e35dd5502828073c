//! Summary statistics sink.

use std::sync::{Arc, Mutex};

use tessera_core::ProcessingError;
use tessera_stage::{ExecuteContext, InputSlot, OutputSlot, Stage};

/// Count, extremes and mean of a set of samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Statistics {
    /// Number of samples.
    pub count: u64,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
}

impl Statistics {
    /// Summarise `samples`; `None` if there are none.
    pub fn of(samples: impl IntoIterator<Item = f32>) -> Option<Self> {
        let mut count = 0u64;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0f64;
        for v in samples {
            let v = f64::from(v);
            count += 1;
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        (count > 0).then(|| Self {
            count,
            min,
            max,
            mean: sum / count as f64,
        })
    }
}

/// Shared slot a [`StatisticsSink`] writes into.
pub type StatisticsCell = Arc<Mutex<Option<Statistics>>>;

/// Create an empty [`StatisticsCell`].
pub fn new_statistics_cell() -> StatisticsCell {
    Arc::new(Mutex::new(None))
}

/// Summarises the scalar samples of the region it was asked for.
///
/// An empty request stores `None`.
#[derive(Debug)]
pub struct StatisticsSink {
    cell: StatisticsCell,
}

impl StatisticsSink {
    /// Write into `cell`.
    pub fn new(cell: StatisticsCell) -> Self {
        Self { cell }
    }
}

impl Stage for StatisticsSink {
    fn name(&self) -> &str {
        "StatisticsSink"
    }

    fn inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::typed("input", tessera_core::PixelType::Scalar)]
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        Vec::new()
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        let input = ctx.input(0)?;
        let region = input.requested();
        if !input.buffer().region().contains(region) {
            return Err(ProcessingError::InvalidInput {
                reason: format!(
                    "input buffer {} does not cover {region}",
                    input.buffer().region()
                ),
            });
        }
        let len = region.row_len();
        let mut samples = Vec::with_capacity(region.cell_count() as usize);
        for row in region.rows() {
            let values = input
                .buffer()
                .row(&row, len)
                .ok_or_else(|| crate::missing_sample(&row))?;
            samples.extend_from_slice(values);
        }
        let stats = Statistics::of(samples);
        let mut cell = self
            .cell
            .lock()
            .map_err(|_| ProcessingError::ExecutionFailed {
                reason: "statistics cell lock poisoned".into(),
            })?;
        *cell = stats;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{Buffer, PixelType, Region};
    use tessera_test_utils::run_stage;

    #[test]
    fn of_nothing_is_none() {
        assert_eq!(Statistics::of(Vec::new()), None);
    }

    #[test]
    fn of_samples() {
        let stats = Statistics::of([4.0, -2.0, 1.0]).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, -2.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.mean, 1.0);
    }

    #[test]
    fn summarises_the_requested_region_only() {
        let input = Buffer::from_vec(
            Region::from_extent(&[2, 3]),
            PixelType::Scalar,
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap();
        let cell = new_statistics_cell();
        let requested = Region::new(&[0, 1], &[2, 2]).unwrap();
        run_stage(&StatisticsSink::new(cell.clone()), &[(&input, requested)], &[]).unwrap();

        let stats = cell.lock().unwrap().unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert_eq!(stats.mean, 3.0);
    }

    #[test]
    fn uncovered_request_is_invalid_input() {
        let input = Buffer::filled(Region::from_extent(&[2]), PixelType::Scalar, 1.0).unwrap();
        let err = run_stage(
            &StatisticsSink::new(new_statistics_cell()),
            &[(&input, Region::from_extent(&[3]))],
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidInput { .. }));
    }
}
