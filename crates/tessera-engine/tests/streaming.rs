//! Integration test: tiled updates.

use proptest::prelude::*;

use tessera_core::{
    OutputRef, ParamSet, ProcessingError, Region, RegionError, StageId, UpdateError,
};
use tessera_engine::{Pipeline, PipelineConfig, StreamingConfig};
use tessera_stage::{ExecuteContext, OutputSlot, Stage};
use tessera_test_utils::{ConstSource, ExecutionLog, OffsetFilter};

/// 2-D source whose value at `(y, x)` is `100 * y + x`.
struct Ramp;

impl Stage for Ramp {
    fn name(&self) -> &str {
        "ramp"
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::scalar("output")]
    }

    fn output_information(&self, _: &[Region], _: &ParamSet) -> Result<Vec<Region>, RegionError> {
        Ok(vec![Region::from_extent(&[16, 12])])
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        let out = ctx.output(0)?;
        let region = out.requested().clone();
        for index in region.indices() {
            if let Some(sample) = out.buffer_mut().get_mut(&index) {
                sample[0] = (100 * index[0] + index[1]) as f32;
            }
        }
        Ok(())
    }
}

fn halo_chain(log: &ExecutionLog, config: PipelineConfig) -> (Pipeline, StageId, OutputRef) {
    let mut p = Pipeline::with_config(config).unwrap();
    let src = p.add_stage(ConstSource::new("src", &[128, 128], 10.0, log));
    let filter = p.add_stage(OffsetFilter::new("filter", 1.0, 1, log));
    p.connect(src, filter).unwrap();
    (p, src, OutputRef::new(filter, 0))
}

#[test]
fn streamed_result_covers_the_whole_request() {
    let log = ExecutionLog::new();
    let (mut p, _, out) = halo_chain(&log, PipelineConfig::default());

    let streamed = p.update_streamed(out, None, Some(4)).unwrap();
    assert_eq!(streamed.tiles(), 4);
    assert_eq!(streamed.buffer.region(), &Region::from_extent(&[128, 128]));
    assert!(streamed.buffer.as_slice().iter().all(|&v| v == 11.0));
    assert_eq!(log.count("src"), 4);
    assert_eq!(log.count("filter"), 4);
    for report in &streamed.reports {
        assert_eq!(report.executed.len(), 2);
    }
}

#[test]
fn tiles_fit_under_a_limit_the_whole_request_exceeds() {
    let log = ExecutionLog::new();
    // One tile of 32 rows plus a halo row on each side.
    let config = PipelineConfig {
        max_buffer_cells: Some(34 * 128),
        ..PipelineConfig::default()
    };
    let (mut p, _, out) = halo_chain(&log, config);

    assert!(matches!(
        p.update(out),
        Err(UpdateError::Resource { .. })
    ));
    let streamed = p.update_streamed(out, None, None).unwrap();
    assert_eq!(streamed.tiles(), 4);
    assert!(streamed.buffer.as_slice().iter().all(|&v| v == 11.0));
}

#[test]
fn streamed_equals_direct_update() {
    let mut direct = Pipeline::new();
    let ramp = direct.add_stage(Ramp);
    let out = OutputRef::new(ramp, 0);
    direct.update(out).unwrap();
    let expected = direct.output(out).unwrap().buffer().unwrap().clone();

    let config = PipelineConfig {
        streaming: StreamingConfig { tiles: 5, axis: 1 },
        ..PipelineConfig::default()
    };
    let mut tiled = Pipeline::with_config(config).unwrap();
    let ramp = tiled.add_stage(Ramp);
    let streamed = tiled
        .update_streamed(OutputRef::new(ramp, 0), None, None)
        .unwrap();
    assert_eq!(streamed.tiles(), 4);
    assert_eq!(streamed.buffer, expected);
}

#[test]
fn partial_request_is_tiled_within_itself() {
    let log = ExecutionLog::new();
    let (mut p, _, out) = halo_chain(&log, PipelineConfig::default());
    let request = Region::new(&[10, 0], &[10, 128]).unwrap();

    let streamed = p.update_streamed(out, Some(request.clone()), Some(3)).unwrap();
    assert_eq!(streamed.buffer.region(), &request);
    assert_eq!(streamed.tiles(), 3);
}

#[test]
fn more_tiles_than_rows_is_capped() {
    let log = ExecutionLog::new();
    let mut p = Pipeline::new();
    let src = p.add_stage(ConstSource::new("src", &[3, 8], 2.0, &log));
    let streamed = p
        .update_streamed(OutputRef::new(src, 0), None, Some(10))
        .unwrap();
    assert_eq!(streamed.tiles(), 3);
    assert_eq!(streamed.buffer.as_slice(), &[2.0; 24]);
}

#[test]
fn disjoint_streamed_request_is_rejected() {
    let log = ExecutionLog::new();
    let (mut p, _, out) = halo_chain(&log, PipelineConfig::default());
    let err = p
        .update_streamed(out, Some(Region::new(&[500, 0], &[4, 4]).unwrap()), None)
        .unwrap_err();
    assert!(matches!(
        err,
        UpdateError::Region(RegionError::EmptyRequest { .. })
    ));
    assert!(log.entries().is_empty());
}

#[test]
fn cancelled_stream_reports_remaining_tiles() {
    let log = ExecutionLog::new();
    let (mut p, _, out) = halo_chain(&log, PipelineConfig::default());
    p.cancel_token().cancel();
    assert_eq!(
        p.update_streamed(out, None, Some(4)).unwrap_err(),
        UpdateError::Cancelled { skipped: 4 }
    );
    assert!(log.entries().is_empty());
}

proptest! {
    #[test]
    fn any_window_and_tiling_reproduces_the_ramp(
        oy in 0i64..16, ox in 0i64..12,
        h in 1u64..10, w in 1u64..10,
        tiles in 1usize..8, axis in 0usize..2,
    ) {
        let config = PipelineConfig {
            streaming: StreamingConfig { tiles, axis },
            ..PipelineConfig::default()
        };
        let mut p = Pipeline::with_config(config).unwrap();
        let ramp = p.add_stage(Ramp);
        let request = Region::new(&[oy, ox], &[h, w]).unwrap();
        let streamed = p
            .update_streamed(OutputRef::new(ramp, 0), Some(request.clone()), None)
            .unwrap();

        let expected = request.crop_to(&Region::from_extent(&[16, 12])).unwrap();
        prop_assert_eq!(streamed.buffer.region(), &expected);
        for index in expected.indices() {
            let value = streamed.buffer.value(&index).unwrap();
            prop_assert_eq!(value, (100 * index[0] + index[1]) as f32);
        }
    }
}
