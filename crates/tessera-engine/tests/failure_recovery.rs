//! Integration test: failing stages, resource limits and cancellation.
//!
//! A failed or cancelled update must leave everything upstream of the
//! failure valid, must not advance the failing stage's generation, and
//! must be retried by the next update.

use tessera_core::{
    Buffer, OutputRef, ParamSet, ProcessingError, Region, RegionError, ResourceError, StageId,
    UpdateError,
};
use tessera_engine::{Pipeline, PipelineConfig};
use tessera_stage::{ExecuteContext, InputSlot, OutputSlot, Stage};
use tessera_test_utils::{
    CallbackFilter, ConstSource, ExecutionLog, FailSwitch, FailingFilter, OffsetFilter,
};

// ── Misbehaving stages ───────────────────────────────────────────────

/// Replaces its output buffer with one covering only the first index.
struct Shrinking;

impl Stage for Shrinking {
    fn name(&self) -> &str {
        "shrinking"
    }

    fn inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::new("input")]
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::scalar("output")]
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        let out = ctx.output(0)?;
        let first = Region::new(out.requested().origin(), &[1])?;
        let smaller = Buffer::allocate(first, out.pixel_type())?;
        *out.buffer_mut() = smaller;
        Ok(())
    }
}

/// Fills its whole largest region, whatever was asked.
struct Greedy;

impl Stage for Greedy {
    fn name(&self) -> &str {
        "greedy"
    }

    fn inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::new("input")]
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::scalar("output")]
    }

    fn input_region(&self, _: usize, _: usize, requested: &Region, _: &ParamSet) -> Region {
        requested.dilate_uniform(1024)
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        let input = ctx.input(0)?;
        let out = ctx.output(0)?;
        let largest = out.largest().clone();
        out.produce_larger(largest.clone())?;
        out.buffer_mut().copy_region_from(input.buffer(), &largest)?;
        Ok(())
    }
}

fn failing_chain(
    log: &ExecutionLog,
    switch: &FailSwitch,
) -> (Pipeline, [StageId; 3], OutputRef) {
    let mut p = Pipeline::new();
    let src = p.add_stage(ConstSource::new("src", &[8], 1.0, log));
    let fail = p.add_stage(FailingFilter::new("fail", switch, log));
    let tail = p.add_stage(OffsetFilter::new("tail", 1.0, 0, log));
    p.connect(src, fail).unwrap();
    p.connect(fail, tail).unwrap();
    let out = p.output_ref(tail, "output").unwrap();
    (p, [src, fail, tail], out)
}

// ── Failures ─────────────────────────────────────────────────────────

#[test]
fn failure_keeps_upstream_and_is_retried() {
    let log = ExecutionLog::new();
    let switch = FailSwitch::new();
    let (mut p, [src, fail, tail], out) = failing_chain(&log, &switch);

    switch.arm();
    let err = p.update(out).unwrap_err();
    match err {
        UpdateError::StageFailed { stage, name, reason } => {
            assert_eq!(stage, fail);
            assert_eq!(name, "fail");
            assert!(matches!(reason, ProcessingError::ExecutionFailed { .. }));
        }
        other => panic!("expected StageFailed, got {other:?}"),
    }
    assert!(!p.output_by_name(src, "output").unwrap().generation().is_never());
    assert!(p.output_by_name(fail, "output").unwrap().generation().is_never());
    assert!(p.graph().node(fail).unwrap().has_failed());
    assert_eq!(log.count("tail"), 0);

    // Still failing: retried, not skipped.
    assert!(p.update(out).is_err());
    assert_eq!(log.count("fail"), 2);
    assert_eq!(log.count("src"), 1);

    switch.disarm();
    let report = p.update(out).unwrap();
    assert_eq!(report.executed, vec![fail, tail]);
    assert!(!p.graph().node(fail).unwrap().has_failed());
    let buffer = p.output(out).unwrap().buffer().unwrap();
    assert!(buffer.as_slice().iter().all(|&v| v == 2.0));
}

#[test]
fn failure_after_success_keeps_previous_generation() {
    let log = ExecutionLog::new();
    let switch = FailSwitch::new();
    let (mut p, [src, fail, tail], out) = failing_chain(&log, &switch);
    p.update(out).unwrap();
    let fail_generation = p.output_by_name(fail, "output").unwrap().generation();
    let tail_generation = p.output(out).unwrap().generation();

    p.set_parameter(src, "value", 5.0).unwrap();
    switch.arm();
    assert!(p.update(out).is_err());
    assert_eq!(
        p.output_by_name(fail, "output").unwrap().generation(),
        fail_generation
    );
    assert_eq!(p.output(out).unwrap().generation(), tail_generation);
    // The source's new output is kept.
    assert!(p.output_by_name(src, "output").unwrap().generation() > tail_generation);

    switch.disarm();
    let report = p.update(out).unwrap();
    assert_eq!(report.executed, vec![fail, tail]);
    assert!(!report.ran(src));
    let buffer = p.output(out).unwrap().buffer().unwrap();
    assert!(buffer.as_slice().iter().all(|&v| v == 6.0));
}

#[test]
fn stage_producing_less_than_requested_is_rejected() {
    let log = ExecutionLog::new();
    let mut p = Pipeline::new();
    let src = p.add_stage(ConstSource::new("src", &[8], 1.0, &log));
    let shrink = p.add_stage(Shrinking);
    p.connect(src, shrink).unwrap();
    let err = p.update(OutputRef::new(shrink, 0)).unwrap_err();
    assert!(matches!(
        err,
        UpdateError::Region(RegionError::Unsatisfied { .. })
    ));
    assert!(p.graph().node(shrink).unwrap().has_failed());
}

#[test]
fn stage_may_retain_a_larger_buffer() {
    let log = ExecutionLog::new();
    let mut p = Pipeline::new();
    let src = p.add_stage(ConstSource::new("src", &[8], 4.0, &log));
    let greedy = p.add_stage(Greedy);
    p.connect(src, greedy).unwrap();
    let out = OutputRef::new(greedy, 0);

    p.update_region(out, Region::new(&[2], &[2]).unwrap()).unwrap();
    assert_eq!(
        p.output(out).unwrap().buffered_region(),
        Some(&Region::from_extent(&[8]))
    );
    // Anything inside what it kept is already there.
    let report = p
        .update_region(out, Region::new(&[5], &[3]).unwrap())
        .unwrap();
    assert!(report.executed.is_empty());
}

// ── Resource limits ──────────────────────────────────────────────────

#[test]
fn buffer_limit_surfaces_as_resource_error() {
    let log = ExecutionLog::new();
    let config = PipelineConfig {
        max_buffer_cells: Some(10),
        ..PipelineConfig::default()
    };
    let mut p = Pipeline::with_config(config).unwrap();
    let src = p.add_stage(ConstSource::new("src", &[4, 4], 1.0, &log));
    let out = OutputRef::new(src, 0);

    let err = p.update(out).unwrap_err();
    assert_eq!(
        err,
        UpdateError::Resource {
            stage: "src".into(),
            source: ResourceError::LimitExceeded {
                cells: 16,
                limit: 10
            },
        }
    );
    assert!(log.entries().is_empty());

    // A request under the limit is fine.
    p.update_region(out, Region::new(&[0, 0], &[2, 4]).unwrap())
        .unwrap();
    assert_eq!(log.count("src"), 1);
}

// ── Cancellation ─────────────────────────────────────────────────────

#[test]
fn cancel_before_update_runs_nothing() {
    let log = ExecutionLog::new();
    let switch = FailSwitch::new();
    let (mut p, _, out) = failing_chain(&log, &switch);
    p.cancel_token().cancel();
    assert_eq!(
        p.update(out).unwrap_err(),
        UpdateError::Cancelled { skipped: 3 }
    );
    assert!(log.entries().is_empty());
}

#[test]
fn cancel_mid_update_keeps_completed_stages() {
    let log = ExecutionLog::new();
    let mut p = Pipeline::new();
    let token = p.cancel_token();
    let src = p.add_stage(ConstSource::new("src", &[8], 1.0, &log));
    let hook = p.add_stage(CallbackFilter::new("hook", move || token.cancel(), &log));
    let tail = p.add_stage(OffsetFilter::new("tail", 1.0, 0, &log));
    p.connect(src, hook).unwrap();
    p.connect(hook, tail).unwrap();
    let out = OutputRef::new(tail, 0);

    assert_eq!(
        p.update(out).unwrap_err(),
        UpdateError::Cancelled { skipped: 1 }
    );
    assert_eq!(log.entries(), vec!["src", "hook"]);
    assert!(!p.output_by_name(hook, "output").unwrap().generation().is_never());

    // The token stays cancelled until reset.
    assert!(p.update(out).is_err());
    p.cancel_token().reset();
    let report = p.update(out).unwrap();
    assert_eq!(report.executed, vec![tail]);
    assert_eq!(report.reused, vec![src, hook]);
}
