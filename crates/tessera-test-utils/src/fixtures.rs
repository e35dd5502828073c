//! Reusable stage fixtures.
//!
//! - [`ConstSource`]: fills its output with a `value` parameter.
//! - [`OffsetFilter`]: adds an `offset`, with a configurable halo `radius`
//!   it checks was actually delivered.
//! - [`FailingFilter`]: pass-through that fails while its switch is armed.
//! - [`TwoWayFilter`]: two outputs, `low = input` and `high = 10 * input`.
//! - [`CallbackFilter`]: pass-through that runs a hook when executed.
//! - [`RecordingSink`]: remembers every region it consumed.
//!
//! Every fixture records its name in an [`ExecutionLog`] when executed.

use std::sync::{Arc, Mutex, PoisonError};

use crate::{ExecutionLog, FailSwitch};
use tessera_core::{ParamSet, ProcessingError, Region, RegionError};
use tessera_stage::{ExecuteContext, InputSlot, OutputSlot, Stage};

fn copy_input(ctx: &mut ExecuteContext<'_>, output: usize) -> Result<(), ProcessingError> {
    let input = ctx.input(0)?;
    let out = ctx.output(output)?;
    let region = out.requested().clone();
    out.buffer_mut().copy_region_from(input.buffer(), &region)?;
    Ok(())
}

/// Source filling an n-dimensional box with the `value` parameter.
pub struct ConstSource {
    pub name: String,
    pub extent: Vec<u64>,
    pub value: f64,
    log: ExecutionLog,
}

impl ConstSource {
    pub fn new(name: impl Into<String>, extent: &[u64], value: f64, log: &ExecutionLog) -> Self {
        Self {
            name: name.into(),
            extent: extent.to_vec(),
            value,
            log: log.clone(),
        }
    }
}

impl Stage for ConstSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::scalar("output")]
    }

    fn parameters(&self) -> ParamSet {
        ParamSet::new().with("value", self.value)
    }

    fn output_information(
        &self,
        _inputs: &[Region],
        _params: &ParamSet,
    ) -> Result<Vec<Region>, RegionError> {
        Ok(vec![Region::from_extent(&self.extent)])
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        self.log.record(&self.name);
        let value = ctx.float("value")? as f32;
        ctx.output(0)?.buffer_mut().fill(value);
        Ok(())
    }
}

/// Adds `offset` to every sample; asks for a halo of `radius`.
///
/// Fails with [`ProcessingError::InvalidInput`] if the input buffer does
/// not cover the halo it asked for (clamped to the data edges).
pub struct OffsetFilter {
    pub name: String,
    pub offset: f64,
    pub radius: i64,
    log: ExecutionLog,
}

impl OffsetFilter {
    pub fn new(name: impl Into<String>, offset: f64, radius: i64, log: &ExecutionLog) -> Self {
        Self {
            name: name.into(),
            offset,
            radius,
            log: log.clone(),
        }
    }
}

impl Stage for OffsetFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::new("input")]
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::scalar("output")]
    }

    fn parameters(&self) -> ParamSet {
        ParamSet::new()
            .with("offset", self.offset)
            .with("radius", self.radius)
    }

    fn input_region(&self, _: usize, _: usize, requested: &Region, params: &ParamSet) -> Region {
        let radius = params.int("radius").unwrap_or(0).max(0) as u64;
        requested.dilate_uniform(radius)
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        self.log.record(&self.name);
        let offset = ctx.float("offset")? as f32;
        let radius = ctx.int("radius")?.max(0) as u64;
        let input = ctx.input(0)?;
        let out = ctx.output(0)?;

        let needed = out.requested().dilate_uniform(radius).crop_to(out.largest())?;
        if !input.buffer().region().contains(&needed) {
            return Err(ProcessingError::InvalidInput {
                reason: format!(
                    "input holds {}, halo needs {needed}",
                    input.buffer().region()
                ),
            });
        }

        let region = out.requested().clone();
        for index in region.indices() {
            let value = input
                .value(&index)
                .ok_or_else(|| ProcessingError::InvalidInput {
                    reason: format!("input has no sample at {index:?}"),
                })?;
            if let Some(sample) = out.buffer_mut().get_mut(&index) {
                sample[0] = value + offset;
            }
        }
        Ok(())
    }
}

/// Pass-through that fails while its [`FailSwitch`] is armed.
pub struct FailingFilter {
    pub name: String,
    switch: FailSwitch,
    log: ExecutionLog,
}

impl FailingFilter {
    pub fn new(name: impl Into<String>, switch: &FailSwitch, log: &ExecutionLog) -> Self {
        Self {
            name: name.into(),
            switch: switch.clone(),
            log: log.clone(),
        }
    }
}

impl Stage for FailingFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::new("input")]
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::scalar("output")]
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        self.log.record(&self.name);
        if self.switch.is_armed() {
            return Err(ProcessingError::ExecutionFailed {
                reason: "deliberate failure".into(),
            });
        }
        copy_input(ctx, 0)
    }
}

/// Two outputs: `low` copies the input, `high` is ten times the input.
pub struct TwoWayFilter {
    pub name: String,
    log: ExecutionLog,
}

impl TwoWayFilter {
    pub fn new(name: impl Into<String>, log: &ExecutionLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
        }
    }
}

impl Stage for TwoWayFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::new("input")]
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::scalar("low"), OutputSlot::scalar("high")]
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        self.log.record(&self.name);
        copy_input(ctx, 0)?;
        copy_input(ctx, 1)?;
        for v in ctx.output(1)?.buffer_mut().as_mut_slice() {
            *v *= 10.0;
        }
        Ok(())
    }
}

/// Pass-through that calls `hook` every time it executes.
pub struct CallbackFilter {
    pub name: String,
    hook: Box<dyn Fn() + Send>,
    log: ExecutionLog,
}

impl CallbackFilter {
    pub fn new(
        name: impl Into<String>,
        hook: impl Fn() + Send + 'static,
        log: &ExecutionLog,
    ) -> Self {
        Self {
            name: name.into(),
            hook: Box::new(hook),
            log: log.clone(),
        }
    }
}

impl Stage for CallbackFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::new("input")]
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::scalar("output")]
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        self.log.record(&self.name);
        (self.hook)();
        copy_input(ctx, 0)
    }
}

/// What a [`RecordingSink`] saw in one execution.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkRecord {
    /// The input region it was handed.
    pub region: Region,
    /// Sum of the samples in that region.
    pub sum: f64,
}

/// Shared list of [`SinkRecord`]s.
#[derive(Clone, Debug, Default)]
pub struct SinkRecords {
    inner: Arc<Mutex<Vec<SinkRecord>>>,
}

impl SinkRecords {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, record: SinkRecord) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn all(&self) -> Vec<SinkRecord> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<SinkRecord> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

/// Sink summing its input region into a [`SinkRecords`] list.
///
/// Declares a `label` parameter so tests can change its configuration.
pub struct RecordingSink {
    pub name: String,
    records: SinkRecords,
    log: ExecutionLog,
}

impl RecordingSink {
    pub fn new(name: impl Into<String>, records: &SinkRecords, log: &ExecutionLog) -> Self {
        Self {
            name: name.into(),
            records: records.clone(),
            log: log.clone(),
        }
    }
}

impl Stage for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::new("input")]
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        Vec::new()
    }

    fn parameters(&self) -> ParamSet {
        ParamSet::new().with("label", "sink")
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        self.log.record(&self.name);
        let input = ctx.input(0)?;
        let region = input.requested().clone();
        let sum = region
            .indices()
            .filter_map(|index| input.value(&index))
            .map(f64::from)
            .sum();
        self.records.push(SinkRecord { region, sum });
        Ok(())
    }
}
