//! The [`Pipeline`]: graph editing, parameters and demand-driven updates.

use log::{debug, trace};

use crate::cancel::CancelToken;
use crate::config::PipelineConfig;
use crate::container::DataContainer;
use crate::graph::PipelineGraph;
use crate::metrics::UpdateMetrics;
use crate::update::{self, Terminal, UpdateReport, UpdateRun};
use tessera_core::{
    ConfigError, OutputRef, ParamValue, Region, StageId, Stamp, UpdateError, VersionClock,
};
use tessera_stage::{Stage, StageKind};

/// A demand-driven processing pipeline.
///
/// Owns the stage graph and the [`VersionClock`] that stamps every
/// configuration change and every produced buffer. An update walks only
/// the stages upstream of what was asked for, computes only the regions
/// asked for, and executes only the stages whose outputs are stale.
///
/// A pipeline is a single-writer resource: every mutating call, updates
/// included, takes `&mut self`.
///
/// # Examples
///
/// ```
/// use tessera_core::{ProcessingError, Region};
/// use tessera_engine::Pipeline;
/// use tessera_stage::{ExecuteContext, OutputSlot, Stage};
///
/// struct Ramp;
///
/// impl Stage for Ramp {
///     fn name(&self) -> &str { "ramp" }
///     fn outputs(&self) -> Vec<OutputSlot> { vec![OutputSlot::scalar("output")] }
///     fn output_information(
///         &self,
///         _inputs: &[Region],
///         _params: &tessera_core::ParamSet,
///     ) -> Result<Vec<Region>, tessera_core::RegionError> {
///         Ok(vec![Region::from_extent(&[8])])
///     }
///     fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
///         let out = ctx.output(0)?;
///         let start = out.requested().start(0);
///         for (i, v) in out.buffer_mut().as_mut_slice().iter_mut().enumerate() {
///             *v = (start + i as i64) as f32;
///         }
///         Ok(())
///     }
/// }
///
/// let mut pipeline = Pipeline::new();
/// let ramp = pipeline.add_stage(Ramp);
/// let output = pipeline.output_ref(ramp, "output").unwrap();
///
/// let tail = Region::new(&[6], &[2]).unwrap();
/// let report = pipeline.update_region(output, tail).unwrap();
/// assert_eq!(report.executed, vec![ramp]);
///
/// let buffer = pipeline.output(output).unwrap().buffer().unwrap();
/// assert_eq!(buffer.as_slice(), &[6.0, 7.0]);
///
/// // Nothing changed: the second update reuses everything.
/// let report = pipeline.update_region(output, Region::new(&[6], &[2]).unwrap()).unwrap();
/// assert!(report.executed.is_empty());
/// ```
pub struct Pipeline {
    graph: PipelineGraph,
    clock: VersionClock,
    config: PipelineConfig,
    cancel: CancelToken,
    last_metrics: UpdateMetrics,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// An empty pipeline with the default configuration.
    pub fn new() -> Self {
        Self {
            graph: PipelineGraph::new(),
            clock: VersionClock::new(),
            config: PipelineConfig::default(),
            cancel: CancelToken::new(),
            last_metrics: UpdateMetrics::default(),
        }
    }

    /// An empty pipeline with `config`.
    ///
    /// # Errors
    ///
    /// Whatever [`PipelineConfig::validate`] rejects.
    pub fn with_config(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    // ── Graph editing ──────────────────────────────────────────────

    /// Add a stage, named after [`Stage::name`].
    pub fn add_stage<S: Stage>(&mut self, stage: S) -> StageId {
        self.add_boxed(Box::new(stage))
    }

    /// Add an already boxed stage.
    pub fn add_boxed(&mut self, stage: Box<dyn Stage>) -> StageId {
        let name = stage.name().to_string();
        self.add_named_boxed(stage, name)
    }

    /// Add a stage under an explicit display name.
    pub fn add_named<S: Stage>(&mut self, stage: S, name: impl Into<String>) -> StageId {
        self.add_named_boxed(Box::new(stage), name.into())
    }

    fn add_named_boxed(&mut self, stage: Box<dyn Stage>, name: String) -> StageId {
        let stamp = self.clock.next();
        let id = self.graph.add(stage, name, stamp);
        debug!("added stage {id} '{}'", self.graph.node(id).map_or("", |n| n.name()));
        id
    }

    /// Connect input `input` of `consumer` to `source`.
    ///
    /// Rewiring an input counts as a configuration change of `consumer`.
    /// Returns the connection that was replaced.
    ///
    /// # Errors
    ///
    /// Unknown stages or slots, a pixel type the input does not accept, or
    /// an edge that would create a cycle. The graph is unchanged on error.
    pub fn set_input(
        &mut self,
        consumer: StageId,
        input: &str,
        source: OutputRef,
    ) -> Result<Option<OutputRef>, ConfigError> {
        let slot = self.graph.input_index(consumer, input)?;
        let replaced = self.graph.connect(consumer, slot, source)?;
        if replaced != Some(source) {
            self.touch(consumer)?;
        }
        trace!("connected {source} into stage {consumer} input '{input}'");
        Ok(replaced)
    }

    /// Connect output 0 of `producer` to input 0 of `consumer`.
    ///
    /// Shorthand for single-input chains.
    ///
    /// # Errors
    ///
    /// As [`set_input`](Self::set_input).
    pub fn connect(&mut self, producer: StageId, consumer: StageId) -> Result<(), ConfigError> {
        let source = OutputRef::new(producer, 0);
        let replaced = self.graph.connect(consumer, 0, source)?;
        if replaced != Some(source) {
            self.touch(consumer)?;
        }
        Ok(())
    }

    /// Clear input `input` of `consumer`, returning the old connection.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`] or [`ConfigError::UnknownSlot`].
    pub fn disconnect(
        &mut self,
        consumer: StageId,
        input: &str,
    ) -> Result<Option<OutputRef>, ConfigError> {
        let slot = self.graph.input_index(consumer, input)?;
        let old = self.graph.disconnect(consumer, slot)?;
        if old.is_some() {
            self.touch(consumer)?;
        }
        Ok(old)
    }

    /// Reference to the output slot `name` of `stage`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`] or [`ConfigError::UnknownSlot`].
    pub fn output_ref(&self, stage: StageId, name: &str) -> Result<OutputRef, ConfigError> {
        Ok(OutputRef::new(stage, self.graph.output_index(stage, name)?))
    }

    /// The container behind `output`. Never triggers computation.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`] or [`ConfigError::UnknownSlot`].
    pub fn output(&self, output: OutputRef) -> Result<&DataContainer, ConfigError> {
        self.graph.container(output)
    }

    /// The container of output slot `name` of `stage`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`] or [`ConfigError::UnknownSlot`].
    pub fn output_by_name(&self, stage: StageId, name: &str) -> Result<&DataContainer, ConfigError> {
        self.graph.container(self.output_ref(stage, name)?)
    }

    // ── Configuration ──────────────────────────────────────────────

    /// Set parameter `name` of `stage`.
    ///
    /// Setting a parameter to the value it already holds is a no-op that
    /// returns `false` and leaves every stamp untouched. Any other value
    /// is validated by the stage, stored, and advances the stage's
    /// parameters stamp.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownParameter`] for undeclared names,
    /// [`ConfigError::ParameterKind`] for a value of the wrong kind, and
    /// [`ConfigError::InvalidParameter`] if the stage rejects the value.
    pub fn set_parameter(
        &mut self,
        stage: StageId,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<bool, ConfigError> {
        let value = value.into();
        let node = self.graph.node(stage)?;
        let current = node
            .params()
            .get(name)
            .ok_or_else(|| ConfigError::UnknownParameter {
                stage: node.name().to_string(),
                name: name.to_string(),
            })?;
        if current.kind() != value.kind() {
            return Err(ConfigError::ParameterKind {
                stage: node.name().to_string(),
                name: name.to_string(),
                expected: current.kind(),
                got: value.kind(),
            });
        }
        if *current == value {
            trace!("parameter '{name}' of '{}' unchanged", node.name());
            return Ok(false);
        }
        node.stage()
            .validate_parameter(name, &value)
            .map_err(|reason| ConfigError::InvalidParameter {
                stage: node.name().to_string(),
                name: name.to_string(),
                reason,
            })?;

        let stamp = self.clock.next();
        let node = self.graph.node_mut(stage)?;
        debug!("parameter '{name}' of '{}' set to {value}, stamp {stamp}", node.name);
        node.params.insert(name, value);
        node.params_stamp = stamp;
        Ok(true)
    }

    /// Current value of parameter `name` of `stage`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`] or [`ConfigError::UnknownParameter`].
    pub fn parameter(&self, stage: StageId, name: &str) -> Result<&ParamValue, ConfigError> {
        let node = self.graph.node(stage)?;
        node.params()
            .get(name)
            .ok_or_else(|| ConfigError::UnknownParameter {
                stage: node.name().to_string(),
                name: name.to_string(),
            })
    }

    /// Clock value of the last configuration change of `stage`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`].
    pub fn parameters_stamp(&self, stage: StageId) -> Result<Stamp, ConfigError> {
        Ok(self.graph.node(stage)?.params_stamp())
    }

    /// Clock value of the last successful execution of `stage`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`].
    pub fn executed_stamp(&self, stage: StageId) -> Result<Stamp, ConfigError> {
        Ok(self.graph.node(stage)?.executed_stamp())
    }

    /// Display name of `stage`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`].
    pub fn stage_name(&self, stage: StageId) -> Result<&str, ConfigError> {
        Ok(self.graph.node(stage)?.name())
    }

    /// Mark `stage` modified without changing a parameter, e.g. after the
    /// data behind a source changed. Returns the new parameters stamp.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`].
    pub fn touch(&mut self, stage: StageId) -> Result<Stamp, ConfigError> {
        let node = self.graph.node_mut(stage)?;
        let stamp = self.clock.next();
        node.params_stamp = stamp;
        trace!("touched '{}', stamp {stamp}", node.name);
        Ok(stamp)
    }

    /// Drop the buffers of every output of `stage`, keeping all stamps.
    ///
    /// The next update that needs them re-executes the stage. Returns the
    /// number of bytes released.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`].
    pub fn release_data(&mut self, stage: StageId) -> Result<usize, ConfigError> {
        let node = self.graph.node_mut(stage)?;
        let bytes = node.outputs.iter_mut().map(DataContainer::release).sum();
        debug!("released {bytes} bytes held by '{}'", node.name);
        Ok(bytes)
    }

    // ── Updates ────────────────────────────────────────────────────

    /// Bring `output` up to date over its whole largest possible region.
    ///
    /// # Errors
    ///
    /// See [`UpdateError`]. Configuration and region errors are raised
    /// before anything is mutated; a failing stage leaves everything
    /// upstream of it valid.
    pub fn update(&mut self, output: OutputRef) -> Result<UpdateReport, UpdateError> {
        self.graph.container(output)?;
        self.run(Terminal::Output(output), None)
    }

    /// Bring `region` of `output` up to date.
    ///
    /// # Errors
    ///
    /// As [`update`](Self::update); additionally a region that does not
    /// overlap the output's largest possible region is a
    /// [`RegionError::EmptyRequest`](tessera_core::RegionError::EmptyRequest).
    pub fn update_region(
        &mut self,
        output: OutputRef,
        region: Region,
    ) -> Result<UpdateReport, UpdateError> {
        self.graph.container(output)?;
        self.run(Terminal::Output(output), Some(region))
    }

    /// Run sink `stage` over everything its input can supply.
    ///
    /// # Errors
    ///
    /// As [`update`](Self::update); [`ConfigError::InvalidConfig`] if the
    /// stage has outputs.
    pub fn update_sink(&mut self, stage: StageId) -> Result<UpdateReport, UpdateError> {
        self.check_sink(stage)?;
        self.run(Terminal::Sink(stage), None)
    }

    /// Run sink `stage` over `region` of its input.
    ///
    /// # Errors
    ///
    /// As [`update_sink`](Self::update_sink).
    pub fn update_sink_region(
        &mut self,
        stage: StageId,
        region: Region,
    ) -> Result<UpdateReport, UpdateError> {
        self.check_sink(stage)?;
        self.run(Terminal::Sink(stage), Some(region))
    }

    /// Compute and store the largest possible region of every output
    /// upstream of `stage`, without requesting or executing anything.
    ///
    /// # Errors
    ///
    /// Configuration errors on the upstream graph, or a region error from
    /// a stage's `output_information`.
    pub fn update_output_information(&mut self, stage: StageId) -> Result<(), UpdateError> {
        let info = update::information_pass(&self.graph, stage)?;
        update::commit_information(&mut self.graph, &info)?;
        Ok(())
    }

    /// Stages upstream of `terminal` (inclusive), producers first: the
    /// order an update would visit them in.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`] or [`ConfigError::UnconnectedInput`].
    pub fn upstream_order(&self, terminal: StageId) -> Result<Vec<StageId>, ConfigError> {
        self.graph.upstream_order(terminal)
    }

    fn check_sink(&self, stage: StageId) -> Result<(), ConfigError> {
        let node = self.graph.node(stage)?;
        if node.kind() != StageKind::Sink {
            return Err(ConfigError::InvalidConfig {
                reason: format!("stage '{}' has outputs; update one of them", node.name()),
            });
        }
        Ok(())
    }

    fn run(
        &mut self,
        terminal: Terminal,
        region: Option<Region>,
    ) -> Result<UpdateReport, UpdateError> {
        let report = UpdateRun {
            graph: &mut self.graph,
            clock: &self.clock,
            config: &self.config,
            cancel: &self.cancel,
        }
        .run(terminal, region)?;
        self.last_metrics = report.metrics.clone();
        Ok(report)
    }

    // ── Accessors ──────────────────────────────────────────────────

    /// The stage graph, read-only.
    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// The pipeline's clock.
    pub fn clock(&self) -> &VersionClock {
        &self.clock
    }

    /// Current configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// A handle that cancels updates of this pipeline.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Metrics of the most recent successful update.
    pub fn last_metrics(&self) -> &UpdateMetrics {
        &self.last_metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{ParamKind, ParamSet, ProcessingError, RegionError};
    use tessera_stage::{ExecuteContext, InputSlot, OutputSlot};

    struct Fill;

    impl Stage for Fill {
        fn name(&self) -> &str {
            "fill"
        }
        fn outputs(&self) -> Vec<OutputSlot> {
            vec![OutputSlot::scalar("output")]
        }
        fn parameters(&self) -> ParamSet {
            ParamSet::new().with("value", 1.0).with("size", 4i64)
        }
        fn validate_parameter(&self, name: &str, value: &ParamValue) -> Result<(), String> {
            match (name, value.as_int()) {
                ("size", Some(size)) if size < 1 => Err("size must be positive".into()),
                _ => Ok(()),
            }
        }
        fn output_information(
            &self,
            _inputs: &[Region],
            params: &ParamSet,
        ) -> Result<Vec<Region>, RegionError> {
            let size = params.int("size").unwrap_or(4) as u64;
            Ok(vec![Region::from_extent(&[size, size])])
        }
        fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
            let value = ctx.float("value")? as f32;
            ctx.output(0)?.buffer_mut().fill(value);
            Ok(())
        }
    }

    struct Double;

    impl Stage for Double {
        fn name(&self) -> &str {
            "double"
        }
        fn inputs(&self) -> Vec<InputSlot> {
            vec![InputSlot::new("input")]
        }
        fn outputs(&self) -> Vec<OutputSlot> {
            vec![OutputSlot::scalar("output")]
        }
        fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
            let input = ctx.input(0)?;
            let out = ctx.output(0)?;
            let region = out.requested().clone();
            out.buffer_mut().copy_region_from(input.buffer(), &region)?;
            out.buffer_mut().as_mut_slice().iter_mut().for_each(|v| *v *= 2.0);
            Ok(())
        }
    }

    fn chain() -> (Pipeline, StageId, StageId) {
        let mut p = Pipeline::new();
        let fill = p.add_stage(Fill);
        let double = p.add_stage(Double);
        p.connect(fill, double).unwrap();
        (p, fill, double)
    }

    #[test]
    fn update_runs_everything_once_then_nothing() {
        let (mut p, fill, double) = chain();
        let out = OutputRef::new(double, 0);
        let first = p.update(out).unwrap();
        assert_eq!(first.executed, vec![fill, double]);
        let buffer = p.output(out).unwrap().buffer().unwrap();
        assert!(buffer.as_slice().iter().all(|&v| v == 2.0));

        let second = p.update(out).unwrap();
        assert!(second.executed.is_empty());
        assert_eq!(second.reused, vec![fill, double]);
    }

    #[test]
    fn equal_parameter_is_a_no_op() {
        let (mut p, fill, _) = chain();
        let before = p.parameters_stamp(fill).unwrap();
        assert!(!p.set_parameter(fill, "value", 1.0).unwrap());
        assert_eq!(p.parameters_stamp(fill).unwrap(), before);
        assert!(p.set_parameter(fill, "value", 3.0).unwrap());
        assert!(p.parameters_stamp(fill).unwrap() > before);
        assert_eq!(p.parameter(fill, "value").unwrap(), &ParamValue::Float(3.0));
    }

    #[test]
    fn parameter_errors_do_not_mutate() {
        let (mut p, fill, _) = chain();
        let before = p.parameters_stamp(fill).unwrap();
        assert_eq!(
            p.set_parameter(fill, "value", 2i64).unwrap_err(),
            ConfigError::ParameterKind {
                stage: "fill".into(),
                name: "value".into(),
                expected: ParamKind::Float,
                got: ParamKind::Int,
            }
        );
        assert!(matches!(
            p.set_parameter(fill, "gain", 2.0),
            Err(ConfigError::UnknownParameter { .. })
        ));
        assert!(matches!(
            p.set_parameter(fill, "size", 0i64),
            Err(ConfigError::InvalidParameter { .. })
        ));
        assert_eq!(p.parameters_stamp(fill).unwrap(), before);
    }

    #[test]
    fn rewiring_marks_consumer_modified() {
        let (mut p, fill, double) = chain();
        p.update(OutputRef::new(double, 0)).unwrap();
        let other = p.add_stage(Fill);
        p.set_input(double, "input", OutputRef::new(other, 0)).unwrap();
        let report = p.update(OutputRef::new(double, 0)).unwrap();
        assert_eq!(report.executed, vec![other, double]);
        assert!(!report.ran(fill));
    }

    #[test]
    fn update_sink_rejects_non_sinks() {
        let (mut p, fill, _) = chain();
        assert!(matches!(
            p.update_sink(fill),
            Err(UpdateError::Config(ConfigError::InvalidConfig { .. }))
        ));
    }

    #[test]
    fn information_only_sets_largest_regions() {
        let (mut p, fill, double) = chain();
        p.set_parameter(fill, "size", 6i64).unwrap();
        p.update_output_information(double).unwrap();
        let container = p.output_by_name(double, "output").unwrap();
        assert_eq!(
            container.largest_region(),
            Some(&Region::from_extent(&[6, 6]))
        );
        assert!(container.buffer().is_none());
        assert!(p.executed_stamp(double).unwrap().is_never());
    }

    #[test]
    fn release_forces_reexecution() {
        let (mut p, fill, double) = chain();
        let out = OutputRef::new(double, 0);
        p.update(out).unwrap();
        assert_eq!(p.release_data(fill).unwrap(), 64);
        let report = p.update(out).unwrap();
        assert!(report.ran(fill));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PipelineConfig {
            max_buffer_cells: Some(0),
            ..PipelineConfig::default()
        };
        assert!(Pipeline::with_config(config).is_err());
    }
}
