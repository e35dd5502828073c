//! The update protocol as named passes over one topological stage list.
//!
//! An update runs, in order:
//!
//! 1. [`information_pass`]: largest possible region of every output,
//!    producers first.
//! 2. [`region_pass`]: requested region of every container, consumers
//!    first, through the [`RegionNegotiator`].
//! 3. [`commit_regions`]: the only point where passes 1 and 2 touch the
//!    graph. Nothing before it mutates anything, so region and
//!    configuration errors leave the graph exactly as it was.
//! 4. [`staleness_pass`]: one flag per stage, no mutation.
//! 5. [`execute_pass`]: run stale stages, producers first.
//! 6. [`verify_containment`]: optional invariant check.

use std::time::Instant;

use log::{debug, trace, warn};

use crate::cancel::CancelToken;
use crate::config::PipelineConfig;
use crate::graph::{PipelineGraph, StageNode};
use crate::metrics::UpdateMetrics;
use tessera_core::{
    Buffer, ConfigError, OutputRef, Region, RegionError, StageId, UpdateError, VersionClock,
};
use tessera_stage::{Demand, ExecuteContext, InputView, OutputTarget, RegionNegotiator, StageKind};

// ── UpdateReport ───────────────────────────────────────────────────

/// Outcome of a successful update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Stages that executed, in execution order.
    pub executed: Vec<StageId>,
    /// Stages that were up to date and reused unchanged.
    pub reused: Vec<StageId>,
    /// Timings and allocation totals.
    pub metrics: UpdateMetrics,
}

impl UpdateReport {
    /// Whether `stage` executed during this update.
    pub fn ran(&self, stage: StageId) -> bool {
        self.executed.contains(&stage)
    }
}

// ── Terminal ───────────────────────────────────────────────────────

/// What an update was asked to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Terminal {
    /// An output container of a source or filter.
    Output(OutputRef),
    /// A sink, which has no output container of its own.
    Sink(StageId),
}

impl Terminal {
    pub(crate) fn stage(self) -> StageId {
        match self {
            Self::Output(output) => output.stage,
            Self::Sink(stage) => stage,
        }
    }
}

// ── StaleReason ────────────────────────────────────────────────────

/// Why a stage must execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StaleReason {
    /// Configuration changed after the last execution.
    ParametersChanged,
    /// An input buffer does not cover what this stage needs from it.
    InputNotBuffered { slot: usize },
    /// The producer feeding an input is itself stale.
    UpstreamStale { slot: usize },
    /// An own output was never produced or does not cover its request.
    OutputMissing { slot: usize },
    /// An input was regenerated after this stage last executed.
    InputRegenerated { slot: usize },
    /// The last execution failed.
    PreviousFailure,
    /// A sink was asked for a different region than it last handled.
    SinkRequestChanged,
}

// ── Information pass ───────────────────────────────────────────────

/// Largest possible regions for every stage of an upstream order.
#[derive(Debug)]
pub(crate) struct Information {
    /// Producers before consumers; the terminal is last.
    pub(crate) order: Vec<StageId>,
    position: Vec<Option<usize>>,
    largest: Vec<Vec<Region>>,
}

impl Information {
    fn position(&self, stage: StageId) -> Option<usize> {
        self.position.get(stage.index()).copied().flatten()
    }

    pub(crate) fn largest_of(&self, output: OutputRef) -> Option<&Region> {
        self.largest
            .get(self.position(output.stage)?)?
            .get(output.slot)
    }

    /// Largest regions of the containers feeding `node`, in slot order.
    fn input_largest(&self, node: &StageNode) -> Result<Vec<Region>, ConfigError> {
        node.inputs
            .iter()
            .enumerate()
            .map(|(slot, input)| {
                let source = connected(node, slot, *input)?;
                self.largest_of(source)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownSlot {
                        stage: node.name.clone(),
                        slot: format!("#{}", source.slot),
                    })
            })
            .collect()
    }
}

fn connected(
    node: &StageNode,
    slot: usize,
    input: Option<OutputRef>,
) -> Result<OutputRef, ConfigError> {
    input.ok_or_else(|| ConfigError::UnconnectedInput {
        stage: node.name.clone(),
        slot: node
            .input_slots
            .get(slot)
            .map_or_else(|| format!("#{slot}"), |s| s.name.clone()),
    })
}

/// Compute the largest possible region of every output upstream of
/// `terminal`. Pure.
pub(crate) fn information_pass(
    graph: &PipelineGraph,
    terminal: StageId,
) -> Result<Information, UpdateError> {
    let order = graph.upstream_order(terminal)?;
    let mut position = vec![None; graph.len()];
    for (pos, id) in order.iter().enumerate() {
        position[id.index()] = Some(pos);
    }
    let mut info = Information {
        order,
        position,
        largest: Vec::new(),
    };

    for pos in 0..info.order.len() {
        let node = graph.node(info.order[pos])?;
        let inputs = info.input_largest(node)?;
        let regions = node.stage.output_information(&inputs, &node.params)?;
        if regions.len() != node.outputs.len() {
            return Err(RegionError::InvariantViolated {
                stage: node.name.clone(),
                slot: "*".into(),
                reason: format!(
                    "{} largest regions reported for {} outputs",
                    regions.len(),
                    node.outputs.len()
                ),
            }
            .into());
        }
        for (container, region) in node.outputs.iter().zip(&regions) {
            trace!("'{}.{}' can produce {region}", node.name, container.name());
        }
        info.largest.push(regions);
    }
    Ok(info)
}

// ── Region pass ────────────────────────────────────────────────────

/// Requested regions computed by the region pass.
#[derive(Debug)]
pub(crate) struct Requests {
    /// Per order position, per output slot. `None` = not demanded.
    outputs: Vec<Vec<Option<Region>>>,
    /// Per order position, per input slot.
    inputs: Vec<Vec<Region>>,
    /// The virtual request on a terminal sink.
    sink: Option<Region>,
}

/// Propagate the terminal request upstream. Pure.
///
/// `region` defaults to the terminal's largest possible region and is
/// cropped to it otherwise. A container read by several consumers is asked for the bounding box of
/// all their requests.
pub(crate) fn region_pass(
    graph: &PipelineGraph,
    info: &Information,
    terminal: Terminal,
    region: Option<Region>,
) -> Result<Requests, UpdateError> {
    let count = info.order.len();
    let last = count.checked_sub(1).ok_or(ConfigError::UnknownStage {
        stage: terminal.stage(),
    })?;
    let mut outputs: Vec<Vec<Option<Region>>> =
        info.largest.iter().map(|l| vec![None; l.len()]).collect();
    let mut inputs: Vec<Vec<Region>> = vec![Vec::new(); count];

    // The sink's virtual output spans its first input's largest region.
    let mut sink: Option<(Region, Region)> = None;
    match terminal {
        Terminal::Output(output) => {
            let largest = info.largest_of(output).ok_or_else(|| unknown_output(graph, output))?;
            outputs[last][output.slot] = Some(clamp_request(region, largest)?);
        }
        Terminal::Sink(stage) => {
            let node = graph.node(stage)?;
            let first = node
                .inputs
                .first()
                .copied()
                .flatten()
                .ok_or_else(|| ConfigError::InvalidConfig {
                    reason: format!("sink '{}' has no connected input", node.name),
                })?;
            let largest = info
                .largest_of(first)
                .cloned()
                .ok_or_else(|| unknown_output(graph, first))?;
            let requested = clamp_request(region, &largest)?;
            sink = Some((requested, largest));
        }
    }

    for pos in (0..count).rev() {
        let node = graph.node(info.order[pos])?;
        let input_largest = info.input_largest(node)?;
        let needed = {
            let mut demands = Vec::new();
            for (slot, requested) in outputs[pos].iter().enumerate() {
                let Some(requested) = requested else {
                    continue;
                };
                let is_terminal =
                    pos == last && terminal == Terminal::Output(OutputRef::new(info.order[pos], slot));
                // Only the caller's own request may be empty and still
                // be checked; upstream an empty request needs nothing.
                if requested.is_empty() && !is_terminal {
                    continue;
                }
                demands.push(Demand {
                    output: slot,
                    requested,
                    largest: &info.largest[pos][slot],
                });
            }
            if pos == last {
                if let Some((requested, largest)) = &sink {
                    demands.push(Demand {
                        output: 0,
                        requested,
                        largest,
                    });
                }
            }
            RegionNegotiator::compute_input_regions(
                node.stage.as_ref(),
                &node.params,
                &demands,
                &input_largest,
            )?
        };

        for (slot, region) in needed.iter().enumerate() {
            let source = connected(node, slot, node.inputs[slot])?;
            trace!("'{}' needs {region} from input {slot}", node.name);
            let producer = info
                .position(source.stage)
                .ok_or(ConfigError::UnknownStage {
                    stage: source.stage,
                })?;
            let entry = &mut outputs[producer][source.slot];
            *entry = Some(match entry.take() {
                Some(existing) => existing.union(region)?,
                None => region.clone(),
            });
        }
        inputs[pos] = needed;
    }

    Ok(Requests {
        outputs,
        inputs,
        sink: sink.map(|(requested, _)| requested),
    })
}

/// The caller's request cropped to what the terminal can supply.
fn clamp_request(region: Option<Region>, largest: &Region) -> Result<Region, RegionError> {
    let Some(region) = region else {
        return Ok(largest.clone());
    };
    let cropped = region.crop_to(largest)?;
    if cropped.is_empty() && region != *largest {
        return Err(RegionError::EmptyRequest {
            requested: region,
            available: largest.clone(),
        });
    }
    Ok(cropped)
}

fn unknown_output(graph: &PipelineGraph, output: OutputRef) -> ConfigError {
    ConfigError::UnknownSlot {
        stage: graph
            .node(output.stage)
            .map_or_else(|_| output.stage.to_string(), |n| n.name.clone()),
        slot: format!("#{}", output.slot),
    }
}

// ── Commit ─────────────────────────────────────────────────────────

/// Store largest regions on every container of the order.
pub(crate) fn commit_information(
    graph: &mut PipelineGraph,
    info: &Information,
) -> Result<(), ConfigError> {
    for (pos, &id) in info.order.iter().enumerate() {
        let node = graph.node_mut(id)?;
        for (container, largest) in node.outputs.iter_mut().zip(&info.largest[pos]) {
            container.set_largest(largest.clone());
        }
    }
    Ok(())
}

/// Store largest and requested regions. Outputs nobody demanded get an
/// empty request.
pub(crate) fn commit_regions(
    graph: &mut PipelineGraph,
    info: &Information,
    requests: Requests,
    terminal: Terminal,
) -> Result<(), ConfigError> {
    commit_information(graph, info)?;
    let Requests {
        outputs,
        inputs,
        sink,
    } = requests;
    for ((pos, &id), (output_requests, input_requests)) in info
        .order
        .iter()
        .enumerate()
        .zip(outputs.into_iter().zip(inputs))
    {
        let node = graph.node_mut(id)?;
        for (slot, (container, requested)) in node
            .outputs
            .iter_mut()
            .zip(output_requests)
            .enumerate()
        {
            let requested = requested
                .unwrap_or_else(|| Region::empty_at(info.largest[pos][slot].origin()));
            container.set_requested(requested);
        }
        node.input_requests = input_requests;
    }
    if let Terminal::Sink(stage) = terminal {
        graph.node_mut(stage)?.sink_request = sink;
    }
    Ok(())
}

// ── Staleness pass ─────────────────────────────────────────────────

/// Decide, producers first, which stages must execute. Pure.
pub(crate) fn staleness_pass(
    graph: &PipelineGraph,
    info: &Information,
) -> Result<Vec<Option<StaleReason>>, ConfigError> {
    let mut stale: Vec<Option<StaleReason>> = Vec::with_capacity(info.order.len());
    for &id in &info.order {
        let node = graph.node(id)?;
        let reason = stale_reason(graph, info, node, &stale)?;
        match reason {
            Some(reason) => debug!("stage '{}' is stale: {reason:?}", node.name),
            None => trace!("stage '{}' is up to date", node.name),
        }
        stale.push(reason);
    }
    Ok(stale)
}

fn stale_reason(
    graph: &PipelineGraph,
    info: &Information,
    node: &StageNode,
    stale_so_far: &[Option<StaleReason>],
) -> Result<Option<StaleReason>, ConfigError> {
    if node.params_stamp > node.executed {
        return Ok(Some(StaleReason::ParametersChanged));
    }
    for (slot, input) in node.inputs.iter().enumerate() {
        let source = connected(node, slot, *input)?;
        let container = graph.container(source)?;
        let covered = match (container.buffered_region(), node.input_requests.get(slot)) {
            (Some(buffered), Some(requested)) => buffered.contains(requested),
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !covered {
            return Ok(Some(StaleReason::InputNotBuffered { slot }));
        }
    }
    for (slot, input) in node.inputs.iter().enumerate() {
        let source = connected(node, slot, *input)?;
        let upstream_stale = info
            .position(source.stage)
            .and_then(|p| stale_so_far.get(p))
            .is_some_and(Option::is_some);
        if upstream_stale {
            return Ok(Some(StaleReason::UpstreamStale { slot }));
        }
    }
    for (slot, container) in node.outputs.iter().enumerate() {
        if container.generation().is_never() || !container.satisfies_request() {
            return Ok(Some(StaleReason::OutputMissing { slot }));
        }
    }
    for (slot, input) in node.inputs.iter().enumerate() {
        let source = connected(node, slot, *input)?;
        if graph.container(source)?.generation() > node.executed {
            return Ok(Some(StaleReason::InputRegenerated { slot }));
        }
    }
    if node.failed {
        return Ok(Some(StaleReason::PreviousFailure));
    }
    if node.kind == StageKind::Sink && node.sink_request != node.sink_executed {
        return Ok(Some(StaleReason::SinkRequestChanged));
    }
    Ok(None)
}

// ── Execution pass ─────────────────────────────────────────────────

/// What the execution pass did.
#[derive(Debug, Default)]
pub(crate) struct Execution {
    pub(crate) executed: Vec<StageId>,
    pub(crate) reused: Vec<StageId>,
    pub(crate) stage_us: Vec<(String, u64)>,
    pub(crate) bytes_allocated: usize,
}

/// Execute stale stages, producers first.
///
/// Stops at the first failure. Stages completed before it keep their
/// fresh outputs; the failing stage keeps its previous outputs and
/// generation and is flagged so the next update retries it.
pub(crate) fn execute_pass(
    graph: &mut PipelineGraph,
    clock: &VersionClock,
    config: &PipelineConfig,
    cancel: &CancelToken,
    order: &[StageId],
    stale: &[Option<StaleReason>],
) -> Result<Execution, UpdateError> {
    let mut run = Execution::default();
    for (pos, (&id, reason)) in order.iter().zip(stale).enumerate() {
        if reason.is_none() {
            run.reused.push(id);
            continue;
        }
        if cancel.is_cancelled() {
            let skipped = stale[pos..].iter().filter(|s| s.is_some()).count();
            warn!(
                "update cancelled before stage '{}'; {skipped} stages not run",
                graph.node(id)?.name
            );
            return Err(UpdateError::Cancelled { skipped });
        }

        let started = Instant::now();
        let produced = match produce(graph, id, config) {
            Ok(produced) => produced,
            Err(err) => {
                let node = graph.node_mut(id)?;
                node.failed = true;
                warn!("stage '{}' failed: {err}", node.name);
                return Err(err);
            }
        };

        let stamp = clock.next();
        let node = graph.node_mut(id)?;
        for (container, buffer) in node.outputs.iter_mut().zip(produced) {
            run.bytes_allocated += buffer.byte_len();
            container.store(buffer, stamp);
        }
        node.executed = stamp;
        node.failed = false;
        node.sink_executed = node.sink_request.clone();
        let elapsed = started.elapsed().as_micros() as u64;
        debug!("executed stage '{}' in {elapsed}us, stamp {stamp}", node.name);
        run.stage_us.push((node.name.clone(), elapsed));
        run.executed.push(id);
    }
    Ok(run)
}

/// Allocate outputs, resolve inputs, run the stage and check what it
/// produced. Reads the graph only.
fn produce(
    graph: &PipelineGraph,
    id: StageId,
    config: &PipelineConfig,
) -> Result<Vec<Buffer>, UpdateError> {
    let node = graph.node(id)?;

    let mut targets = Vec::with_capacity(node.outputs.len());
    for container in &node.outputs {
        let (Some(requested), Some(largest)) =
            (container.requested_region(), container.largest_region())
        else {
            return Err(RegionError::InvariantViolated {
                stage: node.name.clone(),
                slot: container.name().to_string(),
                reason: "regions were not negotiated".into(),
            }
            .into());
        };
        let buffer = Buffer::allocate_limited(
            requested.clone(),
            container.pixel_type(),
            config.max_buffer_cells,
        )
        .map_err(|source| UpdateError::Resource {
            stage: node.name.clone(),
            source,
        })?;
        targets.push(OutputTarget::new(
            container.name(),
            requested.clone(),
            largest.clone(),
            buffer,
            config.max_buffer_cells,
        ));
    }

    let mut views = Vec::with_capacity(node.inputs.len());
    for (slot, input) in node.inputs.iter().enumerate() {
        let source = connected(node, slot, *input)?;
        let container = graph.container(source)?;
        let requested = node
            .input_requests
            .get(slot)
            .ok_or_else(|| RegionError::InvariantViolated {
                stage: node.name.clone(),
                slot: node.input_slots[slot].name.clone(),
                reason: "input region was not negotiated".into(),
            })?;
        let buffer = container
            .buffer()
            .filter(|b| b.region().contains(requested))
            .ok_or_else(|| RegionError::Unsatisfied {
                stage: graph
                    .node(source.stage)
                    .map_or_else(|_| source.stage.to_string(), |n| n.name.clone()),
                slot: container.name().to_string(),
                requested: requested.clone(),
                produced: container
                    .buffered_region()
                    .cloned()
                    .unwrap_or_else(|| Region::empty(requested.dims())),
            })?;
        views.push(InputView::new(buffer, requested));
    }

    {
        let mut ctx = ExecuteContext::new(&node.name, &views, &mut targets, &node.params);
        node.stage
            .execute(&mut ctx)
            .map_err(|reason| UpdateError::StageFailed {
                stage: id,
                name: node.name.clone(),
                reason,
            })?;
    }

    let mut produced = Vec::with_capacity(targets.len());
    for (container, target) in node.outputs.iter().zip(targets) {
        let buffered = target.buffer().region();
        if !buffered.contains(target.requested()) {
            return Err(RegionError::Unsatisfied {
                stage: node.name.clone(),
                slot: container.name().to_string(),
                requested: target.requested().clone(),
                produced: buffered.clone(),
            }
            .into());
        }
        if !target.largest().contains(buffered) {
            return Err(RegionError::InvariantViolated {
                stage: node.name.clone(),
                slot: container.name().to_string(),
                reason: format!("buffered {buffered} exceeds largest {}", target.largest()),
            }
            .into());
        }
        if target.buffer().pixel_type() != container.pixel_type() {
            return Err(RegionError::InvariantViolated {
                stage: node.name.clone(),
                slot: container.name().to_string(),
                reason: format!(
                    "produced {} samples, declared {}",
                    target.buffer().pixel_type(),
                    container.pixel_type()
                ),
            }
            .into());
        }
        produced.push(target.into_buffer());
    }
    Ok(produced)
}

// ── Verification ───────────────────────────────────────────────────

/// Check `largest ⊇ buffered ⊇ requested` on every output of `order`.
pub(crate) fn verify_containment(
    graph: &PipelineGraph,
    order: &[StageId],
) -> Result<(), UpdateError> {
    for &id in order {
        let node = graph.node(id)?;
        for container in &node.outputs {
            let violated = |reason: String| RegionError::InvariantViolated {
                stage: node.name.clone(),
                slot: container.name().to_string(),
                reason,
            };
            let (Some(largest), Some(requested), Some(buffered)) = (
                container.largest_region(),
                container.requested_region(),
                container.buffered_region(),
            ) else {
                return Err(violated("container has no regions or no buffer".into()).into());
            };
            if !buffered.contains(requested) {
                return Err(violated(format!(
                    "buffered {buffered} does not contain requested {requested}"
                ))
                .into());
            }
            if !largest.contains(buffered) {
                return Err(violated(format!(
                    "buffered {buffered} exceeds largest {largest}"
                ))
                .into());
            }
        }
    }
    Ok(())
}

// ── Orchestration ──────────────────────────────────────────────────

/// Everything an update needs from the pipeline, borrowed for one call.
pub(crate) struct UpdateRun<'p> {
    pub(crate) graph: &'p mut PipelineGraph,
    pub(crate) clock: &'p VersionClock,
    pub(crate) config: &'p PipelineConfig,
    pub(crate) cancel: &'p CancelToken,
}

impl UpdateRun<'_> {
    /// Run every pass for `terminal`.
    pub(crate) fn run(
        self,
        terminal: Terminal,
        region: Option<Region>,
    ) -> Result<UpdateReport, UpdateError> {
        let started = Instant::now();

        let pass = Instant::now();
        let info = information_pass(self.graph, terminal.stage())?;
        let information_us = pass.elapsed().as_micros() as u64;

        let pass = Instant::now();
        let requests = region_pass(self.graph, &info, terminal, region)?;
        commit_regions(self.graph, &info, requests, terminal)?;
        let region_us = pass.elapsed().as_micros() as u64;

        let pass = Instant::now();
        let stale = staleness_pass(self.graph, &info)?;
        let staleness_us = pass.elapsed().as_micros() as u64;

        let pass = Instant::now();
        let run = execute_pass(
            self.graph,
            self.clock,
            self.config,
            self.cancel,
            &info.order,
            &stale,
        )?;
        let execution_us = pass.elapsed().as_micros() as u64;

        if self.config.verify_invariants {
            verify_containment(self.graph, &info.order)?;
        }

        let metrics = UpdateMetrics {
            total_us: started.elapsed().as_micros() as u64,
            information_us,
            region_us,
            staleness_us,
            execution_us,
            stage_us: run.stage_us,
            stages_considered: info.order.len(),
            stages_executed: run.executed.len(),
            bytes_allocated: run.bytes_allocated,
        };
        debug!(
            "update of stage {} done: {} executed, {} reused, {}us",
            terminal.stage(),
            run.executed.len(),
            run.reused.len(),
            metrics.total_us
        );
        Ok(UpdateReport {
            executed: run.executed,
            reused: run.reused,
            metrics,
        })
    }
}

