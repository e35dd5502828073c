//! The stage graph: an arena of nodes connected by output references.
//!
//! Ownership is one-directional. Each [`StageNode`] owns its stage and
//! its output [`DataContainer`]s; an input is only an [`OutputRef`]
//! naming the producer's slot. The graph is acyclic by construction:
//! [`connect`](PipelineGraph::connect) refuses edges that would close a
//! cycle.

use crate::container::DataContainer;
use tessera_core::{ConfigError, OutputRef, ParamSet, Region, StageId, Stamp};
use tessera_stage::{InputSlot, Stage, StageKind};

/// One stage and everything the engine tracks about it.
pub struct StageNode {
    pub(crate) stage: Box<dyn Stage>,
    pub(crate) name: String,
    pub(crate) kind: StageKind,
    pub(crate) input_slots: Vec<InputSlot>,
    pub(crate) inputs: Vec<Option<OutputRef>>,
    pub(crate) outputs: Vec<DataContainer>,
    pub(crate) params: ParamSet,
    pub(crate) params_stamp: Stamp,
    pub(crate) executed: Stamp,
    pub(crate) failed: bool,
    /// Per-input regions from the last region pass.
    pub(crate) input_requests: Vec<Region>,
    /// For sinks: the region of the pending request.
    pub(crate) sink_request: Option<Region>,
    /// For sinks: the region of the last successful execution.
    pub(crate) sink_executed: Option<Region>,
}

impl StageNode {
    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source, filter or sink.
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// The stage implementation.
    pub fn stage(&self) -> &dyn Stage {
        self.stage.as_ref()
    }

    /// Declared input slots.
    pub fn input_slots(&self) -> &[InputSlot] {
        &self.input_slots
    }

    /// Current connections, one per input slot.
    pub fn inputs(&self) -> &[Option<OutputRef>] {
        &self.inputs
    }

    /// Owned output containers.
    pub fn outputs(&self) -> &[DataContainer] {
        &self.outputs
    }

    /// Current parameter values.
    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    /// Clock value of the last configuration change.
    pub fn params_stamp(&self) -> Stamp {
        self.params_stamp
    }

    /// Clock value of the last successful execution.
    pub fn executed_stamp(&self) -> Stamp {
        self.executed
    }

    /// Whether the last execution attempt failed.
    pub fn has_failed(&self) -> bool {
        self.failed
    }
}

/// Arena of stage nodes indexed by [`StageId`].
#[derive(Default)]
pub struct PipelineGraph {
    nodes: Vec<StageNode>,
}

impl PipelineGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no stages.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All stage IDs in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = StageId> + '_ {
        (0..self.nodes.len()).map(|i| StageId(i as u32))
    }

    /// Insert a stage, stamping its parameters with `stamp`.
    pub(crate) fn add(&mut self, stage: Box<dyn Stage>, name: String, stamp: Stamp) -> StageId {
        let id = StageId(self.nodes.len() as u32);
        let input_slots = stage.inputs();
        let outputs: Vec<DataContainer> = stage
            .outputs()
            .into_iter()
            .map(|slot| DataContainer::new(id, slot.name, slot.pixel))
            .collect();
        let kind = StageKind::classify(input_slots.len(), outputs.len());
        let params = stage.parameters();
        self.nodes.push(StageNode {
            stage,
            name,
            kind,
            inputs: vec![None; input_slots.len()],
            input_requests: Vec::new(),
            input_slots,
            outputs,
            params,
            params_stamp: stamp,
            executed: Stamp::NEVER,
            failed: false,
            sink_request: None,
            sink_executed: None,
        });
        id
    }

    /// The node for `id`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`] if `id` is not in this graph.
    pub fn node(&self, id: StageId) -> Result<&StageNode, ConfigError> {
        self.nodes
            .get(id.index())
            .ok_or(ConfigError::UnknownStage { stage: id })
    }

    pub(crate) fn node_mut(&mut self, id: StageId) -> Result<&mut StageNode, ConfigError> {
        self.nodes
            .get_mut(id.index())
            .ok_or(ConfigError::UnknownStage { stage: id })
    }

    /// The container `output` refers to.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`] or [`ConfigError::UnknownSlot`].
    pub fn container(&self, output: OutputRef) -> Result<&DataContainer, ConfigError> {
        let node = self.node(output.stage)?;
        node.outputs
            .get(output.slot)
            .ok_or_else(|| ConfigError::UnknownSlot {
                stage: node.name.clone(),
                slot: format!("#{}", output.slot),
            })
    }

    pub(crate) fn container_mut(
        &mut self,
        output: OutputRef,
    ) -> Result<&mut DataContainer, ConfigError> {
        let node = self.node_mut(output.stage)?;
        let name = &node.name;
        match node.outputs.get_mut(output.slot) {
            Some(container) => Ok(container),
            None => Err(ConfigError::UnknownSlot {
                stage: name.clone(),
                slot: format!("#{}", output.slot),
            }),
        }
    }

    /// Index of the input slot called `name`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`] or [`ConfigError::UnknownSlot`].
    pub fn input_index(&self, stage: StageId, name: &str) -> Result<usize, ConfigError> {
        let node = self.node(stage)?;
        node.input_slots
            .iter()
            .position(|slot| slot.name == name)
            .ok_or_else(|| ConfigError::UnknownSlot {
                stage: node.name.clone(),
                slot: name.to_string(),
            })
    }

    /// Index of the output slot called `name`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`] or [`ConfigError::UnknownSlot`].
    pub fn output_index(&self, stage: StageId, name: &str) -> Result<usize, ConfigError> {
        let node = self.node(stage)?;
        node.outputs
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| ConfigError::UnknownSlot {
                stage: node.name.clone(),
                slot: name.to_string(),
            })
    }

    /// Connect input `input` of `consumer` to `source`, returning the
    /// connection it replaces.
    ///
    /// # Errors
    ///
    /// Unknown stages or slots, a pixel type the slot does not accept, or
    /// an edge that would close a cycle. On error the graph is unchanged.
    pub fn connect(
        &mut self,
        consumer: StageId,
        input: usize,
        source: OutputRef,
    ) -> Result<Option<OutputRef>, ConfigError> {
        let produced = self.container(source)?.pixel_type();
        let node = self.node(consumer)?;
        let slot = node
            .input_slots
            .get(input)
            .ok_or_else(|| ConfigError::UnknownSlot {
                stage: node.name.clone(),
                slot: format!("#{input}"),
            })?;
        if let Some(expected) = slot.pixel {
            if expected != produced {
                return Err(ConfigError::PixelTypeMismatch {
                    stage: node.name.clone(),
                    slot: slot.name.clone(),
                    expected,
                    got: produced,
                });
            }
        }
        if self.is_upstream(consumer, source.stage) {
            return Err(ConfigError::CycleDetected {
                consumer: node.name.clone(),
                producer: self.node(source.stage)?.name.clone(),
            });
        }
        let node = self.node_mut(consumer)?;
        Ok(node.inputs[input].replace(source))
    }

    /// Clear input `input` of `consumer`, returning the old connection.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownStage`] or [`ConfigError::UnknownSlot`].
    pub fn disconnect(
        &mut self,
        consumer: StageId,
        input: usize,
    ) -> Result<Option<OutputRef>, ConfigError> {
        let node = self.node_mut(consumer)?;
        match node.inputs.get_mut(input) {
            Some(slot) => Ok(slot.take()),
            None => Err(ConfigError::UnknownSlot {
                stage: node.name.clone(),
                slot: format!("#{input}"),
            }),
        }
    }

    /// Whether `candidate` is `of` or feeds it, directly or transitively.
    pub fn is_upstream(&self, candidate: StageId, of: StageId) -> bool {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![of];
        while let Some(id) = stack.pop() {
            if id == candidate {
                return true;
            }
            let Some(node) = self.nodes.get(id.index()) else {
                continue;
            };
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            stack.extend(node.inputs.iter().flatten().map(|r| r.stage));
        }
        false
    }

    /// Every `(stage, input slot)` currently reading `output`.
    pub fn consumers(&self, output: OutputRef) -> Vec<(StageId, usize)> {
        let mut found = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            for (slot, input) in node.inputs.iter().enumerate() {
                if *input == Some(output) {
                    found.push((StageId(i as u32), slot));
                }
            }
        }
        found
    }

    /// Stages reachable upstream of `terminal` (inclusive), producers
    /// before consumers.
    ///
    /// Depth-first postorder over input references; inputs are visited
    /// in slot order, so the result is deterministic.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnconnectedInput`] if any reached stage has an empty
    /// input slot.
    pub fn upstream_order(&self, terminal: StageId) -> Result<Vec<StageId>, ConfigError> {
        self.node(terminal)?;
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        // (stage, next input slot to visit)
        let mut stack: Vec<(StageId, usize)> = vec![(terminal, 0)];
        visited[terminal.index()] = true;

        while let Some(top) = stack.last_mut() {
            let (id, slot) = *top;
            let node = self.node(id)?;
            if slot == node.inputs.len() {
                order.push(id);
                stack.pop();
                continue;
            }
            top.1 += 1;
            let source = node.inputs[slot].ok_or_else(|| ConfigError::UnconnectedInput {
                stage: node.name.clone(),
                slot: node.input_slots[slot].name.clone(),
            })?;
            if !std::mem::replace(&mut visited[source.stage.index()], true) {
                stack.push((source.stage, 0));
            }
        }
        Ok(order)
    }
}
