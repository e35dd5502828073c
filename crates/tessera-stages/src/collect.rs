//! Sink that copies the requested data out of the pipeline.

use std::sync::{Arc, Mutex};

use tessera_core::{Buffer, ProcessingError};
use tessera_stage::{ExecuteContext, InputSlot, OutputSlot, Stage};

/// Shared slot a [`CollectSink`] writes into.
///
/// `None` until the sink first executes.
pub type CollectedBuffer = Arc<Mutex<Option<Buffer>>>;

/// Create an empty [`CollectedBuffer`].
pub fn new_collected_buffer() -> CollectedBuffer {
    Arc::new(Mutex::new(None))
}

/// Copies exactly the region it was asked for into a [`CollectedBuffer`].
///
/// Each execution replaces the previous copy.
#[derive(Debug)]
pub struct CollectSink {
    target: CollectedBuffer,
}

impl CollectSink {
    /// Write into `target`.
    pub fn new(target: CollectedBuffer) -> Self {
        Self { target }
    }
}

impl Stage for CollectSink {
    fn name(&self) -> &str {
        "CollectSink"
    }

    fn inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::new("input")]
    }

    fn outputs(&self) -> Vec<OutputSlot> {
        Vec::new()
    }

    fn execute(&self, ctx: &mut ExecuteContext<'_>) -> Result<(), ProcessingError> {
        let input = ctx.input(0)?;
        let copy = input.buffer().extract(input.requested())?;
        let mut slot = self
            .target
            .lock()
            .map_err(|_| ProcessingError::ExecutionFailed {
                reason: "collected buffer lock poisoned".into(),
            })?;
        *slot = Some(copy);
        Ok(())
    }
}
