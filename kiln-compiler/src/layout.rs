use crate::pass::{Pass, PassResult};
use kiln_core::{DenseTensorLayout, Graph, KilnError, Op, Output, TensorLayout};
use std::sync::Arc;

/// Attaches dense row major layouts to every valid output with static
/// shape and element type. The graph owns the layouts.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssignLayout {
    alignment: Option<usize>,
}

impl AssignLayout {
    /// Layouts padded to `alignment` bytes instead of the configured alignment
    #[must_use]
    pub const fn with_alignment(alignment: usize) -> Self {
        Self {
            alignment: Some(alignment),
        }
    }
}

impl Pass for AssignLayout {
    fn name(&self) -> &'static str {
        "AssignLayout"
    }

    fn run_on_graph(&mut self, graph: &mut Graph) -> Result<PassResult, KilnError> {
        let alignment = self.alignment.unwrap_or(graph.config().alignment);
        let mut planned = Vec::new();
        for node in graph.nodes() {
            for (index, desc) in node.outputs().iter().enumerate() {
                let (Ok(element_type), Ok(shape)) = (desc.element_type(), desc.shape()) else {
                    continue;
                };
                if !element_type.is_static() {
                    continue;
                }
                let layout = DenseTensorLayout::new(element_type, shape.clone(), alignment);
                let current = desc.tensor_layout();
                // Only layouts that would change are replaced
                let same = current.is_some_and(|c| {
                    c.shape() == layout.shape()
                        && c.element_type() == layout.element_type()
                        && c.allocated_size() == layout.allocated_size()
                });
                if !same {
                    planned.push((Output::new(node.id(), index), layout));
                }
            }
        }
        let rewrites = planned.len();
        for (output, layout) in planned {
            graph.attach_layout(output, Arc::new(layout))?;
        }
        graph.prune_layouts();
        Ok(PassResult::rewrote(rewrites))
    }
}

/// Assigns pool offsets to every output that needs its own buffer.
///
/// Buffers are bump allocated in topological order, every offset is aligned.
/// Results alias their input and get no buffer, neither do outputs whose
/// shape is dynamic or invalid.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryLayout {
    alignment: Option<usize>,
    pool_size: usize,
}

impl MemoryLayout {
    /// Offsets aligned to `alignment` bytes instead of the configured alignment
    #[must_use]
    pub const fn with_alignment(alignment: usize) -> Self {
        Self {
            alignment: Some(alignment),
            pool_size: 0,
        }
    }

    /// Bytes needed by the pool after the last run
    #[must_use]
    pub const fn pool_size(&self) -> usize {
        self.pool_size
    }
}

impl Pass for MemoryLayout {
    fn name(&self) -> &'static str {
        "MemoryLayout"
    }

    fn run_on_graph(&mut self, graph: &mut Graph) -> Result<PassResult, KilnError> {
        let alignment = self.alignment.unwrap_or(graph.config().alignment).max(1);
        let mut offset: usize = 0;
        let mut planned = Vec::new();
        for id in graph.topological_order()? {
            let node = graph.node(id)?;
            if matches!(node.op(), Op::Result) {
                continue;
            }
            for (index, desc) in node.outputs().iter().enumerate() {
                // Sizes of dynamic and invalid outputs are only known at execution
                let size = match desc.size() {
                    Ok(size) => size,
                    Err(KilnError::DynamicShape { .. } | KilnError::InvalidTensorAccess { .. }) => {
                        if graph.config().debug_passes() {
                            log::debug!("No buffer for {desc}, its size is not known");
                        }
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                offset = offset
                    .div_ceil(alignment)
                    .checked_mul(alignment)
                    .and_then(|o| o.checked_add(size))
                    .map(|end| end - size)
                    .ok_or_else(|| KilnError::GraphValidation {
                        message: format!("memory pool overflows at {desc}"),
                    })?;
                if desc.pool_offset() != Some(offset) {
                    planned.push((Output::new(id, index), offset));
                }
                offset += size;
            }
        }
        self.pool_size = offset;
        if graph.config().debug_passes() {
            log::debug!("Memory pool of {offset} bytes, {} offsets moved", planned.len());
        }
        let rewrites = planned.len();
        for (output, offset) in planned {
            graph.set_pool_offset(output, offset)?;
        }
        Ok(PassResult::rewrote(rewrites))
    }
}
