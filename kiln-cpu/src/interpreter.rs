use crate::buffer::{BufferMut, BufferRef, HostBuffer};
use crate::kernel::{Arena, Kernel, KernelRegistry};
use kiln_core::{Config, Graph, KilnError, Node, NodeId, Op, Output};
use std::collections::BTreeMap;
#[cfg(feature = "std")]
use rayon::prelude::*;

/// Evaluates graphs with reference kernels
#[derive(Debug, Clone)]
pub struct Interpreter {
    registry: KernelRegistry,
    config: Config,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

fn invalid_input(node: &str, message: impl Into<String>) -> KilnError {
    KilnError::InvalidInput {
        node: node.into(),
        message: message.into(),
    }
}

impl Interpreter {
    /// Interpreter with reference kernels and configuration loaded from environment
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::load())
    }

    /// Interpreter with reference kernels
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::with_registry(KernelRegistry::reference(), config)
    }

    /// Interpreter with custom kernels
    #[must_use]
    pub const fn with_registry(registry: KernelRegistry, config: Config) -> Self {
        Self { registry, config }
    }

    /// Registered kernels
    #[must_use]
    pub const fn registry(&self) -> &KernelRegistry {
        &self.registry
    }

    /// Evaluate results of graph. Inputs are given in order of graph parameters,
    /// outputs are returned in order of graph results.
    pub fn execute(&self, graph: &Graph, inputs: &[HostBuffer]) -> Result<Vec<HostBuffer>, KilnError> {
        let parameters = graph.parameters();
        if inputs.len() != parameters.len() {
            return Err(invalid_input(
                "graph",
                format!("{} inputs for {} parameters", inputs.len(), parameters.len()),
            ));
        }
        for (param, input) in parameters.iter().zip(inputs) {
            let node = graph.node(*param)?;
            let desc = graph.descriptor((*param).into())?;
            if desc.element_type()? != input.element_type() {
                return Err(invalid_input(
                    node.name(),
                    format!("expected {}, got {}", desc.element_type()?, input.element_type()),
                ));
            }
            let shape = desc
                .shape()
                .map_err(|e| invalid_input(node.name(), format!("parameter shape is not static, {e}")))?;
            if shape.numel() != input.len() {
                return Err(invalid_input(
                    node.name(),
                    format!("shape {shape} needs {} values, got {}", shape.numel(), input.len()),
                ));
            }
        }

        let order = graph.subgraph_order(graph.results());
        // Number of reads left before a buffer can be dropped
        let mut rcs: BTreeMap<NodeId, usize> = BTreeMap::new();
        for id in &order {
            for p in graph.node(*id)?.parameters() {
                *rcs.entry(p).or_insert(0) += 1;
            }
        }
        let mut buffers: BTreeMap<Output, HostBuffer> = BTreeMap::new();
        for id in order {
            let node = graph.node(id)?;
            let buffer = match node.op() {
                Op::Parameter { .. } => {
                    let index = parameters
                        .iter()
                        .position(|p| *p == id)
                        .ok_or_else(|| invalid_input(node.name(), "parameter is not registered"))?;
                    inputs[index].clone()
                }
                Op::Constant(c) => HostBuffer::from_constant(c)
                    .ok_or_else(|| invalid_input(node.name(), "constant has unresolved element type"))?,
                _ => self.evaluate(graph, node, &buffers)?,
            };
            buffers.insert(Output::new(id, 0), buffer);
            for p in node.parameters() {
                if let Some(rc) = rcs.get_mut(&p) {
                    *rc -= 1;
                    if *rc == 0 {
                        buffers.remove(&Output::new(p, 0));
                    }
                }
            }
        }
        graph
            .results()
            .iter()
            .map(|r| {
                buffers.remove(&Output::new(*r, 0)).ok_or_else(|| KilnError::GraphValidation {
                    message: format!("result {r} was not evaluated"),
                })
            })
            .collect()
    }

    fn evaluate(
        &self,
        graph: &Graph,
        node: &Node,
        buffers: &BTreeMap<Output, HostBuffer>,
    ) -> Result<HostBuffer, KilnError> {
        let args: Vec<BufferRef<'_>> = node
            .inputs()
            .iter()
            .map(|input| {
                buffers
                    .get(input)
                    .map(HostBuffer::as_buffer_ref)
                    .ok_or_else(|| invalid_input(node.name(), format!("input {input} was not evaluated")))
            })
            .collect::<Result<_, _>>()?;
        let desc = &node.outputs()[0];
        let element_type = desc.element_type()?;
        let shape = desc.shape()?;
        // Comparisons are dispatched by the type they compare
        let op = node.op();
        let kernel_type = if op.is_binary_elementwise_comparison() {
            args[0].element_type()
        } else {
            element_type
        };
        let kernel = self.registry.lookup(op.kind(), kernel_type)?;
        if self.config.debug_kernels() {
            log::debug!("{node} with {kernel:?} kernel of {kernel_type} over {shape}");
        }
        let mut out = HostBuffer::zeros(element_type, shape.numel())
            .ok_or_else(|| invalid_input(node.name(), "output has unresolved element type"))?;
        match kernel {
            Kernel::Unary(k) if op.is_unary_elementwise_arithmetic() => {
                self.sharded(node, out.as_buffer_mut(), |arena, y| {
                    k(slice(node, args[0], &arena, y.len())?, y, &arena)
                })?;
            }
            Kernel::Binary(k) | Kernel::Compare(k)
                if op.is_binary_elementwise_arithmetic() || op.is_binary_elementwise_comparison() =>
            {
                self.sharded(node, out.as_buffer_mut(), |arena, z| {
                    let n = z.len();
                    k(slice(node, args[0], &arena, n)?, slice(node, args[1], &arena, n)?, z, &arena)
                })?;
            }
            Kernel::Reduce(k) if op.is_arithmetic_reduction() || op.is_logical_reduction() => {
                let axes = match op {
                    Op::Reduce { axes, .. } => axes.clone(),
                    _ => graph
                        .constant_value(node.inputs()[1])
                        .ok_or_else(|| KilnError::node_validation(node.name(), "reduction axes are not constant"))?
                        .axis_set_value()?,
                };
                k(args[0], graph.shape(node.inputs()[0])?, &axes, out.as_buffer_mut())?;
            }
            Kernel::Broadcast(k) if matches!(op, Op::Broadcast { .. } | Op::BroadcastV1 { .. }) => {
                let axes = graph
                    .broadcast_axes(node.id())?
                    .ok_or_else(|| KilnError::node_validation(node.name(), "broadcast axes are not known"))?;
                k(args[0], shape, &axes, out.as_buffer_mut())?;
            }
            Kernel::Copy(k) if matches!(op, Op::Reshape { .. } | Op::ReshapeV1 | Op::Result) => {
                k(args[0], out.as_buffer_mut())?;
            }
            kernel => {
                return Err(KilnError::node_validation(
                    node.name(),
                    format!("{kernel:?} kernel can not evaluate {op}"),
                ))
            }
        }
        Ok(out)
    }

    // Split output into one shard per arena and run f on every shard
    fn sharded<F>(&self, node: &Node, out: BufferMut<'_>, f: F) -> Result<(), KilnError>
    where
        F: Fn(Arena, BufferMut<'_>) -> Result<(), KilnError> + Send + Sync,
    {
        let chunk = out.len().div_ceil(self.config.arenas.max(1)).max(1);
        let shards: Vec<(Arena, BufferMut<'_>)> = out
            .shards(chunk)
            .into_iter()
            .enumerate()
            .map(|(index, shard)| {
                (
                    Arena {
                        index,
                        offset: index * chunk,
                    },
                    shard,
                )
            })
            .collect();
        if self.config.debug_kernels() {
            log::trace!("{} split into {} shards of {chunk}", node.name(), shards.len());
        }
        #[cfg(feature = "std")]
        {
            shards.into_par_iter().try_for_each(|(arena, shard)| f(arena, shard))
        }
        #[cfg(not(feature = "std"))]
        {
            shards.into_iter().try_for_each(|(arena, shard)| f(arena, shard))
        }
    }
}

// Part of input read by the shard of arena
fn slice<'a>(node: &Node, x: BufferRef<'a>, arena: &Arena, len: usize) -> Result<BufferRef<'a>, KilnError> {
    x.range(arena.offset..arena.offset + len).ok_or_else(|| {
        invalid_input(
            node.name(),
            format!("input of {} elements is shorter than output", x.len()),
        )
    })
}
