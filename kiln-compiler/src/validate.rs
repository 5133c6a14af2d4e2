use crate::pass::{Pass, PassResult};
use kiln_core::{Graph, KilnError, NodeId};
use std::collections::BTreeMap;

/// Checks structural invariants of the graph, never changes it
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidateGraph;

impl Pass for ValidateGraph {
    fn name(&self) -> &'static str {
        "ValidateGraph"
    }

    fn run_on_graph(&mut self, graph: &mut Graph) -> Result<PassResult, KilnError> {
        validate(graph)?;
        Ok(PassResult::default())
    }
}

fn broken(message: String) -> KilnError {
    KilnError::GraphValidation { message }
}

// Invalid outputs over valid inputs only come from Graph::invalidate,
// inference would make them valid again
fn invalidated(graph: &Graph, id: NodeId) -> Result<bool, KilnError> {
    let node = graph.node(id)?;
    if node.outputs().iter().all(|desc| desc.is_valid()) {
        return Ok(false);
    }
    for input in node.inputs() {
        if !graph.descriptor(*input)?.is_valid() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Check that
/// - every input references a live node and an existing output of it,
/// - reference counts equal the number of reading input slots plus holds,
/// - parameters and results are live,
/// - the graph is acyclic,
/// - rerunning type inference changes nothing, except on outputs
///   invalidated by the caller.
pub fn validate(graph: &Graph) -> Result<(), KilnError> {
    let mut reads: BTreeMap<NodeId, u32> = BTreeMap::new();
    for node in graph.nodes() {
        for (slot, input) in node.inputs().iter().enumerate() {
            let Ok(producer) = graph.node(input.node) else {
                return Err(broken(format!(
                    "input {slot} of {} reads {}, which is not in the graph",
                    node.name(),
                    input.node
                )));
            };
            if producer.output(input.index).is_none() {
                return Err(broken(format!(
                    "input {slot} of {} reads output {} of {}, which has {} outputs",
                    node.name(),
                    input.index,
                    producer.name(),
                    producer.outputs().len()
                )));
            }
            *reads.entry(input.node).or_insert(0) += 1;
        }
    }
    for node in graph.nodes() {
        let expected = reads.get(&node.id()).copied().unwrap_or(0) + graph.holds(node.id());
        let rc = graph.rc(node.id())?;
        if rc != expected {
            return Err(broken(format!(
                "{} has reference count {rc}, but is read {} times and held {} times",
                node.name(),
                reads.get(&node.id()).copied().unwrap_or(0),
                graph.holds(node.id())
            )));
        }
    }
    for id in graph.parameters().iter().chain(graph.results()) {
        if !graph.contains(*id) {
            return Err(broken(format!("{id} is registered, but not in the graph")));
        }
    }
    let order = graph.topological_order()?;
    // Revalidation mutates, so it runs on a scratch copy
    let mut scratch = graph.clone();
    for id in order {
        if invalidated(graph, id)? {
            continue;
        }
        if scratch.revalidate(id)? {
            return Err(broken(format!(
                "type inference of {} is not idempotent",
                graph.node(id)?.name()
            )));
        }
    }
    Ok(())
}
